//! Conversation listing formatting for display.

use std::time::{Duration, SystemTime};

use super::ConversationSummary;

/// Formats one listing line: id, title, node and branch counts, update time.
#[must_use]
pub fn format_summary(summary: &ConversationSummary, now: SystemTime) -> String {
    let title = if summary.title.is_empty() {
        "(untitled)"
    } else {
        summary.title.as_str()
    };
    format!(
        "{} | {} | {} msgs, {} branches | {} ({})",
        summary.id,
        title,
        summary.message_count,
        summary.branch_count,
        humantime::format_rfc3339_seconds(summary.updated_at),
        format_age(summary.updated_at, now)
    )
}

/// Formats a listing, most recently updated first.
#[must_use]
pub fn format_summary_list(summaries: &[ConversationSummary], now: SystemTime) -> String {
    if summaries.is_empty() {
        return "No conversations found.".to_string();
    }

    let mut sorted = summaries.to_vec();
    sorted.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

    let mut output = String::from("Conversations:\n\n");
    for summary in &sorted {
        output.push_str(&format_summary(summary, now));
        output.push('\n');
    }
    output
}

/// Formats how long ago `then` was, to the second.
#[must_use]
pub fn format_age(then: SystemTime, now: SystemTime) -> String {
    match now.duration_since(then) {
        Ok(elapsed) if elapsed.as_secs() == 0 => "just now".to_string(),
        Ok(elapsed) => format!(
            "{} ago",
            humantime::format_duration(Duration::from_secs(elapsed.as_secs()))
        ),
        Err(_) => "in the future".to_string(),
    }
}
