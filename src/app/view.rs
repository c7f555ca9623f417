//! Plain-text views of a conversation for the command line.

use std::fmt::Write as _;

use crate::tree::{branch_index, path, TreeStore};
use crate::types::conversation::MessageMap;
use crate::types::message::{MessageId, MessageNode, Role};
use crate::util::{single_line, truncate_string};

/// Widest node preview in the tree view, in characters.
const PREVIEW_CHARS: usize = 72;

fn role_label(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "you",
        Role::Assistant => "assistant",
    }
}

/// Renders a linear thread, noting branches opened on each message.
#[must_use]
pub fn format_thread(messages: &MessageMap, thread: &[&MessageNode]) -> String {
    let mut out = String::new();
    for node in thread.iter().filter(|n| !n.content.is_empty()) {
        let _ = writeln!(out, "[{}] {}", role_label(node.role), node.id);
        if let Some(thinking) = node.thinking_content.as_deref().filter(|t| !t.is_empty()) {
            let _ = writeln!(out, "  (thinking: {})", truncate_string(&single_line(thinking), PREVIEW_CHARS));
        }
        let _ = writeln!(out, "{}", node.content);

        for entry in branch_index::for_node(messages, &node.id) {
            let _ = writeln!(
                out,
                "  -> branch {} on \"{}\"",
                entry.node_id,
                truncate_string(&single_line(&entry.selected_text), PREVIEW_CHARS)
            );
        }
        out.push('\n');
    }
    out
}

/// Renders the whole tree, one node per line, marking the active node.
#[must_use]
pub fn format_tree(store: &TreeStore) -> String {
    let (Some(messages), Some(root)) = (store.messages(), store.root_message_id()) else {
        return String::new();
    };
    let mut out = String::new();
    write_subtree(&mut out, messages, root, 0, store.active_message_id());
    out
}

fn write_subtree(
    out: &mut String,
    messages: &MessageMap,
    id: &MessageId,
    depth: usize,
    active: Option<&MessageId>,
) {
    // Iterative to stay safe on deep trees.
    let mut stack = vec![(id.clone(), depth)];
    while let Some((id, depth)) = stack.pop() {
        let Some(node) = messages.get(&id) else {
            continue;
        };
        let marker = if Some(&node.id) == active { "*" } else { " " };
        let label = match node.metadata.anchor() {
            Some(anchor) => format!(
                "branch on \"{}\"",
                truncate_string(&single_line(&anchor.selected_text), PREVIEW_CHARS)
            ),
            None if node.content.is_empty() => format!("({})", role_label(node.role)),
            None => format!(
                "{}: {}",
                role_label(node.role),
                truncate_string(&single_line(&node.content), PREVIEW_CHARS)
            ),
        };
        let _ = writeln!(out, "{}{}{} [{}]", marker, "  ".repeat(depth), label, node.id);

        for child in path::sorted_children(messages, &node.id).into_iter().rev() {
            stack.push((child.id.clone(), depth + 1));
        }
    }
}
