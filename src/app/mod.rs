//! Application core

use anyhow::{Context, Result};
use secrecy::SecretString;
use std::io::Write;
use std::time::SystemTime;
use tracing::{debug, warn};

pub mod chat;
pub mod view;

use crate::api::AnthropicTransport;
use crate::storage::{format, DebouncedSaver, StorageBackend};
use crate::types::config::Config;
use crate::types::message::MessageId;
use crate::types::stream::StreamEvent;
use chat::{ChatSession, PreparedReply};

/// What a single invocation should do.
#[derive(Debug, Default)]
pub struct RunOptions {
    /// Text to send, or the replacement text with `edit`.
    pub prompt: Option<String>,
    /// Start a new conversation instead of resuming the latest.
    pub new_conversation: bool,
    /// Open a branch on `(message id, selected text)` before sending.
    pub branch: Option<(MessageId, String)>,
    /// Replace this user message with `prompt` and regenerate its reply.
    pub edit: Option<MessageId>,
    pub list: bool,
    /// Print the main thread.
    pub show: bool,
    /// Print the whole tree.
    pub tree: bool,
    pub api_key: Option<SecretString>,
}

pub async fn run(config: Config, options: RunOptions) -> Result<()> {
    let backend = StorageBackend::from_config(&config).context("Failed to open storage")?;

    if options.list {
        let summaries = backend.list().await;
        println!("{}", format::format_summary_list(&summaries, SystemTime::now()));
        return Ok(());
    }

    let mut session = if options.new_conversation {
        ChatSession::new(config.is_reasoning_model())
            .with_saver(DebouncedSaver::new(backend, config.save_debounce()))
    } else {
        ChatSession::load(backend, &config).await
    };

    let result = execute(&config, &options, &mut session).await;

    if !session.flush().await {
        warn!("Conversation could not be saved");
    }
    result
}

async fn execute(config: &Config, options: &RunOptions, session: &mut ChatSession) -> Result<()> {
    if let Some((source, selected)) = &options.branch {
        let start = session.enter_branch(source, selected, None, None)?;
        eprintln!("Entered branch {} on \"{}\"", start.id, selected);
    }

    let reply = match (&options.edit, &options.prompt) {
        (Some(id), Some(text)) => Some(session.save_edit(id, text)?),
        (Some(_), None) => anyhow::bail!("--edit requires the new message text as PROMPT"),
        (None, Some(text)) => Some(session.send_user_message(text.clone(), Vec::new())?),
        (None, None) => None,
    };

    if let Some(reply) = reply {
        let api_key = options.api_key.clone().ok_or_else(|| {
            anyhow::anyhow!(
                "API key required. Set ANTHROPIC_API_KEY environment variable or use --api-key flag."
            )
        })?;
        let transport = AnthropicTransport::new(api_key, config);
        stream_to_stdout(session, &transport, reply).await?;
    }

    if let Some(messages) = session.store().messages() {
        if options.show {
            print!("{}", view::format_thread(messages, &session.store().main_thread_path()));
        }
        if options.tree {
            print!("{}", view::format_tree(session.store()));
        }
    }
    Ok(())
}

async fn stream_to_stdout(
    session: &mut ChatSession,
    transport: &AnthropicTransport,
    reply: PreparedReply,
) -> Result<()> {
    let mut stdout = std::io::stdout();
    let result = session
        .stream_reply(transport, reply, |event| {
            if let StreamEvent::Chunk(text) = event {
                let _ = write!(stdout, "{}", text);
                let _ = stdout.flush();
            }
        })
        .await;
    println!();

    match result {
        Ok(outcome) => {
            debug!(node_id = ?outcome.node_id, thinking_secs = ?outcome.thinking_secs, "Reply complete");
            if let Some(secs) = outcome.thinking_secs {
                eprintln!("(thought for {}s)", secs);
            }
            Ok(())
        }
        Err(e) if e.is_user_visible() => {
            eprintln!("Error: {}", e);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
