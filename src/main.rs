//! Tangent - branching conversations with Claude from the terminal

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tangent::app::{self, RunOptions};
use tangent::types::config::{Config, StorageMode};
use tangent::types::MessageId;

#[derive(Parser, Debug)]
#[command(name = "tangent")]
#[command(about = "Tangent - branching conversations with Claude")]
#[command(version)]
struct Args {
    /// Message to send. With --edit, the replacement text.
    #[arg(value_name = "PROMPT")]
    prompt: Option<String>,

    /// Start a new conversation instead of resuming the latest one.
    #[arg(long)]
    new: bool,

    /// Open a branch on a passage of this message before sending.
    #[arg(long, value_name = "MESSAGE_ID", requires = "selection")]
    branch: Option<String>,

    /// The passage to branch on.
    #[arg(long, value_name = "TEXT", requires = "branch")]
    selection: Option<String>,

    /// Replace this user message with PROMPT and regenerate the reply.
    #[arg(long, value_name = "MESSAGE_ID", conflicts_with = "branch")]
    edit: Option<String>,

    /// List stored conversations and exit.
    #[arg(long)]
    list: bool,

    /// Print the main thread.
    #[arg(long)]
    show: bool,

    /// Print the whole conversation tree.
    #[arg(long)]
    tree: bool,

    /// Keep conversations in memory only.
    #[arg(long)]
    guest: bool,

    /// Model to use (overrides config)
    #[arg(short, long)]
    model: Option<String>,

    /// Config file (defaults to config.toml in the platform config directory)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// API key (or set ANTHROPIC_API_KEY env var)
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    api_key: Option<secrecy::SecretString>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so streamed replies on stdout stay clean
    let filter = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let mut config = match &args.config {
        Some(path) => Config::load(path),
        None => Config::load_default(),
    }
    .context("Failed to load configuration")?;

    if let Some(model) = args.model {
        config.model = model;
    }
    if args.guest {
        config.storage = StorageMode::Guest;
    }

    let branch = match (args.branch, args.selection) {
        (Some(id), Some(text)) => Some((MessageId::from(id), text)),
        _ => None,
    };

    app::run(
        config,
        RunOptions {
            prompt: args.prompt,
            new_conversation: args.new,
            branch,
            edit: args.edit.map(MessageId::from),
            list: args.list,
            show: args.show,
            tree: args.tree,
            api_key: args.api_key,
        },
    )
    .await
}
