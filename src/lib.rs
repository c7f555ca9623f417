//! Tangent - branching conversations with language models
//!
//! A conversation is a tree of messages. Any passage of a reply can be
//! selected to open a branch that explores it without disturbing the main
//! thread. This library exposes the tree engine, the streaming coordinator
//! and persistence for testing and embedding.

pub mod api;
pub mod app;
pub mod error;
pub mod navigation;
pub mod storage;
pub mod stream;
pub mod tree;
pub mod types;
pub mod util;

// Re-export core types for convenient access
pub use error::{TangentError, TangentResult};
pub use tree::TreeStore;
pub use types::{Config, Conversation, MessageId, MessageNode, Role, StreamEvent};
