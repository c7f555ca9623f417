//! Core type definitions for Tangent.
//!
//! - [`message`] - Message nodes, ids and roles
//! - [`metadata`] - Branch, attachment and context annotations on nodes
//! - [`image`] - Image attachment references
//! - [`conversation`] - The conversation aggregate
//! - [`stream`] - Stream events delivered by model transports
//! - [`config`] - Application configuration
//!
//! # Re-exports
//!
//! ```
//! use tangent::types::{Conversation, MessageNode, Role, StreamEvent};
//! ```

pub mod config;
pub mod conversation;
pub mod image;
pub mod message;
pub mod metadata;
pub mod stream;

pub use config::Config;
pub use conversation::{Conversation, MessageMap};
pub use image::ImageAttachment;
pub use message::{BranchId, MessageId, MessageNode, NewMessage, Role};
pub use metadata::{BranchTag, NodeMetadata, SelectionAnchor};
pub use stream::StreamEvent;
