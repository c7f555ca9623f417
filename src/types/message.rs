//! Message nodes and roles for the conversation tree.
//!
//! A [`MessageNode`] is one turn of the conversation. Nodes reference their
//! parent by id; the tree structure is defined entirely by those links.
//!
//! # Examples
//!
//! ```
//! use tangent::types::message::Role;
//!
//! let role = Role::Assistant;
//! assert_eq!(format!("{}", role), "assistant");
//!
//! let json = serde_json::to_string(&Role::System).unwrap();
//! assert_eq!(json, "\"system\"");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;
use uuid::Uuid;

use super::metadata::NodeMetadata;

/// Opaque, immutable identifier of a message node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Allocates a fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifier shared by every node of one alternate branch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchId(String);

impl BranchId {
    /// Allocates a fresh random branch id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BranchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BranchId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Represents a participant role in a conversation.
///
/// Roles are serialized as lowercase strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions or synthetic context, including the conversation root.
    System,
    /// Human user sending messages.
    User,
    /// Model responding to messages.
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single turn in the conversation tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageNode {
    /// Unique id, assigned at creation.
    pub id: MessageId,

    /// Who produced this turn.
    pub role: Role,

    /// Visible text. Grows during streaming for assistant nodes.
    pub content: String,

    /// Reasoning trace from a reasoning-capable model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_content: Option<String>,

    /// Seconds the model spent thinking before the response finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_secs: Option<u64>,

    /// Parent node, `None` only for the root.
    pub parent_id: Option<MessageId>,

    /// Creation time, used to order siblings.
    pub created_at: SystemTime,

    /// Branch, attachment and context annotations.
    #[serde(default, skip_serializing_if = "NodeMetadata::is_empty")]
    pub metadata: NodeMetadata,
}

impl MessageNode {
    /// Returns `true` if this node has no parent.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Returns `true` if this node is the first node of a branch.
    #[must_use]
    pub fn is_branch_start(&self) -> bool {
        self.metadata.is_branch_start()
    }

    /// Returns `true` if this node only exists to build a model request.
    #[must_use]
    pub fn is_context_message(&self) -> bool {
        self.metadata.context_only
    }

    /// Returns `true` if `parent` is this node's parent.
    #[must_use]
    pub fn is_child_of(&self, parent: &MessageId) -> bool {
        self.parent_id.as_ref() == Some(parent)
    }
}

/// Input for creating a node. The store assigns id, parent and timestamp.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewMessage {
    /// Role of the new node.
    pub role: Option<Role>,
    /// Initial content.
    pub content: String,
    /// Initial thinking content.
    pub thinking_content: Option<String>,
    /// Metadata to attach.
    pub metadata: NodeMetadata,
}

impl NewMessage {
    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Creates an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Creates a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            role: Some(role),
            content: content.into(),
            ..Self::default()
        }
    }

    /// Attaches metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: NodeMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Returns the role, defaulting to `User`.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role.unwrap_or(Role::User)
    }
}
