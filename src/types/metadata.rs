//! Node metadata as a closed set of annotations.
//!
//! A node can belong to a branch (either as its first node or as a later
//! member), carry image attachments, or be a context-only node that exists
//! only while building a model request.

use serde::{Deserialize, Serialize};

use super::image::ImageAttachment;
use super::message::BranchId;

/// Provenance of the text a branch was spawned from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionAnchor {
    /// The selected text.
    pub selected_text: String,

    /// Character offset where the selection starts in the source content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_start: Option<usize>,

    /// Character offset where the selection ends (exclusive).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_end: Option<usize>,
}

impl SelectionAnchor {
    /// Creates an anchor with no offsets.
    #[must_use]
    pub fn new(selected_text: impl Into<String>) -> Self {
        Self {
            selected_text: selected_text.into(),
            selection_start: None,
            selection_end: None,
        }
    }

    /// Sets the selection offsets.
    #[must_use]
    pub fn with_range(mut self, start: Option<usize>, end: Option<usize>) -> Self {
        self.selection_start = start;
        self.selection_end = end;
        self
    }
}

/// How a node relates to a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BranchTag {
    /// First node of a branch, created in response to a text selection.
    Start {
        /// Branch the node opens.
        branch_id: BranchId,
        /// Text the branch is anchored to.
        anchor: SelectionAnchor,
    },
    /// Later node created while inside a branch.
    Member {
        /// Branch the node belongs to.
        branch_id: BranchId,
    },
}

impl BranchTag {
    /// Returns the branch id.
    #[must_use]
    pub fn branch_id(&self) -> &BranchId {
        match self {
            Self::Start { branch_id, .. } | Self::Member { branch_id } => branch_id,
        }
    }
}

/// Metadata attached to a [`MessageNode`](super::message::MessageNode).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeMetadata {
    /// Branch membership, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<BranchTag>,

    /// Attached media.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageAttachment>,

    /// Marks a synthetic node used only to build a request.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub context_only: bool,
}

impl NodeMetadata {
    /// Metadata for a branch-start node.
    #[must_use]
    pub fn branch_start(branch_id: BranchId, anchor: SelectionAnchor) -> Self {
        Self {
            branch: Some(BranchTag::Start { branch_id, anchor }),
            ..Self::default()
        }
    }

    /// Metadata for a later node inside a branch.
    #[must_use]
    pub fn branch_member(branch_id: BranchId) -> Self {
        Self {
            branch: Some(BranchTag::Member { branch_id }),
            ..Self::default()
        }
    }

    /// Metadata for a context-only node.
    #[must_use]
    pub fn context_only() -> Self {
        Self {
            context_only: true,
            ..Self::default()
        }
    }

    /// Adds image attachments.
    #[must_use]
    pub fn with_images(mut self, images: Vec<ImageAttachment>) -> Self {
        self.images = images;
        self
    }

    /// Returns `true` if nothing is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.branch.is_none() && self.images.is_empty() && !self.context_only
    }

    /// Returns the branch id, whether this node starts the branch or not.
    #[must_use]
    pub fn branch_id(&self) -> Option<&BranchId> {
        self.branch.as_ref().map(BranchTag::branch_id)
    }

    /// Returns `true` for branch-start nodes.
    #[must_use]
    pub fn is_branch_start(&self) -> bool {
        matches!(self.branch, Some(BranchTag::Start { .. }))
    }

    /// Returns the selection anchor of a branch-start node.
    #[must_use]
    pub fn anchor(&self) -> Option<&SelectionAnchor> {
        match &self.branch {
            Some(BranchTag::Start { anchor, .. }) => Some(anchor),
            _ => None,
        }
    }

    /// Returns the metadata a generated response inherits from its request.
    ///
    /// Only the branch id carries over; selection provenance and the
    /// branch-start flag stay on the node that opened the branch.
    #[must_use]
    pub fn for_response(&self) -> Self {
        match self.branch_id() {
            Some(branch_id) => Self::branch_member(branch_id.clone()),
            None => Self::default(),
        }
    }
}
