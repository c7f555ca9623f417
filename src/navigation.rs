//! Branch navigation stack.
//!
//! Session-only breadcrumb state: one frame per branch the user entered.
//! An empty stack means the main thread is shown. Frames are never
//! persisted; [`BranchNavigationStack::from_path`] rebuilds them from the
//! tree when a conversation is loaded.

use tracing::debug;

use crate::tree::{branch_index, path};
use crate::types::conversation::MessageMap;
use crate::types::message::{BranchId, MessageId, MessageNode};

/// One entered branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchFrame {
    /// The node the branch was opened on.
    pub parent_id: MessageId,
    pub branch_id: BranchId,
    /// The selected text that anchors the branch.
    pub source_text: String,
}

impl BranchFrame {
    /// Builds a frame from a branch-start node.
    #[must_use]
    pub fn from_branch_start(node: &MessageNode) -> Option<Self> {
        let anchor = node.metadata.anchor()?;
        Some(Self {
            parent_id: node.parent_id.clone()?,
            branch_id: node.metadata.branch_id()?.clone(),
            source_text: anchor.selected_text.clone(),
        })
    }

    /// Finds this frame's branch-start node.
    #[must_use]
    pub fn start_node(&self, messages: &MessageMap) -> Option<MessageId> {
        branch_index::find(messages, &self.parent_id, &self.branch_id)
    }

    /// Resolves the node to show when this frame is on top: the latest turn
    /// inside the branch.
    #[must_use]
    pub fn resolve_active(&self, messages: &MessageMap) -> Option<MessageId> {
        let start = self.start_node(messages)?;
        path::latest_message_id(messages, &start)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchNavigationStack {
    frames: Vec<BranchFrame>,
}

impl BranchNavigationStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the stack from the branch starts on a root-to-node path.
    #[must_use]
    pub fn from_path(path: &[&MessageNode]) -> Self {
        let frames = path
            .iter()
            .filter(|node| node.is_branch_start())
            .filter_map(|node| BranchFrame::from_branch_start(node))
            .collect();
        Self { frames }
    }

    pub fn push(&mut self, frame: BranchFrame) {
        debug!(branch_id = %frame.branch_id, depth = self.frames.len() + 1, "Entered branch");
        self.frames.push(frame);
    }

    /// Leaves the current branch.
    pub fn pop(&mut self) -> Option<BranchFrame> {
        self.frames.pop()
    }

    /// The current branch, or `None` on the main thread.
    #[must_use]
    pub fn current(&self) -> Option<&BranchFrame> {
        self.frames.last()
    }

    /// Number of entered branches.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[must_use]
    pub fn frames(&self) -> &[BranchFrame] {
        &self.frames
    }

    /// Truncates to `depth` frames. Returns `false` if `depth` is deeper than the stack.
    pub fn truncate(&mut self, depth: usize) -> bool {
        if depth > self.frames.len() {
            return false;
        }
        self.frames.truncate(depth);
        true
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}
