//! Derived index of branches anchored in a node's content.
//!
//! Nothing here is stored. Entries are recomputed from the node map whenever
//! a renderer needs to draw anchor markers.

use std::collections::HashMap;

use super::path;
use crate::types::conversation::MessageMap;
use crate::types::message::{BranchId, MessageId, MessageNode};

/// One branch opened on a node's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchEntry {
    /// Shared id of every node in the branch.
    pub branch_id: BranchId,
    /// The branch-start node.
    pub node_id: MessageId,
    /// The text the branch was opened on.
    pub selected_text: String,
    /// Character offsets of the selection in the parent content, when known.
    pub selection: Option<(usize, usize)>,
}

impl BranchEntry {
    fn from_node(node: &MessageNode) -> Option<Self> {
        let branch_id = node.metadata.branch_id()?.clone();
        let anchor = node.metadata.anchor()?;
        if anchor.selected_text.is_empty() {
            return None;
        }
        let selection = anchor.selection_start.zip(anchor.selection_end);
        Some(Self {
            branch_id,
            node_id: node.id.clone(),
            selected_text: anchor.selected_text.clone(),
            selection,
        })
    }
}

/// Returns the branches anchored in `parent_id`'s content, oldest first.
pub fn for_node(messages: &MessageMap, parent_id: &MessageId) -> Vec<BranchEntry> {
    path::sorted_children(messages, parent_id)
        .into_iter()
        .filter_map(BranchEntry::from_node)
        .collect()
}

/// Computes the branch entries of every node that has at least one branch.
pub fn build(messages: &MessageMap) -> HashMap<MessageId, Vec<BranchEntry>> {
    let mut index: HashMap<MessageId, Vec<&MessageNode>> = HashMap::new();
    for node in messages.values() {
        if let (Some(parent), true) = (&node.parent_id, node.is_branch_start()) {
            index.entry(parent.clone()).or_default().push(node);
        }
    }

    index
        .into_iter()
        .filter_map(|(parent, mut starts)| {
            starts.sort_by(|a, b| path::sibling_order(a, b));
            let entries: Vec<BranchEntry> =
                starts.into_iter().filter_map(BranchEntry::from_node).collect();
            (!entries.is_empty()).then_some((parent, entries))
        })
        .collect()
}

/// Finds the start node of `branch_id` below `parent_id`.
///
/// If siblings share a branch id, the earliest one wins.
pub fn find(messages: &MessageMap, parent_id: &MessageId, branch_id: &BranchId) -> Option<MessageId> {
    for_node(messages, parent_id)
        .into_iter()
        .find(|entry| &entry.branch_id == branch_id)
        .map(|entry| entry.node_id)
}
