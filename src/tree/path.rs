//! Path resolution over the flat node map.
//!
//! All functions here are pure: they read a [`MessageMap`] snapshot and never
//! mutate it. Walks are bounded by the map size so a malformed map (a cycle)
//! cannot loop forever.

use std::cmp::Ordering;
use std::time::SystemTime;

use crate::types::conversation::MessageMap;
use crate::types::message::{MessageId, MessageNode, Role};
use crate::types::metadata::NodeMetadata;

/// Orders siblings by creation time, then id.
pub fn sibling_order(a: &MessageNode, b: &MessageNode) -> Ordering {
    a.created_at
        .cmp(&b.created_at)
        .then_with(|| a.id.cmp(&b.id))
}

/// Returns the nodes from the root down to `target`, inclusive.
///
/// Empty if `target` is `None` or not in the map.
pub fn path_to_node<'a>(messages: &'a MessageMap, target: Option<&MessageId>) -> Vec<&'a MessageNode> {
    let mut path = Vec::new();
    let mut current = target.and_then(|id| messages.get(id));

    while let Some(node) = current {
        if path.len() >= messages.len() {
            // Only reachable through a cycle.
            return Vec::new();
        }
        path.push(node);
        current = node.parent_id.as_ref().and_then(|p| messages.get(p));
    }

    path.reverse();
    path
}

/// Returns the ids from the root down to `target`.
pub fn path_ids(messages: &MessageMap, target: Option<&MessageId>) -> Vec<MessageId> {
    path_to_node(messages, target)
        .into_iter()
        .map(|n| n.id.clone())
        .collect()
}

/// Returns every node whose parent is `parent_id`, in no particular order.
pub fn children_of<'a>(messages: &'a MessageMap, parent_id: &MessageId) -> Vec<&'a MessageNode> {
    messages
        .values()
        .filter(|node| node.is_child_of(parent_id))
        .collect()
}

/// Returns the children of `parent_id` sorted oldest first.
pub fn sorted_children<'a>(messages: &'a MessageMap, parent_id: &MessageId) -> Vec<&'a MessageNode> {
    let mut children = children_of(messages, parent_id);
    children.sort_by(|a, b| sibling_order(a, b));
    children
}

/// Returns `true` if any node has `parent_id` as its parent.
pub fn has_children(messages: &MessageMap, parent_id: &MessageId) -> bool {
    messages.values().any(|node| node.is_child_of(parent_id))
}

fn continuation<'a>(
    messages: &'a MessageMap,
    parent_id: &MessageId,
    pick_latest: bool,
) -> Option<&'a MessageNode> {
    let candidates = messages
        .values()
        .filter(|node| node.is_child_of(parent_id) && !node.is_branch_start());
    if pick_latest {
        candidates.max_by(|a, b| sibling_order(a, b))
    } else {
        candidates.min_by(|a, b| sibling_order(a, b))
    }
}

/// Returns the canonical branch-free view starting at `root_id`.
///
/// At each step the oldest child that is not a branch start is taken.
pub fn main_thread_path<'a>(messages: &'a MessageMap, root_id: &MessageId) -> Vec<&'a MessageNode> {
    let mut path = Vec::new();
    let mut current = messages.get(root_id);

    while let Some(node) = current {
        if path.len() >= messages.len() {
            break;
        }
        path.push(node);
        current = continuation(messages, &node.id, false);
    }
    path
}

/// Returns the most recent turn reachable from `start_id` without entering branches.
///
/// At each step the newest child that is not a branch start is taken. Used to
/// resume a conversation (from the root) or a branch (from its start node).
pub fn latest_message_id(messages: &MessageMap, start_id: &MessageId) -> Option<MessageId> {
    let mut current = messages.get(start_id)?;
    let mut steps = 0;

    while let Some(next) = continuation(messages, &current.id, true) {
        steps += 1;
        if steps > messages.len() {
            break;
        }
        current = next;
    }
    Some(current.id.clone())
}

/// Returns the depth of `id` (the root has depth 0).
pub fn depth_of(messages: &MessageMap, id: &MessageId) -> Option<usize> {
    let path = path_to_node(messages, Some(id));
    path.len().checked_sub(1)
}

/// Returns `true` if `ancestor` lies on the root path of `id` (or is `id`).
pub fn is_ancestor_or_self(messages: &MessageMap, ancestor: &MessageId, id: &MessageId) -> bool {
    path_to_node(messages, Some(id))
        .iter()
        .any(|node| &node.id == ancestor)
}

/// Builds the message list to send to a model for a response below `target`.
///
/// Empty nodes (the system root, branch placeholders) are left out. Each
/// branch start on the path is preceded by a context-only node quoting the
/// text the branch was opened on. Context nodes are never part of the tree.
pub fn request_path(messages: &MessageMap, target: &MessageId) -> Vec<MessageNode> {
    let mut request = Vec::new();

    for node in path_to_node(messages, Some(target)) {
        if let Some(anchor) = node.metadata.anchor() {
            request.push(MessageNode {
                id: MessageId::new(),
                role: Role::User,
                content: format!(
                    "I selected this passage from your previous reply and want to explore it \
                     further:\n\n> {}",
                    anchor.selected_text.replace('\n', "\n> ")
                ),
                thinking_content: None,
                thinking_secs: None,
                parent_id: node.parent_id.clone(),
                created_at: SystemTime::now(),
                metadata: NodeMetadata::context_only(),
            });
        }
        if !node.content.trim().is_empty() {
            request.push(node.clone());
        }
    }
    request
}
