//! The conversation aggregate.
//!
//! A [`Conversation`] owns a flat map of nodes keyed by id. Structure is
//! defined entirely by each node's `parent_id`; the map has no order.

use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::SystemTime;
use tracing::warn;
use uuid::Uuid;

use super::message::{MessageId, MessageNode, Role};
use crate::error::{TangentError, TangentResult};

/// Flat node map, the single source of truth for tree structure.
pub type MessageMap = HashMap<MessageId, MessageNode>;

/// Longest derived title, in characters.
const TITLE_MAX_CHARS: usize = 60;

/// A branching conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Stable conversation id.
    pub(crate) id: String,

    /// Id of the unique parentless node.
    pub(crate) root_message_id: MessageId,

    /// Display title.
    #[serde(default)]
    pub(crate) title: String,

    /// All nodes, keyed by id. Serialized in id order so the same tree
    /// always produces the same bytes.
    #[serde(serialize_with = "serialize_sorted")]
    pub(crate) messages: MessageMap,

    pub(crate) created_at: SystemTime,

    pub(crate) updated_at: SystemTime,

    /// The user node currently in edit mode, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) editing_message_id: Option<MessageId>,

    /// Persistable content changed since the last save.
    #[serde(skip)]
    pub(crate) dirty: bool,
}

fn serialize_sorted<S: Serializer>(messages: &MessageMap, serializer: S) -> Result<S::Ok, S::Error> {
    let ordered: BTreeMap<&MessageId, &MessageNode> = messages.iter().collect();
    ordered.serialize(serializer)
}

impl Conversation {
    /// Creates a conversation whose root is `root`.
    #[must_use]
    pub fn with_root(root: MessageNode, title: impl Into<String>) -> Self {
        let now = SystemTime::now();
        let root_message_id = root.id.clone();
        let mut messages = MessageMap::new();
        messages.insert(root.id.clone(), root);

        Self {
            id: Uuid::new_v4().to_string(),
            root_message_id,
            title: title.into(),
            messages,
            created_at: now,
            updated_at: now,
            editing_message_id: None,
            dirty: true,
        }
    }

    /// Returns the conversation id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the root node id.
    #[must_use]
    pub fn root_message_id(&self) -> &MessageId {
        &self.root_message_id
    }

    /// Returns the title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the node map.
    #[must_use]
    pub fn messages(&self) -> &MessageMap {
        &self.messages
    }

    /// Looks up a node.
    #[must_use]
    pub fn get(&self, id: &MessageId) -> Option<&MessageNode> {
        self.messages.get(id)
    }

    /// Returns when the conversation was created.
    #[must_use]
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Returns when the conversation was last mutated.
    #[must_use]
    pub fn updated_at(&self) -> SystemTime {
        self.updated_at
    }

    /// Returns the node currently being edited.
    #[must_use]
    pub fn editing_message_id(&self) -> Option<&MessageId> {
        self.editing_message_id.as_ref()
    }

    /// Returns `true` if content changed since the last save.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` if there are no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Records a persistable mutation.
    pub(crate) fn touch(&mut self) {
        self.updated_at = SystemTime::now();
        self.dirty = true;
    }

    /// Sets the title from the first user message if none is set yet.
    pub(crate) fn derive_title(&mut self, content: &str) {
        if !self.title.is_empty() {
            return;
        }
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return;
        }
        self.title = if trimmed.chars().count() > TITLE_MAX_CHARS {
            let head: String = trimmed.chars().take(TITLE_MAX_CHARS - 1).collect();
            format!("{}…", head.trim_end())
        } else {
            trimmed.to_string()
        };
    }

    /// Returns a copy suitable for saving.
    ///
    /// Context-only nodes and everything beneath them are dropped, and the
    /// dirty flag is cleared on the copy.
    #[must_use]
    pub fn persistable(&self) -> Self {
        let mut copy = self.clone();
        copy.dirty = false;

        let excluded: HashSet<MessageId> = self
            .messages
            .values()
            .filter(|node| self.has_context_ancestor_or_self(node))
            .map(|node| node.id.clone())
            .collect();
        if !excluded.is_empty() {
            copy.messages.retain(|id, _| !excluded.contains(id));
        }
        copy
    }

    fn has_context_ancestor_or_self(&self, node: &MessageNode) -> bool {
        let mut current = Some(node);
        let mut steps = 0;
        while let Some(n) = current {
            if n.is_context_message() {
                return true;
            }
            steps += 1;
            if steps > self.messages.len() {
                return false;
            }
            current = n.parent_id.as_ref().and_then(|p| self.messages.get(p));
        }
        false
    }

    /// Checks structural well-formedness of a loaded conversation.
    ///
    /// # Errors
    ///
    /// Returns `TangentError::DataCorruption` describing the first problem found.
    pub fn validate(&self) -> TangentResult<()> {
        let root = self.messages.get(&self.root_message_id).ok_or_else(|| {
            TangentError::data_corruption(format!(
                "root '{}' is not in the message map",
                self.root_message_id
            ))
        })?;
        if root.parent_id.is_some() {
            return Err(TangentError::data_corruption("root node has a parent"));
        }

        for (key, node) in &self.messages {
            if key != &node.id {
                return Err(TangentError::data_corruption(format!(
                    "node '{}' stored under key '{}'",
                    node.id, key
                )));
            }
            match &node.parent_id {
                None if node.id != self.root_message_id => {
                    return Err(TangentError::data_corruption(format!(
                        "second parentless node '{}'",
                        node.id
                    )));
                }
                Some(parent) if !self.messages.contains_key(parent) => {
                    return Err(TangentError::data_corruption(format!(
                        "node '{}' references missing parent '{}'",
                        node.id, parent
                    )));
                }
                _ => {}
            }
            if let Some(anchor) = node.metadata.anchor() {
                if anchor.selected_text.is_empty() {
                    return Err(TangentError::data_corruption(format!(
                        "branch start '{}' has no selected text",
                        node.id
                    )));
                }
            }
        }

        self.check_acyclic()?;

        if let Some(editing) = &self.editing_message_id {
            match self.messages.get(editing) {
                Some(node) if node.role == Role::User => {}
                _ => {
                    return Err(TangentError::data_corruption(format!(
                        "editing id '{}' is not a user node",
                        editing
                    )));
                }
            }
        }

        self.warn_duplicate_branch_ids();
        Ok(())
    }

    fn check_acyclic(&self) -> TangentResult<()> {
        // Nodes already proven to reach the root.
        let mut grounded: HashSet<&MessageId> = HashSet::new();
        grounded.insert(&self.root_message_id);

        for node in self.messages.values() {
            let mut trail: Vec<&MessageId> = Vec::new();
            let mut seen: HashSet<&MessageId> = HashSet::new();
            let mut current = node;
            while !grounded.contains(&current.id) {
                if !seen.insert(&current.id) {
                    return Err(TangentError::data_corruption(format!(
                        "cycle through node '{}'",
                        current.id
                    )));
                }
                trail.push(&current.id);
                current = match current.parent_id.as_ref().and_then(|p| self.messages.get(p)) {
                    Some(parent) => parent,
                    None => {
                        return Err(TangentError::data_corruption(format!(
                            "node '{}' does not reach the root",
                            current.id
                        )));
                    }
                };
            }
            grounded.extend(trail);
        }
        Ok(())
    }

    fn warn_duplicate_branch_ids(&self) {
        let mut seen: HashSet<(&MessageId, &str)> = HashSet::new();
        for node in self.messages.values().filter(|n| n.is_branch_start()) {
            let (Some(parent), Some(branch)) = (&node.parent_id, node.metadata.branch_id()) else {
                continue;
            };
            if !seen.insert((parent, branch.as_str())) {
                warn!(
                    conversation_id = %self.id,
                    parent_id = %parent,
                    branch_id = %branch,
                    "Duplicate branch id among siblings; the earliest branch wins"
                );
            }
        }
    }
}
