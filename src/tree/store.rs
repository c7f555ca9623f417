//! The tree store: owner of the canonical conversation state.
//!
//! Every mutation is a single synchronous transition of the node map.
//! Operations that reference a missing node are no-ops that log a warning
//! and return `None`/`false`; the tree is never left half-updated.

use std::collections::HashSet;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

use super::path;
use crate::types::conversation::{Conversation, MessageMap};
use crate::types::message::{BranchId, MessageId, MessageNode, NewMessage, Role};
use crate::types::metadata::{NodeMetadata, SelectionAnchor};

/// A node that was just created, with its root-to-node path.
#[derive(Debug, Clone, PartialEq)]
pub struct AddedMessage {
    /// The created node.
    pub node: MessageNode,
    /// Nodes from the root down to and including `node`.
    pub path: Vec<MessageNode>,
}

/// Owns the conversation tree and the active node.
#[derive(Debug, Default)]
pub struct TreeStore {
    conversation: Option<Conversation>,
    active_message_id: Option<MessageId>,
    /// Root-to-active ids, recomputed whenever structure or the active node changes.
    current_path: Vec<MessageId>,
    last_created_at: Option<SystemTime>,
}

impl TreeStore {
    /// Creates an empty store with no conversation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store over a loaded conversation, resuming at its latest turn.
    #[must_use]
    pub fn from_conversation(conversation: Conversation) -> Self {
        let mut store = Self::new();
        store.replace(conversation);
        store
    }

    /// Replaces the whole conversation, resuming at its latest turn.
    pub fn replace(&mut self, conversation: Conversation) {
        let active = path::latest_message_id(conversation.messages(), conversation.root_message_id());
        self.last_created_at = conversation.messages().values().map(|n| n.created_at).max();
        debug!(
            conversation_id = %conversation.id(),
            nodes = conversation.len(),
            "Loaded conversation"
        );
        self.conversation = Some(conversation);
        self.active_message_id = active;
        self.refresh_path();
    }

    /// Starts a new conversation whose root is an empty system node.
    ///
    /// Any existing conversation is discarded. Returns the root id.
    pub fn initialize(&mut self, title: impl Into<String>) -> MessageId {
        let root = self.build_node(NewMessage::system(""), None);
        let root_id = root.id.clone();
        let conversation = Conversation::with_root(root, title);
        debug!(conversation_id = %conversation.id(), "Initialized conversation");

        self.conversation = Some(conversation);
        self.active_message_id = Some(root_id.clone());
        self.refresh_path();
        root_id
    }

    /// Drops the conversation entirely.
    pub fn clear(&mut self) {
        self.conversation = None;
        self.active_message_id = None;
        self.current_path.clear();
    }

    // ============== Reads ==============

    /// Returns the conversation, if one exists.
    #[must_use]
    pub fn conversation(&self) -> Option<&Conversation> {
        self.conversation.as_ref()
    }

    /// Returns the node map, if a conversation exists.
    #[must_use]
    pub fn messages(&self) -> Option<&MessageMap> {
        self.conversation.as_ref().map(Conversation::messages)
    }

    /// Looks up a node.
    #[must_use]
    pub fn get(&self, id: &MessageId) -> Option<&MessageNode> {
        self.conversation.as_ref().and_then(|c| c.get(id))
    }

    /// Returns the root id.
    #[must_use]
    pub fn root_message_id(&self) -> Option<&MessageId> {
        self.conversation.as_ref().map(Conversation::root_message_id)
    }

    /// Returns the active node id.
    #[must_use]
    pub fn active_message_id(&self) -> Option<&MessageId> {
        self.active_message_id.as_ref()
    }

    /// Returns the ids from the root to the active node.
    #[must_use]
    pub fn current_path_ids(&self) -> &[MessageId] {
        &self.current_path
    }

    /// Returns the nodes from the root to the active node.
    #[must_use]
    pub fn current_path(&self) -> Vec<&MessageNode> {
        self.current_path.iter().filter_map(|id| self.get(id)).collect()
    }

    /// Returns the root-to-node path for any node.
    #[must_use]
    pub fn path_to(&self, id: &MessageId) -> Vec<&MessageNode> {
        match self.messages() {
            Some(messages) => path::path_to_node(messages, Some(id)),
            None => Vec::new(),
        }
    }

    /// Returns the children of `id`, oldest first.
    #[must_use]
    pub fn children_of(&self, id: &MessageId) -> Vec<&MessageNode> {
        match self.messages() {
            Some(messages) => path::sorted_children(messages, id),
            None => Vec::new(),
        }
    }

    /// Returns `true` if any node has `id` as parent.
    #[must_use]
    pub fn has_children(&self, id: &MessageId) -> bool {
        self.messages()
            .is_some_and(|messages| path::has_children(messages, id))
    }

    /// Returns the canonical branch-free view.
    #[must_use]
    pub fn main_thread_path(&self) -> Vec<&MessageNode> {
        match &self.conversation {
            Some(c) => path::main_thread_path(c.messages(), c.root_message_id()),
            None => Vec::new(),
        }
    }

    /// Returns the most recent main-thread turn.
    #[must_use]
    pub fn latest_message_id(&self) -> Option<MessageId> {
        let c = self.conversation.as_ref()?;
        path::latest_message_id(c.messages(), c.root_message_id())
    }

    /// Returns the node currently in edit mode.
    #[must_use]
    pub fn editing_message_id(&self) -> Option<&MessageId> {
        self.conversation
            .as_ref()
            .and_then(Conversation::editing_message_id)
    }

    /// Returns `true` if persistable content changed since the last save.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.conversation.as_ref().is_some_and(Conversation::is_dirty)
    }

    /// Returns a persistable snapshot if dirty, clearing the dirty flag.
    pub fn take_dirty_snapshot(&mut self) -> Option<Conversation> {
        let conversation = self.conversation.as_mut()?;
        if !conversation.dirty {
            return None;
        }
        conversation.dirty = false;
        Some(conversation.persistable())
    }

    // ============== Mutations ==============

    /// Adds a node below `parent_id`, or below the active node if `None`.
    ///
    /// On an empty store this creates the conversation with the new node as
    /// its root. The new node becomes active. Returns `None` if an explicit
    /// parent is missing.
    pub fn add_message(
        &mut self,
        data: NewMessage,
        parent_id: Option<&MessageId>,
    ) -> Option<AddedMessage> {
        if self.conversation.is_none() {
            if let Some(parent) = parent_id {
                warn!(parent_id = %parent, "Cannot add message: no conversation exists yet");
                return None;
            }
            let node = self.build_node(data, None);
            let mut conversation = Conversation::with_root(node.clone(), "");
            if node.role == Role::User {
                conversation.derive_title(&node.content);
            }
            debug!(conversation_id = %conversation.id(), message_id = %node.id, "Created conversation from first message");
            self.conversation = Some(conversation);
            self.set_active(node.id.clone());
            return Some(AddedMessage {
                path: vec![node.clone()],
                node,
            });
        }

        let Some(parent) = parent_id.or(self.active_message_id.as_ref()).cloned() else {
            warn!("Cannot add message: no parent given and no active message");
            return None;
        };
        if self.get(&parent).is_none() {
            warn!(parent_id = %parent, "Cannot add message: parent not found");
            return None;
        }

        let node = self.build_node(data, Some(parent));
        let conversation = self.conversation.as_mut()?;
        if node.role == Role::User {
            conversation.derive_title(&node.content);
        }
        conversation.messages.insert(node.id.clone(), node.clone());
        conversation.touch();
        debug!(message_id = %node.id, role = %node.role, "Added message");

        self.set_active(node.id.clone());
        let path = self.current_path().into_iter().cloned().collect();
        Some(AddedMessage { node, path })
    }

    /// Appends `chunk` to a node's content.
    pub fn update_message_content(&mut self, id: &MessageId, chunk: &str) -> bool {
        let Some(node) = self.node_mut(id) else {
            warn!(message_id = %id, "Cannot append content: message not found");
            return false;
        };
        node.content.push_str(chunk);
        self.touch();
        true
    }

    /// Replaces a node's thinking content with the full accumulated trace.
    pub fn update_message_thinking_content(&mut self, id: &MessageId, thinking: &str) -> bool {
        let Some(node) = self.node_mut(id) else {
            warn!(message_id = %id, "Cannot set thinking content: message not found");
            return false;
        };
        node.thinking_content = Some(thinking.to_string());
        self.touch();
        true
    }

    /// Records how long the model thought before a response finished.
    pub fn set_thinking_duration(&mut self, id: &MessageId, secs: u64) -> bool {
        let Some(node) = self.node_mut(id) else {
            warn!(message_id = %id, "Cannot record thinking time: message not found");
            return false;
        };
        node.thinking_secs = Some(secs);
        self.touch();
        true
    }

    /// Opens a branch anchored to `selected_text` of `source_id`.
    ///
    /// Creates an empty assistant node marked as the branch start, with a
    /// fresh branch id. The new node becomes active.
    pub fn create_branch(
        &mut self,
        source_id: &MessageId,
        selected_text: &str,
        selection_start: Option<usize>,
        selection_end: Option<usize>,
    ) -> Option<AddedMessage> {
        if self.get(source_id).is_none() {
            warn!(message_id = %source_id, "Cannot create branch: source message not found");
            return None;
        }
        if selected_text.is_empty() {
            warn!(message_id = %source_id, "Cannot create branch: empty selection");
            return None;
        }

        let branch_id = BranchId::new();
        let anchor = SelectionAnchor::new(selected_text).with_range(selection_start, selection_end);
        let data = NewMessage::assistant("")
            .with_metadata(NodeMetadata::branch_start(branch_id.clone(), anchor));
        let added = self.add_message(data, Some(source_id))?;
        debug!(branch_id = %branch_id, source_id = %source_id, "Created branch");
        Some(added)
    }

    /// Moves the active pointer to an existing node.
    pub fn select_branch(&mut self, id: &MessageId) -> bool {
        if self.get(id).is_none() {
            warn!(message_id = %id, "Cannot select message: not found");
            return false;
        }
        self.set_active(id.clone());
        true
    }

    /// Puts a user node into edit mode.
    pub fn start_editing_message(&mut self, id: &MessageId) -> bool {
        if !self.is_user_node(id) {
            return false;
        }
        if let Some(conversation) = self.conversation.as_mut() {
            conversation.editing_message_id = Some(id.clone());
        }
        true
    }

    /// Leaves edit mode.
    pub fn cancel_editing_message(&mut self) {
        if let Some(conversation) = self.conversation.as_mut() {
            conversation.editing_message_id = None;
        }
    }

    /// Replaces a user node's content and prunes the replies that depended on it.
    ///
    /// Branches opened directly on the edited node survive. Everything else
    /// below it is removed, including branches anchored to removed replies,
    /// so every remaining node still reaches the root.
    ///
    /// Deeper branch starts are pruned on purpose: keeping them would leave
    /// them attached to a deleted reply.
    pub fn save_edited_message(&mut self, id: &MessageId, new_content: &str) -> bool {
        if !self.is_user_node(id) {
            return false;
        }

        let doomed = self.collect_prunable(id);
        let Some(conversation) = self.conversation.as_mut() else {
            return false;
        };
        if let Some(node) = conversation.messages.get_mut(id) {
            node.content = new_content.to_string();
        }
        conversation.messages.retain(|key, _| !doomed.contains(key));
        conversation.editing_message_id = None;
        conversation.touch();
        debug!(message_id = %id, pruned = doomed.len(), "Saved edited message");

        self.set_active(id.clone());
        true
    }

    // ============== Internals ==============

    fn collect_prunable(&self, edited: &MessageId) -> HashSet<MessageId> {
        let mut doomed = HashSet::new();
        let Some(messages) = self.messages() else {
            return doomed;
        };

        let mut stack = vec![edited.clone()];
        while let Some(parent) = stack.pop() {
            for child in path::children_of(messages, &parent) {
                if &parent == edited && child.is_branch_start() {
                    continue;
                }
                if doomed.insert(child.id.clone()) {
                    stack.push(child.id.clone());
                }
            }
        }
        doomed
    }

    fn is_user_node(&self, id: &MessageId) -> bool {
        match self.get(id) {
            Some(node) if node.role == Role::User => true,
            Some(node) => {
                warn!(message_id = %id, role = %node.role, "Only user messages can be edited");
                false
            }
            None => {
                warn!(message_id = %id, "Cannot edit message: not found");
                false
            }
        }
    }

    fn node_mut(&mut self, id: &MessageId) -> Option<&mut MessageNode> {
        self.conversation.as_mut()?.messages.get_mut(id)
    }

    fn touch(&mut self) {
        if let Some(conversation) = self.conversation.as_mut() {
            conversation.touch();
        }
    }

    fn set_active(&mut self, id: MessageId) {
        self.active_message_id = Some(id);
        self.refresh_path();
    }

    fn refresh_path(&mut self) {
        self.current_path = match self.messages() {
            Some(messages) => path::path_ids(messages, self.active_message_id.as_ref()),
            None => Vec::new(),
        };
    }

    /// Creation times are strictly increasing within a store.
    fn next_created_at(&mut self) -> SystemTime {
        let now = SystemTime::now();
        let stamp = match self.last_created_at {
            Some(last) if now <= last => last + Duration::from_micros(1),
            _ => now,
        };
        self.last_created_at = Some(stamp);
        stamp
    }

    fn build_node(&mut self, data: NewMessage, parent_id: Option<MessageId>) -> MessageNode {
        let role = data.role();
        MessageNode {
            id: MessageId::new(),
            role,
            content: data.content,
            thinking_content: data.thinking_content,
            thinking_secs: None,
            parent_id,
            created_at: self.next_created_at(),
            metadata: data.metadata,
        }
    }
}
