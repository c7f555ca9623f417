//! Chat session orchestration.
//!
//! [`ChatSession`] ties one conversation's tree, branch breadcrumbs and
//! in-flight response together. It owns the only [`PendingCall`], so a
//! second response cannot start while one is streaming. Mutations that
//! change persistable content schedule a debounced save.

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::api::ModelTransport;
use crate::error::{TangentError, TangentResult};
use crate::navigation::{BranchFrame, BranchNavigationStack};
use crate::storage::{DebouncedSaver, StorageBackend};
use crate::stream::{
    PendingCall, SessionId, StreamError, StreamOutcome, StreamProgress, StreamingCoordinator,
};
use crate::tree::{path, TreeStore};
use crate::types::config::Config;
use crate::types::conversation::Conversation;
use crate::types::image::ImageAttachment;
use crate::types::message::{MessageId, MessageNode, NewMessage, Role};
use crate::types::metadata::NodeMetadata;
use crate::types::stream::StreamEvent;

/// Capacity of the transport-to-session event channel.
const STREAM_CHANNEL_CAPACITY: usize = 100;

/// Everything needed to request a response below a node.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedReply {
    /// The node the response will answer.
    pub parent_id: MessageId,
    /// Messages to send to the model, context nodes included.
    pub request: Vec<MessageNode>,
    /// Metadata of the prompting node; the response keeps its branch id.
    pub metadata: NodeMetadata,
}

#[derive(Debug)]
pub struct ChatSession {
    store: TreeStore,
    navigation: BranchNavigationStack,
    pending: PendingCall,
    saver: Option<DebouncedSaver>,
    reasoning: bool,
}

impl ChatSession {
    /// Starts a fresh conversation.
    ///
    /// `reasoning` decides whether thinking chunks are recorded.
    #[must_use]
    pub fn new(reasoning: bool) -> Self {
        let mut store = TreeStore::new();
        store.initialize("");
        Self::with_store(store, reasoning)
    }

    /// Resumes a conversation at its latest turn.
    #[must_use]
    pub fn from_conversation(conversation: Conversation, reasoning: bool) -> Self {
        Self::with_store(TreeStore::from_conversation(conversation), reasoning)
    }

    fn with_store(store: TreeStore, reasoning: bool) -> Self {
        let navigation = BranchNavigationStack::from_path(&store.current_path());
        Self {
            store,
            navigation,
            pending: PendingCall::Idle,
            saver: None,
            reasoning,
        }
    }

    /// Loads the latest stored conversation, or starts fresh if there is none
    /// or it is unreadable. Saves go to the same backend.
    pub async fn load(backend: StorageBackend, config: &Config) -> Self {
        let session = match backend.load().await {
            Some(conversation) => {
                info!(conversation_id = %conversation.id(), "Resuming conversation");
                Self::from_conversation(conversation, config.is_reasoning_model())
            }
            None => {
                info!("No stored conversation, starting fresh");
                Self::new(config.is_reasoning_model())
            }
        };
        session.with_saver(DebouncedSaver::new(backend, config.save_debounce()))
    }

    /// Persists through `saver` from now on.
    #[must_use]
    pub fn with_saver(mut self, saver: DebouncedSaver) -> Self {
        self.saver = Some(saver);
        self
    }

    // ============== Reads ==============

    #[must_use]
    pub fn store(&self) -> &TreeStore {
        &self.store
    }

    #[must_use]
    pub fn navigation(&self) -> &BranchNavigationStack {
        &self.navigation
    }

    #[must_use]
    pub fn conversation(&self) -> Option<&Conversation> {
        self.store.conversation()
    }

    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.pending.is_streaming()
    }

    /// The in-flight session, if any.
    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.pending.session_id()
    }

    /// Builds the request for a response below an existing node.
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` if `id` is not in the tree.
    pub fn prepare_reply(&self, id: &MessageId) -> TangentResult<PreparedReply> {
        let node = self
            .store
            .get(id)
            .ok_or_else(|| TangentError::node_not_found(id))?;
        let messages = self.store.messages().ok_or(TangentError::NotInitialized)?;
        Ok(PreparedReply {
            parent_id: node.id.clone(),
            request: path::request_path(messages, id),
            metadata: node.metadata.clone(),
        })
    }

    // ============== Messages ==============

    /// Adds a user message below the active node.
    ///
    /// Inside a branch the message carries the branch id.
    ///
    /// # Errors
    ///
    /// Returns `StreamInProgress` while a response is streaming.
    pub fn send_user_message(
        &mut self,
        text: impl Into<String>,
        images: Vec<ImageAttachment>,
    ) -> TangentResult<PreparedReply> {
        if self.pending.is_streaming() {
            return Err(TangentError::StreamInProgress);
        }

        let metadata = match self.navigation.current() {
            Some(frame) => NodeMetadata::branch_member(frame.branch_id.clone()),
            None => NodeMetadata::default(),
        }
        .with_images(images);

        let added = self
            .store
            .add_message(NewMessage::user(text).with_metadata(metadata), None)
            .ok_or(TangentError::NotInitialized)?;
        self.schedule_save();
        self.prepare_reply(&added.node.id)
    }

    /// Opens a branch on `selected_text` of `source_id` and enters it.
    ///
    /// # Errors
    ///
    /// Returns `StreamInProgress` while streaming, `NodeNotFound` for an
    /// unknown source and `EmptySelection` for an empty selection.
    pub fn enter_branch(
        &mut self,
        source_id: &MessageId,
        selected_text: &str,
        selection_start: Option<usize>,
        selection_end: Option<usize>,
    ) -> TangentResult<MessageNode> {
        if self.pending.is_streaming() {
            return Err(TangentError::StreamInProgress);
        }
        if self.store.get(source_id).is_none() {
            return Err(TangentError::node_not_found(source_id));
        }
        if selected_text.is_empty() {
            return Err(TangentError::empty_selection(source_id));
        }

        let added = self
            .store
            .create_branch(source_id, selected_text, selection_start, selection_end)
            .ok_or_else(|| TangentError::node_not_found(source_id))?;
        if let Some(frame) = BranchFrame::from_branch_start(&added.node) {
            self.navigation.push(frame);
        }
        self.schedule_save();
        Ok(added.node)
    }

    /// Makes an existing node active.
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` if `id` is not in the tree.
    pub fn select(&mut self, id: &MessageId) -> TangentResult<()> {
        if !self.store.select_branch(id) {
            return Err(TangentError::node_not_found(id));
        }
        self.rebuild_navigation();
        Ok(())
    }

    // ============== Streaming ==============

    /// Marks a response to `reply` as in flight.
    ///
    /// # Errors
    ///
    /// Returns `StreamInProgress` if another response is streaming.
    pub fn begin_stream(&mut self, reply: &PreparedReply) -> TangentResult<SessionId> {
        let coordinator = StreamingCoordinator::new(
            reply.parent_id.clone(),
            reply.request.clone(),
            &reply.metadata,
            self.reasoning,
        );
        let session_id = self.pending.begin(coordinator)?;
        debug!(session_id = %session_id, parent_id = %reply.parent_id, "Began stream");
        Ok(session_id)
    }

    /// Applies one transport event.
    ///
    /// Events for any session other than the in-flight one are ignored.
    /// Returns the final result once the stream ends.
    pub fn apply_stream_event(
        &mut self,
        session_id: SessionId,
        event: StreamEvent,
    ) -> Option<Result<StreamOutcome, StreamError>> {
        let Some(coordinator) = self.pending.coordinator_for(session_id) else {
            debug!(session_id = %session_id, "Ignoring event for stale stream");
            return None;
        };
        let result = coordinator.handle(&mut self.store, event).into_result();
        if result.is_some() {
            self.pending.finish();
            self.schedule_save();
        } else {
            self.schedule_save_unless_armed();
        }
        result
    }

    /// Abandons the in-flight response. Partial content stays in the tree.
    pub fn cancel_stream(&mut self) -> Option<StreamOutcome> {
        self.end_stream(StreamError::Cancelled)
    }

    fn end_stream(&mut self, reason: StreamError) -> Option<StreamOutcome> {
        let mut coordinator = self.pending.finish()?;
        let outcome = match coordinator.abort(&mut self.store, reason) {
            StreamProgress::Failed(outcome, _) => outcome,
            _ => StreamOutcome {
                node_id: coordinator.node_id().cloned(),
                thinking_secs: None,
            },
        };
        self.schedule_save();
        Some(outcome)
    }

    /// Streams a response to `reply` from `transport` to completion.
    ///
    /// The transport runs on its own task; `on_event` sees every event as it
    /// is applied.
    ///
    /// # Errors
    ///
    /// Returns `StreamInProgress` if a response is already streaming, and a
    /// `Stream` error if the transport failed or stopped early.
    pub async fn stream_reply<T, F>(
        &mut self,
        transport: &T,
        reply: PreparedReply,
        mut on_event: F,
    ) -> TangentResult<StreamOutcome>
    where
        T: ModelTransport + Clone + 'static,
        F: FnMut(&StreamEvent),
    {
        let session_id = self.begin_stream(&reply)?;
        let (tx, mut rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let transport = transport.clone();
        let request = reply.request;
        let task = tokio::spawn(async move { transport.stream(request, tx).await });

        while let Some(event) = rx.recv().await {
            on_event(&event);
            if let Some(result) = self.apply_stream_event(session_id, event) {
                return result.map_err(TangentError::from);
            }
        }

        task.abort();
        self.end_stream(StreamError::Interrupted);
        Err(StreamError::Interrupted.into())
    }

    // ============== Editing ==============

    /// Puts a user message into edit mode.
    ///
    /// # Errors
    ///
    /// Fails like [`save_edit`](Self::save_edit).
    pub fn start_edit(&mut self, id: &MessageId) -> TangentResult<()> {
        self.check_editable(id)?;
        self.store.start_editing_message(id);
        Ok(())
    }

    pub fn cancel_edit(&mut self) {
        self.store.cancel_editing_message();
    }

    /// Replaces a user message and drops the replies that depended on it.
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound`, `NotEditable` for non-user messages, and
    /// `EditWhileStreaming` if the in-flight response answers this message
    /// or a message below it.
    pub fn save_edit(&mut self, id: &MessageId, content: &str) -> TangentResult<PreparedReply> {
        self.check_editable(id)?;
        self.store.save_edited_message(id, content);
        self.rebuild_navigation();
        self.schedule_save();
        self.prepare_reply(id)
    }

    fn check_editable(&self, id: &MessageId) -> TangentResult<()> {
        let node = self
            .store
            .get(id)
            .ok_or_else(|| TangentError::node_not_found(id))?;
        if node.role != Role::User {
            return Err(TangentError::not_editable(id, node.role));
        }

        if let (Some(coordinator), Some(messages)) = (self.pending.coordinator(), self.store.messages()) {
            if path::is_ancestor_or_self(messages, id, coordinator.parent_id()) {
                return Err(TangentError::edit_while_streaming(id));
            }
        }
        Ok(())
    }

    // ============== Navigation ==============

    /// Leaves the current branch. Returns the frame that was left.
    pub fn go_back(&mut self) -> Option<BranchFrame> {
        let frame = self.navigation.pop()?;
        self.activate_top_frame();
        Some(frame)
    }

    /// Jumps to breadcrumb `depth` (0 is the main thread).
    ///
    /// Returns `false` if the stack is shallower than `depth`.
    pub fn navigate_to_depth(&mut self, depth: usize) -> bool {
        if !self.navigation.truncate(depth) {
            return false;
        }
        self.activate_top_frame();
        true
    }

    /// Leaves every branch and shows the latest main-thread turn.
    pub fn reset_to_main_thread(&mut self) {
        self.navigation.clear();
        self.activate_top_frame();
    }

    fn activate_top_frame(&mut self) {
        let target = match (self.navigation.current(), self.store.messages()) {
            (Some(frame), Some(messages)) => frame.resolve_active(messages),
            _ => self.store.latest_message_id(),
        };
        if let Some(id) = target {
            self.store.select_branch(&id);
        }
    }

    fn rebuild_navigation(&mut self) {
        self.navigation = BranchNavigationStack::from_path(&self.store.current_path());
    }

    // ============== Persistence ==============

    fn schedule_save(&mut self) {
        let Some(saver) = self.saver.as_mut() else {
            return;
        };
        if let Some(snapshot) = self.store.take_dirty_snapshot() {
            saver.schedule(snapshot);
        }
    }

    /// Mid-stream variant: while a save is armed the store stays dirty and
    /// no snapshot is taken, so chunks cost no more than the append itself.
    fn schedule_save_unless_armed(&mut self) {
        if self.saver.as_ref().is_some_and(DebouncedSaver::is_pending) {
            return;
        }
        self.schedule_save();
    }

    /// Writes any unsaved changes now. Returns `false` if a write failed.
    pub async fn flush(&mut self) -> bool {
        let Some(saver) = self.saver.as_mut() else {
            return true;
        };
        match self.store.take_dirty_snapshot() {
            Some(snapshot) => saver.save_now(&snapshot).await,
            None => saver.flush().await,
        }
    }
}
