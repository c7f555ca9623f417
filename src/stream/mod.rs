//! Streaming coordinator: applies one model response to the tree.
//!
//! A coordinator is created per response with the parent node it answers
//! and the request path that was sent. Events are fed to it in delivery
//! order. The assistant node is created lazily on the first content chunk,
//! so a response that fails before producing anything leaves no empty node.
//!
//! Thinking chunks can arrive before the node exists. They are buffered and
//! the whole buffer is written with the replacing thinking update each time,
//! so nothing is lost however creation and thinking interleave. A response
//! that ends with thinking but no text still gets a node to hold the trace,
//! along with the thinking time.
//!
//! # Example
//!
//! ```
//! use tangent::stream::{StreamProgress, StreamingCoordinator};
//! use tangent::tree::TreeStore;
//! use tangent::types::{NewMessage, NodeMetadata, StreamEvent};
//!
//! let mut store = TreeStore::new();
//! let question = store.add_message(NewMessage::user("Hi"), None).unwrap();
//! let mut coordinator =
//!     StreamingCoordinator::new(question.node.id.clone(), question.path, &NodeMetadata::default(), false);
//!
//! coordinator.handle(&mut store, StreamEvent::Chunk("Hel".into()));
//! coordinator.handle(&mut store, StreamEvent::Chunk("lo".into()));
//! let progress = coordinator.handle(&mut store, StreamEvent::Complete);
//!
//! let StreamProgress::Completed(outcome) = progress else { panic!() };
//! let reply = store.get(outcome.node_id.as_ref().unwrap()).unwrap();
//! assert_eq!(reply.content, "Hello");
//! ```

pub mod pending;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::tree::TreeStore;
use crate::types::message::{MessageId, MessageNode, NewMessage};
use crate::types::metadata::NodeMetadata;
use crate::types::stream::StreamEvent;

pub use pending::PendingCall;

/// Identifies one streaming session.
pub type SessionId = Uuid;

/// Why a response stream ended without completing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// The transport reported a failure.
    #[error("model stream failed: {0}")]
    Transport(String),

    /// The channel closed before a terminal event arrived.
    #[error("model stream ended unexpectedly")]
    Interrupted,

    /// The caller abandoned the stream.
    #[error("model stream was cancelled")]
    Cancelled,

    /// The node being answered disappeared before the first chunk.
    #[error("parent message {0} no longer exists")]
    ParentMissing(MessageId),
}

/// What a finished stream produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamOutcome {
    /// The assistant node, if any content arrived.
    pub node_id: Option<MessageId>,
    /// Seconds from the first thinking chunk to the end of the stream.
    pub thinking_secs: Option<u64>,
}

/// Result of applying one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamProgress {
    /// More events are expected.
    Pending,
    /// The stream completed normally.
    Completed(StreamOutcome),
    /// The stream failed. Partial content stays in the tree.
    Failed(StreamOutcome, StreamError),
}

impl StreamProgress {
    /// Returns the final result, or `None` while the stream is still open.
    #[must_use]
    pub fn into_result(self) -> Option<Result<StreamOutcome, StreamError>> {
        match self {
            Self::Pending => None,
            Self::Completed(outcome) => Some(Ok(outcome)),
            Self::Failed(_, error) => Some(Err(error)),
        }
    }
}

/// Applies one in-flight response to a [`TreeStore`].
#[derive(Debug)]
pub struct StreamingCoordinator {
    session_id: SessionId,
    parent_id: MessageId,
    path: Vec<MessageNode>,
    response_metadata: NodeMetadata,
    reasoning: bool,
    node_id: Option<MessageId>,
    thinking: String,
    thinking_started: Option<Instant>,
    finished: bool,
}

impl StreamingCoordinator {
    /// Prepares a session answering `parent_id`.
    ///
    /// Only the branch id of `metadata` is carried onto the response; anchors
    /// and attachments belong to the message that prompted it. Thinking chunks
    /// are recorded only when `reasoning` is set.
    #[must_use]
    pub fn new(
        parent_id: MessageId,
        path: Vec<MessageNode>,
        metadata: &NodeMetadata,
        reasoning: bool,
    ) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            parent_id,
            path,
            response_metadata: metadata.for_response(),
            reasoning,
            node_id: None,
            thinking: String::new(),
            thinking_started: None,
            finished: false,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// The node this response answers.
    #[must_use]
    pub fn parent_id(&self) -> &MessageId {
        &self.parent_id
    }

    /// The request path the response was generated from.
    #[must_use]
    pub fn path(&self) -> &[MessageNode] {
        &self.path
    }

    /// The assistant node, once the first chunk created it.
    #[must_use]
    pub fn node_id(&self) -> Option<&MessageId> {
        self.node_id.as_ref()
    }

    /// Thinking text received so far.
    #[must_use]
    pub fn thinking(&self) -> &str {
        &self.thinking
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Applies one event to the tree.
    pub fn handle(&mut self, store: &mut TreeStore, event: StreamEvent) -> StreamProgress {
        if self.finished {
            debug!(session_id = %self.session_id, "Ignoring event after stream end");
            return StreamProgress::Pending;
        }

        match event {
            StreamEvent::Chunk(text) => self.on_chunk(store, &text),
            StreamEvent::ThinkingChunk(text) => {
                self.on_thinking(store, &text);
                StreamProgress::Pending
            }
            StreamEvent::Complete => {
                let outcome = self.finish(store);
                debug!(
                    session_id = %self.session_id,
                    node_id = ?outcome.node_id,
                    thinking_secs = ?outcome.thinking_secs,
                    "Stream complete"
                );
                StreamProgress::Completed(outcome)
            }
            StreamEvent::Error(message) => self.fail(store, StreamError::Transport(message)),
        }
    }

    /// Ends the stream early for `reason`, keeping whatever arrived.
    pub fn abort(&mut self, store: &mut TreeStore, reason: StreamError) -> StreamProgress {
        if self.finished {
            return StreamProgress::Pending;
        }
        self.fail(store, reason)
    }

    fn on_chunk(&mut self, store: &mut TreeStore, text: &str) -> StreamProgress {
        if let Some(node_id) = &self.node_id {
            store.update_message_content(node_id, text);
            return StreamProgress::Pending;
        }
        if text.is_empty() {
            return StreamProgress::Pending;
        }
        if !self.create_node(store, text) {
            let parent = self.parent_id.clone();
            return self.fail(store, StreamError::ParentMissing(parent));
        }
        self.flush_thinking(store);
        StreamProgress::Pending
    }

    fn create_node(&mut self, store: &mut TreeStore, content: &str) -> bool {
        let data = NewMessage::assistant(content).with_metadata(self.response_metadata.clone());
        let Some(added) = store.add_message(data, Some(&self.parent_id)) else {
            return false;
        };
        debug!(session_id = %self.session_id, node_id = %added.node.id, "Created response node");
        self.node_id = Some(added.node.id);
        true
    }

    fn on_thinking(&mut self, store: &mut TreeStore, text: &str) {
        if !self.reasoning {
            debug!(session_id = %self.session_id, "Dropping thinking chunk for non-reasoning model");
            return;
        }
        self.thinking_started.get_or_insert_with(Instant::now);
        self.thinking.push_str(text);
        self.flush_thinking(store);
    }

    fn flush_thinking(&self, store: &mut TreeStore) {
        if self.thinking.is_empty() {
            return;
        }
        if let Some(node_id) = &self.node_id {
            store.update_message_thinking_content(node_id, &self.thinking);
        }
    }

    fn fail(&mut self, store: &mut TreeStore, error: StreamError) -> StreamProgress {
        let outcome = self.finish(store);
        warn!(
            session_id = %self.session_id,
            node_id = ?outcome.node_id,
            error = %error,
            "Stream ended without completing"
        );
        StreamProgress::Failed(outcome, error)
    }

    fn finish(&mut self, store: &mut TreeStore) -> StreamOutcome {
        self.finished = true;
        if self.node_id.is_none() && !self.thinking.is_empty() && !self.create_node(store, "") {
            warn!(session_id = %self.session_id, parent_id = %self.parent_id, "Dropping thinking: parent no longer exists");
        }
        self.flush_thinking(store);

        let thinking_secs = self
            .thinking_started
            .map(|started| started.elapsed().as_secs_f64().round() as u64);
        if let (Some(node_id), Some(secs)) = (&self.node_id, thinking_secs) {
            store.set_thinking_duration(node_id, secs);
        }
        StreamOutcome {
            node_id: self.node_id.clone(),
            thinking_secs,
        }
    }
}
