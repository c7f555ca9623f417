//! Per-session "is a response in flight" state.

use super::{SessionId, StreamingCoordinator};
use crate::error::{TangentError, TangentResult};

/// Whether a conversation has a response streaming.
///
/// At most one coordinator is active per conversation; starting another
/// while one is in flight is rejected.
#[derive(Debug, Default)]
pub enum PendingCall {
    #[default]
    Idle,
    Streaming(StreamingCoordinator),
}

impl PendingCall {
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming(_))
    }

    /// The session id of the in-flight response.
    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        match self {
            Self::Streaming(coordinator) => Some(coordinator.session_id()),
            Self::Idle => None,
        }
    }

    #[must_use]
    pub fn coordinator(&self) -> Option<&StreamingCoordinator> {
        match self {
            Self::Streaming(coordinator) => Some(coordinator),
            Self::Idle => None,
        }
    }

    /// Returns the coordinator only if it belongs to `session_id`.
    pub fn coordinator_for(&mut self, session_id: SessionId) -> Option<&mut StreamingCoordinator> {
        match self {
            Self::Streaming(coordinator) if coordinator.session_id() == session_id => Some(coordinator),
            _ => None,
        }
    }

    /// Marks `coordinator` as the in-flight response.
    ///
    /// # Errors
    ///
    /// Returns `TangentError::StreamInProgress` if a response is already streaming.
    pub fn begin(&mut self, coordinator: StreamingCoordinator) -> TangentResult<SessionId> {
        if self.is_streaming() {
            return Err(TangentError::StreamInProgress);
        }
        let session_id = coordinator.session_id();
        *self = Self::Streaming(coordinator);
        Ok(session_id)
    }

    /// Returns to idle, handing back the coordinator if one was active.
    pub fn finish(&mut self) -> Option<StreamingCoordinator> {
        match std::mem::take(self) {
            Self::Streaming(coordinator) => Some(coordinator),
            Self::Idle => None,
        }
    }
}
