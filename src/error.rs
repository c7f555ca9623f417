//! Centralized error types for Tangent.
//!
//! This module provides a unified error type (`TangentError`) covering the
//! failure categories of the conversation engine:
//!
//! - **Structural** errors: an operation referenced a node that does not
//!   exist, or targeted a node in a way its role does not allow. These never
//!   change state and are invisible to the user.
//! - **Stream** errors: the model transport failed mid-response. These are
//!   the only errors surfaced to the user (as a dismissible message).
//! - **Persistence** errors: a save or load failed. Saves are retried by the
//!   next debounced save cycle.
//! - **Data corruption**: a persisted record was malformed. The record is
//!   discarded and a fresh conversation is started.
//!
//! # Example
//!
//! ```
//! use tangent::error::{TangentError, TangentResult};
//!
//! fn require_user(role: &str, id: &str) -> TangentResult<()> {
//!     if role != "user" {
//!         return Err(TangentError::not_editable(id, role));
//!     }
//!     Ok(())
//! }
//!
//! let err = require_user("assistant", "msg-1").unwrap_err();
//! assert!(err.is_structural());
//! assert!(!err.is_user_visible());
//! ```

use std::fmt;

/// Result type alias using `TangentError`.
pub type TangentResult<T> = Result<T, TangentError>;

/// Centralized error type for Tangent.
#[derive(Debug)]
pub enum TangentError {
    // ============== Structural Errors ==============
    /// An operation referenced a node id that is not in the tree.
    NodeNotFound {
        /// The missing node id.
        id: String,
    },

    /// The node exists but its role does not permit editing.
    NotEditable {
        /// The node id.
        id: String,
        /// The node's role.
        role: String,
    },

    /// An edit targeted a node whose subtree is receiving a streamed response.
    EditWhileStreaming {
        /// The node that was going to be edited.
        id: String,
    },

    /// A branch was requested on an empty text selection.
    EmptySelection {
        /// The node the branch would have been opened on.
        id: String,
    },

    /// A second response was requested while one is still streaming.
    StreamInProgress,

    /// The conversation has not been created yet.
    NotInitialized,

    // ============== Stream Errors ==============
    /// The model transport reported a failure.
    Stream {
        /// Description of the transport failure.
        message: String,
    },

    // ============== Persistence Errors ==============
    /// Reading or writing a stored conversation failed.
    PersistenceIo {
        /// Description of the I/O error.
        message: String,
    },

    /// A storage key failed validation.
    PersistenceValidation {
        /// Description of the validation error.
        message: String,
    },

    /// A stored conversation was malformed.
    DataCorruption {
        /// Description of what was wrong with the record.
        message: String,
    },

    // ============== Config Errors ==============
    /// The configuration file could not be read or parsed.
    Config {
        /// Description of the configuration problem.
        message: String,
    },

    // ============== Wrapped Errors ==============
    /// Error from anyhow or other sources.
    Other {
        /// The wrapped error message.
        message: String,
        /// The original error, if available.
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

// ============== Constructor Methods ==============

impl TangentError {
    /// Creates a node-not-found error.
    #[must_use]
    pub fn node_not_found(id: impl fmt::Display) -> Self {
        Self::NodeNotFound { id: id.to_string() }
    }

    /// Creates a not-editable error.
    #[must_use]
    pub fn not_editable(id: impl fmt::Display, role: impl fmt::Display) -> Self {
        Self::NotEditable {
            id: id.to_string(),
            role: role.to_string(),
        }
    }

    /// Creates an edit-while-streaming error.
    #[must_use]
    pub fn edit_while_streaming(id: impl fmt::Display) -> Self {
        Self::EditWhileStreaming { id: id.to_string() }
    }

    /// Creates an empty-selection error.
    #[must_use]
    pub fn empty_selection(id: impl fmt::Display) -> Self {
        Self::EmptySelection { id: id.to_string() }
    }

    /// Creates a stream error.
    #[must_use]
    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream {
            message: message.into(),
        }
    }

    /// Creates a persistence I/O error.
    #[must_use]
    pub fn persistence_io(message: impl Into<String>) -> Self {
        Self::PersistenceIo {
            message: message.into(),
        }
    }

    /// Creates a persistence validation error.
    #[must_use]
    pub fn persistence_validation(message: impl Into<String>) -> Self {
        Self::PersistenceValidation {
            message: message.into(),
        }
    }

    /// Creates a data corruption error.
    #[must_use]
    pub fn data_corruption(message: impl Into<String>) -> Self {
        Self::DataCorruption {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

// ============== Category Methods ==============

impl TangentError {
    /// Returns `true` if the error came from referencing the tree incorrectly.
    ///
    /// Structural errors leave the tree unchanged.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::NodeNotFound { .. }
                | Self::NotEditable { .. }
                | Self::EditWhileStreaming { .. }
                | Self::EmptySelection { .. }
                | Self::StreamInProgress
                | Self::NotInitialized
        )
    }

    /// Returns `true` if the error should be shown to the user.
    ///
    /// Only stream failures are user-visible; persistence and corruption
    /// problems surface at most as a fresh conversation.
    #[must_use]
    pub fn is_user_visible(&self) -> bool {
        matches!(self, Self::Stream { .. })
    }

    /// Returns `true` if retrying the operation may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Stream { .. } | Self::PersistenceIo { .. })
    }

    /// Returns the category name for this error.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::NodeNotFound { .. }
            | Self::NotEditable { .. }
            | Self::EditWhileStreaming { .. }
            | Self::EmptySelection { .. }
            | Self::StreamInProgress
            | Self::NotInitialized => "structural",

            Self::Stream { .. } => "stream",

            Self::PersistenceIo { .. } | Self::PersistenceValidation { .. } => "persistence",

            Self::DataCorruption { .. } => "corruption",

            Self::Config { .. } => "config",

            Self::Other { .. } => "unknown",
        }
    }
}

// ============== Display Implementation ==============

impl fmt::Display for TangentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeNotFound { id } => write!(f, "structural: node '{}' not found", id),
            Self::NotEditable { id, role } => {
                write!(f, "structural: node '{}' with role {} is not editable", id, role)
            }
            Self::EditWhileStreaming { id } => {
                write!(
                    f,
                    "structural: cannot edit '{}' while a response below it is streaming",
                    id
                )
            }
            Self::EmptySelection { id } => {
                write!(f, "structural: cannot branch from '{}' on an empty selection", id)
            }
            Self::StreamInProgress => write!(f, "structural: a response is already streaming"),
            Self::NotInitialized => write!(f, "structural: conversation not initialized"),

            Self::Stream { message } => write!(f, "stream: {}", message),

            Self::PersistenceIo { message } => write!(f, "persistence: I/O error: {}", message),
            Self::PersistenceValidation { message } => {
                write!(f, "persistence: validation error: {}", message)
            }

            Self::DataCorruption { message } => write!(f, "corruption: {}", message),

            Self::Config { message } => write!(f, "config: {}", message),

            Self::Other { message, .. } => write!(f, "error: {}", message),
        }
    }
}

// ============== Error Implementation ==============

impl std::error::Error for TangentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Other {
                source: Some(src), ..
            } => Some(src.as_ref()),
            _ => None,
        }
    }
}

// ============== Conversion Implementations ==============

impl From<anyhow::Error> for TangentError {
    fn from(err: anyhow::Error) -> Self {
        // anyhow::Error is not std::error::Error, keep the rendered chain only
        Self::Other {
            message: format!("{:#}", err),
            source: None,
        }
    }
}

impl From<crate::stream::StreamError> for TangentError {
    fn from(err: crate::stream::StreamError) -> Self {
        Self::stream(err.to_string())
    }
}

impl From<serde_json::Error> for TangentError {
    fn from(err: serde_json::Error) -> Self {
        Self::data_corruption(format!("invalid JSON: {}", err))
    }
}
