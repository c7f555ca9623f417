//! Conversation persistence.
//!
//! Two mutually exclusive backends share one best-effort surface:
//! - [`manager::ConversationManager`] stores checksummed JSON files per user
//! - [`local::LocalCache`] keeps records in memory for guest sessions
//!
//! Callers go through [`StorageBackend`]. Loads return `None` and saves
//! return `false` on failure; the error is logged, never raised. Corrupt
//! records are deleted so the next load starts clean.

pub mod debounce;
pub mod format;
pub mod local;
pub mod manager;
pub mod persistence;

use std::path::PathBuf;
use std::time::SystemTime;
use tracing::{info, warn};

use crate::error::TangentResult;
use crate::types::config::{Config, StorageMode};
use crate::types::conversation::Conversation;

pub use debounce::DebouncedSaver;
pub use local::LocalCache;
pub use manager::ConversationManager;

/// Listing information about a stored conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSummary {
    pub id: String,
    pub title: String,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
    /// Number of nodes in the tree.
    pub message_count: usize,
    /// Number of branch-start nodes.
    pub branch_count: usize,
}

impl From<&Conversation> for ConversationSummary {
    fn from(conversation: &Conversation) -> Self {
        Self {
            id: conversation.id().to_string(),
            title: conversation.title().to_string(),
            created_at: conversation.created_at(),
            updated_at: conversation.updated_at(),
            message_count: conversation.len(),
            branch_count: conversation
                .messages()
                .values()
                .filter(|node| node.is_branch_start())
                .count(),
        }
    }
}

/// Where this session's conversations live.
#[derive(Debug, Clone)]
pub enum StorageBackend {
    /// File storage keyed by user id.
    Remote(ConversationManager),
    /// In-memory storage for sessions without an identity.
    Guest(LocalCache),
}

impl StorageBackend {
    /// Builds the backend selected by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured user id is not a valid key.
    pub fn from_config(config: &Config) -> TangentResult<Self> {
        match &config.storage {
            StorageMode::Guest => Ok(Self::Guest(LocalCache::new())),
            StorageMode::Remote { dir } => {
                let dir = dir
                    .clone()
                    .or_else(|| crate::util::get_data_dir().map(|d| d.join("conversations")))
                    .unwrap_or_else(|| PathBuf::from(".tangent").join("conversations"));
                info!(dir = %dir.display(), user_id = %config.user_id, "Using file storage");
                Ok(Self::Remote(ConversationManager::new(dir, &config.user_id)?))
            }
        }
    }

    #[must_use]
    pub fn is_guest(&self) -> bool {
        matches!(self, Self::Guest(_))
    }

    /// Loads the most recently updated conversation.
    pub async fn load(&self) -> Option<Conversation> {
        match self {
            Self::Remote(manager) => match manager.load_latest().await {
                Ok(conversation) => conversation,
                Err(e) => {
                    warn!(error = %e, "Failed to load conversations");
                    None
                }
            },
            Self::Guest(cache) => cache.load_latest().await,
        }
    }

    /// Loads one conversation. A corrupt record is deleted.
    pub async fn load_by_id(&self, conversation_id: &str) -> Option<Conversation> {
        let result = match self {
            Self::Remote(manager) => manager.load(conversation_id).await,
            Self::Guest(cache) => cache.load(conversation_id).await,
        };
        match result {
            Ok(conversation) => Some(conversation),
            Err(e) => {
                warn!(conversation_id, error = %e, "Failed to load conversation");
                if e.category() == "corruption" {
                    self.delete(conversation_id).await;
                }
                None
            }
        }
    }

    /// Saves a conversation. Returns `false` on failure.
    pub async fn save(&self, conversation: &Conversation) -> bool {
        let result = match self {
            Self::Remote(manager) => manager.save(conversation).await,
            Self::Guest(cache) => cache.save(conversation).await,
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(conversation_id = %conversation.id(), error = %e, "Failed to save conversation");
                false
            }
        }
    }

    /// Deletes a conversation. Returns `false` if nothing was deleted.
    pub async fn delete(&self, conversation_id: &str) -> bool {
        match self {
            Self::Remote(manager) => match manager.delete(conversation_id).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(conversation_id, error = %e, "Failed to delete conversation");
                    false
                }
            },
            Self::Guest(cache) => cache.delete(conversation_id).await,
        }
    }

    /// Summaries of stored conversations, most recent first.
    pub async fn list(&self) -> Vec<ConversationSummary> {
        match self {
            Self::Remote(manager) => manager.list().await.unwrap_or_else(|e| {
                warn!(error = %e, "Failed to list conversations");
                Vec::new()
            }),
            Self::Guest(cache) => cache.list().await,
        }
    }
}
