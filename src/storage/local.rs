//! In-memory conversation cache for guest sessions.
//!
//! Holds the same serialized records as the file backend, keyed by
//! conversation id, for sessions that have no user identity. Contents live
//! as long as the cache (and its clones).

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::persistence::ConversationFile;
use super::ConversationSummary;
use crate::error::{TangentError, TangentResult};
use crate::types::conversation::Conversation;

#[derive(Debug, Clone, Default)]
pub struct LocalCache {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl LocalCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a conversation, replacing any previous version.
    ///
    /// # Errors
    ///
    /// Returns an error if the conversation cannot be serialized.
    pub async fn save(&self, conversation: &Conversation) -> TangentResult<()> {
        let file = ConversationFile::new(conversation.clone())?;
        let json = serde_json::to_string(&file)
            .map_err(|e| TangentError::persistence_io(format!("failed to serialize: {}", e)))?;
        self.entries
            .lock()
            .await
            .insert(conversation.id().to_string(), json);
        debug!(conversation_id = %conversation.id(), "Cached guest conversation");
        Ok(())
    }

    /// Reads one conversation.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceIo` if the id is unknown and `DataCorruption` if
    /// the record is malformed.
    pub async fn load(&self, conversation_id: &str) -> TangentResult<Conversation> {
        let json = self
            .entries
            .lock()
            .await
            .get(conversation_id)
            .cloned()
            .ok_or_else(|| {
                TangentError::persistence_io(format!("no cached conversation {}", conversation_id))
            })?;
        let conversation = ConversationFile::parse(&json)?;
        conversation.validate()?;
        Ok(conversation)
    }

    /// Removes a conversation. Returns `true` if it was present.
    pub async fn delete(&self, conversation_id: &str) -> bool {
        self.entries.lock().await.remove(conversation_id).is_some()
    }

    /// Stores a raw record without validation.
    pub async fn insert_raw(&self, conversation_id: impl Into<String>, json: impl Into<String>) {
        self.entries.lock().await.insert(conversation_id.into(), json.into());
    }

    /// Loads every valid conversation, dropping corrupt records.
    pub async fn load_all(&self) -> Vec<Conversation> {
        let ids: Vec<String> = self.entries.lock().await.keys().cloned().collect();
        let mut conversations = Vec::new();
        for id in ids {
            match self.load(&id).await {
                Ok(conversation) => conversations.push(conversation),
                Err(e) => {
                    warn!(conversation_id = %id, error = %e, "Discarding corrupt guest conversation");
                    self.delete(&id).await;
                }
            }
        }
        conversations
    }

    /// Loads the most recently updated conversation.
    pub async fn load_latest(&self) -> Option<Conversation> {
        self.load_all()
            .await
            .into_iter()
            .max_by_key(Conversation::updated_at)
    }

    /// Summaries of every valid conversation, most recent first.
    pub async fn list(&self) -> Vec<ConversationSummary> {
        let mut summaries: Vec<ConversationSummary> =
            self.load_all().await.iter().map(ConversationSummary::from).collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
