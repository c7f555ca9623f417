//! File-backed conversation storage.
//!
//! Conversations are stored as one JSON file each under
//! `<dir>/<user_id>/<conversation_id>.json`, wrapped with an integrity
//! checksum that is verified on load.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use super::persistence::{atomic_write, validate_key, ConversationFile};
use super::ConversationSummary;
use crate::error::{TangentError, TangentResult};
use crate::types::conversation::Conversation;

/// Manages conversation files for one user.
#[derive(Debug, Clone)]
pub struct ConversationManager {
    user_dir: PathBuf,
    user_id: String,
}

impl ConversationManager {
    /// Creates a manager storing `user_id`'s conversations below `dir`.
    ///
    /// # Errors
    ///
    /// Returns `TangentError::PersistenceValidation` if `user_id` is not a
    /// safe path component.
    pub fn new(dir: impl AsRef<Path>, user_id: &str) -> TangentResult<Self> {
        validate_key("user id", user_id)?;
        Ok(Self {
            user_dir: dir.as_ref().join(user_id),
            user_id: user_id.to_string(),
        })
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Directory holding this user's conversations.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.user_dir
    }

    /// Writes a conversation, replacing any previous version.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is invalid or the file cannot be written.
    pub async fn save(&self, conversation: &Conversation) -> TangentResult<()> {
        validate_key("conversation id", conversation.id())?;
        fs::create_dir_all(&self.user_dir).await.map_err(|e| {
            TangentError::persistence_io(format!(
                "failed to create {}: {}",
                self.user_dir.display(),
                e
            ))
        })?;

        let file = ConversationFile::new(conversation.clone())?;
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| TangentError::persistence_io(format!("failed to serialize: {}", e)))?;
        atomic_write(&self.path_for(conversation.id()), &json).await?;

        debug!(
            conversation_id = %conversation.id(),
            nodes = conversation.len(),
            "Saved conversation"
        );
        Ok(())
    }

    /// Reads and verifies one conversation.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceIo` if the file cannot be read, and
    /// `DataCorruption` if it is malformed, fails its checksum, is stored
    /// under the wrong id, or describes a malformed tree.
    pub async fn load(&self, conversation_id: &str) -> TangentResult<Conversation> {
        validate_key("conversation id", conversation_id)?;
        let path = self.path_for(conversation_id);
        let json = fs::read_to_string(&path).await.map_err(|e| {
            TangentError::persistence_io(format!("failed to read {}: {}", path.display(), e))
        })?;

        let conversation = ConversationFile::parse(&json)?;
        if conversation.id() != conversation_id {
            return Err(TangentError::data_corruption(format!(
                "file {} holds conversation {}",
                conversation_id,
                conversation.id()
            )));
        }
        conversation.validate()?;
        Ok(conversation)
    }

    /// Removes a conversation file.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is invalid or the file cannot be removed.
    pub async fn delete(&self, conversation_id: &str) -> TangentResult<()> {
        validate_key("conversation id", conversation_id)?;
        let path = self.path_for(conversation_id);
        fs::remove_file(&path).await.map_err(|e| {
            TangentError::persistence_io(format!("failed to delete {}: {}", path.display(), e))
        })?;
        debug!(conversation_id, "Deleted conversation");
        Ok(())
    }

    /// Lists stored conversation ids.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be read.
    pub async fn list_ids(&self) -> TangentResult<Vec<String>> {
        if !self.user_dir.exists() {
            return Ok(Vec::new());
        }

        let io_err = |e: std::io::Error| {
            TangentError::persistence_io(format!(
                "failed to read {}: {}",
                self.user_dir.display(),
                e
            ))
        };
        let mut entries = fs::read_dir(&self.user_dir).await.map_err(io_err)?;
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem() {
                    ids.push(stem.to_string_lossy().into_owned());
                }
            }
        }
        Ok(ids)
    }

    /// Loads every readable conversation, deleting corrupt records.
    ///
    /// # Errors
    ///
    /// Returns an error only if the directory cannot be listed.
    pub async fn load_all(&self) -> TangentResult<Vec<Conversation>> {
        let mut conversations = Vec::new();
        for id in self.list_ids().await? {
            match self.load(&id).await {
                Ok(conversation) => conversations.push(conversation),
                Err(e) if e.category() == "corruption" => {
                    warn!(conversation_id = %id, error = %e, "Discarding corrupt conversation");
                    if let Err(e) = self.delete(&id).await {
                        warn!(conversation_id = %id, error = %e, "Failed to delete corrupt conversation");
                    }
                }
                Err(e) => {
                    warn!(conversation_id = %id, error = %e, "Skipping unreadable conversation");
                }
            }
        }
        Ok(conversations)
    }

    /// Loads the most recently updated conversation.
    ///
    /// # Errors
    ///
    /// Returns an error only if the directory cannot be listed.
    pub async fn load_latest(&self) -> TangentResult<Option<Conversation>> {
        Ok(self
            .load_all()
            .await?
            .into_iter()
            .max_by_key(Conversation::updated_at))
    }

    /// Summaries of every readable conversation, most recent first.
    ///
    /// # Errors
    ///
    /// Returns an error only if the directory cannot be listed.
    pub async fn list(&self) -> TangentResult<Vec<ConversationSummary>> {
        let mut summaries: Vec<ConversationSummary> = self
            .load_all()
            .await?
            .iter()
            .map(ConversationSummary::from)
            .collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    fn path_for(&self, conversation_id: &str) -> PathBuf {
        self.user_dir.join(format!("{}.json", conversation_id))
    }
}
