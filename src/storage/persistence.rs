//! File integrity and validation helpers for stored conversations.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs;
use tracing::{error, warn};
use uuid::Uuid;

use crate::error::{TangentError, TangentResult};
use crate::types::conversation::Conversation;

/// Static key mixed into the record checksum.
///
/// Guards against accidental corruption and casual hand edits, not against
/// an attacker with write access.
const INTEGRITY_KEY: &[u8] = b"tangent-conversation-integrity-v1";

/// Writes `contents` to `path` via a temp file and rename.
///
/// A reader sees either the old file or the new one, never a partial write.
pub(super) async fn atomic_write(path: &Path, contents: &str) -> TangentResult<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    let temp_name = format!(
        ".{}.tmp.{}",
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("conversation"),
        Uuid::new_v4()
    );
    let temp_path = parent.join(temp_name);

    fs::write(&temp_path, contents).await.map_err(|e| {
        TangentError::persistence_io(format!("failed to write {}: {}", temp_path.display(), e))
    })?;

    if let Err(e) = fs::rename(&temp_path, path).await {
        // Best effort; a stray temp file is harmless.
        let _ = fs::remove_file(&temp_path).await;
        return Err(TangentError::persistence_io(format!(
            "failed to replace {}: {}",
            path.display(),
            e
        )));
    }
    Ok(())
}

/// On-disk record: a conversation plus a checksum of its JSON.
#[derive(Debug, Serialize, Deserialize)]
pub(super) struct ConversationFile {
    pub(super) conversation: Conversation,
    /// Hex-encoded keyed SHA-256 of the conversation JSON.
    checksum: String,
}

impl ConversationFile {
    pub(super) fn new(conversation: Conversation) -> TangentResult<Self> {
        let json = serde_json::to_string(&conversation)
            .map_err(|e| TangentError::persistence_io(format!("failed to serialize: {}", e)))?;
        let checksum = compute_checksum(&json);
        Ok(Self {
            conversation,
            checksum,
        })
    }

    /// Parses a record and verifies its checksum.
    ///
    /// # Errors
    ///
    /// Returns `TangentError::DataCorruption` if the JSON is malformed or the
    /// checksum does not match.
    pub(super) fn parse(json: &str) -> TangentResult<Conversation> {
        let file: Self = serde_json::from_str(json)?;
        file.verify()
    }

    fn verify(self) -> TangentResult<Conversation> {
        let json = serde_json::to_string(&self.conversation)?;
        if self.checksum != compute_checksum(&json) {
            error!(
                conversation_id = %self.conversation.id(),
                "Conversation checksum mismatch, record is corrupt"
            );
            return Err(TangentError::data_corruption("checksum mismatch"));
        }
        Ok(self.conversation)
    }
}

pub(super) fn compute_checksum(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(INTEGRITY_KEY);
    hasher.update(data.as_bytes());
    hex::encode(hasher.finalize())
}

/// Validates an id used as a path component.
///
/// Only ASCII alphanumerics, hyphens and underscores are accepted, so an id
/// like `../../etc/passwd` cannot escape the storage directory.
///
/// # Errors
///
/// Returns `TangentError::PersistenceValidation` if the id is empty or has
/// other characters.
pub fn validate_key(kind: &str, key: &str) -> TangentResult<()> {
    if key.is_empty() {
        warn!(kind, "Storage key validation failed: empty");
        return Err(TangentError::persistence_validation(format!("{} cannot be empty", kind)));
    }

    let is_valid = key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !is_valid {
        warn!(kind, key = %key, "Storage key validation failed: invalid characters");
        return Err(TangentError::persistence_validation(format!(
            "invalid {}: only alphanumerics, hyphens and underscores are allowed",
            kind
        )));
    }
    Ok(())
}
