//! Debounced saving.
//!
//! Rapid mutations are coalesced into a single write: each `schedule`
//! aborts the pending save and arms a new one that fires after the quiet
//! period. Saving runs on its own task, so callers
//! never wait on storage.

use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

use super::StorageBackend;
use crate::types::conversation::Conversation;

pub struct DebouncedSaver {
    backend: StorageBackend,
    delay: Duration,
    handle: Option<JoinHandle<bool>>,
    /// Copy of the snapshot the pending task will write.
    pending: Option<Conversation>,
}

impl DebouncedSaver {
    #[must_use]
    pub fn new(backend: StorageBackend, delay: Duration) -> Self {
        Self {
            backend,
            delay,
            handle: None,
            pending: None,
        }
    }

    #[must_use]
    pub fn backend(&self) -> &StorageBackend {
        &self.backend
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Returns `true` while a scheduled save has not yet run.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Arms a save of `snapshot`, replacing any pending one.
    ///
    /// Must be called within a tokio runtime.
    pub fn schedule(&mut self, snapshot: Conversation) {
        self.abort_pending();

        let backend = self.backend.clone();
        let delay = self.delay;
        let conversation = snapshot.clone();
        debug!(conversation_id = %snapshot.id(), delay_ms = delay.as_millis() as u64, "Scheduled save");
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            backend.save(&conversation).await
        }));
        self.pending = Some(snapshot);
    }

    /// Drops the pending save without writing it.
    pub fn cancel(&mut self) {
        if self.abort_pending() {
            debug!("Cancelled pending save");
        }
        self.pending = None;
    }

    /// Writes the pending snapshot now instead of waiting.
    ///
    /// Returns `true` if nothing was pending or the write succeeded.
    pub async fn flush(&mut self) -> bool {
        let outstanding = self.abort_pending();
        match self.pending.take() {
            Some(snapshot) if outstanding => self.backend.save(&snapshot).await,
            _ => true,
        }
    }

    /// Writes `snapshot` now, superseding any pending save.
    pub async fn save_now(&mut self, snapshot: &Conversation) -> bool {
        self.cancel();
        self.backend.save(snapshot).await
    }

    /// Aborts the pending task. Returns `true` if it had not run yet.
    fn abort_pending(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                true
            }
            _ => false,
        }
    }
}

impl Drop for DebouncedSaver {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for DebouncedSaver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebouncedSaver")
            .field("delay", &self.delay)
            .field("pending", &self.is_pending())
            .finish()
    }
}
