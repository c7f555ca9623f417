//! Common test utilities and fixtures for Tangent.
//!
//! This module provides shared test infrastructure including:
//! - A temporary-directory context for file storage
//! - Builders for small conversation trees

#![allow(dead_code)]

use std::path::PathBuf;

use tangent::storage::{ConversationManager, StorageBackend};
use tangent::tree::TreeStore;
use tangent::types::{MessageId, NewMessage};

/// Test context providing common setup for integration tests.
pub struct TestContext {
    /// Temporary directory for test file operations.
    pub temp_dir: tempfile::TempDir,
}

impl TestContext {
    /// Creates a new test context with a temporary directory.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        Self {
            temp_dir: tempfile::tempdir().expect("failed to create temp dir"),
        }
    }

    /// Returns the path to the temporary directory.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.temp_dir.path().to_path_buf()
    }

    /// File storage for `user_id` rooted in the temporary directory.
    ///
    /// # Panics
    ///
    /// Panics if the user id is rejected.
    #[must_use]
    pub fn manager(&self, user_id: &str) -> ConversationManager {
        ConversationManager::new(self.path(), user_id).expect("valid user id")
    }

    /// A file-backed [`StorageBackend`] for user `tester`.
    #[must_use]
    pub fn backend(&self) -> StorageBackend {
        StorageBackend::Remote(self.manager("tester"))
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Ids of the nodes created by [`exchange_store`].
pub struct Exchange {
    pub root: MessageId,
    pub question: MessageId,
    pub answer: MessageId,
}

/// A store holding `root -> user "Hi" -> assistant "Hello there"`.
///
/// # Panics
///
/// Panics if the store rejects a message.
#[must_use]
pub fn exchange_store() -> (TreeStore, Exchange) {
    let mut store = TreeStore::new();
    let root = store.initialize("");
    let question = store
        .add_message(NewMessage::user("Hi"), None)
        .expect("question added")
        .node
        .id;
    let answer = store
        .add_message(NewMessage::assistant("Hello there"), None)
        .expect("answer added")
        .node
        .id;
    (store, Exchange { root, question, answer })
}
