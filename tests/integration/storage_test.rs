//! Storage backends: round trips, integrity checks and corrupt-record cleanup.

use crate::common::{exchange_store, TestContext};
use pretty_assertions::assert_eq;
use tangent::storage::{ConversationManager, LocalCache, StorageBackend};
use tangent::types::config::{Config, StorageMode};
use tangent::types::{Conversation, NewMessage};

fn branched_snapshot() -> Conversation {
    let (mut store, ex) = exchange_store();
    store.create_branch(&ex.answer, "there", Some(6), Some(11)).unwrap();
    store.add_message(NewMessage::user("Where exactly?"), None).unwrap();
    store.take_dirty_snapshot().unwrap()
}

// ============================================================================
// File storage
// ============================================================================

#[tokio::test]
async fn test_file_round_trip_preserves_tree() {
    let ctx = TestContext::new();
    let snapshot = branched_snapshot();
    ctx.manager("tester").save(&snapshot).await.unwrap();

    let path = ctx.path().join("tester").join(format!("{}.json", snapshot.id()));
    assert!(path.exists());

    // A fresh manager sees the same tree.
    let loaded = ctx.manager("tester").load(snapshot.id()).await.unwrap();
    assert_eq!(loaded.id(), snapshot.id());
    assert_eq!(loaded.title(), "Hi");
    assert_eq!(loaded.messages(), snapshot.messages());
    assert_eq!(loaded.root_message_id(), snapshot.root_message_id());
}

#[tokio::test]
async fn test_users_are_isolated() {
    let ctx = TestContext::new();
    let snapshot = branched_snapshot();
    ctx.manager("alice").save(&snapshot).await.unwrap();

    assert!(ctx.manager("bob").load_latest().await.unwrap().is_none());
    assert_eq!(ctx.manager("alice").list_ids().await.unwrap(), vec![snapshot.id().to_string()]);
}

#[tokio::test]
async fn test_unsafe_user_id_is_rejected() {
    let ctx = TestContext::new();
    for bad in ["../escape", "", "a/b"] {
        let err = ConversationManager::new(ctx.path(), bad).unwrap_err();
        assert_eq!(err.category(), "persistence", "user id {:?}", bad);
    }
}

#[tokio::test]
async fn test_tampered_file_is_discarded_and_deleted() {
    let ctx = TestContext::new();
    let backend = ctx.backend();
    let snapshot = branched_snapshot();
    assert!(backend.save(&snapshot).await);

    let path = ctx.path().join("tester").join(format!("{}.json", snapshot.id()));
    let json = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, json.replace("Hello there", "Goodbye there")).unwrap();

    assert!(backend.load_by_id(snapshot.id()).await.is_none());
    assert!(!path.exists());
}

#[tokio::test]
async fn test_latest_skips_garbage_files() {
    let ctx = TestContext::new();
    let backend = ctx.backend();
    let snapshot = branched_snapshot();
    assert!(backend.save(&snapshot).await);
    let garbage = ctx.path().join("tester").join("broken.json");
    std::fs::write(&garbage, "{ not json").unwrap();

    let latest = backend.load().await.unwrap();
    assert_eq!(latest.id(), snapshot.id());
    assert!(!garbage.exists());
}

#[tokio::test]
async fn test_latest_is_most_recently_updated() {
    let ctx = TestContext::new();
    let backend = ctx.backend();
    let older = branched_snapshot();
    let newer = branched_snapshot();
    assert!(backend.save(&newer).await);
    assert!(backend.save(&older).await);

    assert_eq!(backend.load().await.unwrap().id(), newer.id());
    let listed = backend.list().await;
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, newer.id());
    assert_eq!(listed[0].branch_count, 1);
    assert_eq!(listed[0].message_count, 5);
}

#[tokio::test]
async fn test_delete_missing_conversation_reports_false() {
    let ctx = TestContext::new();
    let backend = ctx.backend();
    assert!(!backend.delete("never-saved").await);
}

// ============================================================================
// Guest storage
// ============================================================================

#[tokio::test]
async fn test_guest_backend_from_config() {
    let config = Config {
        storage: StorageMode::Guest,
        ..Config::default()
    };
    let backend = StorageBackend::from_config(&config).unwrap();
    assert!(backend.is_guest());

    let snapshot = branched_snapshot();
    assert!(backend.save(&snapshot).await);
    let loaded = backend.load().await.unwrap();
    assert_eq!(loaded.messages(), snapshot.messages());
}

#[tokio::test]
async fn test_guest_cache_drops_corrupt_records() {
    let cache = LocalCache::new();
    let snapshot = branched_snapshot();
    cache.save(&snapshot).await.unwrap();
    cache.insert_raw("junk", "{}").await;
    assert_eq!(cache.len().await, 2);

    let backend = StorageBackend::Guest(cache.clone());
    assert_eq!(backend.list().await.len(), 1);
    assert_eq!(cache.len().await, 1);
}
