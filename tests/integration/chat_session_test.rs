//! End-to-end chat sessions over real storage.

use crate::common::TestContext;
use pretty_assertions::assert_eq;
use std::time::{Duration, SystemTime};
use tangent::api::ScriptedTransport;
use tangent::app::chat::ChatSession;
use tangent::app::{self, view, RunOptions};
use tangent::storage::{format, StorageBackend};
use tangent::types::config::{Config, StorageMode};

fn file_config(ctx: &TestContext) -> Config {
    Config {
        storage: StorageMode::Remote {
            dir: Some(ctx.path()),
        },
        user_id: "tester".to_string(),
        save_debounce_ms: 50,
        ..Config::default()
    }
}

async fn ask(session: &mut ChatSession, text: &str, answer: &str) {
    let reply = session.send_user_message(text, Vec::new()).unwrap();
    session
        .stream_reply(&ScriptedTransport::reply([answer]), reply, |_| {})
        .await
        .unwrap();
}

#[tokio::test]
async fn test_conversation_survives_restart() {
    let ctx = TestContext::new();
    let config = file_config(&ctx);

    let backend = StorageBackend::from_config(&config).unwrap();
    let mut session = ChatSession::load(backend, &config).await;
    ask(&mut session, "What is a borrow?", "A temporary reference.").await;
    let answer = session.store().active_message_id().unwrap().clone();
    session.enter_branch(&answer, "temporary", None, None).unwrap();
    ask(&mut session, "How temporary?", "Until its last use.").await;
    assert!(session.flush().await);
    let id = session.conversation().unwrap().id().to_string();
    let node_count = session.conversation().unwrap().len();
    drop(session);

    let backend = StorageBackend::from_config(&config).unwrap();
    let resumed = ChatSession::load(backend, &config).await;
    let conversation = resumed.conversation().unwrap();
    assert_eq!(conversation.id(), id);
    assert_eq!(conversation.len(), node_count);
    assert_eq!(conversation.title(), "What is a borrow?");
    // Resumes on the main thread, not inside the branch.
    assert_eq!(resumed.store().active_message_id(), Some(&answer));
    assert!(resumed.navigation().is_empty());
}

#[tokio::test]
async fn test_debounced_save_reaches_disk() {
    let ctx = TestContext::new();
    let config = file_config(&ctx);
    let backend = StorageBackend::from_config(&config).unwrap();
    let mut session = ChatSession::load(backend.clone(), &config).await;

    ask(&mut session, "Hi", "Hello").await;
    let id = session.conversation().unwrap().id().to_string();

    let mut saved = None;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        saved = backend.load_by_id(&id).await;
        if saved.as_ref().is_some_and(|c| c.len() == 3) {
            break;
        }
    }
    assert_eq!(saved.map(|c| c.len()), Some(3));
}

#[tokio::test]
async fn test_corrupt_latest_conversation_starts_fresh() {
    let ctx = TestContext::new();
    let config = file_config(&ctx);
    let user_dir = ctx.path().join("tester");
    std::fs::create_dir_all(&user_dir).unwrap();
    let corrupt = user_dir.join("deadbeef.json");
    std::fs::write(&corrupt, r#"{"conversation": 42, "checksum": "00"}"#).unwrap();

    let backend = StorageBackend::from_config(&config).unwrap();
    let session = ChatSession::load(backend, &config).await;

    assert_eq!(session.conversation().unwrap().len(), 1);
    assert!(!corrupt.exists());
}

#[tokio::test]
async fn test_edit_regenerates_from_edited_message() {
    let mut session = ChatSession::new(false);
    ask(&mut session, "Name a color", "Blue").await;
    ask(&mut session, "Another", "Red").await;
    let first_question = session.store().main_thread_path()[1].id.clone();

    let reply = session.save_edit(&first_question, "Name a fruit").unwrap();
    assert_eq!(reply.parent_id, first_question);
    assert_eq!(reply.request.last().unwrap().content, "Name a fruit");
    assert_eq!(session.conversation().unwrap().len(), 2);

    let transport = ScriptedTransport::reply(["Apple"]);
    session.stream_reply(&transport, reply, |_| {}).await.unwrap();
    let thread: Vec<String> = session
        .store()
        .main_thread_path()
        .iter()
        .map(|n| n.content.clone())
        .collect();
    assert_eq!(thread, vec!["", "Name a fruit", "Apple"]);
}

#[tokio::test]
async fn test_views_and_listing() {
    let backend = StorageBackend::from_config(&Config {
        storage: StorageMode::Guest,
        ..Config::default()
    })
    .unwrap();
    let config = Config::default();
    let mut session = ChatSession::load(backend.clone(), &config).await;
    ask(&mut session, "Hi", "Hello there").await;
    let answer = session.store().active_message_id().unwrap().clone();
    session.enter_branch(&answer, "there", None, None).unwrap();
    assert!(session.flush().await);

    let store = session.store();
    let thread = view::format_thread(store.messages().unwrap(), &store.main_thread_path());
    assert!(thread.contains("Hello there"));
    assert!(thread.contains("-> branch"));
    let tree = view::format_tree(store);
    assert!(tree.lines().any(|l| l.starts_with('*') && l.contains("branch on \"there\"")));

    let listing = format::format_summary_list(&backend.list().await, SystemTime::now());
    assert!(listing.contains("| Hi | 4 msgs, 1 branches |"), "{}", listing);
}

#[tokio::test]
async fn test_run_lists_guest_conversations() {
    let config = Config {
        storage: StorageMode::Guest,
        ..Config::default()
    };
    let options = RunOptions {
        list: true,
        ..RunOptions::default()
    };
    app::run(config, options).await.unwrap();
}

#[tokio::test]
async fn test_run_without_api_key_fails_before_streaming() {
    let config = Config {
        storage: StorageMode::Guest,
        ..Config::default()
    };
    let options = RunOptions {
        prompt: Some("Hi".into()),
        new_conversation: true,
        ..RunOptions::default()
    };
    let err = app::run(config, options).await.unwrap_err();
    assert!(err.to_string().contains("API key required"));
}
