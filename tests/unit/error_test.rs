//! Error categories and the warnings logged for rejected operations.

use tangent::error::TangentError;
use tangent::stream::StreamError;
use tangent::tree::TreeStore;
use tangent::types::{MessageId, NewMessage};
use tracing_test::traced_test;

#[test]
fn test_structural_errors_are_silent() {
    let errors = [
        TangentError::node_not_found("m1"),
        TangentError::not_editable("m1", "assistant"),
        TangentError::edit_while_streaming("m1"),
        TangentError::empty_selection("m1"),
        TangentError::StreamInProgress,
        TangentError::NotInitialized,
    ];
    for err in &errors {
        assert!(err.is_structural(), "{} should be structural", err);
        assert!(!err.is_user_visible());
        assert_eq!(err.category(), "structural");
    }
}

#[test]
fn test_only_stream_errors_are_user_visible() {
    let err: TangentError = StreamError::Transport("529 overloaded".into()).into();
    assert!(err.is_user_visible());
    assert!(err.is_retryable());
    assert_eq!(err.category(), "stream");
    assert_eq!(err.to_string(), "stream: model stream failed: 529 overloaded");

    for err in [
        TangentError::persistence_io("disk full"),
        TangentError::persistence_validation("bad key"),
        TangentError::data_corruption("checksum mismatch"),
        TangentError::config("bad toml"),
    ] {
        assert!(!err.is_user_visible(), "{} should stay hidden", err);
    }
}

#[test]
fn test_conversions() {
    let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let err = TangentError::from(json_err);
    assert_eq!(err.category(), "corruption");

    let err = TangentError::from(anyhow::anyhow!("outer").context("while saving"));
    assert_eq!(err.category(), "unknown");
    assert!(err.to_string().contains("while saving"));
}

#[test]
#[traced_test]
fn test_missing_parent_is_logged_not_raised() {
    let mut store = TreeStore::new();
    store.initialize("");
    assert!(store
        .add_message(NewMessage::user("orphan"), Some(&MessageId::from("ghost")))
        .is_none());
    assert!(logs_contain("parent not found"));
}

#[test]
#[traced_test]
fn test_empty_selection_is_logged() {
    let mut store = TreeStore::new();
    let root = store.initialize("");
    assert!(store.create_branch(&root, "", None, None).is_none());
    assert!(logs_contain("empty selection"));
}
