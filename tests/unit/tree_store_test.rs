//! Tree store behavior through the public API.
//!
//! Covers creation, branching, selection and the edit-and-prune rule.

use crate::common::exchange_store;
use pretty_assertions::assert_eq;
use tangent::tree::{branch_index, path, TreeStore};
use tangent::types::{MessageId, NewMessage, Role};

fn ids(nodes: &[&tangent::types::MessageNode]) -> Vec<MessageId> {
    nodes.iter().map(|n| n.id.clone()).collect()
}

// ============================================================================
// Creation
// ============================================================================

#[test]
fn test_first_message_on_empty_store_becomes_root() {
    let mut store = TreeStore::new();
    let added = store.add_message(NewMessage::user("What is Rust?"), None).unwrap();

    assert!(added.node.is_root());
    assert_eq!(store.root_message_id(), Some(&added.node.id));
    assert_eq!(store.active_message_id(), Some(&added.node.id));
    assert_eq!(store.conversation().unwrap().title(), "What is Rust?");
    assert_eq!(added.path.len(), 1);
}

#[test]
fn test_explicit_parent_on_empty_store_is_rejected() {
    let mut store = TreeStore::new();
    let added = store.add_message(NewMessage::user("Hi"), Some(&MessageId::from("nope")));
    assert!(added.is_none());
    assert!(store.conversation().is_none());
}

#[test]
fn test_add_message_returns_path_to_new_node() {
    let (mut store, ex) = exchange_store();
    let added = store.add_message(NewMessage::user("More"), None).unwrap();

    let path_ids: Vec<MessageId> = added.path.iter().map(|n| n.id.clone()).collect();
    assert_eq!(path_ids, vec![ex.root, ex.question, ex.answer, added.node.id.clone()]);
    assert_eq!(store.current_path_ids(), path_ids.as_slice());
}

#[test]
fn test_add_message_to_missing_parent_changes_nothing() {
    let (mut store, ex) = exchange_store();
    let before = store.messages().unwrap().clone();

    assert!(store.add_message(NewMessage::user("x"), Some(&MessageId::from("gone"))).is_none());
    assert_eq!(store.messages().unwrap(), &before);
    assert_eq!(store.active_message_id(), Some(&ex.answer));
}

#[test]
fn test_sibling_timestamps_are_strictly_increasing() {
    let (mut store, ex) = exchange_store();
    let a = store.add_message(NewMessage::assistant("one"), Some(&ex.question)).unwrap().node;
    let b = store.add_message(NewMessage::assistant("two"), Some(&ex.question)).unwrap().node;

    assert!(a.created_at < b.created_at);
    let children = ids(&store.children_of(&ex.question));
    assert_eq!(children, vec![ex.answer.clone(), a.id, b.id]);
}

#[test]
fn test_content_and_thinking_updates() {
    let (mut store, ex) = exchange_store();
    assert!(store.update_message_content(&ex.answer, ", friend"));
    assert!(store.update_message_thinking_content(&ex.answer, "first"));
    assert!(store.update_message_thinking_content(&ex.answer, "first and more"));

    let node = store.get(&ex.answer).unwrap();
    assert_eq!(node.content, "Hello there, friend");
    assert_eq!(node.thinking_content.as_deref(), Some("first and more"));

    assert!(!store.update_message_content(&MessageId::from("gone"), "x"));
}

#[test]
fn test_dirty_snapshot_is_taken_once() {
    let (mut store, _) = exchange_store();
    assert!(store.is_dirty());
    assert!(store.take_dirty_snapshot().is_some());
    assert!(!store.is_dirty());
    assert!(store.take_dirty_snapshot().is_none());
}

// ============================================================================
// Branching and selection
// ============================================================================

#[test]
fn test_create_branch_marks_start_and_activates_it() {
    let (mut store, ex) = exchange_store();
    let branch = store
        .create_branch(&ex.answer, "there", Some(6), Some(11))
        .unwrap()
        .node;

    assert!(branch.is_branch_start());
    assert_eq!(branch.role, Role::Assistant);
    assert_eq!(branch.content, "");
    assert_eq!(branch.parent_id.as_ref(), Some(&ex.answer));
    let anchor = branch.metadata.anchor().unwrap();
    assert_eq!(anchor.selected_text, "there");
    assert_eq!((anchor.selection_start, anchor.selection_end), (Some(6), Some(11)));
    assert_eq!(store.active_message_id(), Some(&branch.id));

    let entries = branch_index::for_node(store.messages().unwrap(), &ex.answer);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].node_id, branch.id);
}

#[test]
fn test_create_branch_rejects_missing_source_and_empty_selection() {
    let (mut store, ex) = exchange_store();
    let count = store.messages().unwrap().len();

    assert!(store.create_branch(&MessageId::from("gone"), "x", None, None).is_none());
    assert!(store.create_branch(&ex.answer, "", None, None).is_none());
    assert_eq!(store.messages().unwrap().len(), count);
}

#[test]
fn test_main_thread_ignores_branches() {
    let (mut store, ex) = exchange_store();
    let branch = store.create_branch(&ex.answer, "Hello", None, None).unwrap().node;
    store.add_message(NewMessage::user("Why hello?"), None);

    assert_eq!(
        ids(&store.main_thread_path()),
        vec![ex.root.clone(), ex.question.clone(), ex.answer.clone()]
    );
    assert_eq!(store.latest_message_id(), Some(ex.answer.clone()));
    assert!(store.current_path_ids().contains(&branch.id));
}

#[test]
fn test_select_branch_moves_active_pointer() {
    let (mut store, ex) = exchange_store();
    assert!(store.select_branch(&ex.question));
    assert_eq!(store.current_path_ids(), &[ex.root.clone(), ex.question.clone()]);

    assert!(!store.select_branch(&MessageId::from("gone")));
    assert_eq!(store.active_message_id(), Some(&ex.question));
}

#[test]
fn test_path_to_any_node() {
    let (store, ex) = exchange_store();
    let messages = store.messages().unwrap();
    assert_eq!(path::depth_of(messages, &ex.answer), Some(2));
    assert!(path::is_ancestor_or_self(messages, &ex.question, &ex.answer));
    assert!(!path::is_ancestor_or_self(messages, &ex.answer, &ex.question));
    assert!(store.path_to(&MessageId::from("gone")).is_empty());
}

// ============================================================================
// Editing
// ============================================================================

#[test]
fn test_only_user_messages_can_be_edited() {
    let (mut store, ex) = exchange_store();
    assert!(!store.start_editing_message(&ex.answer));
    assert!(!store.save_edited_message(&ex.answer, "changed"));
    assert_eq!(store.get(&ex.answer).unwrap().content, "Hello there");

    assert!(store.start_editing_message(&ex.question));
    assert_eq!(store.editing_message_id(), Some(&ex.question));
    store.cancel_editing_message();
    assert_eq!(store.editing_message_id(), None);
}

#[test]
fn test_edit_prunes_replies_but_keeps_branches_on_edited_node() {
    let (mut store, ex) = exchange_store();
    let on_question = store.create_branch(&ex.question, "Hi", None, None).unwrap().node;
    let inside = store.add_message(NewMessage::user("tell me more"), None).unwrap().node;
    let on_answer = store.create_branch(&ex.answer, "there", None, None).unwrap().node;
    store.select_branch(&ex.answer);
    let follow_up = store.add_message(NewMessage::user("Next"), None).unwrap().node;

    assert!(store.save_edited_message(&ex.question, "Hello?"));

    assert_eq!(store.get(&ex.question).unwrap().content, "Hello?");
    for gone in [&ex.answer, &on_answer.id, &follow_up.id] {
        assert!(store.get(gone).is_none(), "{} should be pruned", gone);
    }
    assert!(store.get(&on_question.id).is_some());
    assert!(store.get(&inside.id).is_some());
    assert_eq!(store.active_message_id(), Some(&ex.question));
    assert_eq!(store.editing_message_id(), None);
    assert!(store.conversation().unwrap().validate().is_ok());
}

#[test]
fn test_edit_of_leaf_prunes_nothing() {
    let (mut store, _) = exchange_store();
    let leaf = store.add_message(NewMessage::user("last"), None).unwrap().node;
    let count = store.messages().unwrap().len();

    assert!(store.save_edited_message(&leaf.id, "final"));
    assert_eq!(store.messages().unwrap().len(), count);
}

// ============================================================================
// End-to-end
// ============================================================================

/// Root, exchange, branch, a branch exchange, back to main, edit.
#[test]
fn test_branching_conversation_lifecycle() {
    let (mut store, ex) = exchange_store();

    let branch = store.create_branch(&ex.answer, "there", None, None).unwrap().node;
    let branch_q = store.add_message(NewMessage::user("Where?"), None).unwrap().node;
    let branch_a = store
        .add_message(NewMessage::assistant("Over there."), None)
        .unwrap()
        .node;
    assert_eq!(
        store.current_path_ids(),
        &[
            ex.root.clone(),
            ex.question.clone(),
            ex.answer.clone(),
            branch.id.clone(),
            branch_q.id.clone(),
            branch_a.id.clone()
        ]
    );

    let request = path::request_path(store.messages().unwrap(), &branch_q.id);
    let roles: Vec<Role> = request.iter().map(|n| n.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User, Role::User]);
    assert!(request[2].is_context_message());
    assert!(request[2].content.contains("> there"));

    let latest = store.latest_message_id().unwrap();
    assert_eq!(latest, ex.answer);
    store.select_branch(&latest);
    let main_q = store.add_message(NewMessage::user("Thanks"), None).unwrap().node;
    assert_eq!(main_q.parent_id.as_ref(), Some(&ex.answer));

    assert!(store.save_edited_message(&ex.question, "Hey"));
    assert_eq!(store.messages().unwrap().len(), 2);
}
