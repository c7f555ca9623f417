//! Property tests: arbitrary operation sequences keep the tree well-formed.

use proptest::prelude::*;
use tangent::tree::{path, TreeStore};
use tangent::types::{MessageId, NewMessage, Role};

#[derive(Debug, Clone)]
enum Op {
    User(usize),
    Assistant(usize),
    Branch(usize, String),
    Select(usize),
    Edit(usize, String),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => any::<usize>().prop_map(Op::User),
        3 => any::<usize>().prop_map(Op::Assistant),
        2 => (any::<usize>(), "[a-z ]{0,8}").prop_map(|(i, s)| Op::Branch(i, s)),
        1 => any::<usize>().prop_map(Op::Select),
        1 => (any::<usize>(), "[a-z]{1,8}").prop_map(|(i, s)| Op::Edit(i, s)),
    ]
}

/// Node ids in creation order, so an index picks the same node every run.
fn ordered_ids(store: &TreeStore) -> Vec<MessageId> {
    let mut nodes: Vec<_> = store.messages().map(|m| m.values().collect()).unwrap_or_default();
    nodes.sort_by(|a, b| path::sibling_order(a, b));
    nodes.into_iter().map(|n| n.id.clone()).collect()
}

fn pick(store: &TreeStore, index: usize) -> MessageId {
    let ids = ordered_ids(store);
    ids[index % ids.len()].clone()
}

fn apply(store: &mut TreeStore, op: &Op) {
    match op {
        Op::User(i) => {
            let parent = pick(store, *i);
            store.add_message(NewMessage::user("question"), Some(&parent));
        }
        Op::Assistant(i) => {
            let parent = pick(store, *i);
            store.add_message(NewMessage::assistant("answer"), Some(&parent));
        }
        Op::Branch(i, text) => {
            let source = pick(store, *i);
            store.create_branch(&source, text, None, None);
        }
        Op::Select(i) => {
            let id = pick(store, *i);
            store.select_branch(&id);
        }
        Op::Edit(i, text) => {
            let id = pick(store, *i);
            store.save_edited_message(&id, text);
        }
    }
}

fn assert_well_formed(store: &TreeStore) {
    let conversation = store.conversation().unwrap();
    conversation.validate().unwrap();
    let messages = conversation.messages();
    let root = conversation.root_message_id();

    for node in messages.values() {
        let node_path = path::path_to_node(messages, Some(&node.id));
        assert_eq!(node_path.first().map(|n| &n.id), Some(root));
        assert_eq!(node_path.last().map(|n| &n.id), Some(&node.id));
        if let Some(anchor) = node.metadata.anchor() {
            assert!(!anchor.selected_text.is_empty());
        }

        let children = path::sorted_children(messages, &node.id);
        for pair in children.windows(2) {
            assert!(pair[0].created_at < pair[1].created_at);
        }
    }

    let active = store.active_message_id().unwrap();
    assert!(messages.contains_key(active));
    assert_eq!(store.current_path_ids(), path::path_ids(messages, Some(active)).as_slice());

    let main = path::main_thread_path(messages, root);
    assert!(main.iter().all(|n| !n.is_branch_start()));
    assert_eq!(main[0].id, *root);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_operations_keep_tree_well_formed(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let mut store = TreeStore::new();
        store.initialize("");
        for op in &ops {
            apply(&mut store, op);
            assert_well_formed(&store);
        }
    }

    #[test]
    fn prop_edit_keeps_node_and_its_ancestors(ops in prop::collection::vec(op_strategy(), 1..30), pick_index in any::<usize>()) {
        let mut store = TreeStore::new();
        store.initialize("");
        for op in &ops {
            apply(&mut store, op);
        }

        let users: Vec<MessageId> = ordered_ids(&store)
            .into_iter()
            .filter(|id| store.get(id).map(|n| n.role) == Some(Role::User))
            .collect();
        prop_assume!(!users.is_empty());
        let target = users[pick_index % users.len()].clone();
        let ancestors: Vec<MessageId> = store.path_to(&target).iter().map(|n| n.id.clone()).collect();

        prop_assert!(store.save_edited_message(&target, "edited"));
        for id in &ancestors {
            prop_assert!(store.get(id).is_some());
        }
        for child in store.children_of(&target) {
            prop_assert!(child.is_branch_start());
        }
    }
}
