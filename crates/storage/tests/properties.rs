//! Property tests for the tree lifecycle invariants.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]

use arbor_storage::{
    AdminStorage, AdminTx, InMemoryBackend, OperationContext, ReadOnlyAdminTx, TreeStorage,
    UpdateStage,
};
use arbor_test_utils::{fixtures, strategies};
use arbor_types::{ErrorCode, Tree, TreeUpdate};
use proptest::prelude::*;

fn open() -> TreeStorage<InMemoryBackend> {
    TreeStorage::open_in_memory(fixtures::key_resolver()).unwrap()
}

fn create(storage: &TreeStorage<InMemoryBackend>, tree: &Tree) -> Tree {
    let mut tx = storage.begin(&OperationContext::background()).unwrap();
    let created = tx.create_tree(tree).unwrap();
    tx.commit().unwrap();
    created
}

fn stored(storage: &TreeStorage<InMemoryBackend>, tree: &Tree) -> Tree {
    let mut snapshot = storage.snapshot(&OperationContext::background()).unwrap();
    let stored = snapshot.get_tree(tree.tree_id).unwrap();
    snapshot.close().unwrap();
    stored
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Created trees come back exactly as returned by `create_tree`.
    #[test]
    fn prop_created_tree_is_stored_verbatim(tree in strategies::arb_tree()) {
        let storage = open();
        let created = create(&storage, &tree);

        prop_assert!(created.tree_id.is_assigned());
        prop_assert_eq!(created.create_time, created.update_time);
        prop_assert_eq!(&created.display_name, &tree.display_name);
        prop_assert_eq!(stored(&storage, &created), created);
    }

    /// Sequences of mutable updates never touch identity or creation time,
    /// and `update_time` never moves backwards.
    #[test]
    fn prop_updates_preserve_identity(
        tree in strategies::arb_tree(),
        updates in proptest::collection::vec(strategies::arb_tree_update(), 1..8),
    ) {
        let storage = open();
        let created = create(&storage, &tree);
        let mut previous = created.clone();

        for update in &updates {
            let mut tx = storage.begin(&OperationContext::background()).unwrap();
            let updated = tx.update_tree(created.tree_id, update).unwrap();
            tx.commit().unwrap();

            prop_assert_eq!(updated.tree_id, created.tree_id);
            prop_assert_eq!(updated.create_time, created.create_time);
            prop_assert_eq!(updated.tree_type, created.tree_type);
            prop_assert_eq!(&updated.public_key, &created.public_key);
            prop_assert!(updated.update_time >= previous.update_time);
            prop_assert!(updated.update_time >= updated.create_time);
            previous = updated;
        }
        prop_assert_eq!(stored(&storage, &created), previous);
    }

    /// Attempts to change a read-only field are rejected and leave the
    /// stored tree untouched.
    #[test]
    fn prop_read_only_changes_are_rejected(
        tree in strategies::arb_tree(),
        change in strategies::arb_read_only_change(),
        mutable in strategies::arb_tree_update(),
    ) {
        let storage = open();
        let created = create(&storage, &tree);

        // Mixing in valid mutable assignments must not smuggle the change through.
        let violating = change.violating_update(&created);
        let update = TreeUpdate {
            tree_state: mutable.tree_state,
            display_name: mutable.display_name,
            ..violating
        };

        let mut tx = storage.begin(&OperationContext::background()).unwrap();
        let err = tx.update_tree(created.tree_id, &update).unwrap_err();
        prop_assert_eq!(err.stage(), UpdateStage::Update);
        prop_assert_eq!(err.code(), ErrorCode::InvalidArgument);
        tx.commit().unwrap();

        prop_assert_eq!(stored(&storage, &created), created);
    }

    /// Names over the configured limit are rejected on update.
    #[test]
    fn prop_oversized_names_are_rejected(
        tree in strategies::arb_tree(),
        name in strategies::arb_oversized_display_name(),
    ) {
        let storage = open();
        let created = create(&storage, &tree);

        let mut tx = storage.begin(&OperationContext::background()).unwrap();
        let err = tx
            .update_tree(created.tree_id, &TreeUpdate::builder().display_name(name).build())
            .unwrap_err();
        prop_assert_eq!(err.code(), ErrorCode::InvalidArgument);
        tx.close().unwrap();

        prop_assert_eq!(stored(&storage, &created), created);
    }

    /// Soft-delete followed by undelete restores the tree exactly.
    #[test]
    fn prop_undelete_inverts_soft_delete(tree in strategies::arb_tree()) {
        let storage = open();
        let created = create(&storage, &tree);

        let mut tx = storage.begin(&OperationContext::background()).unwrap();
        let deleted = tx.soft_delete_tree(created.tree_id).unwrap();
        prop_assert!(deleted.deleted && deleted.delete_time.is_some());
        prop_assert!(tx.list_tree_ids(false).unwrap().is_empty());
        let restored = tx.undelete_tree(created.tree_id).unwrap();
        tx.commit().unwrap();

        prop_assert_eq!(&restored, &created);
        prop_assert_eq!(stored(&storage, &created), created);
    }
}
