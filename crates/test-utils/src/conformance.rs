//! Conformance suite for [`AdminStorage`] implementations.
//!
//! Every backend must pass [`AdminStorageTester::run_all_tests`]. The stores
//! under test must be built with [`fixtures::key_resolver`] so that
//! equivalent key wrappings resolve to the same material.
//!
//! ```no_run
//! use arbor_storage::TreeStorage;
//! use arbor_test_utils::{AdminStorageTester, fixtures};
//!
//! AdminStorageTester::new(|| {
//!     TreeStorage::open_in_memory(fixtures::key_resolver()).expect("open store")
//! })
//! .run_all_tests();
//! ```

// Assertion helpers panic by design.
#![allow(clippy::expect_used, clippy::panic)]

use arbor_storage::{
    AdminError, AdminStorage, AdminTx, OperationContext, ReadOnlyAdminTx, UpdateStage,
    UpdateTreeError,
};
use arbor_types::{ErrorCode, Tree, TreeId, TreeState, TreeType, TreeUpdate};

use crate::fixtures;

/// Id that no conformance test ever creates.
const UNKNOWN_TREE_ID: TreeId = TreeId::new(12345);

/// How [`AdminStorageTester`] should prepare a tree.
#[derive(Debug, Clone)]
pub struct TreeSpec {
    /// Creation input.
    pub tree: Tree,
    /// Freeze the tree after creating it.
    pub frozen: bool,
    /// Soft-delete the tree after creating (and possibly freezing) it.
    pub deleted: bool,
}

impl TreeSpec {
    /// An active, undeleted copy of `tree`.
    pub fn active(tree: Tree) -> Self {
        Self { tree, frozen: false, deleted: false }
    }

    /// Marks the tree to be frozen.
    #[must_use]
    pub fn frozen(mut self) -> Self {
        self.frozen = true;
        self
    }

    /// Marks the tree to be soft-deleted.
    #[must_use]
    pub fn deleted(mut self) -> Self {
        self.deleted = true;
        self
    }
}

/// Runs the admin storage conformance tests against fresh stores.
///
/// `new_storage` is called once per test and must return an empty store.
pub struct AdminStorageTester<F> {
    new_storage: F,
}

impl<S, F> AdminStorageTester<F>
where
    S: AdminStorage,
    F: Fn() -> S,
{
    /// Creates a tester over the given store factory.
    pub fn new(new_storage: F) -> Self {
        Self { new_storage }
    }

    /// Runs every conformance test, panicking on the first failure.
    pub fn run_all_tests(&self) {
        self.test_create_tree();
        self.test_update_tree();
        self.test_list_trees();
        self.test_soft_delete_tree();
        self.test_soft_delete_tree_errors();
        self.test_hard_delete_tree();
        self.test_hard_delete_tree_errors();
        self.test_undelete_tree();
        self.test_undelete_tree_errors();
        self.test_admin_tx_close();
        self.test_snapshot_isolation();
        self.test_delete_lifecycle();
        self.test_private_key_rewrap();
    }

    /// Creation assigns an id and equal timestamps, and rejects invalid input.
    pub fn test_create_tree(&self) {
        let storage = (self.new_storage)();

        let mut invalid = fixtures::log_tree();
        invalid.tree_type = TreeType::Unknown;
        let mut without_optionals = fixtures::log_tree();
        without_optionals.display_name.clear();
        without_optionals.description.clear();

        let cases = [
            ("invalid_tree", invalid, true),
            ("valid_log", fixtures::log_tree(), false),
            ("valid_map", fixtures::map_tree(), false),
            ("valid_without_optionals", without_optionals, false),
        ];

        for (desc, input, want_err) in cases {
            let mut tx = storage.begin(&background()).expect("begin");
            let created = tx.create_tree(&input);
            match (created, want_err) {
                (Err(e), true) => {
                    assert_eq!(e.code(), ErrorCode::InvalidArgument, "{desc}: {e}");
                    tx.close().expect("close");
                    continue;
                },
                (Err(e), false) => panic!("{desc}: create_tree() = {e}, want success"),
                (Ok(tree), true) => panic!("{desc}: create_tree() = {tree:?}, want error"),
                (Ok(created), false) => {
                    assert!(created.tree_id.is_assigned(), "{desc}: id not assigned");
                    assert!(created.create_time.is_some(), "{desc}: create_time unset");
                    assert_eq!(created.create_time, created.update_time, "{desc}");

                    let mut want = input.clone();
                    want.tree_id = created.tree_id;
                    want.create_time = created.create_time;
                    want.update_time = created.update_time;
                    assert!(want.eq_ignoring_storage_settings(&created), "{desc}: {created:?}");

                    tx.commit().expect("commit");
                    tx.close().expect("close");
                    assert_stored_tree(&storage, &created, desc);
                },
            }
        }
    }

    /// Updates change mutable fields only and keep unrelated trees intact.
    pub fn test_update_tree(&self) {
        let storage = (self.new_storage)();
        let unrelated = make_tree(&storage, &TreeSpec::active(fixtures::map_tree()));

        let failure = update_tree(&storage, TreeId::new(-1), &TreeUpdate::default())
            .expect("begin and commit");
        let err = failure.expect_err("update of unknown tree");
        assert_eq!(err.stage(), UpdateStage::Lookup, "unknown id: {err}");
        assert_eq!(err.code(), ErrorCode::NotFound);

        let reference_log = fixtures::log_tree();
        let reference_map = fixtures::map_tree();

        let valid_log = TreeUpdate::builder()
            .tree_state(TreeState::Frozen)
            .display_name("Frozen Tree")
            .description("A Frozen Tree")
            .build();
        let without_optionals = TreeUpdate::builder().display_name("").description("").build();
        let invalid_state = TreeUpdate::builder().tree_state(TreeState::Unknown).build();
        let read_only_changed = TreeUpdate::builder().tree_type(TreeType::Map).build();
        let valid_map = TreeUpdate::builder().display_name("Updated Map").build();
        let same_material_reference =
            TreeUpdate::builder().private_key(fixtures::log_key_reference()).build();
        let same_material_der = TreeUpdate::builder()
            .private_key(fixtures::pkcs8_der_key(fixtures::LOG_KEY_SEED))
            .build();
        let different_material = TreeUpdate::builder()
            .private_key(fixtures::raw_key(fixtures::MAP_KEY_SEED))
            .build();

        let cases = [
            ("valid_log", &reference_log, valid_log, false),
            ("valid_log_without_optionals", &reference_log, without_optionals, false),
            ("invalid_log", &reference_log, invalid_state, true),
            ("read_only_changed", &reference_log, read_only_changed, true),
            ("valid_map", &reference_map, valid_map, false),
            ("private_key_reference_same_material", &reference_log, same_material_reference, false),
            ("private_key_der_same_material", &reference_log, same_material_der, false),
            ("private_key_different_material", &reference_log, different_material, true),
        ];

        for (desc, create, update, want_err) in cases {
            let created = create_tree(&storage, create)
                .unwrap_or_else(|e| panic!("{desc}: create_tree() = {e}"));
            let outcome = update_tree(&storage, created.tree_id, &update)
                .unwrap_or_else(|e| panic!("{desc}: non-update failure: {e}"));

            match (outcome, want_err) {
                (Err(e), true) => {
                    assert_eq!(e.stage(), UpdateStage::Update, "{desc}: {e}");
                    assert_eq!(e.code(), ErrorCode::InvalidArgument, "{desc}: {e}");
                    assert!(!e.is_retryable(), "{desc}: rejection must be final");
                    assert_stored_tree(&storage, &created, desc);
                },
                (Err(e), false) => panic!("{desc}: update_tree() = {e}, want success"),
                (Ok(tree), true) => panic!("{desc}: update_tree() = {tree:?}, want error"),
                (Ok(updated), false) => {
                    assert_eq!(updated.tree_id, created.tree_id, "{desc}");
                    assert_eq!(updated.create_time, created.create_time, "{desc}");
                    assert!(updated.update_time >= created.update_time, "{desc}");

                    let mut want = update.apply_to(create);
                    want.tree_id = updated.tree_id;
                    want.create_time = updated.create_time;
                    want.update_time = updated.update_time;
                    assert!(want.eq_ignoring_storage_settings(&updated), "{desc}: {updated:?}");

                    assert_stored_tree(&storage, &updated, desc);
                },
            }
            assert_stored_tree(&storage, &unrelated, desc);
        }
    }

    /// Listing filters soft-deleted trees unless asked not to.
    pub fn test_list_trees(&self) {
        let storage = (self.new_storage)();

        assert_listing(&storage, "empty", false, &[]);
        assert_listing(&storage, "empty_deleted", true, &[]);

        let active_log = make_tree(&storage, &TreeSpec::active(fixtures::log_tree()));
        let frozen_log = make_tree(&storage, &TreeSpec::active(fixtures::log_tree()).frozen());
        let deleted_log = make_tree(&storage, &TreeSpec::active(fixtures::log_tree()).deleted());
        let active_map = make_tree(&storage, &TreeSpec::active(fixtures::map_tree()));

        assert_listing(&storage, "multiple_trees", false, &[
            active_log.clone(),
            frozen_log.clone(),
            active_map.clone(),
        ]);
        assert_listing(&storage, "multiple_trees_deleted", true, &[
            active_log,
            frozen_log,
            deleted_log,
            active_map,
        ]);
    }

    /// Soft-delete sets the flag and time and changes nothing else.
    pub fn test_soft_delete_tree(&self) {
        let storage = (self.new_storage)();
        let log = make_tree(&storage, &TreeSpec::active(fixtures::log_tree()));
        let map = make_tree(&storage, &TreeSpec::active(fixtures::map_tree()));

        for (desc, tree) in [("log_tree", log), ("map_tree", map)] {
            let deleted = soft_delete_tree(&storage, tree.tree_id)
                .unwrap_or_else(|e| panic!("{desc}: soft_delete_tree() = {e}"));
            assert!(deleted.delete_time.is_some(), "{desc}: delete_time unset");

            let mut want = tree.clone();
            want.deleted = true;
            want.delete_time = deleted.delete_time;
            assert_eq!(deleted, want, "{desc}");
            assert_stored_tree(&storage, &deleted, desc);
        }
    }

    /// Soft-delete fails for unknown and already deleted trees.
    pub fn test_soft_delete_tree_errors(&self) {
        let storage = (self.new_storage)();
        let soft_deleted = make_tree(&storage, &TreeSpec::active(fixtures::log_tree()).deleted());

        let cases = [
            ("unknown_tree", UNKNOWN_TREE_ID, ErrorCode::NotFound),
            ("already_deleted", soft_deleted.tree_id, ErrorCode::FailedPrecondition),
        ];
        for (desc, tree_id, want) in cases {
            let err = soft_delete_tree(&storage, tree_id).expect_err(desc);
            assert_eq!(err.code(), want, "{desc}: {err}");
        }
        assert_stored_tree(&storage, &soft_deleted, "already_deleted");
    }

    /// Soft-deleted trees can be purged whatever their state.
    pub fn test_hard_delete_tree(&self) {
        let storage = (self.new_storage)();
        let log = make_tree(&storage, &TreeSpec::active(fixtures::log_tree()).deleted());
        let frozen = make_tree(&storage, &TreeSpec::active(fixtures::log_tree()).frozen().deleted());
        let map = make_tree(&storage, &TreeSpec::active(fixtures::map_tree()).deleted());

        for (desc, tree_id) in
            [("log_tree", log.tree_id), ("frozen_tree", frozen.tree_id), ("map_tree", map.tree_id)]
        {
            hard_delete_tree(&storage, tree_id)
                .unwrap_or_else(|e| panic!("{desc}: hard_delete_tree() = {e}"));
            let err = get_tree(&storage, tree_id).expect_err(desc);
            assert_eq!(err.code(), ErrorCode::NotFound, "{desc}: {err}");
        }
    }

    /// Hard-delete fails for unknown and active trees.
    pub fn test_hard_delete_tree_errors(&self) {
        let storage = (self.new_storage)();
        let active = make_tree(&storage, &TreeSpec::active(fixtures::log_tree()));

        let cases = [
            ("unknown_tree", UNKNOWN_TREE_ID, ErrorCode::NotFound),
            ("active_tree", active.tree_id, ErrorCode::FailedPrecondition),
        ];
        for (desc, tree_id, want) in cases {
            let err = hard_delete_tree(&storage, tree_id).expect_err(desc);
            assert_eq!(err.code(), want, "{desc}: {err}");
        }
        assert_stored_tree(&storage, &active, "active_tree");
    }

    /// Undelete restores the tree exactly as it was before soft-delete.
    pub fn test_undelete_tree(&self) {
        let storage = (self.new_storage)();
        let active = make_tree(&storage, &TreeSpec::active(fixtures::log_tree()).deleted());
        let frozen = make_tree(&storage, &TreeSpec::active(fixtures::log_tree()).frozen().deleted());

        for (desc, tree) in [("active_tree", active), ("frozen_tree", frozen)] {
            let restored = undelete_tree(&storage, tree.tree_id)
                .unwrap_or_else(|e| panic!("{desc}: undelete_tree() = {e}"));

            let mut want = tree.clone();
            want.deleted = false;
            want.delete_time = None;
            assert_eq!(restored, want, "{desc}");
            assert_stored_tree(&storage, &restored, desc);
        }
    }

    /// Undelete fails for unknown and undeleted trees.
    pub fn test_undelete_tree_errors(&self) {
        let storage = (self.new_storage)();
        let active = make_tree(&storage, &TreeSpec::active(fixtures::log_tree()));

        let cases = [
            ("unknown_tree", UNKNOWN_TREE_ID, ErrorCode::NotFound),
            ("active_tree", active.tree_id, ErrorCode::FailedPrecondition),
        ];
        for (desc, tree_id, want) in cases {
            let err = undelete_tree(&storage, tree_id).expect_err(desc);
            assert_eq!(err.code(), want, "{desc}: {err}");
        }
    }

    /// Closing without commit rolls back; closing twice is harmless.
    pub fn test_admin_tx_close(&self) {
        #[derive(Debug, Clone, Copy)]
        enum Finish {
            Commit,
            Rollback,
            CloseOnly,
        }

        let storage = (self.new_storage)();
        for finish in [Finish::Commit, Finish::Rollback, Finish::CloseOnly] {
            let mut tx = storage.begin(&background()).expect("begin");
            let tree = tx.create_tree(&fixtures::log_tree()).expect("create_tree");

            match finish {
                Finish::Commit => tx.commit().expect("commit"),
                Finish::Rollback => tx.rollback().expect("rollback"),
                Finish::CloseOnly => {},
            }
            tx.close().expect("close");
            assert!(tx.is_closed(), "{finish:?}: transaction still open after close");

            let want_rollback = !matches!(finish, Finish::Commit);
            let found = get_tree(&storage, tree.tree_id);
            assert_eq!(found.is_err(), want_rollback, "{finish:?}: get_tree() = {found:?}");
            if let Err(e) = found {
                assert_eq!(e.code(), ErrorCode::NotFound, "{finish:?}");
            }

            tx.close().expect("second close");
            let err = tx.list_tree_ids(true).expect_err("closed transaction must reject reads");
            assert!(matches!(err, AdminError::TransactionFinished { .. }), "{finish:?}: {err}");
            assert_eq!(err.code(), ErrorCode::FailedPrecondition);
        }
    }

    /// Snapshots never see uncommitted writes, nor commits made after they
    /// were opened.
    pub fn test_snapshot_isolation(&self) {
        let storage = (self.new_storage)();
        let existing = make_tree(&storage, &TreeSpec::active(fixtures::log_tree()));

        let mut writer = storage.begin(&background()).expect("begin");
        let staged = writer.create_tree(&fixtures::map_tree()).expect("create_tree");
        writer.soft_delete_tree(existing.tree_id).expect("soft_delete_tree");
        assert_eq!(writer.list_tree_ids(false).expect("list"), vec![staged.tree_id]);

        let mut before = storage.snapshot(&background()).expect("snapshot");
        assert_eq!(before.list_tree_ids(true).expect("list"), vec![existing.tree_id]);
        assert_eq!(
            before.get_tree(staged.tree_id).expect_err("uncommitted tree").code(),
            ErrorCode::NotFound
        );

        writer.commit().expect("commit");
        writer.close().expect("close");

        assert_eq!(before.get_tree(existing.tree_id).expect("get_tree"), existing);
        before.commit().expect("snapshot commit");
        before.close().expect("snapshot close");

        let mut after = storage.snapshot(&background()).expect("snapshot");
        assert_eq!(after.list_tree_ids(false).expect("list"), vec![staged.tree_id]);
        let mut both = vec![existing.tree_id, staged.tree_id];
        both.sort();
        assert_eq!(after.list_tree_ids(true).expect("list"), both);
        after.close().expect("snapshot close");
    }

    /// Soft-delete, listing and hard-delete of one tree among two.
    pub fn test_delete_lifecycle(&self) {
        let storage = (self.new_storage)();
        let t1 = make_tree(&storage, &TreeSpec::active(fixtures::log_tree()));
        let t2 = make_tree(&storage, &TreeSpec::active(fixtures::map_tree()));

        soft_delete_tree(&storage, t1.tree_id).expect("soft_delete_tree(t1)");

        let mut snapshot = storage.snapshot(&background()).expect("snapshot");
        assert_eq!(snapshot.list_tree_ids(false).expect("list"), vec![t2.tree_id]);
        let mut both = vec![t1.tree_id, t2.tree_id];
        both.sort();
        assert_eq!(snapshot.list_tree_ids(true).expect("list"), both);
        snapshot.close().expect("close");

        let err = hard_delete_tree(&storage, t2.tree_id).expect_err("t2 is active");
        assert_eq!(err.code(), ErrorCode::FailedPrecondition, "{err}");

        hard_delete_tree(&storage, t1.tree_id).expect("hard_delete_tree(t1)");
        let err = get_tree(&storage, t1.tree_id).expect_err("t1 was purged");
        assert_eq!(err.code(), ErrorCode::NotFound, "{err}");
        assert_stored_tree(&storage, &t2, "t2 survives");
    }

    /// Rewrapping the private key keeps the signing capability.
    pub fn test_private_key_rewrap(&self) {
        let storage = (self.new_storage)();
        let created = make_tree(&storage, &TreeSpec::active(fixtures::log_tree()));
        let resolver = fixtures::key_resolver();

        let rewrap = TreeUpdate::builder()
            .private_key(fixtures::pkcs8_der_key(fixtures::LOG_KEY_SEED))
            .build();
        let updated = update_tree(&storage, created.tree_id, &rewrap)
            .expect("begin and commit")
            .expect("rewrap to same material");
        assert!(updated.update_time >= created.update_time);
        assert_eq!(updated.private_key, rewrap.private_key);

        let stored = get_tree(&storage, created.tree_id).expect("get_tree");
        let signer = resolver
            .resolve(stored.private_key.as_ref().expect("private key"))
            .expect("resolve stored key");
        assert_eq!(Some(signer.public_key()), created.public_key);

        let replace = TreeUpdate::builder()
            .private_key(fixtures::pkcs8_der_key(fixtures::MAP_KEY_SEED))
            .build();
        let err = update_tree(&storage, created.tree_id, &replace)
            .expect("begin and commit")
            .expect_err("different key material");
        assert!(matches!(err, UpdateTreeError::Rejected { .. }), "{err}");
        assert_stored_tree(&storage, &stored, "after rejected key change");
    }
}

fn background() -> OperationContext {
    OperationContext::background()
}

/// Creates `tree` in its own transaction.
fn create_tree<S: AdminStorage>(storage: &S, tree: &Tree) -> Result<Tree, AdminError> {
    let mut tx = storage.begin(&background())?;
    let outcome = tx.create_tree(tree).and_then(|created| tx.commit().map(|()| created));
    tx.close()?;
    outcome
}

/// Updates a tree in its own transaction.
///
/// The outer error reports failures outside `update_tree` itself.
fn update_tree<S: AdminStorage>(
    storage: &S,
    tree_id: TreeId,
    update: &TreeUpdate,
) -> Result<Result<Tree, UpdateTreeError>, AdminError> {
    let mut tx = storage.begin(&background())?;
    let updated = match tx.update_tree(tree_id, update) {
        Ok(tree) => tree,
        Err(e) => {
            tx.close()?;
            return Ok(Err(e));
        },
    };
    let committed = tx.commit();
    tx.close()?;
    committed.map(|()| Ok(updated))
}

fn get_tree<S: AdminStorage>(storage: &S, tree_id: TreeId) -> Result<Tree, AdminError> {
    let mut tx = storage.snapshot(&background())?;
    let outcome = tx.get_tree(tree_id).and_then(|tree| tx.commit().map(|()| tree));
    tx.close()?;
    outcome
}

fn soft_delete_tree<S: AdminStorage>(storage: &S, tree_id: TreeId) -> Result<Tree, AdminError> {
    let mut tx = storage.begin(&background())?;
    let outcome = tx.soft_delete_tree(tree_id).and_then(|tree| tx.commit().map(|()| tree));
    tx.close()?;
    outcome
}

fn hard_delete_tree<S: AdminStorage>(storage: &S, tree_id: TreeId) -> Result<(), AdminError> {
    let mut tx = storage.begin(&background())?;
    let outcome = tx.hard_delete_tree(tree_id).and_then(|()| tx.commit());
    tx.close()?;
    outcome
}

fn undelete_tree<S: AdminStorage>(storage: &S, tree_id: TreeId) -> Result<Tree, AdminError> {
    let mut tx = storage.begin(&background())?;
    let outcome = tx.undelete_tree(tree_id).and_then(|tree| tx.commit().map(|()| tree));
    tx.close()?;
    outcome
}

/// Creates, freezes and soft-deletes a tree as `spec` asks.
fn make_tree<S: AdminStorage>(storage: &S, spec: &TreeSpec) -> Tree {
    let mut tree = create_tree(storage, &spec.tree).expect("make_tree: create_tree");

    if spec.frozen {
        let freeze = TreeUpdate::builder().tree_state(TreeState::Frozen).build();
        tree = update_tree(storage, tree.tree_id, &freeze)
            .expect("make_tree: begin and commit")
            .expect("make_tree: freeze");
        assert_eq!(tree.tree_state, TreeState::Frozen);
    }
    if spec.deleted {
        tree = soft_delete_tree(storage, tree.tree_id).expect("make_tree: soft_delete_tree");
    }
    assert_eq!(tree.deleted, spec.deleted, "make_tree: deleted flag");
    tree
}

fn assert_stored_tree<S: AdminStorage>(storage: &S, want: &Tree, desc: &str) {
    let got = get_tree(storage, want.tree_id)
        .unwrap_or_else(|e| panic!("{desc}: get_tree({}) = {e}", want.tree_id));
    assert!(got.eq_ignoring_storage_settings(want), "{desc}: stored {got:?}, want {want:?}");
}

fn assert_listing<S: AdminStorage>(storage: &S, desc: &str, include_deleted: bool, want: &[Tree]) {
    let mut want = want.to_vec();
    want.sort_by_key(|tree| tree.tree_id);
    let want_ids: Vec<TreeId> = want.iter().map(|tree| tree.tree_id).collect();

    let mut tx = storage.snapshot(&background()).expect("snapshot");
    let ids = tx.list_tree_ids(include_deleted).expect("list_tree_ids");
    assert_eq!(ids, want_ids, "{desc}: list_tree_ids({include_deleted})");

    let trees = tx.list_trees(include_deleted).expect("list_trees");
    assert_eq!(trees.len(), want.len(), "{desc}: list_trees({include_deleted}) length");
    for (got, want) in trees.iter().zip(&want) {
        assert!(got.eq_ignoring_storage_settings(want), "{desc}: listed {got:?}, want {want:?}");
    }

    tx.commit().expect("snapshot commit");
    tx.close().expect("snapshot close");
}
