//! Concurrent transactions, snapshots and operation contexts.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]

use std::{
    sync::{Arc, Barrier},
    thread,
    time::{Duration, Instant},
};

use arbor_storage::{
    AdminError, AdminStorage, AdminTx, InMemoryBackend, OperationContext, ReadOnlyAdminTx,
    TreeStorage, TxStatus, UpdateStage,
};
use arbor_test_utils::fixtures;
use arbor_types::{ErrorCode, Tree, TreeId, TreeUpdate};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn open() -> TreeStorage<InMemoryBackend> {
    TreeStorage::open_in_memory(fixtures::key_resolver()).unwrap()
}

fn create(storage: &TreeStorage<InMemoryBackend>, tree: &Tree) -> Tree {
    let mut tx = storage.begin(&OperationContext::background()).unwrap();
    let created = tx.create_tree(tree).unwrap();
    tx.commit().unwrap();
    created
}

/// Renames `tree_id`, retrying on conflicts. Returns the number of attempts.
fn rename_with_retry(storage: &TreeStorage<InMemoryBackend>, tree_id: TreeId, name: &str) -> u32 {
    let update = TreeUpdate::builder().display_name(name).build();
    let mut attempts = 0;
    loop {
        attempts += 1;
        let mut tx = storage.begin(&OperationContext::background()).unwrap();
        tx.update_tree(tree_id, &update).unwrap();
        match tx.commit() {
            Ok(()) => return attempts,
            Err(e) => {
                assert_eq!(e.code(), ErrorCode::Aborted, "unexpected commit failure: {e}");
                assert!(e.is_retryable());
            },
        }
    }
}

#[test]
fn test_concurrent_creates_get_unique_ids() {
    init_tracing();
    let storage = Arc::new(open());
    let threads = 8;
    let per_thread = 16;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let storage = Arc::clone(&storage);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (0..per_thread).map(|_| create(&storage, &fixtures::log_tree()).tree_id).collect::<Vec<_>>()
            })
        })
        .collect();

    let mut ids: Vec<TreeId> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), threads * per_thread);

    let mut snapshot = storage.snapshot(&OperationContext::background()).unwrap();
    assert_eq!(snapshot.list_tree_ids(false).unwrap(), ids);
    snapshot.close().unwrap();
    assert_eq!(storage.commit_sequence(), (threads * per_thread) as u64);
}

#[test]
fn test_conflicting_updates_retry_until_applied() {
    init_tracing();
    let storage = Arc::new(open());
    let tree_id = create(&storage, &fixtures::log_tree()).tree_id;
    let threads = 4;
    let rounds = 10;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let storage = Arc::clone(&storage);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for round in 0..rounds {
                    rename_with_retry(&storage, tree_id, &format!("t{t} r{round}"));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // One creation plus every rename, each applied exactly once.
    assert_eq!(storage.commit_sequence(), 1 + (threads * rounds) as u64);
}

#[test]
fn test_interleaved_update_conflict_is_aborted() {
    let storage = open();
    let tree = create(&storage, &fixtures::log_tree());
    let ctx = OperationContext::background();

    let mut slow = storage.begin(&ctx).unwrap();
    slow.update_tree(tree.tree_id, &TreeUpdate::builder().display_name("slow").build()).unwrap();

    let attempts = rename_with_retry(&storage, tree.tree_id, "fast");
    assert_eq!(attempts, 1);

    let err = slow.commit().unwrap_err();
    assert!(matches!(err, AdminError::Conflict { tree_id } if tree_id == tree.tree_id), "{err}");
    assert_eq!(err.code(), ErrorCode::Aborted);
    assert_eq!(slow.status(), TxStatus::RolledBack);

    let mut snapshot = storage.snapshot(&ctx).unwrap();
    assert_eq!(snapshot.get_tree(tree.tree_id).unwrap().display_name, "fast");
    snapshot.close().unwrap();
}

#[test]
fn test_snapshot_is_stable_while_writers_commit() {
    let storage = Arc::new(open());
    let seeded = create(&storage, &fixtures::log_tree());

    let mut snapshot = storage.snapshot(&OperationContext::background()).unwrap();

    let writer = {
        let storage = Arc::clone(&storage);
        thread::spawn(move || {
            for _ in 0..20 {
                create(&storage, &fixtures::map_tree());
            }
        })
    };
    writer.join().unwrap();

    assert_eq!(snapshot.list_tree_ids(true).unwrap(), vec![seeded.tree_id]);
    assert_eq!(snapshot.list_trees(true).unwrap(), vec![seeded]);
    snapshot.commit().unwrap();
    assert!(snapshot.is_closed());
    assert_eq!(storage.commit_sequence(), 21);
}

#[test]
fn test_deadline_expiry_rolls_back() {
    let storage = open();
    let ctx = OperationContext::with_timeout(Duration::from_millis(20));

    let mut tx = storage.begin(&ctx).unwrap();
    let staged = tx.create_tree(&fixtures::log_tree()).unwrap();
    thread::sleep(Duration::from_millis(40));

    let err = tx.update_tree(staged.tree_id, &TreeUpdate::default()).unwrap_err();
    assert_eq!(err.stage(), UpdateStage::Lookup);
    assert_eq!(err.code(), ErrorCode::DeadlineExceeded);

    let err = tx.commit().unwrap_err();
    assert_eq!(err.code(), ErrorCode::DeadlineExceeded);
    assert!(tx.is_closed());
    assert_eq!(storage.commit_sequence(), 0);

    let err = storage.begin(&ctx).err().expect("expired context");
    assert!(matches!(err, AdminError::DeadlineExceeded));
}

#[test]
fn test_cancellation_from_another_thread() {
    let storage = open();
    let ctx = OperationContext::with_deadline(Instant::now() + Duration::from_secs(60));
    let mut tx = storage.begin(&ctx).unwrap();
    tx.create_tree(&fixtures::log_tree()).unwrap();

    let canceller = ctx.clone();
    thread::spawn(move || canceller.cancel()).join().unwrap();
    assert!(ctx.is_cancelled());

    let err = tx.list_tree_ids(true).unwrap_err();
    assert!(matches!(err, AdminError::Cancelled));
    assert_eq!(err.code(), ErrorCode::Cancelled);
    assert!(tx.commit().is_err());
    assert_eq!(tx.status(), TxStatus::RolledBack);
    assert_eq!(storage.commit_sequence(), 0);

    let err = storage.snapshot(&ctx).err().expect("cancelled context");
    assert!(matches!(err, AdminError::Cancelled));
}
