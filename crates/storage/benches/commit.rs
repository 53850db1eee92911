//! Admin store commit benchmarks.
//!
//! The commit path re-encodes and rewrites the whole image, so cost grows
//! with the number of stored trees. These benchmarks track that growth for
//! both backends and the cost of snapshot reads.

#![allow(clippy::expect_used, missing_docs)]

use std::{hint::black_box, time::Duration};

use arbor_storage::{
    AdminStorage, AdminTx, FileBackend, InMemoryBackend, OperationContext, ReadOnlyAdminTx,
    StorageBackend, TreeStorage,
};
use arbor_test_utils::{TestDir, fixtures};
use arbor_types::{TreeId, TreeUpdate, config::StorageConfig};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

// =============================================================================
// Helpers
// =============================================================================

/// Creates `count` trees in batches of 100 and returns their ids.
fn populate<B: StorageBackend>(storage: &TreeStorage<B>, count: usize) -> Vec<TreeId> {
    let ctx = OperationContext::background();
    let mut ids = Vec::with_capacity(count);
    for batch_start in (0..count).step_by(100) {
        let mut tx = storage.begin(&ctx).expect("begin");
        for _ in batch_start..(batch_start + 100).min(count) {
            ids.push(tx.create_tree(&fixtures::log_tree()).expect("create_tree").tree_id);
        }
        tx.commit().expect("commit");
    }
    ids
}

// =============================================================================
// Commits
// =============================================================================

/// Single-tree create+commit against stores of growing size.
fn bench_create_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("admin/create_commit");
    group.throughput(Throughput::Elements(1));

    for tree_count in [0, 100, 1_000] {
        let storage =
            TreeStorage::open_in_memory(fixtures::key_resolver()).expect("open in-memory store");
        populate(&storage, tree_count);

        group.bench_with_input(BenchmarkId::new("memory", tree_count), &tree_count, |b, _| {
            let ctx = OperationContext::background();
            b.iter(|| {
                let mut tx = storage.begin(&ctx).expect("begin");
                let tree = tx.create_tree(&fixtures::map_tree()).expect("create_tree");
                tx.commit().expect("commit");
                black_box(tree)
            });
        });
    }

    for tree_count in [0, 100] {
        let dir = TestDir::new();
        let config = StorageConfig::builder().sync_on_commit(false).build().expect("config");
        let storage: TreeStorage<FileBackend> =
            TreeStorage::open(dir.image_path(), config, fixtures::key_resolver())
                .expect("open file store");
        populate(&storage, tree_count);

        group.bench_with_input(BenchmarkId::new("file_nosync", tree_count), &tree_count, |b, _| {
            let ctx = OperationContext::background();
            b.iter(|| {
                let mut tx = storage.begin(&ctx).expect("begin");
                let tree = tx.create_tree(&fixtures::map_tree()).expect("create_tree");
                tx.commit().expect("commit");
                black_box(tree)
            });
        });
    }

    group.finish();
}

/// Update of an existing tree, including private-key equivalence checks.
fn bench_update_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("admin/update_commit");
    group.throughput(Throughput::Elements(1));

    let storage =
        TreeStorage::open_in_memory(fixtures::key_resolver()).expect("open in-memory store");
    let ids = populate(&storage, 100);
    let ctx = OperationContext::background();

    let rename = TreeUpdate::builder().display_name("renamed").build();
    let rewrap = TreeUpdate::builder()
        .private_key(fixtures::pkcs8_der_key(fixtures::LOG_KEY_SEED))
        .build();

    for (name, update) in [("rename", rename), ("rewrap_key", rewrap)] {
        group.bench_function(name, |b| {
            let mut next = 0usize;
            b.iter(|| {
                next = (next + 1) % ids.len();
                let mut tx = storage.begin(&ctx).expect("begin");
                let tree = tx.update_tree(ids[next], &update).expect("update_tree");
                tx.commit().expect("commit");
                black_box(tree)
            });
        });
    }

    group.finish();
}

// =============================================================================
// Reads
// =============================================================================

/// Snapshot listing at various store sizes.
fn bench_snapshot_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("admin/snapshot_list");

    for tree_count in [100, 1_000] {
        let storage = TreeStorage::builder()
            .backend(InMemoryBackend::new())
            .resolver(fixtures::key_resolver())
            .build()
            .expect("open in-memory store");
        populate(&storage, tree_count);
        group.throughput(Throughput::Elements(tree_count as u64));

        group.bench_with_input(BenchmarkId::from_parameter(tree_count), &tree_count, |b, _| {
            let ctx = OperationContext::background();
            b.iter(|| {
                let mut snapshot = storage.snapshot(&ctx).expect("snapshot");
                let trees = snapshot.list_trees(true).expect("list_trees");
                snapshot.close().expect("close");
                black_box(trees)
            });
        });
    }

    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default().measurement_time(Duration::from_secs(5));
    targets = bench_create_commit, bench_update_commit, bench_snapshot_list
}
criterion_main!(benches);
