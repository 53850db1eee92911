//! Runs the admin storage conformance suite against every provided backend.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]

use std::sync::atomic::{AtomicUsize, Ordering};

use arbor_storage::{InMemoryBackend, TreeStorage};
use arbor_test_utils::{AdminStorageTester, TestDir, fixtures};
use arbor_types::config::StorageConfig;

#[test]
fn test_in_memory_backend_conformance() {
    AdminStorageTester::new(|| {
        TreeStorage::builder()
            .backend(InMemoryBackend::new())
            .resolver(fixtures::key_resolver())
            .build()
            .expect("open in-memory store")
    })
    .run_all_tests();
}

#[test]
fn test_file_backend_conformance() {
    let dir = TestDir::new();
    let next = AtomicUsize::new(0);

    AdminStorageTester::new(|| {
        // Each test gets its own empty image.
        let n = next.fetch_add(1, Ordering::Relaxed);
        TreeStorage::open(
            dir.join(format!("store-{n}.img")),
            StorageConfig::default(),
            fixtures::key_resolver(),
        )
        .expect("open file store")
    })
    .run_all_tests();
}

#[test]
fn test_file_backend_conformance_without_sync() {
    let dir = TestDir::new();
    let next = AtomicUsize::new(0);
    let config = StorageConfig::builder().sync_on_commit(false).build().expect("valid config");

    AdminStorageTester::new(|| {
        let n = next.fetch_add(1, Ordering::Relaxed);
        TreeStorage::open(dir.join(format!("store-{n}.img")), config.clone(), fixtures::key_resolver())
            .expect("open file store")
    })
    .run_all_tests();
}
