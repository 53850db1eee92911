//! In-memory storage backend for testing.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use super::StorageBackend;
use crate::error::BackendError;

/// In-memory storage backend.
///
/// The image lives only as long as the backend. Writes can be made to fail
/// on demand to exercise commit error paths.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    /// Last written image.
    image: RwLock<Option<Vec<u8>>>,
    /// When set, every write fails with [`BackendError::Unavailable`].
    fail_writes: AtomicBool,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend holding `image`, as if it had been written earlier.
    pub fn with_image(image: Vec<u8>) -> Self {
        Self { image: RwLock::new(Some(image)), fail_writes: AtomicBool::new(false) }
    }

    /// Makes subsequent writes fail (`true`) or succeed (`false`).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Release);
    }

    /// Returns a copy of the stored image.
    pub fn image(&self) -> Option<Vec<u8>> {
        self.image.read().clone()
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_image(&self) -> Result<Option<Vec<u8>>, BackendError> {
        Ok(self.image.read().clone())
    }

    fn write_image(&self, image: &[u8]) -> Result<(), BackendError> {
        if self.fail_writes.load(Ordering::Acquire) {
            return Err(BackendError::Unavailable { reason: "injected write failure".to_string() });
        }
        *self.image.write() = Some(image.to_vec());
        Ok(())
    }
}
