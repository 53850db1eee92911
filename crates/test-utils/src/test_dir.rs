//! Temporary directories for file-backed stores.

// Test utilities are expected to panic on failure.
#![allow(clippy::expect_used)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A temporary directory removed when dropped.
///
/// # Example
///
/// ```
/// use arbor_test_utils::TestDir;
///
/// let dir = TestDir::new();
/// let image = dir.join("admin.img");
/// assert!(image.starts_with(dir.path()));
/// ```
pub struct TestDir {
    inner: TempDir,
}

impl TestDir {
    /// Creates a new temporary directory.
    ///
    /// # Panics
    ///
    /// Panics if the directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        let inner = TempDir::new().expect("failed to create temp directory");
        Self { inner }
    }

    /// Path of the directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// Joins `path` onto the directory.
    #[must_use]
    pub fn join<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.inner.path().join(path)
    }

    /// Path of a store image inside the directory.
    #[must_use]
    pub fn image_path(&self) -> PathBuf {
        self.join("admin.img")
    }
}

impl Default for TestDir {
    fn default() -> Self {
        Self::new()
    }
}
