//! File-based storage backend.
//!
//! Each write goes to a temporary sibling file which is then renamed over
//! the image. Rename is atomic on POSIX filesystems, so a crash mid-write
//! leaves the previous image intact.
//!
//! The temporary file is named by appending `.tmp` to the full image
//! file name. `admin.img` writes through `admin.img.tmp` and `admin.tmp`
//! through `admin.tmp.tmp`, so no image is ever its own temporary and two
//! images sharing a stem never share one.

use std::{
    ffi::OsString,
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::StorageBackend;
use crate::error::BackendError;

/// Suffix appended to the image file name for the in-flight write.
const TMP_SUFFIX: &str = ".tmp";

/// Flushes the directory entry created by a rename.
type DirSync = fn(&Path) -> io::Result<()>;

/// File-based storage backend.
pub struct FileBackend {
    /// Path of the committed image.
    path: PathBuf,
    /// Path of the in-flight image.
    tmp_path: PathBuf,
    /// Whether to fsync the file and its directory on every write.
    sync: bool,
    /// Serializes writers sharing the temporary path.
    write_lock: Mutex<()>,
    /// Directory sync run after each rename when `sync` is set.
    dir_sync: DirSync,
}

impl FileBackend {
    /// Opens (or prepares to create) the image at `path`.
    ///
    /// The parent directory is created if missing. A stale temporary file
    /// from an interrupted write is removed.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Io`] if the directory cannot be created or the
    /// stale temporary file cannot be removed.
    pub fn open(path: impl AsRef<Path>, sync: bool) -> Result<Self, BackendError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = tmp_path_for(&path);
        match fs::remove_file(&tmp_path) {
            Ok(()) => debug!(path = %tmp_path.display(), "Removed stale temporary image"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {},
            Err(e) => return Err(e.into()),
        }

        Ok(Self { path, tmp_path, sync, write_lock: Mutex::new(()), dir_sync: sync_parent_dir })
    }

    #[cfg(test)]
    fn with_dir_sync(mut self, dir_sync: DirSync) -> Self {
        self.dir_sync = dir_sync;
        self
    }

    /// Path of the committed image.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StorageBackend for FileBackend {
    fn read_image(&self) -> Result<Option<Vec<u8>>, BackendError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_image(&self, image: &[u8]) -> Result<(), BackendError> {
        let _guard = self.write_lock.lock();

        let mut file =
            OpenOptions::new().write(true).create(true).truncate(true).open(&self.tmp_path)?;
        file.write_all(image)?;
        if self.sync {
            file.sync_all()?;
        }
        drop(file);

        // Commit point. Failures past the rename are logged, not returned.
        fs::rename(&self.tmp_path, &self.path)?;
        if self.sync
            && let Err(error) = (self.dir_sync)(&self.path)
        {
            warn!(
                path = %self.path.display(),
                error = %error,
                "Directory sync failed after image rename; image is committed but the rename may not survive a crash"
            );
        }
        Ok(())
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = OsString::from(path.as_os_str());
    tmp.push(TMP_SUFFIX);
    PathBuf::from(tmp)
}

// Persists the rename itself. Directories cannot be opened this way on Windows.
#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::File::open(parent)?.sync_all(),
        _ => Ok(()),
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> io::Result<()> {
    Ok(())
}
