//! Storage backend abstraction for the admin store.
//!
//! A backend persists a single opaque image: the whole committed state,
//! framed by [`frame_image`]. Each commit replaces the image atomically, so a
//! reader either sees the previous commit or the new one.
//!
//! # Image Layout
//!
//! ```text
//! | 8 bytes: magic | 2 bytes: version | 8 bytes: payload length | 8 bytes: XXH3-64 | payload |
//! ```
//!
//! All integers are little-endian. The checksum covers the payload only.

mod file;
mod memory;

pub use file::FileBackend;
pub use memory::InMemoryBackend;

use crate::error::BackendError;

/// Magic number for Arbor admin images.
pub const MAGIC: &[u8; 8] = b"ARBORADM";

/// Current image format version.
pub const FORMAT_VERSION: u16 = 1;

/// Size of the image header in bytes.
pub const HEADER_SIZE: usize = 26;

/// Byte-level persistence for the committed image.
pub trait StorageBackend: Send + Sync {
    /// Reads the last written image, or `None` if nothing was ever written.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Io`] if the read fails.
    fn read_image(&self) -> Result<Option<Vec<u8>>, BackendError>;

    /// Replaces the image.
    ///
    /// Ok means a later [`read_image`](Self::read_image), including one after
    /// reopening, returns `image`. On error the previous image must still be
    /// readable. Implementations return Ok once the new image is in place,
    /// even if a follow-up step such as a directory sync fails, since the
    /// caller publishes the commit only on Ok.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Io`] or [`BackendError::Unavailable`] if the
    /// write fails.
    fn write_image(&self, image: &[u8]) -> Result<(), BackendError>;
}

/// Prepends the header to `payload`.
pub fn frame_image(payload: &[u8]) -> Vec<u8> {
    let mut image = Vec::with_capacity(HEADER_SIZE + payload.len());
    image.extend_from_slice(MAGIC);
    image.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    image.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    image.extend_from_slice(&xxhash_rust::xxh3::xxh3_64(payload).to_le_bytes());
    image.extend_from_slice(payload);
    image
}

/// Verifies the header of `image` and returns its payload.
///
/// # Errors
///
/// - [`BackendError::Corrupted`] if the image is truncated or has trailing bytes
/// - [`BackendError::InvalidMagic`] if the magic bytes do not match
/// - [`BackendError::UnsupportedVersion`] for an unknown format version
/// - [`BackendError::ChecksumMismatch`] if the payload was altered
pub fn unframe_image(image: &[u8]) -> Result<&[u8], BackendError> {
    if image.len() < HEADER_SIZE {
        return Err(BackendError::Corrupted {
            reason: format!("image is {} bytes, header needs {HEADER_SIZE}", image.len()),
        });
    }
    if &image[0..8] != MAGIC {
        return Err(BackendError::InvalidMagic);
    }

    let version = u16::from_le_bytes([image[8], image[9]]);
    if version != FORMAT_VERSION {
        return Err(BackendError::UnsupportedVersion { version });
    }

    let len = read_u64(&image[10..18])?;
    let expected = read_u64(&image[18..26])?;
    let payload = &image[HEADER_SIZE..];
    if payload.len() as u64 != len {
        return Err(BackendError::Corrupted {
            reason: format!("header declares {len} payload bytes, found {}", payload.len()),
        });
    }

    let actual = xxhash_rust::xxh3::xxh3_64(payload);
    if actual != expected {
        return Err(BackendError::ChecksumMismatch { expected, actual });
    }
    Ok(payload)
}

fn read_u64(bytes: &[u8]) -> Result<u64, BackendError> {
    let array: [u8; 8] = bytes
        .try_into()
        .map_err(|_| BackendError::Corrupted { reason: "short header field".to_string() })?;
    Ok(u64::from_le_bytes(array))
}
