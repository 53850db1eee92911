//! Error types for the tree administration store.
//!
//! [`AdminError`] is returned by every transaction operation and maps onto an
//! [`ErrorCode`]. [`UpdateTreeError`] additionally records whether an update
//! failed while looking the tree up or after the update was attempted.
//! [`BackendError`] covers the byte-level storage backends.

use std::io;

use arbor_types::{
    CodecError, ErrorCode, TreeId, ValidationError, config::ConfigError,
    snowflake::SnowflakeError,
};
use snafu::Snafu;

use crate::transaction::TxStatus;

/// Errors raised by a [`StorageBackend`](crate::StorageBackend) or while
/// decoding a persisted image.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BackendError {
    /// I/O error from the underlying file.
    #[snafu(display("I/O error: {source}"))]
    Io {
        /// The underlying I/O error.
        source: io::Error,
    },

    /// The image is truncated or structurally invalid.
    #[snafu(display("Corrupted image: {reason}"))]
    Corrupted {
        /// Description of what was corrupted.
        reason: String,
    },

    /// The image does not start with the expected magic bytes.
    #[snafu(display("Invalid image magic number"))]
    InvalidMagic,

    /// The image was written by an unknown format version.
    #[snafu(display("Unsupported image format version: {version}"))]
    UnsupportedVersion {
        /// The version found in the header.
        version: u16,
    },

    /// The payload does not match the checksum recorded in the header.
    #[snafu(display("Image checksum mismatch: expected {expected:#018x}, found {actual:#018x}"))]
    ChecksumMismatch {
        /// Checksum recorded in the header.
        expected: u64,
        /// Checksum computed over the payload.
        actual: u64,
    },

    /// The backend refused the operation.
    #[snafu(display("Backend unavailable: {reason}"))]
    Unavailable {
        /// Why the backend is unavailable.
        reason: String,
    },
}

impl From<io::Error> for BackendError {
    fn from(source: io::Error) -> Self {
        Self::Io { source }
    }
}

impl BackendError {
    /// Returns the machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Io { .. } | Self::Unavailable { .. } => ErrorCode::Unavailable,
            Self::Corrupted { .. }
            | Self::InvalidMagic
            | Self::UnsupportedVersion { .. }
            | Self::ChecksumMismatch { .. } => ErrorCode::Internal,
        }
    }
}

/// Errors returned by admin transactions.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AdminError {
    /// The tree or request failed validation.
    #[snafu(display("Invalid argument: {field}: {reason}"))]
    InvalidArgument {
        /// Offending field.
        field: String,
        /// Violated constraint.
        reason: String,
    },

    /// No tree with this id exists.
    #[snafu(display("Tree {tree_id} not found"))]
    NotFound {
        /// The requested tree.
        tree_id: TreeId,
    },

    /// The tree's lifecycle state forbids the operation.
    #[snafu(display("Failed precondition on {tree_id}: {reason}"))]
    FailedPrecondition {
        /// The tree the operation targeted.
        tree_id: TreeId,
        /// Which state requirement was not met.
        reason: String,
    },

    /// The transaction was already committed, rolled back or closed.
    #[snafu(display("Transaction already {status}"))]
    TransactionFinished {
        /// Final status of the transaction.
        status: TxStatus,
    },

    /// Another transaction committed a change to the same tree first.
    #[snafu(display("Conflicting concurrent write to {tree_id}"))]
    Conflict {
        /// The contended tree.
        tree_id: TreeId,
    },

    /// The operation's deadline passed.
    #[snafu(display("Deadline exceeded"))]
    DeadlineExceeded,

    /// The operation was cancelled by the caller.
    #[snafu(display("Operation cancelled"))]
    Cancelled,

    /// No unused tree id was found within the configured number of attempts.
    #[snafu(display("No unused tree id after {attempts} attempts"))]
    IdExhausted {
        /// Number of ids drawn.
        attempts: u32,
    },

    /// Tree id generation failed.
    #[snafu(display("Tree id generation failed: {source}"))]
    IdGeneration {
        /// The underlying generator error.
        source: SnowflakeError,
    },

    /// The storage configuration is invalid.
    #[snafu(display("Invalid storage configuration: {source}"))]
    Config {
        /// The underlying validation failure.
        source: ConfigError,
    },

    /// The backend failed.
    #[snafu(display("Backend error: {source}"))]
    Backend {
        /// The underlying backend error.
        source: BackendError,
    },

    /// Encoding or decoding the committed state failed.
    #[snafu(display("Codec error: {source}"))]
    Codec {
        /// The underlying codec error.
        source: CodecError,
    },
}

impl AdminError {
    /// Returns the machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidArgument { .. } | Self::Config { .. } => ErrorCode::InvalidArgument,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::FailedPrecondition { .. } | Self::TransactionFinished { .. } => {
                ErrorCode::FailedPrecondition
            },
            Self::Conflict { .. } => ErrorCode::Aborted,
            Self::DeadlineExceeded => ErrorCode::DeadlineExceeded,
            Self::Cancelled => ErrorCode::Cancelled,
            Self::IdExhausted { .. } | Self::IdGeneration { .. } | Self::Codec { .. } => {
                ErrorCode::Internal
            },
            Self::Backend { source } => source.code(),
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }
}

impl From<ValidationError> for AdminError {
    fn from(err: ValidationError) -> Self {
        Self::InvalidArgument { field: err.field, reason: err.constraint }
    }
}

impl From<BackendError> for AdminError {
    fn from(source: BackendError) -> Self {
        Self::Backend { source }
    }
}

/// Stage at which an update failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStage {
    /// The tree could not be loaded; no update was attempted.
    Lookup,
    /// The tree was loaded and the update was rejected.
    Update,
}

/// Error returned by [`AdminTx::update_tree`](crate::AdminTx::update_tree).
///
/// Lookup failures mean the request referenced a tree that cannot be read and
/// should not be retried unchanged. Rejections are final for the given
/// request, except for backend failures.
#[derive(Debug, Snafu)]
pub enum UpdateTreeError {
    /// Loading the tree failed.
    #[snafu(display("Update lookup failed: {source}"))]
    Lookup {
        /// Why the tree could not be loaded.
        source: AdminError,
    },

    /// The loaded tree could not be updated.
    #[snafu(display("Update rejected: {source}"))]
    Rejected {
        /// Why the update was rejected.
        source: AdminError,
    },
}

impl UpdateTreeError {
    /// Stage at which the update failed.
    pub fn stage(&self) -> UpdateStage {
        match self {
            Self::Lookup { .. } => UpdateStage::Lookup,
            Self::Rejected { .. } => UpdateStage::Update,
        }
    }

    /// The underlying admin error.
    pub fn admin_error(&self) -> &AdminError {
        match self {
            Self::Lookup { source } | Self::Rejected { source } => source,
        }
    }

    /// Returns the machine-readable error code of the underlying failure.
    pub fn code(&self) -> ErrorCode {
        self.admin_error().code()
    }

    /// Whether retrying the same update may succeed.
    ///
    /// Lookup failures are never retryable with the same input.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Lookup { .. } => false,
            Self::Rejected { source } => source.is_retryable(),
        }
    }
}

impl From<UpdateTreeError> for AdminError {
    fn from(err: UpdateTreeError) -> Self {
        match err {
            UpdateTreeError::Lookup { source } | UpdateTreeError::Rejected { source } => source,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_error_codes() {
        let cases = [
            (AdminError::NotFound { tree_id: TreeId::new(1) }, ErrorCode::NotFound),
            (
                AdminError::FailedPrecondition { tree_id: TreeId::new(1), reason: "x".into() },
                ErrorCode::FailedPrecondition,
            ),
            (
                AdminError::TransactionFinished { status: TxStatus::Committed },
                ErrorCode::FailedPrecondition,
            ),
            (AdminError::Conflict { tree_id: TreeId::new(1) }, ErrorCode::Aborted),
            (AdminError::DeadlineExceeded, ErrorCode::DeadlineExceeded),
            (AdminError::Cancelled, ErrorCode::Cancelled),
            (AdminError::IdExhausted { attempts: 8 }, ErrorCode::Internal),
            (
                AdminError::Backend { source: BackendError::Unavailable { reason: "down".into() } },
                ErrorCode::Unavailable,
            ),
            (AdminError::Backend { source: BackendError::InvalidMagic }, ErrorCode::Internal),
        ];
        for (err, code) in cases {
            assert_eq!(err.code(), code, "{err}");
        }
    }

    #[test]
    fn test_validation_error_becomes_invalid_argument() {
        let err: AdminError =
            ValidationError { field: "tree_type".into(), constraint: "is read-only".into() }.into();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
        assert_eq!(err.to_string(), "Invalid argument: tree_type: is read-only");
    }

    #[test]
    fn test_update_error_stages() {
        let lookup = UpdateTreeError::Lookup {
            source: AdminError::Backend {
                source: BackendError::Unavailable { reason: "down".into() },
            },
        };
        assert_eq!(lookup.stage(), UpdateStage::Lookup);
        assert!(!lookup.is_retryable(), "lookup failures are never retried unchanged");

        let rejected = UpdateTreeError::Rejected {
            source: AdminError::InvalidArgument { field: "tree_type".into(), reason: "x".into() },
        };
        assert_eq!(rejected.stage(), UpdateStage::Update);
        assert_eq!(rejected.code(), ErrorCode::InvalidArgument);
        assert!(!rejected.is_retryable());

        let conflict =
            UpdateTreeError::Rejected { source: AdminError::Conflict { tree_id: TreeId::new(3) } };
        assert!(conflict.is_retryable());

        let flattened: AdminError = rejected.into();
        assert!(matches!(flattened, AdminError::InvalidArgument { .. }));
    }

    #[test]
    fn test_backend_error_from_io() {
        let err: BackendError = io::Error::other("disk gone").into();
        assert_eq!(err.code(), ErrorCode::Unavailable);
        assert!(err.to_string().contains("disk gone"));
    }
}
