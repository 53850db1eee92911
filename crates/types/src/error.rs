//! Machine-readable error codes for Arbor.
//!
//! Every error surfaced by the admin store maps to one [`ErrorCode`]. Codes
//! mirror the canonical RPC status codes so the administration service can
//! forward them without translation.
//!
//! | Code                 | Value | Meaning                                        |
//! |----------------------|-------|------------------------------------------------|
//! | `Cancelled`          | 1     | Caller cancelled the operation                 |
//! | `InvalidArgument`    | 3     | Malformed tree or read-only field change       |
//! | `DeadlineExceeded`   | 4     | Caller deadline expired before completion      |
//! | `NotFound`           | 5     | Unknown tree id                                |
//! | `FailedPrecondition` | 9     | Lifecycle state forbids the operation          |
//! | `Aborted`            | 10    | Concurrent commit touched the same tree        |
//! | `Internal`           | 13    | Invariant violation or codec failure           |
//! | `Unavailable`        | 14    | Backend I/O or connectivity failure            |

use core::fmt;

/// Machine-readable error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    /// The operation was cancelled by the caller.
    Cancelled = 1,
    /// The request was malformed.
    InvalidArgument = 3,
    /// The caller's deadline expired.
    DeadlineExceeded = 4,
    /// The referenced tree does not exist.
    NotFound = 5,
    /// The tree's lifecycle state does not allow the operation.
    FailedPrecondition = 9,
    /// The transaction lost a write-write race and was not applied.
    Aborted = 10,
    /// Unexpected internal state.
    Internal = 13,
    /// The backend could not be reached or written.
    Unavailable = 14,
}

impl ErrorCode {
    /// Returns the numeric code value.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Converts a numeric code to an `ErrorCode`, returning `None` for unknown values.
    #[must_use]
    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            1 => Some(Self::Cancelled),
            3 => Some(Self::InvalidArgument),
            4 => Some(Self::DeadlineExceeded),
            5 => Some(Self::NotFound),
            9 => Some(Self::FailedPrecondition),
            10 => Some(Self::Aborted),
            13 => Some(Self::Internal),
            14 => Some(Self::Unavailable),
            _ => None,
        }
    }

    /// Whether this error is retryable.
    ///
    /// Retryable errors may succeed on a subsequent attempt with the same
    /// input. Everything else needs a changed request or state first.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Aborted | Self::Unavailable | Self::DeadlineExceeded)
    }

    /// Suggested recovery action for this error code.
    #[must_use]
    pub const fn suggested_action(self) -> &'static str {
        match self {
            Self::Cancelled => "The caller cancelled the request. Nothing was committed.",
            Self::InvalidArgument => {
                "Fix the tree fields. Read-only fields (tree type, hashing, signature, public key) cannot change."
            },
            Self::DeadlineExceeded => "Retry with a longer deadline. Nothing was committed.",
            Self::NotFound => "Verify the tree id with ListTreeIDs. Hard-deleted trees are gone.",
            Self::FailedPrecondition => {
                "Check the tree's lifecycle: hard-delete and undelete need a soft-deleted tree."
            },
            Self::Aborted => "Re-read the tree in a new transaction and retry the change.",
            Self::Internal => "Unexpected state. Collect context and report as an issue.",
            Self::Unavailable => {
                "Check disk space, filesystem permissions, and backend health, then retry."
            },
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}
