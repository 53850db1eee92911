//! Per-transaction deadline and cancellation.
//!
//! An [`OperationContext`] is captured when a transaction begins. Every
//! operation checks it before touching staged or committed state, so an
//! expired or cancelled context leaves both untouched.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::AdminError;

/// Caller-supplied deadline and cancellation flag.
///
/// Clones share one cancellation token, so cancelling any clone cancels the
/// transaction that captured it. A [`child`](Self::child) context is
/// cancelled with its parent but can be cancelled on its own.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use arbor_storage::OperationContext;
///
/// let ctx = OperationContext::with_timeout(Duration::from_secs(5));
/// assert!(ctx.check().is_ok());
/// ctx.cancel();
/// assert!(ctx.check().is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    deadline: Option<Instant>,
    cancelled: CancellationToken,
}

impl OperationContext {
    /// A context with no deadline that is never cancelled unless asked to.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A context that expires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self { deadline: Some(deadline), cancelled: CancellationToken::new() }
    }

    /// A context cancelled together with `self`, expiring at the earlier of
    /// the parent deadline and `timeout` from now.
    ///
    /// Cancelling the child leaves the parent running.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let own = Instant::now() + timeout;
        let deadline = match self.deadline() {
            Some(parent) => parent.min(own),
            None => own,
        };
        Self { deadline: Some(deadline), cancelled: self.cancelled.child_token() }
    }

    /// A context sharing the parent deadline whose cancellation does not
    /// propagate upward.
    pub fn child(&self) -> Self {
        Self { deadline: self.deadline(), cancelled: self.cancelled.child_token() }
    }

    /// Cancels every operation using this context, one of its clones or one
    /// of its children.
    pub fn cancel(&self) {
        self.cancelled.cancel();
    }

    /// Whether this context or an ancestor has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.is_cancelled()
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline. `None` without a deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Fails if the context is cancelled or past its deadline.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError::Cancelled`] or [`AdminError::DeadlineExceeded`].
    pub fn check(&self) -> Result<(), AdminError> {
        if self.is_cancelled() {
            return Err(AdminError::Cancelled);
        }
        if let Some(deadline) = self.deadline
            && Instant::now() >= deadline
        {
            return Err(AdminError::DeadlineExceeded);
        }
        Ok(())
    }
}
