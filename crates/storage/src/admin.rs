//! Transactional contract for tree administration.
//!
//! [`AdminStorage`] opens read-write transactions ([`AdminTx`]) and
//! read-only snapshots ([`ReadOnlyAdminTx`]). Any backend implementing these
//! traits is interchangeable for callers and is certified by the conformance
//! suite in `arbor-test-utils`.
//!
//! # Transaction Protocol
//!
//! A transaction stays open until it is committed, rolled back or closed.
//! Once finalized, every operation except [`close`](ReadOnlyAdminTx::close)
//! fails with [`AdminError::TransactionFinished`]. Closing an open write
//! transaction rolls it back; closing a finalized one does nothing.

use arbor_types::{Tree, TreeId, TreeUpdate};

use crate::{
    context::OperationContext,
    error::{AdminError, UpdateTreeError},
};

/// Factory for admin transactions.
pub trait AdminStorage: Send + Sync {
    /// Read-write transaction type.
    type Tx<'a>: AdminTx
    where
        Self: 'a;

    /// Read-only snapshot type.
    type Snapshot<'a>: ReadOnlyAdminTx
    where
        Self: 'a;

    /// Opens a read-write transaction bound to `ctx`.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError::DeadlineExceeded`] or [`AdminError::Cancelled`]
    /// if `ctx` is already done, or a backend error if the store cannot
    /// serve transactions.
    fn begin(&self, ctx: &OperationContext) -> Result<Self::Tx<'_>, AdminError>;

    /// Opens a read-only, point-in-time view bound to `ctx`.
    ///
    /// The snapshot never observes writes of transactions that have not
    /// committed.
    ///
    /// # Errors
    ///
    /// As for [`begin`](Self::begin).
    fn snapshot(&self, ctx: &OperationContext) -> Result<Self::Snapshot<'_>, AdminError>;
}

/// Read operations shared by snapshots and write transactions.
pub trait ReadOnlyAdminTx {
    /// Returns the tree with id `tree_id`.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError::NotFound`] if no such tree exists.
    fn get_tree(&self, tree_id: TreeId) -> Result<Tree, AdminError>;

    /// Lists tree ids in ascending order.
    ///
    /// Soft-deleted trees are included only when `include_deleted` is set.
    ///
    /// # Errors
    ///
    /// Fails only if the transaction is finished or its context is done.
    fn list_tree_ids(&self, include_deleted: bool) -> Result<Vec<TreeId>, AdminError>;

    /// Lists trees in ascending id order, filtered like
    /// [`list_tree_ids`](Self::list_tree_ids).
    ///
    /// # Errors
    ///
    /// Fails only if the transaction is finished or its context is done.
    fn list_trees(&self, include_deleted: bool) -> Result<Vec<Tree>, AdminError>;

    /// Finalizes the transaction, making its writes durable and visible.
    ///
    /// For snapshots this only marks the transaction finished.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError::TransactionFinished`] if already finalized,
    /// [`AdminError::Conflict`] if a concurrent commit touched the same tree,
    /// or a backend error. Nothing is applied on error and the transaction
    /// is rolled back.
    fn commit(&mut self) -> Result<(), AdminError>;

    /// Releases the transaction, rolling back uncommitted writes.
    ///
    /// Idempotent.
    ///
    /// # Errors
    ///
    /// Never fails for the provided implementations; the `Result` leaves room
    /// for backends that must release remote resources.
    fn close(&mut self) -> Result<(), AdminError>;

    /// Whether the transaction has been committed, rolled back or closed.
    fn is_closed(&self) -> bool;
}

/// Read-write admin transaction.
///
/// Writes are staged privately and become visible to other transactions
/// only after a successful [`commit`](ReadOnlyAdminTx::commit). The
/// transaction reads its own staged writes.
pub trait AdminTx: ReadOnlyAdminTx {
    /// Validates and stages a new tree, returning it as it will be stored.
    ///
    /// The stored tree gets a fresh id and `create_time == update_time`.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError::InvalidArgument`] if the tree fails validation.
    fn create_tree(&mut self, tree: &Tree) -> Result<Tree, AdminError>;

    /// Applies `update` to the tree with id `tree_id`.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateTreeError::Lookup`] if the tree cannot be loaded and
    /// [`UpdateTreeError::Rejected`] if the updated tree fails validation.
    fn update_tree(&mut self, tree_id: TreeId, update: &TreeUpdate)
    -> Result<Tree, UpdateTreeError>;

    /// Marks a tree deleted.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError::NotFound`] for an unknown id and
    /// [`AdminError::FailedPrecondition`] if the tree is already deleted.
    fn soft_delete_tree(&mut self, tree_id: TreeId) -> Result<Tree, AdminError>;

    /// Permanently removes a soft-deleted tree.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError::NotFound`] for an unknown id and
    /// [`AdminError::FailedPrecondition`] if the tree is not soft-deleted.
    fn hard_delete_tree(&mut self, tree_id: TreeId) -> Result<(), AdminError>;

    /// Restores a soft-deleted tree.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError::NotFound`] for an unknown id and
    /// [`AdminError::FailedPrecondition`] if the tree is not deleted.
    fn undelete_tree(&mut self, tree_id: TreeId) -> Result<Tree, AdminError>;

    /// Discards every staged write.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError::TransactionFinished`] if already finalized.
    fn rollback(&mut self) -> Result<(), AdminError>;
}
