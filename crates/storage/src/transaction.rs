//! Admin transactions over [`TreeStorage`].
//!
//! [`AdminTransaction`] stages writes in a private write set layered over the
//! committed state it started from; [`SnapshotTransaction`] only reads that
//! state. Neither holds a lock while open.

use std::{collections::BTreeMap, fmt, sync::Arc};

use arbor_types::{
    Tree, TreeId, TreeUpdate, snowflake, validate_tree_for_creation, validate_tree_for_update,
};
use chrono::Utc;
use snafu::{OptionExt, ResultExt};
use tracing::debug;

use crate::{
    admin::{AdminTx, ReadOnlyAdminTx},
    backend::StorageBackend,
    context::OperationContext,
    error::{
        AdminError, FailedPreconditionSnafu, IdExhaustedSnafu, IdGenerationSnafu, NotFoundSnafu,
        UpdateTreeError,
    },
    storage::{CommittedState, TreeStorage, WriteSet},
};

/// Lifecycle status of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    /// Accepting operations.
    Open,
    /// Committed successfully.
    Committed,
    /// Rolled back explicitly or by a failed commit.
    RolledBack,
    /// Closed before being committed or rolled back.
    Closed,
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Open => "open",
            Self::Committed => "committed",
            Self::RolledBack => "rolled back",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

fn ensure_open(status: TxStatus) -> Result<(), AdminError> {
    if status == TxStatus::Open {
        Ok(())
    } else {
        Err(AdminError::TransactionFinished { status })
    }
}

fn collect_trees<'t>(trees: impl Iterator<Item = &'t Tree>, include_deleted: bool) -> Vec<Tree> {
    trees.filter(|tree| include_deleted || !tree.is_deleted()).cloned().collect()
}

/// Read-write admin transaction.
///
/// Dropping an open transaction rolls it back.
pub struct AdminTransaction<'s, B: StorageBackend> {
    storage: &'s TreeStorage<B>,
    ctx: OperationContext,
    /// Committed state at `begin`.
    base: Arc<CommittedState>,
    /// Staged writes, applied over `base` for reads.
    staged: WriteSet,
    status: TxStatus,
}

impl<'s, B: StorageBackend> AdminTransaction<'s, B> {
    pub(crate) fn new(
        storage: &'s TreeStorage<B>,
        ctx: OperationContext,
        base: Arc<CommittedState>,
    ) -> Self {
        Self { storage, ctx, base, staged: BTreeMap::new(), status: TxStatus::Open }
    }

    /// Current status.
    pub fn status(&self) -> TxStatus {
        self.status
    }

    /// Number of trees with staged writes.
    pub fn staged_writes(&self) -> usize {
        self.staged.len()
    }

    fn ensure_usable(&self) -> Result<(), AdminError> {
        ensure_open(self.status)?;
        self.ctx.check()
    }

    /// The tree as this transaction sees it.
    fn lookup(&self, tree_id: TreeId) -> Option<&Tree> {
        match self.staged.get(&tree_id) {
            Some(staged) => staged.as_ref(),
            None => self.base.trees.get(&tree_id),
        }
    }

    fn load(&self, tree_id: TreeId) -> Result<Tree, AdminError> {
        self.lookup(tree_id).cloned().context(NotFoundSnafu { tree_id })
    }

    /// Committed trees overlaid with staged writes, in id order.
    fn view(&self) -> BTreeMap<TreeId, &Tree> {
        let mut view: BTreeMap<TreeId, &Tree> =
            self.base.trees.iter().map(|(id, tree)| (*id, tree)).collect();
        for (tree_id, staged) in &self.staged {
            match staged {
                Some(tree) => {
                    view.insert(*tree_id, tree);
                },
                None => {
                    view.remove(tree_id);
                },
            }
        }
        view
    }

    /// Draws a tree id unused by this transaction and by the committed state.
    fn allocate_tree_id(&self) -> Result<TreeId, AdminError> {
        let attempts = self.storage.config().max_id_attempts;
        for _ in 0..attempts {
            let tree_id = snowflake::generate_tree_id().context(IdGenerationSnafu)?;
            let taken = self.staged.contains_key(&tree_id)
                || self.base.trees.contains_key(&tree_id)
                || self.storage.is_committed(tree_id);
            if !taken {
                return Ok(tree_id);
            }
            debug!(%tree_id, "Tree id already in use, drawing again");
        }
        IdExhaustedSnafu { attempts }.fail()
    }

    fn stage(&mut self, tree_id: TreeId, tree: Option<Tree>) {
        self.staged.insert(tree_id, tree);
    }

    fn discard(&mut self, status: TxStatus) {
        let dropped = self.staged.len();
        self.staged.clear();
        self.status = status;
        debug!(dropped, %status, "Discarded staged admin writes");
    }
}

impl<B: StorageBackend> ReadOnlyAdminTx for AdminTransaction<'_, B> {
    fn get_tree(&self, tree_id: TreeId) -> Result<Tree, AdminError> {
        self.ensure_usable()?;
        self.load(tree_id)
    }

    fn list_tree_ids(&self, include_deleted: bool) -> Result<Vec<TreeId>, AdminError> {
        self.ensure_usable()?;
        Ok(self
            .view()
            .into_iter()
            .filter(|(_, tree)| include_deleted || !tree.is_deleted())
            .map(|(tree_id, _)| tree_id)
            .collect())
    }

    fn list_trees(&self, include_deleted: bool) -> Result<Vec<Tree>, AdminError> {
        self.ensure_usable()?;
        Ok(collect_trees(self.view().into_values(), include_deleted))
    }

    fn commit(&mut self) -> Result<(), AdminError> {
        ensure_open(self.status)?;
        if let Err(e) = self.ctx.check() {
            self.discard(TxStatus::RolledBack);
            return Err(e);
        }
        if self.staged.is_empty() {
            self.status = TxStatus::Committed;
            return Ok(());
        }

        let writes = std::mem::take(&mut self.staged);
        let count = writes.len();
        match self.storage.apply(&self.base, writes) {
            Ok(sequence) => {
                self.status = TxStatus::Committed;
                debug!(sequence, writes = count, "Committed admin transaction");
                Ok(())
            },
            Err(e) => {
                self.status = TxStatus::RolledBack;
                debug!(error = %e, writes = count, "Admin commit failed, transaction rolled back");
                Err(e)
            },
        }
    }

    fn close(&mut self) -> Result<(), AdminError> {
        if self.status == TxStatus::Open {
            self.discard(TxStatus::Closed);
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.status != TxStatus::Open
    }
}

impl<B: StorageBackend> AdminTx for AdminTransaction<'_, B> {
    fn create_tree(&mut self, tree: &Tree) -> Result<Tree, AdminError> {
        self.ensure_usable()?;
        validate_tree_for_creation(tree, self.storage.resolver(), self.storage.validation_config())?;

        let tree_id = self.allocate_tree_id()?;
        let now = Utc::now();
        let created =
            Tree { tree_id, create_time: Some(now), update_time: Some(now), ..tree.clone() };
        self.stage(tree_id, Some(created.clone()));
        debug!(%tree_id, tree_type = ?created.tree_type, "Staged tree creation");
        Ok(created)
    }

    fn update_tree(
        &mut self,
        tree_id: TreeId,
        update: &TreeUpdate,
    ) -> Result<Tree, UpdateTreeError> {
        self.ensure_usable().map_err(|source| UpdateTreeError::Lookup { source })?;
        let stored = self.load(tree_id).map_err(|source| UpdateTreeError::Lookup { source })?;

        let mut updated = update.apply_to(&stored);
        validate_tree_for_update(
            &stored,
            &updated,
            self.storage.resolver(),
            self.storage.validation_config(),
        )
        .map_err(|e| UpdateTreeError::Rejected { source: e.into() })?;

        let now = Utc::now();
        updated.update_time = Some(stored.update_time.map_or(now, |previous| previous.max(now)));
        self.stage(tree_id, Some(updated.clone()));
        debug!(%tree_id, "Staged tree update");
        Ok(updated)
    }

    fn soft_delete_tree(&mut self, tree_id: TreeId) -> Result<Tree, AdminError> {
        self.ensure_usable()?;
        let mut tree = self.load(tree_id)?;
        if tree.is_deleted() {
            return FailedPreconditionSnafu { tree_id, reason: "tree is already soft-deleted" }
                .fail();
        }

        tree.deleted = true;
        tree.delete_time = Some(Utc::now());
        self.stage(tree_id, Some(tree.clone()));
        debug!(%tree_id, "Staged tree soft-delete");
        Ok(tree)
    }

    fn hard_delete_tree(&mut self, tree_id: TreeId) -> Result<(), AdminError> {
        self.ensure_usable()?;
        let tree = self.load(tree_id)?;
        if !tree.is_deleted() {
            return FailedPreconditionSnafu {
                tree_id,
                reason: "tree must be soft-deleted before hard-delete",
            }
            .fail();
        }

        self.stage(tree_id, None);
        debug!(%tree_id, "Staged tree hard-delete");
        Ok(())
    }

    fn undelete_tree(&mut self, tree_id: TreeId) -> Result<Tree, AdminError> {
        self.ensure_usable()?;
        let mut tree = self.load(tree_id)?;
        if !tree.is_deleted() {
            return FailedPreconditionSnafu { tree_id, reason: "tree is not deleted" }.fail();
        }

        tree.deleted = false;
        tree.delete_time = None;
        self.stage(tree_id, Some(tree.clone()));
        debug!(%tree_id, "Staged tree undelete");
        Ok(tree)
    }

    fn rollback(&mut self) -> Result<(), AdminError> {
        ensure_open(self.status)?;
        self.discard(TxStatus::RolledBack);
        Ok(())
    }
}

impl<B: StorageBackend> Drop for AdminTransaction<'_, B> {
    fn drop(&mut self) {
        if self.status == TxStatus::Open {
            debug!(
                dropped = self.staged.len(),
                "Admin transaction dropped without commit or rollback; rolling back"
            );
        }
    }
}

/// Read-only view of the committed state at the time it was opened.
pub struct SnapshotTransaction {
    ctx: OperationContext,
    state: Arc<CommittedState>,
    status: TxStatus,
}

impl SnapshotTransaction {
    pub(crate) fn new(ctx: OperationContext, state: Arc<CommittedState>) -> Self {
        Self { ctx, state, status: TxStatus::Open }
    }

    /// Current status.
    pub fn status(&self) -> TxStatus {
        self.status
    }

    fn ensure_usable(&self) -> Result<(), AdminError> {
        ensure_open(self.status)?;
        self.ctx.check()
    }
}

impl ReadOnlyAdminTx for SnapshotTransaction {
    fn get_tree(&self, tree_id: TreeId) -> Result<Tree, AdminError> {
        self.ensure_usable()?;
        self.state.trees.get(&tree_id).cloned().context(NotFoundSnafu { tree_id })
    }

    fn list_tree_ids(&self, include_deleted: bool) -> Result<Vec<TreeId>, AdminError> {
        self.ensure_usable()?;
        Ok(self
            .state
            .trees
            .iter()
            .filter(|(_, tree)| include_deleted || !tree.is_deleted())
            .map(|(tree_id, _)| *tree_id)
            .collect())
    }

    fn list_trees(&self, include_deleted: bool) -> Result<Vec<Tree>, AdminError> {
        self.ensure_usable()?;
        Ok(collect_trees(self.state.trees.values(), include_deleted))
    }

    // Nothing to persist; only the status changes.
    fn commit(&mut self) -> Result<(), AdminError> {
        ensure_open(self.status)?;
        self.status = TxStatus::Committed;
        Ok(())
    }

    fn close(&mut self) -> Result<(), AdminError> {
        if self.status == TxStatus::Open {
            self.status = TxStatus::Closed;
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.status != TxStatus::Open
    }
}
