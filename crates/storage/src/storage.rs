//! The tree administration store.
//!
//! [`TreeStorage`] keeps the committed set of trees as an immutable
//! [`CommittedState`] behind an [`ArcSwap`]. Transactions capture the `Arc`
//! current when they begin; commits build a new state, persist it through the
//! backend and then swap it in.
//!
//! # Invariants
//!
//! - Commits are serialized by `commit_lock`. The backend write happens
//!   before the swap, so a failed write never becomes visible.
//! - A commit is rejected with [`AdminError::Conflict`] if any tree it writes
//!   changed in the committed state after the transaction began.
//! - `sequence` increases by one per applied commit.

use std::{collections::BTreeMap, path::Path, sync::Arc};

use arbor_types::{
    KeyResolver, Tree, TreeId,
    codec,
    config::{StorageConfig, ValidationConfig},
};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use tracing::{info, warn};

use crate::{
    admin::AdminStorage,
    backend::{FileBackend, InMemoryBackend, StorageBackend, frame_image, unframe_image},
    context::OperationContext,
    error::{AdminError, BackendSnafu, CodecSnafu, ConfigSnafu, ConflictSnafu},
    transaction::{AdminTransaction, SnapshotTransaction},
};

/// Committed trees at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct CommittedState {
    /// Number of commits applied since the store was created.
    pub(crate) sequence: u64,
    /// Every stored tree, soft-deleted ones included.
    pub(crate) trees: BTreeMap<TreeId, Tree>,
}

/// Staged writes of one transaction. `None` marks a hard-deleted tree.
pub(crate) type WriteSet = BTreeMap<TreeId, Option<Tree>>;

/// Transactional store of tree records.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use arbor_storage::{AdminStorage, OperationContext, ReadOnlyAdminTx, TreeStorage};
/// use arbor_types::Ed25519KeyResolver;
///
/// let storage = TreeStorage::open_in_memory(Arc::new(Ed25519KeyResolver::new()))
///     .expect("open store");
/// let mut snapshot = storage.snapshot(&OperationContext::background()).expect("snapshot");
/// assert!(snapshot.list_tree_ids(true).expect("list").is_empty());
/// snapshot.close().expect("close");
/// ```
pub struct TreeStorage<B: StorageBackend> {
    backend: B,
    committed: ArcSwap<CommittedState>,
    commit_lock: Mutex<()>,
    resolver: Arc<dyn KeyResolver>,
    validation: ValidationConfig,
    config: StorageConfig,
}

#[bon::bon]
impl<B: StorageBackend> TreeStorage<B> {
    /// Opens a store over `backend`, recovering its last committed image.
    ///
    /// # Errors
    ///
    /// - [`AdminError::Config`] if either configuration is invalid
    /// - [`AdminError::Backend`] if the image cannot be read or fails its
    ///   integrity checks
    /// - [`AdminError::Codec`] if the image payload cannot be decoded
    #[builder]
    pub fn new(
        backend: B,
        resolver: Arc<dyn KeyResolver>,
        #[builder(default)] validation: ValidationConfig,
        #[builder(default)] config: StorageConfig,
    ) -> Result<Self, AdminError> {
        validation.validate().context(ConfigSnafu)?;
        config.validate().context(ConfigSnafu)?;

        let state = recover_state(&backend)?;
        info!(trees = state.trees.len(), sequence = state.sequence, "Opened tree admin store");

        Ok(Self {
            backend,
            committed: ArcSwap::from_pointee(state),
            commit_lock: Mutex::new(()),
            resolver,
            validation,
            config,
        })
    }
}

impl TreeStorage<InMemoryBackend> {
    /// Opens an empty store held in memory.
    ///
    /// # Errors
    ///
    /// Does not fail with the default configuration; the `Result` mirrors
    /// [`TreeStorage::builder`].
    pub fn open_in_memory(resolver: Arc<dyn KeyResolver>) -> Result<Self, AdminError> {
        Self::builder().backend(InMemoryBackend::new()).resolver(resolver).build()
    }
}

impl TreeStorage<FileBackend> {
    /// Opens or creates a file-backed store at `path`.
    ///
    /// # Errors
    ///
    /// As for [`TreeStorage::builder`], plus I/O errors preparing `path`.
    pub fn open(
        path: impl AsRef<Path>,
        config: StorageConfig,
        resolver: Arc<dyn KeyResolver>,
    ) -> Result<Self, AdminError> {
        let backend = FileBackend::open(path, config.sync_on_commit)?;
        Self::builder().backend(backend).resolver(resolver).config(config).build()
    }
}

impl<B: StorageBackend> TreeStorage<B> {
    /// The underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Number of commits applied so far.
    pub fn commit_sequence(&self) -> u64 {
        self.committed.load().sequence
    }

    /// Limits applied when validating trees.
    pub fn validation_config(&self) -> &ValidationConfig {
        &self.validation
    }

    /// Storage configuration.
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub(crate) fn resolver(&self) -> &dyn KeyResolver {
        self.resolver.as_ref()
    }

    pub(crate) fn is_committed(&self, tree_id: TreeId) -> bool {
        self.committed.load().trees.contains_key(&tree_id)
    }

    /// Applies `writes` on top of the latest committed state.
    ///
    /// `base` is the state the transaction started from. Returns the new
    /// commit sequence.
    pub(crate) fn apply(
        &self,
        base: &Arc<CommittedState>,
        writes: WriteSet,
    ) -> Result<u64, AdminError> {
        let _guard = self.commit_lock.lock();
        let current = self.committed.load_full();

        if !Arc::ptr_eq(&current, base) {
            for tree_id in writes.keys() {
                if current.trees.get(tree_id) != base.trees.get(tree_id) {
                    warn!(%tree_id, "Commit aborted by a concurrent write to the same tree");
                    return ConflictSnafu { tree_id: *tree_id }.fail();
                }
            }
        }

        let mut next = CommittedState::clone(&current);
        next.sequence += 1;
        for (tree_id, tree) in writes {
            match tree {
                Some(tree) => {
                    next.trees.insert(tree_id, tree);
                },
                None => {
                    next.trees.remove(&tree_id);
                },
            }
        }

        let payload = codec::encode(&next).context(CodecSnafu)?;
        self.backend.write_image(&frame_image(&payload)).context(BackendSnafu)?;

        let sequence = next.sequence;
        self.committed.store(Arc::new(next));
        Ok(sequence)
    }
}

impl<B: StorageBackend> AdminStorage for TreeStorage<B> {
    type Tx<'a>
        = AdminTransaction<'a, B>
    where
        Self: 'a;
    type Snapshot<'a>
        = SnapshotTransaction
    where
        Self: 'a;

    fn begin(&self, ctx: &OperationContext) -> Result<AdminTransaction<'_, B>, AdminError> {
        ctx.check()?;
        Ok(AdminTransaction::new(self, ctx.clone(), self.committed.load_full()))
    }

    fn snapshot(&self, ctx: &OperationContext) -> Result<SnapshotTransaction, AdminError> {
        ctx.check()?;
        Ok(SnapshotTransaction::new(ctx.clone(), self.committed.load_full()))
    }
}

fn recover_state<B: StorageBackend>(backend: &B) -> Result<CommittedState, AdminError> {
    let Some(image) = backend.read_image().context(BackendSnafu)? else {
        return Ok(CommittedState::default());
    };
    let payload = unframe_image(&image)
        .inspect_err(|e| warn!(error = %e, "Persisted admin image failed integrity checks"))
        .context(BackendSnafu)?;
    codec::decode(payload).context(CodecSnafu)
}
