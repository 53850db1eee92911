//! Transactional tree administration store for Arbor.
//!
//! This crate provides:
//! - The [`AdminStorage`], [`AdminTx`] and [`ReadOnlyAdminTx`] contract
//! - [`TreeStorage`], a copy-on-write implementation of that contract
//! - In-memory and file [`StorageBackend`]s with a checksummed image format
//! - [`OperationContext`] for deadlines and cancellation

mod admin;
pub mod backend;
mod context;
mod error;
mod storage;
mod transaction;

pub use admin::{AdminStorage, AdminTx, ReadOnlyAdminTx};
pub use backend::{FileBackend, InMemoryBackend, StorageBackend};
pub use context::OperationContext;
pub use error::{AdminError, BackendError, UpdateStage, UpdateTreeError};
pub use storage::TreeStorage;
pub use transaction::{AdminTransaction, SnapshotTransaction, TxStatus};
