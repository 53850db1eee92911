//! Core types for the Arbor tree administration store.
//!
//! This crate provides the foundational types shared by storage backends and
//! their callers:
//! - The [`Tree`] record, its enumerations and the [`TreeUpdate`] request
//! - Key descriptors and the [`KeyResolver`] seam
//! - Creation and update validation
//! - Machine-readable [`ErrorCode`]s
//! - Configuration, binary codec and tree id generation

pub mod codec;
pub mod config;
pub mod error;
pub mod keys;
pub mod snowflake;
pub mod types;
pub mod validation;

// Re-export commonly used types at crate root
pub use codec::CodecError;
pub use error::ErrorCode;
pub use keys::{
    Ed25519KeyResolver, Ed25519Signer, KeyError, KeyFormat, KeyResolver, PrivateKey, PublicKey,
    Signer, same_key_material,
};
pub use types::*;
pub use validation::{ValidationError, validate_tree_for_creation, validate_tree_for_update};
