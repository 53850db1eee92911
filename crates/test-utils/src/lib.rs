//! Shared test support for Arbor admin storage.
//!
//! - [`AdminStorageTester`] - conformance suite every [`AdminStorage`]
//!   implementation must pass
//! - [`fixtures`] - reference log and map trees plus matching key material
//! - [`strategies`] - proptest strategies for trees and updates
//! - [`TestDir`] - managed temporary directory
//!
//! [`AdminStorage`]: arbor_storage::AdminStorage

#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::disallowed_methods))]

mod conformance;
pub mod fixtures;
pub mod strategies;
mod test_dir;

pub use conformance::{AdminStorageTester, TreeSpec};
pub use test_dir::TestDir;
