//! Proptest strategies for tree records and updates.
//!
//! Generated trees are valid creation input under the default
//! [`ValidationConfig`](arbor_types::config::ValidationConfig) and are signed
//! by one of the [`fixtures`](crate::fixtures) keys.
//!
//! # Usage
//!
//! ```no_run
//! use arbor_test_utils::strategies;
//! use proptest::prelude::*;
//!
//! proptest! {
//!     #[test]
//!     fn created_trees_round_trip(tree in strategies::arb_tree()) {
//!         // create `tree` and read it back
//!     }
//! }
//! ```

use std::time::Duration;

use arbor_types::{
    HashAlgorithm, HashStrategy, PublicKey, SignatureAlgorithm, Tree, TreeState, TreeType,
    TreeUpdate,
};
use proptest::prelude::*;

use crate::fixtures;

/// Display name within the default byte limit, possibly empty.
pub fn arb_display_name() -> impl Strategy<Value = String> {
    "[A-Za-z0-9 ]{0,20}"
}

/// Display name one to twenty bytes over the default limit.
pub fn arb_oversized_display_name() -> impl Strategy<Value = String> {
    "[a-z]{21,40}"
}

/// Description within the default byte limit, possibly empty.
pub fn arb_description() -> impl Strategy<Value = String> {
    "[A-Za-z0-9 .,]{0,200}"
}

/// `Active` or `Frozen`.
pub fn arb_tree_state() -> impl Strategy<Value = TreeState> {
    prop_oneof![Just(TreeState::Active), Just(TreeState::Frozen)]
}

/// Maximum root duration of up to one day, in whole seconds.
pub fn arb_max_root_duration() -> impl Strategy<Value = Duration> {
    (0u64..86_400).prop_map(Duration::from_secs)
}

/// A valid log or map tree, ready for creation.
pub fn arb_tree() -> impl Strategy<Value = Tree> {
    (
        prop_oneof![Just(fixtures::log_tree()), Just(fixtures::map_tree())],
        arb_display_name(),
        arb_description(),
        arb_max_root_duration(),
        proptest::option::of(proptest::collection::vec(any::<u8>(), 0..16)),
    )
        .prop_map(|(mut tree, display_name, description, max_root_duration, settings)| {
            tree.display_name = display_name;
            tree.description = description;
            tree.max_root_duration = max_root_duration;
            tree.storage_settings = settings;
            tree
        })
}

/// An update touching mutable fields only.
pub fn arb_tree_update() -> impl Strategy<Value = TreeUpdate> {
    (
        proptest::option::of(arb_tree_state()),
        proptest::option::of(arb_display_name()),
        proptest::option::of(arb_description()),
        proptest::option::of(arb_max_root_duration()),
    )
        .prop_map(|(tree_state, display_name, description, max_root_duration)| TreeUpdate {
            tree_state,
            display_name,
            description,
            max_root_duration,
            ..TreeUpdate::default()
        })
}

/// Read-only field an update may try to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOnlyChange {
    /// Log to map or back.
    TreeType,
    /// Swap the Merkle hashing strategy.
    HashStrategy,
    /// Drop the signing digest.
    HashAlgorithm,
    /// Switch the signature scheme.
    SignatureAlgorithm,
    /// Publish a different public key.
    PublicKey,
}

impl ReadOnlyChange {
    /// Builds an update that changes this field of `tree` to a different value.
    #[must_use]
    pub fn violating_update(self, tree: &Tree) -> TreeUpdate {
        let mut update = TreeUpdate::default();
        match self {
            Self::TreeType => {
                update.tree_type = Some(match tree.tree_type {
                    TreeType::Log => TreeType::Map,
                    _ => TreeType::Log,
                });
            },
            Self::HashStrategy => {
                update.hash_strategy = Some(match tree.hash_strategy {
                    HashStrategy::Rfc6962Sha256 => HashStrategy::ConiksSha256,
                    _ => HashStrategy::Rfc6962Sha256,
                });
            },
            Self::HashAlgorithm => {
                update.hash_algorithm = Some(match tree.hash_algorithm {
                    HashAlgorithm::Sha256 => HashAlgorithm::None,
                    HashAlgorithm::None => HashAlgorithm::Sha256,
                });
            },
            Self::SignatureAlgorithm => {
                update.signature_algorithm = Some(match tree.signature_algorithm {
                    SignatureAlgorithm::Ed25519 => SignatureAlgorithm::Ecdsa,
                    _ => SignatureAlgorithm::Ed25519,
                });
            },
            Self::PublicKey => {
                let mut bytes =
                    tree.public_key.as_ref().map(|k| k.as_bytes().to_vec()).unwrap_or_default();
                bytes.push(0xFF);
                update.public_key = Some(PublicKey::new(bytes));
            },
        }
        update
    }
}

/// Any [`ReadOnlyChange`].
pub fn arb_read_only_change() -> impl Strategy<Value = ReadOnlyChange> {
    prop_oneof![
        Just(ReadOnlyChange::TreeType),
        Just(ReadOnlyChange::HashStrategy),
        Just(ReadOnlyChange::HashAlgorithm),
        Just(ReadOnlyChange::SignatureAlgorithm),
        Just(ReadOnlyChange::PublicKey),
    ]
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use arbor_types::{config::ValidationConfig, validate_tree_for_creation};
    use proptest::test_runner::TestRunner;

    use super::*;

    #[test]
    fn test_generated_trees_are_valid_creation_input() {
        let resolver = fixtures::key_resolver();
        let config = ValidationConfig::default();
        let mut runner = TestRunner::default();
        runner
            .run(&arb_tree(), |tree| {
                prop_assert!(validate_tree_for_creation(&tree, resolver.as_ref(), &config).is_ok());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_violating_update_changes_the_field() {
        let tree = fixtures::log_tree();
        let mut runner = TestRunner::default();
        runner
            .run(&arb_read_only_change(), |change| {
                let updated = change.violating_update(&tree).apply_to(&tree);
                prop_assert_ne!(updated, tree.clone());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_mutable_updates_never_touch_read_only_fields() {
        let tree = fixtures::map_tree();
        let mut runner = TestRunner::default();
        runner
            .run(&arb_tree_update(), |update| {
                let updated = update.apply_to(&tree);
                prop_assert_eq!(updated.tree_type, tree.tree_type);
                prop_assert_eq!(updated.hash_strategy, tree.hash_strategy);
                prop_assert_eq!(&updated.public_key, &tree.public_key);
                Ok(())
            })
            .unwrap();
    }
}
