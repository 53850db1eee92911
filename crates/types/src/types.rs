//! Core type definitions for Arbor.
//!
//! - Identifier types ([`TreeId`])
//! - The [`Tree`] administrative record and its enumerations
//! - The explicit [`TreeUpdate`] request applied by `update_tree`

use std::{fmt, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::keys::{PrivateKey, PublicKey};

// ============================================================================
// Identifier Types
// ============================================================================

/// Generates a newtype wrapper around a numeric type for type-safe identifiers.
///
/// Each generated type provides:
/// - Standard derives: Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord
/// - Serde with `#[serde(transparent)]` for wire format compatibility
/// - `From<inner>` and `Into<inner>` conversions
/// - `Display` with a semantic prefix (e.g., `tree:123`)
/// - `new()` constructor and `value()` accessor
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident, $inner:ty, $prefix:expr
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name($inner);

        impl $name {
            /// Creates a new identifier from a raw value.
            #[inline]
            pub const fn new(value: $inner) -> Self {
                Self(value)
            }

            /// Returns the raw numeric value.
            #[inline]
            pub const fn value(self) -> $inner {
                self.0
            }
        }

        impl From<$inner> for $name {
            #[inline]
            fn from(value: $inner) -> Self {
                Self(value)
            }
        }

        impl From<$name> for $inner {
            #[inline]
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}:{}", $prefix, self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = <$inner as std::str::FromStr>::Err;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                s.parse::<$inner>().map(Self)
            }
        }
    };
}

define_id!(
    /// Server-assigned identifier of a tree.
    ///
    /// Wraps an `i64`. Zero means "not yet assigned" and is only valid on
    /// creation input; every persisted tree has a positive id.
    ///
    /// # Display
    ///
    /// Formats with `tree:` prefix: `tree:42`.
    TreeId, i64, "tree"
);

impl TreeId {
    /// The placeholder id carried by a tree that has not been created yet.
    pub const UNASSIGNED: TreeId = TreeId::new(0);

    /// Whether the storage layer has assigned this id.
    #[inline]
    pub const fn is_assigned(self) -> bool {
        self.0 != 0
    }
}

// ============================================================================
// Enumerations
// ============================================================================

/// Kind of verifiable structure a tree describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeType {
    /// Unset or unrecognized value. Never valid on a stored tree.
    #[default]
    Unknown,
    /// Append-only verifiable log.
    Log,
    /// Verifiable key/value map.
    Map,
}

/// Operational state of a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeState {
    /// Unset or unrecognized value. Never valid on a stored tree.
    #[default]
    Unknown,
    /// Tree accepts reads and writes.
    Active,
    /// Tree is read-only.
    Frozen,
}

/// Hashing strategy used to build the tree's Merkle structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashStrategy {
    /// Unset or unrecognized value.
    #[default]
    Unknown,
    /// RFC 6962 hashing with SHA-256.
    Rfc6962Sha256,
    /// Sparse Merkle map hasher used in tests.
    TestMapHasher,
    /// RFC 6962 hashing over object hashes with SHA-256.
    ObjectRfc6962Sha256,
    /// CONIKS sparse map hashing with SHA-512/256.
    ConiksSha512_256,
    /// CONIKS sparse map hashing with SHA-256.
    ConiksSha256,
}

/// Digest algorithm used when signing tree heads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    /// No digest. Invalid for trees.
    #[default]
    None,
    /// SHA-256.
    Sha256,
}

/// Signature algorithm used for tree heads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureAlgorithm {
    /// No signature. Invalid for trees.
    #[default]
    Anonymous,
    /// RSA signatures.
    Rsa,
    /// ECDSA signatures.
    Ecdsa,
    /// Ed25519 signatures.
    Ed25519,
}

// ============================================================================
// Tree Record
// ============================================================================

/// Administrative record describing one verifiable log or map.
///
/// Identity (`tree_id`) and timestamps are assigned by the storage layer;
/// callers leave them unset when creating a tree.
///
/// # Invariants
///
/// - `deleted == false` iff `delete_time` is `None`.
/// - `create_time <= update_time` on every stored record.
/// - `tree_type`, hashing and signature parameters and `public_key` never
///   change after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
pub struct Tree {
    /// Server-assigned identifier.
    #[builder(default = TreeId::UNASSIGNED)]
    pub tree_id: TreeId,
    /// Log or map.
    pub tree_type: TreeType,
    /// Active or frozen.
    #[builder(default = TreeState::Active)]
    pub tree_state: TreeState,
    /// Merkle hashing strategy.
    pub hash_strategy: HashStrategy,
    /// Digest used for signing.
    pub hash_algorithm: HashAlgorithm,
    /// Signature scheme.
    pub signature_algorithm: SignatureAlgorithm,
    /// Human-readable name (may be empty).
    #[builder(default, into)]
    pub display_name: String,
    /// Free-form description (may be empty).
    #[builder(default, into)]
    pub description: String,
    /// Signing key descriptor.
    pub private_key: Option<PrivateKey>,
    /// Verification key published for the tree.
    pub public_key: Option<PublicKey>,
    /// When the tree was created.
    pub create_time: Option<DateTime<Utc>>,
    /// When the tree was last modified.
    pub update_time: Option<DateTime<Utc>>,
    /// Soft-delete flag.
    #[builder(default)]
    pub deleted: bool,
    /// When the tree was soft-deleted.
    pub delete_time: Option<DateTime<Utc>>,
    /// Upper bound between signed tree heads.
    #[builder(default)]
    pub max_root_duration: Duration,
    /// Backend-defined settings blob.
    pub storage_settings: Option<Vec<u8>>,
}

impl Tree {
    /// Compares two trees field by field, ignoring `storage_settings`.
    ///
    /// Storage settings are backend-defined and may legitimately differ
    /// between implementations holding the same logical tree.
    #[must_use]
    pub fn eq_ignoring_storage_settings(&self, other: &Tree) -> bool {
        let mut other = other.clone();
        other.storage_settings.clone_from(&self.storage_settings);
        *self == other
    }

    /// Whether the tree is soft-deleted.
    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }
}

// ============================================================================
// Update Request
// ============================================================================

/// Explicit set of field assignments applied to a stored tree.
///
/// Every settable field is represented, including read-only ones, so that an
/// attempt to change an immutable field reaches validation and is rejected
/// instead of being silently dropped. Unset fields keep their stored value.
///
/// # Example
///
/// ```
/// use arbor_types::{TreeState, TreeUpdate};
///
/// let update = TreeUpdate::builder()
///     .tree_state(TreeState::Frozen)
///     .display_name("Frozen Tree")
///     .build();
/// assert!(!update.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, bon::Builder)]
pub struct TreeUpdate {
    /// New tree type (read-only; any change is rejected).
    pub tree_type: Option<TreeType>,
    /// New operational state.
    pub tree_state: Option<TreeState>,
    /// New hash strategy (read-only).
    pub hash_strategy: Option<HashStrategy>,
    /// New hash algorithm (read-only).
    pub hash_algorithm: Option<HashAlgorithm>,
    /// New signature algorithm (read-only).
    pub signature_algorithm: Option<SignatureAlgorithm>,
    /// New display name.
    #[builder(into)]
    pub display_name: Option<String>,
    /// New description.
    #[builder(into)]
    pub description: Option<String>,
    /// New private key descriptor; must resolve to the same key material.
    pub private_key: Option<PrivateKey>,
    /// New public key (read-only).
    pub public_key: Option<PublicKey>,
    /// New maximum root duration.
    pub max_root_duration: Option<Duration>,
    /// New backend-defined settings.
    pub storage_settings: Option<Vec<u8>>,
}

impl TreeUpdate {
    /// Whether the update assigns no fields at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == TreeUpdate::default()
    }

    /// Returns a copy of `tree` with every assigned field replaced.
    ///
    /// No validation happens here; the result is checked against the stored
    /// tree before it is persisted.
    #[must_use]
    pub fn apply_to(&self, tree: &Tree) -> Tree {
        let mut updated = tree.clone();
        if let Some(tree_type) = self.tree_type {
            updated.tree_type = tree_type;
        }
        if let Some(tree_state) = self.tree_state {
            updated.tree_state = tree_state;
        }
        if let Some(hash_strategy) = self.hash_strategy {
            updated.hash_strategy = hash_strategy;
        }
        if let Some(hash_algorithm) = self.hash_algorithm {
            updated.hash_algorithm = hash_algorithm;
        }
        if let Some(signature_algorithm) = self.signature_algorithm {
            updated.signature_algorithm = signature_algorithm;
        }
        if let Some(display_name) = &self.display_name {
            updated.display_name.clone_from(display_name);
        }
        if let Some(description) = &self.description {
            updated.description.clone_from(description);
        }
        if let Some(private_key) = &self.private_key {
            updated.private_key = Some(private_key.clone());
        }
        if let Some(public_key) = &self.public_key {
            updated.public_key = Some(public_key.clone());
        }
        if let Some(max_root_duration) = self.max_root_duration {
            updated.max_root_duration = max_root_duration;
        }
        if let Some(storage_settings) = &self.storage_settings {
            updated.storage_settings = Some(storage_settings.clone());
        }
        updated
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::keys::KeyFormat;

    fn sample_tree() -> Tree {
        Tree::builder()
            .tree_type(TreeType::Log)
            .hash_strategy(HashStrategy::Rfc6962Sha256)
            .hash_algorithm(HashAlgorithm::Sha256)
            .signature_algorithm(SignatureAlgorithm::Ed25519)
            .display_name("Llamas Log")
            .private_key(PrivateKey::Encoded { format: KeyFormat::RawSeed, bytes: vec![7; 32] })
            .public_key(PublicKey::new(vec![1, 2, 3]))
            .build()
    }

    #[test]
    fn test_tree_id_display_and_parse() {
        let id = TreeId::new(42);
        assert_eq!(id.to_string(), "tree:42");
        assert_eq!("42".parse::<TreeId>().unwrap(), id);
        assert!(id.is_assigned());
        assert!(!TreeId::UNASSIGNED.is_assigned());
    }

    #[test]
    fn test_builder_defaults() {
        let tree = sample_tree();
        assert_eq!(tree.tree_id, TreeId::UNASSIGNED);
        assert_eq!(tree.tree_state, TreeState::Active);
        assert!(tree.description.is_empty());
        assert!(!tree.deleted);
        assert!(!tree.is_deleted());
        assert!(tree.delete_time.is_none());
        assert!(tree.create_time.is_none());
        assert_eq!(tree.max_root_duration, Duration::ZERO);
    }

    #[test]
    fn test_eq_ignoring_storage_settings() {
        let a = sample_tree();
        let mut b = a.clone();
        b.storage_settings = Some(vec![9, 9]);
        assert_ne!(a, b);
        assert!(a.eq_ignoring_storage_settings(&b));

        b.display_name = "other".to_string();
        assert!(!a.eq_ignoring_storage_settings(&b));
    }

    #[test]
    fn test_empty_update_is_identity() {
        let tree = sample_tree();
        let update = TreeUpdate::default();
        assert!(update.is_empty());
        assert_eq!(update.apply_to(&tree), tree);
    }

    #[test]
    fn test_update_applies_only_assigned_fields() {
        let tree = sample_tree();
        let update = TreeUpdate::builder()
            .tree_state(TreeState::Frozen)
            .description("A Frozen Tree")
            .max_root_duration(Duration::from_secs(60))
            .build();

        let updated = update.apply_to(&tree);
        assert_eq!(updated.tree_state, TreeState::Frozen);
        assert_eq!(updated.description, "A Frozen Tree");
        assert_eq!(updated.max_root_duration, Duration::from_secs(60));
        assert_eq!(updated.display_name, tree.display_name);
        assert_eq!(updated.tree_type, tree.tree_type);
        assert_eq!(updated.private_key, tree.private_key);
    }

    #[test]
    fn test_update_can_express_read_only_changes() {
        let tree = sample_tree();
        let update = TreeUpdate::builder().tree_type(TreeType::Map).build();
        assert_eq!(update.apply_to(&tree).tree_type, TreeType::Map);
    }

    #[test]
    fn test_enum_defaults_are_invalid_markers() {
        assert_eq!(TreeType::default(), TreeType::Unknown);
        assert_eq!(TreeState::default(), TreeState::Unknown);
        assert_eq!(HashStrategy::default(), HashStrategy::Unknown);
        assert_eq!(HashAlgorithm::default(), HashAlgorithm::None);
        assert_eq!(SignatureAlgorithm::default(), SignatureAlgorithm::Anonymous);
    }

    #[test]
    fn test_enum_serde_names() {
        assert_eq!(serde_json::to_string(&TreeState::Frozen).unwrap(), "\"frozen\"");
        assert_eq!(
            serde_json::to_string(&HashStrategy::Rfc6962Sha256).unwrap(),
            "\"rfc6962_sha256\""
        );
    }
}
