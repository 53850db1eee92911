//! Validation of tree records on creation and update.
//!
//! Creation checks that a caller-supplied [`Tree`] is complete and carries no
//! storage-assigned fields. Update checks compare the stored record with the
//! record produced by applying a [`TreeUpdate`](crate::TreeUpdate): read-only
//! fields must be unchanged and the private key must still resolve to the same
//! key material. Both paths finish with the checks shared by every stored
//! record.
//!
//! ## Read-only Fields
//!
//! `tree_id`, `tree_type`, `hash_strategy`, `hash_algorithm`,
//! `signature_algorithm`, `public_key`, `create_time`, `deleted` and
//! `delete_time`. Lifecycle fields change only through the dedicated delete
//! and undelete operations.

use std::fmt;

use crate::{
    config::ValidationConfig,
    keys::{KeyResolver, same_key_material},
    types::{HashAlgorithm, HashStrategy, SignatureAlgorithm, Tree, TreeState, TreeType},
};

/// Validation error with structured context.
///
/// Contains the specific constraint that was violated and the field name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field that failed validation.
    pub field: String,
    /// Description of the violated constraint.
    pub constraint: String,
}

impl ValidationError {
    fn new(field: &str, constraint: impl Into<String>) -> Self {
        Self { field: field.to_string(), constraint: constraint.into() }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.constraint)
    }
}

impl std::error::Error for ValidationError {}

/// Validates a tree submitted for creation.
///
/// The tree must:
/// - Be `Active` and not deleted, with no `delete_time`
/// - Carry no `tree_id`, `create_time` or `update_time`
/// - Declare a known tree type, hash strategy, hash algorithm and signature
///   algorithm
/// - Carry a public key and a private key the resolver can use
/// - Declare the signature algorithm of that private key
/// - Respect the text limits in `config`
///
/// # Errors
///
/// Returns [`ValidationError`] naming the first offending field.
pub fn validate_tree_for_creation(
    tree: &Tree,
    resolver: &dyn KeyResolver,
    config: &ValidationConfig,
) -> Result<(), ValidationError> {
    if tree.tree_state != TreeState::Active {
        return Err(ValidationError::new(
            "tree_state",
            format!("must be active on creation, got {:?}", tree.tree_state),
        ));
    }
    if tree.tree_id.is_assigned() {
        return Err(ValidationError::new(
            "tree_id",
            format!("is assigned by storage, got {}", tree.tree_id),
        ));
    }
    if tree.create_time.is_some() {
        return Err(ValidationError::new("create_time", "is assigned by storage"));
    }
    if tree.update_time.is_some() {
        return Err(ValidationError::new("update_time", "is assigned by storage"));
    }
    if tree.is_deleted() {
        return Err(ValidationError::new("deleted", "must be false on creation"));
    }
    if tree.delete_time.is_some() {
        return Err(ValidationError::new("delete_time", "must be unset on creation"));
    }

    let Some(private_key) = &tree.private_key else {
        return Err(ValidationError::new("private_key", "is required"));
    };
    let signer = resolver
        .resolve(private_key)
        .map_err(|e| ValidationError::new("private_key", format!("cannot be resolved: {e}")))?;
    if tree.public_key.is_none() {
        return Err(ValidationError::new("public_key", "is required"));
    }

    validate_settings(tree)?;
    if signer.algorithm() != tree.signature_algorithm {
        return Err(ValidationError::new(
            "signature_algorithm",
            format!("does not match private key algorithm {:?}", signer.algorithm()),
        ));
    }
    validate_mutable_fields(tree, config)
}

/// Validates the result of applying an update to a stored tree.
///
/// `stored` is the record as currently committed; `updated` is the record
/// that would be written.
///
/// # Errors
///
/// Returns [`ValidationError`] if a read-only field changed, the private key
/// no longer resolves to the stored key material, or a mutable field is
/// invalid.
pub fn validate_tree_for_update(
    stored: &Tree,
    updated: &Tree,
    resolver: &dyn KeyResolver,
    config: &ValidationConfig,
) -> Result<(), ValidationError> {
    check_read_only("tree_id", stored.tree_id == updated.tree_id)?;
    check_read_only("tree_type", stored.tree_type == updated.tree_type)?;
    check_read_only("hash_strategy", stored.hash_strategy == updated.hash_strategy)?;
    check_read_only("hash_algorithm", stored.hash_algorithm == updated.hash_algorithm)?;
    check_read_only(
        "signature_algorithm",
        stored.signature_algorithm == updated.signature_algorithm,
    )?;
    check_read_only("public_key", stored.public_key == updated.public_key)?;
    check_read_only("create_time", stored.create_time == updated.create_time)?;
    check_read_only("deleted", stored.deleted == updated.deleted)?;
    check_read_only("delete_time", stored.delete_time == updated.delete_time)?;

    match (&stored.private_key, &updated.private_key) {
        (_, None) => return Err(ValidationError::new("private_key", "is required")),
        (Some(old), Some(new)) => {
            let same = same_key_material(resolver, old, new).map_err(|e| {
                ValidationError::new("private_key", format!("cannot be resolved: {e}"))
            })?;
            if !same {
                return Err(ValidationError::new(
                    "private_key",
                    "must resolve to the same key material",
                ));
            }
        },
        (None, Some(_)) => {
            return Err(ValidationError::new("private_key", "stored tree has no key to replace"));
        },
    }

    validate_mutable_fields(updated, config)
}

fn check_read_only(field: &str, unchanged: bool) -> Result<(), ValidationError> {
    if unchanged { Ok(()) } else { Err(ValidationError::new(field, "is read-only")) }
}

fn validate_settings(tree: &Tree) -> Result<(), ValidationError> {
    if tree.tree_type == TreeType::Unknown {
        return Err(ValidationError::new("tree_type", "must be log or map"));
    }
    if tree.hash_strategy == HashStrategy::Unknown {
        return Err(ValidationError::new("hash_strategy", "must be set"));
    }
    if tree.hash_algorithm == HashAlgorithm::None {
        return Err(ValidationError::new("hash_algorithm", "must be set"));
    }
    if tree.signature_algorithm == SignatureAlgorithm::Anonymous {
        return Err(ValidationError::new("signature_algorithm", "must be set"));
    }
    Ok(())
}

/// Checks shared by creation and update.
fn validate_mutable_fields(tree: &Tree, config: &ValidationConfig) -> Result<(), ValidationError> {
    if tree.tree_state == TreeState::Unknown {
        return Err(ValidationError::new("tree_state", "must be active or frozen"));
    }
    if tree.display_name.len() > config.max_display_name_bytes {
        return Err(ValidationError::new(
            "display_name",
            format!(
                "length {} bytes exceeds maximum {} bytes",
                tree.display_name.len(),
                config.max_display_name_bytes
            ),
        ));
    }
    if tree.description.len() > config.max_description_bytes {
        return Err(ValidationError::new(
            "description",
            format!(
                "length {} bytes exceeds maximum {} bytes",
                tree.description.len(),
                config.max_description_bytes
            ),
        ));
    }
    Ok(())
}
