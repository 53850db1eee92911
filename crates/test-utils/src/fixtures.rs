//! Reference trees and key material.
//!
//! Two Ed25519 keys back the fixtures: the log key and the map key. The log
//! key is also registered in [`key_resolver`] under [`LOG_KEY_REFERENCE`], so
//! an `External` descriptor with that reference is equivalent to the inline
//! log key.

// Fixture encodings are static and cannot fail.
#![allow(clippy::expect_used)]

use std::sync::Arc;

use arbor_types::{
    Ed25519KeyResolver, HashAlgorithm, HashStrategy, KeyFormat, KeyResolver, PrivateKey,
    PublicKey, SignatureAlgorithm, Tree, TreeType,
};
use ed25519_dalek::{SigningKey, pkcs8::EncodePrivateKey};

/// Seed of the key signing [`log_tree`].
pub const LOG_KEY_SEED: [u8; 32] = [0x11; 32];

/// Seed of the key signing [`map_tree`].
pub const MAP_KEY_SEED: [u8; 32] = [0x22; 32];

/// Reference under which [`key_resolver`] holds the log key.
pub const LOG_KEY_REFERENCE: &str = "kms://arbor-test/llamas-log";

/// Raw-seed descriptor for `seed`.
pub fn raw_key(seed: [u8; 32]) -> PrivateKey {
    PrivateKey::Encoded { format: KeyFormat::RawSeed, bytes: seed.to_vec() }
}

/// PKCS#8 DER descriptor for the same key material as [`raw_key`].
pub fn pkcs8_der_key(seed: [u8; 32]) -> PrivateKey {
    let der = SigningKey::from_bytes(&seed).to_pkcs8_der().expect("encode pkcs8 der");
    PrivateKey::Encoded { format: KeyFormat::Pkcs8Der, bytes: der.as_bytes().to_vec() }
}

/// Public key matching `seed`.
pub fn public_key(seed: [u8; 32]) -> PublicKey {
    PublicKey::new(SigningKey::from_bytes(&seed).verifying_key().to_bytes().to_vec())
}

/// External descriptor resolving to the log key through [`key_resolver`].
pub fn log_key_reference() -> PrivateKey {
    PrivateKey::External { reference: LOG_KEY_REFERENCE.to_string() }
}

/// Resolver that decodes inline keys and knows [`LOG_KEY_REFERENCE`].
///
/// Stores under test must be built with this resolver for the conformance
/// suite to pass.
pub fn key_resolver() -> Arc<dyn KeyResolver> {
    Arc::new(
        Ed25519KeyResolver::new().with_reference(LOG_KEY_REFERENCE, pkcs8_der_key(LOG_KEY_SEED)),
    )
}

/// A valid log tree, ready for creation.
pub fn log_tree() -> Tree {
    Tree::builder()
        .tree_type(TreeType::Log)
        .hash_strategy(HashStrategy::Rfc6962Sha256)
        .hash_algorithm(HashAlgorithm::Sha256)
        .signature_algorithm(SignatureAlgorithm::Ed25519)
        .display_name("Llamas Log")
        .description("Registry of publicly-owned llamas")
        .private_key(raw_key(LOG_KEY_SEED))
        .public_key(public_key(LOG_KEY_SEED))
        .build()
}

/// A valid map tree, ready for creation.
pub fn map_tree() -> Tree {
    Tree::builder()
        .tree_type(TreeType::Map)
        .hash_strategy(HashStrategy::TestMapHasher)
        .hash_algorithm(HashAlgorithm::Sha256)
        .signature_algorithm(SignatureAlgorithm::Ed25519)
        .display_name("Llamas Map")
        .description("Key Transparency map for all your digital llama needs.")
        .private_key(pkcs8_der_key(MAP_KEY_SEED))
        .public_key(public_key(MAP_KEY_SEED))
        .build()
}
