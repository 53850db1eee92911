//! Key material descriptors and the key-resolution seam.
//!
//! Trees carry their signing key as a [`PrivateKey`] descriptor: either
//! encoded key bytes tagged with a [`KeyFormat`], or a reference to key
//! material held elsewhere. A [`KeyResolver`] turns a descriptor into a
//! usable [`Signer`]. Two descriptors are equivalent when they resolve to the
//! same key material, regardless of how that material is wrapped.
//!
//! Resolution is an injected dependency of the storage layer; there is no
//! process-wide handler registry.

use std::{collections::HashMap, fmt, sync::Arc};

use ed25519_dalek::{SigningKey, pkcs8::DecodePrivateKey};
use serde::{Deserialize, Serialize};
use snafu::Snafu;

use crate::types::SignatureAlgorithm;

/// Encoding of inline private key bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyFormat {
    /// Raw 32-byte Ed25519 seed.
    RawSeed,
    /// PKCS#8 `PrivateKeyInfo`, DER encoded.
    Pkcs8Der,
    /// PKCS#8 `PrivateKeyInfo`, PEM encoded (UTF-8 bytes).
    Pkcs8Pem,
}

/// Descriptor of a tree's signing key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivateKey {
    /// Key bytes stored inline.
    Encoded {
        /// How `bytes` is encoded.
        format: KeyFormat,
        /// Encoded key material.
        bytes: Vec<u8>,
    },
    /// Key material held outside the record (KMS, HSM, key file).
    External {
        /// Resolver-specific reference, e.g. `kms://projects/p/keys/k`.
        reference: String,
    },
}

// Key bytes never appear in logs or panic messages.
impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encoded { format, bytes } => f
                .debug_struct("Encoded")
                .field("format", format)
                .field("len", &bytes.len())
                .finish(),
            Self::External { reference } => {
                f.debug_struct("External").field("reference", reference).finish()
            },
        }
    }
}

/// Public verification key published for a tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey {
    bytes: Vec<u8>,
}

impl PublicKey {
    /// Wraps encoded public key bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self { bytes: bytes.into() }
    }

    /// Returns the encoded key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Errors from key resolution.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum KeyError {
    /// Inline key bytes could not be decoded.
    #[snafu(display("Malformed {format:?} key: {reason}"))]
    Malformed {
        /// Declared encoding.
        format: KeyFormat,
        /// Decoder message.
        reason: String,
    },

    /// No key material is registered under the reference.
    #[snafu(display("Unknown key reference: {reference}"))]
    UnknownReference {
        /// The unresolved reference.
        reference: String,
    },

    /// A reference pointed at another reference.
    #[snafu(display("Key reference {reference} resolves to another reference"))]
    NestedReference {
        /// The offending reference.
        reference: String,
    },
}

/// A usable signing capability.
pub trait Signer: Send + Sync + fmt::Debug {
    /// Public half of the key material; identifies the capability.
    fn public_key(&self) -> PublicKey;

    /// Signature scheme this signer produces.
    fn algorithm(&self) -> SignatureAlgorithm;

    /// Signs `message`.
    fn sign(&self, message: &[u8]) -> Vec<u8>;
}

/// Turns key descriptors into signers.
pub trait KeyResolver: Send + Sync {
    /// Resolves `key` into a signer.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] if the descriptor cannot be decoded or its
    /// reference is unknown.
    fn resolve(&self, key: &PrivateKey) -> Result<Arc<dyn Signer>, KeyError>;
}

/// Whether two descriptors resolve to the same key material.
///
/// Identical descriptors are equivalent without consulting the resolver.
///
/// # Errors
///
/// Returns [`KeyError`] if either descriptor fails to resolve.
pub fn same_key_material(
    resolver: &dyn KeyResolver,
    a: &PrivateKey,
    b: &PrivateKey,
) -> Result<bool, KeyError> {
    if a == b {
        return Ok(true);
    }
    let a = resolver.resolve(a)?;
    let b = resolver.resolve(b)?;
    Ok(a.public_key() == b.public_key())
}

/// Ed25519 signer over an in-memory key.
pub struct Ed25519Signer {
    key: SigningKey,
}

impl Ed25519Signer {
    /// Wraps a signing key.
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }
}

impl fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519Signer").field("public_key", &self.public_key()).finish()
    }
}

impl Signer for Ed25519Signer {
    fn public_key(&self) -> PublicKey {
        PublicKey::new(self.key.verifying_key().to_bytes().to_vec())
    }

    fn algorithm(&self) -> SignatureAlgorithm {
        SignatureAlgorithm::Ed25519
    }

    fn sign(&self, message: &[u8]) -> Vec<u8> {
        use ed25519_dalek::Signer as _;
        self.key.sign(message).to_bytes().to_vec()
    }
}

/// Resolves Ed25519 keys from inline encodings and a reference table.
///
/// External references are looked up in the table supplied at construction
/// and must point at inline key material.
#[derive(Debug, Default, Clone)]
pub struct Ed25519KeyResolver {
    references: HashMap<String, PrivateKey>,
}

impl Ed25519KeyResolver {
    /// Creates a resolver with an empty reference table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers key material under `reference`.
    #[must_use]
    pub fn with_reference(mut self, reference: impl Into<String>, key: PrivateKey) -> Self {
        self.references.insert(reference.into(), key);
        self
    }
}

impl KeyResolver for Ed25519KeyResolver {
    fn resolve(&self, key: &PrivateKey) -> Result<Arc<dyn Signer>, KeyError> {
        let signing_key = match key {
            PrivateKey::Encoded { format, bytes } => decode_signing_key(*format, bytes)?,
            PrivateKey::External { reference } => match self.references.get(reference) {
                Some(PrivateKey::Encoded { format, bytes }) => decode_signing_key(*format, bytes)?,
                Some(PrivateKey::External { .. }) => {
                    return NestedReferenceSnafu { reference: reference.clone() }.fail();
                },
                None => return UnknownReferenceSnafu { reference: reference.clone() }.fail(),
            },
        };
        Ok(Arc::new(Ed25519Signer::new(signing_key)))
    }
}

fn decode_signing_key(format: KeyFormat, bytes: &[u8]) -> Result<SigningKey, KeyError> {
    match format {
        KeyFormat::RawSeed => {
            let seed = <[u8; 32]>::try_from(bytes).map_err(|_| KeyError::Malformed {
                format,
                reason: format!("expected 32 seed bytes, got {}", bytes.len()),
            })?;
            Ok(SigningKey::from_bytes(&seed))
        },
        KeyFormat::Pkcs8Der => SigningKey::from_pkcs8_der(bytes)
            .map_err(|e| KeyError::Malformed { format, reason: e.to_string() }),
        KeyFormat::Pkcs8Pem => {
            let pem = std::str::from_utf8(bytes)
                .map_err(|e| KeyError::Malformed { format, reason: e.to_string() })?;
            SigningKey::from_pkcs8_pem(pem)
                .map_err(|e| KeyError::Malformed { format, reason: e.to_string() })
        },
    }
}
