//! Binary encoding of persisted records.
//!
//! All on-disk payloads go through [`encode`] and [`decode`] so the storage
//! layer sees a single error type regardless of the record being written.

use serde::{Serialize, de::DeserializeOwned};
use snafu::Snafu;

/// Error type for codec operations.
#[derive(Debug, Snafu)]
pub enum CodecError {
    /// Encoding failed.
    #[snafu(display("Encoding failed: {source}"))]
    Encode {
        /// The underlying postcard error.
        source: postcard::Error,
    },

    /// Decoding failed.
    #[snafu(display("Decoding failed: {source}"))]
    Decode {
        /// The underlying postcard error.
        source: postcard::Error,
    },
}

/// Encodes a value to bytes using postcard serialization.
///
/// # Errors
///
/// Returns `CodecError::Encode` if serialization fails.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    postcard::to_allocvec(value).map_err(|source| CodecError::Encode { source })
}

/// Decodes bytes to a value using postcard deserialization.
///
/// # Errors
///
/// Returns `CodecError::Decode` if deserialization fails.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    postcard::from_bytes(bytes).map_err(|source| CodecError::Decode { source })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;

    use super::*;
    use crate::{
        keys::{KeyFormat, PrivateKey, PublicKey},
        types::{HashAlgorithm, HashStrategy, SignatureAlgorithm, Tree, TreeId, TreeType},
    };

    fn stored_tree() -> Tree {
        let now = Utc::now();
        Tree::builder()
            .tree_id(TreeId::new(98765))
            .tree_type(TreeType::Map)
            .hash_strategy(HashStrategy::ConiksSha512_256)
            .hash_algorithm(HashAlgorithm::Sha256)
            .signature_algorithm(SignatureAlgorithm::Ed25519)
            .display_name("Llamas Map")
            .private_key(PrivateKey::External { reference: "kms://llamas".to_string() })
            .public_key(PublicKey::new(vec![4; 32]))
            .create_time(now)
            .update_time(now)
            .deleted(true)
            .delete_time(now)
            .max_root_duration(Duration::from_millis(1500))
            .storage_settings(vec![0xde, 0xad])
            .build()
    }

    #[test]
    fn test_tree_roundtrip_preserves_every_field() {
        let tree = stored_tree();
        let bytes = encode(&tree).expect("encode tree");
        let decoded: Tree = decode(&bytes).expect("decode tree");
        assert_eq!(decoded, tree);
    }

    #[test]
    fn test_inline_key_roundtrip() {
        let key = PrivateKey::Encoded { format: KeyFormat::Pkcs8Pem, bytes: b"-----BEGIN".to_vec() };
        let decoded: PrivateKey = decode(&encode(&key).unwrap()).unwrap();
        assert_eq!(decoded, key);
    }

    #[test]
    fn test_decode_truncated_tree() {
        let bytes = encode(&stored_tree()).expect("encode");
        let result: Result<Tree, _> = decode(&bytes[..bytes.len() / 2]);
        assert!(matches!(result, Err(CodecError::Decode { .. })));
    }

    #[test]
    fn test_decode_empty_input() {
        let err = decode::<u64>(&[]).unwrap_err();
        assert!(err.to_string().starts_with("Decoding failed:"), "got: {err}");
    }

    #[test]
    fn test_codec_error_keeps_source() {
        use std::error::Error;

        let err = decode::<String>(&[0xFF]).unwrap_err();
        assert!(err.source().is_some(), "CodecError should carry the postcard error");
    }
}
