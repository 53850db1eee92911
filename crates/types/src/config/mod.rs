//! Configuration types for Arbor.
//!
//! All config structs validate their values at construction time via
//! fallible builders. Post-deserialization validation is available via
//! the `validate()` method on each struct.

// The schemars `JsonSchema` derive macro internally uses `.unwrap()` in its
// expansions.
#![allow(clippy::disallowed_methods)]

mod storage;
mod validation;

use snafu::Snafu;
pub use storage::*;
pub use validation::*;

/// Configuration validation error.
///
/// Returned when a configuration value is outside its valid range.
#[derive(Debug, Snafu)]
pub enum ConfigError {
    /// A configuration value is invalid.
    #[snafu(display("invalid config: {message}"))]
    Validation {
        /// Description of the validation failure.
        message: String,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use super::*;

    // =========================================================================
    // StorageConfig
    // =========================================================================

    #[test]
    fn test_storage_config_defaults_are_valid() {
        let config = StorageConfig::builder().build().expect("defaults should be valid");
        assert!(config.sync_on_commit);
        assert_eq!(config.max_id_attempts, 8);
        assert_eq!(config, StorageConfig::default());
    }

    #[test]
    fn test_storage_config_rejects_zero_id_attempts() {
        let err = StorageConfig::builder().max_id_attempts(0).build().unwrap_err();
        assert!(err.to_string().contains("max_id_attempts"), "got: {err}");
    }

    #[test]
    fn test_storage_config_rejects_excessive_id_attempts() {
        assert!(StorageConfig::builder().max_id_attempts(1024).build().is_ok());
        assert!(StorageConfig::builder().max_id_attempts(1025).build().is_err());
    }

    #[test]
    fn test_storage_config_serde_defaults() {
        let config: StorageConfig = serde_json::from_str("{}").expect("deserialize");
        assert_eq!(config, StorageConfig::default());

        let config: StorageConfig =
            serde_json::from_str(r#"{"sync_on_commit": false}"#).expect("deserialize");
        assert!(!config.sync_on_commit);
        assert!(config.validate().is_ok());
    }

    // =========================================================================
    // ValidationConfig
    // =========================================================================

    #[test]
    fn test_validation_config_defaults() {
        let config = ValidationConfig::builder().build().expect("defaults should be valid");
        assert_eq!(config.max_display_name_bytes, 20);
        assert_eq!(config.max_description_bytes, 200);
        assert_eq!(config, ValidationConfig::default());
    }

    #[test]
    fn test_validation_config_rejects_zero_limits() {
        assert!(ValidationConfig::builder().max_display_name_bytes(0).build().is_err());
        assert!(ValidationConfig::builder().max_description_bytes(0).build().is_err());
    }

    #[test]
    fn test_validation_config_post_deserialize_validation() {
        let config: ValidationConfig =
            serde_json::from_str(r#"{"max_description_bytes": 0}"#).expect("deserialize");
        assert!(config.validate().is_err());
    }
}
