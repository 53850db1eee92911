//! Field limits applied when validating trees.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Limits for free-text tree fields.
///
/// # Example
///
/// ```
/// # use arbor_types::config::ValidationConfig;
/// let config = ValidationConfig::builder()
///     .max_display_name_bytes(64)
///     .build()
///     .expect("valid validation config");
/// assert_eq!(config.max_description_bytes, 200);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ValidationConfig {
    /// Maximum display name size in bytes.
    ///
    /// Longer names are rejected with `INVALID_ARGUMENT`.
    /// Must be >= 1. Default: 20.
    #[serde(default = "default_max_display_name_bytes")]
    pub max_display_name_bytes: usize,
    /// Maximum description size in bytes.
    ///
    /// Must be >= 1. Default: 200.
    #[serde(default = "default_max_description_bytes")]
    pub max_description_bytes: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_display_name_bytes: default_max_display_name_bytes(),
            max_description_bytes: default_max_description_bytes(),
        }
    }
}

#[bon::bon]
impl ValidationConfig {
    /// Creates a new validation configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any limit is zero.
    #[builder]
    pub fn new(
        #[builder(default = default_max_display_name_bytes())] max_display_name_bytes: usize,
        #[builder(default = default_max_description_bytes())] max_description_bytes: usize,
    ) -> Result<Self, ConfigError> {
        let config = Self { max_display_name_bytes, max_description_bytes };
        config.validate()?;
        Ok(config)
    }
}

impl ValidationConfig {
    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any limit is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_display_name_bytes == 0 {
            return Err(ConfigError::Validation {
                message: "max_display_name_bytes must be >= 1".to_string(),
            });
        }
        if self.max_description_bytes == 0 {
            return Err(ConfigError::Validation {
                message: "max_description_bytes must be >= 1".to_string(),
            });
        }
        Ok(())
    }
}

fn default_max_display_name_bytes() -> usize {
    20
}

fn default_max_description_bytes() -> usize {
    200
}
