//! Storage engine configuration for commits and id allocation.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Upper bound on id allocation attempts per created tree.
const MAX_ID_ATTEMPTS_LIMIT: u32 = 1024;

/// Storage layer configuration.
///
/// # Validation Rules
///
/// - `max_id_attempts` must be 1-1024
///
/// # Example
///
/// ```
/// # use arbor_types::config::StorageConfig;
/// let config = StorageConfig::builder()
///     .sync_on_commit(false)
///     .max_id_attempts(16)
///     .build()
///     .expect("valid storage config");
/// assert!(!config.sync_on_commit);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StorageConfig {
    /// Whether to fsync the image on every commit.
    ///
    /// Disabling trades durability of the last commits for latency.
    #[serde(default = "default_sync_on_commit")]
    pub sync_on_commit: bool,
    /// How many fresh ids to draw before giving up on a collision streak.
    #[serde(default = "default_max_id_attempts")]
    pub max_id_attempts: u32,
}

#[bon::bon]
impl StorageConfig {
    /// Creates a new storage configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if `max_id_attempts` is outside 1-1024.
    #[builder]
    pub fn new(
        #[builder(default = default_sync_on_commit())] sync_on_commit: bool,
        #[builder(default = default_max_id_attempts())] max_id_attempts: u32,
    ) -> Result<Self, ConfigError> {
        let config = Self { sync_on_commit, max_id_attempts };
        config.validate()?;
        Ok(config)
    }
}

impl StorageConfig {
    /// Validates the configuration values.
    ///
    /// Call after deserialization to ensure values are within valid ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_id_attempts == 0 || self.max_id_attempts > MAX_ID_ATTEMPTS_LIMIT {
            return Err(ConfigError::Validation {
                message: format!(
                    "max_id_attempts must be 1-{}, got {}",
                    MAX_ID_ATTEMPTS_LIMIT, self.max_id_attempts
                ),
            });
        }
        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { sync_on_commit: default_sync_on_commit(), max_id_attempts: default_max_id_attempts() }
    }
}

fn default_sync_on_commit() -> bool {
    true
}

fn default_max_id_attempts() -> u32 {
    8
}
