//! `lru_dict` configuration module.
//!
//! Provides configuration file support via `lru_dict.toml`, environment
//! variables, and runtime overrides.
//!
//! # Priority (highest to lowest)
//!
//! 1. Runtime overrides (constructing [`LruDictConfig`] directly)
//! 2. Environment variables (`LRUDICT_*`)
//! 3. Configuration file (`lru_dict.toml`)
//! 4. Default values

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::dict::purge_queue::DEFAULT_PENDING_MAX;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to parse configuration file.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue {
        /// Configuration key that failed validation.
        key: String,
        /// Validation error message.
        message: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Tunables for an [`crate::dict::LruDict`] instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LruDictConfig {
    /// Whether `try_lock`-based reentrant-write detection is enabled by
    /// default. When `true`, a write contending on an already-held
    /// critical section is refused with `Error::Busy`. When `false`, it
    /// blocks instead, serializing genuine cross-thread contention at the
    /// cost of a same-thread reentrant call deadlocking.
    pub detect_conflict: bool,

    /// Whether purge-queue delivery starts out suspended. While
    /// suspended, evicted entries still accumulate in the purge queue;
    /// only the automatic drain attempted after each write is skipped
    /// until [`crate::dict::LruDict::set_purge_suspended`] resumes it or
    /// [`crate::dict::LruDict::purge`] forces a drain.
    pub purge_suspended: bool,

    /// Number of `(key, value)` pairs processed per critical section
    /// during `update`, after which the lock is released and reacquired.
    pub update_batch_size: usize,

    /// Ceiling on the number of concurrently active drain workers (calls
    /// currently claiming and delivering purge-queue entries to the
    /// callback). Appending an evicted entry is never refused; this only
    /// bounds how many drains — automatic or forced — may be in flight at
    /// once, guarding against unbounded indirect recursion from a
    /// callback that re-enters the dict and evicts further entries.
    pub pending_max: usize,
}

impl Default for LruDictConfig {
    fn default() -> Self {
        Self {
            detect_conflict: true,
            purge_suspended: false,
            update_batch_size: 128,
            pending_max: DEFAULT_PENDING_MAX,
        }
    }
}

impl LruDictConfig {
    /// Loads configuration from default sources: `lru_dict.toml` in the
    /// current directory, overridden by `LRUDICT_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration parsing fails.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("lru_dict.toml")
    }

    /// Loads configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration parsing fails.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("LRUDICT_").split("_").lowercase(false));

        figment
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Creates a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::string(toml_str));

        figment
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.update_batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "update_batch_size".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        if self.pending_max == 0 {
            return Err(ConfigError::InvalidValue {
                key: "pending_max".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// Serializes the configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}
