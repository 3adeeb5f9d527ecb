//! Configuration management for cxy-export
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use cxy_export::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("API base: {}", config.api.base_url);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `CXY_EXPORT__<section>__<key>`
//!
//! Examples:
//! - `CXY_EXPORT__API__BASE_URL=http://localhost:9000/api`
//! - `CXY_EXPORT__EXPORT__CHECK_INTERVAL=2s`
//! - `CXY_EXPORT__POLLING__MAX_ATTEMPTS=120`
//!
//! The API key may also be given as plain `CXY_API_KEY`.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/cxy-export.toml`.
//! This can be overridden using the `CXY_EXPORT_CONFIG` environment variable
//! or the `--config` flag.

mod models;
mod sources;
mod validation;

// Re-export public types
pub use crate::humanize::HumanDuration;
pub use models::{
    ApiConfig, BackoffKind, Config, ExportConfig, PollingConfig, ReportsConfig, StorageConfig,
};
pub use validation::ValidationError;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`CXY_EXPORT__*`, then `CXY_API_KEY` for the key)
    /// 2. TOML file (default: `config/cxy-export.toml`)
    /// 3. Default values
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file is malformed
    /// - Validation fails (no API key, bad base URL, zero intervals, etc.)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(None)
    }

    /// Like [`Config::load`], with an explicit file taking precedence over
    /// `CXY_EXPORT_CONFIG`
    pub fn load_with(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = sources::load(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Key is present once validation passed
    pub fn api_key(&self) -> &str {
        self.api.api_key.as_deref().unwrap_or_default()
    }
}
