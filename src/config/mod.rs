//! Configuration management for passvault
//!
//! Settings are layered, highest priority last:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables
//!
//! # Usage
//!
//! ```no_run
//! use passvault::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Passes stored in: {}", config.store.path.display());
//! ```
//!
//! # Environment Variables
//!
//! Any key can be overridden with `PASSVAULT__<section>__<key>`:
//! - `PASSVAULT__INGEST__MARK_LIMIT=2MB`
//! - `PASSVAULT__STORE__PATH=/data/passes`
//! - `PASSVAULT__LOGGING__JSON=true`
//!
//! # Configuration File
//!
//! Loaded from `config/passvault.toml` unless `PASSVAULT_CONFIG` points
//! elsewhere. A missing file is not an error.

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{Config, IngestConfig, LoggingConfig, StoreConfig};
pub use validation::ValidationError;

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
    /// # Errors
    ///
    /// Returns an error if the file is malformed or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
