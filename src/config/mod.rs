//! Configuration management for circlelog
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use circlelog::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Local buffer at: {}", config.local.dir.display());
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `CIRCLELOG__<section>__<key>`
//!
//! Examples:
//! - `CIRCLELOG__LOCAL__ENABLED=false`
//! - `CIRCLELOG__CATEGORIES__DB=false`
//! - `CIRCLELOG__PARTITIONS__REFRESH_INTERVAL=6h`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/circlelog.toml`.
//! This can be overridden using the `CIRCLELOG_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::{ByteSize, HumanDuration};
pub use models::{
    ArchiveConfig, ArchiveProvider, CategoryToggles, Config, DedupConfig, LocalConfig,
    PartitionConfig, SearchConfig, ServerConfig,
};
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
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`CIRCLELOG__*`)
    /// 2. TOML file (default: `config/circlelog.toml`)
    /// 3. Default values
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

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
