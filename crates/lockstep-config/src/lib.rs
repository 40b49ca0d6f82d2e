//! Lockstep Configuration
//!
//! Restore settings come from three places, later ones winning:
//! 1. Global config (~/.lockstep/config.toml)
//! 2. The project's `[restore]` table (lockstep.toml)
//! 3. Environment variables (LOCKSTEP_*)
//!
//! # Example
//!
//! ```no_run
//! use lockstep_config::ConfigLoader;
//! use std::path::Path;
//!
//! let mut loader = ConfigLoader::new();
//! let settings = loader.load(Path::new("lockstep.toml")).unwrap();
//! ```

pub mod global;
pub mod loader;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Package source '{url}' is listed more than once in {field}")]
    DuplicateSource { field: String, url: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Home directory not found")]
    HomeNotFound,
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

pub use global::{GlobalConfig, PackagesConfig, SourceConfig};
pub use loader::{ConfigLoader, PackageSource, RestoreSettings};
