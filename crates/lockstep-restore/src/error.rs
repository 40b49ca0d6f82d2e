/// Restore error types
use lockstep_config::ConfigError;
use lockstep_package::{PackageError, ResolveError};
use std::path::PathBuf;
use thiserror::Error;

pub type RestoreResult<T> = Result<T, RestoreError>;

/// Failures that stop a restore outright.
///
/// Missing packages, conflicts, cycles and out of date pin files are not
/// errors here; they are log messages on a failed [`crate::RestoreSummary`].
#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("Package error: {0}")]
    Package(#[from] PackageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error at {path}: {error}")]
    IoError {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("Ambiguous project name '{0}': more than one external project matches")]
    AmbiguousProjectName(String),

    #[error("Missing external project reference for '{0}'")]
    MissingExternalReference(String),

    #[error("Unsupported lock artifact version {found}: expected 1 to {supported}")]
    UnsupportedLockFileVersion { found: u32, supported: u32 },

    #[error("Restore was cancelled")]
    Cancelled,

    #[error("Resolution failed: {0}")]
    Resolution(String),
}

impl RestoreError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            error,
        }
    }
}

impl From<ResolveError> for RestoreError {
    fn from(error: ResolveError) -> Self {
        match error {
            ResolveError::Cancelled => Self::Cancelled,
            other => Self::Resolution(other.to_string()),
        }
    }
}
