//! Global Configuration (~/.lockstep/config.toml)

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Global user configuration from ~/.lockstep/config.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Package sources, in lookup order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceConfig>,

    /// Package folder locations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packages: Option<PackagesConfig>,
}

/// One `[[sources]]` entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct SourceConfig {
    /// Feed URL or local directory
    pub url: String,

    /// Accept a plain `http://` feed without warning
    #[serde(default)]
    pub allow_insecure_http: bool,
}

/// `[packages]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct PackagesConfig {
    /// Where restored packages are installed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_packages_folder: Option<PathBuf>,

    /// Read-only folders searched after the global packages folder
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallback_folders: Vec<PathBuf>,
}

impl GlobalConfig {
    /// Load global configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Reject empty and repeated source URLs
    pub fn validate(&self) -> ConfigResult<()> {
        validate_sources("sources", &self.sources)
    }

    /// Get the global config file path (~/.lockstep/config.toml)
    pub fn global_config_path() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".lockstep").join("config.toml"))
    }

    pub fn global_packages_folder(&self) -> Option<&Path> {
        self.packages
            .as_ref()
            .and_then(|p| p.global_packages_folder.as_deref())
    }

    pub fn fallback_folders(&self) -> &[PathBuf] {
        self.packages
            .as_ref()
            .map(|p| p.fallback_folders.as_slice())
            .unwrap_or_default()
    }

    /// Merge another global config into this one
    /// Other config takes precedence for non-empty values
    pub fn merge(&mut self, other: &GlobalConfig) {
        if !other.sources.is_empty() {
            self.sources = other.sources.clone();
        }
        if other.packages.is_some() {
            self.packages = other.packages.clone();
        }
    }
}

pub(crate) fn validate_sources(field: &str, sources: &[SourceConfig]) -> ConfigResult<()> {
    let mut seen = HashSet::new();
    for source in sources {
        let url = source.url.trim();
        if url.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: field.to_string(),
                reason: "source url must not be empty".to_string(),
            });
        }
        if !seen.insert(url.trim_end_matches('/').to_ascii_lowercase()) {
            return Err(ConfigError::DuplicateSource {
                field: field.to_string(),
                url: url.to_string(),
            });
        }
    }
    Ok(())
}
