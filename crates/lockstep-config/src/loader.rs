//! Configuration Loader
//!
//! Merges the global config, the project's `[restore]` table and
//! `LOCKSTEP_*` environment variables into [`RestoreSettings`].

use crate::global::{validate_sources, GlobalConfig, SourceConfig};
use crate::{ConfigError, ConfigResult};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const ENV_PACKAGES: &str = "LOCKSTEP_PACKAGES";
pub const ENV_FORCE_EVALUATE: &str = "LOCKSTEP_FORCE_EVALUATE";
pub const ENV_LOCKED_MODE: &str = "LOCKSTEP_LOCKED_MODE";
pub const ENV_NO_CACHE: &str = "LOCKSTEP_NO_CACHE";

/// Configuration loader
///
/// Precedence, lowest first:
/// 1. Global config (~/.lockstep/config.toml)
/// 2. Project `[restore]` table
/// 3. Environment variables (LOCKSTEP_*)
pub struct ConfigLoader {
    /// Cached global config path
    global_config_path: Option<PathBuf>,
}

/// A package source after merging
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSource {
    pub url: String,
    pub allow_insecure_http: bool,
}

impl PackageSource {
    pub fn is_http(&self) -> bool {
        let url = self.url.to_ascii_lowercase();
        url.starts_with("http://") || url.starts_with("https://")
    }

    /// Plain http feed that was not explicitly allowed
    pub fn is_insecure(&self) -> bool {
        self.url.to_ascii_lowercase().starts_with("http://") && !self.allow_insecure_http
    }
}

impl From<&SourceConfig> for PackageSource {
    fn from(source: &SourceConfig) -> Self {
        Self {
            url: source.url.trim().to_string(),
            allow_insecure_http: source.allow_insecure_http,
        }
    }
}

/// Merged settings for one restore
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreSettings {
    pub sources: Vec<PackageSource>,
    pub global_packages_folder: PathBuf,
    pub fallback_folders: Vec<PathBuf>,
    /// Ignore the no-op cache and the existing pin file
    pub force_evaluate: bool,
    /// Overrides the project's own locked-mode switch when set
    pub locked_mode: Option<bool>,
    /// Never read or write the no-op cache
    pub no_cache: bool,
}

impl RestoreSettings {
    pub fn http_sources(&self) -> impl Iterator<Item = &PackageSource> {
        self.sources.iter().filter(|s| s.is_http())
    }

    pub fn insecure_sources(&self) -> impl Iterator<Item = &PackageSource> {
        self.sources.iter().filter(|s| s.is_insecure())
    }
}

/// The parts of lockstep.toml this crate reads. Everything else belongs to
/// the manifest parser.
#[derive(Debug, Default, Deserialize)]
struct ProjectFile {
    #[serde(default)]
    restore: ProjectRestoreTable,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ProjectRestoreTable {
    #[serde(default)]
    sources: Option<Vec<SourceConfig>>,
    #[serde(default)]
    global_packages_folder: Option<PathBuf>,
    #[serde(default)]
    fallback_folders: Option<Vec<PathBuf>>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            global_config_path: None,
        }
    }

    /// Read the global config from `path` instead of the home directory
    pub fn with_global_config_path(path: impl Into<PathBuf>) -> Self {
        Self {
            global_config_path: Some(path.into()),
        }
    }

    /// Load settings for the project manifest at `project_file`.
    ///
    /// A missing global config or project file contributes nothing.
    /// Relative paths in the project file are taken from its directory.
    pub fn load(&mut self, project_file: &Path) -> ConfigResult<RestoreSettings> {
        let global = self.load_global_config()?;
        let project = load_project_table(project_file)?;
        let project_dir = project_file.parent().unwrap_or(Path::new(""));

        let sources: Vec<PackageSource> = match &project.sources {
            Some(sources) => {
                validate_sources("restore.sources", sources)?;
                sources.iter().map(PackageSource::from).collect()
            }
            None => global.sources.iter().map(PackageSource::from).collect(),
        };

        let global_packages_folder = match project.global_packages_folder {
            Some(folder) => project_dir.join(folder),
            None => match global.global_packages_folder() {
                Some(folder) => folder.to_path_buf(),
                None => Self::global_config_dir()?.join("packages"),
            },
        };

        let fallback_folders = match project.fallback_folders {
            Some(folders) => folders.into_iter().map(|f| project_dir.join(f)).collect(),
            None => global.fallback_folders().to_vec(),
        };

        let settings = RestoreSettings {
            sources,
            global_packages_folder,
            fallback_folders,
            force_evaluate: false,
            locked_mode: None,
            no_cache: false,
        };
        self.apply_env_overrides(settings)
    }

    /// Load global configuration, or defaults when there is none
    fn load_global_config(&mut self) -> ConfigResult<GlobalConfig> {
        let path = match &self.global_config_path {
            Some(path) => path.clone(),
            None => match GlobalConfig::global_config_path() {
                Ok(path) => {
                    self.global_config_path = Some(path.clone());
                    path
                }
                Err(ConfigError::HomeNotFound) => return Ok(GlobalConfig::default()),
                Err(e) => return Err(e),
            },
        };

        if !path.exists() {
            return Ok(GlobalConfig::default());
        }

        debug!(path = %path.display(), "Loading global config");
        GlobalConfig::load_from_file(&path)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&self, mut settings: RestoreSettings) -> ConfigResult<RestoreSettings> {
        if let Ok(packages) = env::var(ENV_PACKAGES) {
            if !packages.trim().is_empty() {
                settings.global_packages_folder = PathBuf::from(packages);
            }
        }

        if let Some(force) = env_flag(ENV_FORCE_EVALUATE)? {
            settings.force_evaluate = force;
        }

        if let Some(locked) = env_flag(ENV_LOCKED_MODE)? {
            settings.locked_mode = Some(locked);
        }

        if let Some(no_cache) = env_flag(ENV_NO_CACHE)? {
            settings.no_cache = no_cache;
        }

        Ok(settings)
    }

    /// Get the global configuration directory (~/.lockstep)
    pub fn global_config_dir() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".lockstep"))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn load_project_table(project_file: &Path) -> ConfigResult<ProjectRestoreTable> {
    if !project_file.exists() {
        return Ok(ProjectRestoreTable::default());
    }
    let content = std::fs::read_to_string(project_file)?;
    let file: ProjectFile = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
        file: project_file.to_path_buf(),
        error: e,
    })?;
    Ok(file.restore)
}

fn env_flag(name: &str) -> ConfigResult<Option<bool>> {
    let Ok(value) = env::var(name) else {
        return Ok(None);
    };
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(Some(true)),
        "false" | "0" | "no" | "" => Ok(Some(false)),
        other => Err(ConfigError::InvalidValue {
            field: name.to_string(),
            reason: format!("expected a boolean, got '{}'", other),
        }),
    }
}
