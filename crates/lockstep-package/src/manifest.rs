//! Project manifest parsing (lockstep.toml)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Project manifest (lockstep.toml)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectManifest {
    pub project: ProjectMetadata,
    #[serde(default)]
    pub restore: RestoreSection,
    /// Centrally managed versions, shared by every framework
    #[serde(default, rename = "central-versions")]
    pub central_versions: BTreeMap<String, String>,
    #[serde(default)]
    pub frameworks: Vec<FrameworkSection>,
}

impl ProjectManifest {
    /// Parse manifest from TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load manifest from file
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_str(&content)?)
    }

    /// Serialize to TOML string
    pub fn to_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// `[project]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectMetadata {
    pub name: String,
    pub version: String,
    #[serde(default, rename = "runtime-identifiers")]
    pub runtime_identifiers: Vec<String>,
}

/// `[restore]` table. Keys that only matter to configuration loading
/// (sources, folders) are ignored here.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct RestoreSection {
    #[serde(default)]
    pub central_package_versions: bool,
    #[serde(default)]
    pub central_transitive_pinning: bool,
    #[serde(default)]
    pub version_override_disabled: bool,
    #[serde(default)]
    pub floating_central_versions: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore_with_lock_file: Option<bool>,
    #[serde(default)]
    pub locked_mode: bool,
    #[serde(default)]
    pub treat_warnings_as_errors: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings_as_errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub no_warn: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
}

/// `[[frameworks]]` entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrameworkSection {
    pub name: String,
    #[serde(default)]
    pub dependencies: BTreeMap<String, Dependency>,
    #[serde(default, rename = "project-references")]
    pub project_references: BTreeMap<String, ProjectReferenceEntry>,
}

/// Dependency specification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Dependency {
    /// Simple version range
    Simple(String),
    /// Detailed dependency
    Detailed(DetailedDependency),
}

impl Dependency {
    /// Declared version range, if any
    pub fn version(&self) -> Option<&str> {
        match self {
            Dependency::Simple(v) => Some(v),
            Dependency::Detailed(d) => d.version.as_deref(),
        }
    }

    pub fn version_override(&self) -> Option<&str> {
        match self {
            Dependency::Simple(_) => None,
            Dependency::Detailed(d) => d.version_override.as_deref(),
        }
    }

    pub fn is_auto_referenced(&self) -> bool {
        match self {
            Dependency::Simple(_) => false,
            Dependency::Detailed(d) => d.auto_referenced,
        }
    }
}

/// Detailed dependency specification
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct DetailedDependency {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_override: Option<String>,
    #[serde(default)]
    pub auto_referenced: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,
}

/// `[frameworks.project-references]` entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectReferenceEntry {
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<String>>,
}
