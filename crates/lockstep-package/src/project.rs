//! Normalized project description used by resolution and restore
//!
//! A [`ProjectSpec`] is what a manifest lowers to: parsed version ranges,
//! per-framework dependency lists, the central version table and the
//! restore switches. It is also embedded in the lock artifact and hashed
//! into the no-op fingerprint, so it serializes deterministically.

use crate::framework::{create_framework_runtime_pairs, FrameworkRuntimePair};
use crate::library::{IncludeFlags, LibraryDependency, LibraryRange, TypeConstraint};
use crate::manifest::{Dependency, ProjectManifest};
use crate::version::{parse_version, VersionRange};
use crate::{PackageError, Result};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default output directory, relative to the project directory
pub const DEFAULT_OUTPUT_PATH: &str = "obj";

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSpec {
    pub name: String,
    pub version: Version,
    pub file_path: PathBuf,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub runtime_identifiers: Vec<String>,
    pub frameworks: Vec<TargetFrameworkInfo>,
    pub restore: RestoreMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetFrameworkInfo {
    pub framework: String,
    #[serde(default)]
    pub dependencies: Vec<LibraryDependency>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub project_references: Vec<ProjectReference>,
    /// Keyed by lowercased package name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub central_package_versions: BTreeMap<String, CentralPackageVersion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CentralPackageVersion {
    pub name: String,
    pub version_range: VersionRange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectReference {
    pub name: String,
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "is_all")]
    pub include: IncludeFlags,
}

fn is_all(flags: &IncludeFlags) -> bool {
    *flags == IncludeFlags::ALL
}

impl ProjectReference {
    /// The reference as a dependency request that only binds to projects
    pub fn to_dependency(&self) -> LibraryDependency {
        LibraryDependency::new(LibraryRange::new(
            self.name.clone(),
            Some(VersionRange::any()),
            TypeConstraint::Project,
        ))
        .with_include(self.include)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreMetadata {
    #[serde(default, skip_serializing_if = "is_false")]
    pub central_package_versions_enabled: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub central_transitive_pinning_enabled: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub version_override_disabled: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub floating_central_versions_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore_with_lock_file: Option<bool>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub locked_mode: bool,
    #[serde(default)]
    pub warnings: WarningProperties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
}

/// Project-wide warning policy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarningProperties {
    #[serde(default, skip_serializing_if = "is_false")]
    pub treat_warnings_as_errors: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings_as_errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub no_warn: Vec<String>,
}

impl ProjectSpec {
    /// Load and lower a manifest file
    pub fn from_file(path: &Path) -> Result<Self> {
        let manifest = ProjectManifest::from_file(path)?;
        Self::from_manifest(&manifest, path)
    }

    /// Lower a parsed manifest.
    ///
    /// With central package versions enabled, a dependency without its own
    /// version takes the central version and is marked centrally managed.
    /// Dependencies without any usable version keep an empty range.
    pub fn from_manifest(manifest: &ProjectManifest, file_path: &Path) -> Result<Self> {
        let version = parse_version(&manifest.project.version)?;
        let restore = &manifest.restore;
        let central_enabled = restore.central_package_versions;

        let mut central_versions = BTreeMap::new();
        if central_enabled {
            for (name, raw) in &manifest.central_versions {
                let range = parse_range(name, raw)?;
                central_versions.insert(
                    name.to_ascii_lowercase(),
                    CentralPackageVersion {
                        name: name.clone(),
                        version_range: range,
                    },
                );
            }
        }

        let mut frameworks = Vec::with_capacity(manifest.frameworks.len());
        for section in &manifest.frameworks {
            if frameworks
                .iter()
                .any(|f: &TargetFrameworkInfo| f.framework.eq_ignore_ascii_case(&section.name))
            {
                return Err(PackageError::InvalidManifest(format!(
                    "framework '{}' is declared more than once",
                    section.name
                )));
            }

            let mut dependencies = Vec::with_capacity(section.dependencies.len());
            for (name, declared) in &section.dependencies {
                dependencies.push(lower_dependency(
                    name,
                    declared,
                    central_enabled,
                    &central_versions,
                )?);
            }

            let mut project_references = Vec::with_capacity(section.project_references.len());
            for (name, entry) in &section.project_references {
                let include = match &entry.include {
                    Some(names) => include_flags(name, names)?,
                    None => IncludeFlags::ALL,
                };
                project_references.push(ProjectReference {
                    name: name.clone(),
                    path: entry.path.clone(),
                    include,
                });
            }

            frameworks.push(TargetFrameworkInfo {
                framework: section.name.clone(),
                dependencies,
                project_references,
                central_package_versions: central_versions.clone(),
            });
        }

        Ok(ProjectSpec {
            name: manifest.project.name.clone(),
            version,
            file_path: file_path.to_path_buf(),
            runtime_identifiers: manifest.project.runtime_identifiers.clone(),
            frameworks,
            restore: RestoreMetadata {
                central_package_versions_enabled: central_enabled,
                central_transitive_pinning_enabled: restore.central_transitive_pinning,
                version_override_disabled: restore.version_override_disabled,
                floating_central_versions_enabled: restore.floating_central_versions,
                restore_with_lock_file: restore.restore_with_lock_file,
                locked_mode: restore.locked_mode,
                warnings: WarningProperties {
                    treat_warnings_as_errors: restore.treat_warnings_as_errors,
                    warnings_as_errors: restore.warnings_as_errors.clone(),
                    no_warn: restore.no_warn.clone(),
                },
                output_path: restore.output_path.clone(),
            },
        })
    }

    pub fn framework(&self, framework: &str) -> Option<&TargetFrameworkInfo> {
        self.frameworks
            .iter()
            .find(|f| f.framework.eq_ignore_ascii_case(framework))
    }

    /// All resolution targets, framework-only pairs first
    pub fn framework_runtime_pairs(&self) -> Vec<FrameworkRuntimePair> {
        create_framework_runtime_pairs(
            self.frameworks.iter().map(|f| f.framework.as_str()),
            &self.runtime_identifiers,
        )
    }

    pub fn project_directory(&self) -> PathBuf {
        self.file_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    /// Directory that receives the lock artifact and the no-op cache
    pub fn output_directory(&self) -> PathBuf {
        let output = self
            .restore
            .output_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_PATH));
        if output.is_absolute() {
            output
        } else {
            self.project_directory().join(output)
        }
    }

    pub fn central_package_versions_enabled(&self) -> bool {
        self.restore.central_package_versions_enabled
    }

    pub fn central_transitive_pinning_enabled(&self) -> bool {
        self.restore.central_package_versions_enabled
            && self.restore.central_transitive_pinning_enabled
    }
}

impl TargetFrameworkInfo {
    pub fn central_version(&self, name: &str) -> Option<&CentralPackageVersion> {
        self.central_package_versions.get(&name.to_ascii_lowercase())
    }

    /// Direct package dependencies plus project references, as requests
    pub fn all_dependencies(&self) -> Vec<LibraryDependency> {
        self.dependencies
            .iter()
            .cloned()
            .chain(self.project_references.iter().map(ProjectReference::to_dependency))
            .collect()
    }

    pub fn has_direct_dependency(&self, name: &str) -> bool {
        self.dependencies
            .iter()
            .any(|d| d.name().eq_ignore_ascii_case(name))
    }
}

fn parse_range(name: &str, raw: &str) -> Result<VersionRange> {
    raw.parse().map_err(|e| PackageError::InvalidDependency {
        name: name.to_string(),
        reason: format!("{}", e),
    })
}

fn include_flags(name: &str, names: &[String]) -> Result<IncludeFlags> {
    IncludeFlags::from_names(names.iter().map(String::as_str)).map_err(|unknown| {
        PackageError::InvalidDependency {
            name: name.to_string(),
            reason: format!("unknown asset kind '{}'", unknown),
        }
    })
}

fn lower_dependency(
    name: &str,
    declared: &Dependency,
    central_enabled: bool,
    central_versions: &BTreeMap<String, CentralPackageVersion>,
) -> Result<LibraryDependency> {
    let auto_referenced = declared.is_auto_referenced();
    let declared_range = declared
        .version()
        .map(|raw| parse_range(name, raw))
        .transpose()?;
    let version_override = declared
        .version_override()
        .map(|raw| parse_range(name, raw))
        .transpose()?;

    let mut version_centrally_managed = false;
    let version_range = if central_enabled && !auto_referenced && version_override.is_none() {
        match declared_range {
            Some(range) => Some(range),
            None => {
                let central = central_versions.get(&name.to_ascii_lowercase());
                version_centrally_managed = central.is_some();
                central.map(|c| c.version_range.clone())
            }
        }
    } else if central_enabled {
        declared_range.or_else(|| version_override.clone())
    } else {
        Some(declared_range.unwrap_or_else(VersionRange::any))
    };

    let mut include = IncludeFlags::ALL;
    if let Dependency::Detailed(detailed) = declared {
        if let Some(names) = &detailed.include {
            include = include_flags(name, names)?;
        }
        if let Some(names) = &detailed.exclude {
            include = include.without(include_flags(name, names)?);
        }
    }

    Ok(LibraryDependency {
        library_range: LibraryRange::new(name, version_range, TypeConstraint::Package),
        include,
        auto_referenced,
        version_centrally_managed,
        version_override,
    })
}
