//! Packages pin file (packages.lock.json)
//!
//! Records the resolved version and content hash of every library per
//! framework/runtime pair. A valid pin file feeds its versions back into
//! resolution; in locked mode an out of date one fails the restore.

use crate::assets::LockArtifact;
use crate::framework::FrameworkRuntimePair;
use crate::keyed::{self, Keyed};
use crate::library::LibraryIdentity;
use crate::project::{ProjectSpec, TargetFrameworkInfo};
use crate::{PackageError, Result};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

pub const PACKAGES_LOCK_FILE_NAME: &str = "packages.lock.json";

fn zero_version() -> Version {
    Version::new(0, 0, 0)
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PackageDependencyType {
    Direct,
    Transitive,
    Project,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackagesLockFile {
    pub version: u32,
    #[serde(rename = "dependencies", with = "keyed")]
    pub targets: Vec<PackagesLockFileTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackagesLockFileTarget {
    #[serde(skip)]
    pub framework: String,
    #[serde(skip)]
    pub runtime_identifier: Option<String>,
    #[serde(with = "keyed")]
    pub dependencies: Vec<LockFileDependency>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockFileDependency {
    #[serde(skip)]
    pub id: String,
    #[serde(rename = "type")]
    pub dependency_type: PackageDependencyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested: Option<String>,
    #[serde(default = "zero_version")]
    pub resolved: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,
    /// Pinned through the central version table without a direct reference
    #[serde(default, skip_serializing_if = "is_false")]
    pub central_transitive: bool,
}

impl Keyed for PackagesLockFileTarget {
    fn key(&self) -> String {
        self.pair().target_graph_name()
    }

    fn apply_key(&mut self, key: &str) -> std::result::Result<(), String> {
        let pair = FrameworkRuntimePair::from_target_graph_name(key);
        self.framework = pair.framework;
        self.runtime_identifier = pair.runtime_identifier;
        Ok(())
    }
}

impl Keyed for LockFileDependency {
    fn key(&self) -> String {
        self.id.clone()
    }

    fn apply_key(&mut self, key: &str) -> std::result::Result<(), String> {
        self.id = key.to_string();
        Ok(())
    }
}

impl PackagesLockFileTarget {
    pub fn pair(&self) -> FrameworkRuntimePair {
        FrameworkRuntimePair::new(self.framework.clone(), self.runtime_identifier.clone())
    }

    pub fn dependency(&self, id: &str) -> Option<&LockFileDependency> {
        self.dependencies
            .iter()
            .find(|d| d.id.eq_ignore_ascii_case(id))
    }

    fn of_type(&self, dependency_type: PackageDependencyType) -> impl Iterator<Item = &LockFileDependency> {
        self.dependencies
            .iter()
            .filter(move |d| d.dependency_type == dependency_type)
    }
}

/// Outcome of checking a pin file against the current project
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockFileValidationResult {
    pub is_valid: bool,
    pub invalid_reasons: Vec<String>,
}

impl LockFileValidationResult {
    fn from_reasons(invalid_reasons: Vec<String>) -> Self {
        Self {
            is_valid: invalid_reasons.is_empty(),
            invalid_reasons,
        }
    }
}

/// Installed content that no longer matches its pin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentHashMismatch {
    pub id: String,
    pub version: Version,
    /// `None` when the package has no pin
    pub expected: Option<String>,
    pub actual: Option<String>,
}

/// Pin file location for a project
pub fn lock_file_path(spec: &ProjectSpec) -> PathBuf {
    spec.project_directory().join(PACKAGES_LOCK_FILE_NAME)
}

impl PackagesLockFile {
    pub const VERSION: u32 = 1;
    /// Written when any entry is pinned through central transitive pinning
    pub const CENTRAL_TRANSITIVE_VERSION: u32 = 2;

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let lock: PackagesLockFile = serde_json::from_str(content)?;
        if lock.version == 0 || lock.version > Self::CENTRAL_TRANSITIVE_VERSION {
            return Err(PackageError::UnsupportedVersion {
                file: PACKAGES_LOCK_FILE_NAME,
                found: lock.version,
                supported: Self::CENTRAL_TRANSITIVE_VERSION,
            });
        }
        Ok(lock)
    }

    /// Read a pin file; `Ok(None)` when none exists
    pub fn read(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content).map(Some)
    }

    pub fn to_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    pub fn target(&self, pair: &FrameworkRuntimePair) -> Option<&PackagesLockFileTarget> {
        self.targets.iter().find(|t| {
            t.framework.eq_ignore_ascii_case(&pair.framework)
                && t.runtime_identifier == pair.runtime_identifier
        })
    }

    /// Derive the pin file from a freshly built lock artifact
    pub fn from_artifact(artifact: &LockArtifact, spec: &ProjectSpec) -> Self {
        let central_transitive = spec.central_transitive_pinning_enabled();
        let mut any_central_transitive = false;

        let targets = artifact
            .targets
            .iter()
            .map(|target| {
                let framework = spec.framework(&target.framework);
                let mut dependencies: Vec<LockFileDependency> = target
                    .libraries
                    .iter()
                    .map(|library| {
                        let is_project = library.library_type.is_some_and(|t| t.is_project());
                        let direct = framework.and_then(|f| {
                            f.dependencies
                                .iter()
                                .find(|d| d.name().eq_ignore_ascii_case(&library.name))
                        });
                        let central = framework
                            .filter(|_| central_transitive && direct.is_none() && !is_project)
                            .and_then(|f| f.central_version(&library.name));

                        let (dependency_type, requested) = if is_project {
                            (PackageDependencyType::Project, None)
                        } else if let Some(direct) = direct {
                            (
                                PackageDependencyType::Direct,
                                direct.effective_range().map(ToString::to_string),
                            )
                        } else if let Some(central) = central {
                            (
                                PackageDependencyType::Transitive,
                                Some(central.version_range.to_string()),
                            )
                        } else {
                            (PackageDependencyType::Transitive, None)
                        };
                        any_central_transitive |= central.is_some();

                        LockFileDependency {
                            id: library.name.clone(),
                            dependency_type,
                            requested,
                            resolved: library.version.clone(),
                            content_hash: if is_project {
                                None
                            } else {
                                artifact
                                    .library(&library.name, &library.version)
                                    .and_then(|l| l.sha512.clone())
                            },
                            dependencies: library.dependencies.clone(),
                            central_transitive: central.is_some(),
                        }
                    })
                    .collect();
                dependencies.sort_by_key(|d| d.id.to_ascii_lowercase());

                PackagesLockFileTarget {
                    framework: target.framework.clone(),
                    runtime_identifier: target.runtime_identifier.clone(),
                    dependencies,
                }
            })
            .collect();

        Self {
            version: if any_central_transitive {
                Self::CENTRAL_TRANSITIVE_VERSION
            } else {
                Self::VERSION
            },
            targets,
        }
    }

    /// Check that the pins still describe `spec`: same targets, same
    /// direct requests, same project references and same central pins.
    pub fn validate(&self, spec: &ProjectSpec) -> LockFileValidationResult {
        let mut reasons = Vec::new();

        let expected: Vec<FrameworkRuntimePair> = spec.framework_runtime_pairs();
        for pair in &expected {
            if self.target(pair).is_none() {
                reasons.push(format!(
                    "The project target '{}' was added since the lock file was generated.",
                    pair
                ));
            }
        }
        for target in &self.targets {
            let pair = target.pair();
            if !expected.iter().any(|p| {
                p.framework.eq_ignore_ascii_case(&pair.framework)
                    && p.runtime_identifier == pair.runtime_identifier
            }) {
                reasons.push(format!(
                    "The project target '{}' was removed since the lock file was generated.",
                    pair
                ));
            }
        }

        for framework in &spec.frameworks {
            let pair = FrameworkRuntimePair::framework_only(framework.framework.clone());
            if let Some(target) = self.target(&pair) {
                validate_target(spec, framework, target, &mut reasons);
            }
        }

        LockFileValidationResult::from_reasons(reasons)
    }

    /// Pinned package versions per pair, as resolution hints
    pub fn pinned_libraries(&self) -> HashMap<FrameworkRuntimePair, Vec<LibraryIdentity>> {
        self.targets
            .iter()
            .map(|target| {
                let pins = target
                    .dependencies
                    .iter()
                    .filter(|d| d.dependency_type != PackageDependencyType::Project)
                    .map(|d| LibraryIdentity::package(d.id.clone(), d.resolved.clone()))
                    .collect();
                (target.pair(), pins)
            })
            .collect()
    }

    /// Compare every package library of `artifact` with its pin. A package
    /// without a pin, or whose content hash differs, is a mismatch.
    pub fn validate_content_hashes(&self, artifact: &LockArtifact) -> Vec<ContentHashMismatch> {
        let mut pins: HashMap<(String, Version), Option<&String>> = HashMap::new();
        for target in &self.targets {
            for pin in target
                .dependencies
                .iter()
                .filter(|d| d.dependency_type != PackageDependencyType::Project)
            {
                pins.entry((pin.id.to_ascii_lowercase(), pin.resolved.clone()))
                    .or_insert(pin.content_hash.as_ref());
            }
        }

        artifact
            .package_libraries()
            .filter_map(|library| {
                let expected = pins
                    .get(&(library.name.to_ascii_lowercase(), library.version.clone()))
                    .copied();
                let matches = matches!(expected, Some(hash) if hash == library.sha512.as_ref());
                (!matches).then(|| ContentHashMismatch {
                    id: library.name.clone(),
                    version: library.version.clone(),
                    expected: expected.flatten().cloned(),
                    actual: library.sha512.clone(),
                })
            })
            .collect()
    }
}

fn validate_target(
    spec: &ProjectSpec,
    framework: &TargetFrameworkInfo,
    target: &PackagesLockFileTarget,
    reasons: &mut Vec<String>,
) {
    let name = &framework.framework;

    for dependency in &framework.dependencies {
        let requested = dependency.effective_range().map(ToString::to_string);
        match target.dependency(dependency.name()) {
            Some(pin) if pin.dependency_type == PackageDependencyType::Direct => {
                if pin.requested != requested {
                    reasons.push(format!(
                        "The package reference {} version has changed from {} to {} for '{}'.",
                        dependency.name(),
                        pin.requested.as_deref().unwrap_or(""),
                        requested.as_deref().unwrap_or(""),
                        name
                    ));
                }
            }
            _ => reasons.push(format!(
                "A new package reference was found {} for '{}'.",
                dependency.name(),
                name
            )),
        }
    }

    for pin in target.of_type(PackageDependencyType::Direct) {
        if !framework.has_direct_dependency(&pin.id) {
            reasons.push(format!(
                "The package reference {} was removed for '{}'.",
                pin.id, name
            ));
        }
    }

    for reference in &framework.project_references {
        let pinned = target
            .dependency(&reference.name)
            .is_some_and(|d| d.dependency_type == PackageDependencyType::Project);
        if !pinned {
            reasons.push(format!(
                "A new project reference to {} was found for '{}'.",
                reference.name, name
            ));
        }
    }

    for pin in target.of_type(PackageDependencyType::Project) {
        if !framework
            .project_references
            .iter()
            .any(|r| r.name.eq_ignore_ascii_case(&pin.id))
        {
            reasons.push(format!(
                "The project reference {} was removed for '{}'.",
                pin.id, name
            ));
        }
    }

    for pin in target.dependencies.iter().filter(|d| d.central_transitive) {
        let current = framework
            .central_version(&pin.id)
            .filter(|_| spec.central_transitive_pinning_enabled())
            .map(|c| c.version_range.to_string());
        if current != pin.requested {
            reasons.push(format!(
                "The central transitive pin {} changed from {} to {} for '{}'.",
                pin.id,
                pin.requested.as_deref().unwrap_or(""),
                current.as_deref().unwrap_or(""),
                name
            ));
        }
    }
}
