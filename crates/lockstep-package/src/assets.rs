//! Lock artifact (project.assets.json)
//!
//! The artifact records, per framework/runtime pair, the libraries that won
//! resolution and the edges between them, plus a top-level library list
//! with content hashes. Output is fully sorted so identical graphs produce
//! identical bytes.

use crate::framework::FrameworkRuntimePair;
use crate::include::{GraphHandle, IncludeFlagsMap};
use crate::keyed::{self, split_name_version, Keyed};
use crate::library::{IncludeFlags, LibraryIdentity, LibraryType};
use crate::log::RestoreLogMessage;
use crate::project::ProjectSpec;
use crate::repository::PackageFolder;
use crate::resolver::{GraphNode, RestoreTargetGraph};
use crate::{PackageError, Result};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

pub const ASSETS_FILE_NAME: &str = "project.assets.json";

fn zero_version() -> Version {
    Version::new(0, 0, 0)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockArtifact {
    pub version: u32,
    #[serde(with = "keyed")]
    pub targets: Vec<LockTarget>,
    #[serde(with = "keyed")]
    pub libraries: Vec<LockLibrary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub package_folders: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectSpec>,
    #[serde(default)]
    pub logs: Vec<RestoreLogMessage>,
}

/// Top-level library entry, keyed `Name/1.0.0`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockLibrary {
    #[serde(skip)]
    pub name: String,
    #[serde(skip, default = "zero_version")]
    pub version: Version,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub library_type: Option<LibraryType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha512: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
}

/// Resolved libraries of one framework/runtime pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockTarget {
    #[serde(skip)]
    pub framework: String,
    #[serde(skip)]
    pub runtime_identifier: Option<String>,
    #[serde(with = "keyed")]
    pub libraries: Vec<LockTargetLibrary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockTargetLibrary {
    #[serde(skip)]
    pub name: String,
    #[serde(skip, default = "zero_version")]
    pub version: Version,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub library_type: Option<LibraryType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    /// Dependency name to requested range
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compile: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub runtime: Vec<String>,
}

impl Keyed for LockLibrary {
    fn key(&self) -> String {
        format!("{}/{}", self.name, self.version)
    }

    fn apply_key(&mut self, key: &str) -> std::result::Result<(), String> {
        let (name, version) = split_name_version(key)?;
        self.name = name;
        self.version = version;
        Ok(())
    }
}

impl Keyed for LockTargetLibrary {
    fn key(&self) -> String {
        format!("{}/{}", self.name, self.version)
    }

    fn apply_key(&mut self, key: &str) -> std::result::Result<(), String> {
        let (name, version) = split_name_version(key)?;
        self.name = name;
        self.version = version;
        Ok(())
    }
}

impl Keyed for LockTarget {
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

impl LockTarget {
    pub fn pair(&self) -> FrameworkRuntimePair {
        FrameworkRuntimePair::new(self.framework.clone(), self.runtime_identifier.clone())
    }

    pub fn library(&self, name: &str) -> Option<&LockTargetLibrary> {
        self.libraries
            .iter()
            .find(|l| l.name.eq_ignore_ascii_case(name))
    }
}

impl LockLibrary {
    pub fn is_project(&self) -> bool {
        self.library_type.is_some_and(|t| t.is_project())
    }
}

impl LockArtifact {
    /// Native format version
    pub const VERSION: u32 = 3;

    pub fn new() -> Self {
        Self {
            version: Self::VERSION,
            targets: Vec::new(),
            libraries: Vec::new(),
            package_folders: Vec::new(),
            project: None,
            logs: Vec::new(),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let artifact: LockArtifact = serde_json::from_str(content)?;
        if artifact.version == 0 || artifact.version > Self::VERSION {
            return Err(PackageError::UnsupportedVersion {
                file: ASSETS_FILE_NAME,
                found: artifact.version,
                supported: Self::VERSION,
            });
        }
        Ok(artifact)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Pretty JSON with a trailing newline
    pub fn to_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    pub fn target(&self, pair: &FrameworkRuntimePair) -> Option<&LockTarget> {
        self.targets.iter().find(|t| {
            t.framework.eq_ignore_ascii_case(&pair.framework)
                && t.runtime_identifier == pair.runtime_identifier
        })
    }

    pub fn library(&self, name: &str, version: &Version) -> Option<&LockLibrary> {
        self.libraries
            .iter()
            .find(|l| l.name.eq_ignore_ascii_case(name) && &l.version == version)
    }

    /// Package identities of the top-level library list
    pub fn package_libraries(&self) -> impl Iterator<Item = &LockLibrary> {
        self.libraries.iter().filter(|l| !l.is_project())
    }

    /// Check referential completeness: every target library and every
    /// dependency edge names a top-level library.
    pub fn verify(&self) -> std::result::Result<(), String> {
        for target in &self.targets {
            for library in &target.libraries {
                if self.library(&library.name, &library.version).is_none() {
                    return Err(format!(
                        "Target '{}' references {}/{} which is not in the library list",
                        target.key(),
                        library.name,
                        library.version
                    ));
                }
                for dependency in library.dependencies.keys() {
                    if !self
                        .libraries
                        .iter()
                        .any(|l| l.name.eq_ignore_ascii_case(dependency))
                    {
                        return Err(format!(
                            "{}/{} depends on '{}' which is not in the library list",
                            library.name, library.version, dependency
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// Rewrite for an older format version. Version 1 has no project
    /// libraries, no per-library types in targets and no embedded project.
    pub fn downgrade_to(&mut self, version: u32) {
        self.version = version;
        if version > 1 {
            return;
        }

        self.libraries.retain(|l| !l.is_project());
        for target in &mut self.targets {
            target
                .libraries
                .retain(|l| !l.library_type.is_some_and(|t| t.is_project()));
            for library in &mut target.libraries {
                library.library_type = None;
            }
        }
        self.project = None;
    }
}

impl Default for LockArtifact {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds a [`LockArtifact`] from resolved graphs
pub struct LockArtifactBuilder<'a> {
    version: u32,
    folders: &'a [PackageFolder],
    include_flags: Option<&'a IncludeFlagsMap>,
}

impl<'a> LockArtifactBuilder<'a> {
    pub fn new(version: u32) -> Self {
        Self {
            version,
            folders: &[],
            include_flags: None,
        }
    }

    /// Folders searched, in order, for package hashes and files
    pub fn with_package_folders(mut self, folders: &'a [PackageFolder]) -> Self {
        self.folders = folders;
        self
    }

    pub fn with_include_flags(mut self, include_flags: &'a IncludeFlagsMap) -> Self {
        self.include_flags = Some(include_flags);
        self
    }

    /// Build the artifact. Library entries whose identity is unchanged are
    /// taken from `existing`. Downgrading to an older format runs last.
    pub fn build(
        &self,
        existing: Option<&LockArtifact>,
        spec: &ProjectSpec,
        graphs: &[RestoreTargetGraph],
    ) -> LockArtifact {
        let project_paths: BTreeMap<String, String> = spec
            .frameworks
            .iter()
            .flat_map(|f| f.project_references.iter())
            .map(|r| {
                (
                    r.name.to_ascii_lowercase(),
                    r.path.to_string_lossy().replace('\\', "/"),
                )
            })
            .collect();

        let mut libraries: BTreeMap<(String, Version), LockLibrary> = BTreeMap::new();
        let mut targets = Vec::with_capacity(graphs.len());

        for (index, graph) in graphs.iter().enumerate() {
            let mut target = LockTarget {
                framework: graph.framework().to_string(),
                runtime_identifier: graph.runtime_identifier().map(str::to_string),
                libraries: Vec::new(),
            };

            for node in graph.flattened() {
                let Some(identity) = &node.identity else {
                    continue;
                };
                let library = libraries
                    .entry((identity.key(), identity.version.clone()))
                    .or_insert_with(|| self.library_entry(existing, identity, &project_paths));

                let flags = self
                    .include_flags
                    .map(|map| map.flags(GraphHandle(index), &identity.name))
                    .unwrap_or(IncludeFlags::ALL);
                target
                    .libraries
                    .push(target_library(graph, node, identity, library, flags));
            }

            targets.push(target);
        }

        let mut artifact = LockArtifact {
            version: LockArtifact::VERSION,
            targets,
            libraries: libraries.into_values().collect(),
            package_folders: self
                .folders
                .iter()
                .map(|f| f.root().to_string_lossy().replace('\\', "/"))
                .collect(),
            project: Some(spec.clone()),
            logs: Vec::new(),
        };

        if self.version < LockArtifact::VERSION {
            artifact.downgrade_to(self.version);
        }
        artifact
    }

    /// Entry for `identity`. A previous entry is kept only while its
    /// content hash and path still match what is installed.
    fn library_entry(
        &self,
        existing: Option<&LockArtifact>,
        identity: &LibraryIdentity,
        project_paths: &BTreeMap<String, String>,
    ) -> LockLibrary {
        let current = self.current_entry(identity, project_paths);
        let reusable = existing
            .and_then(|artifact| artifact.library(&identity.name, &identity.version))
            .filter(|library| {
                library.library_type == current.library_type
                    && library.sha512 == current.sha512
                    && library.path == current.path
            });
        match reusable {
            Some(library) => {
                debug!(library = %identity, "Reusing library entry");
                LockLibrary {
                    name: identity.name.clone(),
                    ..library.clone()
                }
            }
            None => current,
        }
    }

    fn current_entry(
        &self,
        identity: &LibraryIdentity,
        project_paths: &BTreeMap<String, String>,
    ) -> LockLibrary {
        match identity.library_type {
            LibraryType::Package => {
                let local = self
                    .folders
                    .iter()
                    .find_map(|folder| folder.find_package(&identity.name, &identity.version));
                LockLibrary {
                    name: identity.name.clone(),
                    version: identity.version.clone(),
                    library_type: Some(LibraryType::Package),
                    sha512: local.as_ref().map(|p| p.sha512.clone()),
                    path: Some(match &local {
                        Some(p) => p.relative_path(),
                        None => format!(
                            "{}/{}",
                            identity.name.to_ascii_lowercase(),
                            identity.version
                        ),
                    }),
                    files: local.map(|p| p.files).unwrap_or_default(),
                }
            }
            LibraryType::Project | LibraryType::ExternalProject | LibraryType::Reference => {
                LockLibrary {
                    name: identity.name.clone(),
                    version: identity.version.clone(),
                    library_type: Some(identity.library_type),
                    sha512: None,
                    path: project_paths.get(&identity.key()).cloned(),
                    files: Vec::new(),
                }
            }
        }
    }
}

fn target_library(
    graph: &RestoreTargetGraph,
    node: &GraphNode,
    identity: &LibraryIdentity,
    library: &LockLibrary,
    flags: IncludeFlags,
) -> LockTargetLibrary {
    let dependencies = graph
        .outgoing(node.id)
        .filter(|edge| edge.to != 0 && graph.node(edge.to).is_resolved())
        .map(|edge| {
            let range = edge
                .dependency
                .effective_range()
                .map(ToString::to_string)
                .unwrap_or_default();
            (graph.node(edge.to).name().to_string(), range)
        })
        .collect();

    let (compile, runtime, framework) = match identity.library_type {
        LibraryType::Package => {
            let (compile, runtime) = select_assets(&library.files, graph.framework());
            (
                if flags.compile { compile } else { Vec::new() },
                if flags.runtime { runtime } else { Vec::new() },
                None,
            )
        }
        LibraryType::Project | LibraryType::ExternalProject => {
            (Vec::new(), Vec::new(), Some(graph.framework().to_string()))
        }
        LibraryType::Reference => (Vec::new(), Vec::new(), None),
    };

    LockTargetLibrary {
        name: identity.name.clone(),
        version: identity.version.clone(),
        library_type: Some(identity.library_type),
        framework,
        dependencies,
        compile,
        runtime,
    }
}

/// Compile and runtime items of a package for `framework`. Reference
/// assemblies win for compile when the package has them.
fn select_assets(files: &[String], framework: &str) -> (Vec<String>, Vec<String>) {
    let in_folder = |folder: &str| -> Vec<String> {
        let prefix = format!("{}/{}/", folder, framework.to_ascii_lowercase());
        files
            .iter()
            .filter(|f| f.to_ascii_lowercase().starts_with(&prefix))
            .cloned()
            .collect()
    };

    let runtime = in_folder("lib");
    let reference = in_folder("ref");
    let compile = if reference.is_empty() {
        runtime.clone()
    } else {
        reference
    };
    (compile, runtime)
}
