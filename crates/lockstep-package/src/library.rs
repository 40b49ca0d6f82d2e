//! Library identities, ranges and dependency declarations

use crate::version::VersionRange;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// What a resolved library is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LibraryType {
    Package,
    Project,
    ExternalProject,
    Reference,
}

impl LibraryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LibraryType::Package => "package",
            LibraryType::Project => "project",
            LibraryType::ExternalProject => "externalProject",
            LibraryType::Reference => "reference",
        }
    }

    pub fn is_project(&self) -> bool {
        matches!(self, LibraryType::Project | LibraryType::ExternalProject)
    }
}

impl fmt::Display for LibraryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which library types a request may bind to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TypeConstraint {
    #[default]
    Package,
    /// A local or external project
    Project,
    ExternalProject,
    Reference,
    Any,
}

impl TypeConstraint {
    pub fn allows(&self, library_type: LibraryType) -> bool {
        match self {
            TypeConstraint::Package => library_type == LibraryType::Package,
            TypeConstraint::Project => library_type.is_project(),
            TypeConstraint::ExternalProject => library_type == LibraryType::ExternalProject,
            TypeConstraint::Reference => library_type == LibraryType::Reference,
            TypeConstraint::Any => true,
        }
    }

    pub fn allows_projects(&self) -> bool {
        self.allows(LibraryType::Project) || self.allows(LibraryType::ExternalProject)
    }
}

fn eq_name(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

fn hash_name<H: Hasher>(name: &str, state: &mut H) {
    for byte in name.bytes() {
        byte.to_ascii_lowercase().hash(state);
    }
}

fn cmp_name(a: &str, b: &str) -> Ordering {
    a.bytes()
        .map(|b| b.to_ascii_lowercase())
        .cmp(b.bytes().map(|b| b.to_ascii_lowercase()))
}

/// A resolved library. Names compare case-insensitively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryIdentity {
    pub name: String,
    pub version: Version,
    #[serde(rename = "type")]
    pub library_type: LibraryType,
}

impl LibraryIdentity {
    pub fn new(name: impl Into<String>, version: Version, library_type: LibraryType) -> Self {
        Self {
            name: name.into(),
            version,
            library_type,
        }
    }

    pub fn package(name: impl Into<String>, version: Version) -> Self {
        Self::new(name, version, LibraryType::Package)
    }

    pub fn package_identity(&self) -> PackageIdentity {
        PackageIdentity::new(self.name.clone(), self.version.clone())
    }

    /// Lowercased name used as a map key
    pub fn key(&self) -> String {
        self.name.to_ascii_lowercase()
    }
}

impl PartialEq for LibraryIdentity {
    fn eq(&self, other: &Self) -> bool {
        eq_name(&self.name, &other.name)
            && self.version == other.version
            && self.library_type == other.library_type
    }
}

impl Eq for LibraryIdentity {}

impl Hash for LibraryIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_name(&self.name, state);
        self.version.hash(state);
        self.library_type.hash(state);
    }
}

impl PartialOrd for LibraryIdentity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LibraryIdentity {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_name(&self.name, &other.name)
            .then_with(|| self.version.cmp(&other.version))
            .then_with(|| self.library_type.cmp(&other.library_type))
    }
}

impl fmt::Display for LibraryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

/// A package id and exact version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageIdentity {
    pub id: String,
    pub version: Version,
}

impl PackageIdentity {
    pub fn new(id: impl Into<String>, version: Version) -> Self {
        Self {
            id: id.into(),
            version,
        }
    }
}

impl PartialEq for PackageIdentity {
    fn eq(&self, other: &Self) -> bool {
        eq_name(&self.id, &other.id) && self.version == other.version
    }
}

impl Eq for PackageIdentity {}

impl Hash for PackageIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_name(&self.id, state);
        self.version.hash(state);
    }
}

impl PartialOrd for PackageIdentity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageIdentity {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_name(&self.id, &other.id).then_with(|| self.version.cmp(&other.version))
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.version)
    }
}

/// A request for a library by name, range and type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryRange {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_range: Option<VersionRange>,
    #[serde(default)]
    pub type_constraint: TypeConstraint,
}

impl LibraryRange {
    pub fn new(
        name: impl Into<String>,
        version_range: Option<VersionRange>,
        type_constraint: TypeConstraint,
    ) -> Self {
        Self {
            name: name.into(),
            version_range,
            type_constraint,
        }
    }

    pub fn package(name: impl Into<String>, version_range: VersionRange) -> Self {
        Self::new(name, Some(version_range), TypeConstraint::Package)
    }

    pub fn key(&self) -> String {
        self.name.to_ascii_lowercase()
    }
}

impl fmt::Display for LibraryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version_range {
            Some(range) => write!(f, "{} ({})", self.name, range.pretty()),
            None => f.write_str(&self.name),
        }
    }
}

/// Which assets of a dependency flow to the consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IncludeFlags {
    pub compile: bool,
    pub runtime: bool,
    pub build: bool,
}

impl IncludeFlags {
    pub const ALL: IncludeFlags = IncludeFlags {
        compile: true,
        runtime: true,
        build: true,
    };

    pub const NONE: IncludeFlags = IncludeFlags {
        compile: false,
        runtime: false,
        build: false,
    };

    pub fn intersect(self, other: IncludeFlags) -> IncludeFlags {
        IncludeFlags {
            compile: self.compile && other.compile,
            runtime: self.runtime && other.runtime,
            build: self.build && other.build,
        }
    }

    pub fn union(self, other: IncludeFlags) -> IncludeFlags {
        IncludeFlags {
            compile: self.compile || other.compile,
            runtime: self.runtime || other.runtime,
            build: self.build || other.build,
        }
    }

    /// Build flags from asset names such as `compile` or `runtime`.
    /// Unknown names are returned as the error.
    pub fn from_names<'a, I>(names: I) -> Result<IncludeFlags, String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut flags = IncludeFlags::NONE;
        for name in names {
            match name.trim().to_ascii_lowercase().as_str() {
                "all" => flags = IncludeFlags::ALL,
                "none" => {}
                "compile" => flags.compile = true,
                "runtime" => flags.runtime = true,
                "build" => flags.build = true,
                _ => return Err(name.to_string()),
            }
        }
        Ok(flags)
    }

    /// Remove the assets in `excluded`
    pub fn without(self, excluded: IncludeFlags) -> IncludeFlags {
        IncludeFlags {
            compile: self.compile && !excluded.compile,
            runtime: self.runtime && !excluded.runtime,
            build: self.build && !excluded.build,
        }
    }
}

impl Default for IncludeFlags {
    fn default() -> Self {
        IncludeFlags::ALL
    }
}

fn is_default_flags(flags: &IncludeFlags) -> bool {
    *flags == IncludeFlags::ALL
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// A dependency as declared by a project or package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryDependency {
    #[serde(flatten)]
    pub library_range: LibraryRange,
    #[serde(default, skip_serializing_if = "is_default_flags")]
    pub include: IncludeFlags,
    #[serde(default, skip_serializing_if = "is_false")]
    pub auto_referenced: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub version_centrally_managed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_override: Option<VersionRange>,
}

impl LibraryDependency {
    pub fn new(library_range: LibraryRange) -> Self {
        Self {
            library_range,
            include: IncludeFlags::ALL,
            auto_referenced: false,
            version_centrally_managed: false,
            version_override: None,
        }
    }

    /// A package dependency with the given range
    pub fn package(name: impl Into<String>, range: VersionRange) -> Self {
        Self::new(LibraryRange::package(name, range))
    }

    /// A dependency on another project
    pub fn project(name: impl Into<String>) -> Self {
        Self::new(LibraryRange::new(name, None, TypeConstraint::Project))
    }

    pub fn with_include(mut self, include: IncludeFlags) -> Self {
        self.include = include;
        self
    }

    pub fn with_version_override(mut self, range: VersionRange) -> Self {
        self.version_override = Some(range);
        self
    }

    pub fn with_auto_referenced(mut self, auto_referenced: bool) -> Self {
        self.auto_referenced = auto_referenced;
        self
    }

    pub fn name(&self) -> &str {
        &self.library_range.name
    }

    pub fn key(&self) -> String {
        self.library_range.key()
    }

    pub fn version_range(&self) -> Option<&VersionRange> {
        self.library_range.version_range.as_ref()
    }

    /// The range actually used for resolution: an override wins over the
    /// declared range
    pub fn effective_range(&self) -> Option<&VersionRange> {
        self.version_override.as_ref().or(self.version_range())
    }

    pub fn is_project(&self) -> bool {
        self.library_range.type_constraint.allows_projects()
            && !self
                .library_range
                .type_constraint
                .allows(LibraryType::Package)
    }
}
