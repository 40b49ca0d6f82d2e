//! Lockstep package model and dependency graph resolution
//!
//! Project manifests (lockstep.toml), version ranges, library providers,
//! the nearest-wins graph resolver with its analyzer, the lock artifact
//! (project.assets.json) and the packages pin file (packages.lock.json).

pub mod assets;
pub mod framework;
pub mod include;
pub mod library;
pub mod lockfile;
pub mod log;
pub mod manifest;
pub mod project;
pub mod provider;
pub mod repository;
pub mod resolver;
pub mod version;
pub mod why;

mod keyed;

pub use assets::{ASSETS_FILE_NAME, LockArtifact, LockArtifactBuilder, LockLibrary, LockTarget, LockTargetLibrary};
pub use framework::{create_framework_runtime_pairs, FrameworkRuntimePair};
pub use include::{GraphHandle, IncludeFlagsMap};
pub use library::{
    IncludeFlags, LibraryDependency, LibraryIdentity, LibraryRange, LibraryType, PackageIdentity,
    TypeConstraint,
};
pub use lockfile::{
    lock_file_path, ContentHashMismatch, LockFileDependency, LockFileValidationResult,
    PackageDependencyType, PackagesLockFile, PackagesLockFileTarget,
};
pub use log::{LogCode, LogLevel, RestoreLogMessage};
pub use manifest::{Dependency, ProjectManifest};
pub use project::{
    CentralPackageVersion, ProjectReference, ProjectSpec, RestoreMetadata, TargetFrameworkInfo,
    WarningProperties,
};
pub use provider::{
    DependencyProviders, ExternalProjectReference, LibraryProvider, MemoryProvider,
    ProjectReferenceProvider, ProviderError,
};
pub use repository::{compute_content_hash, LocalPackageInfo, PackageFolder};
pub use resolver::{
    AnalyzeResult, Cycle, Disposition, Downgrade, GraphAnalyzer, GraphEdge, GraphNode,
    GraphResolver, NodeId, ResolveError, ResolvedGraphs, RestoreTargetGraph, VersionConflict,
};
pub use why::{find_dependency_paths, render_dependency_paths, PathStep, TargetDependencyPaths};
pub use version::{parse_version, FloatBehavior, VersionError, VersionRange};

/// Package management errors
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("Failed to parse manifest: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize manifest: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    VersionError(#[from] VersionError),

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("Invalid dependency '{name}': {reason}")]
    InvalidDependency { name: String, reason: String },

    #[error("Unsupported {file} version {found} (newest supported is {supported})")]
    UnsupportedVersion {
        file: &'static str,
        found: u32,
        supported: u32,
    },

    #[error("Ambiguous project reference '{0}': more than one project has this name")]
    AmbiguousProjectReference(String),
}

pub type Result<T> = std::result::Result<T, PackageError>;
