//! No-op restore cache
//!
//! The cache file records the fingerprint of the last restore together with
//! its outcome. A restore whose fingerprint, project path and outputs all
//! still match is skipped and its messages replayed.

use crate::commit::write_atomic;
use crate::error::RestoreResult;
use lockstep_package::{LockArtifact, PackageFolder, ProjectSpec, RestoreLogMessage};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const CACHE_FILE_EXTENSION: &str = "lockstep.cache";

/// Cache file location for a project
pub fn cache_file_path(spec: &ProjectSpec) -> PathBuf {
    spec.output_directory().join(format!(
        "{}.{}",
        spec.name.to_ascii_lowercase(),
        CACHE_FILE_EXTENSION
    ))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheFile {
    pub version: u32,
    pub dg_spec_hash: String,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub project_file_path: PathBuf,
    #[serde(default)]
    pub expected_package_file_paths: Vec<PathBuf>,
    #[serde(default)]
    pub logs: Vec<RestoreLogMessage>,
}

impl CacheFile {
    pub const VERSION: u32 = 2;

    pub fn new(dg_spec_hash: impl Into<String>) -> Self {
        Self {
            version: Self::VERSION,
            dg_spec_hash: dg_spec_hash.into(),
            success: false,
            project_file_path: PathBuf::new(),
            expected_package_file_paths: Vec::new(),
            logs: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.version == Self::VERSION
    }

    /// Read a cache file. Missing, unreadable and corrupt files all yield
    /// `None`.
    pub fn read(path: &Path) -> Option<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read cache file");
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(cache) => Some(cache),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring corrupt cache file");
                None
            }
        }
    }

    pub fn write(&self, path: &Path) -> RestoreResult<()> {
        let mut json = serde_json::to_string_pretty(self).map_err(lockstep_package::PackageError::from)?;
        json.push('\n');
        write_atomic(path, json.as_bytes())
    }
}

/// Outcome of the no-op check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoOpEvaluation {
    pub can_skip: bool,
    /// The prior cache when `can_skip`, otherwise a fresh one for the new
    /// fingerprint
    pub cache: CacheFile,
}

/// Decides whether a prior restore is still current
#[derive(Debug, Clone)]
pub struct NoOpCache<'a> {
    cache_path: &'a Path,
    project_path: &'a Path,
    assets_path: &'a Path,
}

impl<'a> NoOpCache<'a> {
    pub fn new(cache_path: &'a Path, project_path: &'a Path, assets_path: &'a Path) -> Self {
        Self {
            cache_path,
            project_path,
            assets_path,
        }
    }

    pub fn evaluate(&self, fingerprint: &str, force: bool) -> NoOpEvaluation {
        let fresh = || NoOpEvaluation {
            can_skip: false,
            cache: CacheFile::new(fingerprint),
        };

        if force {
            debug!("No-op check skipped: restore forced");
            return fresh();
        }
        let Some(prior) = CacheFile::read(self.cache_path) else {
            return fresh();
        };
        if !prior.is_valid() || prior.dg_spec_hash != fingerprint {
            debug!(path = %self.cache_path.display(), "Cache fingerprint changed");
            return fresh();
        }
        if !prior.success {
            debug!("Previous restore failed");
            return fresh();
        }
        if prior.project_file_path != self.project_path {
            debug!(
                cached = %prior.project_file_path.display(),
                current = %self.project_path.display(),
                "Cache belongs to another project"
            );
            return fresh();
        }
        if let Some(missing) = std::iter::once(self.assets_path)
            .chain(prior.expected_package_file_paths.iter().map(PathBuf::as_path))
            .find(|path| !path.exists())
        {
            debug!(path = %missing.display(), "Expected restore output is missing");
            return fresh();
        }

        NoOpEvaluation {
            can_skip: true,
            cache: prior,
        }
    }
}

/// Content hash marker of every package library in `artifact`. A package
/// found in no folder is expected in the first one.
pub fn expected_package_files(artifact: &LockArtifact, folders: &[PackageFolder]) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = artifact
        .package_libraries()
        .filter_map(|library| {
            let candidates = folders
                .iter()
                .map(|folder| folder.hash_file_path(&library.name, &library.version));
            let mut first = None;
            for candidate in candidates {
                if candidate.exists() {
                    return Some(candidate);
                }
                first.get_or_insert(candidate);
            }
            first
        })
        .collect();
    paths.sort();
    paths.dedup();
    paths
}
