//! Restore outcome and committing it to disk

use crate::cache::CacheFile;
use crate::commit::write_atomic;
use crate::compat::CompatibilityCheckResult;
use crate::error::RestoreResult;
use lockstep_package::{LockArtifact, PackagesLockFile, RestoreLogMessage, RestoreTargetGraph};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Outcome of one restore
#[derive(Debug, Clone)]
pub struct RestoreSummary {
    pub success: bool,
    /// The previous restore was still current and nothing was resolved
    pub no_op: bool,
    /// One graph per framework/runtime pair; empty for a no-op restore
    pub graphs: Vec<RestoreTargetGraph>,
    pub compatibility_results: Vec<CompatibilityCheckResult>,
    pub artifact: LockArtifact,
    /// Regenerated pin file, `None` when the existing one stays
    pub lock_file: Option<PackagesLockFile>,
    pub cache: CacheFile,
    pub assets_path: PathBuf,
    /// `None` when the cache is disabled
    pub cache_path: Option<PathBuf>,
    pub lock_file_path: PathBuf,
    /// Every message recorded during the restore
    pub log_messages: Vec<RestoreLogMessage>,
    pub elapsed: Duration,
}

impl RestoreSummary {
    pub fn errors(&self) -> impl Iterator<Item = &RestoreLogMessage> {
        self.log_messages.iter().filter(|m| m.is_error())
    }

    /// Write the lock artifact, the cache file and the regenerated pin
    /// file. A no-op restore writes nothing. Returns the written paths.
    pub fn commit(&self) -> RestoreResult<Vec<PathBuf>> {
        if self.no_op {
            debug!("No-op restore, nothing to write");
            return Ok(Vec::new());
        }

        let mut written = Vec::new();

        write_atomic(&self.assets_path, self.artifact.to_json()?.as_bytes())?;
        written.push(self.assets_path.clone());

        if let Some(lock_file) = &self.lock_file {
            write_atomic(&self.lock_file_path, lock_file.to_json()?.as_bytes())?;
            written.push(self.lock_file_path.clone());
        }

        if let Some(cache_path) = &self.cache_path {
            self.cache.write(cache_path)?;
            written.push(cache_path.clone());
        }

        info!(files = written.len(), success = self.success, "Restore outputs written");
        Ok(written)
    }
}
