//! Writing restore outputs

use crate::error::{RestoreError, RestoreResult};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Replace `path` with `content` through a temporary file in the same
/// directory, so readers never see a partial file.
pub(crate) fn write_atomic(path: &Path, content: &[u8]) -> RestoreResult<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(dir).map_err(|e| RestoreError::io(dir, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| RestoreError::io(dir, e))?;
    tmp.write_all(content).map_err(|e| RestoreError::io(path, e))?;
    tmp.as_file().sync_all().map_err(|e| RestoreError::io(path, e))?;
    tmp.persist(path).map_err(|e| RestoreError::io(path, e.error))?;
    Ok(())
}
