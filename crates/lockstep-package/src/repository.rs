//! Local package folders
//!
//! Layout: `<root>/<id-lower>/<version>/`, with the package content hash in
//! `<id-lower>.<version>.sha512` inside the version directory. Folders are
//! read concurrently during a restore and never written by it.

use crate::library::PackageIdentity;
use crate::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use semver::Version;
use sha2::{Digest, Sha512};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Base64 SHA-512 of `content`
pub fn compute_content_hash(content: &[u8]) -> String {
    STANDARD.encode(Sha512::digest(content))
}

/// Package found in a local folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalPackageInfo {
    pub identity: PackageIdentity,
    pub sha512: String,
    pub directory: PathBuf,
    pub hash_file: PathBuf,
    /// Package-relative paths, `/`-separated and sorted
    pub files: Vec<String>,
}

impl LocalPackageInfo {
    /// Path stored in the lock artifact, relative to the folder root
    pub fn relative_path(&self) -> String {
        format!(
            "{}/{}",
            self.identity.id.to_ascii_lowercase(),
            self.identity.version
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageFolder {
    root: PathBuf,
}

impl PackageFolder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn package_directory(&self, id: &str, version: &Version) -> PathBuf {
        self.root
            .join(id.to_ascii_lowercase())
            .join(version.to_string().to_ascii_lowercase())
    }

    pub fn hash_file_path(&self, id: &str, version: &Version) -> PathBuf {
        let id = id.to_ascii_lowercase();
        self.package_directory(&id, version)
            .join(format!("{}.{}.sha512", id, version.to_string().to_ascii_lowercase()))
    }

    /// Look up an installed package. A package without its hash marker is
    /// treated as not installed.
    pub fn find_package(&self, id: &str, version: &Version) -> Option<LocalPackageInfo> {
        let hash_file = self.hash_file_path(id, version);
        let sha512 = fs::read_to_string(&hash_file).ok()?.trim().to_string();
        let directory = self.package_directory(id, version);

        let mut files: Vec<String> = WalkDir::new(&directory)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file() && entry.path() != hash_file)
            .filter_map(|entry| {
                entry
                    .path()
                    .strip_prefix(&directory)
                    .ok()
                    .map(|p| p.to_string_lossy().replace('\\', "/"))
            })
            .collect();
        files.sort();

        Some(LocalPackageInfo {
            identity: PackageIdentity::new(id, version.clone()),
            sha512,
            directory,
            hash_file,
            files,
        })
    }

    /// Write a package's files and hash marker into the folder layout.
    ///
    /// The content hash covers every file, in path order.
    pub fn stage_package(
        &self,
        id: &str,
        version: &Version,
        files: &[(&str, &[u8])],
    ) -> Result<LocalPackageInfo> {
        let directory = self.package_directory(id, version);
        fs::create_dir_all(&directory)?;

        let mut sorted: Vec<&(&str, &[u8])> = files.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));

        let mut hasher = Sha512::new();
        for (path, content) in sorted {
            let target = directory.join(path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&target, content)?;
            hasher.update(path.as_bytes());
            hasher.update(content);
        }

        let sha512 = STANDARD.encode(hasher.finalize());
        fs::write(self.hash_file_path(id, version), &sha512)?;

        Ok(LocalPackageInfo {
            identity: PackageIdentity::new(id, version.clone()),
            sha512,
            hash_file: self.hash_file_path(id, version),
            directory,
            files: {
                let mut names: Vec<String> = files.iter().map(|(p, _)| p.to_string()).collect();
                names.sort();
                names
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_stage_then_find() {
        let temp = TempDir::new().unwrap();
        let folder = PackageFolder::new(temp.path());
        let version = Version::new(1, 0, 0);

        let staged = folder
            .stage_package(
                "PackageX",
                &version,
                &[
                    ("lib/net8.0/PackageX.dll", &b"dll"[..]),
                    ("ref/net8.0/PackageX.dll", &b"ref"[..]),
                ],
            )
            .unwrap();

        let found = folder.find_package("packagex", &version).unwrap();
        assert_eq!(found.sha512, staged.sha512);
        assert_eq!(
            found.files,
            vec!["lib/net8.0/PackageX.dll", "ref/net8.0/PackageX.dll"]
        );
        assert_eq!(found.relative_path(), "packagex/1.0.0");
        assert!(found.hash_file.ends_with("packagex.1.0.0.sha512"));
    }

    #[test]
    fn test_missing_hash_marker_means_not_installed() {
        let temp = TempDir::new().unwrap();
        let folder = PackageFolder::new(temp.path());
        let version = Version::new(2, 0, 0);
        fs::create_dir_all(folder.package_directory("A", &version)).unwrap();
        assert!(folder.find_package("A", &version).is_none());
    }

    #[test]
    fn test_content_hash_is_base64_sha512() {
        let hash = compute_content_hash(b"");
        assert_eq!(
            hash,
            "z4PhNX7vuL3xVChQ1m2AB9Yg5AULVxXcg/SpIdNs6c5H0NE8XYXysP+DGNKHfuwvY7kxvUdBeoGlODJ6+SfaPg=="
        );
    }
}
