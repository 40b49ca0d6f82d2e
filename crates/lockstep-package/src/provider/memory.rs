//! In-memory provider

use super::{LibraryProvider, ProviderError};
use crate::library::{LibraryDependency, LibraryIdentity, LibraryRange, LibraryType};
use async_trait::async_trait;
use semver::Version;
use std::collections::BTreeMap;
#[cfg(any(test, feature = "test-util"))]
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Dependency group that applies to every framework
const ANY_FRAMEWORK: &str = "*";

#[derive(Debug, Clone)]
struct MemoryPackage {
    name: String,
    version: Version,
    /// Framework (or `*`) to dependencies
    dependencies: BTreeMap<String, Vec<LibraryDependency>>,
}

/// Provider backed by a fixed package list.
///
/// With the `test-util` feature it also counts every call and can be told
/// to fail lookups, so tests can assert that a restore did or did not touch
/// its sources.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    source: String,
    packages: BTreeMap<String, Vec<MemoryPackage>>,
    #[cfg(any(test, feature = "test-util"))]
    failing: Vec<String>,
    #[cfg(any(test, feature = "test-util"))]
    calls: AtomicUsize,
}

impl MemoryProvider {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    /// Add a package whose dependencies apply to every framework
    pub fn with_package(mut self, name: &str, version: Version, dependencies: Vec<LibraryDependency>) -> Self {
        self.add_package(name, version, dependencies);
        self
    }

    pub fn add_package(&mut self, name: &str, version: Version, dependencies: Vec<LibraryDependency>) {
        self.add_package_for_framework(name, version, ANY_FRAMEWORK, dependencies);
    }

    /// Add a dependency group for one framework
    pub fn add_package_for_framework(
        &mut self,
        name: &str,
        version: Version,
        framework: &str,
        dependencies: Vec<LibraryDependency>,
    ) {
        let versions = self.packages.entry(name.to_ascii_lowercase()).or_default();
        let index = match versions.iter().position(|p| p.version == version) {
            Some(index) => index,
            None => {
                versions.push(MemoryPackage {
                    name: name.to_string(),
                    version,
                    dependencies: BTreeMap::new(),
                });
                versions.len() - 1
            }
        };
        versions[index]
            .dependencies
            .insert(framework.to_ascii_lowercase(), dependencies);
    }
}

#[cfg(any(test, feature = "test-util"))]
impl MemoryProvider {
    /// Make every lookup of `name` fail with a transport error
    pub fn with_failure(mut self, name: &str) -> Self {
        self.failing.push(name.to_ascii_lowercase());
        self
    }

    /// Number of provider calls served so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record_call(&self, name: &str) -> Result<(), ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.iter().any(|f| f.eq_ignore_ascii_case(name)) {
            return Err(ProviderError::Transport {
                source_name: self.source.clone(),
                library: name.to_string(),
                reason: "the source is unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(not(any(test, feature = "test-util")))]
impl MemoryProvider {
    fn record_call(&self, _name: &str) -> Result<(), ProviderError> {
        Ok(())
    }
}

#[async_trait]
impl LibraryProvider for MemoryProvider {
    fn source(&self) -> &str {
        &self.source
    }

    async fn find_best_match(
        &self,
        range: &LibraryRange,
        _framework: &str,
    ) -> Result<Option<LibraryIdentity>, ProviderError> {
        self.record_call(&range.name)?;

        if !range.type_constraint.allows(LibraryType::Package) {
            return Ok(None);
        }
        let Some(versions) = self.packages.get(&range.key()) else {
            return Ok(None);
        };
        let Some(version_range) = &range.version_range else {
            return Ok(None);
        };

        let best = version_range
            .find_best_match(versions.iter().map(|p| &p.version))
            .and_then(|best| versions.iter().find(|p| &p.version == best));

        debug!(source = %self.source, request = %range, found = ?best.map(|p| &p.version), "Memory lookup");
        Ok(best.map(|p| LibraryIdentity::package(p.name.clone(), p.version.clone())))
    }

    async fn get_dependencies(
        &self,
        identity: &LibraryIdentity,
        framework: &str,
    ) -> Result<Vec<LibraryDependency>, ProviderError> {
        self.record_call(&identity.name)?;

        let package = self
            .packages
            .get(&identity.key())
            .and_then(|versions| versions.iter().find(|p| p.version == identity.version));
        let Some(package) = package else {
            return Ok(Vec::new());
        };

        let group = package
            .dependencies
            .get(&framework.to_ascii_lowercase())
            .or_else(|| package.dependencies.get(ANY_FRAMEWORK));
        Ok(group.cloned().unwrap_or_default())
    }
}
