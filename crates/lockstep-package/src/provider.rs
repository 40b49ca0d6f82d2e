//! Library provider interface
//!
//! A provider answers two questions for the resolver: which identity best
//! matches a request, and what that identity depends on. Feed protocol
//! clients implement this trait outside this crate; the crate ships an
//! in-memory provider for local folders and tests, and a provider that
//! serves the project references of a restore.

use crate::library::{LibraryDependency, LibraryIdentity, LibraryRange};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

mod memory;
mod project;

pub use memory::MemoryProvider;
pub use project::{ExternalProjectReference, ProjectReferenceProvider};

/// Source-level failure. Unlike a missing package, this aborts resolution
/// of the framework/runtime pair that hit it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("Failed to retrieve information about '{library}' from source '{source_name}': {reason}")]
    Transport {
        source_name: String,
        library: String,
        reason: String,
    },

    #[error("Source '{source_name}' returned invalid data: {reason}")]
    Protocol { source_name: String, reason: String },
}

/// Trait for resolving library requests against a source
#[async_trait]
pub trait LibraryProvider: Send + Sync {
    /// Source location, used in diagnostics and for the http checks
    fn source(&self) -> &str;

    /// Whether the source is reached over http(s)
    fn is_http(&self) -> bool {
        let source = self.source();
        source.starts_with("http://") || source.starts_with("https://")
    }

    /// Best identity for `range` under `framework`, or `None` when nothing
    /// at this source matches
    async fn find_best_match(
        &self,
        range: &LibraryRange,
        framework: &str,
    ) -> Result<Option<LibraryIdentity>, ProviderError>;

    /// Dependencies declared by `identity` for `framework`
    async fn get_dependencies(
        &self,
        identity: &LibraryIdentity,
        framework: &str,
    ) -> Result<Vec<LibraryDependency>, ProviderError>;
}

/// Providers consulted by the resolver, in lookup order
#[derive(Clone, Default)]
pub struct DependencyProviders {
    /// Local folders and caches, consulted first
    pub local: Vec<Arc<dyn LibraryProvider>>,
    /// Remote feeds
    pub remote: Vec<Arc<dyn LibraryProvider>>,
}

impl DependencyProviders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_local(mut self, provider: Arc<dyn LibraryProvider>) -> Self {
        self.local.push(provider);
        self
    }

    pub fn with_remote(mut self, provider: Arc<dyn LibraryProvider>) -> Self {
        self.remote.push(provider);
        self
    }

    /// Local providers first, then remote ones
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn LibraryProvider>> {
        self.local.iter().chain(self.remote.iter())
    }

    /// Locations of the remote providers
    pub fn remote_sources(&self) -> Vec<String> {
        self.remote.iter().map(|p| p.source().to_string()).collect()
    }

    pub fn http_sources(&self) -> Vec<String> {
        self.iter()
            .filter(|p| p.is_http())
            .map(|p| p.source().to_string())
            .collect()
    }
}

impl std::fmt::Debug for DependencyProviders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sources = |providers: &[Arc<dyn LibraryProvider>]| -> Vec<String> {
            providers.iter().map(|p| p.source().to_string()).collect()
        };
        f.debug_struct("DependencyProviders")
            .field("local", &sources(&self.local))
            .field("remote", &sources(&self.remote))
            .finish()
    }
}
