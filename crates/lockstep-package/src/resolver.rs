//! Nearest-wins dependency graph resolution
//!
//! One graph is built per framework/runtime pair. Pairs resolve
//! concurrently as tokio tasks that share nothing but a read-through cache
//! of provider answers; the finished graphs are put back in pair order.

use crate::framework::FrameworkRuntimePair;
use crate::library::LibraryIdentity;
use crate::project::ProjectSpec;
use crate::provider::{DependencyProviders, ProjectReferenceProvider, ProviderError};
use semver::Version;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub mod analysis;
mod cache;
pub(crate) mod graph;
mod walker;

pub use analysis::{AnalyzeResult, Cycle, Downgrade, GraphAnalyzer, VersionConflict};
pub use graph::{Disposition, GraphEdge, GraphNode, NodeId, RestoreTargetGraph};

use cache::ProviderCache;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Resolution was cancelled")]
    Cancelled,

    #[error("Resolution task failed: {0}")]
    TaskFailed(String),
}

pub type ResolveResult<T> = Result<T, ResolveError>;

/// Graphs for every requested pair, in pair order.
///
/// A pair whose provider failed has an empty graph here and an entry in
/// `failures`.
#[derive(Debug, Clone, Default)]
pub struct ResolvedGraphs {
    pub graphs: Vec<RestoreTargetGraph>,
    pub failures: Vec<(FrameworkRuntimePair, ProviderError)>,
}

/// Shared, read-only state for every pair of one resolution
pub(crate) struct WalkContext {
    providers: DependencyProviders,
    project_provider: Option<Arc<ProjectReferenceProvider>>,
    pinned: HashMap<FrameworkRuntimePair, HashMap<String, Version>>,
    cache: ProviderCache,
}

pub struct GraphResolver {
    providers: DependencyProviders,
    project_provider: Option<Arc<ProjectReferenceProvider>>,
    pinned: HashMap<FrameworkRuntimePair, HashMap<String, Version>>,
}

impl GraphResolver {
    pub fn new(providers: DependencyProviders) -> Self {
        Self {
            providers,
            project_provider: None,
            pinned: HashMap::new(),
        }
    }

    /// Serve project-typed requests from these projects
    pub fn with_project_provider(mut self, provider: Arc<ProjectReferenceProvider>) -> Self {
        self.project_provider = Some(provider);
        self
    }

    /// Resolve these packages to their pinned versions instead of matching
    /// ranges. Non-package identities are ignored.
    pub fn with_pinned_versions(
        mut self,
        pinned: HashMap<FrameworkRuntimePair, Vec<LibraryIdentity>>,
    ) -> Self {
        self.pinned = pinned
            .into_iter()
            .map(|(pair, identities)| {
                let versions = identities
                    .into_iter()
                    .filter(|i| !i.library_type.is_project())
                    .map(|i| (i.key(), i.version))
                    .collect();
                (pair, versions)
            })
            .collect();
        self
    }

    /// Build one graph per pair.
    ///
    /// Missing packages are recorded on their graph. A provider failure
    /// empties only the graph of the pair that hit it. Cancellation
    /// discards everything.
    pub async fn resolve(
        self,
        spec: Arc<ProjectSpec>,
        pairs: &[FrameworkRuntimePair],
        token: &CancellationToken,
    ) -> ResolveResult<ResolvedGraphs> {
        if token.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }

        info!(
            project = %spec.name,
            pairs = pairs.len(),
            "Resolving dependency graphs"
        );

        let context = Arc::new(WalkContext {
            providers: self.providers,
            project_provider: self.project_provider,
            pinned: self.pinned,
            cache: ProviderCache::default(),
        });

        let mut tasks = JoinSet::new();
        for (index, pair) in pairs.iter().cloned().enumerate() {
            let context = Arc::clone(&context);
            let spec = Arc::clone(&spec);
            let token = token.clone();
            tasks.spawn(async move {
                let result = walker::walk(&context, &spec, &pair, &token).await;
                (index, pair, result)
            });
        }

        let mut slots: Vec<Option<RestoreTargetGraph>> = vec![None; pairs.len()];
        let mut failures = Vec::new();

        while let Some(joined) = tasks.join_next().await {
            let (index, pair, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    tasks.abort_all();
                    return Err(ResolveError::TaskFailed(e.to_string()));
                }
            };

            match result {
                Ok(graph) => {
                    debug!(target_graph = %pair, nodes = graph.nodes().len(), "Graph resolved");
                    slots[index] = Some(graph);
                }
                Err(ResolveError::Provider(e)) => {
                    warn!(target_graph = %pair, error = %e, "Resolution aborted for target");
                    slots[index] = Some(RestoreTargetGraph::empty(pair.clone()));
                    failures.push((index, pair, e));
                }
                Err(e) => {
                    tasks.abort_all();
                    return Err(e);
                }
            }
        }

        if token.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }

        failures.sort_by_key(|(index, _, _)| *index);
        let graphs = slots
            .into_iter()
            .zip(pairs)
            .map(|(slot, pair)| slot.unwrap_or_else(|| RestoreTargetGraph::empty(pair.clone())))
            .collect();

        Ok(ResolvedGraphs {
            graphs,
            failures: failures
                .into_iter()
                .map(|(_, pair, error)| (pair, error))
                .collect(),
        })
    }
}
