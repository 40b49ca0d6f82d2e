//! Breadth-first graph construction for one pair
//!
//! Requests are processed one depth level at a time. The first level that
//! mentions a name decides it: the highest version resolved for any of that
//! level's requests governs, unless one of them carries a version override.
//! Requests for an already governed name only add an edge.

use super::cache::{MatchKey, ResolvedMatch};
use super::graph::{new_node, Disposition, NodeId, RestoreTargetGraph};
use super::{GraphAnalyzer, ResolveError, ResolveResult, WalkContext};
use crate::framework::FrameworkRuntimePair;
use crate::library::{LibraryDependency, LibraryIdentity, LibraryRange, LibraryType, TypeConstraint};
use crate::project::{CentralPackageVersion, ProjectSpec};
use crate::provider::{LibraryProvider, ProviderError};
use crate::version::VersionRange;
use semver::Version;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

struct Request {
    from: NodeId,
    /// As declared by `from`; becomes the edge
    declared: LibraryDependency,
    /// What is actually looked up
    lookup: LibraryRange,
    is_override: bool,
    central_transitive: bool,
}

pub(super) async fn walk(
    context: &WalkContext,
    spec: &ProjectSpec,
    pair: &FrameworkRuntimePair,
    token: &CancellationToken,
) -> ResolveResult<RestoreTargetGraph> {
    let Some(framework) = spec.framework(&pair.framework) else {
        warn!(target_graph = %pair, "Project does not declare this framework");
        return Ok(RestoreTargetGraph::empty(pair.clone()));
    };

    let root = LibraryIdentity::new(spec.name.clone(), spec.version.clone(), LibraryType::Project);
    let root_request = LibraryRange::new(
        spec.name.clone(),
        Some(VersionRange::exact(spec.version.clone())),
        TypeConstraint::Project,
    );
    let mut graph = RestoreTargetGraph::with_root(pair.clone(), root, root_request);

    let root_dependencies = framework.all_dependencies();
    graph.set_dependencies(0, root_dependencies.clone());

    let central_transitive: HashMap<String, &CentralPackageVersion> =
        if spec.central_transitive_pinning_enabled() {
            framework
                .central_package_versions
                .iter()
                .filter(|(_, central)| !framework.has_direct_dependency(&central.name))
                .map(|(key, central)| (key.clone(), central))
                .collect()
        } else {
            HashMap::new()
        };

    let pins = context.pinned.get(pair);
    let walker = Walker {
        context,
        framework: &pair.framework,
        pins,
        token,
    };

    let mut level: Vec<Request> = root_dependencies
        .into_iter()
        .map(direct_request)
        .collect();
    let mut depth = 1;

    while !level.is_empty() {
        let mut next = Vec::new();

        for (key, group) in group_by_name(level) {
            if let Some(existing) = graph.governing_id(&key) {
                for request in group {
                    graph.add_edge(request.from, existing, request.declared);
                }
                continue;
            }

            if let Some(node) = walker.resolve_group(&mut graph, key, group, depth).await? {
                for declared in graph.node(node).dependencies.clone() {
                    next.push(transitive_request(node, declared, &central_transitive));
                }
            }
        }

        level = next;
        depth += 1;
    }

    mark_dispositions(&mut graph);
    graph.analyze_result = GraphAnalyzer::analyze(&graph);
    debug!(
        target_graph = %pair,
        libraries = graph.flattened().count(),
        unresolved = graph.unresolved().len(),
        "Walk complete"
    );
    Ok(graph)
}

fn direct_request(declared: LibraryDependency) -> Request {
    let lookup = LibraryRange {
        version_range: declared.effective_range().cloned(),
        ..declared.library_range.clone()
    };
    Request {
        from: 0,
        is_override: declared.version_override.is_some(),
        declared,
        lookup,
        central_transitive: false,
    }
}

fn transitive_request(
    from: NodeId,
    declared: LibraryDependency,
    central_transitive: &HashMap<String, &CentralPackageVersion>,
) -> Request {
    let pinned = central_transitive
        .get(&declared.key())
        .filter(|_| declared.library_range.type_constraint.allows(LibraryType::Package));

    let lookup = match pinned {
        Some(central) => LibraryRange {
            version_range: Some(central.version_range.clone()),
            ..declared.library_range.clone()
        },
        None => declared.library_range.clone(),
    };

    Request {
        from,
        central_transitive: pinned.is_some(),
        declared,
        lookup,
        is_override: false,
    }
}

/// Group requests by lowercased name, keeping first-seen order
fn group_by_name(requests: Vec<Request>) -> Vec<(String, Vec<Request>)> {
    let mut groups: Vec<(String, Vec<Request>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for request in requests {
        let key = request.lookup.key();
        match index.get(&key) {
            Some(&i) => groups[i].1.push(request),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, vec![request]));
            }
        }
    }
    groups
}

struct Walker<'a> {
    context: &'a WalkContext,
    framework: &'a str,
    pins: Option<&'a HashMap<String, Version>>,
    token: &'a CancellationToken,
}

impl Walker<'_> {
    /// Resolve every request of one name at one depth and create the
    /// governing node. Returns the node when it should be expanded.
    async fn resolve_group(
        &self,
        graph: &mut RestoreTargetGraph,
        key: String,
        group: Vec<Request>,
        depth: usize,
    ) -> ResolveResult<Option<NodeId>> {
        let mut found: Vec<Option<ResolvedMatch>> = Vec::with_capacity(group.len());
        for request in &group {
            let lookup = self.apply_pin(&request.lookup);
            found.push(self.find_library(&lookup).await?);
        }

        let Some(winner) = pick_winner(&group, &found) else {
            let first = &group[0];
            let id = graph.add_node(new_node(
                None,
                first.lookup.clone(),
                depth,
                first.from,
                first.central_transitive,
            ));
            graph.set_governing(key, id);
            for request in group {
                trace!(request = %request.lookup, "Unable to resolve");
                graph.add_unresolved(request.lookup.clone());
                graph.add_edge(request.from, id, request.declared);
            }
            return Ok(None);
        };

        let Some(winning) = found[winner].clone() else {
            return Ok(None);
        };
        let request = &group[winner];
        let id = graph.add_node(new_node(
            Some(winning.identity.clone()),
            self.apply_pin(&request.lookup),
            depth,
            request.from,
            request.central_transitive,
        ));
        graph.set_governing(key, id);

        let mut rejected: Vec<&LibraryIdentity> = Vec::new();
        for (i, candidate) in found.iter().enumerate() {
            let Some(candidate) = candidate else { continue };
            if i == winner
                || candidate.identity == winning.identity
                || rejected.contains(&&candidate.identity)
            {
                continue;
            }
            rejected.push(&candidate.identity);
            let loser = graph.add_node(new_node(
                Some(candidate.identity.clone()),
                group[i].lookup.clone(),
                depth,
                group[i].from,
                group[i].central_transitive,
            ));
            graph.set_disposition(loser, Disposition::Rejected);
        }

        for request in group {
            graph.add_edge(request.from, id, request.declared);
        }

        let dependencies = self.get_dependencies(&winning).await?;
        graph.set_dependencies(id, dependencies);
        Ok(Some(id))
    }

    fn apply_pin(&self, lookup: &LibraryRange) -> LibraryRange {
        let pinned = self
            .pins
            .filter(|_| lookup.type_constraint == TypeConstraint::Package)
            .and_then(|pins| pins.get(&lookup.key()));
        match pinned {
            Some(version) => LibraryRange {
                version_range: Some(VersionRange::exact(version.clone())),
                ..lookup.clone()
            },
            None => lookup.clone(),
        }
    }

    /// Project provider first for ranges that admit projects, then local
    /// providers, then remote ones. The first hit wins.
    async fn find_library(&self, range: &LibraryRange) -> ResolveResult<Option<ResolvedMatch>> {
        let key = MatchKey::new(range, self.framework);
        if let Some(cached) = self.context.cache.get_match(&key) {
            return Ok(cached);
        }

        let mut candidates: Vec<Arc<dyn LibraryProvider>> = Vec::new();
        if range.type_constraint.allows_projects() {
            if let Some(projects) = &self.context.project_provider {
                let projects: Arc<dyn LibraryProvider> = projects.clone();
                candidates.push(projects);
            }
        }
        candidates.extend(self.context.providers.iter().cloned());

        let mut found = None;
        for provider in candidates {
            let identity =
                cancellable(self.token, provider.find_best_match(range, self.framework)).await?;
            if let Some(identity) = identity {
                found = Some(ResolvedMatch { identity, provider });
                break;
            }
        }

        self.context.cache.insert_match(key, found.clone());
        Ok(found)
    }

    async fn get_dependencies(&self, resolved: &ResolvedMatch) -> ResolveResult<Vec<LibraryDependency>> {
        if let Some(cached) = self
            .context
            .cache
            .get_dependencies(&resolved.identity, self.framework)
        {
            return Ok(cached);
        }

        let dependencies = cancellable(
            self.token,
            resolved
                .provider
                .get_dependencies(&resolved.identity, self.framework),
        )
        .await?;
        self.context
            .cache
            .insert_dependencies(&resolved.identity, self.framework, dependencies.clone());
        Ok(dependencies)
    }
}

/// Overrides beat everything; otherwise the highest version wins and ties
/// keep the first request
fn pick_winner(group: &[Request], found: &[Option<ResolvedMatch>]) -> Option<usize> {
    let mut winner: Option<usize> = None;
    for (i, candidate) in found.iter().enumerate() {
        let Some(candidate) = candidate else { continue };
        let better = match winner.and_then(|w| found[w].as_ref().map(|m| (w, m))) {
            None => true,
            Some((w, current)) => {
                let (mine, theirs) = (group[i].is_override, group[w].is_override);
                (mine && !theirs)
                    || (mine == theirs && candidate.identity.version > current.identity.version)
            }
        };
        if better {
            winner = Some(i);
        }
    }
    winner
}

async fn cancellable<T, F>(token: &CancellationToken, future: F) -> ResolveResult<T>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(ResolveError::Cancelled),
        result = future => result.map_err(ResolveError::from),
    }
}

fn mark_dispositions(graph: &mut RestoreTargetGraph) {
    let mut updates = Vec::new();
    for edge in graph.edges() {
        let target = graph.node(edge.to);
        if graph.is_ancestor(edge.to, edge.from) {
            updates.push((edge.to, Disposition::Cycle));
            continue;
        }
        let requested_min = edge
            .dependency
            .effective_range()
            .and_then(VersionRange::min_version);
        if let (Some(identity), Some(min)) = (&target.identity, requested_min) {
            if identity.version < *min {
                updates.push((edge.to, Disposition::PotentiallyDowngraded));
            }
        }
    }

    for (id, disposition) in updates {
        let current = graph.node(id).disposition;
        if current == Disposition::Accepted || disposition == Disposition::Cycle {
            graph.set_disposition(id, disposition);
        }
    }
}
