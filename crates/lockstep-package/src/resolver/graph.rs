//! Resolved dependency graph for one framework/runtime pair
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. Edges carry the
//! request exactly as the parent declared it, so analysis can compare what
//! was asked for with what governs. Each name has at most one governing
//! node; every other request for that name is an edge to it.

use super::analysis::AnalyzeResult;
use crate::framework::FrameworkRuntimePair;
use crate::library::{LibraryDependency, LibraryIdentity, LibraryRange, LibraryType};
use std::collections::BTreeMap;

/// Index of a node in its graph's arena
pub type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    Accepted,
    /// Lost nearest-wins to another node of the same name
    Rejected,
    /// Reached again through one of its own descendants
    Cycle,
    /// Some request for this name asked for a higher version
    PotentiallyDowngraded,
}

#[derive(Debug, Clone)]
pub struct GraphNode {
    pub id: NodeId,
    /// `None` when no provider could satisfy the request
    pub identity: Option<LibraryIdentity>,
    /// Request the node was resolved from, after central pinning and
    /// overrides were applied
    pub request: LibraryRange,
    pub depth: usize,
    /// First parent on the shortest path from the root
    pub parent: Option<NodeId>,
    pub disposition: Disposition,
    /// Resolved from the central version table on behalf of a transitive
    /// request
    pub central_transitive: bool,
    /// Dependencies the library declares for this framework
    pub dependencies: Vec<LibraryDependency>,
    edges: Vec<usize>,
}

impl GraphNode {
    pub fn name(&self) -> &str {
        self.identity
            .as_ref()
            .map(|i| i.name.as_str())
            .unwrap_or(&self.request.name)
    }

    pub fn key(&self) -> String {
        self.name().to_ascii_lowercase()
    }

    pub fn is_resolved(&self) -> bool {
        self.identity.is_some()
    }

    pub fn is_package(&self) -> bool {
        self.identity
            .as_ref()
            .is_some_and(|i| i.library_type == LibraryType::Package)
    }

    /// `Name 1.0.0`, or the request when unresolved
    pub fn display(&self) -> String {
        match &self.identity {
            Some(identity) => identity.to_string(),
            None => self.request.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphEdge {
    pub from: NodeId,
    pub to: NodeId,
    /// The request as declared by `from`
    pub dependency: LibraryDependency,
}

#[derive(Debug, Clone)]
pub struct RestoreTargetGraph {
    pair: FrameworkRuntimePair,
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    governing: BTreeMap<String, NodeId>,
    unresolved: Vec<LibraryRange>,
    pub analyze_result: AnalyzeResult,
}

impl RestoreTargetGraph {
    /// Graph with no nodes, emitted for pairs that were not resolved
    pub fn empty(pair: FrameworkRuntimePair) -> Self {
        Self {
            pair,
            nodes: Vec::new(),
            edges: Vec::new(),
            governing: BTreeMap::new(),
            unresolved: Vec::new(),
            analyze_result: AnalyzeResult::default(),
        }
    }

    pub(crate) fn with_root(pair: FrameworkRuntimePair, root: LibraryIdentity, request: LibraryRange) -> Self {
        let mut graph = Self::empty(pair);
        let key = root.key();
        graph.nodes.push(GraphNode {
            id: 0,
            identity: Some(root),
            request,
            depth: 0,
            parent: None,
            disposition: Disposition::Accepted,
            central_transitive: false,
            dependencies: Vec::new(),
            edges: Vec::new(),
        });
        graph.governing.insert(key, 0);
        graph
    }

    pub fn pair(&self) -> &FrameworkRuntimePair {
        &self.pair
    }

    pub fn framework(&self) -> &str {
        &self.pair.framework
    }

    pub fn runtime_identifier(&self) -> Option<&str> {
        self.pair.runtime_identifier.as_deref()
    }

    /// `framework` or `framework/runtime`
    pub fn name(&self) -> String {
        self.pair.target_graph_name()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> Option<&GraphNode> {
        self.nodes.first()
    }

    pub fn node(&self, id: NodeId) -> &GraphNode {
        &self.nodes[id]
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn edge(&self, index: usize) -> &GraphEdge {
        &self.edges[index]
    }

    /// Edges leaving `id`, in declaration order
    pub fn outgoing(&self, id: NodeId) -> impl Iterator<Item = &GraphEdge> + '_ {
        self.nodes[id].edges.iter().map(move |&e| &self.edges[e])
    }

    /// Edges pointing at `id`
    pub fn incoming(&self, id: NodeId) -> impl Iterator<Item = &GraphEdge> + '_ {
        self.edges.iter().filter(move |e| e.to == id)
    }

    /// Governing node for `name`, resolved or not
    pub fn governing(&self, name: &str) -> Option<&GraphNode> {
        self.governing
            .get(&name.to_ascii_lowercase())
            .map(|&id| &self.nodes[id])
    }

    /// One resolved node per library name, sorted by name, root excluded
    pub fn flattened(&self) -> impl Iterator<Item = &GraphNode> + '_ {
        self.governing
            .values()
            .map(move |&id| &self.nodes[id])
            .filter(|node| node.id != 0 && node.is_resolved())
    }

    /// Requests no provider could satisfy, sorted by name
    pub fn unresolved(&self) -> &[LibraryRange] {
        &self.unresolved
    }

    pub fn has_unresolved(&self) -> bool {
        !self.unresolved.is_empty()
    }

    /// Cycles or conflicts were found
    pub fn in_conflict(&self) -> bool {
        !self.analyze_result.cycles.is_empty() || !self.analyze_result.version_conflicts.is_empty()
    }

    /// Nodes from the root to `id`, inclusive
    pub fn path(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = vec![id];
        let mut current = id;
        while let Some(parent) = self.nodes[current].parent {
            path.push(parent);
            current = parent;
        }
        path.reverse();
        path
    }

    /// `P 1.0.0 -> A 1.0.0 -> B 2.0.0`
    pub fn format_path(&self, id: NodeId) -> String {
        self.path(id)
            .into_iter()
            .map(|n| self.nodes[n].display())
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    /// Path to the requester of `edge`, ending in the requested range:
    /// `P 1.0.0 -> Q 1.0.0 -> X (>= 2.0.0 && < 3.0.0)`
    pub fn format_request_path(&self, edge: &GraphEdge) -> String {
        format!(
            "{} -> {}",
            self.format_path(edge.from),
            edge.dependency.library_range
        )
    }

    /// Path to a governing node, ending in the request it was resolved from
    pub fn format_path_with_range(&self, id: NodeId) -> String {
        let node = &self.nodes[id];
        let last = match (&node.identity, node.request.version_range.as_ref()) {
            (Some(identity), Some(range)) => format!("{} ({})", identity.name, range.pretty()),
            _ => node.display(),
        };
        match node.parent {
            Some(parent) => format!("{} -> {}", self.format_path(parent), last),
            None => last,
        }
    }

    pub(crate) fn add_node(&mut self, mut node: GraphNode) -> NodeId {
        let id = self.nodes.len();
        node.id = id;
        node.edges = Vec::new();
        self.nodes.push(node);
        id
    }

    pub(crate) fn add_edge(&mut self, from: NodeId, to: NodeId, dependency: LibraryDependency) {
        let index = self.edges.len();
        self.edges.push(GraphEdge {
            from,
            to,
            dependency,
        });
        self.nodes[from].edges.push(index);
    }

    pub(crate) fn set_governing(&mut self, key: String, id: NodeId) {
        self.governing.insert(key, id);
    }

    pub(crate) fn governing_id(&self, key: &str) -> Option<NodeId> {
        self.governing.get(key).copied()
    }

    pub(crate) fn set_dependencies(&mut self, id: NodeId, dependencies: Vec<LibraryDependency>) {
        self.nodes[id].dependencies = dependencies;
    }

    pub(crate) fn set_disposition(&mut self, id: NodeId, disposition: Disposition) {
        self.nodes[id].disposition = disposition;
    }

    pub(crate) fn add_unresolved(&mut self, range: LibraryRange) {
        if !self
            .unresolved
            .iter()
            .any(|r| r.name.eq_ignore_ascii_case(&range.name) && r.version_range == range.version_range)
        {
            self.unresolved.push(range);
            self.unresolved.sort_by_key(|r| r.key());
        }
    }

    /// Whether `ancestor` lies on the shortest path to `id`
    pub(crate) fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.nodes[node].parent;
        }
        false
    }
}

pub(crate) fn new_node(
    identity: Option<LibraryIdentity>,
    request: LibraryRange,
    depth: usize,
    parent: NodeId,
    central_transitive: bool,
) -> GraphNode {
    GraphNode {
        id: 0,
        identity,
        request,
        depth,
        parent: Some(parent),
        disposition: Disposition::Accepted,
        central_transitive,
        dependencies: Vec::new(),
        edges: Vec::new(),
    }
}
