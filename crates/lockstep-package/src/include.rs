//! Effective include flags per library, per graph
//!
//! Flags are intersected along each path from the project and unioned
//! across paths. The map is built once per restore and addressed by
//! [`GraphHandle`], the position of a graph in the restore's graph list.

use crate::library::IncludeFlags;
use crate::resolver::{NodeId, RestoreTargetGraph};
use std::collections::{BTreeMap, HashMap, VecDeque};

/// Index of a graph in the restore's graph list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphHandle(pub usize);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncludeFlagsMap {
    graphs: HashMap<GraphHandle, BTreeMap<String, IncludeFlags>>,
}

impl IncludeFlagsMap {
    pub fn from_graphs(graphs: &[RestoreTargetGraph]) -> Self {
        let graphs = graphs
            .iter()
            .enumerate()
            .map(|(index, graph)| (GraphHandle(index), flatten_include_flags(graph)))
            .collect();
        Self { graphs }
    }

    /// Flags for `library` in the graph behind `handle`. Libraries the map
    /// does not know get every asset.
    pub fn flags(&self, handle: GraphHandle, library: &str) -> IncludeFlags {
        self.graphs
            .get(&handle)
            .and_then(|flags| flags.get(&library.to_ascii_lowercase()))
            .copied()
            .unwrap_or(IncludeFlags::ALL)
    }

    pub fn graph(&self, handle: GraphHandle) -> Option<&BTreeMap<String, IncludeFlags>> {
        self.graphs.get(&handle)
    }
}

/// Lowercased library name to effective flags, root excluded
pub fn flatten_include_flags(graph: &RestoreTargetGraph) -> BTreeMap<String, IncludeFlags> {
    if graph.is_empty() {
        return BTreeMap::new();
    }

    let mut flags: HashMap<NodeId, IncludeFlags> = HashMap::new();
    let mut queue: VecDeque<(NodeId, IncludeFlags)> = VecDeque::from([(0, IncludeFlags::ALL)]);

    while let Some((node, incoming)) = queue.pop_front() {
        for edge in graph.outgoing(node) {
            if edge.to == 0 {
                continue;
            }
            let propagated = incoming.intersect(edge.dependency.include);
            let current = flags.get(&edge.to).copied().unwrap_or(IncludeFlags::NONE);
            let merged = current.union(propagated);
            if merged != current || !flags.contains_key(&edge.to) {
                flags.insert(edge.to, merged);
                queue.push_back((edge.to, merged));
            }
        }
    }

    flags
        .into_iter()
        .filter(|(id, _)| graph.node(*id).is_resolved())
        .map(|(id, flags)| (graph.node(id).key(), flags))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::FrameworkRuntimePair;
    use crate::library::{LibraryDependency, LibraryIdentity, LibraryRange, LibraryType, TypeConstraint};
    use crate::resolver::graph::new_node;
    use semver::Version;

    fn compile_only() -> IncludeFlags {
        IncludeFlags {
            compile: true,
            runtime: false,
            build: false,
        }
    }

    fn package(graph: &mut RestoreTargetGraph, from: NodeId, name: &str) -> NodeId {
        graph.add_node(new_node(
            Some(LibraryIdentity::package(name, Version::new(1, 0, 0))),
            LibraryRange::package(name, "1.0.0".parse().unwrap()),
            graph.node(from).depth + 1,
            from,
            false,
        ))
    }

    #[test]
    fn test_intersect_along_path_union_across_paths() {
        let mut graph = RestoreTargetGraph::with_root(
            FrameworkRuntimePair::framework_only("net8.0"),
            LibraryIdentity::new("P", Version::new(1, 0, 0), LibraryType::Project),
            LibraryRange::new("P", None, TypeConstraint::Project),
        );
        let a = package(&mut graph, 0, "A");
        let b = package(&mut graph, 0, "B");
        let c = package(&mut graph, a, "C");

        let dep = |name: &str| LibraryDependency::package(name, "1.0.0".parse().unwrap());
        graph.add_edge(0, a, dep("A").with_include(compile_only()));
        graph.add_edge(0, b, dep("B"));
        graph.add_edge(a, c, dep("C"));

        let flags = flatten_include_flags(&graph);
        assert_eq!(flags["a"], compile_only());
        assert_eq!(flags["c"], compile_only());
        assert_eq!(flags["b"], IncludeFlags::ALL);

        // a second, unrestricted path to C widens it
        graph.add_edge(b, c, dep("C"));
        let flags = flatten_include_flags(&graph);
        assert_eq!(flags["c"], IncludeFlags::ALL);

        let map = IncludeFlagsMap::from_graphs(&[graph]);
        assert_eq!(map.flags(GraphHandle(0), "A"), compile_only());
        assert_eq!(map.flags(GraphHandle(3), "A"), IncludeFlags::ALL);
    }

    #[test]
    fn test_excluded_everything_still_listed() {
        let mut graph = RestoreTargetGraph::with_root(
            FrameworkRuntimePair::framework_only("net8.0"),
            LibraryIdentity::new("P", Version::new(1, 0, 0), LibraryType::Project),
            LibraryRange::new("P", None, TypeConstraint::Project),
        );
        let a = package(&mut graph, 0, "A");
        graph.add_edge(
            0,
            a,
            LibraryDependency::package("A", "1.0.0".parse().unwrap()).with_include(IncludeFlags::NONE),
        );
        assert_eq!(flatten_include_flags(&graph)["a"], IncludeFlags::NONE);
    }
}
