//! Cycle, conflict and downgrade detection over a resolved graph
//!
//! Analysis is a pure function of the graph. Cycles are looked for first;
//! conflicts only when there are none, downgrades only when there are no
//! conflicts either, so one root cause is not reported three times.
//!
//! A request that the governing version does not satisfy is a downgrade
//! when the governing version sits below the request's minimum and the
//! governing node itself would have accepted that minimum (or was pinned
//! centrally). Anything else, such as disjoint ranges, is a conflict.

use super::graph::{GraphEdge, NodeId, RestoreTargetGraph};
use semver::Version;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    /// Nodes on the cycle, first and last are the same node
    pub nodes: Vec<NodeId>,
    /// `A 1.0.0 -> B 2.0.0 -> A 1.0.0`
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConflict {
    pub library: String,
    pub selected: NodeId,
    /// Path to the governing node
    pub selected_path: String,
    /// Path to the request it does not satisfy
    pub conflicting_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Downgrade {
    pub library: String,
    /// Minimum version the deeper request asked for
    pub requested_version: Version,
    /// Version that governs
    pub resolved_version: Version,
    /// Path to the request that was downgraded
    pub downgraded_path: String,
    /// Path to the node that caused the downgrade
    pub downgraded_by_path: String,
    /// The governing version comes from the central version table
    pub is_central_transitive: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalyzeResult {
    pub cycles: Vec<Cycle>,
    pub version_conflicts: Vec<VersionConflict>,
    pub downgrades: Vec<Downgrade>,
}

impl AnalyzeResult {
    pub fn is_clean(&self) -> bool {
        self.cycles.is_empty() && self.version_conflicts.is_empty() && self.downgrades.is_empty()
    }
}

enum Verdict {
    Satisfied,
    Conflict,
    Downgrade,
}

pub struct GraphAnalyzer;

impl GraphAnalyzer {
    pub fn analyze(graph: &RestoreTargetGraph) -> AnalyzeResult {
        let cycles = Self::find_cycles(graph);
        if !cycles.is_empty() {
            return AnalyzeResult {
                cycles,
                ..Default::default()
            };
        }

        let version_conflicts = Self::find_conflicts(graph);
        if !version_conflicts.is_empty() {
            return AnalyzeResult {
                version_conflicts,
                ..Default::default()
            };
        }

        AnalyzeResult {
            downgrades: Self::find_downgrades(graph),
            ..Default::default()
        }
    }

    /// First cycle reachable from the root, found depth-first
    pub fn find_cycles(graph: &RestoreTargetGraph) -> Vec<Cycle> {
        if graph.is_empty() {
            return Vec::new();
        }

        fn visit(
            graph: &RestoreTargetGraph,
            node: NodeId,
            visited: &mut HashSet<NodeId>,
            path: &mut Vec<NodeId>,
        ) -> Option<Vec<NodeId>> {
            visited.insert(node);
            path.push(node);

            for edge in graph.outgoing(node) {
                if let Some(start) = path.iter().position(|&n| n == edge.to) {
                    let mut cycle = path[start..].to_vec();
                    cycle.push(edge.to);
                    return Some(cycle);
                }
                if !visited.contains(&edge.to) {
                    if let Some(cycle) = visit(graph, edge.to, visited, path) {
                        return Some(cycle);
                    }
                }
            }

            path.pop();
            None
        }

        let mut visited = HashSet::new();
        let mut path = Vec::new();
        visit(graph, 0, &mut visited, &mut path)
            .map(|nodes| Cycle {
                path: nodes
                    .iter()
                    .map(|&n| graph.node(n).display())
                    .collect::<Vec<_>>()
                    .join(" -> "),
                nodes,
            })
            .into_iter()
            .collect()
    }

    /// At most one conflict per library name, in edge order
    pub fn find_conflicts(graph: &RestoreTargetGraph) -> Vec<VersionConflict> {
        let mut reported = HashSet::new();
        let mut conflicts = Vec::new();

        for edge in graph.edges() {
            if !matches!(classify(graph, edge), Verdict::Conflict) {
                continue;
            }
            let target = graph.node(edge.to);
            if !reported.insert(target.key()) {
                continue;
            }
            conflicts.push(VersionConflict {
                library: target.name().to_string(),
                selected: edge.to,
                selected_path: graph.format_path(edge.to),
                conflicting_path: graph.format_request_path(edge),
            });
        }

        conflicts
    }

    /// Every downgraded request on a package, in edge order
    pub fn find_downgrades(graph: &RestoreTargetGraph) -> Vec<Downgrade> {
        let mut downgrades: Vec<Downgrade> = Vec::new();

        for edge in graph.edges() {
            if !matches!(classify(graph, edge), Verdict::Downgrade) {
                continue;
            }
            let target = graph.node(edge.to);
            let (Some(identity), Some(requested)) = (
                &target.identity,
                edge.dependency
                    .effective_range()
                    .and_then(|r| r.min_version()),
            ) else {
                continue;
            };

            let downgrade = Downgrade {
                library: identity.name.clone(),
                requested_version: requested.clone(),
                resolved_version: identity.version.clone(),
                downgraded_path: graph.format_request_path(edge),
                downgraded_by_path: graph.format_path_with_range(edge.to),
                is_central_transitive: target.central_transitive,
            };
            if !downgrades.contains(&downgrade) {
                downgrades.push(downgrade);
            }
        }

        downgrades
    }
}

fn classify(graph: &RestoreTargetGraph, edge: &GraphEdge) -> Verdict {
    let target = graph.node(edge.to);
    if !target.is_package() {
        return Verdict::Satisfied;
    }
    let (Some(identity), Some(requested)) = (&target.identity, edge.dependency.effective_range())
    else {
        return Verdict::Satisfied;
    };
    if requested.satisfies(&identity.version) {
        return Verdict::Satisfied;
    }

    let below_min = requested
        .min_version()
        .filter(|min| identity.version < **min);
    match below_min {
        Some(min) => {
            let governing_accepts_min = target
                .request
                .version_range
                .as_ref()
                .is_some_and(|range| range.satisfies(min));
            if target.central_transitive || governing_accepts_min {
                Verdict::Downgrade
            } else {
                Verdict::Conflict
            }
        }
        None => Verdict::Conflict,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::FrameworkRuntimePair;
    use crate::library::{LibraryDependency, LibraryIdentity, LibraryRange, LibraryType, TypeConstraint};
    use crate::resolver::graph::new_node;
    use crate::version::VersionRange;
    use pretty_assertions::assert_eq;

    fn root_graph() -> RestoreTargetGraph {
        RestoreTargetGraph::with_root(
            FrameworkRuntimePair::framework_only("net8.0"),
            LibraryIdentity::new("P", Version::new(1, 0, 0), LibraryType::Project),
            LibraryRange::new("P", None, TypeConstraint::Project),
        )
    }

    fn range(s: &str) -> VersionRange {
        s.parse().unwrap()
    }

    fn add_package(
        graph: &mut RestoreTargetGraph,
        from: NodeId,
        name: &str,
        version: Version,
        request: &str,
    ) -> NodeId {
        let depth = graph.node(from).depth + 1;
        let id = graph.add_node(new_node(
            Some(LibraryIdentity::package(name, version)),
            LibraryRange::package(name, range(request)),
            depth,
            from,
            false,
        ));
        graph.set_governing(name.to_ascii_lowercase(), id);
        graph.add_edge(from, id, LibraryDependency::package(name, range(request)));
        id
    }

    #[test]
    fn test_clean_graph() {
        let mut graph = root_graph();
        let x = add_package(&mut graph, 0, "PackageX", Version::new(1, 0, 0), "1.0.0");
        add_package(&mut graph, x, "PackageY", Version::new(1, 0, 1), "1.0.1");
        assert!(GraphAnalyzer::analyze(&graph).is_clean());
    }

    #[test]
    fn test_cycle_reported_and_nothing_else() {
        let mut graph = root_graph();
        let a = add_package(&mut graph, 0, "A", Version::new(1, 0, 0), "1.0.0");
        let b = add_package(&mut graph, a, "B", Version::new(2, 0, 0), "2.0.0");
        // B asks for a version of A that 1.0.0 cannot satisfy
        graph.add_edge(b, a, LibraryDependency::package("A", range("[5.0.0]")));

        let result = GraphAnalyzer::analyze(&graph);
        assert_eq!(result.cycles.len(), 1);
        assert_eq!(result.cycles[0].path, "A 1.0.0 -> B 2.0.0 -> A 1.0.0");
        assert!(result.version_conflicts.is_empty());
        assert!(result.downgrades.is_empty());
    }

    #[test]
    fn test_disjoint_ranges_are_a_conflict() {
        let mut graph = root_graph();
        let x = add_package(&mut graph, 0, "PackageX", Version::new(1, 5, 0), "^1.0.0");
        let q = add_package(&mut graph, 0, "PackageQ", Version::new(1, 0, 0), "1.0.0");
        graph.add_edge(
            q,
            x,
            LibraryDependency::package("PackageX", range("[2.0.0, 3.0.0)")),
        );

        let result = GraphAnalyzer::analyze(&graph);
        assert_eq!(result.version_conflicts.len(), 1);
        let conflict = &result.version_conflicts[0];
        assert_eq!(conflict.library, "PackageX");
        assert_eq!(conflict.selected_path, "P 1.0.0 -> PackageX 1.5.0");
        assert_eq!(
            conflict.conflicting_path,
            "P 1.0.0 -> PackageQ 1.0.0 -> PackageX (>= 2.0.0 && < 3.0.0)"
        );
        assert!(result.downgrades.is_empty());
    }

    #[test]
    fn test_open_range_below_request_is_a_downgrade() {
        let mut graph = root_graph();
        let x = add_package(&mut graph, 0, "PackageX", Version::new(1, 0, 0), "1.0.0");
        let q = add_package(&mut graph, 0, "PackageQ", Version::new(1, 0, 0), "1.0.0");
        graph.add_edge(q, x, LibraryDependency::package("PackageX", range("2.0.0")));

        let result = GraphAnalyzer::analyze(&graph);
        assert!(result.version_conflicts.is_empty());
        assert_eq!(
            result.downgrades,
            vec![Downgrade {
                library: "PackageX".to_string(),
                requested_version: Version::new(2, 0, 0),
                resolved_version: Version::new(1, 0, 0),
                downgraded_path: "P 1.0.0 -> PackageQ 1.0.0 -> PackageX (>= 2.0.0)".to_string(),
                downgraded_by_path: "P 1.0.0 -> PackageX (>= 1.0.0)".to_string(),
                is_central_transitive: false,
            }]
        );
    }

    #[test]
    fn test_central_transitive_downgrade_is_flagged() {
        let mut graph = root_graph();
        let a = add_package(&mut graph, 0, "A", Version::new(1, 0, 0), "1.0.0");
        let c = graph.add_node(new_node(
            Some(LibraryIdentity::package("C", Version::new(1, 0, 0))),
            LibraryRange::package("C", range("[1.0.0]")),
            2,
            a,
            true,
        ));
        graph.set_governing("c".to_string(), c);
        graph.add_edge(a, c, LibraryDependency::package("C", range("2.0.0")));

        let result = GraphAnalyzer::analyze(&graph);
        assert_eq!(result.downgrades.len(), 1);
        assert!(result.downgrades[0].is_central_transitive);
    }

    #[test]
    fn test_project_targets_are_ignored() {
        let mut graph = root_graph();
        let lib = graph.add_node(new_node(
            Some(LibraryIdentity::new("Lib", Version::new(1, 0, 0), LibraryType::Project)),
            LibraryRange::new("Lib", Some(VersionRange::any()), TypeConstraint::Project),
            1,
            0,
            false,
        ));
        graph.add_edge(0, lib, LibraryDependency::project("Lib"));
        let a = add_package(&mut graph, 0, "A", Version::new(1, 0, 0), "1.0.0");
        graph.add_edge(a, lib, LibraryDependency::package("Lib", range("5.0.0")));

        assert!(GraphAnalyzer::analyze(&graph).is_clean());
    }

    #[test]
    fn test_one_conflict_per_name() {
        let mut graph = root_graph();
        let x = add_package(&mut graph, 0, "X", Version::new(1, 0, 0), "[1.0.0]");
        let a = add_package(&mut graph, 0, "A", Version::new(1, 0, 0), "1.0.0");
        let b = add_package(&mut graph, 0, "B", Version::new(1, 0, 0), "1.0.0");
        graph.add_edge(a, x, LibraryDependency::package("X", range("[2.0.0]")));
        graph.add_edge(b, x, LibraryDependency::package("X", range("[3.0.0]")));

        let result = GraphAnalyzer::analyze(&graph);
        assert_eq!(result.version_conflicts.len(), 1);
        assert!(result.version_conflicts[0].conflicting_path.contains("A 1.0.0"));
    }

    #[test]
    fn test_empty_graph_is_clean() {
        let graph = RestoreTargetGraph::empty(FrameworkRuntimePair::framework_only("net8.0"));
        assert!(GraphAnalyzer::analyze(&graph).is_clean());
    }
}
