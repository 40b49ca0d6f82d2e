//! Dependency path queries over a lock artifact
//!
//! Answers "why is this package here": every chain of libraries from the
//! project's own references down to the package, per target.

use crate::assets::{LockArtifact, LockTarget};
use semver::Version;
use std::collections::BTreeMap;
use std::fmt::Write;

/// One step on a dependency path
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PathStep {
    pub name: String,
    pub version: Version,
}

/// Paths to the queried package within one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDependencyPaths {
    pub target: String,
    pub paths: Vec<Vec<PathStep>>,
}

/// Every path from the project to `package_id`, per target.
///
/// `frameworks` restricts the targets searched; empty means all. Targets
/// without a path are left out.
pub fn find_dependency_paths(
    artifact: &LockArtifact,
    package_id: &str,
    frameworks: &[String],
) -> Vec<TargetDependencyPaths> {
    artifact
        .targets
        .iter()
        .filter(|t| {
            frameworks.is_empty()
                || frameworks
                    .iter()
                    .any(|f| f.eq_ignore_ascii_case(&t.framework))
        })
        .filter_map(|target| {
            let mut paths = Vec::new();
            for root in top_level(artifact, target) {
                let mut stack = Vec::new();
                walk(target, &root, package_id, &mut stack, &mut paths);
            }
            paths.sort();
            paths.dedup();
            (!paths.is_empty()).then(|| TargetDependencyPaths {
                target: target.pair().target_graph_name(),
                paths,
            })
        })
        .collect()
}

/// Names the project references directly in this target. Without an
/// embedded project, libraries nothing else depends on.
fn top_level(artifact: &LockArtifact, target: &LockTarget) -> Vec<String> {
    let declared = artifact
        .project
        .as_ref()
        .and_then(|spec| spec.framework(&target.framework));

    match declared {
        Some(framework) => framework
            .all_dependencies()
            .iter()
            .map(|d| d.name().to_string())
            .collect(),
        None => target
            .libraries
            .iter()
            .filter(|candidate| {
                !target.libraries.iter().any(|l| {
                    l.dependencies
                        .keys()
                        .any(|d| d.eq_ignore_ascii_case(&candidate.name))
                })
            })
            .map(|l| l.name.clone())
            .collect(),
    }
}

fn walk(
    target: &LockTarget,
    name: &str,
    package_id: &str,
    stack: &mut Vec<PathStep>,
    paths: &mut Vec<Vec<PathStep>>,
) {
    let Some(library) = target.library(name) else {
        return;
    };
    if stack.iter().any(|s| s.name.eq_ignore_ascii_case(&library.name)) {
        return;
    }

    stack.push(PathStep {
        name: library.name.clone(),
        version: library.version.clone(),
    });
    if library.name.eq_ignore_ascii_case(package_id) {
        paths.push(stack.clone());
    } else {
        for dependency in library.dependencies.keys() {
            walk(target, dependency, package_id, stack, paths);
        }
    }
    stack.pop();
}

#[derive(Default)]
struct Tree(BTreeMap<PathStep, Tree>);

impl Tree {
    fn insert(&mut self, path: &[PathStep]) {
        if let Some((first, rest)) = path.split_first() {
            self.0.entry(first.clone()).or_default().insert(rest);
        }
    }

    fn render(&self, indent: &str, out: &mut String) {
        let count = self.0.len();
        for (i, (step, child)) in self.0.iter().enumerate() {
            let last = i + 1 == count;
            let _ = writeln!(
                out,
                "{}{} {} (v{})",
                indent,
                if last { "└─" } else { "├─" },
                step.name,
                step.version
            );
            let nested = format!("{}{}", indent, if last { "   " } else { "│  " });
            child.render(&nested, out);
        }
    }
}

/// Text report for a dependency path query
pub fn render_dependency_paths(project: &str, package_id: &str, results: &[TargetDependencyPaths]) -> String {
    if results.is_empty() {
        return format!("Project '{}' does not have a dependency on '{}'.\n", project, package_id);
    }

    let mut out = format!(
        "Project '{}' has the following dependency graph(s) for '{}':\n",
        project, package_id
    );
    for result in results {
        let mut tree = Tree::default();
        for path in &result.paths {
            tree.insert(path);
        }
        let _ = writeln!(out, "\n  [{}]", result.target);
        tree.render("   ", &mut out);
    }
    out
}
