//! Compatibility checking hook

use lockstep_package::{IncludeFlags, RestoreLogMessage, RestoreTargetGraph};
use std::collections::BTreeMap;

/// Result of checking one graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompatibilityCheckResult {
    /// Target graph name
    pub graph: String,
    pub success: bool,
    pub issues: Vec<RestoreLogMessage>,
}

impl CompatibilityCheckResult {
    pub fn compatible(graph: &RestoreTargetGraph) -> Self {
        Self {
            graph: graph.name(),
            success: true,
            issues: Vec::new(),
        }
    }
}

/// Checks whether the packages of a resolved graph can be used by its
/// framework and runtime. Runs only when every graph resolved completely.
pub trait CompatibilityChecker: Send + Sync {
    /// `include_flags` holds the flattened include flags of the graph's
    /// libraries, keyed by lowercased name
    fn check(
        &self,
        graph: &RestoreTargetGraph,
        include_flags: &BTreeMap<String, IncludeFlags>,
    ) -> CompatibilityCheckResult;
}
