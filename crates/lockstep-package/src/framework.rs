//! Target framework / runtime pairs

use serde::{Deserialize, Serialize};
use std::fmt;

/// One resolution target: a framework, optionally specialized to a runtime
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameworkRuntimePair {
    pub framework: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_identifier: Option<String>,
}

impl FrameworkRuntimePair {
    pub fn new(framework: impl Into<String>, runtime_identifier: Option<String>) -> Self {
        Self {
            framework: framework.into(),
            runtime_identifier: runtime_identifier.filter(|rid| !rid.is_empty()),
        }
    }

    pub fn framework_only(framework: impl Into<String>) -> Self {
        Self::new(framework, None)
    }

    /// `net8.0` or `net8.0/linux-x64`
    pub fn target_graph_name(&self) -> String {
        match &self.runtime_identifier {
            Some(rid) => format!("{}/{}", self.framework, rid),
            None => self.framework.clone(),
        }
    }

    /// Parse a target graph name produced by [`Self::target_graph_name`]
    pub fn from_target_graph_name(name: &str) -> Self {
        match name.split_once('/') {
            Some((framework, rid)) => Self::new(framework, Some(rid.to_string())),
            None => Self::framework_only(name),
        }
    }

    pub fn is_framework_only(&self) -> bool {
        self.runtime_identifier.is_none()
    }
}

impl fmt::Display for FrameworkRuntimePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.target_graph_name())
    }
}

/// Expand frameworks and runtime identifiers into resolution targets.
///
/// Every framework gets a framework-only pair first, in declaration order;
/// the framework x runtime pairs follow. Empty and repeated runtime
/// identifiers are ignored.
pub fn create_framework_runtime_pairs<F, R>(frameworks: F, runtime_identifiers: R) -> Vec<FrameworkRuntimePair>
where
    F: IntoIterator,
    F::Item: AsRef<str>,
    R: IntoIterator,
    R::Item: AsRef<str>,
{
    let frameworks: Vec<String> = frameworks
        .into_iter()
        .map(|f| f.as_ref().to_string())
        .collect();

    let mut runtimes: Vec<String> = Vec::new();
    for rid in runtime_identifiers {
        let rid = rid.as_ref().trim();
        if !rid.is_empty() && !runtimes.iter().any(|r| r == rid) {
            runtimes.push(rid.to_string());
        }
    }

    let mut pairs: Vec<FrameworkRuntimePair> = frameworks
        .iter()
        .map(FrameworkRuntimePair::framework_only)
        .collect();

    for framework in &frameworks {
        for rid in &runtimes {
            pairs.push(FrameworkRuntimePair::new(framework.clone(), Some(rid.clone())));
        }
    }

    pairs
}
