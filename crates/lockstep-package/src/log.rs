//! Structured restore diagnostics
//!
//! These are the messages recorded in the lock artifact's `logs` array and
//! the no-op cache file. Collecting and forwarding them is the restore
//! crate's job; this module only defines their shape.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LogLevel {
    Debug,
    Verbose,
    Information,
    Minimal,
    Warning,
    Error,
}

/// Diagnostic codes emitted by restore
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogCode {
    /// Generic, uncoded message
    Undefined,
    /// Project declares no target frameworks
    NoFrameworks,
    /// Locked mode with an out of date pin file
    LockedModeOutOfDate,
    /// Pin file on disk although the project opted out of it
    LockFileDisabledButPresent,
    /// Explicit version under central package management
    ExplicitVersionWithCentralManagement,
    /// Auto-referenced package also listed centrally
    AutoReferencedCentrallyDefined,
    /// Dependency has no version at all
    MissingCentralVersion,
    /// Floating central version while floating is disabled
    FloatingCentralVersion,
    /// Version override while overrides are disabled
    VersionOverrideDisabled,
    /// Package could not be found
    UnresolvedPackage,
    /// Version conflict
    VersionConflict,
    /// Dependency cycle
    DependencyCycle,
    /// Downgrade of a centrally pinned transitive package
    CentralTransitiveDowngrade,
    /// Source failed
    SourceFailure,
    /// Installed content does not match the pinned hash
    ContentHashMismatch,
    /// Several sources under central management
    MultipleSourcesWithCentralManagement,
    /// Package downgrade
    PackageDowngrade,
    /// Plain http source
    InsecureSource,
}

impl LogCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogCode::Undefined => "Undefined",
            LogCode::NoFrameworks => "NU1001",
            LogCode::LockedModeOutOfDate => "NU1004",
            LogCode::LockFileDisabledButPresent => "NU1005",
            LogCode::ExplicitVersionWithCentralManagement => "NU1008",
            LogCode::AutoReferencedCentrallyDefined => "NU1009",
            LogCode::MissingCentralVersion => "NU1010",
            LogCode::FloatingCentralVersion => "NU1011",
            LogCode::VersionOverrideDisabled => "NU1013",
            LogCode::UnresolvedPackage => "NU1101",
            LogCode::VersionConflict => "NU1107",
            LogCode::DependencyCycle => "NU1108",
            LogCode::CentralTransitiveDowngrade => "NU1109",
            LogCode::SourceFailure => "NU1301",
            LogCode::ContentHashMismatch => "NU1403",
            LogCode::MultipleSourcesWithCentralManagement => "NU1507",
            LogCode::PackageDowngrade => "NU1605",
            LogCode::InsecureSource => "NU1803",
        }
    }

    const ALL: [LogCode; 18] = [
        LogCode::Undefined,
        LogCode::NoFrameworks,
        LogCode::LockedModeOutOfDate,
        LogCode::LockFileDisabledButPresent,
        LogCode::ExplicitVersionWithCentralManagement,
        LogCode::AutoReferencedCentrallyDefined,
        LogCode::MissingCentralVersion,
        LogCode::FloatingCentralVersion,
        LogCode::VersionOverrideDisabled,
        LogCode::UnresolvedPackage,
        LogCode::VersionConflict,
        LogCode::DependencyCycle,
        LogCode::CentralTransitiveDowngrade,
        LogCode::SourceFailure,
        LogCode::ContentHashMismatch,
        LogCode::MultipleSourcesWithCentralManagement,
        LogCode::PackageDowngrade,
        LogCode::InsecureSource,
    ];
}

impl fmt::Display for LogCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        LogCode::ALL
            .iter()
            .copied()
            .find(|code| code.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown log code '{}'", s))
    }
}

impl Serialize for LogCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LogCode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One diagnostic, optionally scoped to a library and to target graphs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreLogMessage {
    pub level: LogLevel,
    pub code: LogCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_graphs: Vec<String>,
}

impl RestoreLogMessage {
    pub fn new(level: LogLevel, code: LogCode, message: impl Into<String>) -> Self {
        Self {
            level,
            code,
            message: message.into(),
            library_id: None,
            target_graphs: Vec::new(),
        }
    }

    pub fn error(code: LogCode, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, code, message)
    }

    pub fn warning(code: LogCode, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warning, code, message)
    }

    pub fn with_library(mut self, library_id: impl Into<String>) -> Self {
        self.library_id = Some(library_id.into());
        self
    }

    pub fn with_target_graph(mut self, target_graph: impl Into<String>) -> Self {
        self.target_graphs.push(target_graph.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == LogLevel::Error
    }
}

impl fmt::Display for RestoreLogMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            LogCode::Undefined => f.write_str(&self.message),
            code => write!(f, "{}: {}", code, self.message),
        }
    }
}
