//! Lockstep restore orchestration
//!
//! Drives one restore of a project end to end:
//! - No-op detection from a fingerprint of the resolution inputs
//! - Central package version validation
//! - Packages pin file evaluation and locked mode
//! - Graph resolution per framework/runtime pair
//! - Cycle, conflict and downgrade reporting
//! - Lock artifact, pin file and cache file output
//!
//! # Example
//!
//! ```no_run
//! use lockstep_config::ConfigLoader;
//! use lockstep_package::{DependencyProviders, ProjectSpec};
//! use lockstep_restore::{RestoreCommand, RestoreRequest};
//! use std::path::Path;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let path = Path::new("lockstep.toml");
//! let spec = ProjectSpec::from_file(path)?;
//! let settings = ConfigLoader::new().load(path)?;
//! let request = RestoreRequest::new(spec, DependencyProviders::new(), settings);
//! let summary = RestoreCommand::new(request)
//!     .execute(&CancellationToken::new())
//!     .await?;
//! println!("restore succeeded: {}", summary.success);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod central;
pub mod command;
mod commit;
pub mod compat;
pub mod error;
pub mod fingerprint;
pub mod logger;
pub mod request;
pub mod result;

pub use cache::{cache_file_path, expected_package_files, CacheFile, NoOpCache, NoOpEvaluation};
pub use central::validate_central_versions;
pub use command::RestoreCommand;
pub use compat::{CompatibilityCheckResult, CompatibilityChecker};
pub use error::{RestoreError, RestoreResult};
pub use fingerprint::{FingerprintInputs, TOOL_VERSION};
pub use logger::{merge_on_target_graph, RestoreCollectorLogger};
pub use request::RestoreRequest;
pub use result::RestoreSummary;
