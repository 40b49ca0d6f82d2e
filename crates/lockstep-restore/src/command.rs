//! Restore orchestration
//!
//! Order of work:
//! 1. No-op check against the cache file
//! 2. Central version validation and source checks
//! 3. Pin file evaluation (locked mode)
//! 4. Graph resolution, or one empty graph per pair after an input error
//! 5. Cycle, conflict and downgrade validation
//! 6. Compatibility checks
//! 7. Lock artifact, pin file and cache file, written at the very end

use crate::cache::{cache_file_path, expected_package_files, CacheFile, NoOpCache};
use crate::central::validate_central_versions;
use crate::compat::CompatibilityCheckResult;
use crate::error::{RestoreError, RestoreResult};
use crate::logger::{merge_on_target_graph, RestoreCollectorLogger};
use crate::request::RestoreRequest;
use crate::result::RestoreSummary;
use lockstep_config::PackageSource;
use lockstep_package::{
    lock_file_path, GraphHandle, GraphResolver, IncludeFlagsMap, LockArtifact, LockArtifactBuilder,
    LogCode, LogLevel, PackagesLockFile, ProjectReferenceProvider, ProjectSpec,
    RestoreLogMessage, RestoreTargetGraph, ASSETS_FILE_NAME,
};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const LOCKED_MODE_MESSAGE: &str = "The packages lock file is inconsistent with the project dependencies so restore can't be run in locked mode. Disable locked mode or run restore with force evaluate to update the lock file.";

/// Pin file state going into resolution
#[derive(Debug, Default)]
struct LockFileEvaluation {
    /// Lock file inputs are consistent; `false` fails the restore
    success: bool,
    /// The pin file on disk matches the project and pins resolution
    is_valid: bool,
    /// Write a fresh pin file from this restore's result
    regenerate: bool,
    lock_file: Option<PackagesLockFile>,
}

pub struct RestoreCommand {
    request: RestoreRequest,
}

impl RestoreCommand {
    pub fn new(request: RestoreRequest) -> Self {
        Self { request }
    }

    /// Run the restore and write its outputs.
    ///
    /// Expected failures (missing packages, conflicts, cycles, out of date
    /// pin files) give `Ok` with `success == false`. Cancellation returns
    /// `Err` before anything is written.
    pub async fn execute(self, token: &CancellationToken) -> RestoreResult<RestoreSummary> {
        let summary = self.evaluate(token).await?;
        if token.is_cancelled() {
            return Err(RestoreError::Cancelled);
        }
        summary.commit()?;
        Ok(summary)
    }

    /// Run the restore without writing anything
    pub async fn evaluate(self, token: &CancellationToken) -> RestoreResult<RestoreSummary> {
        let start = Instant::now();
        let mut request = self.request;

        if request.lock_file_version == 0 || request.lock_file_version > LockArtifact::VERSION {
            return Err(RestoreError::UnsupportedLockFileVersion {
                found: request.lock_file_version,
                supported: LockArtifact::VERSION,
            });
        }
        if token.is_cancelled() {
            return Err(RestoreError::Cancelled);
        }

        let project_provider = bind_external_projects(&mut request)?;
        let project = Arc::clone(&request.project);
        let logger = RestoreCollectorLogger::new(project.restore.warnings.clone());

        let output = project.output_directory();
        let assets_path = output.join(ASSETS_FILE_NAME);
        let cache_path = (!request.settings.no_cache).then(|| cache_file_path(&project));
        let lock_path = lock_file_path(&project);

        info!(project = %project.name, path = %project.file_path.display(), "Restoring");

        // 1. no-op
        let fingerprint = request.fingerprint()?;
        let mut cache = CacheFile::new(fingerprint.as_str());
        if let Some(cache_path) = cache_path.as_deref() {
            let force = request.force_evaluate()
                || !request.allow_no_op
                || !request.additional_messages.is_empty();
            let evaluation = NoOpCache::new(cache_path, &project.file_path, &assets_path)
                .evaluate(&fingerprint, force);
            if evaluation.can_skip {
                match LockArtifact::from_file(&assets_path) {
                    Ok(artifact) => {
                        logger.replay(&evaluation.cache.logs);
                        info!(project = %project.name, "No-op restore, outputs are current");
                        return Ok(RestoreSummary {
                            success: evaluation.cache.success,
                            no_op: true,
                            graphs: Vec::new(),
                            compatibility_results: Vec::new(),
                            artifact,
                            lock_file: None,
                            cache: evaluation.cache,
                            assets_path,
                            cache_path: Some(cache_path.to_path_buf()),
                            lock_file_path: lock_path,
                            log_messages: logger.messages(),
                            elapsed: start.elapsed(),
                        });
                    }
                    Err(e) => debug!(error = %e, "Lock artifact unreadable, restoring"),
                }
            }
            cache = evaluation.cache;
        }

        // 2. input validation
        let mut success = validate_central_versions(&project, &request.providers.http_sources(), &logger);
        warn_insecure_sources(&request.settings.sources, &logger);

        // 3. pin file
        let lock_evaluation = evaluate_lock_file(&request, &lock_path, &logger)?;
        success &= lock_evaluation.success;

        // 4. resolution
        let pairs = project.framework_runtime_pairs();
        let graphs = if success {
            if project.frameworks.is_empty() {
                logger.log(RestoreLogMessage::error(
                    LogCode::NoFrameworks,
                    format!(
                        "The project {} does not specify any target frameworks in {}.",
                        project.name,
                        project.file_path.display()
                    ),
                ));
                success = false;
                Vec::new()
            } else {
                let mut resolver = GraphResolver::new(request.providers.clone());
                if let Some(provider) = project_provider {
                    resolver = resolver.with_project_provider(provider);
                }
                if let Some(lock_file) = lock_evaluation.lock_file.as_ref().filter(|_| lock_evaluation.is_valid) {
                    resolver = resolver.with_pinned_versions(lock_file.pinned_libraries());
                }
                let resolved = resolver.resolve(Arc::clone(&project), &pairs, token).await?;
                for (pair, error) in &resolved.failures {
                    logger.log(
                        RestoreLogMessage::error(LogCode::SourceFailure, error.to_string())
                            .with_target_graph(pair.target_graph_name()),
                    );
                    success = false;
                }
                success &= log_unresolved(&resolved.graphs, &request, &logger);
                resolved.graphs
            }
        } else {
            debug!("Input errors, emitting empty graphs");
            pairs.into_iter().map(RestoreTargetGraph::empty).collect()
        };

        if token.is_cancelled() {
            return Err(RestoreError::Cancelled);
        }

        // 5. graph validation
        success &= validate_graphs(&graphs, &project, &logger);

        // 6. compatibility
        let include_flags = IncludeFlagsMap::from_graphs(&graphs);
        let compatibility_results = check_compatibility(&request, &graphs, &include_flags, &logger);
        success &= compatibility_results.iter().all(|r| r.success);

        // 7. outputs
        let folders = request.package_folders();
        let existing = match request.existing_artifact.take() {
            Some(artifact) => Some(artifact),
            None => read_existing_artifact(&assets_path),
        };
        let mut artifact = LockArtifactBuilder::new(LockArtifact::VERSION)
            .with_package_folders(&folders)
            .with_include_flags(&include_flags)
            .build(existing.as_ref(), &project, &graphs);
        if let Err(reason) = artifact.verify() {
            warn!(%reason, "Lock artifact is not referentially complete");
        }

        let mut lock_file = None;
        if lock_evaluation.is_valid {
            if let Some(existing) = &lock_evaluation.lock_file {
                success &= validate_content_hashes(existing, &artifact, &logger);
            }
        } else if lock_file_enabled(&project, &lock_path) {
            if lock_evaluation.regenerate {
                lock_file = Some(PackagesLockFile::from_artifact(&artifact, &project));
            } else {
                debug!(path = %lock_path.display(), "Skipping pin file generation");
            }
        }

        if request.lock_file_version < LockArtifact::VERSION {
            artifact.downgrade_to(request.lock_file_version);
        }

        let mut logs = logger.errors_and_warnings();
        logs.extend(request.additional_messages.iter().cloned());
        success &= !logs.iter().any(RestoreLogMessage::is_error);
        artifact.logs = logs;

        if !success {
            lock_file = None;
        }

        cache.success = success;
        cache.project_file_path = project.file_path.clone();
        cache.logs = artifact.logs.clone();
        cache.expected_package_file_paths = expected_package_files(&artifact, &folders);

        let elapsed = start.elapsed();
        info!(
            project = %project.name,
            success,
            graphs = graphs.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Restore finished"
        );

        Ok(RestoreSummary {
            success,
            no_op: false,
            graphs,
            compatibility_results,
            artifact,
            lock_file,
            cache,
            assets_path,
            cache_path,
            lock_file_path: lock_path,
            log_messages: logger.messages(),
            elapsed,
        })
    }
}

/// Swap this project's entry in the external project list for the
/// in-memory spec and build the provider serving project references.
fn bind_external_projects(
    request: &mut RestoreRequest,
) -> RestoreResult<Option<Arc<ProjectReferenceProvider>>> {
    if request.external_projects.is_empty() {
        return Ok(None);
    }

    let name = request.project.name.clone();
    let matches: Vec<usize> = request
        .external_projects
        .iter()
        .enumerate()
        .filter(|(_, p)| p.name.eq_ignore_ascii_case(&name))
        .map(|(index, _)| index)
        .collect();

    match matches.as_slice() {
        [] => Err(RestoreError::MissingExternalReference(name)),
        [index] => {
            let entry = &mut request.external_projects[*index];
            entry.spec = Arc::clone(&request.project);
            entry.path = request.project.file_path.clone();
            Ok(Some(Arc::new(ProjectReferenceProvider::new(
                request.external_projects.clone(),
            ))))
        }
        _ => Err(RestoreError::AmbiguousProjectName(name)),
    }
}

fn warn_insecure_sources(sources: &[PackageSource], logger: &RestoreCollectorLogger) {
    for source in sources.iter().filter(|s| s.is_insecure()) {
        logger.log(RestoreLogMessage::warning(
            LogCode::InsecureSource,
            format!(
                "You are running the 'restore' operation with an 'HTTP' source, '{}'. Consider migrating to an 'HTTPS' source.",
                source.url
            ),
        ));
    }
}

/// A pin file is used when the project asks for one, or when one exists
/// and the project did not opt out
fn lock_file_enabled(project: &ProjectSpec, lock_path: &Path) -> bool {
    match project.restore.restore_with_lock_file {
        Some(enabled) => enabled,
        None => lock_path.exists(),
    }
}

fn evaluate_lock_file(
    request: &RestoreRequest,
    lock_path: &Path,
    logger: &RestoreCollectorLogger,
) -> RestoreResult<LockFileEvaluation> {
    let project = &request.project;

    if project.restore.restore_with_lock_file == Some(false) && lock_path.exists() {
        logger.log(RestoreLogMessage::error(
            LogCode::LockFileDisabledButPresent,
            format!(
                "Invalid restore input. The project opts out of the packages lock file but one exists at {}.",
                lock_path.display()
            ),
        ));
        return Ok(LockFileEvaluation::default());
    }

    let mut evaluation = LockFileEvaluation {
        success: true,
        regenerate: true,
        ..Default::default()
    };
    if request.force_evaluate() {
        return Ok(evaluation);
    }
    let Some(lock_file) = PackagesLockFile::read(lock_path)? else {
        return Ok(evaluation);
    };

    let validation = lock_file.validate(project);
    if validation.is_valid {
        debug!(path = %lock_path.display(), "Pin file is current");
        evaluation.is_valid = true;
    } else if request.locked_mode() {
        let mut message = validation.invalid_reasons.join("\n");
        if !message.is_empty() {
            message.push('\n');
        }
        message.push_str(LOCKED_MODE_MESSAGE);
        logger.log(RestoreLogMessage::error(LogCode::LockedModeOutOfDate, message));
        evaluation.success = false;
        evaluation.regenerate = false;
    } else {
        for reason in &validation.invalid_reasons {
            debug!(%reason, "Pin file is out of date");
        }
    }
    evaluation.lock_file = Some(lock_file);
    Ok(evaluation)
}

/// Log every unresolved request, one message per library across graphs.
/// Returns `false` when anything is unresolved.
fn log_unresolved(
    graphs: &[RestoreTargetGraph],
    request: &RestoreRequest,
    logger: &RestoreCollectorLogger,
) -> bool {
    let sources: Vec<String> = request.providers.iter().map(|p| p.source().to_string()).collect();
    let sources = sources_list(&sources);
    let sources = sources.as_str();
    let messages: Vec<RestoreLogMessage> = graphs
        .iter()
        .flat_map(|graph| {
            graph.unresolved().iter().map(move |range| {
                RestoreLogMessage::error(
                    LogCode::UnresolvedPackage,
                    format!(
                        "Unable to find package {}. No matching version exists in source(s): {}",
                        range, sources
                    ),
                )
                .with_library(range.name.clone())
                .with_target_graph(graph.name())
            })
        })
        .collect();
    let ok = messages.is_empty();
    logger.log_all(merge_on_target_graph(messages));
    ok
}

fn sources_list(sources: &[String]) -> String {
    if sources.is_empty() {
        "(none)".to_string()
    } else {
        sources.join(", ")
    }
}

/// Cycles first, then conflicts, then downgrades. The first cycle or
/// conflict fails the restore; downgrades fail it only when centrally
/// pinned.
fn validate_graphs(
    graphs: &[RestoreTargetGraph],
    project: &ProjectSpec,
    logger: &RestoreCollectorLogger,
) -> bool {
    for graph in graphs {
        if let Some(cycle) = graph.analyze_result.cycles.first() {
            let library = cycle
                .nodes
                .first()
                .map(|&id| graph.node(id).name().to_string());
            let mut message = RestoreLogMessage::error(
                LogCode::DependencyCycle,
                format!("Cycle detected. \n  {}.", cycle.path),
            )
            .with_target_graph(graph.name());
            message.library_id = library;
            logger.log(message);
            return false;
        }
    }

    for graph in graphs {
        if let Some(conflict) = graph.analyze_result.version_conflicts.first() {
            let selected = graph.node(conflict.selected);
            logger.log(
                RestoreLogMessage::error(
                    LogCode::VersionConflict,
                    format!(
                        "Version conflict detected for {}. Install/reference {} directly to project {} to resolve this issue. \n {} \n {}.",
                        conflict.library,
                        selected.display(),
                        project.name,
                        conflict.selected_path,
                        conflict.conflicting_path
                    ),
                )
                .with_library(conflict.library.clone())
                .with_target_graph(graph.name()),
            );
            return false;
        }
    }

    let mut messages = Vec::new();
    for graph in graphs {
        for downgrade in &graph.analyze_result.downgrades {
            let is_package = graph
                .governing(&downgrade.library)
                .map_or(true, |node| node.is_package());
            if !is_package {
                continue;
            }
            let (level, code, text) = if downgrade.is_central_transitive {
                (
                    LogLevel::Error,
                    LogCode::CentralTransitiveDowngrade,
                    format!(
                        "Detected package downgrade: {} from {} to centrally defined {}. Update the centrally managed package version to a higher version.",
                        downgrade.library, downgrade.requested_version, downgrade.resolved_version
                    ),
                )
            } else {
                (
                    LogLevel::Warning,
                    LogCode::PackageDowngrade,
                    format!(
                        "Detected package downgrade: {} from {} to {}. Reference the package directly from the project to select a different version.",
                        downgrade.library, downgrade.requested_version, downgrade.resolved_version
                    ),
                )
            };
            messages.push(
                RestoreLogMessage::new(
                    level,
                    code,
                    format!(
                        "{} \n {} \n {}",
                        text, downgrade.downgraded_path, downgrade.downgraded_by_path
                    ),
                )
                .with_library(downgrade.library.clone())
                .with_target_graph(graph.name()),
            );
        }
    }
    let ok = !messages.iter().any(RestoreLogMessage::is_error);
    logger.log_all(merge_on_target_graph(messages));
    ok
}

fn check_compatibility(
    request: &RestoreRequest,
    graphs: &[RestoreTargetGraph],
    include_flags: &IncludeFlagsMap,
    logger: &RestoreCollectorLogger,
) -> Vec<CompatibilityCheckResult> {
    let Some(checker) = &request.compatibility_checker else {
        return Vec::new();
    };
    if graphs.iter().any(RestoreTargetGraph::has_unresolved) {
        debug!("Unresolved packages, skipping compatibility checks");
        return Vec::new();
    }

    let empty = BTreeMap::new();
    graphs
        .iter()
        .enumerate()
        .map(|(index, graph)| {
            let flags = include_flags.graph(GraphHandle(index)).unwrap_or(&empty);
            let result = checker.check(graph, flags);
            logger.log_all(result.issues.iter().cloned());
            result
        })
        .collect()
}

/// Every package of the artifact must match its pin. Mismatches are
/// reported together.
fn validate_content_hashes(
    lock_file: &PackagesLockFile,
    artifact: &LockArtifact,
    logger: &RestoreCollectorLogger,
) -> bool {
    let mismatches = lock_file.validate_content_hashes(artifact);
    if mismatches.is_empty() {
        return true;
    }

    let mut message = String::new();
    for mismatch in &mismatches {
        debug!(
            package = %mismatch.id,
            version = %mismatch.version,
            expected = mismatch.expected.as_deref().unwrap_or(""),
            actual = mismatch.actual.as_deref().unwrap_or(""),
            "Content hash mismatch"
        );
        message.push_str(&format!(
            "Package content hash validation failed for {}.{}. The package is different than the last restore.\n",
            mismatch.id, mismatch.version
        ));
    }
    logger.log(RestoreLogMessage::error(LogCode::ContentHashMismatch, message));
    false
}

fn read_existing_artifact(path: &Path) -> Option<LockArtifact> {
    if !path.exists() {
        return None;
    }
    match LockArtifact::from_file(path) {
        Ok(artifact) => Some(artifact),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Ignoring unreadable lock artifact");
            None
        }
    }
}
