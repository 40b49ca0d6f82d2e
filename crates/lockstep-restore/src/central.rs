//! Central package version checks, run before resolution

use crate::logger::RestoreCollectorLogger;
use lockstep_package::{LibraryDependency, LogCode, ProjectSpec, RestoreLogMessage};

/// Check the project against the rules of central package version
/// management. Returns `false` after logging the first failing rule; a
/// project without central management always passes.
pub fn validate_central_versions(
    spec: &ProjectSpec,
    http_sources: &[String],
    logger: &RestoreCollectorLogger,
) -> bool {
    if !spec.central_package_versions_enabled() {
        return true;
    }
    let restore = &spec.restore;

    if restore.version_override_disabled {
        let overrides = dependencies(spec, |d| !d.auto_referenced && d.version_override.is_some());
        for name in &overrides {
            logger.log(RestoreLogMessage::error(
                LogCode::VersionOverrideDisabled,
                format!(
                    "The package reference '{}' specifies a version override but version overrides are disabled.",
                    name
                ),
            ));
        }
        if !overrides.is_empty() {
            return false;
        }
    }

    if http_sources.len() > 1 {
        logger.log(RestoreLogMessage::warning(
            LogCode::MultipleSourcesWithCentralManagement,
            format!(
                "There are {} package sources defined in your configuration. When using central package management, specify a single package source. The following sources are defined: {}",
                http_sources.len(),
                http_sources.join(", ")
            ),
        ));
    }

    let explicit = dependencies(spec, |d| {
        !d.version_centrally_managed
            && !d.auto_referenced
            && d.version_override.is_none()
            && d.version_range().is_some()
    });
    if !explicit.is_empty() {
        logger.log(RestoreLogMessage::error(
            LogCode::ExplicitVersionWithCentralManagement,
            format!(
                "Projects that use central package version management should not define the version on the dependency but in the central versions table: {}.",
                explicit.join(";")
            ),
        ));
        return false;
    }

    let auto_referenced: Vec<String> = unique(spec.frameworks.iter().flat_map(|tfm| {
        tfm.dependencies
            .iter()
            .filter(|d| d.auto_referenced && tfm.central_version(d.name()).is_some())
            .map(|d| d.name().to_string())
    }));
    if !auto_referenced.is_empty() {
        logger.log(RestoreLogMessage::error(
            LogCode::AutoReferencedCentrallyDefined,
            format!(
                "The packages {} are implicitly referenced. You do not typically need to reference them from your project or in your central versions table.",
                auto_referenced.join(";")
            ),
        ));
        return false;
    }

    let missing = dependencies(spec, |d| d.version_range().is_none());
    if !missing.is_empty() {
        logger.log(RestoreLogMessage::error(
            LogCode::MissingCentralVersion,
            format!(
                "The dependencies {} do not have a corresponding central version.",
                missing.join(";")
            ),
        ));
        return false;
    }

    if !restore.floating_central_versions_enabled {
        let floating = spec
            .frameworks
            .iter()
            .flat_map(|tfm| tfm.central_package_versions.values())
            .any(|cpv| cpv.version_range.is_floating());
        if floating {
            logger.log(RestoreLogMessage::error(
                LogCode::FloatingCentralVersion,
                "Centrally defined floating package versions are not allowed.",
            ));
            return false;
        }
    }

    true
}

/// Names of the matching direct dependencies across all frameworks, each
/// listed once
fn dependencies(spec: &ProjectSpec, predicate: impl Fn(&LibraryDependency) -> bool) -> Vec<String> {
    unique(
        spec.frameworks
            .iter()
            .flat_map(|tfm| tfm.dependencies.iter())
            .filter(|d| predicate(d))
            .map(|d| d.name().to_string()),
    )
}

fn unique(names: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for name in names {
        if !seen.iter().any(|s| s.eq_ignore_ascii_case(&name)) {
            seen.push(name);
        }
    }
    seen
}
