//! Restore request

use crate::compat::CompatibilityChecker;
use crate::error::RestoreResult;
use crate::fingerprint::{FingerprintInputs, TOOL_VERSION};
use lockstep_config::RestoreSettings;
use lockstep_package::{
    DependencyProviders, ExternalProjectReference, LockArtifact, PackageError, PackageFolder,
    ProjectSpec, RestoreLogMessage,
};
use std::sync::Arc;

/// Everything one restore needs
#[derive(Clone)]
pub struct RestoreRequest {
    pub project: Arc<ProjectSpec>,
    pub providers: DependencyProviders,
    pub settings: RestoreSettings,
    /// Every project taking part in the restore, including this one. Empty
    /// when the project is restored on its own.
    pub external_projects: Vec<ExternalProjectReference>,
    /// Previous lock artifact; read from the output directory when `None`
    pub existing_artifact: Option<LockArtifact>,
    /// Format version of the written lock artifact
    pub lock_file_version: u32,
    pub allow_no_op: bool,
    /// Messages raised by the caller, appended to the artifact's log
    pub additional_messages: Vec<RestoreLogMessage>,
    pub compatibility_checker: Option<Arc<dyn CompatibilityChecker>>,
}

impl RestoreRequest {
    pub fn new(project: ProjectSpec, providers: DependencyProviders, settings: RestoreSettings) -> Self {
        Self {
            project: Arc::new(project),
            providers,
            settings,
            external_projects: Vec::new(),
            existing_artifact: None,
            lock_file_version: LockArtifact::VERSION,
            allow_no_op: true,
            additional_messages: Vec::new(),
            compatibility_checker: None,
        }
    }

    pub fn with_external_projects(mut self, projects: Vec<ExternalProjectReference>) -> Self {
        self.external_projects = projects;
        self
    }

    pub fn with_existing_artifact(mut self, artifact: LockArtifact) -> Self {
        self.existing_artifact = Some(artifact);
        self
    }

    pub fn with_lock_file_version(mut self, version: u32) -> Self {
        self.lock_file_version = version;
        self
    }

    pub fn with_allow_no_op(mut self, allow_no_op: bool) -> Self {
        self.allow_no_op = allow_no_op;
        self
    }

    pub fn with_additional_messages(mut self, messages: Vec<RestoreLogMessage>) -> Self {
        self.additional_messages = messages;
        self
    }

    pub fn with_compatibility_checker(mut self, checker: Arc<dyn CompatibilityChecker>) -> Self {
        self.compatibility_checker = Some(checker);
        self
    }

    /// The global packages folder followed by the fallback folders
    pub fn package_folders(&self) -> Vec<PackageFolder> {
        std::iter::once(&self.settings.global_packages_folder)
            .chain(self.settings.fallback_folders.iter())
            .map(PackageFolder::new)
            .collect()
    }

    /// Locked mode from the settings when set there, else from the project
    pub fn locked_mode(&self) -> bool {
        self.settings
            .locked_mode
            .unwrap_or(self.project.restore.locked_mode)
    }

    pub fn force_evaluate(&self) -> bool {
        self.settings.force_evaluate
    }

    /// Hash of the resolution inputs for the no-op check
    pub fn fingerprint(&self) -> RestoreResult<String> {
        let mut external: Vec<&ProjectSpec> = self
            .external_projects
            .iter()
            .filter(|p| !p.name.eq_ignore_ascii_case(&self.project.name))
            .map(|p| p.spec.as_ref())
            .collect();
        external.sort_by(|a, b| a.name.to_ascii_lowercase().cmp(&b.name.to_ascii_lowercase()));

        let inputs = FingerprintInputs {
            tool_version: TOOL_VERSION,
            project: &self.project,
            external_projects: external,
            sources: self.settings.sources.iter().map(|s| s.url.as_str()).collect(),
            providers: self.providers.iter().map(|p| p.source()).collect(),
            global_packages_folder: &self.settings.global_packages_folder,
            fallback_folders: &self.settings.fallback_folders,
            restore_with_lock_file: self.project.restore.restore_with_lock_file,
            locked_mode: self.locked_mode(),
            lock_file_version: self.lock_file_version,
        };
        Ok(inputs.compute().map_err(PackageError::from)?)
    }
}

impl std::fmt::Debug for RestoreRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestoreRequest")
            .field("project", &self.project.name)
            .field("providers", &self.providers)
            .field("settings", &self.settings)
            .field("external_projects", &self.external_projects.len())
            .field("lock_file_version", &self.lock_file_version)
            .field("allow_no_op", &self.allow_no_op)
            .finish_non_exhaustive()
    }
}
