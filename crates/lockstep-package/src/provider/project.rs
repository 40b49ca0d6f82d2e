//! Provider for project-to-project references

use super::{LibraryProvider, ProviderError};
use crate::library::{LibraryDependency, LibraryIdentity, LibraryRange, LibraryType};
use crate::project::ProjectSpec;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

/// A project taking part in the restore
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalProjectReference {
    pub name: String,
    pub path: PathBuf,
    pub spec: Arc<ProjectSpec>,
}

impl ExternalProjectReference {
    pub fn new(spec: ProjectSpec) -> Self {
        Self {
            name: spec.name.clone(),
            path: spec.file_path.clone(),
            spec: Arc::new(spec),
        }
    }
}

/// Serves project identities and their declared dependencies
#[derive(Debug, Clone, Default)]
pub struct ProjectReferenceProvider {
    projects: Vec<ExternalProjectReference>,
}

impl ProjectReferenceProvider {
    pub fn new(projects: Vec<ExternalProjectReference>) -> Self {
        Self { projects }
    }

    pub fn projects(&self) -> &[ExternalProjectReference] {
        &self.projects
    }

    pub fn find(&self, name: &str) -> Option<&ExternalProjectReference> {
        self.projects
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

#[async_trait]
impl LibraryProvider for ProjectReferenceProvider {
    fn source(&self) -> &str {
        "projects"
    }

    fn is_http(&self) -> bool {
        false
    }

    async fn find_best_match(
        &self,
        range: &LibraryRange,
        _framework: &str,
    ) -> Result<Option<LibraryIdentity>, ProviderError> {
        if !range.type_constraint.allows_projects() {
            return Ok(None);
        }
        Ok(self.find(&range.name).map(|project| {
            LibraryIdentity::new(
                project.spec.name.clone(),
                project.spec.version.clone(),
                LibraryType::Project,
            )
        }))
    }

    async fn get_dependencies(
        &self,
        identity: &LibraryIdentity,
        framework: &str,
    ) -> Result<Vec<LibraryDependency>, ProviderError> {
        let Some(project) = self.find(&identity.name) else {
            return Ok(Vec::new());
        };
        let spec = &project.spec;
        let info = spec.framework(framework).or_else(|| spec.frameworks.first());
        Ok(info.map(|f| f.all_dependencies()).unwrap_or_default())
    }
}
