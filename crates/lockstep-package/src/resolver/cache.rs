//! Read-through cache of provider answers shared by all pairs

use crate::library::{LibraryDependency, LibraryIdentity, LibraryRange, TypeConstraint};
use crate::provider::LibraryProvider;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(super) struct MatchKey {
    name: String,
    range: Option<String>,
    constraint: TypeConstraint,
    framework: String,
}

impl MatchKey {
    pub(super) fn new(range: &LibraryRange, framework: &str) -> Self {
        Self {
            name: range.key(),
            range: range.version_range.as_ref().map(ToString::to_string),
            constraint: range.type_constraint,
            framework: framework.to_ascii_lowercase(),
        }
    }
}

/// An identity and the provider that produced it
#[derive(Clone)]
pub(super) struct ResolvedMatch {
    pub identity: LibraryIdentity,
    pub provider: Arc<dyn LibraryProvider>,
}

type DependencyKey = (LibraryIdentity, String);

/// Lock poisoning only disables caching; lookups still go to providers.
#[derive(Default)]
pub(super) struct ProviderCache {
    matches: RwLock<HashMap<MatchKey, Option<ResolvedMatch>>>,
    dependencies: RwLock<HashMap<DependencyKey, Vec<LibraryDependency>>>,
}

impl ProviderCache {
    pub(super) fn get_match(&self, key: &MatchKey) -> Option<Option<ResolvedMatch>> {
        self.matches.read().ok()?.get(key).cloned()
    }

    pub(super) fn insert_match(&self, key: MatchKey, value: Option<ResolvedMatch>) {
        if let Ok(mut matches) = self.matches.write() {
            matches.entry(key).or_insert(value);
        }
    }

    pub(super) fn get_dependencies(
        &self,
        identity: &LibraryIdentity,
        framework: &str,
    ) -> Option<Vec<LibraryDependency>> {
        let key = (identity.clone(), framework.to_ascii_lowercase());
        self.dependencies.read().ok()?.get(&key).cloned()
    }

    pub(super) fn insert_dependencies(
        &self,
        identity: &LibraryIdentity,
        framework: &str,
        dependencies: Vec<LibraryDependency>,
    ) {
        if let Ok(mut cached) = self.dependencies.write() {
            cached
                .entry((identity.clone(), framework.to_ascii_lowercase()))
                .or_insert(dependencies);
        }
    }
}
