use lockstep_config::{PackageSource, RestoreSettings};
use lockstep_package::*;
use lockstep_restore::*;
use semver::Version;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

struct Workspace {
    _temp: TempDir,
    root: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let root = temp.path().to_path_buf();
        Self { _temp: temp, root }
    }

    /// Write `<root>/<name>/lockstep.toml` and load it
    fn project(&self, name: &str, toml: &str) -> ProjectSpec {
        let dir = self.root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("lockstep.toml");
        std::fs::write(&path, toml).unwrap();
        ProjectSpec::from_file(&path).unwrap()
    }

    fn settings(&self) -> RestoreSettings {
        RestoreSettings {
            sources: vec![],
            global_packages_folder: self.packages().root().to_path_buf(),
            fallback_folders: vec![],
            force_evaluate: false,
            locked_mode: None,
            no_cache: false,
        }
    }

    fn packages(&self) -> PackageFolder {
        PackageFolder::new(self.root.join("packages"))
    }

    fn stage(&self, id: &str, version: Version) -> LocalPackageInfo {
        self.packages()
            .stage_package(id, &version, &[("lib/net8.0/lib.dll", b"binary".as_slice())])
            .unwrap()
    }
}

fn v(major: u64, minor: u64, patch: u64) -> Version {
    Version::new(major, minor, patch)
}

fn range(s: &str) -> VersionRange {
    s.parse().unwrap()
}

fn providers(feed: &Arc<MemoryProvider>) -> DependencyProviders {
    DependencyProviders::new().with_local(feed.clone())
}

fn codes(summary: &RestoreSummary) -> Vec<&'static str> {
    summary.log_messages.iter().map(|m| m.code.as_str()).collect()
}

fn find(summary: &RestoreSummary, code: LogCode) -> &RestoreLogMessage {
    summary
        .log_messages
        .iter()
        .find(|m| m.code == code)
        .unwrap_or_else(|| panic!("no {} message in {:?}", code, summary.log_messages))
}

async fn execute(request: RestoreRequest) -> RestoreSummary {
    RestoreCommand::new(request)
        .execute(&CancellationToken::new())
        .await
        .unwrap()
}

const SIMPLE: &str = r#"
[project]
name = "P"
version = "1.0.0"

[[frameworks]]
name = "net8.0"
dependencies = { "A" = "1.0.0" }
"#;

mod success {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_restore_writes_artifact_and_cache() {
        let ws = Workspace::new();
        let spec = ws.project("P", SIMPLE);
        let info = ws.stage("A", v(1, 0, 0));
        let feed = Arc::new(MemoryProvider::new("/feed").with_package("A", v(1, 0, 0), vec![]));

        let summary = execute(RestoreRequest::new(spec.clone(), providers(&feed), ws.settings())).await;

        assert!(summary.success);
        assert!(!summary.no_op);
        assert!(summary.log_messages.is_empty());
        assert_eq!(summary.graphs.len(), 1);

        let artifact = LockArtifact::from_file(&spec.output_directory().join(ASSETS_FILE_NAME)).unwrap();
        assert_eq!(artifact.version, 3);
        let library = artifact.library("A", &v(1, 0, 0)).unwrap();
        assert_eq!(library.sha512.as_deref(), Some(info.sha512.as_str()));
        assert_eq!(library.files, vec!["lib/net8.0/lib.dll"]);
        assert!(artifact.logs.is_empty());

        let cache = CacheFile::read(&cache_file_path(&spec)).unwrap();
        assert!(cache.success);
        assert_eq!(cache.project_file_path, spec.file_path);
        assert_eq!(cache.expected_package_file_paths, vec![info.hash_file]);

        // no pin file unless the project asks for one
        assert!(!lock_file_path(&spec).exists());
    }

    #[tokio::test]
    async fn test_restore_with_lock_file_writes_pins() {
        let ws = Workspace::new();
        let spec = ws.project(
            "P",
            r#"
            [project]
            name = "P"
            version = "1.0.0"

            [restore]
            restore-with-lock-file = true

            [[frameworks]]
            name = "net8.0"
            dependencies = { "A" = "1.0.0" }
            "#,
        );
        let info = ws.stage("A", v(1, 0, 0));
        ws.stage("B", v(2, 0, 0));
        let feed = Arc::new(
            MemoryProvider::new("/feed")
                .with_package("A", v(1, 0, 0), vec![LibraryDependency::package("B", range("2.0.0"))])
                .with_package("B", v(2, 0, 0), vec![]),
        );

        let summary = execute(RestoreRequest::new(spec.clone(), providers(&feed), ws.settings())).await;
        assert!(summary.success);

        let lock = PackagesLockFile::read(&lock_file_path(&spec)).unwrap().unwrap();
        assert_eq!(lock.version, PackagesLockFile::VERSION);
        let target = lock.target(&FrameworkRuntimePair::framework_only("net8.0")).unwrap();

        let a = target.dependency("A").unwrap();
        assert_eq!(a.dependency_type, PackageDependencyType::Direct);
        assert_eq!(a.resolved, v(1, 0, 0));
        assert_eq!(a.content_hash.as_deref(), Some(info.sha512.as_str()));

        let b = target.dependency("B").unwrap();
        assert_eq!(b.dependency_type, PackageDependencyType::Transitive);
        assert_eq!(b.resolved, v(2, 0, 0));
    }

    #[tokio::test]
    async fn test_lock_version_one_drops_project_entries() {
        let ws = Workspace::new();
        let spec = ws.project("P", SIMPLE);
        let feed = Arc::new(MemoryProvider::new("/feed").with_package("A", v(1, 0, 0), vec![]));

        let request =
            RestoreRequest::new(spec.clone(), providers(&feed), ws.settings()).with_lock_file_version(1);
        let summary = execute(request).await;

        assert!(summary.success);
        assert_eq!(summary.artifact.version, 1);
        assert!(summary.artifact.project.is_none());
        assert!(summary.artifact.libraries.iter().all(|l| !l.is_project()));

        let written = LockArtifact::from_file(&summary.assets_path).unwrap();
        assert_eq!(written.version, 1);
    }

    #[tokio::test]
    async fn test_external_project_reference_resolves() {
        let ws = Workspace::new();
        let lib = ws.project(
            "Lib",
            r#"
            [project]
            name = "Lib"
            version = "2.0.0"

            [[frameworks]]
            name = "net8.0"
            dependencies = { "A" = "1.0.0" }
            "#,
        );
        let spec = ws.project(
            "P",
            r#"
            [project]
            name = "P"
            version = "1.0.0"

            [[frameworks]]
            name = "net8.0"

            [frameworks.project-references]
            "Lib" = { path = "../Lib/lockstep.toml" }
            "#,
        );
        let feed = Arc::new(MemoryProvider::new("/feed").with_package("A", v(1, 0, 0), vec![]));

        let request = RestoreRequest::new(spec.clone(), providers(&feed), ws.settings())
            .with_external_projects(vec![
                ExternalProjectReference::new(spec.clone()),
                ExternalProjectReference::new(lib),
            ]);
        let summary = execute(request).await;

        assert!(summary.success, "{:?}", summary.log_messages);
        let names: Vec<String> = summary.graphs[0].flattened().map(|n| n.display()).collect();
        assert_eq!(names, vec!["A 1.0.0", "Lib 2.0.0"]);
    }

    #[tokio::test]
    async fn test_additional_messages_are_recorded() {
        let ws = Workspace::new();
        let spec = ws.project("P", SIMPLE);
        let feed = Arc::new(MemoryProvider::new("/feed").with_package("A", v(1, 0, 0), vec![]));
        let extra = RestoreLogMessage::warning(LogCode::Undefined, "Restore was invoked from a script");

        let request = RestoreRequest::new(spec, providers(&feed), ws.settings())
            .with_additional_messages(vec![extra.clone()]);
        let summary = execute(request).await;

        assert!(summary.success);
        assert_eq!(summary.artifact.logs, vec![extra.clone()]);
        assert_eq!(summary.cache.logs, vec![extra]);
    }
}

mod no_op {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_second_restore_is_a_no_op() {
        let ws = Workspace::new();
        let spec = ws.project("P", SIMPLE);
        ws.stage("A", v(1, 0, 0));
        let feed = Arc::new(MemoryProvider::new("/feed").with_package("A", v(1, 0, 0), vec![]));
        let mut settings = ws.settings();
        settings.sources = vec![PackageSource {
            url: "http://feed.example/v3/index.json".to_string(),
            allow_insecure_http: false,
        }];

        let first = execute(RestoreRequest::new(spec.clone(), providers(&feed), settings.clone())).await;
        assert!(first.success);
        assert_eq!(codes(&first), vec!["NU1803"]);
        let calls = feed.call_count();
        assert!(calls > 0);

        let second = execute(RestoreRequest::new(spec.clone(), providers(&feed), settings.clone())).await;
        assert!(second.no_op);
        assert!(second.success);
        assert_eq!(feed.call_count(), calls);
        assert!(second.graphs.is_empty());
        // recorded warnings are replayed
        assert_eq!(codes(&second), vec!["NU1803"]);
        assert_eq!(second.commit().unwrap(), Vec::<PathBuf>::new());
    }

    #[tokio::test]
    async fn test_changed_provider_is_restored_again() {
        let ws = Workspace::new();
        let spec = ws.project("P", SIMPLE);
        ws.stage("A", v(1, 0, 0));
        let feed = Arc::new(MemoryProvider::new("/feed").with_package("A", v(1, 0, 0), vec![]));
        let first = execute(RestoreRequest::new(spec.clone(), providers(&feed), ws.settings())).await;
        assert!(first.success);

        let mirror = Arc::new(MemoryProvider::new("/mirror").with_package("A", v(1, 0, 0), vec![]));
        let second = execute(RestoreRequest::new(spec.clone(), providers(&mirror), ws.settings())).await;
        assert!(!second.no_op);
        assert!(second.success);
        assert!(mirror.call_count() > 0);
        assert_ne!(second.cache.dg_spec_hash, first.cache.dg_spec_hash);
    }

    #[tokio::test]
    async fn test_force_evaluate_bypasses_no_op() {
        let ws = Workspace::new();
        let spec = ws.project("P", SIMPLE);
        ws.stage("A", v(1, 0, 0));
        let feed = Arc::new(MemoryProvider::new("/feed").with_package("A", v(1, 0, 0), vec![]));

        execute(RestoreRequest::new(spec.clone(), providers(&feed), ws.settings())).await;
        let calls = feed.call_count();

        let mut settings = ws.settings();
        settings.force_evaluate = true;
        let forced = execute(RestoreRequest::new(spec.clone(), providers(&feed), settings)).await;
        assert!(!forced.no_op);
        assert!(feed.call_count() > calls);
    }

    #[tokio::test]
    async fn test_changed_project_is_restored_again() {
        let ws = Workspace::new();
        let spec = ws.project("P", SIMPLE);
        ws.stage("A", v(1, 0, 0));
        ws.stage("A", v(2, 0, 0));
        let feed = Arc::new(
            MemoryProvider::new("/feed")
                .with_package("A", v(1, 0, 0), vec![])
                .with_package("A", v(2, 0, 0), vec![]),
        );

        execute(RestoreRequest::new(spec, providers(&feed), ws.settings())).await;

        let changed = ws.project(
            "P",
            r#"
            [project]
            name = "P"
            version = "1.0.0"

            [[frameworks]]
            name = "net8.0"
            dependencies = { "A" = "2.0.0" }
            "#,
        );
        let summary = execute(RestoreRequest::new(changed, providers(&feed), ws.settings())).await;
        assert!(!summary.no_op);
        assert!(summary.artifact.library("A", &v(2, 0, 0)).is_some());
    }

    #[tokio::test]
    async fn test_missing_package_files_force_a_restore() {
        let ws = Workspace::new();
        let spec = ws.project("P", SIMPLE);
        let info = ws.stage("A", v(1, 0, 0));
        let feed = Arc::new(MemoryProvider::new("/feed").with_package("A", v(1, 0, 0), vec![]));

        execute(RestoreRequest::new(spec.clone(), providers(&feed), ws.settings())).await;
        std::fs::remove_file(&info.hash_file).unwrap();

        let summary = execute(RestoreRequest::new(spec, providers(&feed), ws.settings())).await;
        assert!(!summary.no_op);
    }

    #[tokio::test]
    async fn test_disabled_cache_writes_no_cache_file() {
        let ws = Workspace::new();
        let spec = ws.project("P", SIMPLE);
        let feed = Arc::new(MemoryProvider::new("/feed").with_package("A", v(1, 0, 0), vec![]));
        let mut settings = ws.settings();
        settings.no_cache = true;

        let summary = execute(RestoreRequest::new(spec.clone(), providers(&feed), settings)).await;
        assert!(summary.success);
        assert_eq!(summary.cache_path, None);
        assert!(!cache_file_path(&spec).exists());
        assert!(summary.assets_path.exists());
    }
}

mod input_errors {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_explicit_version_under_central_management() {
        let ws = Workspace::new();
        let spec = ws.project(
            "P",
            r#"
            [project]
            name = "P"
            version = "1.0.0"

            [restore]
            central-package-versions = true

            [central-versions]
            "A" = "1.0.0"

            [[frameworks]]
            name = "net8.0"
            dependencies = { "A" = "2.0.0" }
            "#,
        );
        let feed = Arc::new(MemoryProvider::new("/feed").with_package("A", v(2, 0, 0), vec![]));

        let summary = execute(RestoreRequest::new(spec.clone(), providers(&feed), ws.settings())).await;

        assert!(!summary.success);
        let message = find(&summary, LogCode::ExplicitVersionWithCentralManagement);
        assert!(message.is_error());
        assert!(message.message.ends_with(": A."), "{}", message.message);

        // one empty graph per pair, nothing resolved
        assert_eq!(summary.graphs.len(), 1);
        assert_eq!(summary.graphs[0].flattened().count(), 0);
        assert_eq!(feed.call_count(), 0);

        // the failure is still recorded on disk
        let artifact = LockArtifact::from_file(&summary.assets_path).unwrap();
        assert_eq!(artifact.targets.len(), 1);
        assert!(artifact.logs.iter().any(|m| m.code.as_str() == "NU1008"));
        assert!(!CacheFile::read(&cache_file_path(&spec)).unwrap().success);
    }

    #[tokio::test]
    async fn test_no_frameworks() {
        let ws = Workspace::new();
        let spec = ws.project(
            "P",
            r#"
            [project]
            name = "P"
            version = "1.0.0"
            "#,
        );
        let feed = Arc::new(MemoryProvider::new("/feed"));

        let summary = execute(RestoreRequest::new(spec, providers(&feed), ws.settings())).await;
        assert!(!summary.success);
        assert_eq!(codes(&summary), vec!["NU1001"]);
        assert!(summary.graphs.is_empty());
    }

    #[tokio::test]
    async fn test_lock_file_present_while_disabled() {
        let ws = Workspace::new();
        let spec = ws.project(
            "P",
            r#"
            [project]
            name = "P"
            version = "1.0.0"

            [restore]
            restore-with-lock-file = false

            [[frameworks]]
            name = "net8.0"
            dependencies = { "A" = "1.0.0" }
            "#,
        );
        std::fs::write(lock_file_path(&spec), "{}").unwrap();
        let feed = Arc::new(MemoryProvider::new("/feed").with_package("A", v(1, 0, 0), vec![]));

        let summary = execute(RestoreRequest::new(spec, providers(&feed), ws.settings())).await;
        assert!(!summary.success);
        assert_eq!(codes(&summary), vec!["NU1005"]);
        assert_eq!(summary.graphs[0].flattened().count(), 0);
        assert_eq!(feed.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_lock_file_version() {
        let ws = Workspace::new();
        let spec = ws.project("P", SIMPLE);
        let request =
            RestoreRequest::new(spec, DependencyProviders::new(), ws.settings()).with_lock_file_version(4);

        let err = RestoreCommand::new(request)
            .execute(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RestoreError::UnsupportedLockFileVersion { found: 4, supported: 3 }
        ));
    }

    #[tokio::test]
    async fn test_missing_external_reference() {
        let ws = Workspace::new();
        let spec = ws.project("P", SIMPLE);
        let other = ws.project(
            "Other",
            r#"
            [project]
            name = "Other"
            version = "1.0.0"
            "#,
        );
        let request = RestoreRequest::new(spec, DependencyProviders::new(), ws.settings())
            .with_external_projects(vec![ExternalProjectReference::new(other)]);

        let err = RestoreCommand::new(request)
            .execute(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RestoreError::MissingExternalReference(name) if name == "P"));
    }

    #[tokio::test]
    async fn test_ambiguous_external_reference() {
        let ws = Workspace::new();
        let spec = ws.project("P", SIMPLE);
        let request = RestoreRequest::new(spec.clone(), DependencyProviders::new(), ws.settings())
            .with_external_projects(vec![
                ExternalProjectReference::new(spec.clone()),
                ExternalProjectReference::new(spec),
            ]);

        let err = RestoreCommand::new(request)
            .execute(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RestoreError::AmbiguousProjectName(_)));
    }

    #[tokio::test]
    async fn test_cancelled_restore_writes_nothing() {
        let ws = Workspace::new();
        let spec = ws.project("P", SIMPLE);
        let feed = Arc::new(MemoryProvider::new("/feed").with_package("A", v(1, 0, 0), vec![]));
        let token = CancellationToken::new();
        token.cancel();

        let err = RestoreCommand::new(RestoreRequest::new(spec.clone(), providers(&feed), ws.settings()))
            .execute(&token)
            .await
            .unwrap_err();
        assert!(matches!(err, RestoreError::Cancelled));
        assert!(!spec.output_directory().exists());
    }
}

mod lock_file {
    use super::*;
    use pretty_assertions::assert_eq;

    const PINNED: &str = r#"
    [project]
    name = "P"
    version = "1.0.0"

    [restore]
    restore-with-lock-file = true

    [[frameworks]]
    name = "net8.0"
    dependencies = { "A" = "1.0.0" }
    "#;

    fn no_cache(ws: &Workspace) -> RestoreSettings {
        RestoreSettings {
            no_cache: true,
            ..ws.settings()
        }
    }

    #[tokio::test]
    async fn test_pins_are_kept_when_newer_versions_appear() {
        let ws = Workspace::new();
        let spec = ws.project("P", PINNED);
        let feed = |versions: &[Version]| {
            let mut feed = MemoryProvider::new("/feed").with_package(
                "A",
                v(1, 0, 0),
                vec![LibraryDependency::package("B", range("1.*"))],
            );
            for version in versions {
                feed.add_package("B", version.clone(), vec![]);
            }
            Arc::new(feed)
        };

        let first = execute(RestoreRequest::new(spec.clone(), providers(&feed(&[v(1, 0, 0)])), no_cache(&ws))).await;
        assert!(first.success);

        // the floating range now prefers 1.5.0, the pin still wins
        let newer = feed(&[v(1, 0, 0), v(1, 5, 0)]);
        let summary = execute(RestoreRequest::new(spec.clone(), providers(&newer), no_cache(&ws))).await;
        assert!(summary.success, "{:?}", summary.log_messages);
        assert_eq!(summary.graphs[0].governing("B").unwrap().display(), "B 1.0.0");
    }

    #[tokio::test]
    async fn test_locked_mode_with_stale_pins() {
        let ws = Workspace::new();
        let spec = ws.project("P", PINNED);
        ws.stage("A", v(1, 0, 0));
        let feed = Arc::new(
            MemoryProvider::new("/feed")
                .with_package("A", v(1, 0, 0), vec![])
                .with_package("A", v(2, 0, 0), vec![]),
        );
        execute(RestoreRequest::new(spec.clone(), providers(&feed), no_cache(&ws))).await;
        let pins = PackagesLockFile::read(&lock_file_path(&spec)).unwrap().unwrap();

        let changed = ws.project(
            "P",
            r#"
            [project]
            name = "P"
            version = "1.0.0"

            [restore]
            restore-with-lock-file = true

            [[frameworks]]
            name = "net8.0"
            dependencies = { "A" = "2.0.0" }
            "#,
        );
        let settings = RestoreSettings {
            locked_mode: Some(true),
            ..no_cache(&ws)
        };
        let summary = execute(RestoreRequest::new(changed, providers(&feed), settings)).await;

        assert!(!summary.success);
        let message = find(&summary, LogCode::LockedModeOutOfDate);
        assert!(message.message.contains("The package reference A version has changed"));
        assert!(message.message.ends_with("to update the lock file."));
        assert_eq!(summary.graphs[0].flattened().count(), 0);
        assert!(summary.lock_file.is_none());

        // the stale pins stay on disk
        assert_eq!(PackagesLockFile::read(&lock_file_path(&spec)).unwrap().unwrap(), pins);
    }

    #[tokio::test]
    async fn test_stale_pins_are_regenerated_outside_locked_mode() {
        let ws = Workspace::new();
        let spec = ws.project("P", PINNED);
        let feed = Arc::new(
            MemoryProvider::new("/feed")
                .with_package("A", v(1, 0, 0), vec![])
                .with_package("A", v(2, 0, 0), vec![]),
        );
        execute(RestoreRequest::new(spec.clone(), providers(&feed), no_cache(&ws))).await;

        let changed = ws.project(
            "P",
            r#"
            [project]
            name = "P"
            version = "1.0.0"

            [restore]
            restore-with-lock-file = true

            [[frameworks]]
            name = "net8.0"
            dependencies = { "A" = "2.0.0" }
            "#,
        );
        let summary = execute(RestoreRequest::new(changed, providers(&feed), no_cache(&ws))).await;
        assert!(summary.success, "{:?}", summary.log_messages);

        let pins = PackagesLockFile::read(&lock_file_path(&spec)).unwrap().unwrap();
        let target = pins.target(&FrameworkRuntimePair::framework_only("net8.0")).unwrap();
        assert_eq!(target.dependency("A").unwrap().resolved, v(2, 0, 0));
    }

    #[tokio::test]
    async fn test_content_hash_mismatch() {
        let ws = Workspace::new();
        let spec = ws.project("P", PINNED);
        ws.stage("A", v(1, 0, 0));
        let feed = Arc::new(MemoryProvider::new("/feed").with_package("A", v(1, 0, 0), vec![]));
        execute(RestoreRequest::new(spec.clone(), providers(&feed), no_cache(&ws))).await;

        let path = lock_file_path(&spec);
        let mut pins = PackagesLockFile::read(&path).unwrap().unwrap();
        for target in &mut pins.targets {
            for dependency in &mut target.dependencies {
                dependency.content_hash = Some("AAAA".to_string());
            }
        }
        std::fs::write(&path, pins.to_json().unwrap()).unwrap();

        let summary = execute(RestoreRequest::new(spec.clone(), providers(&feed), no_cache(&ws))).await;
        assert!(!summary.success);
        let message = find(&summary, LogCode::ContentHashMismatch);
        assert_eq!(
            message.message,
            "Package content hash validation failed for A.1.0.0. The package is different than the last restore.\n"
        );
        assert!(summary.lock_file.is_none());
        assert_eq!(PackagesLockFile::read(&path).unwrap().unwrap(), pins);
    }

    #[tokio::test]
    async fn test_replaced_package_contents_fail_hash_validation() {
        let ws = Workspace::new();
        let spec = ws.project("P", PINNED);
        let installed = ws.stage("A", v(1, 0, 0));
        let feed = Arc::new(MemoryProvider::new("/feed").with_package("A", v(1, 0, 0), vec![]));
        let first = execute(RestoreRequest::new(spec.clone(), providers(&feed), no_cache(&ws))).await;
        assert!(first.success, "{:?}", first.log_messages);
        let pins = PackagesLockFile::read(&lock_file_path(&spec)).unwrap().unwrap();

        std::fs::write(&installed.hash_file, "TAMPERED").unwrap();

        let summary = execute(RestoreRequest::new(spec.clone(), providers(&feed), no_cache(&ws))).await;
        assert!(!summary.success);
        assert_eq!(codes(&summary), vec!["NU1403"]);
        let library = summary.artifact.library("A", &v(1, 0, 0)).unwrap();
        assert_eq!(library.sha512.as_deref(), Some("TAMPERED"));
        assert_eq!(PackagesLockFile::read(&lock_file_path(&spec)).unwrap().unwrap(), pins);
    }
}

mod graph_errors {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_unresolved_package() {
        let ws = Workspace::new();
        let spec = ws.project(
            "P",
            r#"
            [project]
            name = "P"
            version = "1.0.0"

            [[frameworks]]
            name = "net8.0"
            dependencies = { "Missing" = "1.0.0" }

            [[frameworks]]
            name = "net472"
            dependencies = { "Missing" = "1.0.0" }
            "#,
        );
        let feed = Arc::new(MemoryProvider::new("/feed"));

        let summary = execute(RestoreRequest::new(spec, providers(&feed), ws.settings())).await;
        assert!(!summary.success);

        // one message for both graphs
        assert_eq!(codes(&summary), vec!["NU1101"]);
        let message = find(&summary, LogCode::UnresolvedPackage);
        assert!(message.message.starts_with("Unable to find package Missing"));
        assert!(message.message.ends_with("No matching version exists in source(s): /feed"));
        assert_eq!(message.library_id.as_deref(), Some("Missing"));
        assert_eq!(message.target_graphs.len(), 2);

        let artifact = LockArtifact::from_file(&summary.assets_path).unwrap();
        assert_eq!(artifact.logs, summary.log_messages);
    }

    #[tokio::test]
    async fn test_source_failure() {
        let ws = Workspace::new();
        let spec = ws.project(
            "P",
            r#"
            [project]
            name = "P"
            version = "1.0.0"

            [[frameworks]]
            name = "net8.0"
            dependencies = { "Broken" = "1.0.0" }
            "#,
        );
        let feed = Arc::new(MemoryProvider::new("https://feed.example").with_failure("Broken"));

        let summary = execute(RestoreRequest::new(spec, providers(&feed), ws.settings())).await;
        assert!(!summary.success);
        let message = find(&summary, LogCode::SourceFailure);
        assert_eq!(message.target_graphs, vec!["net8.0"]);
    }

    #[tokio::test]
    async fn test_version_conflict() {
        let ws = Workspace::new();
        let spec = ws.project(
            "P",
            r#"
            [project]
            name = "P"
            version = "1.0.0"

            [[frameworks]]
            name = "net8.0"
            dependencies = { "PackageX" = "^1.0.0", "PackageQ" = "1.0.0" }
            "#,
        );
        let feed = Arc::new(
            MemoryProvider::new("/feed")
                .with_package("PackageX", v(1, 0, 0), vec![])
                .with_package("PackageX", v(2, 0, 0), vec![])
                .with_package(
                    "PackageQ",
                    v(1, 0, 0),
                    vec![LibraryDependency::package("PackageX", range("[2.0.0, 3.0.0)"))],
                ),
        );

        let summary = execute(RestoreRequest::new(spec, providers(&feed), ws.settings())).await;
        assert!(!summary.success);
        let message = find(&summary, LogCode::VersionConflict);
        assert!(message.message.starts_with(
            "Version conflict detected for PackageX. Install/reference PackageX 1.0.0 directly to project P"
        ));
        assert_eq!(message.library_id.as_deref(), Some("PackageX"));
    }

    #[tokio::test]
    async fn test_dependency_cycle() {
        let ws = Workspace::new();
        let spec = ws.project("P", SIMPLE);
        let feed = Arc::new(
            MemoryProvider::new("/feed")
                .with_package("A", v(1, 0, 0), vec![LibraryDependency::package("B", range("2.0.0"))])
                .with_package("B", v(2, 0, 0), vec![LibraryDependency::package("A", range("1.0.0"))]),
        );

        let summary = execute(RestoreRequest::new(spec, providers(&feed), ws.settings())).await;
        assert!(!summary.success);
        assert_eq!(codes(&summary), vec!["NU1108"]);
        let message = find(&summary, LogCode::DependencyCycle);
        assert_eq!(message.message, "Cycle detected. \n  A 1.0.0 -> B 2.0.0 -> A 1.0.0.");
        assert_eq!(message.library_id.as_deref(), Some("A"));
        assert_eq!(message.level, LogLevel::Error);
    }

    #[tokio::test]
    async fn test_centrally_pinned_transitive_downgrade() {
        let ws = Workspace::new();
        let spec = ws.project(
            "P",
            r#"
            [project]
            name = "P"
            version = "1.0.0"

            [restore]
            central-package-versions = true
            central-transitive-pinning = true

            [central-versions]
            "A" = "1.0.0"
            "C" = "1.0.0"

            [[frameworks]]
            name = "net8.0"
            dependencies = { "A" = { } }
            "#,
        );
        let feed = Arc::new(
            MemoryProvider::new("/feed")
                .with_package("A", v(1, 0, 0), vec![LibraryDependency::package("C", range("2.0.0"))])
                .with_package("C", v(1, 0, 0), vec![])
                .with_package("C", v(2, 0, 0), vec![]),
        );

        let summary = execute(RestoreRequest::new(spec, providers(&feed), ws.settings())).await;
        assert!(!summary.success);
        let message = find(&summary, LogCode::CentralTransitiveDowngrade);
        assert_eq!(message.level, LogLevel::Error);
        assert!(message
            .message
            .starts_with("Detected package downgrade: C from 2.0.0 to centrally defined 1.0.0."));
        assert_eq!(message.library_id.as_deref(), Some("C"));
        assert_eq!(summary.graphs[0].governing("C").unwrap().display(), "C 1.0.0");
    }

    const DOWNGRADE: &str = r#"
    [project]
    name = "P"
    version = "1.0.0"

    [[frameworks]]
    name = "net8.0"
    dependencies = { "PackageX" = "1.0.0", "PackageQ" = "1.0.0" }
    "#;

    fn downgrade_feed() -> Arc<MemoryProvider> {
        Arc::new(
            MemoryProvider::new("/feed")
                .with_package("PackageX", v(1, 0, 0), vec![])
                .with_package("PackageX", v(2, 0, 0), vec![])
                .with_package(
                    "PackageQ",
                    v(1, 0, 0),
                    vec![LibraryDependency::package("PackageX", range("2.0.0"))],
                ),
        )
    }

    #[tokio::test]
    async fn test_downgrade_is_a_warning() {
        let ws = Workspace::new();
        let spec = ws.project("P", DOWNGRADE);

        let summary = execute(RestoreRequest::new(spec, providers(&downgrade_feed()), ws.settings())).await;
        assert!(summary.success);
        let message = find(&summary, LogCode::PackageDowngrade);
        assert_eq!(message.level, LogLevel::Warning);
        assert!(message
            .message
            .starts_with("Detected package downgrade: PackageX from 2.0.0 to 1.0.0."));
        assert!(message.message.contains("P 1.0.0 -> PackageQ 1.0.0 -> PackageX (>= 2.0.0)"));
        assert_eq!(summary.artifact.logs.len(), 1);
    }

    #[tokio::test]
    async fn test_downgrade_as_error() {
        let ws = Workspace::new();
        let spec = ws.project(
            "P",
            &DOWNGRADE.replace(
                "[[frameworks]]",
                "[restore]\n    warnings-as-errors = [\"NU1605\"]\n\n    [[frameworks]]",
            ),
        );

        let summary = execute(RestoreRequest::new(spec, providers(&downgrade_feed()), ws.settings())).await;
        assert!(!summary.success);
        assert_eq!(find(&summary, LogCode::PackageDowngrade).level, LogLevel::Error);
    }

    #[tokio::test]
    async fn test_suppressed_downgrade() {
        let ws = Workspace::new();
        let spec = ws.project(
            "P",
            &DOWNGRADE.replace(
                "[[frameworks]]",
                "[restore]\n    no-warn = [\"NU1605\"]\n\n    [[frameworks]]",
            ),
        );

        let summary = execute(RestoreRequest::new(spec, providers(&downgrade_feed()), ws.settings())).await;
        assert!(summary.success);
        assert!(summary.log_messages.is_empty());
    }
}

mod compatibility {
    use super::*;
    use pretty_assertions::assert_eq;

    struct RejectPackages;

    impl CompatibilityChecker for RejectPackages {
        fn check(
            &self,
            graph: &RestoreTargetGraph,
            include_flags: &BTreeMap<String, IncludeFlags>,
        ) -> CompatibilityCheckResult {
            let issues: Vec<RestoreLogMessage> = graph
                .flattened()
                .filter(|node| node.is_package() && include_flags.contains_key(&node.name().to_ascii_lowercase()))
                .map(|node| {
                    RestoreLogMessage::error(
                        LogCode::Undefined,
                        format!("{} is not compatible with {}", node.display(), graph.name()),
                    )
                })
                .collect();
            CompatibilityCheckResult {
                graph: graph.name(),
                success: issues.is_empty(),
                issues,
            }
        }
    }

    #[tokio::test]
    async fn test_incompatible_packages_fail_the_restore() {
        let ws = Workspace::new();
        let spec = ws.project("P", SIMPLE);
        let feed = Arc::new(MemoryProvider::new("/feed").with_package("A", v(1, 0, 0), vec![]));

        let request = RestoreRequest::new(spec, providers(&feed), ws.settings())
            .with_compatibility_checker(Arc::new(RejectPackages));
        let summary = execute(request).await;

        assert!(!summary.success);
        assert_eq!(summary.compatibility_results.len(), 1);
        assert!(!summary.compatibility_results[0].success);
        assert_eq!(
            summary.log_messages[0].message,
            "A 1.0.0 is not compatible with net8.0"
        );
    }

    #[tokio::test]
    async fn test_skipped_with_unresolved_packages() {
        let ws = Workspace::new();
        let spec = ws.project(
            "P",
            r#"
            [project]
            name = "P"
            version = "1.0.0"

            [[frameworks]]
            name = "net8.0"
            dependencies = { "Missing" = "1.0.0" }
            "#,
        );
        let feed = Arc::new(MemoryProvider::new("/feed"));

        let request = RestoreRequest::new(spec, providers(&feed), ws.settings())
            .with_compatibility_checker(Arc::new(RejectPackages));
        let summary = execute(request).await;
        assert!(summary.compatibility_results.is_empty());
    }
}
