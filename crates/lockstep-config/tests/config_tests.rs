use lockstep_config::{ConfigError, ConfigLoader, PackageSource};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write(path: &Path, content: &str) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
    path.to_path_buf()
}

#[test]
fn test_project_folders_are_relative_to_the_project() {
    let temp = TempDir::new().unwrap();
    let project = write(
        &temp.path().join("src/App/lockstep.toml"),
        r#"
[project]
name = "App"
version = "1.0.0"

[restore]
global-packages-folder = "../../.packages"
fallback-folders = ["offline", "/shared/offline"]
"#,
    );

    let mut loader = ConfigLoader::with_global_config_path(temp.path().join("none.toml"));
    let settings = loader.load(&project).unwrap();

    let project_dir = temp.path().join("src/App");
    assert_eq!(settings.global_packages_folder, project_dir.join("../../.packages"));
    assert_eq!(
        settings.fallback_folders,
        vec![project_dir.join("offline"), PathBuf::from("/shared/offline")]
    );
    assert!(settings.sources.is_empty());
}

#[test]
fn test_global_sources_keep_their_order() {
    let temp = TempDir::new().unwrap();
    let global = write(
        &temp.path().join("config.toml"),
        r#"
[[sources]]
url = "  https://b.example/v3  "

[[sources]]
url = "http://a.example"
allow-insecure-http = true

[packages]
global-packages-folder = "/cache/packages"
fallback-folders = ["/cache/fallback"]
"#,
    );

    let mut loader = ConfigLoader::with_global_config_path(global);
    let settings = loader.load(&temp.path().join("lockstep.toml")).unwrap();

    assert_eq!(
        settings.sources,
        vec![
            PackageSource {
                url: "https://b.example/v3".to_string(),
                allow_insecure_http: false,
            },
            PackageSource {
                url: "http://a.example".to_string(),
                allow_insecure_http: true,
            },
        ]
    );
    assert_eq!(settings.insecure_sources().count(), 0);
    assert_eq!(settings.fallback_folders, vec![PathBuf::from("/cache/fallback")]);
}

#[test]
fn test_duplicate_project_sources_are_rejected() {
    let temp = TempDir::new().unwrap();
    let project = write(
        &temp.path().join("lockstep.toml"),
        r#"
[[restore.sources]]
url = "https://feed.example/"

[[restore.sources]]
url = "https://FEED.example"
"#,
    );

    let mut loader = ConfigLoader::with_global_config_path(temp.path().join("none.toml"));
    let result = loader.load(&project);
    assert!(matches!(
        result,
        Err(ConfigError::DuplicateSource { field, .. }) if field == "restore.sources"
    ));
}

#[test]
fn test_malformed_project_file() {
    let temp = TempDir::new().unwrap();
    let project = write(&temp.path().join("lockstep.toml"), "[restore\nsources = 1");

    let mut loader = ConfigLoader::with_global_config_path(temp.path().join("none.toml"));
    match loader.load(&project) {
        Err(ConfigError::TomlParseError { file, .. }) => assert_eq!(file, project),
        other => panic!("expected a parse error, got {:?}", other),
    }
}
