//! Tests for config module.

use super::*;
use serial_test::serial;
use std::collections::HashMap;
use tempfile::tempdir;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn test_defaults() {
    let config = RegistryConfig::default();
    assert!(!config.project_sharing_enabled);
    assert_eq!(config.poll_interval(), Duration::from_secs(1));
    assert!(config.root_storage_path.ends_with(".local/share/rstudio"));
    assert_eq!(
        config.global_sessions_path(),
        config.root_storage_path.join("global-sessions")
    );
}

#[test]
fn test_load_partial_yaml() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sessions.yaml");
    std::fs::write(
        &path,
        "root_storage_path: /srv/ws\nproject_sharing_enabled: true\n",
    )
    .unwrap();

    let config = RegistryConfig::load(&path).unwrap();
    assert_eq!(config.root_storage_path, PathBuf::from("/srv/ws"));
    assert!(config.project_sharing_enabled);
    assert_eq!(config.poll_interval_ms, 1000);
    assert_eq!(
        config.global_sessions_path(),
        PathBuf::from("/srv/ws/global-sessions")
    );
}

#[test]
fn test_load_rejects_zero_interval() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sessions.yaml");
    std::fs::write(&path, "poll_interval_ms: 0\n").unwrap();

    assert!(RegistryConfig::load(&path).is_err());
}

#[test]
fn test_load_malformed_yaml() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sessions.yaml");
    std::fs::write(&path, "poll_interval_ms: [not a number\n").unwrap();

    let err = RegistryConfig::load(&path).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
}

#[test]
fn test_load_missing_file_uses_defaults() {
    let dir = tempdir().unwrap();
    let config = RegistryConfig::load(&dir.path().join("absent.yaml")).unwrap();
    assert_eq!(config, RegistryConfig::default());
}

#[test]
#[serial]
fn test_resolve_missing_file_uses_defaults() {
    std::env::remove_var(ENV_ROOT);
    std::env::remove_var(ENV_POLL_MS);
    std::env::remove_var(ENV_PROJECT_SHARING);

    let dir = tempdir().unwrap();
    let config = RegistryConfig::resolve(Some(dir.path().join("absent.yaml").as_path())).unwrap();
    assert_eq!(config, RegistryConfig::default());
}

#[test]
fn test_load_unreadable_path_is_error() {
    let dir = tempdir().unwrap();
    // A directory exists at the path but cannot be read as a file
    assert!(RegistryConfig::load(dir.path()).is_err());
}

#[test]
fn test_overrides_from_lookup() {
    let mut config = RegistryConfig::default();
    config
        .apply_overrides(lookup_from(&[
            (ENV_ROOT, "/data/ws"),
            (ENV_POLL_MS, "250"),
            (ENV_PROJECT_SHARING, "TRUE"),
        ]))
        .unwrap();

    assert_eq!(config.root_storage_path, PathBuf::from("/data/ws"));
    assert_eq!(config.poll_interval(), Duration::from_millis(250));
    assert!(config.project_sharing_enabled);
}

#[test]
fn test_invalid_poll_override() {
    let mut config = RegistryConfig::default();
    assert!(config
        .apply_overrides(lookup_from(&[(ENV_POLL_MS, "soon")]))
        .is_err());
}

#[test]
#[serial]
fn test_resolve_reads_process_environment() {
    std::env::set_var(ENV_ROOT, "/env/root");
    std::env::set_var(ENV_PROJECT_SHARING, "0");
    let result = RegistryConfig::resolve(None);
    std::env::remove_var(ENV_ROOT);
    std::env::remove_var(ENV_PROJECT_SHARING);

    let config = result.unwrap();
    assert_eq!(config.root_storage_path, PathBuf::from("/env/root"));
    assert!(!config.project_sharing_enabled);
}
