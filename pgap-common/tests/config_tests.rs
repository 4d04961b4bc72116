//! Unit tests for configuration and graceful degradation
//!
//! Tests the implementation of:
//! - Missing TOML files do not cause termination
//! - Priority order for root folder resolution
//! - Automatic directory creation
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate PGAP_ROOT_FOLDER are marked with #[serial].

use pgap_common::config::{
    default_root_folder, write_toml_config, LoggingConfig, RootFolderInitializer,
    RootFolderResolver, TomlConfig, DEFAULT_PROBE_TIMEOUT_MS, ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let config = TomlConfig::default();
    let root_folder = RootFolderResolver::new(&config).resolve();

    assert_eq!(root_folder, default_root_folder());
    assert!(root_folder.ends_with("pgap") || root_folder.ends_with("pgap_data"));
}

#[test]
#[serial]
fn test_resolver_env_var_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/pgap-test-env-folder");

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/pgap-from-toml")),
        ..Default::default()
    };
    let root_folder = RootFolderResolver::new(&config).resolve();

    assert_eq!(root_folder, PathBuf::from("/tmp/pgap-test-env-folder"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_cli_arg_has_highest_priority() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/pgap-priority-2");

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/pgap-priority-3")),
        ..Default::default()
    };
    let root_folder = RootFolderResolver::new(&config)
        .with_cli_arg(Some(PathBuf::from("/tmp/pgap-priority-1")))
        .resolve();

    assert_eq!(root_folder, PathBuf::from("/tmp/pgap-priority-1"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_uses_toml_when_env_missing() {
    env::remove_var(ROOT_FOLDER_ENV);

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/pgap-from-toml")),
        ..Default::default()
    };
    assert_eq!(
        RootFolderResolver::new(&config).resolve(),
        PathBuf::from("/tmp/pgap-from-toml")
    );
}

#[test]
fn test_initializer_paths() {
    let root = PathBuf::from("/tmp/pgap-test-root");
    let initializer = RootFolderInitializer::new(root.clone());

    assert_eq!(initializer.database_path(), root.join("pgap.db"));
    assert_eq!(initializer.cache_path(), root.join("pgap-cache.json"));
}

#[test]
fn test_initializer_idempotent_directory_creation() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("nested").join("pgap");

    let initializer = RootFolderInitializer::new(root.clone());
    assert!(initializer.ensure_directory_exists().is_ok());
    assert!(initializer.ensure_directory_exists().is_ok());

    assert!(root.is_dir());
}

#[test]
fn test_toml_round_trip_with_partial_fields() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("pgap.toml");

    let config = TomlConfig {
        port: Some(6000),
        demo_assessment_id: Some("demo-assessment".to_string()),
        logging: LoggingConfig {
            level: "debug".to_string(),
            file: None,
        },
        ..Default::default()
    };
    write_toml_config(&config, &path).unwrap();

    let loaded = TomlConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_resolved_config_pins_effective_values() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("data");
    let path = temp.path().join("out").join("pgap.toml");

    let config = TomlConfig {
        demo_assessment_id: Some("demo-assessment".to_string()),
        ..Default::default()
    };
    let initializer = RootFolderInitializer::new(root.clone());
    let resolved = config.resolved(
        &root,
        &initializer.database_path(),
        &initializer.cache_path(),
        5800,
    );
    write_toml_config(&resolved, &path).unwrap();

    let loaded = TomlConfig::load(&path).unwrap();
    assert_eq!(loaded.root_folder, Some(root.clone()));
    assert_eq!(loaded.remote_database, Some(root.join("pgap.db")));
    assert_eq!(loaded.cache_file, Some(root.join("pgap-cache.json")));
    assert_eq!(loaded.port, Some(5800));
    assert_eq!(loaded.probe_timeout_ms, Some(DEFAULT_PROBE_TIMEOUT_MS));
    assert_eq!(loaded.demo_assessment_id.as_deref(), Some("demo-assessment"));
}

#[test]
fn test_missing_sections_use_defaults() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("pgap.toml");
    std::fs::write(&path, "port = 7000\n").unwrap();

    let loaded = TomlConfig::load(&path).unwrap();
    assert_eq!(loaded.port, Some(7000));
    assert_eq!(loaded.logging.level, "info");

    let settings = loaded.store_settings();
    assert_eq!(settings.probe_timeout_ms, DEFAULT_PROBE_TIMEOUT_MS);
    assert!(settings.demo_assessment_id.is_none());
}

#[test]
fn test_malformed_toml_is_config_error() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("pgap.toml");
    std::fs::write(&path, "port = [not valid").unwrap();

    let err = TomlConfig::load(&path).unwrap_err();
    assert!(err.to_string().contains("Configuration error"));
}
