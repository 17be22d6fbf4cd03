//! Integration tests for loading configuration files from disk.

use std::io::Write;
use tempfile::NamedTempFile;
use todo_service::config::{
    AppConfig, BackendKind, DEFAULT_EMBEDDED_URI, DatabaseConfig, EmbeddedSettings,
    ManagedSettings,
};
use todo_service::error::AppError;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn managed_settings(config: AppConfig) -> ManagedSettings {
    match config.database {
        DatabaseConfig::Managed(settings) => settings,
        other => panic!("expected managed settings, got {other:?}"),
    }
}

#[test]
fn test_load_config_missing_file() {
    let err = AppConfig::load("/nonexistent/config.toml").unwrap_err();
    assert!(matches!(err, AppError::ConfigNotFound { .. }));
    assert!(err.to_string().contains("Config file not found"));
}

#[test]
fn test_load_config_missing_file_in_existing_dir() {
    let dir = tempfile::tempdir().unwrap();
    let err = AppConfig::load(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, AppError::ConfigNotFound { .. }));
}

#[test]
fn test_load_config_embedded() {
    let file = write_config(
        r#"
[database]
type = "embedded"

[database.embedded]
uri = "sqlite:///tmp/test.db"
"#,
    );

    let config = AppConfig::load(file.path()).unwrap();

    assert_eq!(config.backend(), BackendKind::Embedded);
    assert_eq!(
        config,
        AppConfig::embedded(EmbeddedSettings::new("sqlite:///tmp/test.db"))
    );
}

#[test]
fn test_load_config_embedded_default_uri() {
    let file = write_config("[database]\ntype = \"embedded\"\n");

    let config = AppConfig::load(file.path()).unwrap();

    match config.database {
        DatabaseConfig::Embedded(settings) => assert_eq!(settings.uri, DEFAULT_EMBEDDED_URI),
        other => panic!("expected embedded settings, got {other:?}"),
    }
}

#[test]
fn test_load_config_managed() {
    let file = write_config(
        r#"
[database]
type = "managed"

[database.managed]
host = "test.rds.amazonaws.com"
port = 5432
name = "testdb"
user = "testuser"
region = "us-west-2"
"#,
    );

    let settings = managed_settings(AppConfig::load(file.path()).unwrap());

    assert_eq!(settings.host, "test.rds.amazonaws.com");
    assert_eq!(settings.port, 5432);
    assert_eq!(settings.database_name, "testdb");
    assert_eq!(settings.user, "testuser");
    assert_eq!(settings.region, "us-west-2");
    assert_eq!(settings.hostname_override, None);
}

#[test]
fn test_load_config_managed_with_hostname_override() {
    let file = write_config(
        r#"
[database]
type = "managed"

[database.managed]
host = "test.rds.amazonaws.com"
port = 5432
name = "testdb"
user = "testuser"
region = "eu-west-1"
hostname_override = "localhost"
"#,
    );

    let settings = managed_settings(AppConfig::load(file.path()).unwrap());

    assert_eq!(settings.host, "test.rds.amazonaws.com");
    assert_eq!(settings.hostname_override.as_deref(), Some("localhost"));
}

#[test]
fn test_load_config_invalid_type() {
    let file = write_config("[database]\ntype = \"mysql\"\n");

    let err = AppConfig::load(file.path()).unwrap_err();

    assert!(matches!(err, AppError::InvalidBackend { ref value } if value == "mysql"));
    assert!(err.to_string().contains("Invalid database type: 'mysql'"));
}

#[test]
fn test_load_config_legacy_type_names_are_rejected() {
    for legacy in ["sqlite", "rds"] {
        let file = write_config(&format!("[database]\ntype = \"{legacy}\"\n"));
        let err = AppConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains(&format!("'{legacy}'")));
    }
}

#[test]
fn test_load_config_missing_type() {
    let file = write_config("[database]\n");

    let err = AppConfig::load(file.path()).unwrap_err();

    assert!(matches!(err, AppError::InvalidBackend { .. }));
    assert!(err.to_string().contains("Invalid database type: '<missing>'"));
}

#[test]
fn test_load_config_managed_only_host_present() {
    let file = write_config(
        r#"
[database]
type = "managed"

[database.managed]
host = "test.rds.amazonaws.com"
"#,
    );

    let err = AppConfig::load(file.path()).unwrap_err();

    assert_eq!(
        err.to_string(),
        "Missing required managed database configuration fields: port, name, user, region"
    );
}

#[test]
fn test_load_config_managed_missing_only_host() {
    let file = write_config(
        r#"
[database]
type = "managed"

[database.managed]
user = "testuser"
region = "us-west-2"
port = 5432
name = "testdb"
"#,
    );

    let err = AppConfig::load(file.path()).unwrap_err();

    let AppError::MissingRequiredField { fields } = err else {
        panic!("expected MissingRequiredField, got {err:?}");
    };
    assert_eq!(fields, vec!["host"]);
}

#[test]
fn test_load_config_malformed_toml() {
    let file = write_config("[database\ntype = ");

    let err = AppConfig::load(file.path()).unwrap_err();

    assert!(matches!(err, AppError::ConfigParse { .. }));
    assert!(err.is_config_error());
}
