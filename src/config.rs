//! Configuration handling for the todo service.
//!
//! Two layers live here:
//! - [`ServerArgs`]: process settings from command line arguments and environment
//!   variables (config file path, HTTP bind address, logging).
//! - [`AppConfig`]: the validated database configuration loaded from a TOML file.
//!   It is built once at startup and shared read-only afterwards.

use crate::error::{AppError, AppResult};
use clap::Parser;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const DEFAULT_HTTP_HOST: &str = "0.0.0.0";
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_EMBEDDED_URI: &str = "sqlite:///tmp/todo.db";

/// Required keys of `[database.managed]`, in reporting order.
const MANAGED_REQUIRED_FIELDS: [&str; 5] = ["host", "port", "name", "user", "region"];

/// Process settings for the todo service.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "todo-service",
    about = "HTTP CRUD service for todos backed by SQLite or IAM-authenticated PostgreSQL",
    version,
    author
)]
pub struct ServerArgs {
    /// Path to the TOML configuration file
    #[arg(
        short,
        long,
        value_name = "PATH",
        default_value = DEFAULT_CONFIG_PATH,
        env = "TODO_CONFIG"
    )]
    pub config: String,

    /// HTTP host to bind to
    #[arg(long, default_value = DEFAULT_HTTP_HOST, env = "TODO_HTTP_HOST")]
    pub http_host: String,

    /// HTTP port to bind to
    #[arg(long, default_value_t = DEFAULT_HTTP_PORT, env = "TODO_HTTP_PORT")]
    pub http_port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "TODO_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "TODO_JSON_LOGS")]
    pub json_logs: bool,
}

impl ServerArgs {
    /// Get the HTTP bind address.
    pub fn http_bind_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}

impl Default for ServerArgs {
    fn default() -> Self {
        Self {
            config: DEFAULT_CONFIG_PATH.to_string(),
            http_host: DEFAULT_HTTP_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Database backend discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Local file-based store (SQLite).
    Embedded,
    /// Network database with per-connection IAM authentication (RDS PostgreSQL).
    Managed,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Embedded => "embedded",
            Self::Managed => "managed",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "embedded" => Ok(Self::Embedded),
            "managed" => Ok(Self::Managed),
            other => Err(AppError::unsupported_backend(other)),
        }
    }
}

/// Settings for the embedded store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedSettings {
    /// sqlx SQLite connection string, e.g. `sqlite:///tmp/todo.db`.
    pub uri: String,
}

impl EmbeddedSettings {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }
}

impl Default for EmbeddedSettings {
    fn default() -> Self {
        Self::new(DEFAULT_EMBEDDED_URI)
    }
}

/// Settings for the managed (RDS) database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedSettings {
    /// Real database endpoint. Always used as the token scope.
    pub host: String,
    pub port: u16,
    pub database_name: String,
    pub user: String,
    pub region: String,
    /// Network target used instead of `host` (tunnels, proxies, local port-forwards).
    pub hostname_override: Option<String>,
}

impl ManagedSettings {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        database_name: impl Into<String>,
        user: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            database_name: database_name.into(),
            user: user.into(),
            region: region.into(),
            hostname_override: None,
        }
    }

    pub fn with_hostname_override(mut self, hostname: impl Into<String>) -> Self {
        self.hostname_override = Some(hostname.into());
        self
    }

    /// Host the driver opens the socket to.
    pub fn connection_host(&self) -> &str {
        self.hostname_override.as_deref().unwrap_or(&self.host)
    }
}

/// Database configuration: exactly one backend with its settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseConfig {
    Embedded(EmbeddedSettings),
    Managed(ManagedSettings),
}

impl DatabaseConfig {
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Embedded(_) => BackendKind::Embedded,
            Self::Managed(_) => BackendKind::Managed,
        }
    }
}

/// Validated application configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database: DatabaseConfig,
}

impl AppConfig {
    pub fn embedded(settings: EmbeddedSettings) -> Self {
        Self {
            database: DatabaseConfig::Embedded(settings),
        }
    }

    pub fn managed(settings: ManagedSettings) -> Self {
        Self {
            database: DatabaseConfig::Managed(settings),
        }
    }

    pub fn backend(&self) -> BackendKind {
        self.database.kind()
    }

    /// Load and validate configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// - [`AppError::ConfigNotFound`] if nothing exists at `path`
    /// - [`AppError::ConfigParse`] if the file is not valid TOML or a value has the wrong type
    /// - [`AppError::InvalidBackend`] if `database.type` is absent or unrecognized
    /// - [`AppError::MissingRequiredField`] listing every absent managed field
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        if !path.exists() {
            return Err(AppError::config_not_found(path_str));
        }

        info!(path = %path_str, "Loading config");

        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::config_io(&path_str, e.to_string()))?;
        Self::parse_from(&content, &path_str)
    }

    /// Parse and validate configuration from TOML text.
    pub fn parse_toml(content: &str) -> AppResult<Self> {
        Self::parse_from(content, "<inline>")
    }

    fn parse_from(content: &str, origin: &str) -> AppResult<Self> {
        let raw: RawConfig =
            toml::from_str(content).map_err(|e| AppError::config_parse(origin, e.to_string()))?;
        raw.database.validate()
    }
}

/// Shape of the file before validation. Every field is optional so that
/// validation can report all problems at once.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    database: RawDatabase,
}

#[derive(Debug, Default, Deserialize)]
struct RawDatabase {
    #[serde(rename = "type")]
    kind: Option<toml::Value>,
    embedded: Option<RawEmbedded>,
    managed: Option<RawManaged>,
}

#[derive(Debug, Default, Deserialize)]
struct RawEmbedded {
    uri: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawManaged {
    host: Option<String>,
    port: Option<u16>,
    name: Option<String>,
    user: Option<String>,
    region: Option<String>,
    hostname_override: Option<String>,
}

impl RawDatabase {
    fn validate(self) -> AppResult<AppConfig> {
        let kind = match &self.kind {
            None => return Err(AppError::invalid_backend(None)),
            Some(toml::Value::String(s)) => s
                .parse::<BackendKind>()
                .map_err(|_| AppError::invalid_backend(Some(s.as_str())))?,
            Some(other) => {
                return Err(AppError::invalid_backend(Some(other.to_string().as_str())));
            }
        };

        match kind {
            BackendKind::Embedded => {
                let uri = self
                    .embedded
                    .and_then(|e| e.uri)
                    .unwrap_or_else(|| DEFAULT_EMBEDDED_URI.to_string());
                Ok(AppConfig::embedded(EmbeddedSettings::new(uri)))
            }
            BackendKind::Managed => self
                .managed
                .unwrap_or_default()
                .validate()
                .map(AppConfig::managed),
        }
    }
}

impl RawManaged {
    fn validate(self) -> AppResult<ManagedSettings> {
        match (self.host, self.port, self.name, self.user, self.region) {
            (Some(host), Some(port), Some(database_name), Some(user), Some(region)) => {
                Ok(ManagedSettings {
                    host,
                    port,
                    database_name,
                    user,
                    region,
                    hostname_override: self.hostname_override,
                })
            }
            (host, port, name, user, region) => {
                let present = [
                    host.is_some(),
                    port.is_some(),
                    name.is_some(),
                    user.is_some(),
                    region.is_some(),
                ];
                let missing = MANAGED_REQUIRED_FIELDS
                    .iter()
                    .zip(present)
                    .filter(|(_, is_present)| !is_present)
                    .map(|(field, _)| *field)
                    .collect();
                Err(AppError::missing_required_fields(missing))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_MANAGED: &str = r#"
[database]
type = "managed"

[database.managed]
host = "test.rds.amazonaws.com"
port = 5432
name = "testdb"
user = "testuser"
region = "us-west-2"
"#;

    #[test]
    fn test_default_server_args() {
        let args = ServerArgs::default();
        assert_eq!(args.config, DEFAULT_CONFIG_PATH);
        assert_eq!(args.http_bind_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn test_backend_kind_from_str() {
        assert_eq!("embedded".parse::<BackendKind>().unwrap(), BackendKind::Embedded);
        assert_eq!("managed".parse::<BackendKind>().unwrap(), BackendKind::Managed);
        let err = "mysql".parse::<BackendKind>().unwrap_err();
        assert!(matches!(err, AppError::UnsupportedBackend { ref backend } if backend == "mysql"));
    }

    #[test]
    fn test_backend_kind_is_case_sensitive() {
        assert!("Managed".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_parse_full_managed() {
        let config = AppConfig::parse_toml(FULL_MANAGED).unwrap();
        assert_eq!(config.backend(), BackendKind::Managed);
        let DatabaseConfig::Managed(settings) = config.database else {
            panic!("expected managed settings");
        };
        assert_eq!(settings.host, "test.rds.amazonaws.com");
        assert_eq!(settings.port, 5432);
        assert_eq!(settings.database_name, "testdb");
        assert_eq!(settings.user, "testuser");
        assert_eq!(settings.region, "us-west-2");
        assert_eq!(settings.hostname_override, None);
    }

    #[test]
    fn test_embedded_without_table_uses_default_uri() {
        let config = AppConfig::parse_toml("[database]\ntype = \"embedded\"\n").unwrap();
        assert_eq!(config, AppConfig::embedded(EmbeddedSettings::default()));
    }

    #[test]
    fn test_embedded_ignores_managed_table() {
        let content = FULL_MANAGED.replace("type = \"managed\"", "type = \"embedded\"");
        let config = AppConfig::parse_toml(&content).unwrap();
        assert_eq!(config.backend(), BackendKind::Embedded);
    }

    #[test]
    fn test_missing_database_table_is_invalid_backend() {
        let err = AppConfig::parse_toml("").unwrap_err();
        assert!(matches!(err, AppError::InvalidBackend { ref value } if value == "<missing>"));
    }

    #[test]
    fn test_non_string_type_is_invalid_backend() {
        let err = AppConfig::parse_toml("[database]\ntype = 3\n").unwrap_err();
        assert!(matches!(err, AppError::InvalidBackend { ref value } if value == "3"));
    }

    #[test]
    fn test_managed_without_table_lists_all_fields() {
        let err = AppConfig::parse_toml("[database]\ntype = \"managed\"\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required managed database configuration fields: host, port, name, user, region"
        );
    }

    #[test]
    fn test_missing_fields_follow_canonical_order() {
        let content = r#"
[database]
type = "managed"

[database.managed]
region = "us-west-2"
name = "testdb"
"#;
        let err = AppConfig::parse_toml(content).unwrap_err();
        let AppError::MissingRequiredField { fields } = err else {
            panic!("expected MissingRequiredField, got {err:?}");
        };
        assert_eq!(fields, vec!["host", "port", "user"]);
    }

    #[test]
    fn test_port_with_wrong_type_is_parse_error() {
        let content = FULL_MANAGED.replace("port = 5432", "port = \"5432\"");
        let err = AppConfig::parse_toml(&content).unwrap_err();
        assert!(matches!(err, AppError::ConfigParse { .. }));
    }

    #[test]
    fn test_port_out_of_range_is_parse_error() {
        let content = FULL_MANAGED.replace("port = 5432", "port = 70000");
        assert!(matches!(
            AppConfig::parse_toml(&content),
            Err(AppError::ConfigParse { .. })
        ));
    }

    #[test]
    fn test_connection_host_prefers_override() {
        let settings = ManagedSettings::new("db.example.com", 5432, "app", "svc", "eu-west-1");
        assert_eq!(settings.connection_host(), "db.example.com");
        let settings = settings.with_hostname_override("localhost");
        assert_eq!(settings.connection_host(), "localhost");
        assert_eq!(settings.host, "db.example.com");
    }
}
