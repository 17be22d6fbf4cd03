//! IAM-authenticated PostgreSQL connections.
//!
//! [`IamConnectionManager`] is handed to the `bb8` pool as its connection
//! factory. bb8 calls [`connect`](bb8::ManageConnection::connect) only when it
//! opens a new physical connection, so that is where the password is minted:
//! every new socket gets its own freshly issued token, while checkouts of
//! already-open connections never touch the credential provider.
//!
//! bb8 does not hand `connect` errors back to the caller of `Pool::get`, so
//! the manager also publishes each failed attempt on a broadcast channel that
//! [`ManagedPool`](crate::db::ManagedPool) listens on while it waits.

use crate::config::ManagedSettings;
use crate::db::credentials::CredentialProvider;
use crate::error::{AppError, AppResult};
use sqlx::Connection;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error};
use url::Url;

/// Capacity of the connect failure channel. Receivers only need the latest.
const FAILURE_CHANNEL_CAPACITY: usize = 16;

/// URL scheme of managed connection strings.
pub const MANAGED_URI_SCHEME: &str = "postgresql";

/// Build the password-less connection URI for a managed database.
///
/// The URI targets `hostname_override` when set, otherwise `host`. It never
/// carries a password or the region: the password is injected per connection.
pub fn build_uri(settings: &ManagedSettings) -> AppResult<String> {
    let base = format!("{}://{}", MANAGED_URI_SCHEME, settings.connection_host());
    let mut url = Url::parse(&base).map_err(|e| {
        AppError::connection(
            format!("Invalid managed database host '{}': {}", settings.connection_host(), e),
            "Check host and hostname_override in [database.managed]",
        )
    })?;

    let invalid = |what: &str| {
        AppError::connection(
            format!("Managed database URI cannot carry {}", what),
            "Check host and hostname_override in [database.managed]",
        )
    };
    url.set_username(&settings.user)
        .map_err(|_| invalid("a user"))?;
    url.set_port(Some(settings.port))
        .map_err(|_| invalid("a port"))?;
    url.path_segments_mut()
        .map_err(|_| invalid("a database name"))?
        .push(&settings.database_name);

    Ok(url.to_string())
}

/// bb8 connection manager that injects a fresh IAM token before each connect.
///
/// Holds shared, immutable state and the failure channel sender. Concurrent
/// `connect` calls run independently, each awaiting its own provider call.
pub struct IamConnectionManager {
    settings: Arc<ManagedSettings>,
    base_options: Arc<PgConnectOptions>,
    credentials: Arc<dyn CredentialProvider>,
    failures: broadcast::Sender<AppError>,
}

impl IamConnectionManager {
    /// Create a manager for `settings`, resolving tokens through `credentials`.
    pub fn new(
        settings: Arc<ManagedSettings>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> AppResult<Self> {
        let uri = build_uri(&settings)?;
        let base_options = PgConnectOptions::from_str(&uri).map_err(|e| {
            AppError::connection(
                format!("Invalid managed database URI: {}", e),
                "Check the [database.managed] settings",
            )
        })?;

        let (failures, _) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);
        Ok(Self {
            settings,
            base_options: Arc::new(base_options),
            credentials,
            failures,
        })
    }

    /// Sender side of the connect failure channel.
    pub fn failures(&self) -> broadcast::Sender<AppError> {
        self.failures.clone()
    }

    /// Connection options without a password.
    pub fn base_options(&self) -> &PgConnectOptions {
        &self.base_options
    }

    pub fn settings(&self) -> &ManagedSettings {
        &self.settings
    }

    /// The pre-connect hook: issue a token and return options carrying it as
    /// the password for exactly one connection attempt.
    pub async fn prepare_connect_options(&self) -> AppResult<PgConnectOptions> {
        let token = self.credentials.get_token(&self.settings).await?;
        Ok(self.base_options.as_ref().clone().password(&token))
    }

    async fn open(&self) -> AppResult<PgConnection> {
        let options = self.prepare_connect_options().await?;

        debug!(
            target_host = %self.settings.connection_host(),
            port = self.settings.port,
            database = %self.settings.database_name,
            "Opening managed database connection"
        );

        PgConnection::connect_with(&options)
            .await
            .map_err(AppError::from)
    }
}

impl std::fmt::Debug for IamConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IamConnectionManager")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl bb8::ManageConnection for IamConnectionManager {
    type Connection = PgConnection;
    type Error = AppError;

    async fn connect(&self) -> Result<PgConnection, AppError> {
        let result = self.open().await;
        if let Err(e) = &result {
            // No receivers just means nobody is waiting on a checkout.
            let _ = self.failures.send(e.clone());
        }
        result
    }

    async fn is_valid(&self, conn: &mut PgConnection) -> Result<(), AppError> {
        conn.ping().await.map_err(AppError::from)
    }

    // sqlx exposes no cheap liveness flag; broken connections are caught by
    // the `is_valid` ping that `test_on_check_out` runs.
    fn has_broken(&self, _conn: &mut PgConnection) -> bool {
        false
    }
}

/// Logs connection errors bb8 would otherwise drop.
#[derive(Debug, Clone, Copy)]
pub struct LoggingErrorSink;

impl bb8::ErrorSink<AppError> for LoggingErrorSink {
    fn sink(&self, err: AppError) {
        error!(error = %err, "Managed database connection error");
    }

    fn boxed_clone(&self) -> Box<dyn bb8::ErrorSink<AppError>> {
        Box::new(*self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StaticToken;

    #[async_trait]
    impl CredentialProvider for StaticToken {
        async fn get_token(&self, _settings: &ManagedSettings) -> AppResult<String> {
            Ok("token".to_string())
        }
    }

    fn rds_settings() -> ManagedSettings {
        ManagedSettings::new(
            "test.rds.amazonaws.com",
            5432,
            "testdb",
            "testuser",
            "us-west-2",
        )
    }

    #[test]
    fn test_build_uri_basic() {
        let uri = build_uri(&rds_settings()).unwrap();
        assert_eq!(uri, "postgresql://testuser@test.rds.amazonaws.com:5432/testdb");
    }

    #[test]
    fn test_build_uri_with_hostname_override() {
        let settings = rds_settings().with_hostname_override("localhost");
        let uri = build_uri(&settings).unwrap();
        assert_eq!(uri, "postgresql://testuser@localhost:5432/testdb");
    }

    #[test]
    fn test_build_uri_with_custom_port() {
        let mut settings = rds_settings();
        settings.port = 3306;
        assert_eq!(
            build_uri(&settings).unwrap(),
            "postgresql://testuser@test.rds.amazonaws.com:3306/testdb"
        );
    }

    #[test]
    fn test_build_uri_different_regions() {
        for region in ["us-east-1", "eu-west-1", "ap-southeast-1"] {
            let settings = ManagedSettings::new(
                format!("test.{region}.rds.amazonaws.com"),
                5432,
                "testdb",
                "testuser",
                region,
            );
            let uri = build_uri(&settings).unwrap();
            assert_eq!(
                uri,
                format!("postgresql://testuser@test.{region}.rds.amazonaws.com:5432/testdb")
            );
        }
    }

    #[test]
    fn test_build_uri_encodes_reserved_user_characters() {
        let mut settings = rds_settings();
        settings.user = "app@svc".to_string();
        let uri = build_uri(&settings).unwrap();
        assert_eq!(uri, "postgresql://app%40svc@test.rds.amazonaws.com:5432/testdb");
    }

    #[test]
    fn test_base_options_target_connection_host() {
        let settings = Arc::new(rds_settings().with_hostname_override("localhost"));
        let manager = IamConnectionManager::new(settings, Arc::new(StaticToken)).unwrap();
        assert_eq!(manager.base_options().get_host(), "localhost");
        assert_eq!(manager.base_options().get_port(), 5432);
        assert_eq!(manager.base_options().get_username(), "testuser");
        assert_eq!(manager.base_options().get_database(), Some("testdb"));
        assert_eq!(manager.settings().host, "test.rds.amazonaws.com");
    }
}
