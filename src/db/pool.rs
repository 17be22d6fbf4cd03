//! Connection pool bootstrap.
//!
//! [`ConnectionBootstrapper`] turns a validated [`AppConfig`] into a [`DbPool`]:
//! a plain `SqlitePool` for the embedded backend, or a `bb8` pool driven by
//! [`IamConnectionManager`] for the managed backend.

use crate::config::{AppConfig, BackendKind, DatabaseConfig, EmbeddedSettings, ManagedSettings};
use crate::db::credentials::{CredentialProvider, RdsIamTokenProvider};
use crate::db::iam::{IamConnectionManager, LoggingErrorSink};
use crate::error::{AppError, AppResult};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::info;

/// Recycle window for managed connections. Shorter than the 15 minute token
/// TTL so no connection outlives its credentials by much even without the hook.
pub const MANAGED_MAX_LIFETIME: Duration = Duration::from_secs(900);
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 30;

/// Pool of managed PostgreSQL connections.
///
/// Checkouts fail with the error of the connection attempt made on their
/// behalf, e.g. `CredentialIssuance` when no token could be issued, instead
/// of waiting out the connection timeout.
#[derive(Clone)]
pub struct ManagedPool {
    pool: bb8::Pool<IamConnectionManager>,
    failures: broadcast::Sender<AppError>,
}

impl ManagedPool {
    /// Check out a connection, opening one through the IAM hook if none is idle.
    pub async fn get(&self) -> AppResult<bb8::PooledConnection<'_, IamConnectionManager>> {
        // Subscribe before `get` so a failure from the attempt it spawns is seen.
        let mut failures = self.failures.subscribe();
        tokio::select! {
            conn = self.pool.get() => Ok(conn?),
            Ok(err) = failures.recv() => Err(err),
        }
    }

    pub fn state(&self) -> bb8::State {
        self.pool.state()
    }
}

/// Pooled connection factory for the selected backend.
#[derive(Clone)]
pub enum DbPool {
    Embedded(SqlitePool),
    Managed(ManagedPool),
}

impl DbPool {
    pub fn backend(&self) -> BackendKind {
        match self {
            DbPool::Embedded(_) => BackendKind::Embedded,
            DbPool::Managed(_) => BackendKind::Managed,
        }
    }

    /// Close the embedded pool. The managed pool has no close; its
    /// connections are dropped with the last pool handle.
    pub async fn close(&self) {
        match self {
            DbPool::Embedded(pool) => {
                info!("Closing embedded database connections");
                pool.close().await;
            }
            DbPool::Managed(pool) => {
                let state = pool.state();
                info!(
                    connections = state.connections,
                    idle = state.idle_connections,
                    "Releasing managed pool handle"
                );
            }
        }
    }
}

impl std::fmt::Debug for DbPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DbPool::Embedded(pool) => f.debug_tuple("Embedded").field(pool).finish(),
            DbPool::Managed(pool) => f
                .debug_struct("Managed")
                .field("connections", &pool.state().connections)
                .finish(),
        }
    }
}

/// Builds the pooled connection factory for a configuration.
pub struct ConnectionBootstrapper;

impl ConnectionBootstrapper {
    /// Build the pool, using AWS RDS IAM tokens for the managed backend.
    ///
    /// The AWS SDK is only initialised when the managed backend is selected.
    pub async fn build(config: &AppConfig) -> AppResult<DbPool> {
        match &config.database {
            DatabaseConfig::Embedded(settings) => Self::build_embedded(settings).await,
            DatabaseConfig::Managed(settings) => {
                let provider = RdsIamTokenProvider::from_env(&settings.region).await;
                Self::build_managed(settings, Arc::new(provider)).await
            }
        }
    }

    /// Build the pool with an explicit credential provider.
    ///
    /// The provider is only consulted by the managed backend.
    pub async fn build_with_provider(
        config: &AppConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> AppResult<DbPool> {
        match &config.database {
            DatabaseConfig::Embedded(settings) => Self::build_embedded(settings).await,
            DatabaseConfig::Managed(settings) => Self::build_managed(settings, credentials).await,
        }
    }

    async fn build_embedded(settings: &EmbeddedSettings) -> AppResult<DbPool> {
        let scheme = settings
            .uri
            .split_once(':')
            .map(|(scheme, _)| scheme)
            .unwrap_or(&settings.uri);
        if !scheme.eq_ignore_ascii_case("sqlite") {
            return Err(AppError::unsupported_backend(scheme));
        }

        info!(uri = %settings.uri, "Opening embedded database");

        let options = SqliteConnectOptions::from_str(&settings.uri)
            .map_err(|e| {
                AppError::connection(
                    format!("Invalid SQLite connection string: {}", e),
                    "Check the connection URL format: sqlite:path/to/db.sqlite",
                )
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| {
                AppError::connection(
                    format!("Failed to open embedded database: {}", e),
                    "Verify the file path exists and is writable",
                )
            })?;
        Ok(DbPool::Embedded(pool))
    }

    async fn build_managed(
        settings: &ManagedSettings,
        credentials: Arc<dyn CredentialProvider>,
    ) -> AppResult<DbPool> {
        let manager = IamConnectionManager::new(Arc::new(settings.clone()), credentials)?;
        let failures = manager.failures();

        info!(
            host = %settings.host,
            target_host = %settings.connection_host(),
            port = settings.port,
            database = %settings.database_name,
            user = %settings.user,
            max_lifetime_secs = MANAGED_MAX_LIFETIME.as_secs(),
            "Configuring managed database pool with IAM authentication"
        );

        // No idle minimum: the pool opens nothing until first checkout.
        // A failed connect is not retried; the next checkout mints a new token.
        let pool = bb8::Pool::builder()
            .max_size(DEFAULT_MAX_CONNECTIONS)
            .test_on_check_out(true)
            .max_lifetime(Some(MANAGED_MAX_LIFETIME))
            .connection_timeout(Duration::from_secs(DEFAULT_CONNECTION_TIMEOUT_SECS))
            .retry_connection(false)
            .error_sink(Box::new(LoggingErrorSink))
            .build(manager)
            .await?;
        Ok(DbPool::Managed(ManagedPool { pool, failures }))
    }
}
