//! Error types for the todo service.
//!
//! This module defines all error types using `thiserror`. Configuration and
//! credential errors are fail-fast: they abort startup or the connection
//! attempt that raised them and are never downgraded to warnings.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

/// Sentinel rendered in place of an absent `database.type` value.
pub const MISSING_VALUE: &str = "<missing>";

#[derive(Error, Debug, Clone)]
pub enum AppError {
    #[error("Config file not found: {path}")]
    ConfigNotFound { path: String },

    #[error("Failed to read config file {path}: {message}")]
    ConfigIo { path: String, message: String },

    #[error("Failed to parse config file {path}: {message}")]
    ConfigParse { path: String, message: String },

    #[error("Invalid database type: '{value}'. Must be either 'embedded' or 'managed'")]
    InvalidBackend { value: String },

    #[error("Missing required managed database configuration fields: {}", .fields.join(", "))]
    MissingRequiredField { fields: Vec<&'static str> },

    #[error("Unsupported database backend: '{backend}'")]
    UnsupportedBackend { backend: String },

    #[error("Failed to issue database credentials: {message}")]
    CredentialIssuance { message: String },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "23505" for unique violation
        sql_state: Option<String>,
    },

    #[error("Todo {id} not found")]
    TodoNotFound { id: i64 },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn config_io(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigIo {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn config_parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigParse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an invalid backend error; `None` renders as [`MISSING_VALUE`].
    pub fn invalid_backend(value: Option<&str>) -> Self {
        Self::InvalidBackend {
            value: value.unwrap_or(MISSING_VALUE).to_string(),
        }
    }

    pub fn missing_required_fields(fields: Vec<&'static str>) -> Self {
        Self::MissingRequiredField { fields }
    }

    pub fn unsupported_backend(backend: impl Into<String>) -> Self {
        Self::UnsupportedBackend {
            backend: backend.into(),
        }
    }

    /// Wrap whatever the identity service reported.
    pub fn credential_issuance(message: impl Into<String>) -> Self {
        Self::CredentialIssuance {
            message: message.into(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn database(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
        }
    }

    pub fn todo_not_found(id: i64) -> Self {
        Self::TodoNotFound { id }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// True for errors raised while resolving configuration at startup.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound { .. }
                | Self::ConfigIo { .. }
                | Self::ConfigParse { .. }
                | Self::InvalidBackend { .. }
                | Self::MissingRequiredField { .. }
        )
    }

    /// HTTP status used when this error reaches a route handler.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::TodoNotFound { .. } => StatusCode::NOT_FOUND,
            Self::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            Self::Connection { .. } | Self::CredentialIssuance { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convert sqlx errors to AppError.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => AppError::connection(
                msg.to_string(),
                "Check the connection string format",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                AppError::database(db_err.message(), code)
            }
            sqlx::Error::PoolTimedOut => AppError::connection(
                "Timed out acquiring a connection from the pool",
                "Check that the database is reachable",
            ),
            sqlx::Error::PoolClosed => {
                AppError::connection("Connection pool is closed", "Restart the service")
            }
            sqlx::Error::Io(io_err) => AppError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => AppError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => AppError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnDecode { index, source } => {
                AppError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => AppError::internal(format!("Decode error: {}", source)),
            _ => AppError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Unwrap bb8 failures. `User` errors pass through unchanged. `Pool::get`
/// reports a failed connect only as `TimedOut`; `ManagedPool::get` listens
/// for the underlying error itself.
impl From<bb8::RunError<AppError>> for AppError {
    fn from(err: bb8::RunError<AppError>) -> Self {
        match err {
            bb8::RunError::User(inner) => inner,
            bb8::RunError::TimedOut => AppError::connection(
                "Timed out waiting for a managed database connection",
                "Check database reachability and IAM permissions",
            ),
        }
    }
}

/// Result type alias used across the crate.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AppError::InvalidInput { message } => message.clone(),
            AppError::TodoNotFound { .. } => self.to_string(),
            _ => {
                error!(error = %self, "Request failed");
                self.to_string()
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
