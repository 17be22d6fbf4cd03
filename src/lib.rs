//! Todo Service Library
//!
//! A small HTTP CRUD service for todos. Storage is either an embedded SQLite
//! file or an RDS PostgreSQL database authenticated with IAM tokens that are
//! minted fresh for every physical connection the pool opens.

pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod models;

pub use config::{AppConfig, ServerArgs};
pub use db::{ConnectionBootstrapper, DbPool, TodoStore};
pub use error::{AppError, AppResult};
