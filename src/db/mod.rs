//! Database layer.
//!
//! - `credentials`: short-lived token issuance for the managed backend
//! - `iam`: password-less connection URI and the per-connection token hook
//! - `pool`: backend dispatch and pool construction
//! - `todos`: CRUD persistence for the todo resource

pub mod credentials;
pub mod iam;
pub mod pool;
pub mod todos;

pub use credentials::{CredentialProvider, RdsIamTokenProvider};
pub use iam::{IamConnectionManager, build_uri};
pub use pool::{ConnectionBootstrapper, DbPool, MANAGED_MAX_LIFETIME, ManagedPool};
pub use todos::TodoStore;
