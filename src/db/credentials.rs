//! Short-lived database credentials.
//!
//! A [`CredentialProvider`] turns managed-database settings into an
//! authentication token. Providers are called once per physical connection
//! and must not cache tokens; freshness is the caller's policy.

use crate::config::ManagedSettings;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_rds::auth_token::{AuthTokenGenerator, Config as AuthTokenConfig};
use aws_sdk_rds::config::Region;
use tracing::{debug, info};

/// Source of per-connection database passwords.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Issue a fresh token scoped to `host`, `port`, `user` and `region`.
    ///
    /// `hostname_override` is a routing detail and never part of the scope.
    async fn get_token(&self, settings: &ManagedSettings) -> AppResult<String>;
}

/// AWS RDS IAM authentication tokens.
///
/// The SDK configuration (credential chain, region) is resolved once; each
/// [`get_token`](CredentialProvider::get_token) call presigns a new
/// `rds-db:connect` token valid for 15 minutes.
#[derive(Debug, Clone)]
pub struct RdsIamTokenProvider {
    sdk_config: SdkConfig,
}

impl RdsIamTokenProvider {
    /// Resolve AWS credentials from the default provider chain for `region`.
    pub async fn from_env(region: &str) -> Self {
        info!(region = %region, "Loading AWS configuration for RDS IAM authentication");
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        Self { sdk_config }
    }

    pub fn with_sdk_config(sdk_config: SdkConfig) -> Self {
        Self { sdk_config }
    }
}

#[async_trait]
impl CredentialProvider for RdsIamTokenProvider {
    async fn get_token(&self, settings: &ManagedSettings) -> AppResult<String> {
        info!(
            user = %settings.user,
            host = %settings.host,
            port = settings.port,
            region = %settings.region,
            "Generating IAM token"
        );

        let config = AuthTokenConfig::builder()
            .hostname(&settings.host)
            .port(u64::from(settings.port))
            .username(&settings.user)
            .region(Region::new(settings.region.clone()))
            .build()
            .map_err(|e| AppError::credential_issuance(e.to_string()))?;

        let token = AuthTokenGenerator::new(config)
            .auth_token(&self.sdk_config)
            .await
            .map_err(|e| AppError::credential_issuance(e.to_string()))?;

        debug!(user = %settings.user, host = %settings.host, "IAM token generated");
        Ok(token.as_str().to_string())
    }
}
