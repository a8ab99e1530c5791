//! OAuth access tokens
//!
//! Verifying or minting credentials is not this crate's job. A token is
//! either handed in directly or borrowed from the `gcloud` CLI.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::process::Command;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::errors::DeployError;
use crate::utils::sha256_hash;

/// Environment variable holding a ready-made access token
pub const ACCESS_TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// Token provider trait for testability
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// A bearer token valid for the next request
    async fn access_token(&self) -> Result<SecretString, DeployError>;

    /// Stable identifier of the underlying credential
    fn credential_id(&self) -> String;
}

/// A fixed token supplied by the caller
pub struct StaticToken {
    token: SecretString,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::from(token.into()),
        }
    }

    /// Read the token from [`ACCESS_TOKEN_ENV`]
    pub fn from_env() -> Option<Self> {
        std::env::var(ACCESS_TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .map(|t| Self::new(t.trim().to_string()))
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<SecretString, DeployError> {
        Ok(SecretString::from(self.token.expose_secret().to_string()))
    }

    fn credential_id(&self) -> String {
        let digest = sha256_hash(self.token.expose_secret().as_bytes());
        format!("static:{}", &digest[..16])
    }
}

struct CachedToken {
    token: SecretString,
    fetched_at: Instant,
}

/// Token printed by `gcloud auth print-access-token`, cached for `ttl`
pub struct GcloudToken {
    account: Option<String>,
    ttl: Duration,
    cached: RwLock<Option<CachedToken>>,
}

impl GcloudToken {
    pub fn new(account: Option<String>) -> Self {
        Self {
            account,
            // gcloud tokens live for an hour
            ttl: Duration::from_secs(45 * 60),
            cached: RwLock::new(None),
        }
    }

    async fn fetch(&self) -> Result<SecretString, DeployError> {
        info!("Fetching access token from gcloud...");

        let mut command = Command::new("gcloud");
        command.args(["auth", "print-access-token"]);
        if let Some(account) = &self.account {
            command.arg(account);
        }

        let output = command
            .output()
            .await
            .map_err(|e| DeployError::Auth(format!("Failed to run gcloud: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DeployError::Auth(format!(
                "gcloud auth print-access-token failed: {}",
                stderr.trim()
            )));
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(DeployError::Auth("gcloud returned an empty token".to_string()));
        }
        Ok(SecretString::from(token))
    }
}

#[async_trait]
impl TokenProvider for GcloudToken {
    async fn access_token(&self) -> Result<SecretString, DeployError> {
        {
            let cached = self.cached.read().await;
            if let Some(cached) = cached.as_ref() {
                if cached.fetched_at.elapsed() < self.ttl {
                    return Ok(SecretString::from(cached.token.expose_secret().to_string()));
                }
                debug!("Cached gcloud token expired");
            }
        }

        let token = self.fetch().await?;
        let mut cached = self.cached.write().await;
        *cached = Some(CachedToken {
            token: SecretString::from(token.expose_secret().to_string()),
            fetched_at: Instant::now(),
        });
        Ok(token)
    }

    fn credential_id(&self) -> String {
        match &self.account {
            Some(account) => format!("gcloud:{}", account),
            None => "gcloud:default".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token() {
        let provider = StaticToken::new("ya29.token");
        let token = provider.access_token().await.unwrap();
        assert_eq!(token.expose_secret(), "ya29.token");

        let id = provider.credential_id();
        assert!(id.starts_with("static:"));
        assert!(!id.contains("ya29"));
        assert_eq!(id, StaticToken::new("ya29.token").credential_id());
        assert_ne!(id, StaticToken::new("other").credential_id());
    }

    #[test]
    fn test_gcloud_credential_id() {
        assert_eq!(GcloudToken::new(None).credential_id(), "gcloud:default");
        assert_eq!(
            GcloudToken::new(Some("me@example.com".to_string())).credential_id(),
            "gcloud:me@example.com"
        );
    }
}
