use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::AuthConfig;
use crate::domain::UserId;

/// Identity resolved from a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: UserId,
    pub email: Option<String>,
}

/// Hosted identity provider. Sessions and password flows live there; this
/// service only validates access tokens and removes users.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Resolves an access token. `Ok(None)` means the token was rejected.
    async fn verify_token(&self, token: &str) -> Result<Option<AuthenticatedUser>>;

    async fn delete_user(&self, user_id: &UserId) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct SupabaseUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SupabaseAuthClient {
    client: Client,
    base_url: String,
    anon_key: String,
    service_role_key: String,
}

impl SupabaseAuthClient {
    pub fn new(config: &AuthConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent(concat!("Repurposely/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build auth HTTP client")?;

        Ok(Self {
            client,
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            service_role_key: config.service_role_key.clone(),
        })
    }
}

#[async_trait]
impl AuthProvider for SupabaseAuthClient {
    async fn verify_token(&self, token: &str) -> Result<Option<AuthenticatedUser>> {
        if self.base_url.is_empty() {
            bail!("Auth provider URL is not configured");
        }

        let url = format!("{}/auth/v1/user", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await
            .context("Failed to reach auth provider")?;

        let status = response.status();
        if matches!(
            status,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND
        ) {
            debug!(%status, "Access token rejected");
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Auth provider returned {status}: {body}");
        }

        let user: SupabaseUser = response
            .json()
            .await
            .context("Failed to parse auth provider user")?;

        Ok(Some(AuthenticatedUser {
            id: UserId::new(user.id),
            email: user.email,
        }))
    }

    async fn delete_user(&self, user_id: &UserId) -> Result<()> {
        if self.service_role_key.is_empty() {
            bail!("Service role key is not configured");
        }

        let url = format!("{}/auth/v1/admin/users/{}", self.base_url, user_id);
        let response = self
            .client
            .delete(&url)
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
            .send()
            .await
            .context("Failed to reach auth provider")?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            info!(%user_id, "Deleted user from auth provider");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            bail!("Auth provider refused user deletion: status={status}, body={body}")
        }
    }
}
