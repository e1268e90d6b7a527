//! Bearer-token providers for Microsoft Graph and Dataverse.
//!
//! Token acquisition is opaque to the rest of the crate: callers ask for a
//! token for a scope and get a string back or an [`AppError::Auth`].

use crate::http;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tally_core::config::AuthSettings;
use tally_core::{AppConfig, AppError, AppResult};
use tokio::sync::Mutex;

const AUTHORITY: &str = "https://login.microsoftonline.com";

/// Tokens are refreshed this long before they expire.
const EXPIRY_MARGIN_SECS: i64 = 120;

/// Source of bearer tokens.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Return a bearer token valid for `scope` (e.g. `https://graph.microsoft.com/.default`).
    async fn get_token(&self, scope: &str) -> AppResult<String>;
}

/// A pre-issued token, used as-is for every scope.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticTokenProvider {
    async fn get_token(&self, _scope: &str) -> AppResult<String> {
        Ok(self.token.clone())
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// OAuth2 client-credentials grant against Microsoft Entra ID.
///
/// Tokens are cached per scope until shortly before expiry.
pub struct ClientCredentialsProvider {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    cache: Mutex<HashMap<String, CachedToken>>,
}

impl ClientCredentialsProvider {
    pub fn new(
        tenant_id: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self::with_authority(AUTHORITY, tenant_id, client_id, client_secret)
    }

    /// Use a non-default authority host.
    pub fn with_authority(
        authority: &str,
        tenant_id: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http: http::client(),
            token_url: format!(
                "{}/{}/oauth2/v2.0/token",
                authority.trim_end_matches('/'),
                tenant_id
            ),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    async fn request_token(&self, scope: &str) -> AppResult<CachedToken> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", scope),
        ];

        let body = http::send_json(self.http.post(&self.token_url).form(&form), "token request")
            .await
            .map_err(|e| match e {
                // The token endpoint answers bad credentials with 400
                AppError::Backend(msg) | AppError::NotFound(msg) => AppError::Auth(msg),
                other => other,
            })?;

        let token: TokenResponse = serde_json::from_value(body)
            .map_err(|e| AppError::Auth(format!("Malformed token response: {}", e)))?;

        let lifetime = token.expires_in.unwrap_or(3600);
        Ok(CachedToken {
            value: token.access_token,
            expires_at: Utc::now() + Duration::seconds(lifetime - EXPIRY_MARGIN_SECS),
        })
    }
}

#[async_trait]
impl CredentialProvider for ClientCredentialsProvider {
    async fn get_token(&self, scope: &str) -> AppResult<String> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.get(scope) {
            if cached.expires_at > Utc::now() {
                return Ok(cached.value.clone());
            }
        }

        tracing::debug!(scope, "Requesting access token");
        let token = self.request_token(scope).await?;
        let value = token.value.clone();
        cache.insert(scope.to_string(), token);
        Ok(value)
    }
}

/// Pick a credential provider from the auth settings.
///
/// A configured `tokenEnv` wins; otherwise tenant, client id and the client
/// secret variable must all be present.
pub fn credentials_from_config(config: &AppConfig) -> AppResult<Arc<dyn CredentialProvider>> {
    let auth: &AuthSettings = &config.auth;

    if let Some(ref token_env) = auth.token_env {
        let token = AppConfig::resolve_secret(token_env).ok_or_else(|| {
            AppError::Auth(format!("Environment variable {} is not set", token_env))
        })?;
        return Ok(Arc::new(StaticTokenProvider::new(token)));
    }

    let tenant_id = auth
        .tenant_id
        .as_deref()
        .ok_or_else(|| AppError::Config("auth.tenantId is required".to_string()))?;
    let client_id = auth
        .client_id
        .as_deref()
        .ok_or_else(|| AppError::Config("auth.clientId is required".to_string()))?;
    let secret = AppConfig::resolve_secret(&auth.client_secret_env).ok_or_else(|| {
        AppError::Auth(format!(
            "Environment variable {} is not set",
            auth.client_secret_env
        ))
    })?;

    Ok(Arc::new(ClientCredentialsProvider::new(
        tenant_id, client_id, secret,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token_ignores_scope() {
        let provider = StaticTokenProvider::new("abc");
        assert_eq!(provider.get_token("scope-a").await.unwrap(), "abc");
        assert_eq!(provider.get_token("scope-b").await.unwrap(), "abc");
    }

    #[test]
    fn test_token_url_includes_tenant() {
        let provider =
            ClientCredentialsProvider::with_authority("https://login.example.com/", "contoso", "id", "secret");
        assert_eq!(
            provider.token_url,
            "https://login.example.com/contoso/oauth2/v2.0/token"
        );
    }

    #[test]
    fn test_missing_client_settings_is_config_error() {
        let config = AppConfig::default();
        let result = credentials_from_config(&config);
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
