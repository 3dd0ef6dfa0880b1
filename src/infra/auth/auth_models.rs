use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::refresh_token::RefreshTokenAuth;
use super::service_account::ServiceAccountAuth;

pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Scopes requested for the Analytics and Search Console clients.
pub const ANALYTICS_SCOPES: [&str; 4] = [
    "https://www.googleapis.com/auth/analytics.readonly",
    "https://www.googleapis.com/auth/webmasters.readonly",
    "https://www.googleapis.com/auth/webmasters",
    "https://www.googleapis.com/auth/cloud-platform",
];

/// Tokens are refreshed this long before Google says they expire.
pub const REFRESH_MARGIN: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("could not read credentials: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid credentials JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("could not sign token request: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
    #[error("token request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("token exchange failed ({status}): {body}")]
    TokenExchange { status: u16, body: String },
    #[error("unsupported credentials type {0:?}")]
    UnsupportedType(String),
    #[error("system clock is before the Unix epoch")]
    Clock,
}

/// Anything that can hand out a bearer token for Google APIs.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, AuthError>;
}

#[async_trait]
impl AccessTokenProvider for Box<dyn AccessTokenProvider> {
    async fn access_token(&self) -> Result<String, AuthError> {
        (**self).access_token().await
    }
}

#[async_trait]
impl<T: AccessTokenProvider + ?Sized> AccessTokenProvider for Arc<T> {
    async fn access_token(&self) -> Result<String, AuthError> {
        (**self).access_token().await
    }
}

/// Token endpoint reply, shared by both grant types.
#[derive(Debug, Deserialize)]
pub(super) struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

pub(super) struct CachedToken {
    pub token: String,
    pub expires_at: SystemTime,
}

impl CachedToken {
    pub fn from_response(response: TokenResponse) -> Self {
        let lifetime = Duration::from_secs(response.expires_in).saturating_sub(REFRESH_MARGIN);
        Self {
            token: response.access_token,
            expires_at: SystemTime::now() + lifetime,
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.expires_at > SystemTime::now()
    }
}

pub(super) async fn exchange_token(
    client: &Client,
    token_uri: &str,
    form: &[(&str, &str)],
) -> Result<TokenResponse, AuthError> {
    let response = client.post(token_uri).form(form).send().await?;
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(AuthError::TokenExchange { status, body });
    }
    Ok(response.json().await?)
}

#[derive(Debug, Deserialize)]
struct CredentialsKind {
    #[serde(rename = "type")]
    kind: String,
}

/// Builds a token provider from a key file's JSON, dispatching on its `type`:
/// `service_account` keys or `authorized_user` refresh-token bundles.
pub fn provider_from_json(
    json: &str,
    client: Client,
) -> Result<Arc<dyn AccessTokenProvider>, AuthError> {
    let kind: CredentialsKind = serde_json::from_str(json)?;
    match kind.kind.as_str() {
        "service_account" => Ok(Arc::new(ServiceAccountAuth::from_json(json, client)?)),
        "authorized_user" => Ok(Arc::new(RefreshTokenAuth::from_json(json, client)?)),
        other => Err(AuthError::UnsupportedType(other.to_string())),
    }
}

pub async fn provider_from_file(
    path: &std::path::Path,
    client: Client,
) -> Result<Arc<dyn AccessTokenProvider>, AuthError> {
    let content = tokio::fs::read_to_string(path).await?;
    provider_from_json(&content, client)
}
