use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

use super::auth_models::{
    exchange_token, AccessTokenProvider, AuthError, CachedToken, GOOGLE_TOKEN_URI,
};

/// OAuth client credentials plus a long-lived refresh token, as found in an
/// `authorized_user` key file or a google-ads.yaml.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshTokenCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

pub struct RefreshTokenAuth {
    credentials: RefreshTokenCredentials,
    client: Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl RefreshTokenAuth {
    pub fn new(credentials: RefreshTokenCredentials, client: Client) -> Self {
        Self {
            credentials,
            client,
            cached_token: Arc::new(RwLock::new(None)),
        }
    }

    pub fn from_json(json: &str, client: Client) -> Result<Self, AuthError> {
        Ok(Self::new(serde_json::from_str(json)?, client))
    }
}

#[async_trait]
impl AccessTokenProvider for RefreshTokenAuth {
    async fn access_token(&self) -> Result<String, AuthError> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
                return Ok(token.token.clone());
            }
        }

        debug!("Refreshing OAuth token for client {}", self.credentials.client_id);
        let response = exchange_token(
            &self.client,
            &self.credentials.token_uri,
            &[
                ("grant_type", "refresh_token"),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("refresh_token", self.credentials.refresh_token.as_str()),
            ],
        )
        .await?;

        let token = CachedToken::from_response(response);
        let access_token = token.token.clone();
        *self.cached_token.write().await = Some(token);
        Ok(access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_uri_defaults() {
        let auth = RefreshTokenAuth::from_json(
            r#"{"client_id": "id", "client_secret": "s", "refresh_token": "r"}"#,
            Client::new(),
        )
        .unwrap();
        assert_eq!(auth.credentials.token_uri, GOOGLE_TOKEN_URI);
    }

    #[test]
    fn requires_refresh_token() {
        let err = RefreshTokenAuth::from_json(r#"{"client_id": "id", "client_secret": "s"}"#, Client::new());
        assert!(matches!(err, Err(AuthError::Json(_))));
    }
}
