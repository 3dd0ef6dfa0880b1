use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use super::auth_models::{
    exchange_token, AccessTokenProvider, AuthError, CachedToken, ANALYTICS_SCOPES,
    GOOGLE_TOKEN_URI,
};

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: u64 = 3600;

/// The parts of a service-account key file used for the JWT exchange.
#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountCredentials {
    client_email: String,
    /// PEM.
    private_key: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

#[derive(Debug, Serialize)]
struct JwtClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: u64,
    exp: u64,
}

/// OAuth2 JWT-bearer flow for a service account, with the token cached
/// until shortly before it expires.
pub struct ServiceAccountAuth {
    credentials: ServiceAccountCredentials,
    scopes: Vec<String>,
    client: Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl ServiceAccountAuth {
    pub fn from_json(json: &str, client: Client) -> Result<Self, AuthError> {
        let credentials: ServiceAccountCredentials = serde_json::from_str(json)?;
        Ok(Self {
            credentials,
            scopes: ANALYTICS_SCOPES.iter().map(|s| s.to_string()).collect(),
            client,
            cached_token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn client_email(&self) -> &str {
        &self.credentials.client_email
    }

    fn claims(&self, now: u64) -> JwtClaims {
        JwtClaims {
            iss: self.credentials.client_email.clone(),
            scope: self.scopes.join(" "),
            aud: self.credentials.token_uri.clone(),
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        }
    }

    fn signed_assertion(&self) -> Result<String, AuthError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| AuthError::Clock)?
            .as_secs();
        let key = EncodingKey::from_rsa_pem(self.credentials.private_key.as_bytes())?;
        Ok(encode(&Header::new(Algorithm::RS256), &self.claims(now), &key)?)
    }
}

#[async_trait]
impl AccessTokenProvider for ServiceAccountAuth {
    async fn access_token(&self) -> Result<String, AuthError> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
                return Ok(token.token.clone());
            }
        }

        debug!("Exchanging JWT for {}", self.credentials.client_email);
        let assertion = self.signed_assertion()?;
        let response = exchange_token(
            &self.client,
            &self.credentials.token_uri,
            &[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())],
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

    const KEY_JSON: &str = r#"{
        "type": "service_account",
        "client_email": "reporter@project.iam.gserviceaccount.com",
        "private_key": "not a pem"
    }"#;

    #[test]
    fn claims_cover_all_scopes() {
        let auth = ServiceAccountAuth::from_json(KEY_JSON, Client::new()).unwrap();
        assert_eq!(auth.client_email(), "reporter@project.iam.gserviceaccount.com");

        let claims = auth.claims(1_000);
        assert_eq!(claims.aud, GOOGLE_TOKEN_URI);
        assert_eq!(claims.exp, 4_600);
        assert_eq!(claims.scope.split(' ').count(), 4);
        assert!(claims
            .scope
            .contains("https://www.googleapis.com/auth/analytics.readonly"));
    }

    #[test]
    fn custom_scopes() {
        let auth = ServiceAccountAuth::from_json(KEY_JSON, Client::new())
            .unwrap()
            .with_scopes(["https://www.googleapis.com/auth/adwords"]);
        assert_eq!(auth.claims(0).scope, "https://www.googleapis.com/auth/adwords");
    }

    #[tokio::test]
    async fn bad_key_fails_to_sign() {
        let auth = ServiceAccountAuth::from_json(KEY_JSON, Client::new()).unwrap();
        assert!(matches!(auth.access_token().await, Err(AuthError::Signing(_))));
    }
}
