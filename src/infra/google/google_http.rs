use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::core::reports::ApiError;
use crate::infra::auth::AccessTokenProvider;

pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Shared reqwest client with JSON defaults.
pub fn build_http_client(timeout: Duration) -> Result<Client, ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert("Accept", HeaderValue::from_static("application/json"));
    headers.insert(
        "User-Agent",
        HeaderValue::from_static(concat!("googalytics/", env!("CARGO_PKG_VERSION"))),
    );
    Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .map_err(|e| ApiError::Transport(e.to_string()))
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Maps a Google error reply onto [`ApiError`]. The `status` string decides
/// when present; otherwise the HTTP code does.
pub fn api_error(status: u16, body: &str) -> ApiError {
    let (message, kind) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => (envelope.error.message, envelope.error.status),
        Err(_) => (body.trim().to_string(), None),
    };
    match kind.as_deref() {
        Some("PERMISSION_DENIED") => ApiError::PermissionDenied(message),
        Some("RESOURCE_EXHAUSTED") => ApiError::ResourceExhausted(message),
        Some("INVALID_ARGUMENT") => ApiError::InvalidArgument(message),
        Some("INTERNAL") => ApiError::Internal(message),
        Some("UNAUTHENTICATED") => ApiError::Auth(message),
        _ => match status {
            400 => ApiError::InvalidArgument(message),
            401 => ApiError::Auth(message),
            403 => ApiError::PermissionDenied(message),
            429 => ApiError::ResourceExhausted(message),
            500 => ApiError::Internal(message),
            _ => ApiError::Http { status, message },
        },
    }
}

/// Authenticated JSON POSTs against Google REST endpoints.
#[derive(Clone)]
pub struct GoogleHttp {
    client: Client,
    auth: Arc<dyn AccessTokenProvider>,
}

impl GoogleHttp {
    pub fn new(client: Client, auth: Arc<dyn AccessTokenProvider>) -> Self {
        Self { client, auth }
    }

    pub async fn post_json<T: DeserializeOwned>(
        &self,
        url: &str,
        body: &serde_json::Value,
        extra_headers: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let token = self
            .auth
            .access_token()
            .await
            .map_err(|e| ApiError::Auth(e.to_string()))?;

        let mut request = self.client.post(url).bearer_auth(token).json(body);
        for (name, value) in extra_headers {
            request = request.header(*name, *value);
        }
        debug!("POST {}", url);
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        if !status.is_success() {
            let error = api_error(status.as_u16(), &text);
            warn!("{} returned {}: {}", url, status, error);
            return Err(error);
        }
        serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
    }
}
