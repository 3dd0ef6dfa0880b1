use async_trait::async_trait;

use super::report_models::{Ga3Page, Ga4Page, GscPage};
use super::request_builders::{Ga3Request, Ga4Request, GscRequest};
use crate::core::table::Backend;

/// Transport or vendor failure, already sorted into the kinds the fetchers
/// care about.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("internal server error: {0}")]
    Internal(String),
    #[error("{0} identifier is not configured")]
    MissingIdentifier(Backend),
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("could not decode response: {0}")]
    Decode(String),
    #[error("authentication failed: {0}")]
    Auth(String),
}

impl ApiError {
    pub fn message(&self) -> String {
        match self {
            ApiError::PermissionDenied(m)
            | ApiError::ResourceExhausted(m)
            | ApiError::InvalidArgument(m)
            | ApiError::Internal(m)
            | ApiError::Transport(m)
            | ApiError::Decode(m)
            | ApiError::Auth(m) => m.clone(),
            ApiError::Http { message, .. } => message.clone(),
            ApiError::MissingIdentifier(_) => self.to_string(),
        }
    }
}

/// Analytics Reporting API v4.
#[async_trait]
pub trait Ga3Api: Send + Sync {
    async fn batch_get(&self, request: &Ga3Request) -> Result<Ga3Page, ApiError>;
}

/// Analytics Data API.
#[async_trait]
pub trait Ga4Api: Send + Sync {
    async fn run_report(&self, request: &Ga4Request) -> Result<Ga4Page, ApiError>;
}

/// Search Console search analytics and URL inspection.
#[async_trait]
pub trait GscApi: Send + Sync {
    /// `Ok(None)` when the API answered without a rows array.
    async fn query(&self, request: &GscRequest) -> Result<Option<GscPage>, ApiError>;

    async fn inspect_url(
        &self,
        site_url: &str,
        inspection_url: &str,
    ) -> Result<serde_json::Value, ApiError>;
}

// Trait objects forward to the boxed client so fetchers can hold either.
#[async_trait]
impl Ga3Api for Box<dyn Ga3Api> {
    async fn batch_get(&self, request: &Ga3Request) -> Result<Ga3Page, ApiError> {
        (**self).batch_get(request).await
    }
}

#[async_trait]
impl Ga4Api for Box<dyn Ga4Api> {
    async fn run_report(&self, request: &Ga4Request) -> Result<Ga4Page, ApiError> {
        (**self).run_report(request).await
    }
}

#[async_trait]
impl GscApi for Box<dyn GscApi> {
    async fn query(&self, request: &GscRequest) -> Result<Option<GscPage>, ApiError> {
        (**self).query(request).await
    }

    async fn inspect_url(
        &self,
        site_url: &str,
        inspection_url: &str,
    ) -> Result<serde_json::Value, ApiError> {
        (**self).inspect_url(site_url, inspection_url).await
    }
}
