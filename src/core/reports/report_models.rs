use chrono::{DateTime, Utc};

use crate::core::query::DateRange;
use crate::core::table::{Backend, FetchError, PropertyQuota};

/// One GA3 row: dimension values and the first date range's metric values.
#[derive(Debug, Clone, PartialEq)]
pub struct Ga3Row {
    pub dimensions: Vec<String>,
    pub metrics: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ga3Page {
    /// Header names as sent by the API, `ga:` prefix included.
    pub dimension_headers: Vec<String>,
    pub metric_headers: Vec<String>,
    pub rows: Vec<Ga3Row>,
    pub next_page_token: Option<String>,
    /// `false` when the report came back without a rows array.
    pub has_data: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ga4Row {
    pub dimensions: Vec<String>,
    pub metrics: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ga4Page {
    pub dimension_headers: Vec<String>,
    pub metric_headers: Vec<String>,
    pub rows: Vec<Ga4Row>,
    /// Total rows matching the request across all pages.
    pub row_count: u64,
    pub quota: Option<PropertyQuota>,
    pub currency_code: Option<String>,
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GscRow {
    pub keys: Vec<String>,
    pub clicks: f64,
    pub impressions: f64,
    pub ctr: f64,
    pub position: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GscPage {
    pub rows: Vec<GscRow>,
    pub response_aggregation: Option<String>,
}

/// All GA3 pages of a query, concatenated.
#[derive(Debug, Clone, PartialEq)]
pub struct Ga3Response {
    pub dimension_headers: Vec<String>,
    pub metric_headers: Vec<String>,
    pub rows: Vec<Ga3Row>,
    pub pages: usize,
    pub date_range: DateRange,
    pub error: Option<FetchError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ga4Response {
    pub dimension_headers: Vec<String>,
    pub metric_headers: Vec<String>,
    pub rows: Vec<Ga4Row>,
    /// Summed across fetched pages.
    pub row_count: usize,
    pub pages: usize,
    /// Quota snapshot of the last page.
    pub quota: Option<PropertyQuota>,
    pub currency_code: Option<String>,
    pub time_zone: Option<String>,
    pub date_range: DateRange,
    pub error: Option<FetchError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GscResponse {
    pub dimensions: Vec<String>,
    pub rows: Vec<GscRow>,
    pub response_aggregation: Option<String>,
    pub date_range: DateRange,
    pub error: Option<FetchError>,
}

/// Result of inspecting one URL. The API body is kept as JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct UrlInspection {
    pub url: String,
    pub inspected_at: DateTime<Utc>,
    pub outcome: Result<serde_json::Value, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UrlInspectionResponse {
    pub inspections: Vec<UrlInspection>,
    pub date_range: DateRange,
    pub error: Option<FetchError>,
}

/// Vendor response handed from a fetcher to the normalizer.
#[derive(Debug, Clone, PartialEq)]
pub enum RawResponse {
    Ga3(Ga3Response),
    Ga4(Ga4Response),
    Gsc(GscResponse),
    UrlInspection(UrlInspectionResponse),
}

impl RawResponse {
    pub fn backend(&self) -> Backend {
        match self {
            RawResponse::Ga3(_) => Backend::Ga3,
            RawResponse::Ga4(_) => Backend::Ga4,
            RawResponse::Gsc(_) => Backend::Gsc,
            RawResponse::UrlInspection(_) => Backend::UrlInspection,
        }
    }

    pub fn error(&self) -> Option<&FetchError> {
        match self {
            RawResponse::Ga3(r) => r.error.as_ref(),
            RawResponse::Ga4(r) => r.error.as_ref(),
            RawResponse::Gsc(r) => r.error.as_ref(),
            RawResponse::UrlInspection(r) => r.error.as_ref(),
        }
    }

    pub fn row_count(&self) -> usize {
        match self {
            RawResponse::Ga3(r) => r.rows.len(),
            RawResponse::Ga4(r) => r.row_count,
            RawResponse::Gsc(r) => r.rows.len(),
            RawResponse::UrlInspection(r) => r.inspections.len(),
        }
    }
}

/// Outcome of a cheap health probe against one backend.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiStatus {
    Success,
    MissingIdentifier,
    Failed { tag: String, message: Option<String> },
}

impl ApiStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ApiStatus::Success)
    }
}

impl std::fmt::Display for ApiStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiStatus::Success => f.write_str("success"),
            ApiStatus::MissingIdentifier => f.write_str("missing identifier"),
            ApiStatus::Failed { tag, message } => match message {
                Some(m) => write!(f, "{} ({})", tag, m),
                None => f.write_str(tag),
            },
        }
    }
}
