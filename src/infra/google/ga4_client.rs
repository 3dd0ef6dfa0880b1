use async_trait::async_trait;
use serde::Deserialize;

use super::google_http::GoogleHttp;
use crate::core::reports::{ApiError, Ga4Api, Ga4Page, Ga4Request, Ga4Row};
use crate::core::table::PropertyQuota;

const DATA_API_URL: &str = "https://analyticsdata.googleapis.com/v1beta";

/// Analytics Data API `runReport`.
#[derive(Clone)]
pub struct Ga4Client {
    http: GoogleHttp,
}

impl Ga4Client {
    pub fn new(http: GoogleHttp) -> Self {
        Self { http }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiRunReport {
    #[serde(default)]
    dimension_headers: Vec<ApiHeader>,
    #[serde(default)]
    metric_headers: Vec<ApiHeader>,
    #[serde(default)]
    rows: Vec<ApiRow>,
    #[serde(default)]
    row_count: u64,
    metadata: Option<ApiMetadata>,
    property_quota: Option<PropertyQuota>,
}

#[derive(Debug, Deserialize)]
struct ApiHeader {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiRow {
    #[serde(default)]
    dimension_values: Vec<ApiCell>,
    #[serde(default)]
    metric_values: Vec<ApiCell>,
}

#[derive(Debug, Deserialize)]
struct ApiCell {
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiMetadata {
    currency_code: Option<String>,
    time_zone: Option<String>,
}

impl From<ApiRunReport> for Ga4Page {
    fn from(report: ApiRunReport) -> Self {
        let (currency_code, time_zone) = report
            .metadata
            .map(|m| (m.currency_code, m.time_zone))
            .unwrap_or_default();
        Ga4Page {
            dimension_headers: report.dimension_headers.into_iter().map(|h| h.name).collect(),
            metric_headers: report.metric_headers.into_iter().map(|h| h.name).collect(),
            rows: report
                .rows
                .into_iter()
                .map(|row| Ga4Row {
                    dimensions: row.dimension_values.into_iter().map(|c| c.value).collect(),
                    metrics: row.metric_values.into_iter().map(|c| c.value).collect(),
                })
                .collect(),
            row_count: report.row_count,
            quota: report.property_quota,
            currency_code,
            time_zone,
        }
    }
}

#[async_trait]
impl Ga4Api for Ga4Client {
    async fn run_report(&self, request: &Ga4Request) -> Result<Ga4Page, ApiError> {
        let url = format!("{}/{}:runReport", DATA_API_URL, request.property);
        let report: ApiRunReport = self.http.post_json(&url, &request.to_body(), &[]).await?;
        Ok(report.into())
    }
}
