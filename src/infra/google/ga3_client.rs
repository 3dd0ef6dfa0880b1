use async_trait::async_trait;
use serde::Deserialize;

use super::google_http::GoogleHttp;
use crate::core::reports::{ApiError, Ga3Api, Ga3Page, Ga3Request, Ga3Row};

const BATCH_GET_URL: &str = "https://analyticsreporting.googleapis.com/v4/reports:batchGet";

/// Analytics Reporting API v4 (Universal Analytics views).
#[derive(Clone)]
pub struct Ga3Client {
    http: GoogleHttp,
}

impl Ga3Client {
    pub fn new(http: GoogleHttp) -> Self {
        Self { http }
    }
}

#[derive(Debug, Deserialize)]
struct ApiBatchGet {
    #[serde(default)]
    reports: Vec<ApiReport>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiReport {
    column_header: Option<ApiColumnHeader>,
    data: Option<ApiReportData>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiColumnHeader {
    #[serde(default)]
    dimensions: Vec<String>,
    metric_header: Option<ApiMetricHeader>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiMetricHeader {
    #[serde(default)]
    metric_header_entries: Vec<ApiMetricHeaderEntry>,
}

#[derive(Debug, Deserialize)]
struct ApiMetricHeaderEntry {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiReportData {
    rows: Option<Vec<ApiReportRow>>,
}

#[derive(Debug, Deserialize)]
struct ApiReportRow {
    #[serde(default)]
    dimensions: Vec<String>,
    #[serde(default)]
    metrics: Vec<ApiDateRangeValues>,
}

#[derive(Debug, Deserialize)]
struct ApiDateRangeValues {
    #[serde(default)]
    values: Vec<String>,
}

fn page_from_report(report: ApiReport) -> Ga3Page {
    let (dimension_headers, metric_headers) = match report.column_header {
        Some(header) => (
            header.dimensions,
            header
                .metric_header
                .map(|m| {
                    m.metric_header_entries
                        .into_iter()
                        .map(|e| e.name)
                        .collect::<Vec<String>>()
                })
                .unwrap_or_default(),
        ),
        None => (Vec::new(), Vec::new()),
    };
    let api_rows = report.data.and_then(|d| d.rows);
    let has_data = api_rows.is_some();
    let rows = api_rows
        .unwrap_or_default()
        .into_iter()
        .map(|row| Ga3Row {
            dimensions: row.dimensions,
            // Only one date range is ever requested.
            metrics: row
                .metrics
                .into_iter()
                .next()
                .map(|m| m.values)
                .unwrap_or_default(),
        })
        .collect();

    Ga3Page {
        dimension_headers,
        metric_headers,
        rows,
        next_page_token: report.next_page_token.filter(|t| !t.is_empty()),
        has_data,
    }
}

#[async_trait]
impl Ga3Api for Ga3Client {
    async fn batch_get(&self, request: &Ga3Request) -> Result<Ga3Page, ApiError> {
        let response: ApiBatchGet = self
            .http
            .post_json(BATCH_GET_URL, &request.to_body(), &[])
            .await?;
        let report = response
            .reports
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Decode("batchGet returned no reports".to_string()))?;
        Ok(page_from_report(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_report() {
        let body = r#"{"reports": [{
            "columnHeader": {
                "dimensions": ["ga:date", "ga:deviceCategory"],
                "metricHeader": {"metricHeaderEntries": [{"name": "ga:sessions", "type": "INTEGER"}]}
            },
            "data": {"rows": [
                {"dimensions": ["20240101", "mobile"], "metrics": [{"values": ["12"]}]}
            ], "rowCount": 1},
            "nextPageToken": "1"
        }]}"#;
        let batch: ApiBatchGet = serde_json::from_str(body).unwrap();
        let page = page_from_report(batch.reports.into_iter().next().unwrap());

        assert_eq!(page.dimension_headers, ["ga:date", "ga:deviceCategory"]);
        assert_eq!(page.metric_headers, ["ga:sessions"]);
        assert_eq!(page.rows[0].metrics, ["12"]);
        assert_eq!(page.next_page_token.as_deref(), Some("1"));
        assert!(page.has_data);
    }

    #[test]
    fn report_without_rows() {
        let body = r#"{"reports": [{"columnHeader": {"dimensions": ["ga:date"]}, "data": {"rowCount": 0}}]}"#;
        let batch: ApiBatchGet = serde_json::from_str(body).unwrap();
        let page = page_from_report(batch.reports.into_iter().next().unwrap());
        assert!(!page.has_data);
        assert!(page.rows.is_empty());
        assert_eq!(page.next_page_token, None);
    }
}
