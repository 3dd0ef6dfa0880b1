use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::google_http::GoogleHttp;
use crate::core::reports::{ApiError, GscApi, GscPage, GscRequest, GscRow};

const WEBMASTERS_URL: &str = "https://searchconsole.googleapis.com/webmasters/v3";
const INSPECT_URL: &str = "https://searchconsole.googleapis.com/v1/urlInspection/index:inspect";

/// Search Console search analytics and URL inspection.
#[derive(Clone)]
pub struct GscClient {
    http: GoogleHttp,
}

impl GscClient {
    pub fn new(http: GoogleHttp) -> Self {
        Self { http }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiSearchAnalytics {
    rows: Option<Vec<ApiRow>>,
    response_aggregation_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiRow {
    #[serde(default)]
    keys: Vec<String>,
    #[serde(default)]
    clicks: f64,
    #[serde(default)]
    impressions: f64,
    #[serde(default)]
    ctr: f64,
    #[serde(default)]
    position: f64,
}

fn page_from_response(response: ApiSearchAnalytics) -> Option<GscPage> {
    let rows = response.rows?;
    Some(GscPage {
        rows: rows
            .into_iter()
            .map(|r| GscRow {
                keys: r.keys,
                clicks: r.clicks,
                impressions: r.impressions,
                ctr: r.ctr,
                position: r.position,
            })
            .collect(),
        response_aggregation: response.response_aggregation_type,
    })
}

pub fn search_analytics_url(site_url: &str) -> String {
    format!(
        "{}/sites/{}/searchAnalytics/query",
        WEBMASTERS_URL,
        urlencoding::encode(site_url)
    )
}

#[async_trait]
impl GscApi for GscClient {
    async fn query(&self, request: &GscRequest) -> Result<Option<GscPage>, ApiError> {
        let response: ApiSearchAnalytics = self
            .http
            .post_json(&search_analytics_url(&request.site_url), &request.to_body(), &[])
            .await?;
        Ok(page_from_response(response))
    }

    async fn inspect_url(
        &self,
        site_url: &str,
        inspection_url: &str,
    ) -> Result<serde_json::Value, ApiError> {
        let body = json!({ "inspectionUrl": inspection_url, "siteUrl": site_url });
        self.http.post_json(INSPECT_URL, &body, &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_domain_properties() {
        assert_eq!(
            search_analytics_url("sc-domain:example.com"),
            "https://searchconsole.googleapis.com/webmasters/v3/sites/sc-domain%3Aexample.com/searchAnalytics/query"
        );
    }

    #[test]
    fn missing_rows_means_no_page() {
        let response: ApiSearchAnalytics =
            serde_json::from_str(r#"{"responseAggregationType": "byProperty"}"#).unwrap();
        assert_eq!(page_from_response(response), None);

        let response: ApiSearchAnalytics = serde_json::from_str(
            r#"{"rows": [{"keys": ["2024-01-01", "shoes"], "clicks": 3, "impressions": 40, "ctr": 0.075, "position": 4.2}],
                "responseAggregationType": "byPage"}"#,
        )
        .unwrap();
        let page = page_from_response(response).unwrap();
        assert_eq!(page.rows[0].keys, ["2024-01-01", "shoes"]);
        assert_eq!(page.rows[0].impressions, 40.0);
        assert_eq!(page.response_aggregation.as_deref(), Some("byPage"));
    }
}
