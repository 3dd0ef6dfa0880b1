use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::report_api::{ApiError, GscApi};
use super::report_fetcher::{classify_http_error, ReportFetcher};
use super::report_models::{GscResponse, RawResponse, UrlInspection, UrlInspectionResponse};
use super::request_builders::{
    build_gsc_request, gsc_dimensions, Built, GSC_DEFAULT_ROW_LIMIT, GSC_PAGE_SIZE,
};
use crate::core::query::Query;
use crate::core::table::{Backend, ErrorTag, FetchError};

/// Search analytics, paged by `startRow`.
pub struct GscFetcher<A: GscApi> {
    api: A,
    site_url: Option<String>,
    raise_on_missing_id: bool,
}

impl<A: GscApi> GscFetcher<A> {
    pub fn new(api: A, site_url: Option<String>) -> Self {
        Self {
            api,
            site_url,
            raise_on_missing_id: false,
        }
    }

    pub fn raise_on_missing_id(mut self, raise: bool) -> Self {
        self.raise_on_missing_id = raise;
        self
    }
}

#[async_trait]
impl<A: GscApi> ReportFetcher for GscFetcher<A> {
    fn backend(&self) -> Backend {
        Backend::Gsc
    }

    async fn fetch(&self, query: &Query) -> Result<RawResponse, ApiError> {
        let row_limit = query
            .row_limit()
            .filter(|l| *l > 0)
            .unwrap_or(GSC_DEFAULT_ROW_LIMIT);
        let dimensions = gsc_dimensions(query);
        info!(
            "Search Console report for {} ({:?}, limit {})",
            query.date_range(),
            dimensions,
            row_limit
        );

        let mut rows = Vec::new();
        let mut response_aggregation = None;
        let mut failure = None;
        let mut start_row = 0u64;

        while start_row < row_limit {
            let size = (row_limit - start_row).min(GSC_PAGE_SIZE);
            let request = match build_gsc_request(
                self.site_url.as_deref(),
                query,
                start_row,
                size,
                self.raise_on_missing_id,
            )? {
                Built::Request(request) => request,
                Built::MissingIdentifier => {
                    failure = Some(FetchError::new(
                        ErrorTag::MissingIdentifier,
                        "Search Console site url is not set",
                    ));
                    break;
                }
            };

            match self.api.query(&request).await {
                Ok(Some(page)) => {
                    let fetched = page.rows.len() as u64;
                    debug!("Search Console rows {}..{}", start_row, start_row + fetched);
                    if response_aggregation.is_none() {
                        response_aggregation = page.response_aggregation;
                    }
                    rows.extend(page.rows);
                    start_row += fetched;
                    if fetched < size {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    let tag = classify_http_error(&e);
                    error!("Search Console request failed ({}): {}", tag, e);
                    failure = Some(FetchError::new(tag, e.message()));
                    break;
                }
            }
        }

        if rows.is_empty() && failure.is_none() {
            failure = Some(FetchError::new(
                ErrorTag::EmptyResponse,
                "Search Console returned no rows",
            ));
        }

        Ok(RawResponse::Gsc(GscResponse {
            dimensions,
            rows,
            response_aggregation,
            date_range: query.date_range(),
            error: failure,
        }))
    }
}

/// Inspects every URL on the query, one call per URL.
pub struct UrlInspectionFetcher<A: GscApi> {
    api: A,
    site_url: Option<String>,
    raise_on_missing_id: bool,
}

impl<A: GscApi> UrlInspectionFetcher<A> {
    pub fn new(api: A, site_url: Option<String>) -> Self {
        Self {
            api,
            site_url,
            raise_on_missing_id: false,
        }
    }

    pub fn raise_on_missing_id(mut self, raise: bool) -> Self {
        self.raise_on_missing_id = raise;
        self
    }
}

#[async_trait]
impl<A: GscApi> ReportFetcher for UrlInspectionFetcher<A> {
    fn backend(&self) -> Backend {
        Backend::UrlInspection
    }

    async fn fetch(&self, query: &Query) -> Result<RawResponse, ApiError> {
        let site_url = self
            .site_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let Some(site_url) = site_url else {
            if self.raise_on_missing_id {
                return Err(ApiError::MissingIdentifier(Backend::UrlInspection));
            }
            warn!("URL inspection skipped: Search Console site url is not set");
            return Ok(RawResponse::UrlInspection(UrlInspectionResponse {
                inspections: Vec::new(),
                date_range: query.date_range(),
                error: Some(FetchError::new(
                    ErrorTag::MissingIdentifier,
                    "Search Console site url is not set",
                )),
            }));
        };

        info!("Inspecting {} urls on {}", query.urls().len(), site_url);
        let mut inspections = Vec::with_capacity(query.urls().len());
        for url in query.urls() {
            let outcome = match self.api.inspect_url(site_url, url).await {
                Ok(body) => Ok(body),
                Err(e) => {
                    warn!("URL inspection failed for {}: {}", url, e);
                    Err(e.message())
                }
            };
            inspections.push(UrlInspection {
                url: url.clone(),
                inspected_at: Utc::now(),
                outcome,
            });
        }

        let error = if inspections.is_empty() {
            Some(FetchError::new(ErrorTag::EmptyResponse, "no urls to inspect"))
        } else {
            None
        };

        Ok(RawResponse::UrlInspection(UrlInspectionResponse {
            inspections,
            date_range: query.date_range(),
            error,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::normalize::normalize;
    use crate::core::reports::report_models::{GscPage, GscRow};
    use crate::core::reports::request_builders::GscRequest;
    use crate::core::table::{Table, Value};
    use chrono::NaiveDate;
    use serde_json::json;
    use std::sync::Mutex;

    struct MockGsc {
        total: u64,
        requests: Mutex<Vec<(u64, u64)>>,
        failure: Option<ApiError>,
    }

    impl MockGsc {
        fn with_rows(total: u64) -> Self {
            Self {
                total,
                requests: Mutex::new(Vec::new()),
                failure: None,
            }
        }
    }

    #[async_trait]
    impl GscApi for MockGsc {
        async fn query(&self, request: &GscRequest) -> Result<Option<GscPage>, ApiError> {
            self.requests
                .lock()
                .unwrap()
                .push((request.start_row, request.row_limit));
            if let Some(e) = &self.failure {
                return Err(e.clone());
            }
            let count = self
                .total
                .saturating_sub(request.start_row)
                .min(request.row_limit);
            if count == 0 {
                return Ok(None);
            }
            let rows = (0..count)
                .map(|i| GscRow {
                    keys: vec![format!("query {}", request.start_row + i)],
                    clicks: 1.0,
                    impressions: 10.0,
                    ctr: 0.1,
                    position: 3.0,
                })
                .collect();
            Ok(Some(GscPage {
                rows,
                response_aggregation: Some("byProperty".into()),
            }))
        }

        async fn inspect_url(
            &self,
            _site_url: &str,
            inspection_url: &str,
        ) -> Result<serde_json::Value, ApiError> {
            if inspection_url.ends_with("/missing") {
                return Err(ApiError::InvalidArgument("URL not in property".into()));
            }
            Ok(json!({
                "inspectionResult": {
                    "indexStatusResult": {
                        "verdict": "PASS",
                        "coverageState": "Submitted and indexed",
                        "lastCrawlTime": "2024-04-01T10:00:00Z",
                        "sitemap": ["https://example.com/sitemap.xml"]
                    },
                    "mobileUsabilityResult": { "verdict": "PASS" }
                }
            }))
        }
    }

    fn query() -> Query {
        let day = |d| NaiveDate::from_ymd_opt(2024, 4, d).unwrap();
        Query::new_as_of(day(1), day(7), day(10))
            .unwrap()
            .with_dimensions(["query"])
    }

    #[tokio::test]
    async fn pages_until_short_page() {
        let fetcher = GscFetcher::new(MockGsc::with_rows(60_000), Some("sc-domain:example.com".into()));
        let raw = fetcher.fetch(&query()).await.unwrap();
        assert_eq!(raw.row_count(), 60_000);
        assert!(raw.error().is_none());
        let requests = fetcher.api.requests.lock().unwrap().clone();
        assert_eq!(
            requests,
            vec![(0, 25_000), (25_000, 25_000), (50_000, 25_000)]
        );
    }

    #[tokio::test]
    async fn row_limit_bounds_paging() {
        let fetcher = GscFetcher::new(MockGsc::with_rows(60_000), Some("sc-domain:example.com".into()));
        let raw = fetcher.fetch(&query().with_row_limit(30_000)).await.unwrap();
        assert_eq!(raw.row_count(), 30_000);
        let requests = fetcher.api.requests.lock().unwrap().clone();
        assert_eq!(requests, vec![(0, 25_000), (25_000, 5_000)]);
    }

    #[tokio::test]
    async fn exact_multiple_stops_on_missing_rows() {
        let fetcher = GscFetcher::new(MockGsc::with_rows(25_000), Some("sc-domain:example.com".into()));
        let raw = fetcher.fetch(&query()).await.unwrap();
        assert_eq!(raw.row_count(), 25_000);
        assert_eq!(fetcher.api.requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_and_failed_reports_are_tagged() {
        let fetcher = GscFetcher::new(MockGsc::with_rows(0), Some("sc-domain:example.com".into()));
        let table = normalize(fetcher.fetch(&query()).await.unwrap());
        assert_eq!(table.error_tag(), Some(ErrorTag::EmptyResponse));

        let failing = GscFetcher::new(
            MockGsc {
                failure: Some(ApiError::Http {
                    status: 403,
                    message: "User does not have sufficient permissions for site".into(),
                }),
                ..MockGsc::with_rows(10)
            },
            Some("sc-domain:example.com".into()),
        );
        let raw = failing.fetch(&query()).await.unwrap();
        assert_eq!(
            raw.error().map(|e| e.tag),
            Some(ErrorTag::InsufficientPermissions)
        );
    }

    #[tokio::test]
    async fn inspection_rows_capture_per_url_errors() {
        let fetcher = UrlInspectionFetcher::new(MockGsc::with_rows(0), Some("https://example.com/".into()));
        let q = query().with_urls(["https://example.com/a", "https://example.com/missing"]);
        let table = normalize(fetcher.fetch(&q).await.unwrap());

        assert_eq!(table.len(), 2);
        assert_eq!(table.error_tag(), None);
        assert_eq!(table.rows[0]["response"], Value::from("success"));
        assert_eq!(table.rows[0]["index_status_result_verdict"], Value::from("PASS"));
        assert_eq!(
            table.rows[0]["sitemap"],
            Value::List(vec!["https://example.com/sitemap.xml".into()])
        );
        assert_eq!(table.rows[1]["response"], Value::from("URL not in property"));
        assert_eq!(Table::value(&table.rows[1], "coverage_state"), &Value::Null);
    }

    #[tokio::test]
    async fn inspection_without_site_url() {
        let fetcher = UrlInspectionFetcher::new(MockGsc::with_rows(0), None);
        let q = query().with_urls(["https://example.com/a"]);
        let raw = fetcher.fetch(&q).await.unwrap();
        assert_eq!(raw.error().map(|e| e.tag), Some(ErrorTag::MissingIdentifier));

        let raising = UrlInspectionFetcher::new(MockGsc::with_rows(0), None).raise_on_missing_id(true);
        assert!(raising.fetch(&q).await.is_err());
    }
}
