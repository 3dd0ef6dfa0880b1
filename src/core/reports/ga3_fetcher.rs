use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use super::report_api::{ApiError, Ga3Api};
use super::report_fetcher::{classify_http_error, ReportFetcher};
use super::report_models::{Ga3Response, RawResponse};
use super::request_builders::{build_ga3_request, ga3_dimensions, ga3_metrics, Built};
use super::retry_policy::RetryPolicy;
use crate::core::query::Query;
use crate::core::table::{Backend, ErrorTag, FetchError};

/// Follows GA3 page tokens until the API stops returning one.
pub struct Ga3Fetcher<A: Ga3Api> {
    api: A,
    view_id: Option<String>,
    policy: RetryPolicy,
    raise_on_missing_id: bool,
}

impl<A: Ga3Api> Ga3Fetcher<A> {
    pub fn new(api: A, view_id: Option<String>) -> Self {
        Self {
            api,
            view_id,
            policy: RetryPolicy::default(),
            raise_on_missing_id: false,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn raise_on_missing_id(mut self, raise: bool) -> Self {
        self.raise_on_missing_id = raise;
        self
    }
}

#[async_trait]
impl<A: Ga3Api> ReportFetcher for Ga3Fetcher<A> {
    fn backend(&self) -> Backend {
        Backend::Ga3
    }

    async fn fetch(&self, query: &Query) -> Result<RawResponse, ApiError> {
        info!(
            "GA3 report for {} ({} dimensions, {} metrics)",
            query.date_range(),
            query.dimensions().len(),
            query.metrics().len()
        );

        let mut dimension_headers = Vec::new();
        let mut metric_headers = Vec::new();
        let mut rows = Vec::new();
        let mut pages = 0;
        let mut page_token: Option<String> = None;
        let mut failure: Option<FetchError> = None;

        loop {
            let request = match build_ga3_request(
                self.view_id.as_deref(),
                query,
                page_token.take(),
                self.raise_on_missing_id,
            )? {
                Built::Request(request) => request,
                Built::MissingIdentifier => {
                    failure = Some(FetchError::new(
                        ErrorTag::MissingIdentifier,
                        "GA3 view id is not set",
                    ));
                    break;
                }
            };

            match self.api.batch_get(&request).await {
                Ok(page) => {
                    pages += 1;
                    debug!("GA3 page {}: {} rows", pages, page.rows.len());
                    if dimension_headers.is_empty() && metric_headers.is_empty() {
                        dimension_headers = page.dimension_headers;
                        metric_headers = page.metric_headers;
                    }
                    rows.extend(page.rows);
                    page_token = page.next_page_token.filter(|_| page.has_data);
                }
                Err(e) => {
                    let tag = classify_http_error(&e);
                    error!("GA3 request failed ({}): {}", tag, e);
                    failure = Some(FetchError::new(tag, e.message()));
                    break;
                }
            }

            if page_token.is_none() {
                break;
            }
            if pages >= self.policy.ga3_max_pages {
                warn!(
                    "GA3 paging stopped after {} pages with a page token still pending",
                    pages
                );
                break;
            }
        }

        if rows.is_empty() && failure.is_none() {
            failure = Some(FetchError::new(
                ErrorTag::EmptyResponse,
                "GA3 returned no rows",
            ));
        }
        if dimension_headers.is_empty() && metric_headers.is_empty() {
            dimension_headers = ga3_dimensions(query);
            metric_headers = ga3_metrics(query);
        }

        Ok(RawResponse::Ga3(Ga3Response {
            dimension_headers,
            metric_headers,
            rows,
            pages,
            date_range: query.date_range(),
            error: failure,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reports::report_models::{Ga3Page, Ga3Row};
    use crate::core::reports::request_builders::Ga3Request;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    struct PagedGa3 {
        pages: usize,
        endless: bool,
        seen_tokens: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl Ga3Api for PagedGa3 {
        async fn batch_get(&self, request: &Ga3Request) -> Result<Ga3Page, ApiError> {
            let mut seen = self.seen_tokens.lock().unwrap();
            seen.push(request.page_token.clone());
            let index = seen.len();
            let next = if self.endless || index < self.pages {
                Some(format!("{}", index * 2))
            } else {
                None
            };
            Ok(Ga3Page {
                dimension_headers: vec!["ga:date".into()],
                metric_headers: vec!["ga:sessions".into()],
                rows: vec![
                    Ga3Row {
                        dimensions: vec![format!("202401{:02}", index)],
                        metrics: vec!["1".into()],
                    },
                    Ga3Row {
                        dimensions: vec![format!("202402{:02}", index)],
                        metrics: vec!["2".into()],
                    },
                ],
                next_page_token: next,
                has_data: true,
            })
        }
    }

    struct FailingGa3(ApiError);

    #[async_trait]
    impl Ga3Api for FailingGa3 {
        async fn batch_get(&self, _: &Ga3Request) -> Result<Ga3Page, ApiError> {
            Err(self.0.clone())
        }
    }

    fn query() -> Query {
        let day = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
        Query::new_as_of(day(1), day(28), day(28))
            .unwrap()
            .with_dimensions(["date"])
            .with_metrics(["sessions"])
    }

    #[tokio::test]
    async fn follows_page_tokens() {
        let api = PagedGa3 {
            pages: 3,
            endless: false,
            seen_tokens: Mutex::new(Vec::new()),
        };
        let fetcher = Ga3Fetcher::new(api, Some("123".into()));
        let RawResponse::Ga3(response) = fetcher.fetch(&query()).await.unwrap() else {
            panic!("expected a GA3 response");
        };

        assert_eq!(response.pages, 3);
        assert_eq!(response.rows.len(), 6);
        assert!(response.error.is_none());
        let tokens = fetcher.api.seen_tokens.lock().unwrap().clone();
        assert_eq!(tokens, vec![None, Some("2".into()), Some("4".into())]);
    }

    #[tokio::test]
    async fn page_guard_stops_endless_tokens() {
        let api = PagedGa3 {
            pages: 0,
            endless: true,
            seen_tokens: Mutex::new(Vec::new()),
        };
        let fetcher = Ga3Fetcher::new(api, Some("123".into()))
            .with_policy(RetryPolicy::default().with_ga3_max_pages(5));
        let response = fetcher.fetch(&query()).await.unwrap();
        let RawResponse::Ga3(response) = response else {
            panic!("expected a GA3 response");
        };
        assert_eq!(response.pages, 5);
    }

    #[tokio::test]
    async fn permission_errors_are_tagged() {
        let fetcher = Ga3Fetcher::new(
            FailingGa3(ApiError::Http {
                status: 403,
                message: "User does not have sufficient permissions for this profile.".into(),
            }),
            Some("123".into()),
        );
        let response = fetcher.fetch(&query()).await.unwrap();
        assert_eq!(
            response.error().map(|e| e.tag),
            Some(ErrorTag::InsufficientPermissions)
        );
        let RawResponse::Ga3(response) = response else {
            panic!("expected a GA3 response");
        };
        assert_eq!(response.dimension_headers, ["ga:date"]);
    }

    #[tokio::test]
    async fn missing_view_id_marks_or_raises() {
        let fetcher = Ga3Fetcher::new(FailingGa3(ApiError::Internal("unused".into())), None);
        let response = fetcher.fetch(&query()).await.unwrap();
        assert_eq!(
            response.error().map(|e| e.tag),
            Some(ErrorTag::MissingIdentifier)
        );

        let raising = Ga3Fetcher::new(FailingGa3(ApiError::Internal("unused".into())), None)
            .raise_on_missing_id(true);
        assert_eq!(
            raising.fetch(&query()).await.unwrap_err(),
            ApiError::MissingIdentifier(Backend::Ga3)
        );
    }
}
