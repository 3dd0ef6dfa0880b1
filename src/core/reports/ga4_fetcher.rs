use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use super::report_api::{ApiError, Ga4Api};
use super::report_fetcher::{classify_terminal_error, ReportFetcher};
use super::report_models::{Ga4Page, Ga4Response, RawResponse};
use super::request_builders::{
    build_ga4_request, ga4_dimensions, ga4_metrics, Built, GA4_PAGE_SIZE, GA4_UNLIMITED_ROWS,
};
use super::retry_policy::RetryPolicy;
use crate::core::query::Query;
use crate::core::table::{Backend, ErrorTag, FetchError};

/// Offset/limit pagination over the GA4 Data API.
pub struct Ga4Fetcher<A: Ga4Api> {
    api: A,
    property_id: Option<String>,
    policy: RetryPolicy,
    raise_on_missing_id: bool,
}

impl<A: Ga4Api> Ga4Fetcher<A> {
    pub fn new(api: A, property_id: Option<String>) -> Self {
        Self {
            api,
            property_id,
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

    /// One page, retried on unclassified errors.
    async fn fetch_page(&self, query: &Query, offset: u64, size: u64) -> Result<Ga4Page, FetchError> {
        let request = match build_ga4_request(
            self.property_id.as_deref(),
            query,
            offset,
            size,
            self.raise_on_missing_id,
        ) {
            Ok(Built::Request(request)) => request,
            Ok(Built::MissingIdentifier) => {
                return Err(FetchError::new(
                    ErrorTag::MissingIdentifier,
                    "GA4 property id is not set",
                ))
            }
            Err(e) => return Err(FetchError::new(ErrorTag::MissingIdentifier, e.to_string())),
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.api.run_report(&request).await {
                Ok(page) => return Ok(page),
                Err(e) => {
                    if let Some(tag) = classify_terminal_error(&e) {
                        error!("GA4 request failed ({}): {}", tag, e);
                        return Err(FetchError::new(tag, e.message()));
                    }
                    if attempt >= self.policy.ga4_attempts {
                        error!("GA4 request failed after {} attempts: {}", attempt, e);
                        return Err(FetchError::new(ErrorTag::Other, e.to_string()));
                    }
                    warn!(
                        "GA4 request attempt {}/{} failed, retrying: {}",
                        attempt, self.policy.ga4_attempts, e
                    );
                }
            }
        }
    }
}

#[async_trait]
impl<A: Ga4Api> ReportFetcher for Ga4Fetcher<A> {
    fn backend(&self) -> Backend {
        Backend::Ga4
    }

    async fn fetch(&self, query: &Query) -> Result<RawResponse, ApiError> {
        if self.raise_on_missing_id {
            // Surface a missing id as an error before any paging.
            build_ga4_request(self.property_id.as_deref(), query, 0, 1, true)?;
        }

        let limit = query
            .row_limit()
            .filter(|l| *l > 0)
            .unwrap_or(GA4_UNLIMITED_ROWS);
        let request_size = limit.min(GA4_PAGE_SIZE);
        info!(
            "GA4 report for {} (limit {}, page size {})",
            query.date_range(),
            limit,
            request_size
        );

        let mut offset = 0u64;
        let mut pages: Vec<Ga4Page> = Vec::new();
        let mut failure: Option<FetchError> = None;

        loop {
            let size = request_size.min(limit - offset);
            let page = match self.fetch_page(query, offset, size).await {
                Ok(page) => page,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            };

            let fetched = page.rows.len() as u64;
            offset += fetched;
            debug!(
                "GA4 page {}: {} rows (offset {}, total {})",
                pages.len() + 1,
                fetched,
                offset,
                page.row_count
            );
            let total = page.row_count;
            pages.push(page);

            if offset >= limit || fetched == 0 || offset >= total {
                break;
            }
        }

        let row_count: usize = pages.iter().map(|p| p.rows.len()).sum();
        if row_count == 0 && failure.is_none() {
            failure = Some(FetchError::new(
                ErrorTag::EmptyResponse,
                "GA4 returned no rows",
            ));
        }

        let page_count = pages.len();
        let quota = pages.last().and_then(|p| p.quota.clone());
        let (dimension_headers, metric_headers, currency_code, time_zone) = match pages.first() {
            Some(first) => (
                first.dimension_headers.clone(),
                first.metric_headers.clone(),
                first.currency_code.clone(),
                first.time_zone.clone(),
            ),
            None => (ga4_dimensions(query), ga4_metrics(query), None, None),
        };
        let rows = pages.into_iter().flat_map(|p| p.rows).collect();

        Ok(RawResponse::Ga4(Ga4Response {
            dimension_headers,
            metric_headers,
            rows,
            row_count,
            pages: page_count,
            quota,
            currency_code,
            time_zone,
            date_range: query.date_range(),
            error: failure,
        }))
    }
}
