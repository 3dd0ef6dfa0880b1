use std::collections::HashMap;

use chrono::{Duration, NaiveDate, Utc};
use tracing::{debug, info, warn};

use super::report_api::ApiError;
use super::report_fetcher::ReportFetcher;
use super::report_models::ApiStatus;
use super::request_builders::{
    ga3_dimensions, ga3_metrics, ga4_dimensions, ga4_metrics, GA_MAX_METRICS_PER_REQUEST,
};
use crate::core::normalize::{empty_analytics_table, normalize};
use crate::core::query::{Query, QueryError, ReportKind, ReportOptions};
use crate::core::table::derived_columns::{
    add_analytics_boolean_columns, add_search_console_boolean_columns,
};
use crate::core::table::{
    fill_missing_metrics, join_on_dimensions, Backend, ErrorTag, FetchError, JoinHow, Table,
    TableError,
};

/// Analytics backends keep roughly four years of daily data.
pub const ANALYTICS_LOOKBACK_DAYS: i64 = 1500;
/// Search Console keeps sixteen months.
pub const SEARCH_CONSOLE_LOOKBACK_DAYS: i64 = 500;
const STATUS_PROBE_DAYS: i64 = 7;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("{tag}: {message}")]
    Fetch { tag: ErrorTag, message: String },
    #[error("no {0} client is configured")]
    NotConfigured(Backend),
    #[error("{0} reports have no record dates")]
    NoRecordDates(ReportKind),
}

impl ReportError {
    fn from_fetch(error: &FetchError) -> Self {
        ReportError::Fetch {
            tag: error.tag,
            message: error.message.clone(),
        }
    }
}

/// Single entry point for tables from any backend.
#[derive(Default)]
pub struct ReportService {
    fetchers: HashMap<Backend, Box<dyn ReportFetcher>>,
}

impl ReportService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fetcher under the backend it reports. A later fetcher for
    /// the same backend replaces the earlier one.
    pub fn with_fetcher(mut self, fetcher: Box<dyn ReportFetcher>) -> Self {
        self.fetchers.insert(fetcher.backend(), fetcher);
        self
    }

    pub fn has_backend(&self, backend: Backend) -> bool {
        self.fetchers.contains_key(&backend)
    }

    fn fetcher(&self, backend: Backend) -> Result<&dyn ReportFetcher, ReportError> {
        self.fetchers
            .get(&backend)
            .map(|f| f.as_ref())
            .ok_or(ReportError::NotConfigured(backend))
    }

    /// Fetches, normalizes and post-processes one report.
    pub async fn get_table(
        &self,
        kind: ReportKind,
        query: &Query,
        options: &ReportOptions,
    ) -> Result<Table, ReportError> {
        info!("{} report requested for {}", kind, query.date_range());
        match kind {
            ReportKind::Ga3 => self.analytics_table(Backend::Ga3, query, options).await,
            ReportKind::Ga4 => self.analytics_table(Backend::Ga4, query, options).await,
            ReportKind::Gsc => self.search_console_table(query, options).await,
            ReportKind::GscQueries => {
                let query = query.clone().with_dimensions(["query"]);
                self.search_console_table(&query, options).await
            }
            ReportKind::UrlInspection => self.url_inspection_table(query).await,
        }
    }

    async fn analytics_table(
        &self,
        backend: Backend,
        query: &Query,
        options: &ReportOptions,
    ) -> Result<Table, ReportError> {
        let fetcher = self.fetcher(backend)?;
        let (dimensions, metrics) = match backend {
            Backend::Ga3 => (ga3_dimensions(query), ga3_metrics(query)),
            _ => (ga4_dimensions(query), ga4_metrics(query)),
        };

        let chunks: Vec<Query> = metrics
            .chunks(GA_MAX_METRICS_PER_REQUEST)
            .map(|chunk| query.clone().with_metrics(chunk.iter().cloned()))
            .collect();
        debug!("{} metrics split into {} requests", metrics.len(), chunks.len());

        let mut tables = Vec::with_capacity(chunks.len());
        let mut breaking: Option<FetchError> = None;
        for chunk in &chunks {
            let raw = fetcher.fetch(chunk).await?;
            if let Some(error) = raw.error() {
                breaking = Some(error.clone());
                break;
            }
            tables.push(normalize(raw));
        }

        if let Some(error) = &breaking {
            if options.raise_errors && error.tag.is_failure() {
                return Err(ReportError::from_fetch(error));
            }
            warn!("{} report stopped early: {} ({})", backend, error.tag, error.message);
        }

        let mut table = match breaking {
            Some(error) => empty_analytics_table(
                backend,
                &dimensions,
                &metrics,
                query.date_range(),
                Some(&error),
            ),
            None => {
                let mut tables = tables.into_iter();
                match tables.next() {
                    Some(first) => tables.try_fold(first, |joined, next| {
                        join_on_dimensions(joined, next, JoinHow::Outer)
                    })?,
                    None => empty_analytics_table(
                        backend,
                        &dimensions,
                        &metrics,
                        query.date_range(),
                        None,
                    ),
                }
            }
        };

        if options.add_boolean_metrics {
            table = add_analytics_boolean_columns(table);
        }
        if options.fill_missing_metrics {
            table = fill_missing_metrics(table);
        }
        info!("{} report: {} rows", backend, table.len());
        Ok(table)
    }

    async fn search_console_table(
        &self,
        query: &Query,
        options: &ReportOptions,
    ) -> Result<Table, ReportError> {
        let raw = self.fetcher(Backend::Gsc)?.fetch(query).await?;
        if let Some(error) = raw.error() {
            if options.raise_errors && error.tag.is_failure() {
                return Err(ReportError::from_fetch(error));
            }
        }

        let mut table = normalize(raw);
        if options.add_boolean_metrics {
            table = add_search_console_boolean_columns(table);
        }
        info!("Search Console report: {} rows", table.len());
        Ok(table)
    }

    async fn url_inspection_table(&self, query: &Query) -> Result<Table, ReportError> {
        let raw = self.fetcher(Backend::UrlInspection)?.fetch(query).await?;
        Ok(normalize(raw))
    }

    /// Probes a backend with a cheap query over the last week.
    pub async fn api_status(&self, kind: ReportKind) -> ApiStatus {
        self.api_status_as_of(kind, Utc::now().date_naive()).await
    }

    pub async fn api_status_as_of(&self, kind: ReportKind, today: NaiveDate) -> ApiStatus {
        let backend = match kind {
            ReportKind::Ga3 => Backend::Ga3,
            ReportKind::Ga4 => Backend::Ga4,
            _ => Backend::Gsc,
        };
        let Ok(fetcher) = self.fetcher(backend) else {
            return ApiStatus::MissingIdentifier;
        };
        let query = match Query::new_as_of(today - Duration::days(STATUS_PROBE_DAYS), today, today) {
            Ok(query) => query.with_row_limit(10),
            Err(e) => {
                return ApiStatus::Failed {
                    tag: ErrorTag::Other.to_string(),
                    message: Some(e.to_string()),
                }
            }
        };

        let status = match fetcher.fetch(&query).await {
            Ok(raw) => match raw.error() {
                None => ApiStatus::Success,
                Some(e) if e.tag == ErrorTag::EmptyResponse => ApiStatus::Success,
                Some(e) if e.tag == ErrorTag::MissingIdentifier => ApiStatus::MissingIdentifier,
                Some(e) => ApiStatus::Failed {
                    tag: e.tag.to_string(),
                    message: Some(e.message.clone()),
                },
            },
            Err(ApiError::MissingIdentifier(_)) => ApiStatus::MissingIdentifier,
            Err(e) => ApiStatus::Failed {
                tag: ErrorTag::Other.to_string(),
                message: Some(e.to_string()),
            },
        };
        debug!("{} api status: {}", kind, status);
        status
    }

    /// Sorted record dates with data, ending yesterday.
    pub async fn available_dates(&self, kind: ReportKind) -> Result<Vec<NaiveDate>, ReportError> {
        self.available_dates_as_of(kind, Utc::now().date_naive()).await
    }

    pub async fn available_dates_as_of(
        &self,
        kind: ReportKind,
        today: NaiveDate,
    ) -> Result<Vec<NaiveDate>, ReportError> {
        let end = today - Duration::days(1);
        let (lookback, metrics): (i64, &[&str]) = match kind {
            ReportKind::Ga3 | ReportKind::Ga4 => (ANALYTICS_LOOKBACK_DAYS, &["sessions"]),
            ReportKind::Gsc => (SEARCH_CONSOLE_LOOKBACK_DAYS, &[]),
            other => return Err(ReportError::NoRecordDates(other)),
        };
        let query = Query::new_as_of(today - Duration::days(lookback), end, today)?
            .with_dimensions(["date"])
            .with_metrics(metrics.iter().copied());
        let options = ReportOptions {
            add_boolean_metrics: false,
            raise_errors: false,
            fill_missing_metrics: false,
        };

        let table = self.get_table(kind, &query, &options).await?;
        let mut dates: Vec<NaiveDate> = table
            .column("record_date")
            .iter()
            .filter_map(|v| v.as_date())
            .collect();
        dates.sort_unstable();
        dates.dedup();
        Ok(dates)
    }
}

/// "first to last (coverage%)" over a set of dates, the single date when
/// there is one, or `alternate` when there are none.
pub fn date_range_summary(dates: &[NaiveDate], alternate: &str) -> String {
    let (Some(first), Some(last)) = (dates.iter().min(), dates.iter().max()) else {
        return alternate.to_string();
    };
    if first == last {
        return first.format("%Y-%m-%d").to_string();
    }
    let mut unique = dates.to_vec();
    unique.sort_unstable();
    unique.dedup();
    let span = (*last - *first).num_days() + 1;
    let coverage = 100.0 * unique.len() as f64 / span as f64;
    format!(
        "{} to {} ({:.0}%)",
        first.format("%Y-%m-%d"),
        last.format("%Y-%m-%d"),
        coverage
    )
}
