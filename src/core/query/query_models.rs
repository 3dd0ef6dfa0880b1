use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    #[error("end date {end} is before start date {start}")]
    EndBeforeStart { start: NaiveDate, end: NaiveDate },
    #[error("start date {start} is in the future (today is {today})")]
    StartInFuture { start: NaiveDate, today: NaiveDate },
    #[error("unknown report kind '{0}', expected one of GA3, GA4, GSC, GSCQ, URL")]
    UnknownReportKind(String),
}

/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, QueryError> {
        if end < start {
            return Err(QueryError::EndBeforeStart { start, end });
        }
        Ok(Self { start, end })
    }

    /// Number of calendar days covered, both ends included.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Smallest range covering both `self` and `other`.
    pub fn union(&self, other: &DateRange) -> DateRange {
        DateRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn start_str(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    pub fn end_str(&self) -> String {
        self.end.format("%Y-%m-%d").to_string()
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start_str(), self.end_str())
    }
}

/// A single GA3 filter expression. Exactly one of `dimension_name` and
/// `metric_name` is expected to be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expressions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_sensitive: Option<bool>,
}

impl Filter {
    pub fn dimension(name: &str, operator: &str, expressions: &[&str]) -> Self {
        Self {
            dimension_name: Some(name.to_string()),
            operator: Some(operator.to_string()),
            expressions: expressions.iter().map(|e| e.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn metric(name: &str, operator: &str, comparison_value: &str) -> Self {
        Self {
            metric_name: Some(name.to_string()),
            operator: Some(operator.to_string()),
            comparison_value: Some(comparison_value.to_string()),
            ..Self::default()
        }
    }
}

/// A group of filters combined with `operator` (`AND`/`OR`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterClause {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    pub filters: Vec<Filter>,
}

impl FilterClause {
    pub fn and(filters: Vec<Filter>) -> Self {
        Self {
            operator: Some("AND".to_string()),
            filters,
        }
    }

    /// `true` when the clause applies to dimensions, judged by its first filter.
    pub fn is_dimension_clause(&self) -> bool {
        self.filters
            .first()
            .map(|f| f.dimension_name.is_some())
            .unwrap_or(false)
    }

    pub fn is_metric_clause(&self) -> bool {
        self.filters
            .first()
            .map(|f| f.metric_name.is_some())
            .unwrap_or(false)
    }
}

/// What a caller asks a backend for. Built once and never mutated; the
/// `with_*` methods return new values.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    date_range: DateRange,
    dimensions: Vec<String>,
    metrics: Vec<String>,
    filters: Vec<FilterClause>,
    row_limit: Option<u64>,
    filter_google_organic: bool,
    urls: Vec<String>,
}

impl Query {
    /// Validates the range against today's UTC date.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, QueryError> {
        Self::new_as_of(start, end, Utc::now().date_naive())
    }

    pub fn new_as_of(start: NaiveDate, end: NaiveDate, today: NaiveDate) -> Result<Self, QueryError> {
        let date_range = DateRange::new(start, end)?;
        if start > today {
            return Err(QueryError::StartInFuture { start, today });
        }
        Ok(Self {
            date_range,
            dimensions: Vec::new(),
            metrics: Vec::new(),
            filters: Vec::new(),
            row_limit: None,
            filter_google_organic: false,
            urls: Vec::new(),
        })
    }

    pub fn with_dimensions<I, S>(mut self, dimensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dimensions = dimensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_metrics<I, S>(mut self, metrics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metrics = metrics.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_filters(mut self, filters: Vec<FilterClause>) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_row_limit(mut self, row_limit: u64) -> Self {
        self.row_limit = Some(row_limit);
        self
    }

    pub fn with_google_organic_filter(mut self, enabled: bool) -> Self {
        self.filter_google_organic = enabled;
        self
    }

    pub fn with_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.urls = urls.into_iter().map(Into::into).collect();
        self
    }

    pub fn date_range(&self) -> DateRange {
        self.date_range
    }

    pub fn start(&self) -> NaiveDate {
        self.date_range.start
    }

    pub fn end(&self) -> NaiveDate {
        self.date_range.end
    }

    pub fn dimensions(&self) -> &[String] {
        &self.dimensions
    }

    pub fn metrics(&self) -> &[String] {
        &self.metrics
    }

    pub fn filters(&self) -> &[FilterClause] {
        &self.filters
    }

    pub fn row_limit(&self) -> Option<u64> {
        self.row_limit
    }

    pub fn filter_google_organic(&self) -> bool {
        self.filter_google_organic
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }
}

/// Report surfaces the facade can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportKind {
    Ga3,
    Ga4,
    Gsc,
    /// Search Console broken down by query only.
    GscQueries,
    UrlInspection,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Ga3 => "GA3",
            ReportKind::Ga4 => "GA4",
            ReportKind::Gsc => "GSC",
            ReportKind::GscQueries => "GSCQ",
            ReportKind::UrlInspection => "URL",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportKind {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GA3" => Ok(ReportKind::Ga3),
            "GA4" => Ok(ReportKind::Ga4),
            "GSC" => Ok(ReportKind::Gsc),
            "GSCQ" => Ok(ReportKind::GscQueries),
            "URL" => Ok(ReportKind::UrlInspection),
            _ => Err(QueryError::UnknownReportKind(s.to_string())),
        }
    }
}

/// Caller switches for a facade report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOptions {
    pub add_boolean_metrics: bool,
    /// Turn fetch error tags into `Err` instead of tagged empty tables.
    pub raise_errors: bool,
    /// Replace missing numeric values with zero after joining.
    pub fill_missing_metrics: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            add_boolean_metrics: false,
            raise_errors: false,
            fill_missing_metrics: true,
        }
    }
}
