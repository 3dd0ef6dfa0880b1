use serde_json::{json, Value as Json};
use tracing::warn;

use super::report_api::ApiError;
use crate::core::normalize::naming::{strip_ga_prefix, with_ga_prefix};
use crate::core::query::{Filter, FilterClause, Query};
use crate::core::table::Backend;

pub const GA3_PAGE_SIZE: u64 = 100_000;
pub const GA4_PAGE_SIZE: u64 = 100_000;
pub const GSC_PAGE_SIZE: u64 = 25_000;
/// Both GA APIs reject requests with more metrics than this.
pub const GA_MAX_METRICS_PER_REQUEST: usize = 10;
/// Stand-in for "no limit" on GA4 row counts.
pub const GA4_UNLIMITED_ROWS: u64 = 1_000_000_000;
pub const GSC_DEFAULT_ROW_LIMIT: u64 = 100_000;

pub const GA3_DEFAULT_DIMENSIONS: &[&str] = &["productName"];
pub const GA3_DEFAULT_METRICS: &[&str] = &["itemRevenue"];
pub const GA4_DEFAULT_DIMENSIONS: &[&str] = &["dateHour", "landingPage"];
pub const GA4_DEFAULT_METRICS: &[&str] = &["totalUsers"];
pub const GSC_DEFAULT_DIMENSIONS: &[&str] = &["date", "country", "device", "page", "query"];

/// A request, or the marker used when the backing id is not configured and
/// the caller asked not to raise.
#[derive(Debug, Clone, PartialEq)]
pub enum Built<T> {
    Request(T),
    MissingIdentifier,
}

fn require_id(id: Option<&str>, backend: Backend, raise: bool) -> Result<Option<String>, ApiError> {
    match id.map(str::trim).filter(|s| !s.is_empty()) {
        Some(id) => Ok(Some(id.to_string())),
        None if raise => Err(ApiError::MissingIdentifier(backend)),
        None => {
            warn!("{} identifier is not set", backend);
            Ok(None)
        }
    }
}

fn or_defaults(values: &[String], defaults: &[&str]) -> Vec<String> {
    if values.is_empty() {
        defaults.iter().map(|s| s.to_string()).collect()
    } else {
        values.to_vec()
    }
}

/// Dimensions a GA3 query resolves to, `ga:` prefixed.
pub fn ga3_dimensions(query: &Query) -> Vec<String> {
    or_defaults(query.dimensions(), GA3_DEFAULT_DIMENSIONS)
        .iter()
        .map(|d| with_ga_prefix(d))
        .collect()
}

pub fn ga3_metrics(query: &Query) -> Vec<String> {
    or_defaults(query.metrics(), GA3_DEFAULT_METRICS)
        .iter()
        .map(|m| with_ga_prefix(m))
        .collect()
}

pub fn ga4_dimensions(query: &Query) -> Vec<String> {
    or_defaults(query.dimensions(), GA4_DEFAULT_DIMENSIONS)
}

pub fn ga4_metrics(query: &Query) -> Vec<String> {
    or_defaults(query.metrics(), GA4_DEFAULT_METRICS)
}

pub fn gsc_dimensions(query: &Query) -> Vec<String> {
    or_defaults(query.dimensions(), GSC_DEFAULT_DIMENSIONS)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ga3Request {
    pub view_id: String,
    pub start_date: String,
    pub end_date: String,
    pub dimensions: Vec<String>,
    pub metrics: Vec<String>,
    pub dimension_filter_clauses: Vec<FilterClause>,
    pub metric_filter_clauses: Vec<FilterClause>,
    pub order_bys: Vec<Json>,
    pub page_size: u64,
    pub page_token: Option<String>,
}

impl Ga3Request {
    /// `reports:batchGet` body.
    pub fn to_body(&self) -> Json {
        let mut report = json!({
            "viewId": self.view_id,
            "dateRanges": [{ "startDate": self.start_date, "endDate": self.end_date }],
            "dimensions": self.dimensions.iter().map(|d| json!({ "name": d })).collect::<Vec<_>>(),
            "metrics": self.metrics.iter().map(|m| json!({ "expression": m })).collect::<Vec<_>>(),
            "dimensionFilterClauses": self.dimension_filter_clauses,
            "metricFilterClauses": self.metric_filter_clauses,
            "orderBys": self.order_bys,
            "pageSize": self.page_size,
        });
        if let (Some(token), Some(obj)) = (&self.page_token, report.as_object_mut()) {
            obj.insert("pageToken".to_string(), json!(token));
        }
        json!({ "reportRequests": [report] })
    }
}

fn google_organic_clause() -> FilterClause {
    FilterClause {
        operator: Some("OR".to_string()),
        filters: vec![Filter {
            not: Some(false),
            case_sensitive: Some(false),
            ..Filter::dimension("ga:sourceMedium", "EXACT", &["google / organic"])
        }],
    }
}

pub fn build_ga3_request(
    view_id: Option<&str>,
    query: &Query,
    page_token: Option<String>,
    raise_on_missing_id: bool,
) -> Result<Built<Ga3Request>, ApiError> {
    let Some(view_id) = require_id(view_id, Backend::Ga3, raise_on_missing_id)? else {
        return Ok(Built::MissingIdentifier);
    };

    let mut dimension_filter_clauses = Vec::new();
    let mut metric_filter_clauses = Vec::new();
    for clause in query.filters() {
        if clause.is_dimension_clause() {
            dimension_filter_clauses.push(clause.clone());
        } else if clause.is_metric_clause() {
            metric_filter_clauses.push(clause.clone());
        }
    }
    if query.filter_google_organic() {
        dimension_filter_clauses.push(google_organic_clause());
    }

    let metrics = ga3_metrics(query);
    let order_bys = if metrics.iter().any(|m| m == "ga:itemRevenue") {
        vec![json!({
            "fieldName": "ga:itemRevenue",
            "orderType": "VALUE",
            "sortOrder": "DESCENDING"
        })]
    } else {
        Vec::new()
    };

    let range = query.date_range();
    Ok(Built::Request(Ga3Request {
        view_id,
        start_date: range.start_str(),
        end_date: range.end_str(),
        dimensions: ga3_dimensions(query),
        metrics,
        dimension_filter_clauses,
        metric_filter_clauses,
        order_bys,
        page_size: GA3_PAGE_SIZE,
        page_token,
    }))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ga4Request {
    /// `properties/<id>`.
    pub property: String,
    pub start_date: String,
    pub end_date: String,
    pub dimensions: Vec<String>,
    pub metrics: Vec<String>,
    pub limit: u64,
    pub offset: u64,
}

impl Ga4Request {
    /// `runReport` body.
    pub fn to_body(&self) -> Json {
        json!({
            "dateRanges": [{ "startDate": self.start_date, "endDate": self.end_date }],
            "dimensions": self.dimensions.iter().map(|d| json!({ "name": d })).collect::<Vec<_>>(),
            "metrics": self.metrics.iter().map(|m| json!({ "name": m })).collect::<Vec<_>>(),
            "limit": self.limit,
            "offset": self.offset,
            "returnPropertyQuota": true,
        })
    }
}

pub fn build_ga4_request(
    property_id: Option<&str>,
    query: &Query,
    offset: u64,
    limit: u64,
    raise_on_missing_id: bool,
) -> Result<Built<Ga4Request>, ApiError> {
    let Some(property_id) = require_id(property_id, Backend::Ga4, raise_on_missing_id)? else {
        return Ok(Built::MissingIdentifier);
    };
    let property = if property_id.starts_with("properties/") {
        property_id
    } else {
        format!("properties/{}", property_id)
    };

    let range = query.date_range();
    Ok(Built::Request(Ga4Request {
        property,
        start_date: range.start_str(),
        end_date: range.end_str(),
        dimensions: ga4_dimensions(query)
            .iter()
            .map(|d| strip_ga_prefix(d).to_string())
            .collect(),
        metrics: ga4_metrics(query)
            .iter()
            .map(|m| strip_ga_prefix(m).to_string())
            .collect(),
        limit,
        offset,
    }))
}

#[derive(Debug, Clone, PartialEq)]
pub struct GscRequest {
    pub site_url: String,
    pub start_date: String,
    pub end_date: String,
    pub dimensions: Vec<String>,
    pub row_limit: u64,
    pub start_row: u64,
}

impl GscRequest {
    /// `searchAnalytics/query` body.
    pub fn to_body(&self) -> Json {
        json!({
            "startDate": self.start_date,
            "endDate": self.end_date,
            "dimensions": self.dimensions,
            "rowLimit": self.row_limit,
            "startRow": self.start_row,
        })
    }
}

pub fn build_gsc_request(
    site_url: Option<&str>,
    query: &Query,
    start_row: u64,
    row_limit: u64,
    raise_on_missing_id: bool,
) -> Result<Built<GscRequest>, ApiError> {
    let Some(site_url) = require_id(site_url, Backend::Gsc, raise_on_missing_id)? else {
        return Ok(Built::MissingIdentifier);
    };
    let range = query.date_range();
    Ok(Built::Request(GscRequest {
        site_url,
        start_date: range.start_str(),
        end_date: range.end_str(),
        dimensions: gsc_dimensions(query),
        row_limit: row_limit.min(GSC_PAGE_SIZE),
        start_row,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn query() -> Query {
        let day = |d| NaiveDate::from_ymd_opt(2024, 3, d).unwrap();
        Query::new_as_of(day(1), day(7), day(20)).unwrap()
    }

    #[test]
    fn ga3_prefixes_and_orders_by_item_revenue() {
        let built = build_ga3_request(Some("123"), &query(), None, false).unwrap();
        let Built::Request(request) = built else {
            panic!("expected a request");
        };
        assert_eq!(request.dimensions, ["ga:productName"]);
        assert_eq!(request.metrics, ["ga:itemRevenue"]);
        assert_eq!(request.order_bys.len(), 1);

        let body = request.to_body();
        let report = &body["reportRequests"][0];
        assert_eq!(report["viewId"], "123");
        assert_eq!(report["dateRanges"][0]["startDate"], "2024-03-01");
        assert_eq!(report["pageSize"], 100_000);
        assert!(report.get("pageToken").is_none());
    }

    #[test]
    fn ga3_splits_filter_clauses() {
        let q = query()
            .with_metrics(["sessions"])
            .with_filters(vec![
                FilterClause::and(vec![Filter::dimension("ga:medium", "EXACT", &["organic"])]),
                FilterClause::and(vec![Filter::metric("ga:sessions", "GREATER_THAN", "5")]),
                FilterClause::default(),
            ])
            .with_google_organic_filter(true);
        let Built::Request(request) =
            build_ga3_request(Some("1"), &q, Some("500".into()), false).unwrap()
        else {
            panic!("expected a request");
        };
        assert_eq!(request.dimension_filter_clauses.len(), 2);
        assert_eq!(request.metric_filter_clauses.len(), 1);
        assert!(request.order_bys.is_empty());
        assert_eq!(request.to_body()["reportRequests"][0]["pageToken"], "500");
    }

    #[test]
    fn missing_ids_raise_or_mark() {
        assert_eq!(
            build_ga3_request(None, &query(), None, false).unwrap(),
            Built::MissingIdentifier
        );
        assert_eq!(
            build_ga4_request(Some("  "), &query(), 0, 10, true).unwrap_err(),
            ApiError::MissingIdentifier(Backend::Ga4)
        );
        assert!(build_gsc_request(None, &query(), 0, 10, true).is_err());
    }

    #[test]
    fn ga4_request_shape() {
        let Built::Request(request) =
            build_ga4_request(Some("42"), &query(), 100_000, 100_000, false).unwrap()
        else {
            panic!("expected a request");
        };
        assert_eq!(request.property, "properties/42");
        assert_eq!(request.dimensions, ["dateHour", "landingPage"]);
        let body = request.to_body();
        assert_eq!(body["offset"], 100_000);
        assert_eq!(body["returnPropertyQuota"], true);
    }

    #[test]
    fn gsc_row_limit_capped_per_call() {
        let Built::Request(request) =
            build_gsc_request(Some("sc-domain:example.com"), &query(), 25_000, 90_000, false)
                .unwrap()
        else {
            panic!("expected a request");
        };
        assert_eq!(request.row_limit, GSC_PAGE_SIZE);
        assert_eq!(request.dimensions.len(), 5);
        assert_eq!(request.to_body()["startRow"], 25_000);
    }
}
