use chrono::NaiveDateTime;
use serde_json::Value as Json;

use super::naming::strip_ga_prefix;
use super::rules::{
    apply_rules, coerce_metrics, ensure_record_date, snake_case_columns, ANALYTICS_RULES,
    SEARCH_CONSOLE_RULES,
};
use crate::core::query::DateRange;
use crate::core::reports::{
    Ga3Response, Ga4Response, GscResponse, RawResponse, UrlInspection, UrlInspectionResponse,
};
use crate::core::table::{Backend, ErrorTag, FetchError, Row, Table, TableMetadata, Value};

pub const SEARCH_CONSOLE_METRICS: [&str; 4] = ["clicks", "impressions", "ctr", "position"];

/// Turns any vendor response into a normalized table.
pub fn normalize(raw: RawResponse) -> Table {
    match raw {
        RawResponse::Ga3(response) => normalize_ga3(response),
        RawResponse::Ga4(response) => normalize_ga4(response),
        RawResponse::Gsc(response) => normalize_gsc(response),
        RawResponse::UrlInspection(response) => normalize_url_inspection(response),
    }
}

fn zip_row(
    dimension_names: &[String],
    dimensions: Vec<String>,
    metric_names: &[String],
    metrics: Vec<String>,
) -> Row {
    let mut row = Row::with_capacity(dimension_names.len() + metric_names.len());
    for (name, value) in dimension_names.iter().zip(dimensions) {
        row.insert(name.clone(), Value::Str(value));
    }
    for (name, value) in metric_names.iter().zip(metrics) {
        row.insert(name.clone(), Value::parse_float(&value));
    }
    row
}

fn analytics_table(
    dimensions: Vec<String>,
    metrics: Vec<String>,
    rows: Vec<Row>,
    mut metadata: TableMetadata,
) -> Table {
    metadata.dimensions = dimensions.clone();
    metadata.metrics = metrics.clone();
    metadata.join_keys = dimensions.clone();

    let columns = dimensions.into_iter().chain(metrics).collect();
    let table = Table::new(columns, metadata).with_rows(rows);

    let table = coerce_metrics(table);
    let table = apply_rules(table, ANALYTICS_RULES);
    let table = snake_case_columns(table);
    ensure_record_date(table)
}

/// Zero-row analytics table with the columns a populated one would have.
pub fn empty_analytics_table(
    backend: Backend,
    dimensions: &[String],
    metrics: &[String],
    date_range: DateRange,
    error: Option<&FetchError>,
) -> Table {
    let metadata = TableMetadata::new(Some(backend), Some(date_range)).with_error(error);
    analytics_table(
        dimensions.iter().map(|d| strip_ga_prefix(d).to_string()).collect(),
        metrics.iter().map(|m| strip_ga_prefix(m).to_string()).collect(),
        Vec::new(),
        metadata,
    )
}

pub fn normalize_ga3(response: Ga3Response) -> Table {
    let dimensions: Vec<String> = response
        .dimension_headers
        .iter()
        .map(|h| strip_ga_prefix(h).to_string())
        .collect();
    let metrics: Vec<String> = response
        .metric_headers
        .iter()
        .map(|h| strip_ga_prefix(h).to_string())
        .collect();

    let rows: Vec<Row> = response
        .rows
        .into_iter()
        .map(|row| zip_row(&dimensions, row.dimensions, &metrics, row.metrics))
        .collect();

    let mut metadata = TableMetadata::new(Some(Backend::Ga3), Some(response.date_range))
        .with_error(response.error.as_ref());
    metadata.row_count = rows.len();

    analytics_table(dimensions, metrics, rows, metadata)
}

pub fn normalize_ga4(response: Ga4Response) -> Table {
    let dimensions = response.dimension_headers;
    let metrics = response.metric_headers;

    let rows: Vec<Row> = response
        .rows
        .into_iter()
        .map(|row| zip_row(&dimensions, row.dimensions, &metrics, row.metrics))
        .collect();

    let mut metadata = TableMetadata::new(Some(Backend::Ga4), Some(response.date_range))
        .with_error(response.error.as_ref());
    metadata.row_count = response.row_count;
    metadata.quota = response.quota;
    metadata.currency_code = response.currency_code;
    metadata.time_zone = response.time_zone;

    analytics_table(dimensions, metrics, rows, metadata)
}

pub fn normalize_gsc(response: GscResponse) -> Table {
    let metrics: Vec<String> = SEARCH_CONSOLE_METRICS.iter().map(|m| m.to_string()).collect();
    let dimensions = response.dimensions;

    let rows: Vec<Row> = response
        .rows
        .into_iter()
        .map(|row| {
            let mut out: Row = dimensions
                .iter()
                .cloned()
                .zip(row.keys.into_iter().map(Value::Str))
                .collect();
            out.insert("clicks".into(), Value::Float(row.clicks));
            out.insert("impressions".into(), Value::Float(row.impressions));
            out.insert("ctr".into(), Value::Float(row.ctr));
            out.insert("position".into(), Value::Float(row.position));
            out
        })
        .collect();

    let error = match response.error {
        Some(e) => Some(e),
        None if rows.is_empty() => Some(FetchError::new(
            ErrorTag::EmptyResponse,
            "Search Console returned no rows",
        )),
        None => None,
    };

    let mut metadata = TableMetadata::new(Some(Backend::Gsc), Some(response.date_range))
        .with_error(error.as_ref());
    metadata.dimensions = dimensions.clone();
    metadata.metrics = metrics.clone();
    metadata.join_keys = dimensions.clone();
    metadata.row_count = rows.len();
    metadata.response_aggregation = response.response_aggregation;

    let columns = dimensions.into_iter().chain(metrics).collect();
    let table = Table::new(columns, metadata).with_rows(rows);
    snake_case_columns(apply_rules(table, SEARCH_CONSOLE_RULES))
}

pub const URL_INSPECTION_COLUMNS: [&str; 16] = [
    "record_date",
    "record_time",
    "url",
    "response",
    "index_status_result_verdict",
    "coverage_state",
    "robotstxt_state",
    "indexing_state",
    "last_crawl_time",
    "page_fetch_state",
    "google_canonical",
    "user_canonical",
    "sitemap",
    "referring_urls",
    "crawled_as",
    "mobile_usability_result_verdict",
];

fn json_str(node: &Json, key: &str) -> Value {
    node.get(key)
        .and_then(Json::as_str)
        .map(|s| Value::Str(s.to_string()))
        .unwrap_or(Value::Null)
}

fn json_list(node: &Json, key: &str) -> Value {
    match node.get(key).and_then(Json::as_array) {
        Some(items) => Value::List(
            items
                .iter()
                .filter_map(|i| i.as_str().map(str::to_string))
                .collect(),
        ),
        None => Value::Null,
    }
}

fn inspection_row(inspection: UrlInspection) -> Row {
    let mut row = Row::new();
    row.insert(
        "record_date".into(),
        Value::Date(inspection.inspected_at.date_naive()),
    );
    row.insert(
        "record_time".into(),
        Value::Time(inspection.inspected_at.time()),
    );
    row.insert("url".into(), Value::Str(inspection.url));

    let body = match inspection.outcome {
        Ok(body) => body,
        Err(message) => {
            row.insert("response".into(), Value::Str(message));
            return row;
        }
    };
    let Some(result) = body.get("inspectionResult") else {
        row.insert("response".into(), Value::from("empty"));
        return row;
    };
    row.insert("response".into(), Value::from("success"));

    if let Some(index) = result.get("indexStatusResult") {
        let last_crawl = index
            .get("lastCrawlTime")
            .and_then(Json::as_str)
            .and_then(|s| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%SZ").ok())
            .map(Value::DateTime)
            .unwrap_or(Value::Null);
        row.insert("index_status_result_verdict".into(), json_str(index, "verdict"));
        row.insert("coverage_state".into(), json_str(index, "coverageState"));
        row.insert("robotstxt_state".into(), json_str(index, "robotsTxtState"));
        row.insert("indexing_state".into(), json_str(index, "indexingState"));
        row.insert("last_crawl_time".into(), last_crawl);
        row.insert("page_fetch_state".into(), json_str(index, "pageFetchState"));
        row.insert("google_canonical".into(), json_str(index, "googleCanonical"));
        row.insert("user_canonical".into(), json_str(index, "userCanonical"));
        row.insert("sitemap".into(), json_list(index, "sitemap"));
        row.insert("referring_urls".into(), json_list(index, "referringUrls"));
        row.insert("crawled_as".into(), json_str(index, "crawledAs"));
    }
    if let Some(mobile) = result.get("mobileUsabilityResult") {
        row.insert(
            "mobile_usability_result_verdict".into(),
            json_str(mobile, "verdict"),
        );
    }
    row
}

pub fn normalize_url_inspection(response: UrlInspectionResponse) -> Table {
    let rows: Vec<Row> = response
        .inspections
        .into_iter()
        .map(inspection_row)
        .collect();

    let mut metadata = TableMetadata::new(Some(Backend::UrlInspection), Some(response.date_range))
        .with_error(response.error.as_ref());
    metadata.dimensions = vec!["url".to_string()];
    metadata.join_keys = vec!["url".to_string()];
    metadata.row_count = rows.len();

    Table::new(
        URL_INSPECTION_COLUMNS.iter().map(|c| c.to_string()).collect(),
        metadata,
    )
    .with_rows(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reports::{Ga3Row, Ga4Row, GscRow};
    use chrono::{NaiveDate, Utc};

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn ga3_headers_lose_prefix_and_get_record_dates() {
        let response = Ga3Response {
            dimension_headers: vec!["ga:deviceCategory".into()],
            metric_headers: vec!["ga:sessions".into()],
            rows: vec![Ga3Row {
                dimensions: vec!["mobile".into()],
                metrics: vec!["12".into()],
            }],
            pages: 1,
            date_range: range(),
            error: None,
        };
        let table = normalize(RawResponse::Ga3(response));

        assert_eq!(table.columns, ["record_date_start", "record_date", "device", "sessions"]);
        assert_eq!(table.rows[0]["sessions"], Value::Float(12.0));
        assert_eq!(table.rows[0]["record_date"], Value::Date(range().end));
        assert_eq!(table.metadata.metrics, ["sessions"]);
        assert!(table.metadata.join_keys.contains(&"device".to_string()));
        assert!(table.metadata.join_keys.contains(&"record_date_start".to_string()));
        assert_eq!(table.metadata.dimensions, ["deviceCategory"]);
    }

    #[test]
    fn ga4_keeps_quota_and_row_count() {
        let response = Ga4Response {
            dimension_headers: vec!["date".into(), "sessionSourceMedium".into()],
            metric_headers: vec!["totalUsers".into()],
            rows: vec![Ga4Row {
                dimensions: vec!["20240102".into(), "google / organic".into()],
                metrics: vec!["7".into()],
            }],
            row_count: 1,
            pages: 1,
            quota: Some(Default::default()),
            currency_code: Some("GBP".into()),
            time_zone: None,
            date_range: range(),
            error: None,
        };
        let table = normalize(RawResponse::Ga4(response));

        assert_eq!(table.columns, ["record_date", "total_users", "source", "medium"]);
        assert_eq!(table.metadata.row_count, 1);
        assert!(table.metadata.quota.is_some());
        assert_eq!(table.metadata.currency_code.as_deref(), Some("GBP"));
    }

    #[test]
    fn empty_gsc_response_is_tagged() {
        let response = GscResponse {
            dimensions: vec!["date".into(), "query".into()],
            rows: Vec::new(),
            response_aggregation: None,
            date_range: range(),
            error: None,
        };
        let table = normalize(RawResponse::Gsc(response));

        assert!(table.is_empty());
        assert_eq!(table.error_tag(), Some(ErrorTag::EmptyResponse));
        assert_eq!(table.metadata.dimensions, ["date", "query"]);
        assert_eq!(table.metadata.metrics, SEARCH_CONSOLE_METRICS);
        assert_eq!(table.metadata.date_range, Some(range()));
        assert_eq!(
            table.columns,
            ["record_date", "query", "clicks", "impressions", "ctr", "position"]
        );
    }

    #[test]
    fn gsc_rows_are_normalized() {
        let response = GscResponse {
            dimensions: vec!["country".into(), "device".into(), "query".into()],
            rows: vec![GscRow {
                keys: vec!["gbr".into(), "MOBILE".into(), "Red Shoes".into()],
                clicks: 3.0,
                impressions: 40.0,
                ctr: 0.075,
                position: 4.2,
            }],
            response_aggregation: Some("byProperty".into()),
            date_range: range(),
            error: None,
        };
        let table = normalize(RawResponse::Gsc(response));

        assert_eq!(table.error_tag(), None);
        assert_eq!(table.rows[0]["country_iso_code"], Value::from("GBR"));
        assert_eq!(table.rows[0]["device"], Value::from("mobile"));
        assert_eq!(table.rows[0]["query"], Value::from("red shoes"));
        assert_eq!(table.metadata.response_aggregation.as_deref(), Some("byProperty"));
    }

    #[test]
    fn url_inspection_rows() {
        let response = UrlInspectionResponse {
            inspections: vec![
                UrlInspection {
                    url: "https://example.com/".into(),
                    inspected_at: Utc::now(),
                    outcome: Ok(serde_json::json!({
                        "inspectionResult": {
                            "indexStatusResult": {
                                "verdict": "PASS",
                                "lastCrawlTime": "2024-01-02T03:04:05Z",
                                "referringUrls": ["https://example.com/a"]
                            }
                        }
                    })),
                },
                UrlInspection {
                    url: "https://example.com/b".into(),
                    inspected_at: Utc::now(),
                    outcome: Ok(serde_json::json!({})),
                },
            ],
            date_range: range(),
            error: None,
        };
        let table = normalize(RawResponse::UrlInspection(response));

        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0]["response"], Value::from("success"));
        assert_eq!(table.rows[0]["index_status_result_verdict"], Value::from("PASS"));
        assert_eq!(
            table.rows[0]["referring_urls"],
            Value::List(vec!["https://example.com/a".into()])
        );
        assert_eq!(table.rows[1]["response"], Value::from("empty"));
    }
}
