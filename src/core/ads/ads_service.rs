use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use super::ads_models::{AdsError, AdsQuery};
use super::gaql::tidy_column_name;
use crate::core::normalize::snake_to_camel;
use crate::core::reports::ApiError;
use crate::core::table::{Backend, ErrorTag, FetchError, Row, Table, TableMetadata, Value};

/// Google Ads `searchStream`: every result row across all batches.
#[async_trait]
pub trait AdsSearchApi: Send + Sync {
    async fn search_stream(&self, customer_id: &str, query: &str)
        -> Result<Vec<JsonValue>, ApiError>;
}

#[async_trait]
impl AdsSearchApi for Box<dyn AdsSearchApi> {
    async fn search_stream(
        &self,
        customer_id: &str,
        query: &str,
    ) -> Result<Vec<JsonValue>, ApiError> {
        (**self).search_stream(customer_id, query).await
    }
}

/// Enum names stay strings; int64 fields, which arrive as strings, become
/// ints.
fn json_scalar(value: &JsonValue) -> Value {
    match value {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
        },
        JsonValue::String(s) => match s.parse::<i64>() {
            Ok(i) => Value::Int(i),
            Err(_) => Value::Str(s.clone()),
        },
        JsonValue::Array(items) => Value::List(
            items
                .iter()
                .map(|item| match item {
                    JsonValue::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
        ),
        JsonValue::Object(_) => Value::Str(value.to_string()),
    }
}

/// Follows a GAQL field path such as `metrics.cost_micros` through a
/// search row, whose keys are camelCase. Missing fields are null.
pub fn extract_field(row: &JsonValue, path: &str) -> Value {
    let mut node = row;
    for segment in path.split('.') {
        let next = node
            .get(snake_to_camel(segment))
            .or_else(|| node.get(segment));
        match next {
            Some(n) => node = n,
            None => return Value::Null,
        }
    }
    json_scalar(node)
}

/// Runs GAQL reports for one customer account.
pub struct AdsReports<A: AdsSearchApi> {
    api: A,
    customer_id: String,
}

impl<A: AdsSearchApi> AdsReports<A> {
    pub fn new(api: A, customer_id: impl Into<String>) -> Self {
        Self {
            api,
            customer_id: customer_id.into(),
        }
    }

    pub fn customer_id(&self) -> &str {
        &self.customer_id
    }

    pub async fn raw_rows(&self, query: &AdsQuery) -> Result<Vec<JsonValue>, AdsError> {
        if self.customer_id.is_empty() {
            return Err(AdsError::MissingCustomerId);
        }
        let gaql = query.to_gaql()?;
        debug!("GAQL for {}: {}", self.customer_id, gaql);
        Ok(self.api.search_stream(&self.customer_id, &gaql).await?)
    }

    /// One row per search result, one column per requested field with
    /// tidied names.
    pub async fn get_data(&self, query: &AdsQuery) -> Result<Table, AdsError> {
        let fields = query.fields();
        let raw = self.raw_rows(query).await?;
        info!("{} rows from Ads resource {}", raw.len(), query.resource);

        let columns: Vec<String> = fields.iter().map(|f| tidy_column_name(f)).collect();
        let rows: Vec<Row> = raw
            .iter()
            .map(|result| {
                fields
                    .iter()
                    .zip(&columns)
                    .map(|(field, column)| (column.clone(), extract_field(result, field)))
                    .collect()
            })
            .collect();

        let mut metadata = TableMetadata::new(Some(Backend::GoogleAds), None);
        metadata.dimensions = query.dimensions.iter().map(|d| tidy_column_name(d)).collect();
        metadata.metrics = columns[metadata.dimensions.len()..].to_vec();
        metadata.join_keys = metadata.dimensions.clone();
        metadata.row_count = rows.len();
        if rows.is_empty() {
            let empty = FetchError::new(ErrorTag::EmptyResponse, "search returned no rows");
            metadata = metadata.with_error(Some(&empty));
        }
        Ok(Table::new(columns, metadata).with_rows(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ads::ads_models::{AdsCondition, AdsDate};
    use chrono::NaiveDate;
    use serde_json::json;
    use std::sync::Mutex;

    struct MockAds {
        rows: Vec<JsonValue>,
        queries: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl AdsSearchApi for MockAds {
        async fn search_stream(
            &self,
            customer_id: &str,
            query: &str,
        ) -> Result<Vec<JsonValue>, ApiError> {
            self.queries
                .lock()
                .unwrap()
                .push((customer_id.to_string(), query.to_string()));
            Ok(self.rows.clone())
        }
    }

    fn campaign_rows() -> Vec<JsonValue> {
        vec![
            json!({
                "campaign": {"name": "Brand", "advertisingChannelType": "SEARCH"},
                "segments": {"date": "2024-01-01"},
                "metrics": {"clicks": "12", "costMicros": "3500000", "ctr": 0.25}
            }),
            json!({
                "campaign": {"name": "Shopping", "advertisingChannelType": "SHOPPING"},
                "segments": {"date": "2024-01-01"},
                "metrics": {"clicks": "3", "ctr": 0.1}
            }),
        ]
    }

    #[tokio::test]
    async fn flattens_search_rows() {
        let reports = AdsReports::new(
            MockAds {
                rows: campaign_rows(),
                queries: Mutex::new(Vec::new()),
            },
            "1234567890",
        );
        let query = AdsQuery::new("campaign")
            .with_dimensions(["campaign.name", "campaign.advertising_channel_type", "segments.date"])
            .with_metrics(["clicks", "cost_micros", "ctr"])
            .with_date(AdsDate::Day(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()))
            .with_condition(AdsCondition::eq("campaign.status", "ENABLED"));
        let table = reports.get_data(&query).await.unwrap();

        assert_eq!(
            table.columns,
            [
                "campaign/name",
                "campaign/advertising_channel_type",
                "segments/date",
                "clicks",
                "cost_micros",
                "ctr"
            ]
        );
        assert_eq!(table.metadata.metrics, ["clicks", "cost_micros", "ctr"]);
        assert_eq!(table.len(), 2);
        let brand = &table.rows[0];
        assert_eq!(brand["campaign/advertising_channel_type"], Value::from("SEARCH"));
        assert_eq!(brand["clicks"], Value::Int(12));
        assert_eq!(brand["cost_micros"], Value::Int(3_500_000));
        assert_eq!(brand["ctr"], Value::Float(0.25));
        assert_eq!(table.rows[1]["cost_micros"], Value::Null);

        let queries = reports.api.queries.lock().unwrap();
        assert_eq!(queries[0].0, "1234567890");
        assert!(queries[0]
            .1
            .contains("WHERE segments.date = \"2024-01-01\" AND campaign.status = \"ENABLED\""));
    }

    #[tokio::test]
    async fn empty_search_is_tagged() {
        let reports = AdsReports::new(
            MockAds {
                rows: Vec::new(),
                queries: Mutex::new(Vec::new()),
            },
            "1",
        );
        let table = reports
            .get_data(&AdsQuery::new("campaign").with_dimensions(["campaign.id"]))
            .await
            .unwrap();
        assert!(table.is_empty());
        assert_eq!(table.error_tag(), Some(ErrorTag::EmptyResponse));
    }

    #[tokio::test]
    async fn needs_customer_id() {
        let reports = AdsReports::new(
            MockAds {
                rows: Vec::new(),
                queries: Mutex::new(Vec::new()),
            },
            "",
        );
        let err = reports
            .get_data(&AdsQuery::new("campaign").with_dimensions(["campaign.id"]))
            .await
            .unwrap_err();
        assert!(matches!(err, AdsError::MissingCustomerId));
    }

    #[test]
    fn extracts_nested_fields() {
        let row = json!({"adGroup": {"id": "42", "labels": ["a", "b"]}});
        assert_eq!(extract_field(&row, "ad_group.id"), Value::Int(42));
        assert_eq!(
            extract_field(&row, "ad_group.labels"),
            Value::List(vec!["a".into(), "b".into()])
        );
        assert_eq!(extract_field(&row, "ad_group.name"), Value::Null);
    }
}
