use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::query::DateRange;

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("cannot join tables with different join keys: {left:?} vs {right:?}")]
    MismatchedJoinDimensions {
        left: Vec<String>,
        right: Vec<String>,
    },
    #[error("column '{0}' not found")]
    MissingColumn(String),
    #[error("invalid bin edges: {0}")]
    InvalidBins(String),
}

/// A single cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    List(Vec<String>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::DateTime(dt) => Some(dt.date()),
            _ => None,
        }
    }

    /// Parses a vendor metric string. Unparseable text becomes `Null`.
    pub fn parse_float(raw: &str) -> Value {
        raw.trim()
            .parse::<f64>()
            .map(Value::Float)
            .unwrap_or(Value::Null)
    }

    /// Coerces any numeric-looking cell to `Float`.
    pub fn to_float(&self) -> Value {
        match self {
            Value::Str(s) => Value::parse_float(s),
            Value::Int(i) => Value::Float(*i as f64),
            Value::Bool(b) => Value::Float(if *b { 1.0 } else { 0.0 }),
            Value::Float(_) | Value::Null => self.clone(),
            _ => Value::Null,
        }
    }

    /// Stable text used to hash join keys.
    pub(crate) fn key_fragment(&self) -> String {
        match self {
            Value::Null => "\u{0}null".to_string(),
            Value::Float(f) if f.fract() == 0.0 && f.is_finite() => format!("n:{}", *f as i64),
            Value::Float(f) => format!("n:{}", f),
            Value::Int(i) => format!("n:{}", i),
            other => format!("{:?}", other),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Time(t) => write!(f, "{}", t.format("%H:%M")),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            Value::List(items) => f.write_str(&items.join(", ")),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

pub type Row = HashMap<String, Value>;

/// Which backend produced a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Backend {
    Ga3,
    Ga4,
    Gsc,
    UrlInspection,
    GoogleAds,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Ga3 => "GA3",
            Backend::Ga4 => "GA4",
            Backend::Gsc => "GSC",
            Backend::UrlInspection => "URL inspection",
            Backend::GoogleAds => "Google Ads",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification attached to a table when fetching went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorTag {
    InsufficientPermissions,
    MissingViewId,
    MissingIdentifier,
    PermissionDenied,
    QuotaReached,
    InvalidArguments,
    IncompatibleMetrics,
    InvalidPropertyId,
    EmptyResponse,
    Other,
}

impl ErrorTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorTag::InsufficientPermissions => "insufficient_permissions",
            ErrorTag::MissingViewId => "missing_view_id",
            ErrorTag::MissingIdentifier => "missing_identifier",
            ErrorTag::PermissionDenied => "permission_denied",
            ErrorTag::QuotaReached => "quota_reached",
            ErrorTag::InvalidArguments => "invalid_arguments",
            ErrorTag::IncompatibleMetrics => "incompatible_metrics",
            ErrorTag::InvalidPropertyId => "invalid_property_id",
            ErrorTag::EmptyResponse => "empty_response",
            ErrorTag::Other => "other",
        }
    }

    /// `EmptyResponse` is informational; everything else is a failure.
    pub fn is_failure(&self) -> bool {
        !matches!(self, ErrorTag::EmptyResponse)
    }
}

impl fmt::Display for ErrorTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error carried inside a raw response instead of being raised.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchError {
    pub tag: ErrorTag,
    pub message: String,
}

impl FetchError {
    pub fn new(tag: ErrorTag, message: impl Into<String>) -> Self {
        Self {
            tag,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaStatus {
    #[serde(default)]
    pub consumed: i64,
    #[serde(default)]
    pub remaining: i64,
}

/// GA4 property quota snapshot returned alongside a report page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyQuota {
    pub tokens_per_day: Option<QuotaStatus>,
    pub tokens_per_hour: Option<QuotaStatus>,
    pub concurrent_requests: Option<QuotaStatus>,
    pub server_errors_per_project_per_hour: Option<QuotaStatus>,
    pub potentially_thresholded_requests_per_hour: Option<QuotaStatus>,
    pub tokens_per_project_per_hour: Option<QuotaStatus>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableMetadata {
    /// Dimensions as requested from the vendor.
    pub dimensions: Vec<String>,
    /// Metric columns, renamed along with the table.
    pub metrics: Vec<String>,
    pub join_keys: Vec<String>,
    pub date_range: Option<DateRange>,
    pub error_tag: Option<ErrorTag>,
    pub error_message: Option<String>,
    pub source: Option<Backend>,
    /// Row count as reported by the backend.
    pub row_count: usize,
    pub obtained_at: DateTime<Utc>,
    pub response_aggregation: Option<String>,
    pub quota: Option<PropertyQuota>,
    pub currency_code: Option<String>,
    pub time_zone: Option<String>,
}

impl TableMetadata {
    pub fn new(source: Option<Backend>, date_range: Option<DateRange>) -> Self {
        Self {
            dimensions: Vec::new(),
            metrics: Vec::new(),
            join_keys: Vec::new(),
            date_range,
            error_tag: None,
            error_message: None,
            source,
            row_count: 0,
            obtained_at: Utc::now(),
            response_aggregation: None,
            quota: None,
            currency_code: None,
            time_zone: None,
        }
    }

    pub fn with_error(mut self, error: Option<&FetchError>) -> Self {
        self.error_tag = error.map(|e| e.tag);
        self.error_message = error.map(|e| e.message.clone());
        self
    }
}

/// Rows plus metadata. Operations consume the table and return a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub metadata: TableMetadata,
}

impl Table {
    pub fn new(columns: Vec<String>, metadata: TableMetadata) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            metadata,
        }
    }

    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = rows;
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn error_tag(&self) -> Option<ErrorTag> {
        self.metadata.error_tag
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of one column, `Null` where a row lacks it.
    pub fn column(&self, name: &str) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| row.get(name).cloned().unwrap_or(Value::Null))
            .collect()
    }

    pub fn value<'a>(row: &'a Row, column: &str) -> &'a Value {
        static NULL: Value = Value::Null;
        row.get(column).unwrap_or(&NULL)
    }

    /// Renames a column everywhere it is referenced, metric and join-key
    /// lists included. No-op when `from` is absent.
    pub fn rename_column(mut self, from: &str, to: &str) -> Self {
        if from == to || !self.has_column(from) {
            return self;
        }
        if self.has_column(to) {
            self = self.drop_column(to);
        }
        for col in self.columns.iter_mut().filter(|c| c.as_str() == from) {
            *col = to.to_string();
        }
        for row in &mut self.rows {
            if let Some(v) = row.remove(from) {
                row.insert(to.to_string(), v);
            }
        }
        for name in self
            .metadata
            .metrics
            .iter_mut()
            .chain(self.metadata.join_keys.iter_mut())
            .filter(|n| n.as_str() == from)
        {
            *name = to.to_string();
        }
        self
    }

    pub fn drop_column(mut self, name: &str) -> Self {
        self.columns.retain(|c| c != name);
        for row in &mut self.rows {
            row.remove(name);
        }
        self.metadata.metrics.retain(|m| m != name);
        self.metadata.join_keys.retain(|k| k != name);
        self
    }

    pub fn map_column<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&Value) -> Value,
    {
        if !self.has_column(name) {
            return self;
        }
        for row in &mut self.rows {
            let new = f(row.get(name).unwrap_or(&Value::Null));
            row.insert(name.to_string(), new);
        }
        self
    }

    /// Inserts (or overwrites) a computed column at `index`.
    pub fn insert_column_at<F>(mut self, index: usize, name: &str, f: F) -> Self
    where
        F: Fn(&Row) -> Value,
    {
        for row in &mut self.rows {
            let v = f(row);
            row.insert(name.to_string(), v);
        }
        if !self.has_column(name) {
            let index = index.min(self.columns.len());
            self.columns.insert(index, name.to_string());
        }
        self
    }

    /// Inserts a computed column right after `anchor`, or at the end when
    /// the anchor is absent.
    pub fn insert_column_after<F>(self, anchor: &str, name: &str, f: F) -> Self
    where
        F: Fn(&Row) -> Value,
    {
        let index = self
            .column_index(anchor)
            .map(|i| i + 1)
            .unwrap_or(self.columns.len());
        self.insert_column_at(index, name, f)
    }

    pub fn push_column<F>(self, name: &str, f: F) -> Self
    where
        F: Fn(&Row) -> Value,
    {
        let end = self.columns.len();
        self.insert_column_at(end, name, f)
    }

    pub fn retain_rows<F>(mut self, f: F) -> Self
    where
        F: Fn(&Row) -> bool,
    {
        self.rows.retain(|row| f(row));
        self
    }

    /// Swaps a join key for its replacements, keeping position.
    pub fn replace_join_key(mut self, old: &str, new: &[&str]) -> Self {
        let keys = &mut self.metadata.join_keys;
        let position = keys.iter().position(|k| k == old);
        keys.retain(|k| k != old && !new.contains(&k.as_str()));
        let at = position.unwrap_or(keys.len()).min(keys.len());
        for (offset, key) in new.iter().enumerate() {
            keys.insert(at + offset, key.to_string());
        }
        self
    }

    pub fn add_join_key(mut self, key: &str) -> Self {
        if !self.metadata.join_keys.iter().any(|k| k == key) {
            self.metadata.join_keys.push(key.to_string());
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let mut meta = TableMetadata::new(Some(Backend::Ga4), None);
        meta.metrics = vec!["sessions".to_string()];
        meta.join_keys = vec!["deviceCategory".to_string()];
        let row: Row = [
            ("deviceCategory".to_string(), Value::from("mobile")),
            ("sessions".to_string(), Value::from(3.0)),
        ]
        .into_iter()
        .collect();
        Table::new(vec!["deviceCategory".into(), "sessions".into()], meta).with_rows(vec![row])
    }

    #[test]
    fn rename_updates_rows_and_metadata() {
        let table = sample().rename_column("deviceCategory", "device");
        assert_eq!(table.columns, ["device", "sessions"]);
        assert_eq!(table.metadata.join_keys, ["device"]);
        assert_eq!(table.rows[0]["device"], Value::from("mobile"));
    }

    #[test]
    fn insert_after_anchor_keeps_order() {
        let table = sample().insert_column_after("deviceCategory", "flag", |_| Value::Bool(true));
        assert_eq!(table.columns, ["deviceCategory", "flag", "sessions"]);
        assert_eq!(table.rows[0]["flag"], Value::Bool(true));
    }

    #[test]
    fn replace_join_key_keeps_position() {
        let mut table = sample();
        table.metadata.join_keys = vec!["a".into(), "page".into(), "b".into()];
        let table = table.replace_join_key("page", &["full", "path"]);
        assert_eq!(table.metadata.join_keys, ["a", "full", "path", "b"]);
    }

    #[test]
    fn value_coercion() {
        assert_eq!(Value::from("1.5").to_float(), Value::Float(1.5));
        assert_eq!(Value::from("n/a").to_float(), Value::Null);
        assert_eq!(Value::Int(2).to_float(), Value::Float(2.0));
        assert_eq!(Value::Float(2.0).key_fragment(), Value::Int(2).key_fragment());
    }

    #[test]
    fn error_tag_strings() {
        assert_eq!(ErrorTag::QuotaReached.to_string(), "quota_reached");
        assert_eq!(ErrorTag::EmptyResponse.as_str(), "empty_response");
        assert!(!ErrorTag::EmptyResponse.is_failure());
        assert!(ErrorTag::Other.is_failure());
    }
}
