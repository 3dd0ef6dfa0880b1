use chrono::NaiveDate;

use crate::core::reports::ApiError;
use crate::core::table::TableError;

#[derive(Debug, thiserror::Error)]
pub enum AdsError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("an Ads query needs at least one field")]
    NoFields,
    #[error("no Google Ads customer id is configured")]
    MissingCustomerId,
}

/// A literal on the right-hand side of a GAQL condition.
#[derive(Debug, Clone, PartialEq)]
pub enum AdsValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
}

impl AdsValue {
    /// Strings and dates are double-quoted.
    pub fn to_gaql(&self) -> String {
        match self {
            AdsValue::Str(s) => format!("\"{}\"", s),
            AdsValue::Date(d) => format!("\"{}\"", d.format("%Y-%m-%d")),
            AdsValue::Int(i) => i.to_string(),
            AdsValue::Float(f) => f.to_string(),
            AdsValue::Bool(true) => "TRUE".to_string(),
            AdsValue::Bool(false) => "FALSE".to_string(),
        }
    }
}

impl From<&str> for AdsValue {
    fn from(s: &str) -> Self {
        AdsValue::Str(s.to_string())
    }
}

impl From<String> for AdsValue {
    fn from(s: String) -> Self {
        AdsValue::Str(s)
    }
}

impl From<i64> for AdsValue {
    fn from(i: i64) -> Self {
        AdsValue::Int(i)
    }
}

impl From<f64> for AdsValue {
    fn from(f: f64) -> Self {
        AdsValue::Float(f)
    }
}

impl From<bool> for AdsValue {
    fn from(b: bool) -> Self {
        AdsValue::Bool(b)
    }
}

impl From<NaiveDate> for AdsValue {
    fn from(d: NaiveDate) -> Self {
        AdsValue::Date(d)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdsCondition {
    Compare {
        field: String,
        op: String,
        value: AdsValue,
    },
    Between {
        field: String,
        low: AdsValue,
        high: AdsValue,
    },
}

impl AdsCondition {
    pub fn new(field: impl Into<String>, op: impl Into<String>, value: impl Into<AdsValue>) -> Self {
        AdsCondition::Compare {
            field: field.into(),
            op: op.into(),
            value: value.into(),
        }
    }

    /// A field and a value with no operator compare with `=`.
    pub fn eq(field: impl Into<String>, value: impl Into<AdsValue>) -> Self {
        Self::new(field, "=", value)
    }

    pub fn between(
        field: impl Into<String>,
        low: impl Into<AdsValue>,
        high: impl Into<AdsValue>,
    ) -> Self {
        AdsCondition::Between {
            field: field.into(),
            low: low.into(),
            high: high.into(),
        }
    }

    pub fn to_gaql(&self) -> String {
        match self {
            AdsCondition::Compare { field, op, value } => {
                format!("{} {} {}", field, op, value.to_gaql())
            }
            AdsCondition::Between { field, low, high } => {
                format!("{} BETWEEN {} AND {}", field, low.to_gaql(), high.to_gaql())
            }
        }
    }
}

/// Date restriction, applied as a `segments.date` condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdsDate {
    Day(NaiveDate),
    Range(NaiveDate, NaiveDate),
}

impl AdsDate {
    pub fn condition(&self) -> AdsCondition {
        match *self {
            AdsDate::Day(day) => AdsCondition::eq("segments.date", day),
            AdsDate::Range(start, end) => AdsCondition::between("segments.date", start, end),
        }
    }
}

/// A report request against one Ads resource.
#[derive(Debug, Clone, PartialEq)]
pub struct AdsQuery {
    pub resource: String,
    pub dimensions: Vec<String>,
    /// With or without the `metrics.` prefix.
    pub metrics: Vec<String>,
    pub date: Option<AdsDate>,
    pub conditions: Vec<AdsCondition>,
    /// Appended verbatim after the structured conditions.
    pub custom_condition: Option<String>,
    pub limit: Option<u64>,
}

impl AdsQuery {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            dimensions: Vec::new(),
            metrics: Vec::new(),
            date: None,
            conditions: Vec::new(),
            custom_condition: None,
            limit: None,
        }
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

    pub fn with_date(mut self, date: AdsDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_condition(mut self, condition: AdsCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_custom_condition(mut self, expr: impl Into<String>) -> Self {
        self.custom_condition = Some(expr.into());
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}
