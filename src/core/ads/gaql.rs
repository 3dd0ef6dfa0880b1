use once_cell::sync::Lazy;
use regex::Regex;

use super::ads_models::{AdsCondition, AdsError, AdsQuery};

static METRICS_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^metrics\.(\w+)").expect("metrics prefix pattern compiles"));

pub fn metric_field(name: &str) -> String {
    if name.starts_with("metrics.") {
        name.to_string()
    } else {
        format!("metrics.{}", name)
    }
}

/// `SELECT <fields> FROM <resource> [WHERE c1 AND c2 ...] [LIMIT n]`
pub fn build_gaql(
    resource: &str,
    fields: &[String],
    conditions: &[AdsCondition],
    custom_condition: Option<&str>,
    limit: Option<u64>,
) -> Result<String, AdsError> {
    if fields.is_empty() {
        return Err(AdsError::NoFields);
    }
    let mut gaql = format!("SELECT {} FROM {}", fields.join(", "), resource);

    let mut clauses: Vec<String> = conditions.iter().map(AdsCondition::to_gaql).collect();
    if let Some(expr) = custom_condition.filter(|e| !e.trim().is_empty()) {
        clauses.push(expr.to_string());
    }
    if !clauses.is_empty() {
        gaql.push_str(" WHERE ");
        gaql.push_str(&clauses.join(" AND "));
    }
    if let Some(limit) = limit.filter(|l| *l > 0) {
        gaql.push_str(&format!(" LIMIT {}", limit));
    }
    Ok(gaql)
}

impl AdsQuery {
    /// Dimensions, then metrics with their `metrics.` prefix.
    pub fn fields(&self) -> Vec<String> {
        self.dimensions
            .iter()
            .cloned()
            .chain(self.metrics.iter().map(|m| metric_field(m)))
            .collect()
    }

    /// The date condition leads the other conditions.
    pub fn to_gaql(&self) -> Result<String, AdsError> {
        let conditions: Vec<AdsCondition> = self
            .date
            .map(|d| d.condition())
            .into_iter()
            .chain(self.conditions.iter().cloned())
            .collect();
        build_gaql(
            &self.resource,
            &self.fields(),
            &conditions,
            self.custom_condition.as_deref(),
            self.limit,
        )
    }
}

/// `metrics.clicks` -> `clicks`, `campaign.name` -> `campaign/name`.
pub fn tidy_column_name(field: &str) -> String {
    let base = match METRICS_PREFIX.captures(field).and_then(|c| c.get(1)) {
        Some(m) => m.as_str(),
        None => field,
    };
    base.replace('.', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ads::ads_models::AdsDate;
    use chrono::NaiveDate;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn select_only() {
        let gaql = AdsQuery::new("campaign")
            .with_dimensions(["campaign.name"])
            .with_metrics(["clicks", "metrics.impressions"])
            .to_gaql()
            .unwrap();
        assert_eq!(
            gaql,
            "SELECT campaign.name, metrics.clicks, metrics.impressions FROM campaign"
        );
    }

    #[test]
    fn date_condition_comes_first() {
        let gaql = AdsQuery::new("ad_group")
            .with_dimensions(["ad_group.id"])
            .with_date(AdsDate::Range(day(2024, 1, 1), day(2024, 1, 31)))
            .with_condition(AdsCondition::eq("campaign.status", "ENABLED"))
            .with_condition(AdsCondition::new("metrics.clicks", ">", 10_i64))
            .with_custom_condition("ad_group.name LIKE '%brand%'")
            .with_limit(50)
            .to_gaql()
            .unwrap();
        assert_eq!(
            gaql,
            "SELECT ad_group.id FROM ad_group WHERE segments.date BETWEEN \"2024-01-01\" AND \"2024-01-31\" \
             AND campaign.status = \"ENABLED\" AND metrics.clicks > 10 \
             AND ad_group.name LIKE '%brand%' LIMIT 50"
        );
    }

    #[test]
    fn single_day() {
        let gaql = AdsQuery::new("campaign")
            .with_dimensions(["campaign.id"])
            .with_date(AdsDate::Day(day(2024, 3, 5)))
            .to_gaql()
            .unwrap();
        assert!(gaql.ends_with("WHERE segments.date = \"2024-03-05\""));
    }

    #[test]
    fn needs_fields() {
        assert!(matches!(
            AdsQuery::new("campaign").to_gaql(),
            Err(AdsError::NoFields)
        ));
    }

    #[test]
    fn tidies_names() {
        assert_eq!(tidy_column_name("metrics.cost_micros"), "cost_micros");
        assert_eq!(tidy_column_name("campaign.name"), "campaign/name");
        assert_eq!(tidy_column_name("segments.date"), "segments/date");
        assert_eq!(tidy_column_name("clicks"), "clicks");
    }
}
