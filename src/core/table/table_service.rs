use std::collections::{HashMap, HashSet};

use super::table_models::{ErrorTag, Row, Table, TableError, TableMetadata, Value};
use crate::core::normalize::classify::is_google_organic;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinHow {
    Inner,
    Left,
    Right,
    Outer,
}

fn union(left: &[String], right: &[String]) -> Vec<String> {
    let mut out = left.to_vec();
    for item in right {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    out
}

// Left value wins unless it is missing or null.
fn merge_rows(primary: &Row, secondary: &Row, columns: &[String]) -> Row {
    columns
        .iter()
        .map(|column| {
            let value = match primary.get(column) {
                Some(v) if !v.is_null() => v.clone(),
                _ => secondary.get(column).cloned().unwrap_or(Value::Null),
            };
            (column.clone(), value)
        })
        .collect()
}

fn merge_metadata(left: &TableMetadata, right: &TableMetadata, rows: usize) -> TableMetadata {
    let date_range = match (left.date_range, right.date_range) {
        (Some(a), Some(b)) => Some(a.union(&b)),
        (a, b) => a.or(b),
    };

    let failure = [left, right]
        .into_iter()
        .find(|m| m.error_tag.map(|t| t.is_failure()).unwrap_or(false));
    let (error_tag, error_message) = match failure {
        Some(m) => (m.error_tag, m.error_message.clone()),
        None if rows == 0 => [left, right]
            .into_iter()
            .find(|m| m.error_tag == Some(ErrorTag::EmptyResponse))
            .map(|m| (m.error_tag, m.error_message.clone()))
            .unwrap_or((None, None)),
        None => (None, None),
    };

    TableMetadata {
        dimensions: union(&left.dimensions, &right.dimensions),
        metrics: union(&left.metrics, &right.metrics),
        join_keys: left.join_keys.clone(),
        date_range,
        error_tag,
        error_message,
        source: left.source.or(right.source),
        row_count: rows,
        obtained_at: left.obtained_at.min(right.obtained_at),
        response_aggregation: left
            .response_aggregation
            .clone()
            .or_else(|| right.response_aggregation.clone()),
        quota: right.quota.clone().or_else(|| left.quota.clone()),
        currency_code: left.currency_code.clone().or_else(|| right.currency_code.clone()),
        time_zone: left.time_zone.clone().or_else(|| right.time_zone.clone()),
    }
}

/// Joins two tables on their join keys, which must be the same set.
pub fn join_on_dimensions(left: Table, right: Table, how: JoinHow) -> Result<Table, TableError> {
    let left_keys: HashSet<&String> = left.metadata.join_keys.iter().collect();
    let right_keys: HashSet<&String> = right.metadata.join_keys.iter().collect();
    if left_keys != right_keys {
        return Err(TableError::MismatchedJoinDimensions {
            left: left.metadata.join_keys.clone(),
            right: right.metadata.join_keys.clone(),
        });
    }
    if how == JoinHow::Right {
        return join_on_dimensions(right, left, JoinHow::Left);
    }

    let keys = left.metadata.join_keys.clone();
    let key_of = |row: &Row| -> Vec<String> {
        keys.iter()
            .map(|k| Table::value(row, k).key_fragment())
            .collect()
    };

    let mut index: HashMap<Vec<String>, Vec<usize>> = HashMap::new();
    for (i, row) in right.rows.iter().enumerate() {
        index.entry(key_of(row)).or_default().push(i);
    }

    let columns = union(&left.columns, &right.columns);
    let empty = Row::new();
    let mut matched = vec![false; right.rows.len()];
    let mut rows = Vec::with_capacity(left.rows.len().max(right.rows.len()));

    for left_row in &left.rows {
        match index.get(&key_of(left_row)) {
            Some(hits) => {
                for &i in hits {
                    matched[i] = true;
                    rows.push(merge_rows(left_row, &right.rows[i], &columns));
                }
            }
            None if matches!(how, JoinHow::Left | JoinHow::Outer) => {
                rows.push(merge_rows(left_row, &empty, &columns));
            }
            None => {}
        }
    }

    if how == JoinHow::Outer {
        for (i, right_row) in right.rows.iter().enumerate() {
            if !matched[i] {
                rows.push(merge_rows(&empty, right_row, &columns));
            }
        }
    }

    let metadata = merge_metadata(&left.metadata, &right.metadata, rows.len());
    Ok(Table::new(columns, metadata).with_rows(rows))
}

fn numeric_columns(table: &Table) -> Vec<String> {
    table
        .columns
        .iter()
        .filter(|column| {
            if table.metadata.metrics.contains(*column) {
                return true;
            }
            let mut seen_number = false;
            for row in &table.rows {
                match row.get(column.as_str()) {
                    Some(v) if v.is_numeric() => seen_number = true,
                    Some(Value::Null) | None => {}
                    Some(_) => return false,
                }
            }
            // All-null columns count as numeric.
            seen_number || !table.rows.is_empty()
        })
        .cloned()
        .collect()
}

/// Replaces missing values in numeric columns with `0.0`.
pub fn fill_missing_metrics(mut table: Table) -> Table {
    for column in numeric_columns(&table) {
        for row in &mut table.rows {
            let cell = row.entry(column.clone()).or_insert(Value::Null);
            if cell.is_null() {
                *cell = Value::Float(0.0);
            }
        }
    }
    table
}

/// Keeps only google / organic rows and drops the source and medium columns.
pub fn filter_google_organic(table: Table) -> Table {
    if !(table.has_column("source") && table.has_column("medium")) {
        return table;
    }
    table
        .retain_rows(|row| {
            match (
                Table::value(row, "source").as_str(),
                Table::value(row, "medium").as_str(),
            ) {
                (Some(s), Some(m)) => is_google_organic(s, m),
                _ => false,
            }
        })
        .drop_column("source")
        .drop_column("medium")
}

/// Prepends a `row_id` column numbering rows from zero.
pub fn add_row_id(mut table: Table) -> Table {
    for (i, row) in table.rows.iter_mut().enumerate() {
        row.insert("row_id".to_string(), Value::Int(i as i64));
    }
    if !table.has_column("row_id") {
        table.columns.insert(0, "row_id".to_string());
    }
    table
}

/// `true`/truthy -> 1, everything else -> 0.
pub fn bool_column_to_int(table: Table, column: &str) -> Table {
    table.map_column(column, |v| {
        let truthy = match v {
            Value::Bool(b) => *b,
            Value::Null => false,
            other => other.as_f64().map(|f| f != 0.0).unwrap_or(true),
        };
        Value::Int(truthy as i64)
    })
}

pub const DEFAULT_POSITION_BINS: [f64; 7] = [0.0, 5.0, 10.0, 20.0, 40.0, 80.0, f64::INFINITY];

fn bin_label(low: f64, high: f64) -> String {
    let fmt = |x: f64| {
        if x.is_infinite() {
            "inf".to_string()
        } else {
            format!("{}", x)
        }
    };
    format!("({}, {}]", fmt(low), fmt(high))
}

/// Buckets rows by `position` into right-closed bins and sums clicks and
/// impressions per bucket. Every bin appears in the output, empty or not.
pub fn bin_by_position(table: &Table, bins: &[f64]) -> Result<Table, TableError> {
    if bins.len() < 2 || bins.windows(2).any(|w| w[0] >= w[1]) {
        return Err(TableError::InvalidBins(format!("{:?}", bins)));
    }
    if !table.has_column("position") {
        return Err(TableError::MissingColumn("position".to_string()));
    }

    let mut totals = vec![(0i64, 0.0f64, 0.0f64); bins.len() - 1];
    for row in &table.rows {
        let Some(position) = Table::value(row, "position").as_f64() else {
            continue;
        };
        let Some(bucket) = bins.windows(2).position(|w| position > w[0] && position <= w[1]) else {
            continue;
        };
        let entry = &mut totals[bucket];
        entry.0 += 1;
        entry.1 += Table::value(row, "clicks").as_f64().unwrap_or(0.0);
        entry.2 += Table::value(row, "impressions").as_f64().unwrap_or(0.0);
    }

    let rows = bins
        .windows(2)
        .zip(totals)
        .map(|(w, (queries, clicks, impressions))| {
            let mut row = Row::new();
            row.insert("position".into(), Value::Str(bin_label(w[0], w[1])));
            row.insert("queries".into(), Value::Int(queries));
            row.insert("clicks".into(), Value::Float(clicks));
            row.insert("impressions".into(), Value::Float(impressions));
            row
        })
        .collect();

    let mut metadata = TableMetadata::new(table.metadata.source, table.metadata.date_range);
    metadata.dimensions = vec!["position".into()];
    metadata.metrics = vec!["queries".into(), "clicks".into(), "impressions".into()];
    metadata.join_keys = vec!["position".into()];
    let columns = vec![
        "position".to_string(),
        "queries".to_string(),
        "clicks".to_string(),
        "impressions".to_string(),
    ];
    Ok(Table::new(columns, metadata).with_rows(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::query::DateRange;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn keyed_table(key: &str, metric: &str, rows: &[(&str, f64)]) -> Table {
        let mut meta = TableMetadata::new(None, None);
        meta.join_keys = vec![key.to_string()];
        meta.metrics = vec![metric.to_string()];
        let rows = rows
            .iter()
            .map(|(k, v)| {
                let mut row = Row::new();
                row.insert(key.to_string(), Value::from(*k));
                row.insert(metric.to_string(), Value::from(*v));
                row
            })
            .collect();
        Table::new(vec![key.to_string(), metric.to_string()], meta).with_rows(rows)
    }

    fn row_set(table: &Table) -> Vec<String> {
        let mut columns = table.columns.clone();
        columns.sort();
        let mut out: Vec<String> = table
            .rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|c| format!("{}={:?}", c, Table::value(row, c)))
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .collect();
        out.sort();
        out
    }

    #[test]
    fn outer_join_fills_both_sides() {
        let left = keyed_table("device", "sessions", &[("mobile", 3.0), ("desktop", 5.0)]);
        let right = keyed_table("device", "users", &[("mobile", 2.0), ("tablet", 1.0)]);
        let joined = join_on_dimensions(left, right, JoinHow::Outer).unwrap();

        assert_eq!(joined.columns, ["device", "sessions", "users"]);
        assert_eq!(joined.len(), 3);
        assert_eq!(joined.metadata.metrics, ["sessions", "users"]);
        let tablet = joined
            .rows
            .iter()
            .find(|r| r["device"] == Value::from("tablet"))
            .unwrap();
        assert_eq!(tablet["sessions"], Value::Null);
    }

    #[test]
    fn inner_and_left_joins() {
        let left = keyed_table("device", "sessions", &[("mobile", 3.0), ("desktop", 5.0)]);
        let right = keyed_table("device", "users", &[("mobile", 2.0)]);
        assert_eq!(
            join_on_dimensions(left.clone(), right.clone(), JoinHow::Inner).unwrap().len(),
            1
        );
        assert_eq!(join_on_dimensions(left, right, JoinHow::Left).unwrap().len(), 2);
    }

    #[test]
    fn mismatched_join_keys_fail() {
        let left = keyed_table("device", "sessions", &[]);
        let right = keyed_table("country", "users", &[]);
        let err = join_on_dimensions(left, right, JoinHow::Outer).unwrap_err();
        assert!(matches!(err, TableError::MismatchedJoinDimensions { .. }));
    }

    #[test]
    fn join_merges_date_ranges_and_tags() {
        let day = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
        let mut left = keyed_table("device", "sessions", &[]);
        left.metadata.date_range = Some(DateRange::new(day(5), day(10)).unwrap());
        left.metadata.error_tag = Some(ErrorTag::EmptyResponse);
        let mut right = keyed_table("device", "users", &[]);
        right.metadata.date_range = Some(DateRange::new(day(1), day(7)).unwrap());
        right.metadata.error_tag = Some(ErrorTag::QuotaReached);

        let joined = join_on_dimensions(left, right, JoinHow::Outer).unwrap();
        assert_eq!(joined.metadata.date_range, Some(DateRange::new(day(1), day(10)).unwrap()));
        assert_eq!(joined.error_tag(), Some(ErrorTag::QuotaReached));
    }

    #[test]
    fn empty_response_tag_cleared_once_rows_exist() {
        let mut left = keyed_table("device", "sessions", &[]);
        left.metadata.error_tag = Some(ErrorTag::EmptyResponse);
        let right = keyed_table("device", "users", &[("mobile", 1.0)]);
        let joined = join_on_dimensions(left, right, JoinHow::Outer).unwrap();
        assert_eq!(joined.error_tag(), None);
    }

    #[test]
    fn fills_missing_metrics_with_zero() {
        let left = keyed_table("device", "sessions", &[("mobile", 3.0)]);
        let right = keyed_table("device", "users", &[("tablet", 1.0)]);
        let joined = fill_missing_metrics(join_on_dimensions(left, right, JoinHow::Outer).unwrap());
        for row in &joined.rows {
            assert!(!row["sessions"].is_null());
            assert!(!row["users"].is_null());
        }
        assert!(joined.rows.iter().all(|r| !r["device"].is_null()));
    }

    #[test]
    fn google_organic_filter_drops_columns() {
        let mut meta = TableMetadata::new(None, None);
        meta.join_keys = vec!["source".into(), "medium".into()];
        let rows = vec![("google", "organic"), ("google", "cpc"), ("bing", "organic")]
            .into_iter()
            .map(|(s, m)| {
                let mut row = Row::new();
                row.insert("source".into(), Value::from(s));
                row.insert("medium".into(), Value::from(m));
                row
            })
            .collect();
        let table = Table::new(vec!["source".into(), "medium".into()], meta).with_rows(rows);
        let filtered = filter_google_organic(table);
        assert_eq!(filtered.len(), 1);
        assert!(filtered.columns.is_empty());
    }

    #[test]
    fn row_ids_and_bool_ints() {
        let table = keyed_table("device", "sessions", &[("a", 0.0), ("b", 2.0)]);
        let table = bool_column_to_int(add_row_id(table), "sessions");
        assert_eq!(table.columns[0], "row_id");
        assert_eq!(table.rows[1]["row_id"], Value::Int(1));
        assert_eq!(table.rows[0]["sessions"], Value::Int(0));
        assert_eq!(table.rows[1]["sessions"], Value::Int(1));
    }

    #[test]
    fn bins_positions() {
        let mut meta = TableMetadata::new(None, None);
        meta.metrics = vec!["clicks".into(), "impressions".into(), "position".into()];
        let rows = [(1.0, 2.0, 3.0), (4.0, 1.0, 5.0), (12.0, 0.0, 90.0)]
            .into_iter()
            .map(|(pos, clicks, imps)| {
                let mut row = Row::new();
                row.insert("position".into(), Value::Float(pos));
                row.insert("clicks".into(), Value::Float(clicks));
                row.insert("impressions".into(), Value::Float(imps));
                row
            })
            .collect();
        let table = Table::new(
            vec!["position".into(), "clicks".into(), "impressions".into()],
            meta,
        )
        .with_rows(rows);

        let binned = bin_by_position(&table, &DEFAULT_POSITION_BINS).unwrap();
        assert_eq!(binned.len(), 6);
        assert_eq!(binned.rows[0]["position"], Value::from("(0, 5]"));
        assert_eq!(binned.rows[0]["queries"], Value::Int(2));
        assert_eq!(binned.rows[0]["clicks"], Value::Float(3.0));
        assert_eq!(binned.rows[2]["queries"], Value::Int(1));
        assert_eq!(binned.rows[5]["position"], Value::from("(80, inf]"));
        assert!(bin_by_position(&table, &[5.0, 1.0]).is_err());
    }

    fn arb_rows() -> impl Strategy<Value = Vec<(String, f64)>> {
        prop::collection::btree_map("[a-e]", 0u32..100, 0..5).prop_map(|m| {
            m.into_iter().map(|(k, v)| (k, v as f64)).collect()
        })
    }

    proptest! {
        #[test]
        fn outer_join_is_commutative(left_rows in arb_rows(), right_rows in arb_rows()) {
            let l: Vec<(&str, f64)> = left_rows.iter().map(|(k, v)| (k.as_str(), *v)).collect();
            let r: Vec<(&str, f64)> = right_rows.iter().map(|(k, v)| (k.as_str(), *v)).collect();

            let left = keyed_table("key", "left_metric", &l);
            let right = keyed_table("key", "right_metric", &r);

            let lr = join_on_dimensions(left.clone(), right.clone(), JoinHow::Outer).unwrap();
            let rl = join_on_dimensions(right, left, JoinHow::Outer).unwrap();

            prop_assert_eq!(row_set(&lr), row_set(&rl));
        }
    }
}
