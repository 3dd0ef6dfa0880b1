use chrono::{NaiveDate, NaiveTime};

use super::countries::iso_code_2_to_3;
use super::naming::{camel_to_snake, clean_product_name};
use super::urls::{strip_url, url_extract_parameter, url_strip_domain};
use crate::core::table::{Row, Table, Value};

/// A column-triggered rewrite. Rules run in list order and only when the
/// trigger column is present, so the same list serves empty tables too.
pub struct NormalizationRule {
    pub trigger: &'static str,
    pub apply: fn(Table) -> Table,
}

pub fn apply_rules(mut table: Table, rules: &[NormalizationRule]) -> Table {
    for rule in rules {
        if table.has_column(rule.trigger) {
            table = (rule.apply)(table);
        }
    }
    table
}

/// GA3 and GA4 column rules, applied to vendor (camelCase) names.
pub static ANALYTICS_RULES: &[NormalizationRule] = &[
    NormalizationRule { trigger: "productName", apply: clean_product_names },
    NormalizationRule { trigger: "landingPagePlusQueryString", apply: landing_page_plus_query_string },
    NormalizationRule { trigger: "itemPurchaseQuantity", apply: item_purchase_quantity },
    NormalizationRule { trigger: "landingPagePath", apply: split_landing_page_path },
    NormalizationRule { trigger: "transactionsPerSession", apply: transactions_per_session },
    NormalizationRule { trigger: "deviceCategory", apply: device_category },
    NormalizationRule { trigger: "sourceMedium", apply: split_source_medium },
    NormalizationRule { trigger: "sessionSourceMedium", apply: split_session_source_medium },
    NormalizationRule { trigger: "date", apply: parse_analytics_date },
    NormalizationRule { trigger: "dateHourMinute", apply: split_date_hour_minute },
    NormalizationRule { trigger: "dateHour", apply: split_date_hour },
    NormalizationRule { trigger: "countryId", apply: country_id },
    NormalizationRule { trigger: "countryIsoCode", apply: country_iso_code_to_alpha3 },
];

/// Search Console column rules.
pub static SEARCH_CONSOLE_RULES: &[NormalizationRule] = &[
    NormalizationRule { trigger: "query", apply: lowercase_query },
    NormalizationRule { trigger: "page", apply: split_page },
    NormalizationRule { trigger: "device", apply: lowercase_device },
    NormalizationRule { trigger: "date", apply: parse_search_console_date },
    NormalizationRule { trigger: "country", apply: uppercase_country },
];

fn text<'a>(row: &'a Row, column: &str) -> Option<&'a str> {
    Table::value(row, column).as_str()
}

fn map_text<F>(value: &Value, f: F) -> Value
where
    F: Fn(&str) -> String,
{
    match value.as_str() {
        Some(s) => Value::Str(f(s)),
        None => value.clone(),
    }
}

fn clean_product_names(table: Table) -> Table {
    table.map_column("productName", |v| map_text(v, clean_product_name))
}

fn landing_page_plus_query_string(table: Table) -> Table {
    table.rename_column("landingPagePlusQueryString", "landingPagePath")
}

fn item_purchase_quantity(table: Table) -> Table {
    table.rename_column("itemPurchaseQuantity", "itemQuantity")
}

fn split_landing_page_path(table: Table) -> Table {
    table
        .map_column("landingPagePath", |v| map_text(v, url_strip_domain))
        .push_column("landingPage", |row| {
            text(row, "landingPagePath")
                .map(|s| s.split('?').next().unwrap_or_default().to_string())
                .into()
        })
        .push_column("landingPageParameter", |row| {
            text(row, "landingPagePath").and_then(url_extract_parameter).into()
        })
        .replace_join_key(
            "landingPagePath",
            &["landingPageFull", "landingPage", "landingPageParameter"],
        )
        .rename_column("landingPagePath", "landingPageFull")
}

fn transactions_per_session(table: Table) -> Table {
    table.rename_column("transactionsPerSession", "conversionRate")
}

fn device_category(table: Table) -> Table {
    table.rename_column("deviceCategory", "device")
}

fn split_on_slash(table: Table, column: &str) -> Table {
    table
        .push_column("source", |row| {
            text(row, column)
                .map(|s| s.split('/').next().unwrap_or_default().trim().to_string())
                .into()
        })
        .push_column("medium", |row| {
            text(row, column)
                .and_then(|s| s.split('/').nth(1))
                .map(|m| m.trim().to_string())
                .into()
        })
        .replace_join_key(column, &["source", "medium"])
        .drop_column(column)
}

fn split_source_medium(table: Table) -> Table {
    split_on_slash(table, "sourceMedium")
}

fn split_session_source_medium(table: Table) -> Table {
    split_on_slash(table, "sessionSourceMedium")
}

fn parse_compact_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.get(..8)?, "%Y%m%d").ok()
}

fn parse_analytics_date(table: Table) -> Table {
    table
        .retain_rows(|row| text(row, "date") != Some("(other)"))
        .map_column("date", |v| v.as_str().and_then(parse_compact_date).into())
        .rename_column("date", "recordDate")
}

// `YYYYMMDDHH` or `YYYYMMDDHHMM`.
fn parse_compact_time(raw: &str, with_minutes: bool) -> Option<NaiveTime> {
    let hour = raw.get(8..10)?.parse().ok()?;
    let minute = if with_minutes {
        raw.get(10..12)?.parse().ok()?
    } else {
        0
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn split_date_time(table: Table, column: &str, with_minutes: bool) -> Table {
    table
        .retain_rows(|row| text(row, column) != Some("(other)"))
        .push_column("recordDate", |row| {
            text(row, column).and_then(parse_compact_date).into()
        })
        .push_column("recordTime", |row| {
            text(row, column)
                .and_then(|s| parse_compact_time(s, with_minutes))
                .map(Value::Time)
                .unwrap_or(Value::Null)
        })
        .replace_join_key(column, &["recordDate", "recordTime"])
        .drop_column(column)
}

fn split_date_hour_minute(table: Table) -> Table {
    split_date_time(table, "dateHourMinute", true)
}

fn split_date_hour(table: Table) -> Table {
    split_date_time(table, "dateHour", false)
}

fn country_id(table: Table) -> Table {
    table.rename_column("countryId", "countryIsoCode")
}

fn country_iso_code_to_alpha3(table: Table) -> Table {
    table.map_column("countryIsoCode", |v| map_text(v, iso_code_2_to_3))
}

fn lowercase_query(table: Table) -> Table {
    table.map_column("query", |v| map_text(v, str::to_lowercase))
}

fn split_page(table: Table) -> Table {
    table
        .push_column("landing_page_parameter", |row| {
            text(row, "page").and_then(url_extract_parameter).into()
        })
        .push_column("landing_page", |row| text(row, "page").map(strip_url).into())
        .push_column("landing_page_nodomain", |row| {
            text(row, "page").map(url_strip_domain).into()
        })
        .replace_join_key(
            "page",
            &[
                "landing_page_full",
                "landing_page",
                "landing_page_parameter",
                "landing_page_nodomain",
            ],
        )
        .rename_column("page", "landing_page_full")
}

fn lowercase_device(table: Table) -> Table {
    table.map_column("device", |v| map_text(v, str::to_lowercase))
}

fn parse_search_console_date(table: Table) -> Table {
    table
        .map_column("date", |v| {
            v.as_str()
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
                .into()
        })
        .rename_column("date", "record_date")
}

fn uppercase_country(table: Table) -> Table {
    table
        .map_column("country", |v| map_text(v, str::to_uppercase))
        .rename_column("country", "country_iso_code")
}

/// Renames every column, metric and join key to snake_case.
pub fn snake_case_columns(mut table: Table) -> Table {
    for column in table.columns.clone() {
        let snake = camel_to_snake(&column);
        table = table.rename_column(&column, &snake);
    }
    for name in table
        .metadata
        .metrics
        .iter_mut()
        .chain(table.metadata.join_keys.iter_mut())
    {
        *name = camel_to_snake(name);
    }
    table
}

/// Metric cells become floats; anything unparseable becomes `Null`.
pub fn coerce_metrics(mut table: Table) -> Table {
    for metric in table.metadata.metrics.clone() {
        table = table.map_column(&metric, Value::to_float);
    }
    table
}

/// Tables without a per-row date get the query range stamped on every row
/// as `record_date_start` and `record_date`, both added to the join keys.
pub fn ensure_record_date(table: Table) -> Table {
    if table.has_column("record_date") {
        return table;
    }
    match table.metadata.date_range {
        Some(range) => table
            .insert_column_at(0, "record_date", move |_| Value::Date(range.end))
            .insert_column_at(0, "record_date_start", move |_| Value::Date(range.start))
            .add_join_key("record_date")
            .add_join_key("record_date_start"),
        None => table,
    }
}
