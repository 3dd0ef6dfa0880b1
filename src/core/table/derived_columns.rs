use regex::Regex;

use super::table_models::{Row, Table, Value};
use crate::core::normalize::classify;
use crate::core::normalize::urls::path_segment;

fn text<'a>(row: &'a Row, column: &str) -> Option<&'a str> {
    Table::value(row, column).as_str()
}

fn flag_after<F>(table: Table, anchor: &str, name: &str, predicate: F) -> Table
where
    F: Fn(&str) -> bool,
{
    if !table.has_column(anchor) {
        return table;
    }
    table.insert_column_after(anchor, name, |row| {
        text(row, anchor).map(|s| predicate(s)).into()
    })
}

pub fn add_google_organic_column(table: Table) -> Table {
    if !(table.has_column("source") && table.has_column("medium")) {
        return table;
    }
    table.insert_column_after("medium", "is_google_organic", |row| {
        match (text(row, "source"), text(row, "medium")) {
            (Some(s), Some(m)) => Value::Bool(classify::is_google_organic(s, m)),
            _ => Value::Bool(false),
        }
    })
}

pub fn add_new_user_column(table: Table) -> Table {
    flag_after(table, "user_type", "is_new_user", classify::is_new_user)
}

pub fn add_shopping_stage_all_column(table: Table) -> Table {
    flag_after(
        table,
        "shopping_stage",
        "shopping_stage_all",
        classify::is_shopping_stage_all,
    )
}

pub fn add_has_site_search_column(table: Table) -> Table {
    flag_after(table, "search_used", "has_site_search", classify::has_site_search)
}

pub fn add_has_item_column(table: Table) -> Table {
    if !table.has_column("item_quantity") {
        return table;
    }
    table.insert_column_after("item_quantity", "has_item", |row| {
        Table::value(row, "item_quantity")
            .as_f64()
            .map(|q| q > 0.0)
            .into()
    })
}

/// The boolean columns GA reports get when `add_boolean_metrics` is on.
pub fn add_analytics_boolean_columns(table: Table) -> Table {
    let table = add_google_organic_column(table);
    let table = add_has_item_column(table);
    let table = add_new_user_column(table);
    let table = add_shopping_stage_all_column(table);
    add_has_site_search_column(table)
}

/// `is_question`, `is_transactional` and `is_investigation`, in that order
/// after `query`.
pub fn add_search_console_boolean_columns(table: Table) -> Table {
    let table = flag_after(table, "query", "is_investigation", classify::is_investigation);
    let table = flag_after(table, "query", "is_transactional", classify::is_transactional);
    flag_after(table, "query", "is_question", classify::is_question)
}

pub fn add_branded_column(table: Table, branded: &Regex) -> Table {
    flag_after(table, "query", "is_branded", |q| branded.is_match(q))
}

/// First and second path segments of `landing_page` as `lp_sub1`/`lp_sub2`.
pub fn add_landing_page_subdomains(table: Table) -> Table {
    if !table.has_column("landing_page") {
        return table;
    }
    table
        .insert_column_after("landing_page", "lp_sub1", |row| {
            text(row, "landing_page").map(|p| path_segment(p, 1)).into()
        })
        .insert_column_after("lp_sub1", "lp_sub2", |row| {
            text(row, "landing_page").map(|p| path_segment(p, 2)).into()
        })
}

/// How product names or queries are grouped into labels.
#[derive(Debug, Clone)]
pub enum Labeler {
    /// First whitespace-separated word.
    FirstWord,
    /// First matching `(label, pattern)`; `other` when none match.
    Regex(Vec<(String, Regex)>),
    /// Nothing; every row gets an empty label.
    Blank,
}

impl Labeler {
    pub fn label(&self, text: &str) -> String {
        match self {
            Labeler::FirstWord => text.split(' ').next().unwrap_or_default().to_string(),
            Labeler::Regex(patterns) => {
                let lowered = text.to_lowercase();
                patterns
                    .iter()
                    .find(|(_, re)| re.is_match(&lowered))
                    .map(|(label, _)| label.clone())
                    .unwrap_or_else(|| "other".to_string())
            }
            Labeler::Blank => String::new(),
        }
    }
}

/// Inserts `brand` after `product_name`.
pub fn add_brand_column(table: Table, labeler: &Labeler) -> Table {
    if !table.has_column("product_name") {
        return table;
    }
    table.insert_column_after("product_name", "brand", |row| {
        text(row, "product_name").map(|p| labeler.label(p)).into()
    })
}

/// Inserts `category` and `subcategory` after `anchor` (`product_name` for
/// GA, `query` for Search Console).
pub fn add_category_columns(
    table: Table,
    anchor: &str,
    category: &Labeler,
    subcategory: &Labeler,
) -> Table {
    if !table.has_column(anchor) {
        return table;
    }
    table
        .insert_column_after(anchor, "category", |row| {
            text(row, anchor).map(|p| category.label(p)).into()
        })
        .insert_column_after("category", "subcategory", |row| {
            text(row, anchor).map(|p| subcategory.label(p)).into()
        })
}
