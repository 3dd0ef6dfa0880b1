use std::collections::HashMap;

use once_cell::sync::Lazy;

const COUNTRY_ISO_CODES: &str = include_str!("../../../data/country_iso_codes.csv");
const ADS_LOCATION_IDS: &str = include_str!("../../../data/google_ads_location_ids.csv");

/// Fallback for codes that are not in the reference table.
pub const UNKNOWN_ISO_3: &str = "ZZZ";

struct CountryTables {
    alpha2_to_alpha3: HashMap<String, String>,
    alpha3_to_ads_id: HashMap<String, String>,
}

// Rows are `name,code,code`; names never contain commas.
fn parse_pairs(csv: &str) -> HashMap<String, String> {
    csv.lines()
        .filter_map(|line| {
            let mut fields = line.trim().split(',');
            let _name = fields.next()?;
            let key = fields.next()?.trim();
            let value = fields.next()?.trim();
            (!key.is_empty() && !value.is_empty()).then(|| (key.to_string(), value.to_string()))
        })
        .collect()
}

static TABLES: Lazy<CountryTables> = Lazy::new(|| CountryTables {
    alpha2_to_alpha3: parse_pairs(COUNTRY_ISO_CODES),
    alpha3_to_ads_id: parse_pairs(ADS_LOCATION_IDS),
});

/// `GB` -> `GBR`; unknown codes map to `ZZZ`.
pub fn iso_code_2_to_3(code: &str) -> String {
    match code {
        "GB" => "GBR".to_string(),
        "US" => "USA".to_string(),
        other => TABLES
            .alpha2_to_alpha3
            .get(other)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_ISO_3.to_string()),
    }
}

/// Google Ads geo target id for a 3-letter country code.
pub fn ads_location_id(alpha3: &str) -> Option<&'static str> {
    TABLES
        .alpha3_to_ads_id
        .get(&alpha3.to_ascii_uppercase())
        .map(String::as_str)
}
