use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static UPPERCASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Z]").expect("uppercase pattern compiles"));

static UNICODE_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\u[a-f\d]{4}").expect("escape pattern compiles"));

static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern compiles"));

/// `landingPagePath` -> `landing_page_path`. Applying it twice changes nothing.
pub fn camel_to_snake(name: &str) -> String {
    UPPERCASE
        .replace_all(name, |caps: &Captures| {
            let m = caps.get(0).map(|m| (m.start(), m.as_str())).unwrap_or((0, ""));
            if m.0 == 0 {
                m.1.to_string()
            } else {
                format!("_{}", m.1)
            }
        })
        .to_lowercase()
}

/// `cost_micros` -> `costMicros`, the casing of REST field names.
pub fn snake_to_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for c in name.chars() {
        if c == '_' {
            upper_next = !out.is_empty();
        } else if upper_next {
            out.push(c.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Lowercases, turns `-`/`_` and literal `\uXXXX` escapes into spaces,
/// unescapes `&amp;` and collapses whitespace.
pub fn clean_product_name(name: &str) -> String {
    let lowered = name
        .trim()
        .to_lowercase()
        .replace(['-', '_'], " ")
        .replace("&amp;", "&");
    let unescaped = UNICODE_ESCAPE.replace_all(&lowered, " ");
    WHITESPACE_RUN.replace_all(&unescaped, " ").trim().to_string()
}

/// Removes the `ga:` prefix GA3 puts on every header.
pub fn strip_ga_prefix(name: &str) -> &str {
    name.strip_prefix("ga:").unwrap_or(name)
}

pub fn with_ga_prefix(name: &str) -> String {
    format!("ga:{}", strip_ga_prefix(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn converts_vendor_names() {
        assert_eq!(camel_to_snake("landingPagePath"), "landing_page_path");
        assert_eq!(camel_to_snake("date"), "date");
        assert_eq!(camel_to_snake("countryIsoCode"), "country_iso_code");
        assert_eq!(camel_to_snake("Sessions"), "sessions");
    }

    #[test]
    fn converts_to_rest_casing() {
        assert_eq!(snake_to_camel("cost_micros"), "costMicros");
        assert_eq!(snake_to_camel("advertising_channel_type"), "advertisingChannelType");
        assert_eq!(snake_to_camel("clicks"), "clicks");
        assert_eq!(snake_to_camel("costMicros"), "costMicros");
    }

    #[test]
    fn cleans_product_names() {
        assert_eq!(clean_product_name(" Red\\u00a0Shoe   Large "), "red shoe large");
        assert_eq!(clean_product_name("Salt_&amp;-Pepper"), "salt & pepper");
    }

    #[test]
    fn ga_prefix_helpers() {
        assert_eq!(strip_ga_prefix("ga:sessions"), "sessions");
        assert_eq!(with_ga_prefix("sessions"), "ga:sessions");
        assert_eq!(with_ga_prefix("ga:sessions"), "ga:sessions");
    }

    proptest! {
        #[test]
        fn camel_to_snake_is_idempotent(name in "[a-zA-Z][a-zA-Z0-9]{0,20}") {
            let once = camel_to_snake(&name);
            prop_assert_eq!(camel_to_snake(&once), once.clone());
        }
    }
}
