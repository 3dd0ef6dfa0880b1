pub mod classify;
pub mod countries;
pub mod naming;
pub mod normalize_service;
pub mod rules;
pub mod urls;

pub use countries::{ads_location_id, iso_code_2_to_3};
pub use naming::{camel_to_snake, snake_to_camel};
pub use normalize_service::{
    empty_analytics_table, normalize, normalize_ga3, normalize_ga4, normalize_gsc,
    normalize_url_inspection, SEARCH_CONSOLE_METRICS,
};
pub use rules::{apply_rules, NormalizationRule, ANALYTICS_RULES, SEARCH_CONSOLE_RULES};
pub use urls::{strip_url, url_extract_parameter, url_strip_domain};
