pub mod ads_models;
pub mod ads_service;
pub mod gaql;

pub use ads_models::{AdsCondition, AdsDate, AdsError, AdsQuery, AdsValue};
pub use ads_service::{extract_field, AdsReports, AdsSearchApi};
pub use gaql::{build_gaql, metric_field, tidy_column_name};
