use serde::{Deserialize, Serialize};

use crate::core::reports::ApiError;
use crate::core::table::{Table, TableError};

/// Location used when a caller names none.
pub const DEFAULT_LOCATION: &str = "GBR";
/// English.
pub const DEFAULT_LANGUAGE_ID: &str = "1000";
pub const KEYWORD_BATCH_SIZE: usize = 2000;
pub const KEYWORD_PLAN_NETWORK: &str = "GOOGLE_SEARCH_AND_PARTNERS";

#[derive(Debug, thiserror::Error)]
pub enum KeywordError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("keyword ideas need a url or at least one phrase")]
    MissingSeed,
    #[error("relative url {0} needs a configured site url")]
    MissingSiteUrl(String),
    #[error("none of the location codes {0:?} map to a geo target")]
    NoLocations(Vec<String>),
}

/// How a keyword's row was filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeywordStatus {
    Obtained,
    NoVolumeData,
    NotObtained,
}

impl KeywordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeywordStatus::Obtained => "OBTAINED",
            KeywordStatus::NoVolumeData => "NO_VOLUME_DATA",
            KeywordStatus::NotObtained => "NOT_OBTAINED",
        }
    }
}

impl std::fmt::Display for KeywordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthlyVolume {
    pub year: i32,
    /// 1-based.
    pub month: u32,
    pub searches: i64,
}

/// Search volume and bid figures for one keyword.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeywordMetrics {
    pub avg_monthly_searches: Option<i64>,
    pub competition: String,
    pub competition_index: Option<i64>,
    pub low_top_of_page_bid_micros: Option<i64>,
    pub high_top_of_page_bid_micros: Option<i64>,
    /// Oldest month first.
    pub monthly_search_volumes: Vec<MonthlyVolume>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalMetricsResult {
    pub text: String,
    pub close_variants: Vec<String>,
    pub metrics: KeywordMetrics,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeywordIdea {
    pub text: String,
    pub metrics: KeywordMetrics,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalMetricsRequest {
    pub keywords: Vec<String>,
    /// `languageConstants/<id>`.
    pub language: String,
    /// `geoTargetConstants/<id>`.
    pub geo_target_constants: Vec<String>,
    pub include_adult_keywords: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum KeywordSeed {
    Url(String),
    Keywords(Vec<String>),
    KeywordsAndUrl { url: String, keywords: Vec<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeywordIdeasRequest {
    pub seed: KeywordSeed,
    pub language: String,
    pub geo_target_constants: Vec<String>,
    pub include_adult_keywords: bool,
}

/// Per-call switches for historical metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalMetricsOptions {
    /// ISO alpha-3 codes or numeric geo target ids. `None` uses the
    /// planner's configured locations.
    pub locations: Option<Vec<String>>,
    pub language_id: Option<String>,
    pub include_adult_keywords: bool,
    /// Add the trend statistic columns to the metrics table.
    pub calculated_fields: bool,
    /// Request each location separately.
    pub concat_locations: bool,
}

impl Default for HistoricalMetricsOptions {
    fn default() -> Self {
        Self {
            locations: None,
            language_id: None,
            include_adult_keywords: true,
            calculated_fields: true,
            concat_locations: true,
        }
    }
}

/// The two tables produced from one historical-metrics run.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalMetrics {
    /// One row per country, query and keyword.
    pub metrics: Table,
    /// One row per country, query, keyword and month.
    pub monthly_volumes: Table,
}
