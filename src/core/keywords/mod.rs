pub mod keyword_models;
pub mod keyword_service;
pub mod volume_trends;

pub use keyword_models::{
    HistoricalMetrics, HistoricalMetricsOptions, HistoricalMetricsRequest,
    HistoricalMetricsResult, KeywordError, KeywordIdea, KeywordIdeasRequest, KeywordMetrics,
    KeywordSeed, KeywordStatus, MonthlyVolume, DEFAULT_LANGUAGE_ID, DEFAULT_LOCATION,
    KEYWORD_BATCH_SIZE, KEYWORD_PLAN_NETWORK,
};
pub use keyword_service::{
    language_resource_name, location_resource_names, quota_wait, KeywordPlanner,
    KeywordPlannerApi,
};
pub use volume_trends::{month_name, month_number, VolumeTrendStats};
