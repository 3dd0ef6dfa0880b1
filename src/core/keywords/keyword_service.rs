use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, error, info, warn};

use super::keyword_models::{
    HistoricalMetrics, HistoricalMetricsOptions, HistoricalMetricsRequest,
    HistoricalMetricsResult, KeywordError, KeywordIdea, KeywordIdeasRequest, KeywordMetrics,
    KeywordSeed, KeywordStatus, DEFAULT_LANGUAGE_ID, DEFAULT_LOCATION, KEYWORD_BATCH_SIZE,
};
use super::volume_trends::{
    latest_volume, three_month_trend_coef, trailing_month_dates, volume_record_date,
    VolumeTrendStats, TRAILING_MONTHS,
};
use crate::core::normalize::ads_location_id;
use crate::core::normalize::urls::is_absolute_url;
use crate::core::reports::{ApiError, RetryPolicy};
use crate::core::table::{Backend, Row, Table, TableMetadata, Value};

/// Keyword Planner idea service.
#[async_trait]
pub trait KeywordPlannerApi: Send + Sync {
    async fn generate_historical_metrics(
        &self,
        request: &HistoricalMetricsRequest,
    ) -> Result<Vec<HistoricalMetricsResult>, ApiError>;

    async fn generate_keyword_ideas(
        &self,
        request: &KeywordIdeasRequest,
    ) -> Result<Vec<KeywordIdea>, ApiError>;
}

#[async_trait]
impl KeywordPlannerApi for Box<dyn KeywordPlannerApi> {
    async fn generate_historical_metrics(
        &self,
        request: &HistoricalMetricsRequest,
    ) -> Result<Vec<HistoricalMetricsResult>, ApiError> {
        (**self).generate_historical_metrics(request).await
    }

    async fn generate_keyword_ideas(
        &self,
        request: &KeywordIdeasRequest,
    ) -> Result<Vec<KeywordIdea>, ApiError> {
        (**self).generate_keyword_ideas(request).await
    }
}

static RE_RETRY_IN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Retry in (\d+) seconds").expect("retry pattern compiles"));

/// How long to back off after a quota error: the delay the message asks for
/// plus padding, or the policy default.
pub fn quota_wait(message: &str, policy: &RetryPolicy) -> Duration {
    RE_RETRY_IN
        .captures(message)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .map(|secs| Duration::from_secs(secs) + policy.quota_wait_padding)
        .unwrap_or(policy.quota_default_wait)
}

/// Alpha-3 codes go through the bundled geo target table; numeric ids pass
/// through. Unknown codes are skipped.
pub fn location_resource_names(codes: &[String]) -> Vec<String> {
    codes
        .iter()
        .filter_map(|code| {
            let code = code.trim();
            let id = if code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase()) {
                ads_location_id(code).map(str::to_string)
            } else if !code.is_empty() && code.chars().all(|c| c.is_ascii_digit()) {
                Some(code.to_string())
            } else {
                None
            };
            if id.is_none() {
                warn!("No geo target for location code {:?}", code);
            }
            id
        })
        .map(|id| format!("geoTargetConstants/{}", id))
        .collect()
}

pub fn language_resource_name(language_id: &str) -> String {
    format!("languageConstants/{}", language_id)
}

type KeywordKey = (String, String, String);

/// One keyword as it lands in the metrics table, before de-duplication.
#[derive(Debug, Clone, PartialEq)]
struct KeywordRow {
    country_iso_code: String,
    query: String,
    keyword: String,
    status: KeywordStatus,
    metrics: KeywordMetrics,
    /// Oldest month first.
    volumes: Vec<(NaiveDate, i64)>,
}

impl KeywordRow {
    fn key(&self) -> KeywordKey {
        (
            self.country_iso_code.clone(),
            self.query.clone(),
            self.keyword.clone(),
        )
    }

    fn volume_trend(&self) -> Vec<i64> {
        self.volumes.iter().map(|(_, v)| *v).collect()
    }
}

fn zero_volumes(today: NaiveDate) -> Vec<(NaiveDate, i64)> {
    trailing_month_dates(today, TRAILING_MONTHS)
        .into_iter()
        .map(|d| (d, 0))
        .collect()
}

/// Expands results and their close variants into rows, then adds a
/// `NOT_OBTAINED` row for every requested keyword the API left out.
fn keyword_rows(
    results: Vec<HistoricalMetricsResult>,
    requested: &[String],
    country: &str,
    today: NaiveDate,
) -> Vec<KeywordRow> {
    let mut rows = Vec::new();
    for result in results {
        let volumes: Vec<(NaiveDate, i64)> = result
            .metrics
            .monthly_search_volumes
            .iter()
            .filter_map(|v| Some((volume_record_date(v.year, v.month)?, v.searches)))
            .collect();
        let (status, volumes) = if volumes.is_empty() {
            (KeywordStatus::NoVolumeData, zero_volumes(today))
        } else {
            (KeywordStatus::Obtained, volumes)
        };

        let keywords = std::iter::once(result.text.clone()).chain(result.close_variants.clone());
        for keyword in keywords {
            rows.push(KeywordRow {
                country_iso_code: country.to_string(),
                query: result.text.clone(),
                keyword,
                status,
                metrics: result.metrics.clone(),
                volumes: volumes.clone(),
            });
        }
    }

    let found: HashSet<String> = rows.iter().map(|r| r.keyword.clone()).collect();
    let mut missing_seen = HashSet::new();
    for keyword in requested {
        if found.contains(keyword) || !missing_seen.insert(keyword.clone()) {
            continue;
        }
        rows.push(KeywordRow {
            country_iso_code: country.to_string(),
            query: String::new(),
            keyword: keyword.clone(),
            status: KeywordStatus::NotObtained,
            metrics: KeywordMetrics {
                avg_monthly_searches: Some(0),
                low_top_of_page_bid_micros: Some(0),
                high_top_of_page_bid_micros: Some(0),
                ..KeywordMetrics::default()
            },
            volumes: zero_volumes(today),
        });
    }
    rows
}

const METRIC_COLUMNS: [&str; 11] = [
    "date_obtained",
    "country_iso_code",
    "query",
    "keyword",
    "status",
    "avg_searches",
    "competition",
    "competition_index",
    "low_top_of_page_bid_micros",
    "high_top_of_page_bid_micros",
    "volume_trend",
];

const CALCULATED_COLUMNS: [&str; 9] = [
    "volume_trend_coef",
    "volume",
    "volume_last_month",
    "volume_last_year",
    "volume_mom",
    "volume_yoy",
    "volume_3monthavg",
    "volume_6monthavg",
    "volume_12monthavg",
];

const MONTHLY_COLUMNS: [&str; 9] = [
    "country_iso_code",
    "date_obtained",
    "query",
    "keyword",
    "status",
    "record_date",
    "volume",
    "competition",
    "competition_index",
];

const KEY_COLUMNS: [&str; 3] = ["country_iso_code", "query", "keyword"];

fn trend_list(volumes: &[i64]) -> Value {
    Value::List(volumes.iter().map(|v| v.to_string()).collect())
}

fn metrics_row(row: &KeywordRow, today: NaiveDate, calculated_fields: bool) -> Row {
    let trend = row.volume_trend();
    let mut out = Row::new();
    out.insert("date_obtained".into(), Value::Date(today));
    out.insert("country_iso_code".into(), row.country_iso_code.clone().into());
    out.insert("query".into(), row.query.clone().into());
    out.insert("keyword".into(), row.keyword.clone().into());
    out.insert("status".into(), row.status.as_str().into());
    out.insert("avg_searches".into(), row.metrics.avg_monthly_searches.into());
    out.insert("competition".into(), row.metrics.competition.clone().into());
    out.insert("competition_index".into(), row.metrics.competition_index.into());
    out.insert(
        "low_top_of_page_bid_micros".into(),
        row.metrics.low_top_of_page_bid_micros.into(),
    );
    out.insert(
        "high_top_of_page_bid_micros".into(),
        row.metrics.high_top_of_page_bid_micros.into(),
    );
    out.insert("volume_trend".into(), trend_list(&trend));

    if calculated_fields {
        let stats = VolumeTrendStats::from_volumes(&trend);
        out.insert("volume_trend_coef".into(), stats.trend_coef.into());
        out.insert("volume".into(), stats.latest.into());
        out.insert("volume_last_month".into(), stats.previous.into());
        out.insert("volume_last_year".into(), stats.last_year.into());
        out.insert("volume_mom".into(), stats.mom.into());
        out.insert("volume_yoy".into(), stats.yoy.into());
        out.insert("volume_3monthavg".into(), stats.avg_3_months.into());
        out.insert("volume_6monthavg".into(), stats.avg_6_months.into());
        out.insert("volume_12monthavg".into(), stats.avg_12_months.into());
    }
    out
}

fn keyword_metadata(extra_key: Option<&str>) -> TableMetadata {
    let mut metadata = TableMetadata::new(Some(Backend::GoogleAds), None);
    metadata.dimensions = KEY_COLUMNS.iter().map(|c| c.to_string()).collect();
    if let Some(key) = extra_key {
        metadata.dimensions.push(key.to_string());
    }
    metadata.join_keys = metadata.dimensions.clone();
    metadata
}

/// De-duplicates rows into the metrics and monthly volume tables. The first
/// row per key wins, and only the most recent month carries competition.
fn build_tables(rows: &[KeywordRow], today: NaiveDate, calculated_fields: bool) -> HistoricalMetrics {
    let mut firsts: HashMap<KeywordKey, &KeywordRow> = HashMap::new();
    let mut order: Vec<KeywordKey> = Vec::new();
    let mut latest: HashMap<KeywordKey, NaiveDate> = HashMap::new();
    let mut months_seen: HashSet<(KeywordKey, NaiveDate)> = HashSet::new();
    let mut monthly: Vec<(KeywordKey, &KeywordRow, NaiveDate, i64)> = Vec::new();

    for row in rows {
        let key = row.key();
        if let Entry::Vacant(slot) = firsts.entry(key.clone()) {
            order.push(key.clone());
            slot.insert(row);
        }
        for &(date, volume) in &row.volumes {
            if months_seen.insert((key.clone(), date)) {
                monthly.push((key.clone(), row, date, volume));
            }
            let newest = latest.entry(key.clone()).or_insert(date);
            if date > *newest {
                *newest = date;
            }
        }
    }

    let metric_rows: Vec<Row> = order
        .iter()
        .map(|key| {
            let mut out = metrics_row(firsts[key], today, calculated_fields);
            out.insert("record_date".into(), latest.get(key).copied().into());
            out
        })
        .collect();

    let monthly_rows: Vec<Row> = monthly
        .into_iter()
        .map(|(key, row, date, volume)| {
            let first = firsts[&key];
            let is_latest = latest.get(&key) == Some(&date);
            let mut out = Row::new();
            out.insert("country_iso_code".into(), row.country_iso_code.clone().into());
            out.insert("date_obtained".into(), Value::Date(today));
            out.insert("query".into(), row.query.clone().into());
            out.insert("keyword".into(), row.keyword.clone().into());
            out.insert("status".into(), row.status.as_str().into());
            out.insert("record_date".into(), Value::Date(date));
            out.insert("volume".into(), Value::Int(volume));
            if is_latest {
                out.insert("competition".into(), first.metrics.competition.clone().into());
                out.insert(
                    "competition_index".into(),
                    first.metrics.competition_index.map(|i| i as f64).into(),
                );
            } else {
                out.insert("competition".into(), "UNSPECIFIED".into());
                out.insert("competition_index".into(), Value::Float(0.0));
            }
            out
        })
        .collect();

    let mut metric_columns: Vec<String> = METRIC_COLUMNS.iter().map(|c| c.to_string()).collect();
    if calculated_fields {
        metric_columns.extend(CALCULATED_COLUMNS.iter().map(|c| c.to_string()));
    }
    metric_columns.push("record_date".to_string());

    let mut metrics_meta = keyword_metadata(None);
    metrics_meta.metrics = vec!["avg_searches".to_string()];
    metrics_meta.row_count = metric_rows.len();
    let mut monthly_meta = keyword_metadata(Some("record_date"));
    monthly_meta.metrics = vec!["volume".to_string()];
    monthly_meta.row_count = monthly_rows.len();

    HistoricalMetrics {
        metrics: Table::new(metric_columns, metrics_meta).with_rows(metric_rows),
        monthly_volumes: Table::new(
            MONTHLY_COLUMNS.iter().map(|c| c.to_string()).collect(),
            monthly_meta,
        )
        .with_rows(monthly_rows),
    }
}

const IDEA_COLUMNS: [&str; 10] = [
    "date_obtained",
    "phrase",
    "avg_searches",
    "competition",
    "competition_index",
    "low_top_of_page_bid_micros",
    "high_top_of_page_bid_micros",
    "volume_trend",
    "volume_trend_coef",
    "latest_volume",
];

/// Historical metrics and keyword ideas from the Ads Keyword Planner.
pub struct KeywordPlanner<A: KeywordPlannerApi> {
    api: A,
    location_codes: Vec<String>,
    language_id: String,
    site_url: Option<String>,
    policy: RetryPolicy,
}

impl<A: KeywordPlannerApi> KeywordPlanner<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            location_codes: vec![DEFAULT_LOCATION.to_string()],
            language_id: DEFAULT_LANGUAGE_ID.to_string(),
            site_url: None,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_locations<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let codes: Vec<String> = codes.into_iter().map(Into::into).collect();
        if !codes.is_empty() {
            self.location_codes = codes;
        }
        self
    }

    pub fn with_language(mut self, language_id: impl Into<String>) -> Self {
        self.language_id = language_id.into();
        self
    }

    /// Base for relative keyword-idea URLs.
    pub fn with_site_url(mut self, site_url: impl Into<String>) -> Self {
        self.site_url = Some(site_url.into());
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn location_codes(&self) -> &[String] {
        &self.location_codes
    }

    /// Calls the API until it answers. Internal errors are retried a bounded
    /// number of times; quota errors are retried for as long as they last.
    async fn historical_metrics_response(
        &self,
        request: &HistoricalMetricsRequest,
    ) -> Result<Vec<HistoricalMetricsResult>, KeywordError> {
        let mut internal_failures = 0;
        loop {
            match self.api.generate_historical_metrics(request).await {
                Ok(results) => return Ok(results),
                Err(ApiError::ResourceExhausted(message)) => {
                    let wait = quota_wait(&message, &self.policy);
                    warn!("Keyword planner quota exhausted, retrying in {:?}", wait);
                    tokio::time::sleep(wait).await;
                }
                Err(ApiError::Internal(message)) => {
                    internal_failures += 1;
                    if internal_failures >= self.policy.keyword_internal_attempts {
                        error!(
                            "Keyword planner internal error after {} attempts: {}",
                            internal_failures, message
                        );
                        return Err(ApiError::Internal(message).into());
                    }
                    warn!(
                        "Keyword planner internal error ({}/{}), retrying: {}",
                        internal_failures, self.policy.keyword_internal_attempts, message
                    );
                    tokio::time::sleep(self.policy.keyword_internal_wait).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn rows_for_locations(
        &self,
        keywords: &[String],
        locations: &[String],
        language: &str,
        include_adult_keywords: bool,
        today: NaiveDate,
    ) -> Result<Vec<KeywordRow>, KeywordError> {
        let geo_target_constants = location_resource_names(locations);
        if geo_target_constants.is_empty() {
            return Err(KeywordError::NoLocations(locations.to_vec()));
        }
        let request = HistoricalMetricsRequest {
            keywords: keywords.to_vec(),
            language: language.to_string(),
            geo_target_constants,
            include_adult_keywords,
        };
        let results = self.historical_metrics_response(&request).await?;
        debug!(
            "{} historical results for {} keywords in {:?}",
            results.len(),
            keywords.len(),
            locations
        );
        Ok(keyword_rows(results, keywords, &locations.join("-"), today))
    }

    pub async fn historical_metrics(
        &self,
        keywords: &[String],
        options: &HistoricalMetricsOptions,
    ) -> Result<HistoricalMetrics, KeywordError> {
        self.historical_metrics_as_of(keywords, options, Utc::now().date_naive())
            .await
    }

    /// Volume, competition and trend figures for `keywords`, requested in
    /// batches. A failing batch ends the run; batches already fetched are
    /// kept unless none were.
    pub async fn historical_metrics_as_of(
        &self,
        keywords: &[String],
        options: &HistoricalMetricsOptions,
        today: NaiveDate,
    ) -> Result<HistoricalMetrics, KeywordError> {
        let locations = options
            .locations
            .clone()
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| self.location_codes.clone());
        let language =
            language_resource_name(options.language_id.as_deref().unwrap_or(&self.language_id));
        let batches: Vec<&[String]> = keywords.chunks(KEYWORD_BATCH_SIZE).collect();
        info!(
            "Historical metrics for {} keywords in {} batches, locations {:?}",
            keywords.len(),
            batches.len(),
            locations
        );

        let mut rows = Vec::new();
        for (index, batch) in batches.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.policy.keyword_batch_pause).await;
            }
            let fetched = if options.concat_locations {
                let mut per_location = Vec::new();
                for location in &locations {
                    match self
                        .rows_for_locations(
                            batch,
                            std::slice::from_ref(location),
                            &language,
                            options.include_adult_keywords,
                            today,
                        )
                        .await
                    {
                        Ok(found) => per_location.extend(found),
                        Err(e) => {
                            rows.extend(per_location);
                            return self.stop_or_fail(rows, e, today, options);
                        }
                    }
                }
                Ok(per_location)
            } else {
                self.rows_for_locations(
                    batch,
                    &locations,
                    &language,
                    options.include_adult_keywords,
                    today,
                )
                .await
            };

            match fetched {
                Ok(found) => rows.extend(found),
                Err(e) => return self.stop_or_fail(rows, e, today, options),
            }
        }

        Ok(build_tables(&rows, today, options.calculated_fields))
    }

    fn stop_or_fail(
        &self,
        rows: Vec<KeywordRow>,
        error: KeywordError,
        today: NaiveDate,
        options: &HistoricalMetricsOptions,
    ) -> Result<HistoricalMetrics, KeywordError> {
        if rows.is_empty() {
            return Err(error);
        }
        warn!(
            "Keyword planner stopped after {} rows: {}",
            rows.len(),
            error
        );
        Ok(build_tables(&rows, today, options.calculated_fields))
    }

    fn resolve_url(&self, url: &str) -> Result<String, KeywordError> {
        if is_absolute_url(url) {
            return Ok(url.to_string());
        }
        let site = self
            .site_url
            .as_deref()
            .ok_or_else(|| KeywordError::MissingSiteUrl(url.to_string()))?;
        let relative = url.strip_prefix('/').unwrap_or(url);
        Ok(format!("{}{}", site, relative))
    }

    pub async fn keyword_ideas(
        &self,
        url: Option<&str>,
        phrases: &[String],
    ) -> Result<Table, KeywordError> {
        self.keyword_ideas_as_of(url, phrases, Utc::now().date_naive())
            .await
    }

    /// Ideas seeded by a page, by phrases, or by both.
    pub async fn keyword_ideas_as_of(
        &self,
        url: Option<&str>,
        phrases: &[String],
        today: NaiveDate,
    ) -> Result<Table, KeywordError> {
        let page_url = url.map(|u| self.resolve_url(u)).transpose()?;
        let seed = match (page_url, phrases.is_empty()) {
            (Some(url), true) => KeywordSeed::Url(url),
            (None, false) => KeywordSeed::Keywords(phrases.to_vec()),
            (Some(url), false) => KeywordSeed::KeywordsAndUrl {
                url,
                keywords: phrases.to_vec(),
            },
            (None, true) => return Err(KeywordError::MissingSeed),
        };

        let geo_target_constants = location_resource_names(&self.location_codes);
        if geo_target_constants.is_empty() {
            return Err(KeywordError::NoLocations(self.location_codes.clone()));
        }
        let request = KeywordIdeasRequest {
            seed,
            language: language_resource_name(&self.language_id),
            geo_target_constants,
            include_adult_keywords: true,
        };
        let ideas = self.api.generate_keyword_ideas(&request).await?;
        info!("{} keyword ideas", ideas.len());

        let rows: Vec<Row> = ideas
            .into_iter()
            .map(|idea| {
                let trend: Vec<i64> = idea
                    .metrics
                    .monthly_search_volumes
                    .iter()
                    .map(|v| v.searches)
                    .collect();
                let mut out = Row::new();
                out.insert("date_obtained".into(), Value::Date(today));
                out.insert("phrase".into(), idea.text.into());
                out.insert("avg_searches".into(), idea.metrics.avg_monthly_searches.into());
                out.insert("competition".into(), idea.metrics.competition.into());
                out.insert("competition_index".into(), idea.metrics.competition_index.into());
                out.insert(
                    "low_top_of_page_bid_micros".into(),
                    idea.metrics.low_top_of_page_bid_micros.into(),
                );
                out.insert(
                    "high_top_of_page_bid_micros".into(),
                    idea.metrics.high_top_of_page_bid_micros.into(),
                );
                out.insert("volume_trend".into(), trend_list(&trend));
                out.insert("volume_trend_coef".into(), three_month_trend_coef(&trend).into());
                out.insert("latest_volume".into(), latest_volume(&trend).into());
                out
            })
            .collect();

        let mut metadata = TableMetadata::new(Some(Backend::GoogleAds), None);
        metadata.dimensions = vec!["phrase".to_string()];
        metadata.join_keys = metadata.dimensions.clone();
        metadata.metrics = vec!["avg_searches".to_string()];
        metadata.row_count = rows.len();
        Ok(Table::new(IDEA_COLUMNS.iter().map(|c| c.to_string()).collect(), metadata).with_rows(rows))
    }
}
