use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value as JsonValue};
use tracing::debug;

use super::google_http::GoogleHttp;
use crate::core::ads::AdsSearchApi;
use crate::core::keywords::{
    HistoricalMetricsRequest, HistoricalMetricsResult, KeywordIdea, KeywordIdeasRequest,
    KeywordMetrics, KeywordPlannerApi, KeywordSeed, MonthlyVolume, KEYWORD_PLAN_NETWORK,
    month_number,
};
use crate::core::reports::ApiError;

pub const GOOGLE_ADS_API_VERSION: &str = "v17";
const GOOGLE_ADS_URL: &str = "https://googleads.googleapis.com";
/// Upper bound on keyword idea pages followed for one request.
const MAX_IDEA_PAGES: usize = 50;

/// Google Ads REST client: Keyword Planner and GAQL search.
#[derive(Clone)]
pub struct AdsClient {
    http: GoogleHttp,
    developer_token: String,
    login_customer_id: Option<String>,
    customer_id: String,
}

impl AdsClient {
    pub fn new(
        http: GoogleHttp,
        developer_token: impl Into<String>,
        customer_id: impl Into<String>,
    ) -> Self {
        Self {
            http,
            developer_token: developer_token.into(),
            login_customer_id: None,
            customer_id: customer_id.into(),
        }
    }

    /// Manager account the calls are made through.
    pub fn with_login_customer_id(mut self, id: Option<String>) -> Self {
        self.login_customer_id = id.filter(|i| !i.is_empty());
        self
    }

    pub fn customer_id(&self) -> &str {
        &self.customer_id
    }

    fn customer_url(&self, customer_id: &str, method: &str) -> String {
        format!(
            "{}/{}/customers/{}{}",
            GOOGLE_ADS_URL, GOOGLE_ADS_API_VERSION, customer_id, method
        )
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        body: &JsonValue,
    ) -> Result<T, ApiError> {
        let mut headers = vec![("developer-token", self.developer_token.as_str())];
        if let Some(login) = &self.login_customer_id {
            headers.push(("login-customer-id", login.as_str()));
        }
        self.http.post_json(url, body, &headers).await
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Int64Repr {
    Num(i64),
    Str(String),
}

/// The REST API sends int64 fields as JSON strings.
fn opt_int64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Int64Repr>::deserialize(deserializer)? {
        Some(Int64Repr::Num(n)) => Some(n),
        Some(Int64Repr::Str(s)) => s.parse().ok(),
        None => None,
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiKeywordMetrics {
    #[serde(default)]
    monthly_search_volumes: Vec<ApiMonthlyVolume>,
    #[serde(default, deserialize_with = "opt_int64")]
    avg_monthly_searches: Option<i64>,
    #[serde(default)]
    competition: Option<String>,
    #[serde(default, deserialize_with = "opt_int64")]
    competition_index: Option<i64>,
    #[serde(default, deserialize_with = "opt_int64")]
    low_top_of_page_bid_micros: Option<i64>,
    #[serde(default, deserialize_with = "opt_int64")]
    high_top_of_page_bid_micros: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiMonthlyVolume {
    #[serde(default)]
    month: String,
    #[serde(default, deserialize_with = "opt_int64")]
    year: Option<i64>,
    #[serde(default, deserialize_with = "opt_int64")]
    monthly_searches: Option<i64>,
}

impl From<ApiKeywordMetrics> for KeywordMetrics {
    fn from(api: ApiKeywordMetrics) -> Self {
        KeywordMetrics {
            avg_monthly_searches: api.avg_monthly_searches,
            competition: api.competition.unwrap_or_else(|| "UNSPECIFIED".to_string()),
            competition_index: api.competition_index,
            low_top_of_page_bid_micros: api.low_top_of_page_bid_micros,
            high_top_of_page_bid_micros: api.high_top_of_page_bid_micros,
            monthly_search_volumes: api
                .monthly_search_volumes
                .into_iter()
                .filter_map(|v| {
                    Some(MonthlyVolume {
                        year: i32::try_from(v.year?).ok()?,
                        month: month_number(&v.month)?,
                        searches: v.monthly_searches.unwrap_or(0),
                    })
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiHistoricalMetricsResponse {
    #[serde(default)]
    results: Vec<ApiHistoricalResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiHistoricalResult {
    #[serde(default)]
    text: String,
    #[serde(default)]
    close_variants: Vec<String>,
    #[serde(default)]
    keyword_metrics: Option<ApiKeywordMetrics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiIdeasResponse {
    #[serde(default)]
    results: Vec<ApiIdea>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiIdea {
    #[serde(default)]
    text: String,
    #[serde(default)]
    keyword_idea_metrics: Option<ApiKeywordMetrics>,
}

#[derive(Debug, Deserialize)]
struct ApiSearchStreamBatch {
    #[serde(default)]
    results: Vec<JsonValue>,
}

fn historical_metrics_body(request: &HistoricalMetricsRequest) -> JsonValue {
    json!({
        "keywords": request.keywords,
        "language": request.language,
        "geoTargetConstants": request.geo_target_constants,
        "keywordPlanNetwork": KEYWORD_PLAN_NETWORK,
        "includeAdultKeywords": request.include_adult_keywords,
    })
}

fn keyword_ideas_body(request: &KeywordIdeasRequest, page_token: Option<&str>) -> JsonValue {
    let mut body = json!({
        "language": request.language,
        "geoTargetConstants": request.geo_target_constants,
        "keywordPlanNetwork": KEYWORD_PLAN_NETWORK,
        "includeAdultKeywords": request.include_adult_keywords,
    });
    let (seed_key, seed) = match &request.seed {
        KeywordSeed::Url(url) => ("urlSeed", json!({ "url": url })),
        KeywordSeed::Keywords(keywords) => ("keywordSeed", json!({ "keywords": keywords })),
        KeywordSeed::KeywordsAndUrl { url, keywords } => (
            "keywordAndUrlSeed",
            json!({ "url": url, "keywords": keywords }),
        ),
    };
    if let Some(obj) = body.as_object_mut() {
        obj.insert(seed_key.to_string(), seed);
        if let Some(token) = page_token {
            obj.insert("pageToken".to_string(), json!(token));
        }
    }
    body
}

#[async_trait]
impl KeywordPlannerApi for AdsClient {
    async fn generate_historical_metrics(
        &self,
        request: &HistoricalMetricsRequest,
    ) -> Result<Vec<HistoricalMetricsResult>, ApiError> {
        let url = self.customer_url(&self.customer_id, ":generateKeywordHistoricalMetrics");
        let response: ApiHistoricalMetricsResponse =
            self.post(&url, &historical_metrics_body(request)).await?;
        Ok(response
            .results
            .into_iter()
            .map(|r| HistoricalMetricsResult {
                text: r.text,
                close_variants: r.close_variants,
                metrics: r.keyword_metrics.unwrap_or_default().into(),
            })
            .collect())
    }

    async fn generate_keyword_ideas(
        &self,
        request: &KeywordIdeasRequest,
    ) -> Result<Vec<KeywordIdea>, ApiError> {
        let url = self.customer_url(&self.customer_id, ":generateKeywordIdeas");
        let mut ideas = Vec::new();
        let mut page_token: Option<String> = None;
        for _ in 0..MAX_IDEA_PAGES {
            let body = keyword_ideas_body(request, page_token.as_deref());
            let response: ApiIdeasResponse = self.post(&url, &body).await?;
            ideas.extend(response.results.into_iter().map(|idea| KeywordIdea {
                text: idea.text,
                metrics: idea.keyword_idea_metrics.unwrap_or_default().into(),
            }));
            page_token = response.next_page_token.filter(|t| !t.is_empty());
            if page_token.is_none() {
                break;
            }
        }
        Ok(ideas)
    }
}

#[async_trait]
impl AdsSearchApi for AdsClient {
    async fn search_stream(
        &self,
        customer_id: &str,
        query: &str,
    ) -> Result<Vec<JsonValue>, ApiError> {
        let url = self.customer_url(customer_id, "/googleAds:searchStream");
        let batches: Vec<ApiSearchStreamBatch> =
            self.post(&url, &json!({ "query": query })).await?;
        debug!("searchStream returned {} batches", batches.len());
        Ok(batches.into_iter().flat_map(|b| b.results).collect())
    }
}
