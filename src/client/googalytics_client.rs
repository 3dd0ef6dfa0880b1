use std::sync::Arc;

use tracing::{info, warn};

use super::config::{ConfigError, GoogalyticsConfig, ServiceCredentials};
use crate::core::ads::{AdsReports, AdsSearchApi};
use crate::core::keywords::{KeywordPlanner, KeywordPlannerApi};
use crate::core::query::{Query, ReportKind, ReportOptions};
use crate::core::reports::{
    ApiError, ApiStatus, Ga3Fetcher, Ga4Fetcher, GscFetcher, ReportError, ReportService,
    UrlInspectionFetcher,
};
use crate::core::table::Table;
use crate::infra::auth::{
    provider_from_file, provider_from_json, AccessTokenProvider, AuthError, RefreshTokenAuth,
    RefreshTokenCredentials, GOOGLE_TOKEN_URI,
};
use crate::infra::google::{build_http_client, AdsClient, Ga3Client, Ga4Client, GoogleHttp, GscClient};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Analytics, Search Console and Ads access built from one configuration.
pub struct GoogalyticsClient {
    config: GoogalyticsConfig,
    reports: ReportService,
    keyword_planner: Option<KeywordPlanner<Box<dyn KeywordPlannerApi>>>,
    ads_reports: Option<AdsReports<Box<dyn AdsSearchApi>>>,
}

impl GoogalyticsClient {
    pub async fn from_env() -> Result<Self, ClientError> {
        Self::from_config(GoogalyticsConfig::from_env()?).await
    }

    /// Backends whose credentials are missing are left out; asking them for
    /// a table gives [`ReportError::NotConfigured`].
    pub async fn from_config(config: GoogalyticsConfig) -> Result<Self, ClientError> {
        let http_client = build_http_client(config.http_timeout)?;
        let policy = config.retry_policy();

        let mut reports = ReportService::new();
        match &config.credentials {
            Some(credentials) => {
                let auth: Arc<dyn AccessTokenProvider> = match credentials {
                    ServiceCredentials::KeyFile(path) => {
                        provider_from_file(path, http_client.clone()).await?
                    }
                    ServiceCredentials::Json(json) => {
                        provider_from_json(json, http_client.clone())?
                    }
                };
                let http = GoogleHttp::new(http_client.clone(), auth);
                let gsc = GscClient::new(http.clone());
                reports = reports
                    .with_fetcher(Box::new(
                        Ga3Fetcher::new(Ga3Client::new(http.clone()), config.ga3_view_id.clone())
                            .with_policy(policy.clone()),
                    ))
                    .with_fetcher(Box::new(
                        Ga4Fetcher::new(Ga4Client::new(http), config.ga4_property_id.clone())
                            .with_policy(policy.clone()),
                    ))
                    .with_fetcher(Box::new(GscFetcher::new(
                        gsc.clone(),
                        config.gsc_site_url.clone(),
                    )))
                    .with_fetcher(Box::new(UrlInspectionFetcher::new(
                        gsc,
                        config.gsc_site_url.clone(),
                    )));
            }
            None => warn!("No Google service account configured; Analytics and Search Console are unavailable"),
        }

        let (keyword_planner, ads_reports) = match (&config.ads, &config.ads_customer_id) {
            (Some(ads), Some(customer_id)) => {
                let auth = RefreshTokenAuth::new(
                    RefreshTokenCredentials {
                        client_id: ads.client_id.clone(),
                        client_secret: ads.client_secret.clone(),
                        refresh_token: ads.refresh_token.clone(),
                        token_uri: GOOGLE_TOKEN_URI.to_string(),
                    },
                    http_client.clone(),
                );
                let client = AdsClient::new(
                    GoogleHttp::new(http_client, Arc::new(auth)),
                    ads.developer_token.clone(),
                    customer_id.clone(),
                )
                .with_login_customer_id(ads.login_customer_id.clone());

                let mut planner =
                    KeywordPlanner::new(Box::new(client.clone()) as Box<dyn KeywordPlannerApi>)
                        .with_policy(policy);
                if let Some(site_url) = config.gsc_site_url.as_deref().and_then(site_base_url) {
                    planner = planner.with_site_url(site_url);
                }
                let ads_reports =
                    AdsReports::new(Box::new(client) as Box<dyn AdsSearchApi>, customer_id.clone());
                (Some(planner), Some(ads_reports))
            }
            (Some(_), None) => {
                warn!("google-ads.yaml loaded but no customer id is set; Ads is unavailable");
                (None, None)
            }
            _ => (None, None),
        };

        info!(
            "googalytics client ready (analytics: {}, ads: {})",
            config.credentials.is_some(),
            ads_reports.is_some()
        );
        Ok(Self {
            config,
            reports,
            keyword_planner,
            ads_reports,
        })
    }

    /// A client over an already assembled report service, without Ads.
    pub fn with_reports(config: GoogalyticsConfig, reports: ReportService) -> Self {
        Self {
            config,
            reports,
            keyword_planner: None,
            ads_reports: None,
        }
    }

    pub fn config(&self) -> &GoogalyticsConfig {
        &self.config
    }

    pub fn reports(&self) -> &ReportService {
        &self.reports
    }

    pub async fn get_table(
        &self,
        kind: ReportKind,
        query: &Query,
        options: &ReportOptions,
    ) -> Result<Table, ReportError> {
        self.reports.get_table(kind, query, options).await
    }

    pub async fn api_status(&self, kind: ReportKind) -> ApiStatus {
        self.reports.api_status(kind).await
    }

    pub fn keyword_planner(&self) -> Option<&KeywordPlanner<Box<dyn KeywordPlannerApi>>> {
        self.keyword_planner.as_ref()
    }

    pub fn ads_reports(&self) -> Option<&AdsReports<Box<dyn AdsSearchApi>>> {
        self.ads_reports.as_ref()
    }
}

/// Base URL for relative keyword-idea seeds. Domain properties
/// (`sc-domain:example.com`) become `https://example.com/`.
pub fn site_base_url(gsc_site_url: &str) -> Option<String> {
    let base = match gsc_site_url.strip_prefix("sc-domain:") {
        Some(domain) => format!("https://{}", domain.trim_matches('/')),
        None => gsc_site_url.trim_end_matches('/').to_string(),
    };
    (!base.is_empty()).then(|| format!("{}/", base))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_base_urls() {
        assert_eq!(
            site_base_url("sc-domain:example.com").as_deref(),
            Some("https://example.com/")
        );
        assert_eq!(
            site_base_url("https://www.example.com").as_deref(),
            Some("https://www.example.com/")
        );
        assert_eq!(site_base_url(""), None);
    }

    #[tokio::test]
    async fn unconfigured_backends() {
        let client = GoogalyticsClient::from_config(GoogalyticsConfig::default())
            .await
            .unwrap();
        assert!(client.keyword_planner().is_none());
        assert!(client.ads_reports().is_none());
        assert_eq!(client.api_status(ReportKind::Ga4).await, ApiStatus::MissingIdentifier);

        let day = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let query = Query::new_as_of(day, day, day).unwrap();
        let err = client
            .get_table(ReportKind::Gsc, &query, &ReportOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn ads_needs_customer_id() {
        let config = GoogalyticsConfig {
            ads: Some(crate::client::config::AdsCredentials {
                developer_token: "dev".into(),
                client_id: "id".into(),
                client_secret: "secret".into(),
                refresh_token: "refresh".into(),
                login_customer_id: None,
                default_customer_id: None,
            }),
            gsc_site_url: Some("sc-domain:example.com".into()),
            ..GoogalyticsConfig::default()
        };
        let without_id = GoogalyticsClient::from_config(config.clone()).await.unwrap();
        assert!(without_id.ads_reports().is_none());

        let with_id = GoogalyticsClient::from_config(GoogalyticsConfig {
            ads_customer_id: Some("1234567890".into()),
            ..config
        })
        .await
        .unwrap();
        assert_eq!(with_id.ads_reports().unwrap().customer_id(), "1234567890");
        assert!(with_id.keyword_planner().is_some());
    }

    #[tokio::test]
    async fn service_account_json_registers_backends() {
        let config = GoogalyticsConfig {
            credentials: Some(ServiceCredentials::Json(
                r#"{"type": "authorized_user", "client_id": "id", "client_secret": "s", "refresh_token": "r"}"#.into(),
            )),
            ..GoogalyticsConfig::default()
        };
        let client = GoogalyticsClient::from_config(config).await.unwrap();
        for backend in [
            crate::core::table::Backend::Ga3,
            crate::core::table::Backend::Ga4,
            crate::core::table::Backend::Gsc,
            crate::core::table::Backend::UrlInspection,
        ] {
            assert!(client.reports().has_backend(backend));
        }
        // No property id, so the probe never reaches the network.
        assert_eq!(client.api_status(ReportKind::Ga4).await, ApiStatus::MissingIdentifier);
    }
}
