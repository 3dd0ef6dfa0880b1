use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::core::reports::RetryPolicy;
use crate::infra::google::DEFAULT_HTTP_TIMEOUT;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid google-ads.yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("{var} must be a positive integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
}

/// Where the Analytics/Search Console key comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceCredentials {
    KeyFile(PathBuf),
    Json(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Num(u64),
    Str(String),
}

/// google-ads.yaml writes customer ids as numbers or dashed strings.
fn opt_customer_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<IdRepr>::deserialize(deserializer)?
        .map(|id| match id {
            IdRepr::Num(n) => n.to_string(),
            IdRepr::Str(s) => normalize_customer_id(&s),
        })
        .filter(|id| !id.is_empty()))
}

/// The fields of a google-ads.yaml this crate uses.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AdsCredentials {
    pub developer_token: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default, deserialize_with = "opt_customer_id")]
    pub login_customer_id: Option<String>,
    #[serde(default, deserialize_with = "opt_customer_id")]
    pub default_customer_id: Option<String>,
}

impl AdsCredentials {
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }
}

/// `123-456-7890` -> `1234567890`.
pub fn normalize_customer_id(id: &str) -> String {
    id.chars().filter(char::is_ascii_digit).collect()
}

/// Everything read from the environment at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct GoogalyticsConfig {
    pub credentials: Option<ServiceCredentials>,
    pub gsc_site_url: Option<String>,
    pub ga3_view_id: Option<String>,
    pub ga4_property_id: Option<String>,
    pub ads: Option<AdsCredentials>,
    pub ads_customer_id: Option<String>,
    pub ga3_max_pages: usize,
    pub http_timeout: Duration,
}

impl Default for GoogalyticsConfig {
    fn default() -> Self {
        Self {
            credentials: None,
            gsc_site_url: None,
            ga3_view_id: None,
            ga4_property_id: None,
            ads: None,
            ads_customer_id: None,
            ga3_max_pages: RetryPolicy::default().ga3_max_pages,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

fn positive_number(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<u64>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(value) => match value.trim().parse::<u64>() {
            Ok(n) if n > 0 => Ok(Some(n)),
            _ => Err(ConfigError::InvalidNumber { var, value }),
        },
    }
}

impl GoogalyticsConfig {
    /// Reads the process environment. Call `dotenv::dotenv()` first to pick
    /// up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) over any variable source. Blank
    /// values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let credentials = lookup("GOOGLE_SERVICE_ACCOUNT_KEY")
            .map(|path| ServiceCredentials::KeyFile(PathBuf::from(path)))
            .or_else(|| lookup("GOOGLE_SERVICE_ACCOUNT_JSON").map(ServiceCredentials::Json));

        let ads = match (lookup("GOOGLE_ADS_YAML"), lookup("GOOGLE_ADS_YAML_CONTENT")) {
            (Some(path), _) => Some(AdsCredentials::from_file(Path::new(&path))?),
            (None, Some(content)) => Some(AdsCredentials::from_yaml(&content)?),
            (None, None) => None,
        };
        let ads_customer_id = lookup("GOOGLE_ADS_CUSTOMER_ID")
            .map(|id| normalize_customer_id(&id))
            .filter(|id| !id.is_empty())
            .or_else(|| ads.as_ref().and_then(|a| a.default_customer_id.clone()));

        let defaults = Self::default();
        let ga3_max_pages = positive_number(&lookup, "GOOGALYTICS_GA3_MAX_PAGES")?
            .map(|n| n as usize)
            .unwrap_or(defaults.ga3_max_pages);
        let http_timeout = positive_number(&lookup, "GOOGALYTICS_HTTP_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.http_timeout);

        Ok(Self {
            credentials,
            gsc_site_url: lookup("GSC_SITE_URL"),
            ga3_view_id: lookup("GA3_VIEW_ID"),
            ga4_property_id: lookup("GA4_PROPERTY_ID"),
            ads,
            ads_customer_id,
            ga3_max_pages,
            http_timeout,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default().with_ga3_max_pages(self.ga3_max_pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    const ADS_YAML: &str = "\
developer_token: dev-token
client_id: client.apps.googleusercontent.com
client_secret: secret
refresh_token: refresh
login_customer_id: 123-456-7890
default_customer_id: 9876543210
use_proto_plus: True
";

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = GoogalyticsConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, GoogalyticsConfig::default());
        assert_eq!(config.ga3_max_pages, 1000);
        assert_eq!(config.http_timeout, Duration::from_secs(60));
    }

    #[test]
    fn reads_ids_and_knobs() {
        let config = GoogalyticsConfig::from_lookup(lookup_from(&[
            ("GOOGLE_SERVICE_ACCOUNT_JSON", "{\"type\": \"service_account\"}"),
            ("GSC_SITE_URL", "sc-domain:example.com"),
            ("GA4_PROPERTY_ID", " 123456 "),
            ("GA3_VIEW_ID", ""),
            ("GOOGALYTICS_GA3_MAX_PAGES", "5"),
            ("GOOGALYTICS_HTTP_TIMEOUT_SECS", "15"),
        ]))
        .unwrap();
        assert!(matches!(config.credentials, Some(ServiceCredentials::Json(_))));
        assert_eq!(config.gsc_site_url.as_deref(), Some("sc-domain:example.com"));
        assert_eq!(config.ga4_property_id.as_deref(), Some("123456"));
        assert_eq!(config.ga3_view_id, None);
        assert_eq!(config.retry_policy().ga3_max_pages, 5);
        assert_eq!(config.http_timeout, Duration::from_secs(15));
    }

    #[test]
    fn key_file_wins_over_inline_json() {
        let config = GoogalyticsConfig::from_lookup(lookup_from(&[
            ("GOOGLE_SERVICE_ACCOUNT_KEY", "/keys/sa.json"),
            ("GOOGLE_SERVICE_ACCOUNT_JSON", "{}"),
        ]))
        .unwrap();
        assert_eq!(
            config.credentials,
            Some(ServiceCredentials::KeyFile(PathBuf::from("/keys/sa.json")))
        );
    }

    #[test]
    fn rejects_bad_numbers() {
        let err = GoogalyticsConfig::from_lookup(lookup_from(&[("GOOGALYTICS_GA3_MAX_PAGES", "0")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidNumber { var: "GOOGALYTICS_GA3_MAX_PAGES", .. }
        ));
    }

    #[test]
    fn ads_yaml_content() {
        let config = GoogalyticsConfig::from_lookup(lookup_from(&[("GOOGLE_ADS_YAML_CONTENT", ADS_YAML)]))
            .unwrap();
        let ads = config.ads.unwrap();
        assert_eq!(ads.developer_token, "dev-token");
        assert_eq!(ads.login_customer_id.as_deref(), Some("1234567890"));
        assert_eq!(config.ads_customer_id.as_deref(), Some("9876543210"));
    }

    #[test]
    fn customer_id_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(ADS_YAML.as_bytes()).unwrap();
        let path = file.path().to_string_lossy().to_string();

        let config = GoogalyticsConfig::from_lookup(lookup_from(&[
            ("GOOGLE_ADS_YAML", path.as_str()),
            ("GOOGLE_ADS_CUSTOMER_ID", "111-222-3333"),
        ]))
        .unwrap();
        assert!(config.ads.is_some());
        assert_eq!(config.ads_customer_id.as_deref(), Some("1112223333"));
    }

    #[test]
    fn missing_yaml_file() {
        let err = GoogalyticsConfig::from_lookup(lookup_from(&[(
            "GOOGLE_ADS_YAML",
            "/nonexistent/google-ads.yaml",
        )]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn strips_customer_id() {
        assert_eq!(normalize_customer_id("123-456-7890"), "1234567890");
        assert_eq!(normalize_customer_id(" 42 "), "42");
    }
}
