// Configuration and the top-level client that wires infra into core.

#[path = "config.rs"]
pub mod config;

#[path = "googalytics_client.rs"]
pub mod googalytics;

pub use config::{normalize_customer_id, AdsCredentials, ConfigError, GoogalyticsConfig, ServiceCredentials};
pub use googalytics::{site_base_url, ClientError, GoogalyticsClient};
