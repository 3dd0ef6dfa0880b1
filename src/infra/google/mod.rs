pub mod ads_client;
pub mod ga3_client;
pub mod ga4_client;
pub mod google_http;
pub mod gsc_client;

pub use ads_client::{AdsClient, GOOGLE_ADS_API_VERSION};
pub use ga3_client::Ga3Client;
pub use ga4_client::Ga4Client;
pub use google_http::{api_error, build_http_client, GoogleHttp, DEFAULT_HTTP_TIMEOUT};
pub use gsc_client::GscClient;
