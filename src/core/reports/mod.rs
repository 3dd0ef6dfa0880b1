pub mod ga3_fetcher;
pub mod ga4_fetcher;
pub mod gsc_fetcher;
pub mod report_api;
pub mod report_fetcher;
pub mod report_models;
pub mod report_service;
pub mod request_builders;
pub mod retry_policy;

pub use ga3_fetcher::Ga3Fetcher;
pub use ga4_fetcher::Ga4Fetcher;
pub use gsc_fetcher::{GscFetcher, UrlInspectionFetcher};
pub use report_api::{ApiError, Ga3Api, Ga4Api, GscApi};
pub use report_fetcher::{classify_http_error, classify_terminal_error, ReportFetcher};
pub use report_models::{
    ApiStatus, Ga3Page, Ga3Response, Ga3Row, Ga4Page, Ga4Response, Ga4Row, GscPage, GscResponse,
    GscRow, RawResponse, UrlInspection, UrlInspectionResponse,
};
pub use report_service::{date_range_summary, ReportError, ReportService};
pub use request_builders::{
    build_ga3_request, build_ga4_request, build_gsc_request, Built, Ga3Request, Ga4Request,
    GscRequest,
};
pub use retry_policy::RetryPolicy;
