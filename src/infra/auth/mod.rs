pub mod auth_models;
pub mod refresh_token;
pub mod service_account;

pub use auth_models::{
    provider_from_file, provider_from_json, AccessTokenProvider, AuthError, ANALYTICS_SCOPES,
    GOOGLE_TOKEN_URI, REFRESH_MARGIN,
};
pub use refresh_token::{RefreshTokenAuth, RefreshTokenCredentials};
pub use service_account::ServiceAccountAuth;
