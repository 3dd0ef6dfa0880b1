use async_trait::async_trait;

use super::report_api::ApiError;
use super::report_models::RawResponse;
use crate::core::query::Query;
use crate::core::table::{Backend, ErrorTag};

/// One implementation per backend. Fetch errors are carried inside the
/// returned response; `Err` is reserved for a missing id when the fetcher
/// was built to raise on it.
#[async_trait]
pub trait ReportFetcher: Send + Sync {
    fn backend(&self) -> Backend;

    async fn fetch(&self, query: &Query) -> Result<RawResponse, ApiError>;
}

#[async_trait]
impl ReportFetcher for Box<dyn ReportFetcher> {
    fn backend(&self) -> Backend {
        (**self).backend()
    }

    async fn fetch(&self, query: &Query) -> Result<RawResponse, ApiError> {
        (**self).fetch(query).await
    }
}

const INSUFFICIENT_PERMISSIONS: &str = "user does not have sufficient permissions";
const VIEW_ID_NOT_SET: &str = "viewid must be set";

/// GA3 and Search Console errors are sorted by message text.
pub fn classify_http_error(error: &ApiError) -> ErrorTag {
    let message = error.message().to_lowercase();
    if message.contains(INSUFFICIENT_PERMISSIONS) {
        ErrorTag::InsufficientPermissions
    } else if message.contains(VIEW_ID_NOT_SET) {
        ErrorTag::MissingViewId
    } else {
        match error {
            ApiError::MissingIdentifier(_) => ErrorTag::MissingIdentifier,
            ApiError::PermissionDenied(_) => ErrorTag::PermissionDenied,
            ApiError::ResourceExhausted(_) => ErrorTag::QuotaReached,
            _ => ErrorTag::Other,
        }
    }
}

/// GA4 errors that end paging at once. `None` means retry.
pub fn classify_terminal_error(error: &ApiError) -> Option<ErrorTag> {
    match error {
        ApiError::PermissionDenied(_) => Some(ErrorTag::PermissionDenied),
        ApiError::ResourceExhausted(_) => Some(ErrorTag::QuotaReached),
        ApiError::MissingIdentifier(_) => Some(ErrorTag::MissingIdentifier),
        ApiError::InvalidArgument(message) => {
            let message = message.to_lowercase();
            if message.contains("incompatible") {
                Some(ErrorTag::IncompatibleMetrics)
            } else if message.contains("property") {
                Some(ErrorTag::InvalidPropertyId)
            } else {
                Some(ErrorTag::InvalidArguments)
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_messages() {
        let denied = ApiError::Http {
            status: 403,
            message: "User does not have sufficient permissions for this profile.".into(),
        };
        assert_eq!(classify_http_error(&denied), ErrorTag::InsufficientPermissions);

        let view = ApiError::InvalidArgument("Invalid value. viewId must be set.".into());
        assert_eq!(classify_http_error(&view), ErrorTag::MissingViewId);

        assert_eq!(
            classify_http_error(&ApiError::Transport("reset".into())),
            ErrorTag::Other
        );
    }

    #[test]
    fn ga4_terminal_errors() {
        assert_eq!(
            classify_terminal_error(&ApiError::ResourceExhausted("tokens".into())),
            Some(ErrorTag::QuotaReached)
        );
        assert_eq!(
            classify_terminal_error(&ApiError::InvalidArgument(
                "Please remove sessions to make the request compatible. The request's dimensions & metrics are incompatible.".into()
            )),
            Some(ErrorTag::IncompatibleMetrics)
        );
        assert_eq!(
            classify_terminal_error(&ApiError::InvalidArgument(
                "Property id 0 is not a valid property".into()
            )),
            Some(ErrorTag::InvalidPropertyId)
        );
        assert_eq!(
            classify_terminal_error(&ApiError::InvalidArgument("bad date".into())),
            Some(ErrorTag::InvalidArguments)
        );
        assert_eq!(classify_terminal_error(&ApiError::Internal("boom".into())), None);
    }
}
