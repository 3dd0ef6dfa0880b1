use std::time::Duration;

/// Pagination caps and retry waits shared by the fetchers and the keyword
/// planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Upper bound on GA3 page-token round trips for one query.
    pub ga3_max_pages: usize,
    /// Attempts per GA4 page on unclassified errors.
    pub ga4_attempts: usize,
    /// Attempts per keyword-metrics call on internal server errors.
    pub keyword_internal_attempts: usize,
    pub keyword_internal_wait: Duration,
    /// Wait after a quota error whose message names no retry delay.
    pub quota_default_wait: Duration,
    /// Added to the delay a quota error asks for.
    pub quota_wait_padding: Duration,
    pub keyword_batch_pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            ga3_max_pages: 1000,
            ga4_attempts: 3,
            keyword_internal_attempts: 5,
            keyword_internal_wait: Duration::from_secs(2),
            quota_default_wait: Duration::from_secs(5),
            quota_wait_padding: Duration::from_secs(1),
            keyword_batch_pause: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Same limits, no sleeping.
    pub fn without_waits(self) -> Self {
        Self {
            keyword_internal_wait: Duration::ZERO,
            quota_default_wait: Duration::ZERO,
            quota_wait_padding: Duration::ZERO,
            keyword_batch_pause: Duration::ZERO,
            ..self
        }
    }

    pub fn with_ga3_max_pages(mut self, pages: usize) -> Self {
        self.ga3_max_pages = pages.max(1);
        self
    }
}
