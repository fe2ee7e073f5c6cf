use serde::Serialize;
use thiserror::Error;

/// Taxonomy of fetch failures, used for monitoring and retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// robots.txt disallows the URL for our user agent. Terminal.
    RobotsBlocked,
    /// HTTP 429. Retried with backoff.
    RateLimited,
    /// HTTP 5xx. Retried with backoff.
    ServerError,
    /// Any other 4xx. Terminal; retrying returns the same answer.
    ClientError,
    /// Request deadline exceeded. Retried.
    Timeout,
    /// Connection-level failure (reset, DNS, TLS). Retried.
    Network,
    /// Response body did not parse as the expected shape. Terminal.
    Parse,
    /// Anything else. Terminal.
    Unknown,
}

impl ErrorCategory {
    /// Whether a failure in this category is worth another attempt.
    #[must_use]
    pub fn is_retriable(self) -> bool {
        matches!(
            self,
            ErrorCategory::RateLimited
                | ErrorCategory::ServerError
                | ErrorCategory::Timeout
                | ErrorCategory::Network
        )
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorCategory::RobotsBlocked => "robots_blocked",
            ErrorCategory::RateLimited => "rate_limited",
            ErrorCategory::ServerError => "server_error",
            ErrorCategory::ClientError => "client_error",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Network => "network",
            ErrorCategory::Parse => "parse_error",
            ErrorCategory::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Outcome of a failed fetch: the category plus how much work was spent
/// before giving up.
#[derive(Debug, Error)]
#[error("fetch failed ({category}) after {attempts} attempt(s), {total_wait_ms}ms waited: {message}")]
pub struct FetchError {
    pub category: ErrorCategory,
    pub message: String,
    /// Number of request attempts actually made (0 when blocked pre-flight).
    pub attempts: u32,
    /// Cumulative politeness + backoff wait across all attempts.
    pub total_wait_ms: u64,
}

impl FetchError {
    pub(crate) fn blocked(url: &str) -> Self {
        Self {
            category: ErrorCategory::RobotsBlocked,
            message: format!("URL disallowed by robots.txt: {url}"),
            attempts: 0,
            total_wait_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retriable_categories() {
        assert!(ErrorCategory::RateLimited.is_retriable());
        assert!(ErrorCategory::ServerError.is_retriable());
        assert!(ErrorCategory::Timeout.is_retriable());
        assert!(ErrorCategory::Network.is_retriable());
    }

    #[test]
    fn terminal_categories() {
        assert!(!ErrorCategory::RobotsBlocked.is_retriable());
        assert!(!ErrorCategory::ClientError.is_retriable());
        assert!(!ErrorCategory::Parse.is_retriable());
        assert!(!ErrorCategory::Unknown.is_retriable());
    }
}
