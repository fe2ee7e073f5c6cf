//! Retry policy for transient fetch failures.
//!
//! The policy is a plain value consumed by the fetch loop in
//! [`crate::client::FetchClient::fetch`]; which categories are retryable
//! lives on [`crate::ErrorCategory::is_retriable`]. Keeping the schedule in
//! data (rather than a wrapper combinator) makes the contract visible in the
//! client's type signature and trivially testable.

/// Exponential backoff schedule: `backoff_base_ms * 2^retry`, capped at
/// `max_backoff_ms`, for up to `max_attempts` total attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts per URL (first try included). Minimum 1.
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub max_backoff_ms: u64,
}

impl RetryPolicy {
    /// Delay to sleep before retry number `retry` (0-based: the wait after
    /// the first failed attempt is `backoff_ms(0)`).
    #[must_use]
    pub fn backoff_ms(&self, retry: u32) -> u64 {
        let raw = self.backoff_base_ms.saturating_mul(1u64 << retry.min(62));
        raw.min(self.max_backoff_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            backoff_base_ms: 2_000,
            max_backoff_ms: 16_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_until_cap() {
        let policy = RetryPolicy {
            max_attempts: 4,
            backoff_base_ms: 2_000,
            max_backoff_ms: 16_000,
        };
        assert_eq!(policy.backoff_ms(0), 2_000);
        assert_eq!(policy.backoff_ms(1), 4_000);
        assert_eq!(policy.backoff_ms(2), 8_000);
        assert_eq!(policy.backoff_ms(3), 16_000);
        assert_eq!(policy.backoff_ms(10), 16_000);
    }

    #[test]
    fn huge_retry_count_does_not_overflow() {
        let policy = RetryPolicy {
            max_attempts: 100,
            backoff_base_ms: u64::MAX / 2,
            max_backoff_ms: u64::MAX,
        };
        // saturating_mul keeps this finite
        let _ = policy.backoff_ms(90);
    }
}
