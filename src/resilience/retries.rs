//! Retry logic.
//!
//! # Responsibilities
//! - Classify each attempt's outcome (success, retryable, rejected, fatal)
//! - Compute the backoff delay between attempts
//! - Decide whether a rejected request counts against the circuit breaker
//!
//! # Design Decisions
//! - Connection errors and timeouts always retryable
//! - 5xx retryable; 4xx never retried
//! - Every other transport error is fatal for the call

use std::time::Duration;

use reqwest::StatusCode;

use crate::config::{CircuitBreakerConfig, ClientConfig};
use crate::resilience::backoff::calculate_backoff;

/// Bounded retry schedule for one logical call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts are `max_retries + 1`.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_ratio: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter_ratio: 0.0,
        }
    }
}

impl From<&ClientConfig> for RetryPolicy {
    fn from(config: &ClientConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.base_delay(),
            max_delay: config.max_delay(),
            jitter_ratio: config.jitter_ratio,
        }
    }
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Whether another attempt follows the failed attempt with index `attempt`.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Delay after the failed attempt with index `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.base_delay, self.max_delay, self.jitter_ratio)
    }
}

/// Which outcomes count as circuit breaker failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailurePolicy {
    /// Count 4xx responses as breaker failures.
    pub trip_on_client_errors: bool,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            trip_on_client_errors: true,
        }
    }
}

impl From<&CircuitBreakerConfig> for FailurePolicy {
    fn from(config: &CircuitBreakerConfig) -> Self {
        Self {
            trip_on_client_errors: config.trip_on_client_errors,
        }
    }
}

impl FailurePolicy {
    /// Whether a response with this status is a breaker failure.
    pub fn counts_as_failure(&self, status: StatusCode) -> bool {
        status.is_server_error() || (status.is_client_error() && self.trip_on_client_errors)
    }
}

/// How a single attempt ended, from the retry loop's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptClass {
    Success,
    /// 5xx: try again if budget remains.
    RetryableStatus,
    /// 4xx: surface to the caller immediately.
    Rejected,
}

/// Classify a response status.
pub fn classify_status(status: StatusCode) -> AttemptClass {
    if status.is_server_error() {
        AttemptClass::RetryableStatus
    } else if status.is_client_error() {
        AttemptClass::Rejected
    } else {
        AttemptClass::Success
    }
}

/// Whether a transport-level error may be retried.
pub fn is_retryable_transport(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(classify_status(StatusCode::OK), AttemptClass::Success);
        assert_eq!(classify_status(StatusCode::CREATED), AttemptClass::Success);
        assert_eq!(classify_status(StatusCode::NOT_FOUND), AttemptClass::Rejected);
        assert_eq!(classify_status(StatusCode::UNPROCESSABLE_ENTITY), AttemptClass::Rejected);
        assert_eq!(classify_status(StatusCode::BAD_GATEWAY), AttemptClass::RetryableStatus);
        assert_eq!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR),
            AttemptClass::RetryableStatus
        );
    }

    #[test]
    fn test_failure_policy() {
        let strict = FailurePolicy::default();
        assert!(strict.counts_as_failure(StatusCode::BAD_REQUEST));
        assert!(strict.counts_as_failure(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!strict.counts_as_failure(StatusCode::OK));

        let lenient = FailurePolicy {
            trip_on_client_errors: false,
        };
        assert!(!lenient.counts_as_failure(StatusCode::BAD_REQUEST));
        assert!(lenient.counts_as_failure(StatusCode::SERVICE_UNAVAILABLE));
    }

    #[test]
    fn test_retry_budget() {
        let policy = RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
            jitter_ratio: 0.0,
        };
        assert_eq!(policy.max_attempts(), 3);
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(1));
        assert!(!policy.should_retry(2));
        assert_eq!(policy.delay_for(0), Duration::from_millis(10));
        assert_eq!(policy.delay_for(1), Duration::from_millis(20));
    }

    #[test]
    fn test_policy_from_config() {
        let policy = RetryPolicy::from(&ClientConfig::default());
        assert_eq!(policy, RetryPolicy::default());
    }
}
