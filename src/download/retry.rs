//! Per-window retry policy for range requests.
//!
//! A failed range request is classified by [`classify_error`]: timeouts are
//! [`FailureType::Transient`] and the same window is asked for again, every
//! other failure is [`FailureType::Permanent`] and ends the stream. The
//! attempt counter belongs to the window being fetched and restarts at one
//! for each new window.
//!
//! # Example
//!
//! ```
//! use tubefetch_core::download::{FailureType, RetryDecision, RetryPolicy, classify_error};
//! use tubefetch_core::transport::TransportError;
//!
//! let policy = RetryPolicy::immediate(2);
//! let error = TransportError::timeout("https://example.com/videoplayback");
//! assert_eq!(classify_error(&error), FailureType::Transient);
//!
//! match policy.should_retry(classify_error(&error), 1) {
//!     RetryDecision::Retry { attempt, .. } => assert_eq!(attempt, 2),
//!     RetryDecision::DoNotRetry { reason } => panic!("{reason}"),
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use tracing::{debug, instrument};

use crate::download::constants::{DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_RETRY_MAX_DELAY_MS};
use crate::transport::TransportError;

/// Retries per window unless configured otherwise.
pub const DEFAULT_MAX_RETRIES: u32 = 0;

const DEFAULT_BACKOFF_FACTOR: u32 = 2;

/// Upper bound on the random jitter added to a non-zero delay.
const MAX_JITTER_MS: u64 = 250;

/// How a failed range request should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Timed out; the window may succeed on another attempt.
    Transient,
    /// Anything else.
    Permanent,
}

/// Outcome of [`RetryPolicy::should_retry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Request the window again after `delay`.
    Retry {
        /// Wait before the next attempt.
        delay: Duration,
        /// Number of the next attempt (the first request is attempt 1).
        attempt: u32,
    },
    /// Give up on the window.
    DoNotRetry {
        /// Why no further attempt is made.
        reason: String,
    },
}

/// Bounded retry budget with optional exponential backoff.
///
/// The delay before attempt `n + 1` is
/// `min(base_delay * backoff_factor^(n - 1), max_delay)` plus up to 250 ms
/// of jitter. A zero `base_delay` retries immediately with no jitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    backoff_factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_RETRIES,
            Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
            Duration::from_millis(DEFAULT_RETRY_MAX_DELAY_MS),
        )
    }
}

impl RetryPolicy {
    /// Doubling backoff from `base_delay`, capped at `max_delay`.
    #[must_use]
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
        }
    }

    /// Default backoff with a different retry count.
    #[must_use]
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// No waiting between attempts.
    #[must_use]
    pub fn immediate(max_retries: u32) -> Self {
        Self::new(max_retries, Duration::ZERO, Duration::ZERO)
    }

    /// Replaces the growth factor between consecutive delays.
    #[must_use]
    pub fn with_backoff_factor(mut self, factor: u32) -> Self {
        self.backoff_factor = factor.max(1);
        self
    }

    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Requests allowed per window, the first one included.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Decides what to do after attempt number `attempt` failed.
    #[instrument(level = "debug", skip(self), fields(max_attempts = self.max_attempts()))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        if failure_type == FailureType::Permanent {
            return RetryDecision::DoNotRetry {
                reason: "permanent failure".to_string(),
            };
        }
        if attempt >= self.max_attempts() {
            return RetryDecision::DoNotRetry {
                reason: format!("all {} attempts timed out", self.max_attempts()),
            };
        }

        let delay = self.backoff(attempt);
        debug!(attempt, delay_ms = delay.as_millis(), "scheduling another attempt");
        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let growth = self
            .backoff_factor
            .checked_pow(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        let delay = self
            .base_delay
            .checked_mul(growth)
            .unwrap_or(self.max_delay)
            .min(self.max_delay);
        delay + jitter()
    }
}

fn jitter() -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(0..=MAX_JITTER_MS))
}

/// Only timeouts are worth another attempt.
#[must_use]
pub fn classify_error(error: &TransportError) -> FailureType {
    if error.is_timeout() {
        FailureType::Transient
    } else {
        FailureType::Permanent
    }
}
