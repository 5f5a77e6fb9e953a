//! Opt-in retry policy for dispatched requests.
//!
//! The default policy never retries: failures are recorded as-is.

use crate::types::{FailureKind, Payload};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Extra attempts after the first one. Zero disables retries.
    pub max_retries: u32,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Retry transport failures (connect, timeout, reset).
    pub retry_on_transport: bool,
    /// HTTP statuses worth another attempt, e.g. 429 or 503.
    pub retry_on_status: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            min_delay_ms: 500,
            max_delay_ms: 10_000,
            retry_on_transport: true,
            retry_on_status: vec![429, 502, 503, 504],
        }
    }

    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    pub fn with_delays(mut self, min: Duration, max: Duration) -> Self {
        self.min_delay_ms = min.as_millis() as u64;
        self.max_delay_ms = max.as_millis() as u64;
        self
    }

    pub fn with_retry_on_status(mut self, statuses: Vec<u16>) -> Self {
        self.retry_on_status = statuses;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.max_retries > 0
    }

    /// Exponential backoff: `min_delay * 2^attempt`, capped at `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = self.min_delay_ms;
        let cap = self.max_delay_ms.max(base);
        let delay = base.saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX));
        Duration::from_millis(delay.min(cap))
    }

    /// Delay before the next attempt, or `None` when the outcome is final.
    ///
    /// `attempt` counts attempts already retried (0 after the first try).
    pub fn should_retry(&self, attempt: u32, outcome: &Payload) -> Option<Duration> {
        if attempt >= self.max_retries {
            return None;
        }
        let retryable = match outcome {
            Payload::Status(code) => self.retry_on_status.contains(code),
            Payload::Failure(f) => self.retry_on_transport && f.error == FailureKind::Transport,
            Payload::Json(_) | Payload::Text(_) => false,
        };
        retryable.then(|| self.backoff(attempt))
    }
}
