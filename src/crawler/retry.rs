//! Exponential backoff with full jitter for timed out requests

use crate::config::RetryConfig;
use rand::Rng;
use std::time::Duration;

/// Backoff schedule applied when a page request times out
///
/// After the n-th consecutive timeout the worker waits a random duration in
/// `[0, cap(n)]` where `cap(n) = min(base * 2^(n-1), max_delay)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    base_delay: Duration,
    max_delay: Duration,
    max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_delay,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
            config.max_attempts,
        )
    }

    /// Returns a copy with a different attempt ceiling
    pub fn with_max_attempts(self, max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..self
        }
    }

    /// Total attempts allowed, including the first request
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether another request may follow the given failed attempt (1-based)
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Upper bound of the wait after `attempt` consecutive timeouts (1-based)
    pub fn delay_cap(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Draws the actual wait for `attempt` uniformly from `[0, delay_cap(attempt)]`
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let cap = self.delay_cap(attempt).as_micros() as u64;
        Duration::from_micros(rand::thread_rng().gen_range(0..=cap))
    }
}
