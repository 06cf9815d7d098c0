use crate::config::RetryConfig;
use rand::Rng;
use std::time::Duration;

/// Exponential backoff: `base * 2^attempt`, capped, plus up to
/// `jitter_percent` of random extra delay
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    base_ms: u64,
    max_ms: u64,
    jitter_percent: u64,
}

impl ExponentialBackoff {
    pub const fn new(base_ms: u64, max_ms: u64) -> Self {
        Self {
            base_ms,
            max_ms,
            jitter_percent: 0,
        }
    }

    pub fn with_jitter(mut self, jitter_percent: u64) -> Self {
        self.jitter_percent = jitter_percent.min(100);
        self
    }

    /// Delay before retry number `attempt + 1` (attempt 0 follows the first failure)
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponential = self
            .base_ms
            .saturating_mul(2u64.saturating_pow(attempt.min(20)));
        let capped = exponential.min(self.max_ms);
        let jitter_range = capped.saturating_mul(self.jitter_percent) / 100;
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(0..=jitter_range)
        } else {
            0
        };
        Duration::from_millis(capped.saturating_add(jitter))
    }
}

/// How many times a transient fetch failure is attempted, and how long to
/// wait in between
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub backoff: ExponentialBackoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: ExponentialBackoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Returns true if another attempt may follow attempt number `attempt` (1-based)
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            ExponentialBackoff::new(config.base_delay_ms, config.max_delay_ms)
                .with_jitter(config.jitter_percent),
        )
    }
}
