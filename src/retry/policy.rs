//! Exponential backoff retry policy.

use crate::core::{ConfigResult, Outcome};
use crate::retry::config::RetryConfig;

use rand::Rng;
use std::time::Duration;

/// Decides whether to re-attempt a call and how long to wait first.
///
/// The policy holds no mutable state and can be cloned freely and shared
/// across concurrent calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Creates a policy, rejecting invalid configuration.
    pub fn new(config: RetryConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Returns the maximum number of attempts.
    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    /// Delay before the given 1-based attempt.
    ///
    /// Zero before the first attempt, `base_delay` before the second, then
    /// doubling, capped at `max_delay`.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }

        let exponent = attempt - 2;
        2u32.checked_pow(exponent)
            .and_then(|factor| self.config.base_delay.checked_mul(factor))
            .unwrap_or(self.config.max_delay)
            .min(self.config.max_delay)
    }

    /// Returns whether another attempt should follow `attempt`.
    pub fn should_retry(&self, attempt: u32, outcome: Outcome) -> bool {
        outcome.is_transient() && attempt < self.config.max_attempts
    }

    /// The delay actually slept before `attempt`.
    ///
    /// Equal to [`next_delay`](Self::next_delay) unless jitter is enabled, in
    /// which case it is drawn uniformly from the upper half of that delay.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let delay = self.next_delay(attempt);
        if !self.config.jitter || delay.is_zero() {
            return delay;
        }

        let nanos = delay.as_nanos().min(u64::MAX as u128) as u64;
        let jittered = rand::thread_rng().gen_range(nanos / 2..=nanos);
        Duration::from_nanos(jittered)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            config: RetryConfig::default(),
        }
    }
}
