//! Retry policy: decides whether a failed attempt is retried and when.

use std::time::Duration;

/// Exponential backoff with a cap.
///
/// The counter is incremented *before* the delay is computed, so with the
/// defaults the first retry waits 10s, then 20s, 40s, ... up to 300s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay unit; multiplied by `2^retry_count`.
    pub base_delay: Duration,
    pub max_delay: Duration,
}

/// What the failure path does with a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Go to RETRYING with the new counter, eligible again after `delay`.
    Retry { retry_count: u32, delay: Duration },
    /// Retries exhausted: terminal FAILED.
    GiveUp,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    /// `min(max_delay, base_delay * 2^retry_count)`.
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        2u32.checked_pow(retry_count)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// `retry_count` is the record's counter before this failure.
    pub fn decide(&self, retry_count: u32, max_retries: u32) -> RetryDecision {
        if retry_count >= max_retries {
            return RetryDecision::GiveUp;
        }
        let retry_count = retry_count + 1;
        RetryDecision::Retry {
            retry_count,
            delay: self.delay_for(retry_count),
        }
    }
}
