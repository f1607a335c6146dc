//! Retry backoff strategies.
//!
//! A policy is chosen when the request is built and consulted by the retry
//! controller before every resubmission.

use super::FeedRequest;
use rand::Rng;
use std::time::Duration;

/// Delay used when no policy applies or the request has no pull interval.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(20);

/// Strategy for the delay before retry attempt `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffPolicy {
    /// Same delay before every retry.
    Constant(Duration),

    /// `interval / (2 * attempt^2)`: retries come faster the more have failed.
    IntervalDecreasing,

    /// `(interval / 2) * 2^(attempt - 1)`: half an interval, then doubling.
    Exponential,

    /// `sqrt(interval_ms) * U[1, 20]` milliseconds, never less than `min_delay`.
    Randomized { min_delay: Duration },
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy::Constant(DEFAULT_BACKOFF)
    }
}

impl BackoffPolicy {
    /// Delay before retry number `attempt` (1 = first retry) of `request`.
    pub fn delay(&self, request: &FeedRequest, attempt: u32) -> Duration {
        match self {
            BackoffPolicy::Constant(delay) => *delay,
            BackoffPolicy::IntervalDecreasing => match request.pull_interval() {
                Some(interval) => {
                    let divisor = match 2u32.saturating_mul(attempt.saturating_mul(attempt)) {
                        0 => 4,
                        d => d,
                    };
                    interval / divisor
                }
                None => DEFAULT_BACKOFF,
            },
            BackoffPolicy::Exponential => match request.pull_interval() {
                Some(interval) => {
                    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                    (interval / 2).saturating_mul(factor)
                }
                None => DEFAULT_BACKOFF,
            },
            BackoffPolicy::Randomized { min_delay } => {
                let interval = request.pull_interval().unwrap_or(DEFAULT_BACKOFF);
                let root = (interval.as_millis() as f64).sqrt();
                let multiplier: u32 = rand::rng().random_range(1..=20);
                let delay = Duration::from_millis((root * multiplier as f64) as u64);
                delay.max(*min_delay)
            }
        }
    }
}
