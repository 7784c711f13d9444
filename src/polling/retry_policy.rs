//! Retry strategies for failed polling ticks.
//!
//! The scheduler asks its policy how long to wait before the next tick and
//! whether to keep going after a failure. The default keeps polling at the
//! configured interval forever, without backoff.

use std::fmt::Debug;
use std::time::Duration;

use crate::error::SyncError;

pub trait RetryPolicy: Send + Sync + Debug {
    /// Delay before the next tick given the number of consecutive failures.
    fn next_delay(&self, interval: Duration, consecutive_failures: u32) -> Duration;

    /// Whether polling should continue after `error`.
    ///
    /// `consecutive_failures` includes the failure being reported.
    fn should_retry(&self, _error: &SyncError, _consecutive_failures: u32) -> bool {
        true
    }
}

/// Always tick at the configured interval and never give up.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedInterval;

impl RetryPolicy for FixedInterval {
    fn next_delay(&self, interval: Duration, _consecutive_failures: u32) -> Duration {
        interval
    }
}

/// Exponential backoff on consecutive failures.
///
/// The delay is `interval * multiplier^failures`, capped at `max_backoff`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Give up after this many consecutive failures. `None` retries forever.
    pub max_retries: Option<u32>,
    /// Multiplier applied to the delay after each failure.
    pub backoff_multiplier: f64,
    /// Cap for exponential growth.
    pub max_backoff: Duration,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            max_retries: None,
            backoff_multiplier: 2.0,
            max_backoff: Duration::from_secs(600),
        }
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn next_delay(&self, interval: Duration, consecutive_failures: u32) -> Duration {
        let factor = self
            .backoff_multiplier
            .powi(consecutive_failures.min(i32::MAX as u32) as i32);
        let backoff = (interval.as_secs_f64() * factor)
            .min(self.max_backoff.as_secs_f64())
            .max(0.0);
        Duration::from_secs_f64(backoff).max(interval.min(self.max_backoff))
    }

    fn should_retry(&self, error: &SyncError, consecutive_failures: u32) -> bool {
        error.is_retryable()
            && self
                .max_retries
                .map_or(true, |max| consecutive_failures <= max)
    }
}
