//! Polling configuration and partial updates.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::SyncError;

/// Polling more often than this is rejected.
pub const MIN_INTERVAL_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    /// Stop on our own once `max_duration_mins` have elapsed since start.
    pub auto_stop: bool,
    pub max_duration_mins: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
            auto_stop: true,
            max_duration_mins: 60,
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration_mins * 60)
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        if self.interval_secs < MIN_INTERVAL_SECS {
            return Err(SyncError::validation(format!(
                "Polling interval must be at least {}s, got {}s",
                MIN_INTERVAL_SECS, self.interval_secs
            )));
        }
        if self.auto_stop && self.max_duration_mins == 0 {
            return Err(SyncError::validation(
                "max_duration_mins must be at least 1 when auto_stop is enabled",
            ));
        }
        Ok(())
    }

    /// Return a copy with the fields present in `patch` replaced.
    pub fn apply(&self, patch: &PollingConfigPatch) -> PollingConfig {
        PollingConfig {
            enabled: patch.enabled.unwrap_or(self.enabled),
            interval_secs: patch.interval_secs.unwrap_or(self.interval_secs),
            auto_stop: patch.auto_stop.unwrap_or(self.auto_stop),
            max_duration_mins: patch.max_duration_mins.unwrap_or(self.max_duration_mins),
        }
    }
}

/// Partial [`PollingConfig`] for `reconfigure`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfigPatch {
    pub enabled: Option<bool>,
    pub interval_secs: Option<u64>,
    pub auto_stop: Option<bool>,
    pub max_duration_mins: Option<u64>,
}
