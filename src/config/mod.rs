mod file_config;

pub use file_config::{FileConfig, PollingFileConfig, StatsFileConfig};

use anyhow::{anyhow, bail, Result};
use std::path::Path;
use std::time::Duration;

use crate::error::SyncError;
use crate::notifications::MAX_PER_PAGE;
use crate::polling::PollingConfig;
use crate::stats::{StatsPeriod, StatsQuery};

pub const API_BASE_URL_VAR: &str = "KPT_API_BASE_URL";
pub const API_TOKEN_VAR: &str = "KPT_API_TOKEN";

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const DEFAULT_REQUEST_TIMEOUT_SEC: u64 = 30;
pub const DEFAULT_IN_FLIGHT_TIMEOUT_SEC: u64 = 60;

/// Values supplied by the hosting environment.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub api_base_url: Option<String>,
    pub auth_token: Option<String>,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            api_base_url: non_empty(API_BASE_URL_VAR),
            auth_token: non_empty(API_TOKEN_VAR),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    pub api_base_url: String,
    pub auth_token: Option<String>,
    pub request_timeout_sec: u64,
    pub in_flight_timeout_sec: u64,
    pub per_page: u32,
    pub notifications_polling: PollingConfig,
    pub stats_polling: PollingConfig,
    pub stats_query: StatsQuery,
}

impl SyncSettings {
    /// Settings with every default and the given API base URL.
    pub fn with_base_url(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            auth_token: None,
            request_timeout_sec: DEFAULT_REQUEST_TIMEOUT_SEC,
            in_flight_timeout_sec: DEFAULT_IN_FLIGHT_TIMEOUT_SEC,
            per_page: DEFAULT_PER_PAGE,
            notifications_polling: PollingConfig::default(),
            stats_polling: PollingConfig::default(),
            stats_query: StatsQuery::default(),
        }
    }

    /// Load from an optional TOML file layered over the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file_config = path.map(FileConfig::load).transpose()?;
        Self::resolve(file_config, &EnvConfig::from_env())
    }

    /// Resolve configuration from the environment and optional TOML file config.
    /// TOML values override environment values where present.
    pub fn resolve(file_config: Option<FileConfig>, env: &EnvConfig) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let api_base_url = file
            .api_base_url
            .or_else(|| env.api_base_url.clone())
            .ok_or_else(|| {
                anyhow!(
                    "api_base_url must be specified via {} or in config file",
                    API_BASE_URL_VAR
                )
            })?;
        let auth_token = file.auth_token.or_else(|| env.auth_token.clone());

        let stats_file = file.stats.unwrap_or_default();
        let defaults = StatsQuery::default();
        let period = match stats_file.period {
            Some(p) => match StatsPeriod::parse(&p) {
                Some(period) => period,
                None => bail!("Unknown stats period: {:?}", p),
            },
            None => defaults.period,
        };
        let stats_query = StatsQuery {
            period,
            metrics: stats_file.metrics.unwrap_or(defaults.metrics),
            realtime: stats_file.realtime.unwrap_or(defaults.realtime),
        };

        let settings = Self {
            api_base_url,
            auth_token,
            request_timeout_sec: file
                .request_timeout_sec
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SEC),
            in_flight_timeout_sec: file
                .in_flight_timeout_sec
                .unwrap_or(DEFAULT_IN_FLIGHT_TIMEOUT_SEC),
            per_page: file.per_page.unwrap_or(DEFAULT_PER_PAGE),
            notifications_polling: polling_config(file.notifications_polling),
            stats_polling: polling_config(file.stats_polling),
            stats_query,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        let url = self.api_base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(SyncError::validation(format!(
                "api_base_url must be an http(s) URL, got {:?}",
                self.api_base_url
            )));
        }
        if self.per_page == 0 || self.per_page > MAX_PER_PAGE {
            return Err(SyncError::validation(format!(
                "per_page must be between 1 and {}, got {}",
                MAX_PER_PAGE, self.per_page
            )));
        }
        if self.request_timeout_sec == 0 || self.in_flight_timeout_sec == 0 {
            return Err(SyncError::validation("timeouts must be at least 1 second"));
        }
        self.notifications_polling.validate()?;
        self.stats_polling.validate()?;
        self.stats_query.validate()
    }

    pub fn in_flight_timeout(&self) -> Duration {
        Duration::from_secs(self.in_flight_timeout_sec)
    }
}

fn polling_config(file: Option<PollingFileConfig>) -> PollingConfig {
    let file = file.unwrap_or_default();
    let defaults = PollingConfig::default();
    PollingConfig {
        enabled: file.enabled.unwrap_or(defaults.enabled),
        interval_secs: file.interval_secs.unwrap_or(defaults.interval_secs),
        auto_stop: file.auto_stop.unwrap_or(defaults.auto_stop),
        max_duration_mins: file.max_duration_mins.unwrap_or(defaults.max_duration_mins),
    }
}
