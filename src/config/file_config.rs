use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override the environment)
    pub api_base_url: Option<String>,
    pub auth_token: Option<String>,
    pub request_timeout_sec: Option<u64>,
    pub in_flight_timeout_sec: Option<u64>,
    pub per_page: Option<u32>,

    // Feature configs
    pub notifications_polling: Option<PollingFileConfig>,
    pub stats_polling: Option<PollingFileConfig>,
    pub stats: Option<StatsFileConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct PollingFileConfig {
    pub enabled: Option<bool>,
    pub interval_secs: Option<u64>,
    pub auto_stop: Option<bool>,
    pub max_duration_mins: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct StatsFileConfig {
    /// One of "today", "week", "month", "quarter", "year"
    pub period: Option<String>,
    pub metrics: Option<Vec<String>>,
    pub realtime: Option<bool>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
