//! Dashboard statistics models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Aggregation window for dashboard statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsPeriod {
    Today,
    #[default]
    Week,
    Month,
    Quarter,
    Year,
}

impl StatsPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatsPeriod::Today => "today",
            StatsPeriod::Week => "week",
            StatsPeriod::Month => "month",
            StatsPeriod::Quarter => "quarter",
            StatsPeriod::Year => "year",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "today" => Some(StatsPeriod::Today),
            "week" => Some(StatsPeriod::Week),
            "month" => Some(StatsPeriod::Month),
            "quarter" => Some(StatsPeriod::Quarter),
            "year" => Some(StatsPeriod::Year),
            _ => None,
        }
    }
}

/// Parameters of `GET /stats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsQuery {
    pub period: StatsPeriod,
    pub metrics: Vec<String>,
    pub realtime: bool,
}

impl Default for StatsQuery {
    fn default() -> Self {
        Self {
            period: StatsPeriod::Week,
            metrics: Vec::new(),
            realtime: true,
        }
    }
}

impl StatsQuery {
    /// Metric names must be non-empty `[a-z0-9_]` tokens.
    pub fn validate(&self) -> Result<(), SyncError> {
        for metric in &self.metrics {
            let valid = !metric.is_empty()
                && metric
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
            if !valid {
                return Err(SyncError::validation(format!(
                    "Invalid metric name: {:?}",
                    metric
                )));
            }
        }
        Ok(())
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("period", self.period.as_str().to_string())];
        if !self.metrics.is_empty() {
            pairs.push(("metrics", self.metrics.join(",")));
        }
        pairs.push(("realtime", self.realtime.to_string()));
        pairs
    }
}

/// A statistics snapshot for the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub period: StatsPeriod,
    #[serde(default)]
    pub generated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metrics: serde_json::Map<String, serde_json::Value>,
    /// Set by the client when the response lacked a no-cache directive.
    #[serde(skip)]
    pub cacheable_response: bool,
}

/// Body of `POST /stats/recalculate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecalculateRequest {
    pub period: StatsPeriod,
    pub force: bool,
}

/// Response of `POST /stats/recalculate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecalculateResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}
