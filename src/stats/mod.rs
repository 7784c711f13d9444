//! Dashboard statistics snapshot and its poll task.

mod models;
mod store;

pub use models::{
    RecalculateRequest, RecalculateResponse, StatsPeriod, StatsQuery, StatsSnapshot,
};
pub use store::{DashboardStatsStore, StatsPollTask};
