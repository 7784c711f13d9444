//! KPT Sync Library
//!
//! Client-side synchronization core for the retrospective dashboard: a
//! time-boxed polling scheduler, a paginated notification cache with
//! optimistic mutations, and the dashboard statistics snapshot.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod notifications;
pub mod polling;
pub mod stats;

#[cfg(test)]
mod test_support;

// Re-export commonly used types for convenience
pub use api::{ApiClient, ListQuery, NotificationApi, StatsApi};
pub use config::SyncSettings;
pub use engine::{SyncEngine, SyncSession};
pub use error::SyncError;
pub use notifications::{FilterSpec, NotificationListStore, OptimisticMutationCoordinator};
pub use polling::{ConnectionStateTracker, ConnectionStatus, PollingConfig, PollingScheduler};
pub use stats::DashboardStatsStore;
