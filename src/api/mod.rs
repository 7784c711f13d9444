//! Backend contracts consumed by the sync core.
//!
//! The server is authoritative for everything behind these traits. The
//! [`ApiClient`] talks to it over HTTP; tests substitute in-memory fakes.

mod client;

pub use client::ApiClient;

use async_trait::async_trait;

use crate::error::SyncError;
use crate::notifications::{
    DeleteResponse, FilterSpec, MarkAllReadResponse, Notification, NotificationPage,
};
use crate::stats::{RecalculateResponse, StatsPeriod, StatsQuery, StatsSnapshot};

/// Parameters of a notification list request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub filters: FilterSpec,
    pub page: u32,
    pub per_page: u32,
}

/// Notification endpoints.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait NotificationApi: Send + Sync {
    /// `GET /notifications`
    async fn list_notifications(&self, query: &ListQuery) -> Result<NotificationPage, SyncError>;

    /// `PUT /notifications/{id}/read`
    async fn mark_read(&self, id: &str) -> Result<Notification, SyncError>;

    /// `PUT /notifications/mark-all-read`
    async fn mark_all_read(&self) -> Result<MarkAllReadResponse, SyncError>;

    /// `DELETE /notifications/{id}`
    async fn delete_notification(&self, id: &str) -> Result<DeleteResponse, SyncError>;
}

/// Dashboard statistics endpoints.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait StatsApi: Send + Sync {
    /// `GET /stats`
    async fn get_stats(&self, query: &StatsQuery) -> Result<StatsSnapshot, SyncError>;

    /// `POST /stats/recalculate`
    async fn recalculate(
        &self,
        period: StatsPeriod,
        force: bool,
    ) -> Result<RecalculateResponse, SyncError>;
}
