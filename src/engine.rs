//! Per-view sync engine owning the stores and their pollers.

use std::sync::Arc;
use tracing::info;

use crate::api::{ApiClient, NotificationApi, StatsApi};
use crate::config::SyncSettings;
use crate::error::SyncError;
use crate::notifications::{
    FetchOutcome, NotificationListStore, NotificationPollTask, OptimisticMutationCoordinator,
};
use crate::polling::{
    ConnectionStateTracker, FixedInterval, PollingScheduler, RetryPolicy, SchedulerOptions,
    StopReason,
};
use crate::stats::{DashboardStatsStore, StatsPollTask, StatsSnapshot};

/// Everything a view needs to stay in sync with the backend.
///
/// Create one per active view. Polling runs only while a [`SyncSession`]
/// returned by [`start`](SyncEngine::start) is alive, and dropping the engine
/// stops it as well.
pub struct SyncEngine {
    settings: SyncSettings,
    notifications: NotificationListStore,
    mutations: OptimisticMutationCoordinator,
    stats: DashboardStatsStore,
    notification_poller: PollingScheduler,
    stats_poller: PollingScheduler,
}

impl SyncEngine {
    pub fn new(
        settings: SyncSettings,
        notification_api: Arc<dyn NotificationApi>,
        stats_api: Arc<dyn StatsApi>,
    ) -> Result<Self, SyncError> {
        Self::with_retry_policy(settings, notification_api, stats_api, Arc::new(FixedInterval))
    }

    pub fn with_retry_policy(
        settings: SyncSettings,
        notification_api: Arc<dyn NotificationApi>,
        stats_api: Arc<dyn StatsApi>,
        retry_policy: Arc<dyn RetryPolicy>,
    ) -> Result<Self, SyncError> {
        settings.validate()?;

        let notifications = NotificationListStore::new(notification_api.clone(), settings.per_page);
        let mutations = OptimisticMutationCoordinator::new(notifications.cache(), notification_api);
        let stats = DashboardStatsStore::new(stats_api, settings.stats_query.clone());

        let options = SchedulerOptions {
            in_flight_timeout: settings.in_flight_timeout(),
        };
        let notification_poller = PollingScheduler::new(
            Arc::new(NotificationPollTask::new(notifications.clone())),
            ConnectionStateTracker::new(),
            retry_policy.clone(),
            options,
        );
        let stats_poller = PollingScheduler::new(
            Arc::new(StatsPollTask::new(stats.clone())),
            ConnectionStateTracker::new(),
            retry_policy,
            options,
        );

        Ok(Self {
            settings,
            notifications,
            mutations,
            stats,
            notification_poller,
            stats_poller,
        })
    }

    /// Engine talking to the backend over HTTP.
    pub fn connect(settings: SyncSettings) -> Result<Self, SyncError> {
        settings.validate()?;
        let client = Arc::new(ApiClient::new(
            settings.api_base_url.clone(),
            settings.auth_token.clone(),
            settings.request_timeout_sec,
        )?);
        info!("Sync engine connecting to {}", client.base_url());
        Self::new(settings, client.clone(), client)
    }

    /// Start both pollers with their configured settings.
    ///
    /// Polling stops when the returned session is dropped.
    pub fn start(&self) -> Result<SyncSession, SyncError> {
        let session = SyncSession {
            pollers: vec![self.notification_poller.clone(), self.stats_poller.clone()],
        };
        self.notification_poller
            .start(self.settings.notifications_polling)?;
        self.stats_poller.start(self.settings.stats_polling)?;
        Ok(session)
    }

    pub fn stop(&self) {
        self.notification_poller.stop();
        self.stats_poller.stop();
    }

    /// Refresh the notification list and the stats snapshot concurrently,
    /// outside the polling cadence.
    pub async fn refresh_all(
        &self,
    ) -> (
        Result<FetchOutcome, SyncError>,
        Result<StatsSnapshot, SyncError>,
    ) {
        futures::join!(self.notifications.refresh(), self.stats.refresh())
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn notifications(&self) -> &NotificationListStore {
        &self.notifications
    }

    pub fn mutations(&self) -> &OptimisticMutationCoordinator {
        &self.mutations
    }

    pub fn stats(&self) -> &DashboardStatsStore {
        &self.stats
    }

    pub fn notification_poller(&self) -> &PollingScheduler {
        &self.notification_poller
    }

    pub fn stats_poller(&self) -> &PollingScheduler {
        &self.stats_poller
    }

    /// Connection status of the notification poller.
    pub fn connection(&self) -> &ConnectionStateTracker {
        self.notification_poller.connection()
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.notification_poller.stop_with(StopReason::Teardown);
        self.stats_poller.stop_with(StopReason::Teardown);
    }
}

/// Keeps polling alive. Dropping it stops every poller it covers.
#[must_use = "polling stops as soon as the session is dropped"]
pub struct SyncSession {
    pollers: Vec<PollingScheduler>,
}

impl SyncSession {
    pub fn is_active(&self) -> bool {
        self.pollers.iter().any(PollingScheduler::is_active)
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        for poller in &self.pollers {
            poller.stop_with(StopReason::Teardown);
        }
    }
}
