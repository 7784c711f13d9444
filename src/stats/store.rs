//! Holds the latest dashboard statistics snapshot.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::models::{StatsPeriod, StatsQuery, StatsSnapshot};
use crate::api::StatsApi;
use crate::error::SyncError;
use crate::polling::{PollContext, PollTask};

#[derive(Debug, Default)]
struct StatsState {
    query: StatsQuery,
    snapshot: Option<StatsSnapshot>,
    updated_at: Option<DateTime<Utc>>,
    /// Sequence number handed to the next request.
    next_seq: u64,
    /// Sequence number of the request whose snapshot is held.
    applied_seq: u64,
    last_error: Option<String>,
}

#[derive(Clone)]
pub struct DashboardStatsStore {
    state: Arc<RwLock<StatsState>>,
    api: Arc<dyn StatsApi>,
}

impl DashboardStatsStore {
    pub fn new(api: Arc<dyn StatsApi>, query: StatsQuery) -> Self {
        Self {
            state: Arc::new(RwLock::new(StatsState {
                query,
                ..Default::default()
            })),
            api,
        }
    }

    pub async fn query(&self) -> StatsQuery {
        self.state.read().await.query.clone()
    }

    pub async fn snapshot(&self) -> Option<StatsSnapshot> {
        self.state.read().await.snapshot.clone()
    }

    pub async fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.updated_at
    }

    pub async fn last_error(&self) -> Option<String> {
        self.state.read().await.last_error.clone()
    }

    /// Fetch statistics for `query` and make it the query used by refreshes.
    pub async fn fetch(&self, query: StatsQuery) -> Result<StatsSnapshot, SyncError> {
        query.validate()?;
        let request = self.begin(Some(query)).await;
        self.complete(request, || true).await
    }

    /// Re-fetch with the held query.
    pub async fn refresh(&self) -> Result<StatsSnapshot, SyncError> {
        self.refresh_guarded(|| true).await
    }

    async fn refresh_guarded(
        &self,
        is_current: impl Fn() -> bool + Send,
    ) -> Result<StatsSnapshot, SyncError> {
        let request = self.begin(None).await;
        self.complete(request, is_current).await
    }

    /// Ask the server to recompute `period`, then refresh the held snapshot.
    pub async fn recalculate(
        &self,
        period: StatsPeriod,
        force: bool,
    ) -> Result<StatsSnapshot, SyncError> {
        let response = match self.api.recalculate(period, force).await {
            Ok(response) if response.success => response,
            Ok(response) => {
                let error = SyncError::network(response.message.unwrap_or_else(|| {
                    format!("Server refused to recalculate {} stats", period.as_str())
                }));
                return Err(self.record_error(error).await);
            }
            Err(e) => return Err(self.record_error(e).await),
        };
        info!(
            "Recalculated {} stats (force: {}){}",
            period.as_str(),
            force,
            response
                .message
                .map(|m| format!(": {}", m))
                .unwrap_or_default()
        );
        self.refresh().await
    }

    async fn record_error(&self, error: SyncError) -> SyncError {
        warn!("Stats request failed: {}", error);
        self.state.write().await.last_error = Some(error.to_string());
        error
    }

    /// Number the next request, replacing the held query if one is given.
    async fn begin(&self, query: Option<StatsQuery>) -> (StatsQuery, u64) {
        let mut state = self.state.write().await;
        if let Some(query) = query {
            state.query = query;
        }
        state.next_seq += 1;
        (state.query.clone(), state.next_seq)
    }

    /// A response is applied only if no later request has landed first and
    /// `is_current` still holds once the state lock is taken.
    async fn complete(
        &self,
        (query, seq): (StatsQuery, u64),
        is_current: impl Fn() -> bool + Send,
    ) -> Result<StatsSnapshot, SyncError> {
        debug!("Fetching {} stats (request {})", query.period.as_str(), seq);

        let result = self.api.get_stats(&query).await;
        let mut state = self.state.write().await;
        if !is_current() {
            debug!("Dropping stats response {} from a stopped poll", seq);
            return result;
        }

        match result {
            Ok(snapshot) => {
                if seq > state.applied_seq {
                    state.snapshot = Some(snapshot.clone());
                    state.updated_at = Some(Utc::now());
                    state.applied_seq = seq;
                    state.last_error = None;
                } else {
                    debug!(
                        "Stats response {} superseded by {}",
                        seq, state.applied_seq
                    );
                }
                Ok(snapshot)
            }
            Err(e) => {
                drop(state);
                Err(self.record_error(e).await)
            }
        }
    }
}

/// Keeps a [`DashboardStatsStore`] fresh from a polling scheduler.
pub struct StatsPollTask {
    store: DashboardStatsStore,
}

impl StatsPollTask {
    pub fn new(store: DashboardStatsStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl PollTask for StatsPollTask {
    fn name(&self) -> &'static str {
        "stats"
    }

    async fn poll(&self, ctx: &PollContext) -> Result<(), SyncError> {
        self.store
            .refresh_guarded(|| ctx.is_current())
            .await
            .map(|_| ())
    }
}
