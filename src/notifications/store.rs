//! Paginated, filtered notification list backed by the shared cache.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::cache::{CacheSnapshot, FetchOutcome, FetchTicket, NotificationCache};
use super::filter::{validate_paging, FilterSpec};
use crate::api::{ListQuery, NotificationApi};
use crate::error::SyncError;
use crate::polling::{PollContext, PollTask};

pub type SharedNotificationCache = Arc<RwLock<NotificationCache>>;

/// Loads notification pages into the cache.
///
/// The cache lock is never held across a network call: a fetch takes a
/// ticket under the lock, releases it, awaits the server and then applies
/// the response under the lock again.
#[derive(Clone)]
pub struct NotificationListStore {
    cache: SharedNotificationCache,
    api: Arc<dyn NotificationApi>,
    per_page: u32,
}

impl NotificationListStore {
    pub fn new(api: Arc<dyn NotificationApi>, per_page: u32) -> Self {
        Self::with_cache(Arc::new(RwLock::new(NotificationCache::new())), api, per_page)
    }

    pub fn with_cache(
        cache: SharedNotificationCache,
        api: Arc<dyn NotificationApi>,
        per_page: u32,
    ) -> Self {
        Self {
            cache,
            api,
            per_page,
        }
    }

    pub fn cache(&self) -> SharedNotificationCache {
        Arc::clone(&self.cache)
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    pub async fn snapshot(&self) -> CacheSnapshot {
        self.cache.read().await.snapshot()
    }

    pub async fn has_more(&self) -> bool {
        self.cache.read().await.has_more()
    }

    /// Fetch `page` of the list matching `filters`.
    ///
    /// A filter different from the cached one clears the list and fetches
    /// page 1 regardless of `page`.
    pub async fn fetch(&self, filters: &FilterSpec, page: u32) -> Result<FetchOutcome, SyncError> {
        validate_paging(page, self.per_page)?;
        let ticket = self.cache.write().await.begin_fetch(filters, page);
        self.complete(ticket, || true).await
    }

    /// Re-fetch page 1 with the current filters.
    pub async fn refresh(&self) -> Result<FetchOutcome, SyncError> {
        self.refresh_guarded(|| true).await
    }

    pub(crate) async fn refresh_guarded(
        &self,
        is_current: impl Fn() -> bool + Send,
    ) -> Result<FetchOutcome, SyncError> {
        validate_paging(1, self.per_page)?;
        let ticket = self.cache.write().await.begin_refresh();
        self.complete(ticket, is_current).await
    }

    /// Send the request for `ticket` and apply the response.
    ///
    /// `is_current` is checked with the cache write lock held, so a stop
    /// that lands while the response waits for the lock still drops it.
    async fn complete(
        &self,
        ticket: FetchTicket,
        is_current: impl Fn() -> bool + Send,
    ) -> Result<FetchOutcome, SyncError> {
        let query = ListQuery {
            filters: ticket.filters.clone(),
            page: ticket.page,
            per_page: self.per_page,
        };
        debug!("Fetching notifications page {} {:?}", query.page, query.filters);

        let result = self.api.list_notifications(&query).await;
        let mut cache = self.cache.write().await;
        if !is_current() {
            debug!("Dropping notifications page {} from a stopped poll", query.page);
            return Ok(FetchOutcome::Stale);
        }

        match result {
            Ok(page) => Ok(cache.apply_fetch(ticket, page)),
            Err(e) => {
                warn!("Failed to fetch notifications page {}: {}", query.page, e);
                cache.record_error(&e);
                Err(e)
            }
        }
    }

    /// Fetch the page after the last loaded one.
    ///
    /// Returns `Ok(None)` when the server reported no further pages.
    pub async fn load_more(&self) -> Result<Option<FetchOutcome>, SyncError> {
        validate_paging(1, self.per_page)?;
        let ticket = {
            let mut cache = self.cache.write().await;
            if !cache.has_more() {
                return Ok(None);
            }
            let filters = cache.filters().clone();
            let next_page = cache.window().current_page + 1;
            cache.begin_fetch(&filters, next_page)
        };
        self.complete(ticket, || true).await.map(Some)
    }

    /// Switch to `filters` and load their first page.
    pub async fn set_filters(&self, filters: FilterSpec) -> Result<FetchOutcome, SyncError> {
        self.fetch(&filters, 1).await
    }
}

/// Polls page 1 of the current notification list.
pub struct NotificationPollTask {
    store: NotificationListStore,
}

impl NotificationPollTask {
    pub fn new(store: NotificationListStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl PollTask for NotificationPollTask {
    fn name(&self) -> &'static str {
        "notifications"
    }

    async fn poll(&self, ctx: &PollContext) -> Result<(), SyncError> {
        match self.store.refresh_guarded(|| ctx.is_current()).await? {
            FetchOutcome::Applied { received, .. } => {
                debug!("Polled {} notifications", received);
            }
            FetchOutcome::Stale => {}
        }
        Ok(())
    }
}
