//! Fixtures and in-memory API fakes shared by unit tests.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::Semaphore;

use crate::api::{ListQuery, NotificationApi, StatsApi};
use crate::error::SyncError;
use crate::notifications::{
    DeleteResponse, MarkAllReadResponse, Notification, NotificationPage, NotificationType,
    PageWindow, Priority, Summary,
};
use crate::stats::{RecalculateResponse, StatsPeriod, StatsQuery, StatsSnapshot};

pub fn notification(id: &str, is_read: bool) -> Notification {
    let created = Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, 0).unwrap();
    Notification {
        id: id.to_string(),
        notification_type: NotificationType::Reminder,
        title: format!("Notification {}", id),
        message: "Time to write your Keep/Problem/Try".to_string(),
        priority: Priority::Normal,
        is_read,
        read_at: if is_read { Some(created) } else { None },
        expires_at: None,
        metadata: serde_json::Map::new(),
        created_at: created,
        updated_at: created,
    }
}

pub fn page_of(
    items: Vec<Notification>,
    current_page: u32,
    total_pages: u32,
    unread_count: u64,
) -> NotificationPage {
    NotificationPage {
        pagination: PageWindow {
            current_page,
            per_page: 20,
            total_pages,
            total_count: 20 * total_pages as u64,
        },
        notifications: items,
        summary: Summary {
            unread_count,
            today_count: 0,
            priority_counts: Default::default(),
        },
    }
}

/// Scriptable notification backend.
pub struct FakeNotificationApi {
    pages: Mutex<HashMap<u32, NotificationPage>>,
    pub list_calls: AtomicUsize,
    pub list_completions: AtomicUsize,
    pub last_query: Mutex<Option<ListQuery>>,
    pub fail_list: AtomicBool,
    /// When set, every list call waits for one permit on `list_gate`.
    pub gated: AtomicBool,
    pub list_gate: Semaphore,
    pub fail_mark_read: AtomicBool,
    pub fail_mark_all: AtomicBool,
    pub fail_delete: AtomicBool,
    pub remaining_unread: AtomicU64,
    pub mark_read_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
}

impl FakeNotificationApi {
    pub fn new() -> Self {
        Self {
            pages: Mutex::new(HashMap::new()),
            list_calls: AtomicUsize::new(0),
            list_completions: AtomicUsize::new(0),
            last_query: Mutex::new(None),
            fail_list: AtomicBool::new(false),
            gated: AtomicBool::new(false),
            list_gate: Semaphore::new(0),
            fail_mark_read: AtomicBool::new(false),
            fail_mark_all: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            remaining_unread: AtomicU64::new(0),
            mark_read_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_page(&self, page: u32, content: NotificationPage) {
        self.pages.lock().unwrap().insert(page, content);
    }

    pub fn release_list(&self, n: usize) {
        self.list_gate.add_permits(n);
    }

    pub fn completions(&self) -> usize {
        self.list_completions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationApi for FakeNotificationApi {
    async fn list_notifications(&self, query: &ListQuery) -> Result<NotificationPage, SyncError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_query.lock().unwrap() = Some(query.clone());

        if self.gated.load(Ordering::SeqCst) {
            self.list_gate.acquire().await.unwrap().forget();
        }

        let result = if self.fail_list.load(Ordering::SeqCst) {
            Err(SyncError::http_status(500, "list failed"))
        } else {
            Ok(self
                .pages
                .lock()
                .unwrap()
                .get(&query.page)
                .cloned()
                .unwrap_or_else(|| page_of(Vec::new(), query.page, query.page, 0)))
        };
        self.list_completions.fetch_add(1, Ordering::SeqCst);
        result
    }

    async fn mark_read(&self, id: &str) -> Result<Notification, SyncError> {
        self.mark_read_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_mark_read.load(Ordering::SeqCst) {
            return Err(SyncError::network("mark read failed"));
        }
        Ok(notification(id, true))
    }

    async fn mark_all_read(&self) -> Result<MarkAllReadResponse, SyncError> {
        if self.fail_mark_all.load(Ordering::SeqCst) {
            return Err(SyncError::http_status(502, "mark all failed"));
        }
        Ok(MarkAllReadResponse {
            updated_count: 10,
            remaining_unread: self.remaining_unread.load(Ordering::SeqCst),
        })
    }

    async fn delete_notification(&self, _id: &str) -> Result<DeleteResponse, SyncError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(SyncError::network("delete failed"));
        }
        Ok(DeleteResponse {
            success: true,
            message: Some("Notification deleted".to_string()),
        })
    }
}

/// Scriptable stats backend.
pub struct FakeStatsApi {
    pub get_calls: AtomicUsize,
    pub get_completions: AtomicUsize,
    pub recalculate_calls: AtomicUsize,
    pub fail_get: AtomicBool,
    pub last_force: AtomicBool,
    /// When set, every stats call waits for one permit on `gate`.
    pub gated: AtomicBool,
    pub gate: Semaphore,
}

impl Default for FakeStatsApi {
    fn default() -> Self {
        Self {
            get_calls: AtomicUsize::new(0),
            get_completions: AtomicUsize::new(0),
            recalculate_calls: AtomicUsize::new(0),
            fail_get: AtomicBool::new(false),
            last_force: AtomicBool::new(false),
            gated: AtomicBool::new(false),
            gate: Semaphore::new(0),
        }
    }
}

#[async_trait]
impl StatsApi for FakeStatsApi {
    async fn get_stats(&self, query: &StatsQuery) -> Result<StatsSnapshot, SyncError> {
        let n = self.get_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.gated.load(Ordering::SeqCst) {
            self.gate.acquire().await.unwrap().forget();
        }
        self.get_completions.fetch_add(1, Ordering::SeqCst);
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(SyncError::http_status(503, "stats unavailable"));
        }
        let mut metrics = serde_json::Map::new();
        metrics.insert("fetch_number".to_string(), serde_json::json!(n));
        Ok(StatsSnapshot {
            period: query.period,
            generated_at: Some(Utc::now()),
            metrics,
            cacheable_response: false,
        })
    }

    async fn recalculate(
        &self,
        _period: StatsPeriod,
        force: bool,
    ) -> Result<RecalculateResponse, SyncError> {
        self.recalculate_calls.fetch_add(1, Ordering::SeqCst);
        self.last_force.store(force, Ordering::SeqCst);
        Ok(RecalculateResponse {
            success: true,
            message: None,
        })
    }
}
