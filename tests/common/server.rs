//! Fake backend lifecycle management
//!
//! Each test gets an isolated axum server on an ephemeral port, with its own
//! notification collection and request log.

use super::constants::*;
use super::fixtures::seed_notifications;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use kpt_sync::api::ApiClient;
use kpt_sync::config::SyncSettings;
use kpt_sync::notifications::{
    DeleteResponse, MarkAllReadResponse, Notification, NotificationPage, PageWindow, Priority,
    Summary,
};
use kpt_sync::stats::{RecalculateRequest, RecalculateResponse};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::net::TcpListener;

/// Server-side state, inspectable and scriptable from tests.
#[derive(Default)]
pub struct BackendState {
    /// The authoritative collection, newest first
    pub notifications: Vec<Notification>,
    /// Query parameters of every `GET /notifications`
    pub list_requests: Vec<HashMap<String, String>>,
    /// Query parameters and request headers of every `GET /stats`
    pub stats_requests: Vec<(HashMap<String, String>, HeaderMap)>,
    pub recalculations: Vec<RecalculateRequest>,
    pub last_authorization: Option<String>,
    /// Unread notifications the server reports after mark-all-read, standing
    /// in for items that arrived concurrently
    pub unread_after_mark_all: u64,
    /// Bumped by every recalculation
    pub stats_version: u64,
    pub list_delay: Option<Duration>,
    pub omit_no_cache: bool,
    pub fail_list: bool,
    pub fail_mark_read: bool,
    pub fail_mark_all: bool,
    pub fail_delete: bool,
    pub fail_stats: bool,
}

type SharedState = Arc<Mutex<BackendState>>;

/// Fake backend instance.
///
/// When dropped, the server gracefully shuts down.
pub struct TestBackend {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,
    state: SharedState,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestBackend {
    /// Spawns a backend seeded with the standard notifications.
    pub async fn spawn() -> Self {
        Self::spawn_with(seed_notifications()).await
    }

    pub async fn spawn_with(notifications: Vec<Notification>) -> Self {
        let state = Arc::new(Mutex::new(BackendState {
            notifications,
            ..Default::default()
        }));

        let app = Router::new()
            .route("/notifications", get(list_notifications))
            .route("/notifications/mark-all-read", put(mark_all_read))
            .route("/notifications/{id}/read", put(mark_read))
            .route("/notifications/{id}", delete(delete_notification))
            .route("/stats", get(get_stats))
            .route("/stats/recalculate", post(recalculate))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test backend");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            state,
            _shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap()
    }

    /// Client authenticated with [`TEST_TOKEN`].
    pub fn client(&self) -> ApiClient {
        ApiClient::new(self.base_url.clone(), Some(TEST_TOKEN.to_string()), 5).unwrap()
    }

    /// Settings pointing at this backend, with a small page size.
    pub fn settings(&self) -> SyncSettings {
        let mut settings = SyncSettings::with_base_url(format!("{}/", self.base_url));
        settings.auth_token = Some(TEST_TOKEN.to_string());
        settings.per_page = TEST_PER_PAGE;
        settings.request_timeout_sec = 5;
        settings
    }

    pub fn unread_on_server(&self) -> usize {
        self.state()
            .notifications
            .iter()
            .filter(|n| !n.is_read)
            .count()
    }

    /// Wait until `condition` holds, or panic after [`WAIT_TIMEOUT_MS`].
    pub async fn wait_until(&self, what: &str, condition: impl Fn() -> bool) {
        let start = std::time::Instant::now();
        while !condition() {
            if start.elapsed() > Duration::from_millis(WAIT_TIMEOUT_MS) {
                panic!("Timed out after {}ms waiting for {}", WAIT_TIMEOUT_MS, what);
            }
            tokio::time::sleep(Duration::from_millis(WAIT_POLL_INTERVAL_MS)).await;
        }
    }
}

impl Drop for TestBackend {
    fn drop(&mut self) {
        // Send shutdown signal
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

fn record_auth(state: &mut BackendState, headers: &HeaderMap) {
    state.last_authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
}

fn server_error(message: &str) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, message.to_string()).into_response()
}

fn matches(notification: &Notification, params: &HashMap<String, String>) -> bool {
    if let Some(t) = params.get("type") {
        if notification.notification_type.as_str() != t {
            return false;
        }
    }
    if let Some(is_read) = params.get("is_read") {
        if notification.is_read.to_string() != *is_read {
            return false;
        }
    }
    if let Some(p) = params.get("priority") {
        if notification.priority.as_str() != p {
            return false;
        }
    }
    true
}

fn summary_of(notifications: &[Notification]) -> Summary {
    let today = Utc::now().date_naive();
    let mut priority_counts: BTreeMap<Priority, u64> = BTreeMap::new();
    for n in notifications.iter().filter(|n| !n.is_read) {
        *priority_counts.entry(n.priority).or_default() += 1;
    }
    Summary {
        unread_count: notifications.iter().filter(|n| !n.is_read).count() as u64,
        today_count: notifications
            .iter()
            .filter(|n| n.created_at.date_naive() == today)
            .count() as u64,
        priority_counts,
    }
}

async fn list_notifications(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let delay = {
        let mut state = state.lock().unwrap();
        record_auth(&mut state, &headers);
        state.list_requests.push(params.clone());
        if state.fail_list {
            return server_error("list exploded");
        }
        state.list_delay
    };
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let page: usize = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let per_page: usize = params
        .get("per_page")
        .and_then(|p| p.parse().ok())
        .unwrap_or(20);

    let state = state.lock().unwrap();
    let filtered: Vec<&Notification> = state
        .notifications
        .iter()
        .filter(|n| matches(n, &params))
        .collect();
    let total_count = filtered.len();
    let total_pages = total_count.div_ceil(per_page).max(1);
    let notifications = filtered
        .into_iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .cloned()
        .collect();

    Json(NotificationPage {
        notifications,
        pagination: PageWindow {
            current_page: page as u32,
            per_page: per_page as u32,
            total_pages: total_pages as u32,
            total_count: total_count as u64,
        },
        summary: summary_of(&state.notifications),
    })
    .into_response()
}

async fn mark_read(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let mut state = state.lock().unwrap();
    record_auth(&mut state, &headers);
    if state.fail_mark_read {
        return server_error("mark read exploded");
    }
    match state.notifications.iter_mut().find(|n| n.id == id) {
        Some(notification) => {
            if !notification.is_read {
                notification.is_read = true;
                notification.read_at = Some(Utc::now());
                notification.updated_at = Utc::now();
            }
            Json(notification.clone()).into_response()
        }
        None => (StatusCode::NOT_FOUND, "Notification not found").into_response(),
    }
}

async fn mark_all_read(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let mut state = state.lock().unwrap();
    record_auth(&mut state, &headers);
    if state.fail_mark_all {
        return server_error("mark all exploded");
    }
    let now = Utc::now();
    let mut updated_count = 0;
    for n in state.notifications.iter_mut().filter(|n| !n.is_read) {
        n.is_read = true;
        n.read_at = Some(now);
        updated_count += 1;
    }
    Json(MarkAllReadResponse {
        updated_count,
        remaining_unread: state.unread_after_mark_all,
    })
    .into_response()
}

async fn delete_notification(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let mut state = state.lock().unwrap();
    record_auth(&mut state, &headers);
    if state.fail_delete {
        return server_error("delete exploded");
    }
    let before = state.notifications.len();
    state.notifications.retain(|n| n.id != id);
    if state.notifications.len() == before {
        return (
            StatusCode::NOT_FOUND,
            Json(DeleteResponse {
                success: false,
                message: Some("Notification not found".to_string()),
            }),
        )
            .into_response();
    }
    Json(DeleteResponse {
        success: true,
        message: Some("Notification deleted".to_string()),
    })
    .into_response()
}

async fn get_stats(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mut state = state.lock().unwrap();
    record_auth(&mut state, &headers);
    state.stats_requests.push((params.clone(), headers));
    if state.fail_stats {
        return (StatusCode::SERVICE_UNAVAILABLE, "stats offline").into_response();
    }

    let unread = state.notifications.iter().filter(|n| !n.is_read).count();
    let body = Json(serde_json::json!({
        "period": params.get("period").cloned().unwrap_or_else(|| "week".to_string()),
        "generated_at": Utc::now(),
        "metrics": {
            "sessions_completed": 12,
            "action_items_open": 4,
            "unread_notifications": unread,
            "stats_version": state.stats_version,
        },
    }));

    if state.omit_no_cache {
        body.into_response()
    } else {
        (
            [
                (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
                (header::PRAGMA, "no-cache"),
            ],
            body,
        )
            .into_response()
    }
}

async fn recalculate(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(request): Json<RecalculateRequest>,
) -> Response {
    let mut state = state.lock().unwrap();
    record_auth(&mut state, &headers);
    state.recalculations.push(request);
    state.stats_version += 1;
    Json(RecalculateResponse {
        success: true,
        message: Some(format!("Recalculated {}", request.period.as_str())),
    })
    .into_response()
}
