//! HTTP client for the retrospective backend.

use reqwest::header::{HeaderMap, CACHE_CONTROL, PRAGMA};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

use async_trait::async_trait;

use super::{ListQuery, NotificationApi, StatsApi};
use crate::error::SyncError;
use crate::notifications::{
    DeleteResponse, FilterCompiler, MarkAllReadResponse, Notification, NotificationPage,
};
use crate::stats::{
    RecalculateRequest, RecalculateResponse, StatsPeriod, StatsQuery, StatsSnapshot,
};

/// HTTP client implementing every backend contract the sync core consumes.
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the API (e.g., "https://app.example.com/api")
    /// * `auth_token` - Optional bearer token sent with every request
    /// * `timeout_sec` - Request timeout in seconds
    pub fn new(
        base_url: String,
        auth_token: Option<String>,
        timeout_sec: u64,
    ) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_sec))
            .build()
            .map_err(|e| SyncError::network(format!("Failed to create HTTP client: {}", e)))?;

        // Ensure base_url doesn't have trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            auth_token,
        })
    }

    /// Get the base URL of the API.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response, SyncError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| SyncError::network(format!("Failed to {}: {}", what, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = if body.is_empty() {
                status.canonical_reason().unwrap_or("no body").to_string()
            } else {
                body
            };
            return Err(SyncError::http_status(
                status.as_u16(),
                format!("Failed to {}: {}", what, detail),
            ));
        }

        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(response: Response, what: &str) -> Result<T, SyncError> {
        response
            .json()
            .await
            .map_err(|e| SyncError::network(format!("Failed to parse {} response: {}", what, e)))
    }
}

/// Whether response headers forbid intermediate caches from reusing the body.
fn forbids_caching(headers: &HeaderMap) -> bool {
    let cache_control = headers
        .get_all(CACHE_CONTROL)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|d| {
            let d = d.trim().to_ascii_lowercase();
            d == "no-cache" || d == "no-store"
        });
    let pragma = headers
        .get(PRAGMA)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("no-cache"))
        .unwrap_or(false);
    cache_control || pragma
}

#[async_trait]
impl NotificationApi for ApiClient {
    async fn list_notifications(&self, query: &ListQuery) -> Result<NotificationPage, SyncError> {
        let pairs = FilterCompiler::query_pairs(&query.filters, query.page, query.per_page)?;
        debug!("Listing notifications: {:?}", pairs);

        let request = self.client.get(self.url("/notifications")).query(&pairs);
        let response = self.send(request, "list notifications").await?;
        Self::decode(response, "notification list").await
    }

    async fn mark_read(&self, id: &str) -> Result<Notification, SyncError> {
        let url = self.url(&format!(
            "/notifications/{}/read",
            urlencoding::encode(id)
        ));
        let response = self
            .send(self.client.put(url), "mark notification as read")
            .await?;
        Self::decode(response, "mark read").await
    }

    async fn mark_all_read(&self) -> Result<MarkAllReadResponse, SyncError> {
        let request = self.client.put(self.url("/notifications/mark-all-read"));
        let response = self.send(request, "mark all notifications as read").await?;
        Self::decode(response, "mark all read").await
    }

    async fn delete_notification(&self, id: &str) -> Result<DeleteResponse, SyncError> {
        let url = self.url(&format!("/notifications/{}", urlencoding::encode(id)));
        let response = self
            .send(self.client.delete(url), "delete notification")
            .await?;
        Self::decode(response, "delete").await
    }
}

#[async_trait]
impl StatsApi for ApiClient {
    async fn get_stats(&self, query: &StatsQuery) -> Result<StatsSnapshot, SyncError> {
        query.validate()?;

        let request = self
            .client
            .get(self.url("/stats"))
            .query(&query.query_pairs())
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache");
        let response = self.send(request, "fetch stats").await?;

        let cacheable = !forbids_caching(response.headers());
        if cacheable {
            warn!(
                "Stats response for period {} carries no no-cache directive",
                query.period.as_str()
            );
        }

        let mut snapshot: StatsSnapshot = Self::decode(response, "stats").await?;
        snapshot.cacheable_response = cacheable;
        Ok(snapshot)
    }

    async fn recalculate(
        &self,
        period: StatsPeriod,
        force: bool,
    ) -> Result<RecalculateResponse, SyncError> {
        let request = self
            .client
            .post(self.url("/stats/recalculate"))
            .json(&RecalculateRequest { period, force });
        let response = self.send(request, "recalculate stats").await?;
        Self::decode(response, "recalculate").await
    }
}
