//! Optimistic notification mutations.
//!
//! Each mutation is applied to the cache first so readers see it at once,
//! then sent to the server. On failure, mark-as-read and mark-all-as-read are
//! rolled back. Delete is not: the item stays removed locally and the error
//! is reported.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::models::{MarkAllReadResponse, Notification};
use super::store::SharedNotificationCache;
use crate::api::NotificationApi;
use crate::error::SyncError;

#[derive(Clone)]
pub struct OptimisticMutationCoordinator {
    cache: SharedNotificationCache,
    api: Arc<dyn NotificationApi>,
    last_error: Arc<Mutex<Option<SyncError>>>,
}

impl OptimisticMutationCoordinator {
    pub fn new(cache: SharedNotificationCache, api: Arc<dyn NotificationApi>) -> Self {
        Self {
            cache,
            api,
            last_error: Arc::new(Mutex::new(None)),
        }
    }

    /// Error of the most recent failed mutation, cleared by the next success.
    pub async fn last_error(&self) -> Option<SyncError> {
        self.last_error.lock().await.clone()
    }

    pub async fn clear_error(&self) {
        *self.last_error.lock().await = None;
    }

    async fn fail(&self, error: SyncError) -> SyncError {
        *self.last_error.lock().await = Some(error.clone());
        error
    }

    /// Mark one notification as read.
    ///
    /// If the item is cached and unread it flips immediately and the unread
    /// count drops by one. The server is called either way.
    pub async fn mark_as_read(&self, id: &str) -> Result<Notification, SyncError> {
        let mutation = self.cache.write().await.mark_read_local(id);
        if mutation.is_none() {
            debug!("Notification {} not cached or already read", id);
        }

        match self.api.mark_read(id).await {
            Ok(server_item) => {
                if let Some(mutation) = &mutation {
                    self.cache
                        .write()
                        .await
                        .confirm_read(mutation, server_item.clone());
                }
                self.clear_error().await;
                Ok(server_item)
            }
            Err(e) => {
                warn!("Failed to mark notification {} as read: {}", id, e);
                if let Some(mutation) = &mutation {
                    self.cache.write().await.rollback_read(mutation);
                }
                Err(self.fail(e).await)
            }
        }
    }

    /// Mark every notification as read.
    ///
    /// Loaded items flip and the unread count drops to zero immediately. The
    /// server's `remaining_unread` then replaces the local count; if the two
    /// disagree the conflict is logged, not returned.
    pub async fn mark_all_as_read(&self) -> Result<MarkAllReadResponse, SyncError> {
        let mutation = self.cache.write().await.mark_all_read_local();

        match self.api.mark_all_read().await {
            Ok(response) => {
                let conflict = self.cache.write().await.reconcile_mark_all(&response);
                if let Some(conflict) = conflict {
                    warn!("{}", conflict);
                }
                info!(
                    "Marked {} notifications as read, {} remain unread",
                    response.updated_count, response.remaining_unread
                );
                self.clear_error().await;
                Ok(response)
            }
            Err(e) => {
                let restored = self.cache.write().await.rollback_mark_all(&mutation);
                warn!(
                    "Failed to mark all notifications as read, restored {} of {}: {}",
                    restored,
                    mutation.marked_count(),
                    e
                );
                Err(self.fail(e).await)
            }
        }
    }

    /// Delete a notification.
    ///
    /// The item is removed from the cache right away and is not restored if
    /// the server call fails.
    pub async fn delete(&self, id: &str) -> Result<(), SyncError> {
        let removed = self.cache.write().await.remove_local(id);
        if removed.is_none() {
            debug!("Notification {} not cached, deleting on server only", id);
        }

        match self.api.delete_notification(id).await {
            Ok(response) if response.success => {
                self.clear_error().await;
                Ok(())
            }
            Ok(response) => {
                let error = SyncError::network(
                    response
                        .message
                        .unwrap_or_else(|| format!("Server refused to delete {}", id)),
                );
                warn!("Failed to delete notification {}: {}", id, error);
                Err(self.fail(error).await)
            }
            Err(e) => {
                warn!("Failed to delete notification {}: {}", id, e);
                Err(self.fail(e).await)
            }
        }
    }
}
