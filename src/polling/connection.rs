//! Two-state connection status exposed to callers.

use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Stopped,
    Connected,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Stopped => "stopped",
            ConnectionStatus::Connected => "connected",
        }
    }
}

/// Shared view of whether polling is live.
///
/// Clones observe the same state. UI consumers can [`subscribe`] to be woken
/// on every transition.
///
/// [`subscribe`]: ConnectionStateTracker::subscribe
#[derive(Clone)]
pub struct ConnectionStateTracker {
    tx: Arc<watch::Sender<ConnectionStatus>>,
}

impl Default for ConnectionStateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStateTracker {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ConnectionStatus::Stopped);
        Self { tx: Arc::new(tx) }
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.tx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.tx.subscribe()
    }

    /// Returns true if this call changed the status.
    pub(crate) fn mark_connected(&self) -> bool {
        self.set(ConnectionStatus::Connected)
    }

    /// Returns true if this call changed the status.
    pub(crate) fn mark_stopped(&self) -> bool {
        self.set(ConnectionStatus::Stopped)
    }

    fn set(&self, status: ConnectionStatus) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        })
    }
}
