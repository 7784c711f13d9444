//! Error taxonomy shared by every component of the sync core.

use thiserror::Error;

/// Errors surfaced by the sync core.
///
/// None of these are fatal. Network failures are retried on the next tick or
/// left for an explicit user retry. Reconciliation conflicts resolve to the
/// authoritative server value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// The request failed or the server answered with a non-success status.
    #[error("Network error{}: {message}", status_suffix(.status))]
    Network {
        status: Option<u16>,
        message: String,
    },

    /// Malformed filter or out-of-range configuration.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An authoritative response disagreed with optimistic local state.
    #[error("Reconciliation conflict on {field}: local {local}, authoritative {authoritative}")]
    ReconciliationConflict {
        field: &'static str,
        local: u64,
        authoritative: u64,
    },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {})", s)).unwrap_or_default()
}

impl SyncError {
    pub fn network(message: impl Into<String>) -> Self {
        SyncError::Network {
            status: None,
            message: message.into(),
        }
    }

    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        SyncError::Network {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        SyncError::Validation(message.into())
    }

    /// Returns true if retrying the same operation later might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Network { .. })
    }
}
