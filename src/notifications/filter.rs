//! Declarative notification filters and their compilation into query parameters.

use serde::{Deserialize, Serialize};

use super::models::{NotificationType, Priority};
use crate::error::SyncError;

/// Upper bound accepted for `per_page`.
pub const MAX_PER_PAGE: u32 = 100;

/// Filter applied to the notification list.
///
/// "No filter" is the default value with every field unset. Two specs are
/// compared structurally: any field-level difference invalidates the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterSpec {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub notification_type: Option<NotificationType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_read: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

impl FilterSpec {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn unread() -> Self {
        Self {
            is_read: Some(false),
            ..Self::default()
        }
    }

    pub fn with_type(mut self, notification_type: NotificationType) -> Self {
        self.notification_type = Some(notification_type);
        self
    }

    pub fn with_read(mut self, is_read: bool) -> Self {
        self.is_read = Some(is_read);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.notification_type.is_none() && self.is_read.is_none() && self.priority.is_none()
    }

    /// Parse a filter from a URL query such as `type=reminder&is_read=false`.
    ///
    /// Unknown keys are ignored and empty values mean "unset". A value that
    /// does not name a known type, priority or boolean is rejected.
    pub fn from_query(query: &str) -> Result<Self, SyncError> {
        let mut spec = FilterSpec::default();
        let query = query.strip_prefix('?').unwrap_or(query);

        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = decode(raw_key)?;
            let value = decode(raw_value)?;
            if value.is_empty() {
                continue;
            }

            match key.as_str() {
                "type" => {
                    spec.notification_type = Some(NotificationType::parse(&value).ok_or_else(
                        || SyncError::validation(format!("Unknown notification type: {}", value)),
                    )?);
                }
                "is_read" => {
                    spec.is_read = Some(match value.as_str() {
                        "true" | "1" => true,
                        "false" | "0" => false,
                        other => {
                            return Err(SyncError::validation(format!(
                                "Invalid is_read value: {}",
                                other
                            )))
                        }
                    });
                }
                "priority" => {
                    spec.priority = Some(Priority::parse(&value).ok_or_else(|| {
                        SyncError::validation(format!("Unknown priority: {}", value))
                    })?);
                }
                _ => {}
            }
        }

        Ok(spec)
    }
}

fn decode(raw: &str) -> Result<String, SyncError> {
    urlencoding::decode(&raw.replace('+', " "))
        .map(|s| s.into_owned())
        .map_err(|e| SyncError::validation(format!("Malformed query component {:?}: {}", raw, e)))
}

/// Turns a [`FilterSpec`] into API query parameters.
pub struct FilterCompiler;

impl FilterCompiler {
    /// Filter fields as query pairs, in a stable order, omitting unset fields.
    pub fn compile(filters: &FilterSpec) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(3);
        if let Some(t) = filters.notification_type {
            pairs.push(("type", t.as_str().to_string()));
        }
        if let Some(is_read) = filters.is_read {
            pairs.push(("is_read", is_read.to_string()));
        }
        if let Some(p) = filters.priority {
            pairs.push(("priority", p.as_str().to_string()));
        }
        pairs
    }

    /// Full list query: filter fields followed by paging.
    pub fn query_pairs(
        filters: &FilterSpec,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<(&'static str, String)>, SyncError> {
        validate_paging(page, per_page)?;
        let mut pairs = Self::compile(filters);
        pairs.push(("page", page.to_string()));
        pairs.push(("per_page", per_page.to_string()));
        Ok(pairs)
    }

    /// URL-encoded query string, without the leading `?`.
    pub fn query_string(
        filters: &FilterSpec,
        page: u32,
        per_page: u32,
    ) -> Result<String, SyncError> {
        let pairs = Self::query_pairs(filters, page, per_page)?;
        Ok(pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&"))
    }

    /// Whether switching from `current` to `next` invalidates the cached list.
    pub fn invalidates(current: &FilterSpec, next: &FilterSpec) -> bool {
        current != next
    }
}

pub(crate) fn validate_paging(page: u32, per_page: u32) -> Result<(), SyncError> {
    if page == 0 {
        return Err(SyncError::validation("page must be at least 1"));
    }
    if per_page == 0 || per_page > MAX_PER_PAGE {
        return Err(SyncError::validation(format!(
            "per_page must be between 1 and {}, got {}",
            MAX_PER_PAGE, per_page
        )));
    }
    Ok(())
}
