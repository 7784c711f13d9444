//! Notification data models, as returned by the notifications API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Notification type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Reminder,
    ItemDue,
    SessionCompleted,
    WeeklySummary,
    Achievement,
    System,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Reminder => "reminder",
            NotificationType::ItemDue => "item_due",
            NotificationType::SessionCompleted => "session_completed",
            NotificationType::WeeklySummary => "weekly_summary",
            NotificationType::Achievement => "achievement",
            NotificationType::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "reminder" => Some(NotificationType::Reminder),
            "item_due" => Some(NotificationType::ItemDue),
            "session_completed" => Some(NotificationType::SessionCompleted),
            "weekly_summary" => Some(NotificationType::WeeklySummary),
            "achievement" => Some(NotificationType::Achievement),
            "system" => Some(NotificationType::System),
            _ => None,
        }
    }
}

/// Notification priority. Ordered from least to most pressing.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Priority::Low),
            "normal" => Some(Priority::Normal),
            "high" => Some(Priority::High),
            "urgent" => Some(Priority::Urgent),
            _ => None,
        }
    }
}

/// A notification as cached on the client.
///
/// The server owns notifications; this is a possibly-stale copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub priority: Priority,
    pub is_read: bool,
    #[serde(default)]
    pub read_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The currently loaded slice of the server-side collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageWindow {
    pub current_page: u32,
    pub per_page: u32,
    pub total_pages: u32,
    pub total_count: u64,
}

impl PageWindow {
    pub fn has_more(&self) -> bool {
        self.current_page < self.total_pages
    }
}

/// Server-computed aggregates over the entire collection.
///
/// Never recomputed from the loaded page: the page is not the population.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub unread_count: u64,
    pub today_count: u64,
    #[serde(default)]
    pub priority_counts: BTreeMap<Priority, u64>,
}

/// Response of `GET /notifications`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPage {
    pub notifications: Vec<Notification>,
    pub pagination: PageWindow,
    pub summary: Summary,
}

/// Response of `PUT /notifications/mark-all-read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkAllReadResponse {
    pub updated_count: u64,
    pub remaining_unread: u64,
}

/// Response of `DELETE /notifications/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}
