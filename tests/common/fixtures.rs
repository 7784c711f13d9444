//! Seed data for the fake backend.

use super::constants::{SEEDED_TOTAL, SEEDED_UNREAD};
use chrono::{Duration, TimeZone, Utc};
use kpt_sync::notifications::{Notification, NotificationType, Priority};

const TYPES: [NotificationType; 6] = [
    NotificationType::Reminder,
    NotificationType::ItemDue,
    NotificationType::SessionCompleted,
    NotificationType::WeeklySummary,
    NotificationType::Achievement,
    NotificationType::System,
];

const PRIORITIES: [Priority; 4] = [
    Priority::Low,
    Priority::Normal,
    Priority::High,
    Priority::Urgent,
];

pub fn make_notification(
    id: &str,
    notification_type: NotificationType,
    priority: Priority,
    is_read: bool,
    minutes_ago: i64,
) -> Notification {
    let base = Utc.with_ymd_and_hms(2026, 10, 15, 12, 0, 0).unwrap();
    let created = base - Duration::minutes(minutes_ago);
    Notification {
        id: id.to_string(),
        notification_type,
        title: format!("{} {}", notification_type.as_str(), id),
        message: "Review your Keep/Problem/Try items".to_string(),
        priority,
        is_read,
        read_at: is_read.then_some(created + Duration::minutes(1)),
        expires_at: None,
        metadata: serde_json::Map::new(),
        created_at: created,
        updated_at: created,
    }
}

/// Newest first. The first `SEEDED_UNREAD` notifications are unread.
pub fn seed_notifications() -> Vec<Notification> {
    (0..SEEDED_TOTAL)
        .map(|i| {
            make_notification(
                &format!("n{:02}", i + 1),
                TYPES[i % TYPES.len()],
                PRIORITIES[i % PRIORITIES.len()],
                i >= SEEDED_UNREAD,
                i as i64 * 10,
            )
        })
        .collect()
}
