//! Notification list sync: models, filters, the shared cache, the list store
//! and optimistic mutations.

mod cache;
mod filter;
mod models;
mod mutations;
mod store;

pub use cache::{
    CacheSnapshot, FetchOutcome, FetchTicket, MarkAllMutation, NotificationCache, ReadMutation,
};
pub use filter::{FilterCompiler, FilterSpec, MAX_PER_PAGE};
pub use models::{
    DeleteResponse, MarkAllReadResponse, Notification, NotificationPage, NotificationType,
    PageWindow, Priority, Summary,
};
pub use mutations::OptimisticMutationCoordinator;
pub use store::{NotificationListStore, NotificationPollTask, SharedNotificationCache};
