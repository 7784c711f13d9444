//! In-memory cache of the paginated, filtered notification list.
//!
//! The cache is the single shared mutable resource of the sync core: the
//! list store writes fetched pages into it and the mutation coordinator writes
//! optimistic changes into it. Both paths go through the methods below while
//! holding the cache lock, so readers only ever observe committed state.
//!
//! Staleness is tracked with a monotonically increasing `version`, bumped on
//! every local mutation and every applied fetch. A fetch remembers the version
//! it was dispatched at (its [`FetchTicket`]); when the response lands, items
//! mutated or deleted locally after that point keep their local state.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::filter::{FilterCompiler, FilterSpec};
use super::models::{MarkAllReadResponse, Notification, NotificationPage, PageWindow, Summary};
use crate::error::SyncError;

/// Issued when a fetch is dispatched, consumed when its response is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
    version: u64,
    pub filters: FilterSpec,
    pub page: u32,
}

/// Result of applying a fetched page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied {
        page: u32,
        received: usize,
        added: usize,
    },
    /// The response belonged to an older generation and was dropped.
    Stale,
}

/// Undo record for an optimistic mark-as-read.
#[derive(Debug, Clone)]
pub struct ReadMutation {
    id: String,
    previous_read_at: Option<DateTime<Utc>>,
    version: u64,
    decremented: bool,
    summary_version: u64,
}

/// Undo record for an optimistic mark-all-as-read.
#[derive(Debug, Clone)]
pub struct MarkAllMutation {
    previously_unread: Vec<(String, Option<DateTime<Utc>>)>,
    previous_unread_count: u64,
    version: u64,
    summary_version: u64,
}

impl MarkAllMutation {
    pub fn marked_count(&self) -> usize {
        self.previously_unread.len()
    }
}

/// Consistent copy of the committed cache state, for UI-facing readers.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSnapshot {
    pub items: Vec<Notification>,
    pub window: PageWindow,
    pub summary: Summary,
    pub filters: FilterSpec,
    pub has_more: bool,
    pub version: u64,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
pub struct NotificationCache {
    items: Vec<Notification>,
    window: PageWindow,
    summary: Summary,
    filters: FilterSpec,
    /// Bumped whenever the filter changes; older responses are dropped.
    generation: u64,
    version: u64,
    summary_version: u64,
    /// id -> version of the last local mutation
    item_versions: HashMap<String, u64>,
    /// id -> version at which the item was deleted locally
    tombstones: HashMap<String, u64>,
    last_error: Option<String>,
}

impl NotificationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&Notification> {
        self.items.iter().find(|n| n.id == id)
    }

    pub fn window(&self) -> PageWindow {
        self.window
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    pub fn unread_count(&self) -> u64 {
        self.summary.unread_count
    }

    pub fn filters(&self) -> &FilterSpec {
        &self.filters
    }

    pub fn has_more(&self) -> bool {
        self.window.has_more()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn record_error(&mut self, err: &SyncError) {
        self.last_error = Some(err.to_string());
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            items: self.items.clone(),
            window: self.window,
            summary: self.summary.clone(),
            filters: self.filters.clone(),
            has_more: self.has_more(),
            version: self.version,
            last_error: self.last_error.clone(),
        }
    }

    /// Prepare a fetch of `page` under `filters`.
    ///
    /// A filter change empties the cached list, opens a new generation and
    /// forces the fetch back to page 1.
    pub fn begin_fetch(&mut self, filters: &FilterSpec, page: u32) -> FetchTicket {
        let page = if FilterCompiler::invalidates(&self.filters, filters) {
            debug!(
                "Filter changed from {:?} to {:?}, invalidating cached list",
                self.filters, filters
            );
            self.invalidate(filters.clone());
            1
        } else {
            page
        };

        FetchTicket {
            generation: self.generation,
            version: self.version,
            filters: self.filters.clone(),
            page,
        }
    }

    /// Prepare a page-1 fetch under whatever filters are cached now.
    pub fn begin_refresh(&mut self) -> FetchTicket {
        FetchTicket {
            generation: self.generation,
            version: self.version,
            filters: self.filters.clone(),
            page: 1,
        }
    }

    fn invalidate(&mut self, filters: FilterSpec) {
        self.items.clear();
        self.window = PageWindow::default();
        self.filters = filters;
        self.generation += 1;
        self.version += 1;
        self.item_versions.clear();
        self.tombstones.clear();
    }

    /// Merge a fetched page into the cache.
    ///
    /// Page 1 replaces the list; later pages append, skipping identifiers
    /// already present. The summary always overwrites the local counts.
    pub fn apply_fetch(&mut self, ticket: FetchTicket, page: NotificationPage) -> FetchOutcome {
        if ticket.generation != self.generation {
            debug!(
                "Discarding page {} from generation {} (current {})",
                ticket.page, ticket.generation, self.generation
            );
            return FetchOutcome::Stale;
        }

        let received = page.notifications.len();
        let mut seen = HashSet::with_capacity(received);
        let mut incoming = Vec::with_capacity(received);
        for item in page.notifications {
            if !seen.insert(item.id.clone()) {
                continue;
            }
            if self
                .tombstones
                .get(&item.id)
                .is_some_and(|v| *v > ticket.version)
            {
                debug!("Skipping {} deleted locally after dispatch", item.id);
                continue;
            }
            let mutated_since = self
                .item_versions
                .get(&item.id)
                .is_some_and(|v| *v > ticket.version);
            let item = match (mutated_since, self.get(&item.id)) {
                (true, Some(local)) => local.clone(),
                _ => item,
            };
            incoming.push(item);
        }

        let added = if ticket.page <= 1 {
            let added = incoming.len();
            self.items = incoming;
            let cutoff = ticket.version;
            self.item_versions.retain(|_, v| *v > cutoff);
            self.tombstones.retain(|_, v| *v > cutoff);
            added
        } else {
            let existing: HashSet<String> = self.items.iter().map(|n| n.id.clone()).collect();
            let before = self.items.len();
            self.items
                .extend(incoming.into_iter().filter(|n| !existing.contains(&n.id)));
            self.items.len() - before
        };

        self.window = page.pagination;
        self.summary = page.summary;
        self.version += 1;
        self.summary_version = self.version;
        self.last_error = None;

        FetchOutcome::Applied {
            page: ticket.page,
            received,
            added,
        }
    }

    /// Optimistically mark one item as read.
    ///
    /// Returns `None` when the item is not cached or already read, in which
    /// case nothing was changed.
    pub fn mark_read_local(&mut self, id: &str) -> Option<ReadMutation> {
        let version = self.version + 1;
        let item = self.items.iter_mut().find(|n| n.id == id)?;
        if item.is_read {
            return None;
        }

        let previous_read_at = item.read_at;
        item.is_read = true;
        item.read_at = Some(Utc::now());

        self.version = version;
        self.item_versions.insert(id.to_string(), version);
        let decremented = self.summary.unread_count > 0;
        if decremented {
            self.summary.unread_count -= 1;
        }

        Some(ReadMutation {
            id: id.to_string(),
            previous_read_at,
            version,
            decremented,
            summary_version: self.summary_version,
        })
    }

    /// Replace the optimistic copy with the server's, unless touched since.
    pub fn confirm_read(&mut self, mutation: &ReadMutation, server_item: Notification) -> bool {
        if self.item_versions.get(&mutation.id) != Some(&mutation.version) {
            return false;
        }
        match self.items.iter_mut().find(|n| n.id == mutation.id) {
            Some(item) => {
                *item = server_item;
                true
            }
            None => false,
        }
    }

    /// Undo an optimistic mark-as-read.
    ///
    /// The flag is restored only if nothing touched the item since, and the
    /// count only if no summary has overwritten it since.
    pub fn rollback_read(&mut self, mutation: &ReadMutation) -> bool {
        let mut restored = false;
        if self.item_versions.get(&mutation.id) == Some(&mutation.version) {
            if let Some(item) = self.items.iter_mut().find(|n| n.id == mutation.id) {
                item.is_read = false;
                item.read_at = mutation.previous_read_at;
                restored = true;
            }
            self.version += 1;
            self.item_versions.insert(mutation.id.clone(), self.version);
        }
        if mutation.decremented && self.summary_version == mutation.summary_version {
            self.summary.unread_count += 1;
        }
        restored
    }

    /// Optimistically mark every loaded item as read and zero the unread count.
    pub fn mark_all_read_local(&mut self) -> MarkAllMutation {
        let version = self.version + 1;
        let now = Utc::now();
        let mut previously_unread = Vec::new();

        for item in self.items.iter_mut().filter(|n| !n.is_read) {
            previously_unread.push((item.id.clone(), item.read_at));
            item.is_read = true;
            item.read_at = Some(now);
            self.item_versions.insert(item.id.clone(), version);
        }

        let previous_unread_count = self.summary.unread_count;
        self.summary.unread_count = 0;
        self.version = version;

        MarkAllMutation {
            previously_unread,
            previous_unread_count,
            version,
            summary_version: self.summary_version,
        }
    }

    /// Apply the authoritative `remaining_unread` from a mark-all response.
    ///
    /// Unread items may live on pages that are not loaded, so the server value
    /// always wins. A disagreement with the local count is returned so the
    /// caller can report it.
    pub fn reconcile_mark_all(&mut self, response: &MarkAllReadResponse) -> Option<SyncError> {
        let local = self.summary.unread_count;
        self.summary.unread_count = response.remaining_unread;
        self.version += 1;
        self.summary_version = self.version;

        (local != response.remaining_unread).then_some(SyncError::ReconciliationConflict {
            field: "unread_count",
            local,
            authoritative: response.remaining_unread,
        })
    }

    /// Undo an optimistic mark-all-as-read, item by item.
    pub fn rollback_mark_all(&mut self, mutation: &MarkAllMutation) -> usize {
        let mut restored = 0;
        let version = self.version + 1;
        for (id, previous_read_at) in &mutation.previously_unread {
            if self.item_versions.get(id) != Some(&mutation.version) {
                continue;
            }
            if let Some(item) = self.items.iter_mut().find(|n| &n.id == id) {
                item.is_read = false;
                item.read_at = *previous_read_at;
                self.item_versions.insert(id.clone(), version);
                restored += 1;
            }
        }
        if self.summary_version == mutation.summary_version {
            self.summary.unread_count = mutation.previous_unread_count;
        }
        self.version = version;
        restored
    }

    /// Optimistically remove an item. There is no undo for this.
    pub fn remove_local(&mut self, id: &str) -> Option<Notification> {
        self.version += 1;
        self.tombstones.insert(id.to_string(), self.version);
        self.item_versions.remove(id);

        let pos = self.items.iter().position(|n| n.id == id)?;
        let removed = self.items.remove(pos);
        self.window.total_count = self.window.total_count.saturating_sub(1);
        if !removed.is_read {
            self.summary.unread_count = self.summary.unread_count.saturating_sub(1);
        }
        Some(removed)
    }
}
