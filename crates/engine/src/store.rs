//! Notification store: bounded, recency-ordered, persisted list.
//!
//! The front of the list is the most recently active notification. Adding an
//! id that is already present moves it to the front and replaces the record,
//! so the list never holds the same id twice.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use beacon_common::persist::{load_or_default, save_json};
use beacon_common::types::Notification;

/// Maximum number of notifications kept.
pub const DEFAULT_CAPACITY: usize = 50;

pub const NOTIFICATIONS_FILE: &str = "notifications.json";

/// What an [`NotificationStore::add`] call changed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AddOutcome {
    /// Ids that were not in the list before
    pub added: usize,
    /// Ids that were already present and moved to the front
    pub moved: usize,
}

pub struct NotificationStore {
    path: PathBuf,
    capacity: usize,
    items: RwLock<Vec<Notification>>,
}

impl NotificationStore {
    /// Load the store from `path` with the default capacity.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        Self::with_capacity(path, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(path: impl Into<PathBuf>, capacity: usize) -> Self {
        let path = path.into();
        let mut items: Vec<Notification> = load_or_default(&path);

        if items.len() > capacity {
            tracing::debug!(
                loaded = items.len(),
                capacity,
                "Truncating persisted notifications to capacity"
            );
            items.truncate(capacity);
        }

        tracing::info!(count = items.len(), path = %path.display(), "Loaded notification store");

        Self {
            path,
            capacity,
            items: RwLock::new(items),
        }
    }

    /// Merge a batch at the front of the list, then persist.
    ///
    /// Merging and saving happen under one write lock, so concurrent adds
    /// persist in the same order they are applied.
    ///
    /// Within the batch the first occurrence of an id wins. Batch order is
    /// kept, and the tail beyond capacity is dropped.
    pub fn add(&self, batch: &[Notification]) -> AddOutcome {
        if batch.is_empty() {
            return AddOutcome::default();
        }

        let mut ids = HashSet::with_capacity(batch.len());
        let incoming: Vec<Notification> = batch
            .iter()
            .filter(|n| ids.insert(n.id.as_str()))
            .cloned()
            .collect();

        let mut items = self.items.write();

        let before = items.len();
        items.retain(|n| !ids.contains(n.id.as_str()));
        let moved = before - items.len();

        let outcome = AddOutcome {
            added: incoming.len() - moved,
            moved,
        };

        let mut merged = incoming;
        merged.append(&mut items);
        merged.truncate(self.capacity);
        *items = merged;

        // Held across the write so the file always matches the last merge.
        if let Err(e) = save_json(&self.path, &*items) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to persist notifications");
        }

        outcome
    }

    /// Snapshot of the list, most recent first.
    pub fn list(&self) -> Vec<Notification> {
        self.items.read().clone()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
