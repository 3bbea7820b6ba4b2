// SPDX-License-Identifier: MPL-2.0

use crate::source::{Cursor, DataSourceError, Item, Page};
use std::collections::HashSet;
use std::sync::Arc;

/// Fetch lifecycle of a feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedStatus {
    #[default]
    Idle,
    /// First page or next page in flight
    Loading,
    /// Reset in flight while older items are still shown
    Refreshing,
    /// Last fetch failed; a new reset or load_more retries
    Error,
}

impl FeedStatus {
    /// Whether a fetch is in flight
    pub fn is_busy(self) -> bool {
        matches!(self, FeedStatus::Loading | FeedStatus::Refreshing)
    }
}

/// Read-only view of a feed handed to presentation layers.
#[derive(Debug, Clone, Default)]
pub struct FeedSnapshot {
    /// Newest first
    pub items: Arc<Vec<Item>>,
    pub cursor: Option<Cursor>,
    /// No further pages
    pub exhausted: bool,
    pub status: FeedStatus,
    /// Items put back at the head after a failed delete
    pub position_uncertain: Arc<HashSet<String>>,
    pub last_error: Option<DataSourceError>,
}

impl FeedSnapshot {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.items.iter().map(|i| i.id.as_str()).collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|i| i.id == id)
    }

    pub fn is_position_uncertain(&self, id: &str) -> bool {
        self.position_uncertain.contains(id)
    }
}

/// Mutable state behind one feed. Only the cache touches it.
#[derive(Debug, Default)]
pub(crate) struct FeedState {
    items: Vec<Item>,
    /// Last item of the most recently fetched page
    cursor: Option<Cursor>,
    exhausted: bool,
    status: FeedStatus,
    /// Bumped by every reset; stale fetch results compare against it
    generation: u64,
    position_uncertain: HashSet<String>,
    last_error: Option<DataSourceError>,
    /// Created while a fetch was in flight; that fetch may predate them
    inserted_in_flight: Vec<Item>,
}

impl FeedState {
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            ..Self::default()
        }
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            items: Arc::new(self.items.clone()),
            cursor: self.cursor.clone(),
            exhausted: self.exhausted,
            status: self.status,
            position_uncertain: Arc::new(self.position_uncertain.clone()),
            last_error: self.last_error.clone(),
        }
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    pub fn exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn status(&self) -> FeedStatus {
        self.status
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|i| i.id == id)
    }

    /// Start a reset. Items stay visible until the new first page lands.
    pub fn begin_refresh(&mut self, generation: u64) {
        self.generation = generation;
        self.status = if self.items.is_empty() {
            FeedStatus::Loading
        } else {
            FeedStatus::Refreshing
        };
        self.last_error = None;
    }

    pub fn begin_load_more(&mut self) {
        self.status = FeedStatus::Loading;
        self.last_error = None;
    }

    /// Swap in a fresh first page. `fetched` is the page length before
    /// tombstone filtering. Returns the number of items now held.
    pub fn replace(&mut self, page: Page, fetched: usize, page_size: usize) -> usize {
        let Page { items, next_cursor } = page;

        let mut fresh: Vec<Item> = Vec::with_capacity(items.len());
        for item in items {
            if !fresh.iter().any(|i| i.id == item.id) {
                fresh.push(item);
            }
        }

        self.cursor = next_cursor.or_else(|| fresh.last().map(Cursor::after));
        self.items = fresh;
        self.exhausted = fetched < page_size;
        self.position_uncertain.clear();
        self.status = FeedStatus::Idle;
        self.last_error = None;

        for item in std::mem::take(&mut self.inserted_in_flight) {
            self.insert_optimistic(item);
        }
        self.items.len()
    }

    /// Append the next page, skipping ids already held. Returns how many
    /// items were added.
    pub fn append(&mut self, page: Page, fetched: usize, page_size: usize) -> usize {
        let Page { items, next_cursor } = page;
        let last_fetched = items.last().map(Cursor::after);
        let mut appended = 0;

        for item in items {
            if self.position_uncertain.remove(&item.id) {
                // Delivered by the source again, so its real position is known now
                self.items.retain(|i| i.id != item.id);
            } else if self.contains(&item.id) {
                continue;
            }

            match self.items.last() {
                Some(tail) if tail.feed_order(&item).is_gt() => {
                    let pos = self.sorted_position(&item);
                    self.items.insert(pos, item);
                }
                _ => self.items.push(item),
            }
            appended += 1;
        }

        if let Some(cursor) = next_cursor.or(last_fetched) {
            self.cursor = Some(cursor);
        }
        self.exhausted = fetched < page_size;
        self.status = FeedStatus::Idle;
        self.last_error = None;
        self.inserted_in_flight.clear();
        appended
    }

    pub fn fail(&mut self, err: DataSourceError) {
        self.status = FeedStatus::Error;
        self.last_error = Some(err);
        self.inserted_in_flight.clear();
    }

    /// Insert a freshly created item. Items older than the loaded window of
    /// a feed with more pages are left for pagination to deliver.
    pub fn insert_optimistic(&mut self, item: Item) -> bool {
        if self.contains(&item.id) {
            return false;
        }
        if let Some(cursor) = &self.cursor
            && !self.exhausted
            && !item.is_before(cursor)
        {
            return false;
        }

        if self.status.is_busy() {
            self.inserted_in_flight.push(item.clone());
        }
        let pos = self.sorted_position(&item);
        self.items.insert(pos, item);
        true
    }

    /// Remove by id; absent ids are a no-op.
    pub fn remove(&mut self, id: &str) -> Option<Item> {
        let pos = self.items.iter().position(|i| i.id == id)?;
        self.position_uncertain.remove(id);
        self.inserted_in_flight.retain(|i| i.id != id);
        Some(self.items.remove(pos))
    }

    /// Put back an item whose remote delete failed. `removed_at` is the
    /// generation the item was removed from.
    pub fn restore(&mut self, item: Item, removed_at: u64) -> bool {
        if self.contains(&item.id) {
            return false;
        }

        let outside_window = match &self.cursor {
            Some(cursor) if !self.exhausted => !item.is_before(cursor),
            _ => false,
        };

        if removed_at != self.generation && outside_window {
            self.position_uncertain.insert(item.id.clone());
            self.items.insert(0, item);
        } else {
            let pos = self.sorted_position(&item);
            self.items.insert(pos, item);
        }
        true
    }

    /// Index at which `item` keeps the list in feed order
    fn sorted_position(&self, item: &Item) -> usize {
        self.items
            .partition_point(|existing| existing.feed_order(item).is_lt())
    }
}
