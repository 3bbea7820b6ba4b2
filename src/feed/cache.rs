// SPDX-License-Identifier: MPL-2.0

//! Paginated feed cache with optimistic create and delete.
//!
//! Each subscribed `FeedQuery` gets one `FeedState`. Fetch admission is a
//! compare-and-set on the feed's status under the registry lock, so at most
//! one fetch per feed is in flight. A reset bumps the feed's generation;
//! fetches that resolve under an older generation are dropped.

use crate::feed::state::{FeedSnapshot, FeedState};
use crate::feed::subscription::FeedSubscription;
use crate::feed::FeedError;
use crate::source::{Collection, DataSource, FeedQuery, Item, Page};
use crate::state::FeedSettings;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, trace, warn};

/// Result of a `reset` or `load_more` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The page was applied; `count` is the number of items now held after
    /// a reset, or the number appended by `load_more`
    Loaded { count: usize },
    /// Another fetch for this feed is in flight
    Busy,
    /// The feed has no further pages
    Exhausted,
    /// A reset started after this fetch; its result was discarded
    Superseded,
}

struct FeedEntry {
    state: FeedState,
    subscribers: usize,
    tx: watch::Sender<FeedSnapshot>,
}

impl FeedEntry {
    fn publish(&self) {
        self.tx.send_replace(self.state.snapshot());
    }
}

/// A remote delete in flight
#[derive(Default)]
struct Tombstone {
    callers: usize,
    /// Feeds whose incoming page had the item dropped, with the generation
    /// the page was applied under
    filtered: Vec<(FeedQuery, u64, Item)>,
}

#[derive(Default)]
struct Registry {
    feeds: HashMap<FeedQuery, FeedEntry>,
    pending_deletes: HashMap<String, Tombstone>,
}

/// Drop items whose delete is still in flight from an incoming page,
/// remembering where they were dropped so a failed delete can put them back
fn filter_tombstoned(
    pending_deletes: &mut HashMap<String, Tombstone>,
    query: &FeedQuery,
    generation: u64,
    page: &mut Page,
) {
    if pending_deletes.is_empty() {
        return;
    }
    page.items.retain(|item| match pending_deletes.get_mut(&item.id) {
        Some(tombstone) => {
            tombstone
                .filtered
                .push((query.clone(), generation, item.clone()));
            false
        }
        None => true,
    });
}

impl Registry {
    /// Drop one caller's hold on `id`, returning the items filtered out of
    /// pages on its behalf
    fn release_tombstone(&mut self, id: &str) -> Vec<(FeedQuery, u64, Item)> {
        let Some(tombstone) = self.pending_deletes.get_mut(id) else {
            return Vec::new();
        };
        tombstone.callers -= 1;
        let filtered = std::mem::take(&mut tombstone.filtered);
        if tombstone.callers == 0 {
            self.pending_deletes.remove(id);
        }
        filtered
    }
}

struct Inner {
    source: Arc<dyn DataSource>,
    settings: FeedSettings,
    registry: Mutex<Registry>,
    /// Shared across feeds so a re-created feed never reuses a generation
    generations: AtomicU64,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Handle to the feed cache. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct FeedCache {
    inner: Arc<Inner>,
}

impl FeedCache {
    pub fn new(source: Arc<dyn DataSource>, settings: FeedSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                settings: settings.normalized(),
                registry: Mutex::new(Registry::default()),
                generations: AtomicU64::new(0),
            }),
        }
    }

    pub fn source(&self) -> &Arc<dyn DataSource> {
        &self.inner.source
    }

    pub fn settings(&self) -> &FeedSettings {
        &self.inner.settings
    }

    /// Subscribe to a feed, creating its state on first subscription.
    /// The state is discarded when the last subscription is dropped.
    pub fn subscribe(&self, query: FeedQuery) -> FeedSubscription {
        let mut registry = self.inner.lock();

        let entry = registry.feeds.entry(query.clone()).or_insert_with(|| {
            let state = FeedState::new(self.inner.next_generation());
            let (tx, _) = watch::channel(state.snapshot());
            debug!(feed = %query, "feed created");
            FeedEntry {
                state,
                subscribers: 0,
                tx,
            }
        });
        entry.subscribers += 1;

        FeedSubscription::new(self.clone(), query, entry.tx.subscribe())
    }

    /// Called when a subscription is dropped
    pub(crate) fn release(&self, query: &FeedQuery) {
        let mut registry = self.inner.lock();

        if let Some(entry) = registry.feeds.get_mut(query) {
            entry.subscribers = entry.subscribers.saturating_sub(1);
            if entry.subscribers == 0 {
                registry.feeds.remove(query);
                debug!(feed = %query, "feed discarded");
            }
        }
    }

    /// Current snapshot of a subscribed feed
    pub fn snapshot(&self, query: &FeedQuery) -> Option<FeedSnapshot> {
        self.inner
            .lock()
            .feeds
            .get(query)
            .map(|entry| entry.state.snapshot())
    }

    /// Queries that currently have subscribers
    pub fn cached_queries(&self) -> Vec<FeedQuery> {
        self.inner.lock().feeds.keys().cloned().collect()
    }

    /// Reload a feed from its newest item, replacing its items atomically
    /// once the first page arrives. Never rejected as busy: a fetch already
    /// in flight is superseded and its result dropped when it lands.
    pub async fn reset(&self, query: &FeedQuery) -> Result<LoadOutcome, FeedError> {
        let page_size = self.inner.settings.page_size_for(query.collection);

        let generation = {
            let mut registry = self.inner.lock();
            let entry = registry
                .feeds
                .get_mut(query)
                .ok_or_else(|| FeedError::UnknownFeed(query.clone()))?;

            let generation = self.inner.next_generation();
            entry.state.begin_refresh(generation);
            entry.publish();
            generation
        };

        debug!(feed = %query, generation, "refreshing feed");
        let result = self.inner.source.fetch_page(query, None, page_size).await;

        let mut guard = self.inner.lock();
        let registry = &mut *guard;
        let Some(entry) = registry.feeds.get_mut(query) else {
            debug!(feed = %query, "feed discarded before refresh resolved");
            return Ok(LoadOutcome::Superseded);
        };
        if entry.state.generation() != generation {
            debug!(feed = %query, generation, "stale refresh dropped");
            return Ok(LoadOutcome::Superseded);
        }

        match result {
            Ok(mut page) => {
                let fetched = page.items.len();
                filter_tombstoned(&mut registry.pending_deletes, query, generation, &mut page);
                let count = entry.state.replace(page, fetched, page_size);
                entry.publish();
                debug!(feed = %query, count, exhausted = entry.state.exhausted(), "feed refreshed");
                Ok(LoadOutcome::Loaded { count })
            }
            Err(err) => {
                warn!(feed = %query, error = %err, "refresh failed");
                entry.state.fail(err.clone());
                entry.publish();
                Err(err.into())
            }
        }
    }

    /// Fetch the next page after the feed's cursor. Does nothing while
    /// another fetch is in flight or once the feed is exhausted.
    pub async fn load_more(&self, query: &FeedQuery) -> Result<LoadOutcome, FeedError> {
        let page_size = self.inner.settings.page_size_for(query.collection);

        let (generation, cursor) = {
            let mut registry = self.inner.lock();
            let entry = registry
                .feeds
                .get_mut(query)
                .ok_or_else(|| FeedError::UnknownFeed(query.clone()))?;

            if entry.state.status().is_busy() {
                trace!(feed = %query, "load_more ignored, fetch in flight");
                return Ok(LoadOutcome::Busy);
            }
            if entry.state.exhausted() {
                return Ok(LoadOutcome::Exhausted);
            }

            entry.state.begin_load_more();
            entry.publish();
            (entry.state.generation(), entry.state.cursor().cloned())
        };

        debug!(feed = %query, generation, "loading next page");
        let result = self
            .inner
            .source
            .fetch_page(query, cursor.as_ref(), page_size)
            .await;

        let mut guard = self.inner.lock();
        let registry = &mut *guard;
        let Some(entry) = registry.feeds.get_mut(query) else {
            return Ok(LoadOutcome::Superseded);
        };
        if entry.state.generation() != generation {
            debug!(feed = %query, generation, "stale page dropped");
            return Ok(LoadOutcome::Superseded);
        }

        match result {
            Ok(mut page) => {
                let fetched = page.items.len();
                filter_tombstoned(&mut registry.pending_deletes, query, generation, &mut page);
                let count = entry.state.append(page, fetched, page_size);
                entry.publish();
                debug!(feed = %query, count, exhausted = entry.state.exhausted(), "page appended");
                Ok(LoadOutcome::Loaded { count })
            }
            Err(err) => {
                warn!(feed = %query, error = %err, "load_more failed");
                entry.state.fail(err.clone());
                entry.publish();
                Err(err.into())
            }
        }
    }

    /// Reset every cached feed, e.g. after the active user changes.
    pub async fn reset_all(&self) -> Vec<(FeedQuery, Result<LoadOutcome, FeedError>)> {
        let mut tasks = JoinSet::new();
        for query in self.cached_queries() {
            let cache = self.clone();
            tasks.spawn(async move {
                let result = cache.reset(&query).await;
                (query, result)
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => warn!(error = %e, "reset task failed"),
            }
        }
        results
    }

    /// Create a post remotely, then insert it into every cached feed it
    /// belongs to. Nothing changes locally if the create fails.
    pub async fn create_item(
        &self,
        owner_id: &str,
        payload_ref: &str,
        caption: &str,
    ) -> Result<Item, FeedError> {
        let item = self
            .inner
            .source
            .create(owner_id, payload_ref, caption)
            .await
            .inspect_err(|err| warn!(owner_id, error = %err, "create failed"))?;

        let inserted = self.fan_out(Collection::Posts, &item);
        debug!(id = %item.id, feeds = inserted, "created post");
        Ok(item)
    }

    /// Remove an item from every cached feed, then delete it remotely.
    /// If the remote delete fails the item is put back and the error returned.
    pub async fn delete_item(&self, id: &str) -> Result<(), FeedError> {
        let removed: Vec<(FeedQuery, u64, Item)> = {
            let mut guard = self.inner.lock();
            let registry = &mut *guard;
            registry
                .pending_deletes
                .entry(id.to_string())
                .or_default()
                .callers += 1;

            let mut removed = Vec::new();
            for (query, entry) in registry.feeds.iter_mut() {
                if let Some(item) = entry.state.remove(id) {
                    entry.publish();
                    removed.push((query.clone(), entry.state.generation(), item));
                }
            }
            removed
        };

        debug!(id, feeds = removed.len(), "removed locally, deleting remotely");
        let result = self.inner.source.delete(id).await;

        let mut guard = self.inner.lock();
        let registry = &mut *guard;
        let filtered = registry.release_tombstone(id);

        match result {
            Ok(()) => Ok(()),
            Err(err) if err.is_not_found() => {
                debug!(id, "already deleted remotely");
                Ok(())
            }
            Err(err) => {
                warn!(id, error = %err, "delete failed, restoring item");
                for (query, generation, item) in removed.into_iter().chain(filtered) {
                    if let Some(entry) = registry.feeds.get_mut(&query)
                        && entry.state.restore(item, generation)
                    {
                        entry.publish();
                    }
                }
                Err(err.into())
            }
        }
    }

    /// Favorite a post for `owner_id`. Favoriting twice returns the
    /// existing record and leaves the cache untouched.
    pub async fn add_favorite(&self, owner_id: &str, post: &Item) -> Result<Item, FeedError> {
        if let Some(existing) = self.inner.source.find_favorite(owner_id, &post.id).await? {
            debug!(owner_id, post_id = %post.id, "post already favorited");
            return Ok(existing);
        }

        let favorite = self
            .inner
            .source
            .add_favorite(owner_id, post)
            .await
            .inspect_err(|err| warn!(owner_id, error = %err, "favorite failed"))?;

        self.fan_out(Collection::Favorites, &favorite);
        Ok(favorite)
    }

    /// Un-favorite a post. Does nothing if it isn't favorited.
    pub async fn remove_favorite(&self, owner_id: &str, post_id: &str) -> Result<(), FeedError> {
        let favorite = match self.cached_favorite(owner_id, post_id) {
            Some(favorite) => Some(favorite),
            None => self.inner.source.find_favorite(owner_id, post_id).await?,
        };

        match favorite {
            Some(favorite) => self.delete_item(&favorite.id).await,
            None => Ok(()),
        }
    }

    /// Whether `owner_id`'s cached favorites include `post_id`
    pub fn is_favorite(&self, owner_id: &str, post_id: &str) -> bool {
        self.cached_favorite(owner_id, post_id).is_some()
    }

    fn cached_favorite(&self, owner_id: &str, post_id: &str) -> Option<Item> {
        let registry = self.inner.lock();
        let entry = registry.feeds.get(&FeedQuery::favorites(owner_id))?;
        entry
            .state
            .items()
            .iter()
            .find(|item| item.subject_id.as_deref() == Some(post_id))
            .cloned()
    }

    /// Insert a newly created record into every cached feed that admits it
    fn fan_out(&self, collection: Collection, item: &Item) -> usize {
        let mut registry = self.inner.lock();
        let mut inserted = 0;

        for (query, entry) in registry.feeds.iter_mut() {
            if query.admits(collection, item) && entry.state.insert_optimistic(item.clone()) {
                entry.publish();
                inserted += 1;
            }
        }
        inserted
    }
}
