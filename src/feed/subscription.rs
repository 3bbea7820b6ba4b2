// SPDX-License-Identifier: MPL-2.0

use crate::feed::cache::{FeedCache, LoadOutcome};
use crate::feed::state::FeedSnapshot;
use crate::feed::FeedError;
use crate::source::FeedQuery;
use tokio::sync::watch;

/// A live subscription to one feed.
///
/// Keeps the feed's state alive; dropping the last subscription for a
/// query discards it.
pub struct FeedSubscription {
    cache: FeedCache,
    query: FeedQuery,
    rx: watch::Receiver<FeedSnapshot>,
}

impl FeedSubscription {
    pub(crate) fn new(cache: FeedCache, query: FeedQuery, rx: watch::Receiver<FeedSnapshot>) -> Self {
        Self { cache, query, rx }
    }

    pub fn query(&self) -> &FeedQuery {
        &self.query
    }

    /// Latest published state
    pub fn snapshot(&self) -> FeedSnapshot {
        self.rx.borrow().clone()
    }

    /// Wait for the next published state. `None` once the feed is gone.
    pub async fn changed(&mut self) -> Option<FeedSnapshot> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    pub async fn reset(&self) -> Result<LoadOutcome, FeedError> {
        self.cache.reset(&self.query).await
    }

    pub async fn load_more(&self) -> Result<LoadOutcome, FeedError> {
        self.cache.load_more(&self.query).await
    }
}

impl Clone for FeedSubscription {
    fn clone(&self) -> Self {
        self.cache.subscribe(self.query.clone())
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.cache.release(&self.query);
    }
}
