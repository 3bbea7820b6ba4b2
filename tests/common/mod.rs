// SPDX-License-Identifier: MPL-2.0

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use photofeed::{Collection, Cursor, DataSource, DataSourceError, FeedQuery, Item, Page};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// Scripted in-memory backend. Fetches and deletes can be held open to
/// exercise in-flight behaviour, and the next call of each kind can be
/// made to fail.
#[derive(Default)]
pub struct MemorySource {
    records: Mutex<Vec<(Collection, Item)>>,
    clock: AtomicI64,
    next_id: AtomicU64,
    fetch_calls: AtomicUsize,
    read_before_gate: AtomicBool,
    delete_calls: AtomicUsize,
    fetch_gate: Mutex<Option<Arc<Semaphore>>>,
    delete_gate: Mutex<Option<Arc<Semaphore>>>,
    fail_fetch: Mutex<Option<DataSourceError>>,
    fail_create: Mutex<Option<DataSourceError>>,
    fail_delete: Mutex<Option<DataSourceError>>,
}

pub fn item(id: &str, owner: &str, secs: i64) -> Item {
    Item {
        id: id.to_string(),
        owner_id: owner.to_string(),
        payload_ref: format!("file:///blobs/{id}.jpg"),
        caption: format!("caption {id}"),
        created_at: Utc.timestamp_opt(secs, 0).unwrap(),
        subject_id: None,
    }
}

impl MemorySource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add a post that already exists remotely
    pub fn seed(&self, id: &str, owner: &str, secs: i64) -> Item {
        let item = item(id, owner, secs);
        self.clock.fetch_max(secs, Ordering::SeqCst);
        self.records
            .lock()
            .unwrap()
            .push((Collection::Posts, item.clone()));
        item
    }

    /// Drop a record remotely without the cache knowing
    pub fn remove_remote(&self, id: &str) {
        self.records.lock().unwrap().retain(|(_, i)| i.id != id);
    }

    pub fn remote_ids(&self, collection: Collection) -> Vec<String> {
        let mut items: Vec<Item> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == collection)
            .map(|(_, i)| i.clone())
            .collect();
        items.sort_by(Item::feed_order);
        items.into_iter().map(|i| i.id).collect()
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Read the page when the fetch is issued rather than when it is
    /// released, like a backend that answers before the response arrives
    pub fn read_at_call(&self) {
        self.read_before_gate.store(true, Ordering::SeqCst);
    }

    /// Block fetches until permits are released
    pub fn hold_fetches(&self) {
        *self.fetch_gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_fetches(&self, n: usize) {
        if let Some(gate) = self.fetch_gate.lock().unwrap().as_ref() {
            gate.add_permits(n);
        }
    }

    pub fn hold_deletes(&self) {
        *self.delete_gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_deletes(&self, n: usize) {
        if let Some(gate) = self.delete_gate.lock().unwrap().as_ref() {
            gate.add_permits(n);
        }
    }

    pub fn fail_next_fetch(&self, err: DataSourceError) {
        *self.fail_fetch.lock().unwrap() = Some(err);
    }

    pub fn fail_next_create(&self, err: DataSourceError) {
        *self.fail_create.lock().unwrap() = Some(err);
    }

    pub fn fail_next_delete(&self, err: DataSourceError) {
        *self.fail_delete.lock().unwrap() = Some(err);
    }

    fn next_stamp(&self) -> i64 {
        self.clock.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn read_page(&self, query: &FeedQuery, cursor: Option<&Cursor>, page_size: usize) -> Page {
        let mut items: Vec<Item> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|(collection, item)| query.admits(*collection, item))
            .map(|(_, item)| item.clone())
            .collect();
        items.sort_by(Item::feed_order);

        let page = items
            .into_iter()
            .filter(|item| after_cursor(item, cursor))
            .take(page_size)
            .collect();
        Page::from_items(page)
    }

    async fn pass(gate: &Mutex<Option<Arc<Semaphore>>>) {
        let gate = gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }
    }
}

fn after_cursor(item: &Item, cursor: Option<&Cursor>) -> bool {
    match cursor {
        Some(c) => (item.created_at, item.id.as_str()) < (c.created_at(), c.id()),
        None => true,
    }
}

#[async_trait]
impl DataSource for MemorySource {
    async fn fetch_page(
        &self,
        query: &FeedQuery,
        cursor: Option<&Cursor>,
        page_size: usize,
    ) -> Result<Page, DataSourceError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        if self.read_before_gate.load(Ordering::SeqCst) {
            let page = self.read_page(query, cursor, page_size);
            Self::pass(&self.fetch_gate).await;
            return Ok(page);
        }
        Self::pass(&self.fetch_gate).await;

        if let Some(err) = self.fail_fetch.lock().unwrap().take() {
            return Err(err);
        }
        Ok(self.read_page(query, cursor, page_size))
    }

    async fn create(
        &self,
        owner_id: &str,
        payload_ref: &str,
        caption: &str,
    ) -> Result<Item, DataSourceError> {
        if let Some(err) = self.fail_create.lock().unwrap().take() {
            return Err(err);
        }

        let item = Item {
            id: self.next_id("post"),
            owner_id: owner_id.to_string(),
            payload_ref: payload_ref.to_string(),
            caption: caption.to_string(),
            created_at: Utc.timestamp_opt(self.next_stamp(), 0).unwrap(),
            subject_id: None,
        };
        self.records
            .lock()
            .unwrap()
            .push((Collection::Posts, item.clone()));
        Ok(item)
    }

    async fn delete(&self, id: &str) -> Result<(), DataSourceError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        Self::pass(&self.delete_gate).await;

        if let Some(err) = self.fail_delete.lock().unwrap().take() {
            return Err(err);
        }

        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|(_, item)| item.id != id);
        if records.len() == before {
            return Err(DataSourceError::not_found(format!("no record {id}")));
        }
        Ok(())
    }

    async fn add_favorite(
        &self,
        owner_id: &str,
        subject: &Item,
    ) -> Result<Item, DataSourceError> {
        let favorite = Item {
            id: self.next_id("fav"),
            owner_id: owner_id.to_string(),
            payload_ref: subject.payload_ref.clone(),
            caption: subject.caption.clone(),
            created_at: Utc.timestamp_opt(self.next_stamp(), 0).unwrap(),
            subject_id: Some(subject.id.clone()),
        };
        self.records
            .lock()
            .unwrap()
            .push((Collection::Favorites, favorite.clone()));
        Ok(favorite)
    }

    async fn find_favorite(
        &self,
        owner_id: &str,
        subject_id: &str,
    ) -> Result<Option<Item>, DataSourceError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|(collection, item)| {
                *collection == Collection::Favorites
                    && item.owner_id == owner_id
                    && item.subject_id.as_deref() == Some(subject_id)
            })
            .map(|(_, item)| item.clone()))
    }
}

/// Yield until `cond` holds, so spawned tasks reach their await points
pub async fn wait_until(cond: impl Fn() -> bool) {
    for _ in 0..10_000 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never became true");
}
