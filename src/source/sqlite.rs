// SPDX-License-Identifier: MPL-2.0

use crate::config::DEFAULT_SEARCH_LIMIT;
use crate::source::types::{Collection, Cursor, FeedQuery, Item, Page, ProfileUpdate, UserProfile};
use crate::source::{DataSource, DataSourceError, ErrorKind, ProfileDirectory};
use crate::state::FeedSettings;
use crate::store::{BlobStore, FavoriteStore, PostStore, ProfileStore, StoreDb, StoreError};
use async_trait::async_trait;
use rusqlite::ErrorCode;
use std::sync::Arc;
use tracing::{debug, warn};

impl From<StoreError> for DataSourceError {
    fn from(err: StoreError) -> Self {
        let kind = match &err {
            StoreError::NotFound => ErrorKind::NotFound,
            StoreError::Database(rusqlite::Error::SqliteFailure(e, _)) => match e.code {
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::CannotOpen => {
                    ErrorKind::Unavailable
                }
                ErrorCode::PermissionDenied
                | ErrorCode::ReadOnly
                | ErrorCode::AuthorizationForStatementDenied => ErrorKind::PermissionDenied,
                _ => ErrorKind::Unknown,
            },
            StoreError::Io(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                ErrorKind::PermissionDenied
            }
            StoreError::Io(_) => ErrorKind::Unavailable,
            StoreError::Database(_) | StoreError::Path(_) => ErrorKind::Unknown,
        };
        DataSourceError::new(kind, err.to_string())
    }
}

/// Serves feeds, mutations and profiles from the local SQLite store.
///
/// Store calls are synchronous, so each one runs on tokio's blocking pool.
pub struct SqliteSource {
    db: StoreDb,
    blobs: Arc<BlobStore>,
    search_limit: usize,
}

impl SqliteSource {
    pub fn new(db: StoreDb, blobs: BlobStore) -> Self {
        Self {
            db,
            blobs: Arc::new(blobs),
            search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    /// Open the store and blob directory under the user's data dir,
    /// applying the saved settings
    pub fn open_default() -> Result<Self, StoreError> {
        let source = Self::new(StoreDb::open_default()?, BlobStore::open_default()?);
        Ok(source.with_settings(&FeedSettings::load()))
    }

    pub fn with_search_limit(mut self, limit: usize) -> Self {
        self.search_limit = limit.max(1);
        self
    }

    pub fn with_settings(self, settings: &FeedSettings) -> Self {
        self.with_search_limit(settings.search_limit)
    }

    pub fn db(&self) -> &StoreDb {
        &self.db
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// Upload photo bytes and return the `payload_ref` to create a post with.
    pub async fn upload_image(
        &self,
        owner_id: &str,
        data: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<String, DataSourceError> {
        let owner_id = owner_id.to_string();
        self.run("upload", move |_, blobs| {
            blobs.upload(&owner_id, &data, content_type.as_deref())
        })
        .await
    }

    /// Run a store operation on the blocking pool
    async fn run<T, F>(&self, op: &'static str, f: F) -> Result<T, DataSourceError>
    where
        F: FnOnce(&StoreDb, &BlobStore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        let blobs = self.blobs.clone();

        let result = tokio::task::spawn_blocking(move || f(&db, &blobs))
            .await
            .map_err(|e| DataSourceError::new(ErrorKind::Unknown, format!("{op} task failed: {e}")))?;

        result.map_err(|e| {
            let err = DataSourceError::from(e);
            if !err.is_not_found() {
                warn!(op, error = %err, "store operation failed");
            }
            err
        })
    }
}

#[async_trait]
impl DataSource for SqliteSource {
    async fn fetch_page(
        &self,
        query: &FeedQuery,
        cursor: Option<&Cursor>,
        page_size: usize,
    ) -> Result<Page, DataSourceError> {
        let query = query.clone();
        let cursor = cursor.cloned();

        let items = self
            .run("fetch_page", move |db, _| {
                let owner = query.owner.as_deref();
                match query.collection {
                    Collection::Posts => PostStore::new(db).page(owner, cursor.as_ref(), page_size),
                    Collection::Favorites => {
                        FavoriteStore::new(db).page(owner, cursor.as_ref(), page_size)
                    }
                }
            })
            .await?;

        debug!(count = items.len(), page_size, "fetched page");
        Ok(Page::from_items(items))
    }

    async fn create(
        &self,
        owner_id: &str,
        payload_ref: &str,
        caption: &str,
    ) -> Result<Item, DataSourceError> {
        let (owner_id, payload_ref, caption) =
            (owner_id.to_string(), payload_ref.to_string(), caption.to_string());

        let item = self
            .run("create", move |db, _| {
                PostStore::new(db).insert(&owner_id, &payload_ref, &caption)
            })
            .await?;

        debug!(id = %item.id, owner_id = %item.owner_id, "created post");
        Ok(item)
    }

    async fn delete(&self, id: &str) -> Result<(), DataSourceError> {
        let id = id.to_string();

        self.run("delete", move |db, blobs| {
            match PostStore::new(db).delete(&id) {
                Ok(post) => {
                    // The post is gone either way; an orphaned blob is only logged
                    match blobs.delete(&post.payload_ref) {
                        Ok(_) => {}
                        Err(StoreError::Path(reason)) => {
                            debug!(%id, %reason, "post payload is not a local blob")
                        }
                        Err(e) => warn!(%id, error = %e, "failed to release blob"),
                    }
                    debug!(%id, "deleted post");
                    Ok(())
                }
                Err(StoreError::NotFound) => {
                    FavoriteStore::new(db).delete(&id)?;
                    debug!(%id, "deleted favorite");
                    Ok(())
                }
                Err(e) => Err(e),
            }
        })
        .await
    }

    async fn add_favorite(
        &self,
        owner_id: &str,
        subject: &Item,
    ) -> Result<Item, DataSourceError> {
        let owner_id = owner_id.to_string();
        let subject = subject.clone();

        self.run("add_favorite", move |db, _| {
            FavoriteStore::new(db).insert(&owner_id, &subject)
        })
        .await
    }

    async fn find_favorite(
        &self,
        owner_id: &str,
        subject_id: &str,
    ) -> Result<Option<Item>, DataSourceError> {
        let (owner_id, subject_id) = (owner_id.to_string(), subject_id.to_string());

        self.run("find_favorite", move |db, _| {
            FavoriteStore::new(db).find(&owner_id, &subject_id)
        })
        .await
    }
}

#[async_trait]
impl ProfileDirectory for SqliteSource {
    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, DataSourceError> {
        let user_id = user_id.to_string();

        self.run("get_profile", move |db, _| match ProfileStore::new(db).get(&user_id) {
            Ok(profile) => Ok(Some(profile)),
            Err(StoreError::NotFound) => Ok(None),
            Err(e) => Err(e),
        })
        .await
    }

    async fn update_profile(
        &self,
        user_id: &str,
        update: ProfileUpdate,
    ) -> Result<(), DataSourceError> {
        let user_id = user_id.to_string();

        self.run("update_profile", move |db, _| {
            ProfileStore::new(db).update(&user_id, &update)
        })
        .await
    }

    async fn search_by_username(
        &self,
        prefix: &str,
    ) -> Result<Vec<UserProfile>, DataSourceError> {
        let prefix = prefix.to_string();
        let limit = self.search_limit;

        self.run("search", move |db, _| ProfileStore::new(db).search(&prefix, limit))
            .await
    }
}
