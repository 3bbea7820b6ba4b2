// SPDX-License-Identifier: MPL-2.0

//! The backend boundary: record types, the `DataSource` contract the feed
//! engine consumes, and a SQLite-backed implementation of it.

mod sqlite;
mod types;

pub use sqlite::SqliteSource;
pub use types::{Collection, Cursor, FeedQuery, Item, Page, ProfileUpdate, UserProfile};

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Failure class reported by a data source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The record is already gone
    NotFound,
    PermissionDenied,
    /// Transient; the caller may retry
    Unavailable,
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::PermissionDenied => "permission denied",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::Unknown => "unknown error",
        })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct DataSourceError {
    pub kind: ErrorKind,
    pub message: String,
}

impl DataSourceError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }
}

/// Remote query backend the feed engine reads from and writes through.
///
/// Implementations assign ids and timestamps; the engine never invents them.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Fetch up to `page_size` items strictly after `cursor` (or from the
    /// newest item when `cursor` is `None`), descending by `(created_at, id)`.
    async fn fetch_page(
        &self,
        query: &FeedQuery,
        cursor: Option<&Cursor>,
        page_size: usize,
    ) -> Result<Page, DataSourceError>;

    /// Persist a new post and return it with its assigned id and timestamp.
    async fn create(
        &self,
        owner_id: &str,
        payload_ref: &str,
        caption: &str,
    ) -> Result<Item, DataSourceError>;

    /// Delete a post or favorite record, releasing any associated blob.
    async fn delete(&self, id: &str) -> Result<(), DataSourceError>;

    /// Record that `owner_id` favorited `subject`.
    async fn add_favorite(&self, owner_id: &str, subject: &Item)
    -> Result<Item, DataSourceError>;

    /// Look up an existing favorite of `subject_id` by `owner_id`.
    async fn find_favorite(
        &self,
        owner_id: &str,
        subject_id: &str,
    ) -> Result<Option<Item>, DataSourceError>;
}

/// Profile lookup and search for the profile and search screens.
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, DataSourceError>;

    /// Merge `update` into the stored profile, creating it if needed.
    async fn update_profile(
        &self,
        user_id: &str,
        update: ProfileUpdate,
    ) -> Result<(), DataSourceError>;

    /// Profiles whose username starts with `prefix`; incomplete profiles are skipped.
    async fn search_by_username(&self, prefix: &str)
    -> Result<Vec<UserProfile>, DataSourceError>;
}
