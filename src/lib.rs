// SPDX-License-Identifier: MPL-2.0

//! Paginated photo feeds (home, per-user posts, favorites) over a document
//! store, with optimistic create and delete.

pub mod config;
pub mod feed;
pub mod logging;
pub mod source;
pub mod state;
pub mod store;

pub use feed::{FeedCache, FeedError, FeedSnapshot, FeedStatus, FeedSubscription, LoadOutcome};
pub use source::{
    Collection, Cursor, DataSource, DataSourceError, ErrorKind, FeedQuery, Item, Page,
    ProfileDirectory, ProfileUpdate, SqliteSource, UserProfile,
};
pub use state::FeedSettings;
