// SPDX-License-Identifier: MPL-2.0

mod cache;
mod state;
mod subscription;

pub use cache::{FeedCache, LoadOutcome};
pub use state::{FeedSnapshot, FeedStatus};
pub use subscription::FeedSubscription;

use crate::source::{DataSourceError, ErrorKind, FeedQuery};
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum FeedError {
    #[error(transparent)]
    Source(#[from] DataSourceError),
    #[error("feed {0} has no subscribers")]
    UnknownFeed(FeedQuery),
}

impl FeedError {
    /// Failure class when the error came from the data source
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            FeedError::Source(err) => Some(err.kind),
            FeedError::UnknownFeed(_) => None,
        }
    }
}
