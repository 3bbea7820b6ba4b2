// SPDX-License-Identifier: MPL-2.0

//! Local document and blob storage standing in for the hosted backend.

mod blobs;
mod db;
mod favorites;
mod posts;
mod profiles;
mod schema;

pub use blobs::BlobStore;
pub use db::StoreDb;
pub use favorites::FavoriteStore;
pub use posts::PostStore;
pub use profiles::ProfileStore;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not found")]
    NotFound,
    #[error("storage path error: {0}")]
    Path(String),
}
