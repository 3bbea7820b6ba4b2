// SPDX-License-Identifier: MPL-2.0

use crate::config::DATA_DIR_NAME;
use crate::store::StoreError;
use crate::store::schema::SCHEMA;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Handle to the document store database
#[derive(Clone)]
pub struct StoreDb {
    conn: Arc<Mutex<Connection>>,
    /// Last timestamp handed out, in unix millis
    last_stamp: Arc<Mutex<i64>>,
}

impl StoreDb {
    /// Open or create the store at ~/.local/share/photofeed/store.db
    pub fn open_default() -> Result<Self, StoreError> {
        Self::open(&Self::default_path()?)
    }

    /// Open or create the store at `path`
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Path(format!("failed to create store dir: {}", e)))?;
        }

        Self::from_connection(Connection::open(path)?)
    }

    /// Throwaway store, used by tests and previews
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        Self::migrate(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            last_stamp: Arc::new(Mutex::new(0)),
        })
    }

    /// Run schema migrations
    fn migrate(conn: &Connection) -> Result<(), StoreError> {
        // All CREATE IF NOT EXISTS
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// XDG data directory location of the store
    pub fn default_path() -> Result<PathBuf, StoreError> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| StoreError::Path("could not find data directory".to_string()))?;

        Ok(data_dir.join(DATA_DIR_NAME).join("store.db"))
    }

    /// Access connection for operations
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Server-side creation timestamp in unix millis.
    /// Strictly increasing per store, even if the wall clock goes backwards.
    pub fn next_timestamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut last = self.last_stamp.lock().unwrap_or_else(PoisonError::into_inner);
        *last = now.max(*last + 1);
        *last
    }

    /// Convert a stored millis column back into a timestamp
    pub(crate) fn to_datetime(idx: usize, millis: i64) -> Result<DateTime<Utc>, rusqlite::Error> {
        DateTime::from_timestamp_millis(millis)
            .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_strictly_increase() {
        let db = StoreDb::open_in_memory().unwrap();
        let mut prev = db.next_timestamp();
        for _ in 0..100 {
            let next = db.next_timestamp();
            assert!(next > prev);
            prev = next;
        }
    }

    #[test]
    fn open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.db");
        let db = StoreDb::open(&path).unwrap();
        let tables: i64 = db
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 3);
        assert!(path.exists());
    }
}
