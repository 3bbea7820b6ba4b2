// SPDX-License-Identifier: MPL-2.0

use crate::source::{Cursor, Item};
use crate::store::{StoreDb, StoreError};
use rusqlite::{OptionalExtension, params};

/// Document operations for posts
pub struct PostStore<'a> {
    db: &'a StoreDb,
}

impl<'a> PostStore<'a> {
    pub fn new(db: &'a StoreDb) -> Self {
        Self { db }
    }

    /// Insert a new post, assigning its id and creation time
    pub fn insert(
        &self,
        owner_id: &str,
        payload_ref: &str,
        caption: &str,
    ) -> Result<Item, StoreError> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let created_at = self.db.next_timestamp();

        self.db.conn().execute(
            r#"
            INSERT INTO posts (id, owner_id, payload_ref, caption, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![id, owner_id, payload_ref, caption, created_at],
        )?;

        Ok(Item {
            id,
            owner_id: owner_id.to_string(),
            payload_ref: payload_ref.to_string(),
            caption: caption.to_string(),
            created_at: StoreDb::to_datetime(4, created_at)?,
            subject_id: None,
        })
    }

    /// Get a page of posts, newest first, resuming strictly after `cursor`
    pub fn page(
        &self,
        owner_id: Option<&str>,
        cursor: Option<&Cursor>,
        limit: usize,
    ) -> Result<Vec<Item>, StoreError> {
        let conn = self.db.conn();

        let mut stmt = conn.prepare(
            r#"
            SELECT id, owner_id, payload_ref, caption, created_at
            FROM posts
            WHERE (?1 IS NULL OR owner_id = ?1)
              AND (?2 IS NULL OR created_at < ?2 OR (created_at = ?2 AND id < ?3))
            ORDER BY created_at DESC, id DESC
            LIMIT ?4
            "#,
        )?;

        let cursor_millis = cursor.map(|c| c.created_at().timestamp_millis());
        let cursor_id = cursor.map(|c| c.id());

        let mut rows = stmt.query(params![owner_id, cursor_millis, cursor_id, limit as i64])?;
        let mut posts = Vec::new();

        while let Some(row) = rows.next()? {
            posts.push(Self::row_to_item(row)?);
        }

        Ok(posts)
    }

    /// Get post by id
    pub fn get(&self, id: &str) -> Result<Item, StoreError> {
        let conn = self.db.conn();

        conn.query_row(
            "SELECT id, owner_id, payload_ref, caption, created_at FROM posts WHERE id = ?",
            [id],
            Self::row_to_item,
        )
        .optional()?
        .ok_or(StoreError::NotFound)
    }

    /// Delete a post, returning the removed row so its blob can be released
    pub fn delete(&self, id: &str) -> Result<Item, StoreError> {
        let post = self.get(id)?;
        let removed = self.db.conn().execute("DELETE FROM posts WHERE id = ?", [id])?;

        if removed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(post)
    }

    /// Convert a database row to an Item
    fn row_to_item(row: &rusqlite::Row) -> Result<Item, rusqlite::Error> {
        Ok(Item {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            payload_ref: row.get(2)?,
            caption: row.get(3)?,
            created_at: StoreDb::to_datetime(4, row.get(4)?)?,
            subject_id: None,
        })
    }
}
