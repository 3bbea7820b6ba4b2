// SPDX-License-Identifier: MPL-2.0

use crate::source::{Cursor, Item};
use crate::store::{StoreDb, StoreError};
use rusqlite::{OptionalExtension, params};

/// Document operations for favorites
pub struct FavoriteStore<'a> {
    db: &'a StoreDb,
}

impl<'a> FavoriteStore<'a> {
    pub fn new(db: &'a StoreDb) -> Self {
        Self { db }
    }

    /// Record a favorite, copying the post's image and caption
    pub fn insert(&self, owner_id: &str, subject: &Item) -> Result<Item, StoreError> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let created_at = self.db.next_timestamp();

        self.db.conn().execute(
            r#"
            INSERT INTO favorites (id, owner_id, subject_id, payload_ref, caption, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                id,
                owner_id,
                subject.id,
                subject.payload_ref,
                subject.caption,
                created_at
            ],
        )?;

        Ok(Item {
            id,
            owner_id: owner_id.to_string(),
            payload_ref: subject.payload_ref.clone(),
            caption: subject.caption.clone(),
            created_at: StoreDb::to_datetime(5, created_at)?,
            subject_id: Some(subject.id.clone()),
        })
    }

    /// Find the favorite `owner_id` recorded for `subject_id`, if any
    pub fn find(&self, owner_id: &str, subject_id: &str) -> Result<Option<Item>, StoreError> {
        let conn = self.db.conn();

        let favorite = conn
            .query_row(
                r#"
                SELECT id, owner_id, subject_id, payload_ref, caption, created_at
                FROM favorites
                WHERE owner_id = ?1 AND subject_id = ?2
                "#,
                params![owner_id, subject_id],
                Self::row_to_item,
            )
            .optional()?;

        Ok(favorite)
    }

    /// Get a page of an owner's favorites, newest first
    pub fn page(
        &self,
        owner_id: Option<&str>,
        cursor: Option<&Cursor>,
        limit: usize,
    ) -> Result<Vec<Item>, StoreError> {
        let conn = self.db.conn();

        let mut stmt = conn.prepare(
            r#"
            SELECT id, owner_id, subject_id, payload_ref, caption, created_at
            FROM favorites
            WHERE (?1 IS NULL OR owner_id = ?1)
              AND (?2 IS NULL OR created_at < ?2 OR (created_at = ?2 AND id < ?3))
            ORDER BY created_at DESC, id DESC
            LIMIT ?4
            "#,
        )?;

        let cursor_millis = cursor.map(|c| c.created_at().timestamp_millis());
        let cursor_id = cursor.map(|c| c.id());

        let mut rows = stmt.query(params![owner_id, cursor_millis, cursor_id, limit as i64])?;
        let mut favorites = Vec::new();

        while let Some(row) = rows.next()? {
            favorites.push(Self::row_to_item(row)?);
        }

        Ok(favorites)
    }

    /// Delete a favorite by id
    pub fn delete(&self, id: &str) -> Result<(), StoreError> {
        let removed = self
            .db
            .conn()
            .execute("DELETE FROM favorites WHERE id = ?", [id])?;

        if removed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn row_to_item(row: &rusqlite::Row) -> Result<Item, rusqlite::Error> {
        Ok(Item {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            subject_id: Some(row.get(2)?),
            payload_ref: row.get(3)?,
            caption: row.get(4)?,
            created_at: StoreDb::to_datetime(5, row.get(5)?)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::PostStore;

    #[test]
    fn favorite_copies_post_fields_and_is_findable() {
        let db = StoreDb::open_in_memory().unwrap();
        let post = PostStore::new(&db)
            .insert("alice", "file:///sunset.jpg", "sunset")
            .unwrap();
        let favorites = FavoriteStore::new(&db);

        let fav = favorites.insert("bob", &post).unwrap();
        assert_eq!(fav.owner_id, "bob");
        assert_eq!(fav.subject_id.as_deref(), Some(post.id.as_str()));
        assert_eq!(fav.payload_ref, post.payload_ref);
        assert_eq!(fav.caption, "sunset");

        assert_eq!(favorites.find("bob", &post.id).unwrap(), Some(fav.clone()));
        assert_eq!(favorites.find("alice", &post.id).unwrap(), None);
        assert_eq!(favorites.page(Some("bob"), None, 10).unwrap(), vec![fav]);
    }

    #[test]
    fn duplicate_favorite_is_rejected() {
        let db = StoreDb::open_in_memory().unwrap();
        let post = PostStore::new(&db).insert("alice", "p", "").unwrap();
        let favorites = FavoriteStore::new(&db);

        favorites.insert("bob", &post).unwrap();
        assert!(matches!(
            favorites.insert("bob", &post),
            Err(StoreError::Database(_))
        ));
    }

    #[test]
    fn delete_missing_favorite_is_not_found() {
        let db = StoreDb::open_in_memory().unwrap();
        assert!(matches!(
            FavoriteStore::new(&db).delete("nope"),
            Err(StoreError::NotFound)
        ));
    }
}
