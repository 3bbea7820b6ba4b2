// SPDX-License-Identifier: MPL-2.0

use crate::source::{ProfileUpdate, UserProfile};
use crate::store::{StoreDb, StoreError};
use rusqlite::{OptionalExtension, params};

/// Document operations for user profiles
pub struct ProfileStore<'a> {
    db: &'a StoreDb,
}

impl<'a> ProfileStore<'a> {
    pub fn new(db: &'a StoreDb) -> Self {
        Self { db }
    }

    /// Merge an update into a profile (upserts; `None` fields keep their value)
    pub fn update(&self, user_id: &str, update: &ProfileUpdate) -> Result<(), StoreError> {
        let conn = self.db.conn();
        let now = self.db.next_timestamp();

        conn.execute(
            r#"
            INSERT INTO users (user_id, username, profile_image, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id) DO UPDATE SET
                username = COALESCE(excluded.username, users.username),
                profile_image = COALESCE(excluded.profile_image, users.profile_image),
                updated_at = excluded.updated_at
            "#,
            params![user_id, update.username, update.profile_image, now],
        )?;

        Ok(())
    }

    /// Get profile by user id
    pub fn get(&self, user_id: &str) -> Result<UserProfile, StoreError> {
        let conn = self.db.conn();

        conn.query_row(
            "SELECT user_id, username, profile_image FROM users WHERE user_id = ?",
            [user_id],
            Self::row_to_profile,
        )
        .optional()?
        .ok_or(StoreError::NotFound)
    }

    /// Case-sensitive username prefix search over complete profiles
    pub fn search(&self, prefix: &str, limit: usize) -> Result<Vec<UserProfile>, StoreError> {
        let conn = self.db.conn();

        let mut stmt = conn.prepare(
            r#"
            SELECT user_id, username, profile_image
            FROM users
            WHERE substr(username, 1, length(?1)) = ?1
              AND username <> ''
              AND profile_image IS NOT NULL AND profile_image <> ''
            ORDER BY username ASC
            LIMIT ?2
            "#,
        )?;

        let profiles = stmt
            .query_map(params![prefix, limit as i64], Self::row_to_profile)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(profiles)
    }

    fn row_to_profile(row: &rusqlite::Row) -> Result<UserProfile, rusqlite::Error> {
        Ok(UserProfile {
            user_id: row.get(0)?,
            username: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            profile_image: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        })
    }
}
