// SPDX-License-Identifier: MPL-2.0

/// SQL schema for the document store
pub const SCHEMA: &str = r#"
-- Database version for migrations
PRAGMA user_version = 1;

-- posts: one row per uploaded photo
CREATE TABLE IF NOT EXISTS posts (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    payload_ref TEXT NOT NULL,
    caption TEXT NOT NULL DEFAULT '',
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_posts_created ON posts(created_at DESC, id DESC);
CREATE INDEX IF NOT EXISTS idx_posts_owner ON posts(owner_id, created_at DESC, id DESC);

-- favorites: snapshot of the favorited post's image and caption
CREATE TABLE IF NOT EXISTS favorites (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    subject_id TEXT NOT NULL,
    payload_ref TEXT NOT NULL,
    caption TEXT NOT NULL DEFAULT '',
    created_at INTEGER NOT NULL,
    UNIQUE(owner_id, subject_id)
);

CREATE INDEX IF NOT EXISTS idx_favorites_owner ON favorites(owner_id, created_at DESC, id DESC);

-- users: public profile fields, both optional until the user edits them
CREATE TABLE IF NOT EXISTS users (
    user_id TEXT PRIMARY KEY,
    username TEXT,
    profile_image TEXT,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_users_username ON users(username);
"#;
