// SPDX-License-Identifier: MPL-2.0

/// SQL schema for the cache database
pub const SCHEMA: &str = r#"
-- Database version for migrations
PRAGMA user_version = 1;

-- items: posts and events, variant body as JSON, mutable fields as columns
CREATE TABLE IF NOT EXISTS items (
    kind TEXT NOT NULL,
    id INTEGER NOT NULL,
    author_id INTEGER NOT NULL,
    content TEXT NOT NULL,
    published TEXT NOT NULL,
    body_json TEXT NOT NULL,
    like_owner_ids TEXT NOT NULL DEFAULT '[]',
    liked_by_me INTEGER NOT NULL DEFAULT 0,
    likes INTEGER NOT NULL DEFAULT 0,
    participants_ids TEXT NOT NULL DEFAULT '[]',
    participated_by_me INTEGER NOT NULL DEFAULT 0,
    participants INTEGER NOT NULL DEFAULT 0,
    read INTEGER NOT NULL DEFAULT 1,
    fetched_at INTEGER NOT NULL,
    PRIMARY KEY (kind, id)
);

CREATE INDEX IF NOT EXISTS idx_items_author ON items(kind, author_id, id DESC);
CREATE INDEX IF NOT EXISTS idx_items_read ON items(kind, read);

-- remote_keys: paging cursors, one row per boundary per feed
CREATE TABLE IF NOT EXISTS remote_keys (
    feed_key TEXT NOT NULL,
    key_type TEXT NOT NULL,
    item_id INTEGER NOT NULL,
    PRIMARY KEY (feed_key, key_type)
);

-- users: id-keyed directory used for likers, speakers and avatars
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    login TEXT NOT NULL,
    name TEXT NOT NULL,
    avatar TEXT,
    fetched_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_users_login ON users(login);
"#;
