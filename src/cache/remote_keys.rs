// SPDX-License-Identifier: MPL-2.0

use crate::api::{Feed, Id};
use crate::cache::{CacheDb, CacheError};
use rusqlite::{OptionalExtension, Transaction, params};

/// Which end of the cached window a cursor marks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteKeyType {
    /// Newest boundary; prepends resume from here
    Before,
    /// Oldest boundary; appends resume from here
    After,
}

impl RemoteKeyType {
    fn as_str(self) -> &'static str {
        match self {
            RemoteKeyType::Before => "BEFORE",
            RemoteKeyType::After => "AFTER",
        }
    }
}

/// Cache operations for paging cursors
pub struct RemoteKeyCache<'a> {
    db: &'a CacheDb,
}

impl<'a> RemoteKeyCache<'a> {
    pub fn new(db: &'a CacheDb) -> Self {
        Self { db }
    }

    pub fn get(&self, feed: &Feed, key_type: RemoteKeyType) -> Result<Option<Id>, CacheError> {
        let conn = self.db.conn();

        let id = conn
            .query_row(
                "SELECT item_id FROM remote_keys WHERE feed_key = ?1 AND key_type = ?2",
                params![feed.key(), key_type.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        Ok(id)
    }

    pub fn set(&self, feed: &Feed, key_type: RemoteKeyType, id: Id) -> Result<(), CacheError> {
        let mut conn = self.db.conn();
        let tx = conn.transaction()?;
        Self::set_tx(&tx, feed, key_type, id)?;
        tx.commit()?;
        Ok(())
    }

    pub fn clear(&self, feed: &Feed) -> Result<(), CacheError> {
        let mut conn = self.db.conn();
        let tx = conn.transaction()?;
        Self::clear_tx(&tx, feed)?;
        tx.commit()?;
        Ok(())
    }

    /// Upsert a cursor inside a caller's transaction
    pub fn set_tx(
        tx: &Transaction,
        feed: &Feed,
        key_type: RemoteKeyType,
        id: Id,
    ) -> Result<(), CacheError> {
        tx.execute(
            r#"
            INSERT INTO remote_keys (feed_key, key_type, item_id)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(feed_key, key_type) DO UPDATE SET
                item_id = excluded.item_id
            "#,
            params![feed.key(), key_type.as_str(), id],
        )?;
        Ok(())
    }

    pub fn clear_tx(tx: &Transaction, feed: &Feed) -> Result<(), CacheError> {
        tx.execute("DELETE FROM remote_keys WHERE feed_key = ?1", [feed.key()])?;
        Ok(())
    }
}
