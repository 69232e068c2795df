// SPDX-License-Identifier: MPL-2.0

use crate::cache::CacheError;
use crate::cache::schema::SCHEMA;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::debug;

/// Handle to the cache database.
///
/// Cloning is cheap; all clones share one connection and one change stream.
#[derive(Clone)]
pub struct CacheDb {
    conn: Arc<Mutex<Connection>>,
    changes: Arc<watch::Sender<u64>>,
}

impl CacheDb {
    /// Open or create the cache database for a user
    /// Path: ~/.local/share/nework/{user_id}/cache.db
    pub fn open(user_id: i64) -> Result<Self, CacheError> {
        let path = Self::cache_path(user_id)?;
        Self::open_at(path)
    }

    pub fn open_at(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CacheError::Path(format!("failed to create cache dir: {}", e)))?;
        }

        debug!(path = %path.display(), "opening cache database");
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Private database that disappears with the handle
    pub fn open_in_memory() -> Result<Self, CacheError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, CacheError> {
        Self::migrate(&conn)?;
        let (changes, _) = watch::channel(0);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            changes: Arc::new(changes),
        })
    }

    /// Run schema migrations
    fn migrate(conn: &Connection) -> Result<(), CacheError> {
        // Execute the schema (all CREATE IF NOT EXISTS)
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get XDG data directory for cache
    fn cache_path(user_id: i64) -> Result<PathBuf, CacheError> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| CacheError::Path("could not find data directory".to_string()))?;

        Ok(data_dir
            .join("nework")
            .join(user_id.to_string())
            .join("cache.db"))
    }

    /// Access connection for operations
    pub fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("cache lock poisoned")
    }

    /// Bump the change generation. Call after every committed write.
    pub fn notify_changed(&self) {
        self.changes.send_modify(|generation| *generation += 1);
    }

    /// Current change generation
    pub fn generation(&self) -> u64 {
        *self.changes.borrow()
    }

    /// Change stream; each new value means some table was written
    pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Get current unix timestamp
    pub fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_bumps_and_notifies() {
        let db = CacheDb::open_in_memory().unwrap();
        let mut rx = db.subscribe_changes();
        assert_eq!(db.generation(), 0);

        db.clone().notify_changed();
        assert_eq!(db.generation(), 1);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 1);
    }

    #[test]
    fn test_open_at_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("cache.db");
        let db = CacheDb::open_at(&path).unwrap();
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
