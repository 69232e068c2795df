// SPDX-License-Identifier: MPL-2.0

use crate::api::{Id, User};
use crate::cache::{CacheDb, CacheError};
use rusqlite::params;

/// Cache operations for users
pub struct UserCache<'a> {
    db: &'a CacheDb,
}

impl<'a> UserCache<'a> {
    pub fn new(db: &'a CacheDb) -> Self {
        Self { db }
    }

    /// Store users in a transaction (upserts)
    pub fn store_batch(&self, users: &[User]) -> Result<(), CacheError> {
        {
            let mut conn = self.db.conn();
            let tx = conn.transaction()?;
            let now = CacheDb::now();

            for user in users {
                tx.execute(
                    r#"
                    INSERT INTO users (id, login, name, avatar, fetched_at)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    ON CONFLICT(id) DO UPDATE SET
                        login = excluded.login,
                        name = excluded.name,
                        avatar = excluded.avatar,
                        fetched_at = excluded.fetched_at
                    "#,
                    params![user.id, user.login, user.name, user.avatar, now],
                )?;
            }

            tx.commit()?;
        }
        self.db.notify_changed();
        Ok(())
    }

    /// Get user by id
    pub fn get(&self, id: Id) -> Result<User, CacheError> {
        let conn = self.db.conn();

        conn.query_row(
            "SELECT id, login, name, avatar FROM users WHERE id = ?",
            [id],
            Self::row_to_user,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => CacheError::NotFound,
            other => CacheError::Database(other),
        })
    }

    /// All cached users, by name
    pub fn all(&self) -> Result<Vec<User>, CacheError> {
        let conn = self.db.conn();

        let mut stmt =
            conn.prepare("SELECT id, login, name, avatar FROM users ORDER BY name COLLATE NOCASE")?;
        let users = stmt
            .query_map([], Self::row_to_user)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(users)
    }

    fn row_to_user(row: &rusqlite::Row) -> Result<User, rusqlite::Error> {
        Ok(User {
            id: row.get(0)?,
            login: row.get(1)?,
            name: row.get(2)?,
            avatar: row.get(3)?,
        })
    }
}
