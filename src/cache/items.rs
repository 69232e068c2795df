// SPDX-License-Identifier: MPL-2.0

use crate::api::{Attachment, Event, Feed, Id, ItemKind, Post};
use crate::cache::{CacheDb, CacheError};
use rusqlite::{OptionalExtension, Transaction, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use tracing::debug;

/// A reaction that a user can switch on and off for an item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Like,
    Participate,
}

impl Toggle {
    /// (owner set, by-me flag, counter) columns
    fn columns(self) -> (&'static str, &'static str, &'static str) {
        match self {
            Toggle::Like => ("like_owner_ids", "liked_by_me", "likes"),
            Toggle::Participate => ("participants_ids", "participated_by_me", "participants"),
        }
    }
}

/// Owner set, flag and counter of one toggle on one item
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToggleState {
    pub owner_ids: Vec<Id>,
    pub by_me: bool,
    pub count: u32,
}

impl ToggleState {
    pub fn from_owners(owner_ids: Vec<Id>, by_me: bool) -> Self {
        let count = owner_ids.len() as u32;
        Self {
            owner_ids,
            by_me,
            count,
        }
    }

    /// Flip `user_id`'s membership. Applying this twice gives back `self`
    /// whenever the flag and the owner set agree.
    pub fn toggled(&self, user_id: Id) -> Self {
        let mut owner_ids = self.owner_ids.clone();
        if self.by_me {
            owner_ids.retain(|&id| id != user_id);
            Self {
                owner_ids,
                by_me: false,
                count: self.count.saturating_sub(1),
            }
        } else {
            if !owner_ids.contains(&user_id) {
                owner_ids.push(user_id);
            }
            Self {
                owner_ids,
                by_me: true,
                count: self.count + 1,
            }
        }
    }
}

/// A feed item variant that lives in the `items` table
pub trait Cacheable: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: ItemKind;
    /// Toggles this variant carries
    const TOGGLES: &'static [Toggle];

    fn id(&self) -> Id;
    fn author_id(&self) -> Id;
    fn content(&self) -> &str;
    fn published(&self) -> &str;
    fn set_content(&mut self, content: String);
    fn toggle_state(&self, toggle: Toggle) -> Option<ToggleState>;
    fn set_toggle_state(&mut self, toggle: Toggle, state: ToggleState);
    fn set_owned_by_me(&mut self, owned: bool);
    fn set_attachment(&mut self, attachment: Option<Attachment>);

    /// Seed the local counters from the owner sets
    fn recount(&mut self) {
        for &toggle in Self::TOGGLES {
            if let Some(state) = self.toggle_state(toggle) {
                self.set_toggle_state(toggle, ToggleState::from_owners(state.owner_ids, state.by_me));
            }
        }
    }
}

impl Cacheable for Post {
    const KIND: ItemKind = ItemKind::Post;
    const TOGGLES: &'static [Toggle] = &[Toggle::Like];

    fn id(&self) -> Id {
        self.id
    }

    fn author_id(&self) -> Id {
        self.author_id
    }

    fn content(&self) -> &str {
        &self.content
    }

    fn published(&self) -> &str {
        &self.published
    }

    fn set_content(&mut self, content: String) {
        self.content = content;
    }

    fn toggle_state(&self, toggle: Toggle) -> Option<ToggleState> {
        match toggle {
            Toggle::Like => Some(ToggleState {
                owner_ids: self.like_owner_ids.clone(),
                by_me: self.liked_by_me,
                count: self.likes,
            }),
            Toggle::Participate => None,
        }
    }

    fn set_toggle_state(&mut self, toggle: Toggle, state: ToggleState) {
        if toggle == Toggle::Like {
            self.like_owner_ids = state.owner_ids;
            self.liked_by_me = state.by_me;
            self.likes = state.count;
        }
    }

    fn set_owned_by_me(&mut self, owned: bool) {
        self.owned_by_me = owned;
    }

    fn set_attachment(&mut self, attachment: Option<Attachment>) {
        self.attachment = attachment;
    }
}

impl Cacheable for Event {
    const KIND: ItemKind = ItemKind::Event;
    const TOGGLES: &'static [Toggle] = &[Toggle::Like, Toggle::Participate];

    fn id(&self) -> Id {
        self.id
    }

    fn author_id(&self) -> Id {
        self.author_id
    }

    fn content(&self) -> &str {
        &self.content
    }

    fn published(&self) -> &str {
        &self.published
    }

    fn set_content(&mut self, content: String) {
        self.content = content;
    }

    fn toggle_state(&self, toggle: Toggle) -> Option<ToggleState> {
        Some(match toggle {
            Toggle::Like => ToggleState {
                owner_ids: self.like_owner_ids.clone(),
                by_me: self.liked_by_me,
                count: self.likes,
            },
            Toggle::Participate => ToggleState {
                owner_ids: self.participants_ids.clone(),
                by_me: self.participated_by_me,
                count: self.participants,
            },
        })
    }

    fn set_toggle_state(&mut self, toggle: Toggle, state: ToggleState) {
        match toggle {
            Toggle::Like => {
                self.like_owner_ids = state.owner_ids;
                self.liked_by_me = state.by_me;
                self.likes = state.count;
            }
            Toggle::Participate => {
                self.participants_ids = state.owner_ids;
                self.participated_by_me = state.by_me;
                self.participants = state.count;
            }
        }
    }

    fn set_owned_by_me(&mut self, owned: bool) {
        self.owned_by_me = owned;
    }

    fn set_attachment(&mut self, attachment: Option<Attachment>) {
        self.attachment = attachment;
    }
}

/// A persisted row: the item plus its read flag
#[derive(Debug, Clone, PartialEq)]
pub struct CachedItem<T> {
    pub item: T,
    /// False for rows inserted by the newer-item poll until acknowledged
    pub read: bool,
}

/// Raw column values, decoded outside the rusqlite row closure
struct RawRow {
    body_json: String,
    content: String,
    like_owner_ids: String,
    liked_by_me: bool,
    likes: i64,
    participants_ids: String,
    participated_by_me: bool,
    participants: i64,
    read: bool,
}

const SELECT_COLUMNS: &str = r#"
    SELECT body_json, content, like_owner_ids, liked_by_me, likes,
           participants_ids, participated_by_me, participants, read
    FROM items
"#;

/// Local store operations for one item variant
pub struct ItemCache<'a, T> {
    db: &'a CacheDb,
    _kind: PhantomData<T>,
}

impl<'a, T: Cacheable> ItemCache<'a, T> {
    pub fn new(db: &'a CacheDb) -> Self {
        Self {
            db,
            _kind: PhantomData,
        }
    }

    /// A page of the feed's rows, newest id first
    pub fn page(
        &self,
        feed: &Feed,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<CachedItem<T>>, CacheError> {
        let conn = self.db.conn();

        let query = format!(
            "{SELECT_COLUMNS} WHERE kind = ?1 AND (?2 IS NULL OR author_id = ?2)
             ORDER BY id DESC LIMIT ?3 OFFSET ?4"
        );
        let mut stmt = conn.prepare(&query)?;
        let rows = stmt
            .query_map(
                params![
                    T::KIND.as_str(),
                    feed.author_filter(),
                    limit as i64,
                    offset as i64
                ],
                Self::read_raw,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(Self::decode).collect()
    }

    /// Get a row by id
    pub fn get(&self, id: Id) -> Result<CachedItem<T>, CacheError> {
        let conn = self.db.conn();

        let query = format!("{SELECT_COLUMNS} WHERE kind = ?1 AND id = ?2");
        let raw = conn
            .query_row(&query, params![T::KIND.as_str(), id], Self::read_raw)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => CacheError::NotFound,
                other => CacheError::Database(other),
            })?;

        Self::decode(raw)
    }

    /// Store a single item (insert or replace by id)
    pub fn store(&self, item: &T, read: bool) -> Result<(), CacheError> {
        self.store_batch(std::slice::from_ref(item), read)
    }

    /// Store multiple items in a transaction
    pub fn store_batch(&self, items: &[T], read: bool) -> Result<(), CacheError> {
        {
            let mut conn = self.db.conn();
            let tx = conn.transaction()?;
            Self::store_batch_tx(&tx, items, read)?;
            tx.commit()?;
        }
        self.db.notify_changed();
        Ok(())
    }

    /// Store multiple items, keeping the read flag of rows already cached.
    /// New rows get `read_if_new`.
    pub fn merge_batch(&self, items: &[T], read_if_new: bool) -> Result<(), CacheError> {
        {
            let mut conn = self.db.conn();
            let tx = conn.transaction()?;
            Self::merge_batch_tx(&tx, items, read_if_new)?;
            tx.commit()?;
        }
        self.db.notify_changed();
        Ok(())
    }

    pub fn merge_batch_tx(
        tx: &Transaction,
        items: &[T],
        read_if_new: bool,
    ) -> Result<(), CacheError> {
        for item in items {
            let existing: Option<bool> = tx
                .query_row(
                    "SELECT read FROM items WHERE kind = ?1 AND id = ?2",
                    params![T::KIND.as_str(), item.id()],
                    |row| row.get(0),
                )
                .optional()?;
            Self::store_batch_tx(tx, std::slice::from_ref(item), existing.unwrap_or(read_if_new))?;
        }
        Ok(())
    }

    /// Insert or replace inside a caller's transaction. Counters are
    /// derived from the owner sets.
    pub fn store_batch_tx(tx: &Transaction, items: &[T], read: bool) -> Result<(), CacheError> {
        let now = CacheDb::now();

        for item in items {
            let body_json = serde_json::to_string(item)?;
            let like = item.toggle_state(Toggle::Like).unwrap_or_default();
            let participate = item
                .toggle_state(Toggle::Participate)
                .unwrap_or_default();

            tx.execute(
                r#"
                INSERT OR REPLACE INTO items (
                    kind, id, author_id, content, published, body_json,
                    like_owner_ids, liked_by_me, likes,
                    participants_ids, participated_by_me, participants,
                    read, fetched_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                "#,
                params![
                    T::KIND.as_str(),
                    item.id(),
                    item.author_id(),
                    item.content(),
                    item.published(),
                    body_json,
                    serde_json::to_string(&like.owner_ids)?,
                    like.by_me,
                    like.owner_ids.len() as i64,
                    serde_json::to_string(&participate.owner_ids)?,
                    participate.by_me,
                    participate.owner_ids.len() as i64,
                    read,
                    now,
                ],
            )?;
        }

        Ok(())
    }

    /// Edit only the content of a row
    pub fn update_content(&self, id: Id, content: &str) -> Result<(), CacheError> {
        {
            let conn = self.db.conn();
            conn.execute(
                "UPDATE items SET content = ?1 WHERE kind = ?2 AND id = ?3",
                params![content, T::KIND.as_str(), id],
            )?;
        }
        self.db.notify_changed();
        Ok(())
    }

    /// Acknowledge every unread row of the feed
    pub fn mark_all_read(&self, feed: &Feed) -> Result<usize, CacheError> {
        let changed = {
            let conn = self.db.conn();
            conn.execute(
                "UPDATE items SET read = 1
                 WHERE read = 0 AND kind = ?1 AND (?2 IS NULL OR author_id = ?2)",
                params![T::KIND.as_str(), feed.author_filter()],
            )?
        };
        if changed > 0 {
            self.db.notify_changed();
        }
        Ok(changed)
    }

    pub fn count_unread(&self, feed: &Feed) -> Result<usize, CacheError> {
        let conn = self.db.conn();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM items
             WHERE read = 0 AND kind = ?1 AND (?2 IS NULL OR author_id = ?2)",
            params![T::KIND.as_str(), feed.author_filter()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Highest id the user has acknowledged
    pub fn max_read_id(&self, feed: &Feed) -> Result<Option<Id>, CacheError> {
        let conn = self.db.conn();
        let id: Option<Id> = conn.query_row(
            "SELECT MAX(id) FROM items
             WHERE read = 1 AND kind = ?1 AND (?2 IS NULL OR author_id = ?2)",
            params![T::KIND.as_str(), feed.author_filter()],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn count(&self, feed: &Feed) -> Result<usize, CacheError> {
        let conn = self.db.conn();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM items WHERE kind = ?1 AND (?2 IS NULL OR author_id = ?2)",
            params![T::KIND.as_str(), feed.author_filter()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn is_empty(&self, feed: &Feed) -> Result<bool, CacheError> {
        Ok(self.count(feed)? == 0)
    }

    /// Flip the toggle flag, move the counter by exactly one and set the new
    /// owner set, without touching any other column.
    pub fn update_toggle_state(
        &self,
        id: Id,
        toggle: Toggle,
        owner_ids: &[Id],
    ) -> Result<(), CacheError> {
        Self::ensure_supported(toggle)?;
        {
            let conn = self.db.conn();
            Self::update_toggle_state_on(&conn, id, toggle, owner_ids)?;
        }
        self.db.notify_changed();
        Ok(())
    }

    /// Flip `user_id`'s membership in the toggle, reading the current row in
    /// the same transaction. Returns the new state, or `None` when the row is
    /// not cached.
    pub fn toggle_by_id(
        &self,
        id: Id,
        toggle: Toggle,
        user_id: Id,
    ) -> Result<Option<ToggleState>, CacheError> {
        Self::ensure_supported(toggle)?;
        let (owners_col, by_me_col, count_col) = toggle.columns();

        let next = {
            let mut conn = self.db.conn();
            let tx = conn.transaction()?;

            let current = tx
                .query_row(
                    &format!(
                        "SELECT {owners_col}, {by_me_col}, {count_col} FROM items
                         WHERE kind = ?1 AND id = ?2"
                    ),
                    params![T::KIND.as_str(), id],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, bool>(1)?,
                            row.get::<_, i64>(2)?,
                        ))
                    },
                )
                .optional()?;

            let Some((owners_json, by_me, count)) = current else {
                debug!(id, ?toggle, "toggle on uncached row ignored");
                return Ok(None);
            };

            let state = ToggleState {
                owner_ids: serde_json::from_str(&owners_json)?,
                by_me,
                count: count.max(0) as u32,
            };
            let next = state.toggled(user_id);
            Self::update_toggle_state_on(&tx, id, toggle, &next.owner_ids)?;
            tx.commit()?;
            next
        };

        self.db.notify_changed();
        Ok(Some(next))
    }

    fn update_toggle_state_on(
        conn: &rusqlite::Connection,
        id: Id,
        toggle: Toggle,
        owner_ids: &[Id],
    ) -> Result<(), CacheError> {
        let (owners_col, by_me_col, count_col) = toggle.columns();
        conn.execute(
            &format!(
                "UPDATE items SET
                    {count_col} = {count_col} + CASE WHEN {by_me_col} THEN -1 ELSE 1 END,
                    {by_me_col} = CASE WHEN {by_me_col} THEN 0 ELSE 1 END,
                    {owners_col} = ?1
                 WHERE kind = ?2 AND id = ?3"
            ),
            params![serde_json::to_string(owner_ids)?, T::KIND.as_str(), id],
        )?;
        Ok(())
    }

    pub fn delete_by_id(&self, id: Id) -> Result<(), CacheError> {
        {
            let conn = self.db.conn();
            conn.execute(
                "DELETE FROM items WHERE kind = ?1 AND id = ?2",
                params![T::KIND.as_str(), id],
            )?;
        }
        self.db.notify_changed();
        Ok(())
    }

    /// Remove every row belonging to the feed
    pub fn clear(&self, feed: &Feed) -> Result<(), CacheError> {
        {
            let conn = self.db.conn();
            Self::clear_on(&conn, feed)?;
        }
        self.db.notify_changed();
        Ok(())
    }

    pub fn clear_tx(tx: &Transaction, feed: &Feed) -> Result<(), CacheError> {
        Self::clear_on(tx, feed)
    }

    fn clear_on(conn: &rusqlite::Connection, feed: &Feed) -> Result<(), CacheError> {
        conn.execute(
            "DELETE FROM items WHERE kind = ?1 AND (?2 IS NULL OR author_id = ?2)",
            params![T::KIND.as_str(), feed.author_filter()],
        )?;
        Ok(())
    }

    /// Remove every row of this variant
    pub fn delete_all(&self) -> Result<(), CacheError> {
        {
            let conn = self.db.conn();
            conn.execute("DELETE FROM items WHERE kind = ?1", [T::KIND.as_str()])?;
        }
        self.db.notify_changed();
        Ok(())
    }

    fn ensure_supported(toggle: Toggle) -> Result<(), CacheError> {
        if T::TOGGLES.contains(&toggle) {
            Ok(())
        } else {
            Err(CacheError::UnsupportedToggle(format!(
                "{toggle:?} on {}",
                T::KIND.as_str()
            )))
        }
    }

    fn read_raw(row: &rusqlite::Row) -> Result<RawRow, rusqlite::Error> {
        Ok(RawRow {
            body_json: row.get(0)?,
            content: row.get(1)?,
            like_owner_ids: row.get(2)?,
            liked_by_me: row.get(3)?,
            likes: row.get(4)?,
            participants_ids: row.get(5)?,
            participated_by_me: row.get(6)?,
            participants: row.get(7)?,
            read: row.get(8)?,
        })
    }

    /// Rebuild the item from its JSON body, then overlay the mutable columns
    fn decode(raw: RawRow) -> Result<CachedItem<T>, CacheError> {
        let mut item: T = serde_json::from_str(&raw.body_json)?;
        item.set_content(raw.content);

        for &toggle in T::TOGGLES {
            let (owners, by_me, count) = match toggle {
                Toggle::Like => (&raw.like_owner_ids, raw.liked_by_me, raw.likes),
                Toggle::Participate => {
                    (&raw.participants_ids, raw.participated_by_me, raw.participants)
                }
            };
            item.set_toggle_state(
                toggle,
                ToggleState {
                    owner_ids: serde_json::from_str(owners)?,
                    by_me,
                    count: count.max(0) as u32,
                },
            );
        }

        Ok(CachedItem {
            item,
            read: raw.read,
        })
    }
}
