// SPDX-License-Identifier: MPL-2.0

mod db;
mod items;
mod remote_keys;
mod schema;
mod users;

pub use db::CacheDb;
pub use items::{Cacheable, CachedItem, ItemCache, Toggle, ToggleState};
pub use remote_keys::{RemoteKeyCache, RemoteKeyType};
pub use users::UserCache;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("not found")]
    NotFound,
    #[error("database path error: {0}")]
    Path(String),
    #[error("unsupported toggle: {0}")]
    UnsupportedToggle(String),
}
