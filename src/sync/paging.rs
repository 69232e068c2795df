// SPDX-License-Identifier: MPL-2.0

use crate::api::Feed;
use crate::cache::{CacheDb, CacheError, Cacheable, CachedItem, ItemCache};
use crate::config::DEFAULT_PAGE_SIZE;
use crate::error::AppError;
use std::marker::PhantomData;
use std::sync::Arc;

/// Direction of a paging load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadType {
    Refresh,
    Prepend,
    Append,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagingConfig {
    /// Items requested per network page
    pub page_size: usize,
    /// Rows read from the cache for the first window
    pub initial_load_size: usize,
}

impl PagingConfig {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            initial_load_size: page_size,
        }
    }
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

/// Outcome of one mediator load
#[derive(Debug)]
pub enum MediatorResult {
    Success { end_of_pagination_reached: bool },
    Error(AppError),
}

impl MediatorResult {
    pub fn is_success(&self) -> bool {
        matches!(self, MediatorResult::Success { .. })
    }
}

/// Status of one load direction
#[derive(Debug, Clone)]
pub enum LoadState {
    NotLoading { end_of_pagination_reached: bool },
    Loading,
    Error(Arc<AppError>),
}

impl LoadState {
    pub fn idle() -> Self {
        LoadState::NotLoading {
            end_of_pagination_reached: false,
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(
            self,
            LoadState::NotLoading {
                end_of_pagination_reached: true
            }
        )
    }

    pub fn error(&self) -> Option<&AppError> {
        match self {
            LoadState::Error(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl Default for LoadState {
    fn default() -> Self {
        Self::idle()
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadStates {
    pub refresh: LoadState,
    pub prepend: LoadState,
    pub append: LoadState,
}

impl LoadStates {
    pub fn get(&self, load_type: LoadType) -> &LoadState {
        match load_type {
            LoadType::Refresh => &self.refresh,
            LoadType::Prepend => &self.prepend,
            LoadType::Append => &self.append,
        }
    }

    pub fn set(&mut self, load_type: LoadType, state: LoadState) {
        match load_type {
            LoadType::Refresh => self.refresh = state,
            LoadType::Prepend => self.prepend = state,
            LoadType::Append => self.append = state,
        }
    }
}

/// A window of cached rows keyed by row offset
#[derive(Debug)]
pub enum LoadResult<T> {
    Page {
        data: Vec<CachedItem<T>>,
        prev_key: Option<usize>,
        next_key: Option<usize>,
    },
    /// The store changed since this source was created; build a new one
    Invalid,
}

/// Pages a feed's rows out of the local store.
///
/// A source is bound to the store generation it was created at and reports
/// [`LoadResult::Invalid`] after any later write.
pub struct ItemPagingSource<T> {
    db: CacheDb,
    feed: Feed,
    generation: u64,
    _kind: PhantomData<T>,
}

impl<T: Cacheable> ItemPagingSource<T> {
    pub fn new(db: CacheDb, feed: Feed) -> Self {
        let generation = db.generation();
        Self {
            db,
            feed,
            generation,
            _kind: PhantomData,
        }
    }

    pub fn is_invalid(&self) -> bool {
        self.db.generation() != self.generation
    }

    /// Load `load_size` rows starting at `key` (offset 0 when `None`)
    pub fn load(&self, key: Option<usize>, load_size: usize) -> Result<LoadResult<T>, CacheError> {
        if self.is_invalid() {
            return Ok(LoadResult::Invalid);
        }

        let offset = key.unwrap_or(0);
        let data = ItemCache::<T>::new(&self.db).page(&self.feed, offset, load_size)?;

        let prev_key = (offset > 0).then(|| offset.saturating_sub(load_size));
        let next_key = (data.len() == load_size && load_size > 0).then(|| offset + data.len());

        Ok(LoadResult::Page {
            data,
            prev_key,
            next_key,
        })
    }
}
