// SPDX-License-Identifier: MPL-2.0

use crate::api::Feed;
use crate::cache::{CacheDb, CacheError, Cacheable, CachedItem, ItemCache};
use crate::error::AppError;
use crate::sync::mediator::RemoteMediator;
use crate::sync::paging::{
    ItemPagingSource, LoadResult, LoadState, LoadStates, LoadType, MediatorResult, PagingConfig,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

/// What a page stream subscriber sees
#[derive(Debug, Clone)]
pub struct PagingSnapshot<T> {
    pub items: Vec<CachedItem<T>>,
    pub load_states: LoadStates,
}

impl<T> Default for PagingSnapshot<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            load_states: LoadStates::default(),
        }
    }
}

/// Drives one feed: cache-backed window plus mediator loads at its edges.
///
/// Methods take `&mut self`, so a pager never runs two loads at once.
pub struct Pager<T: Cacheable> {
    mediator: RemoteMediator<T>,
    db: CacheDb,
    feed: Feed,
    config: PagingConfig,
    source: ItemPagingSource<T>,
    items: Vec<CachedItem<T>>,
    states: LoadStates,
    prepend_end: bool,
    append_end: bool,
    last_failed: Option<LoadType>,
    tx: watch::Sender<PagingSnapshot<T>>,
}

impl<T: Cacheable> Pager<T> {
    pub fn new(mediator: RemoteMediator<T>, db: CacheDb, config: PagingConfig) -> Self {
        let feed = *mediator.feed();
        let (tx, _) = watch::channel(PagingSnapshot::default());
        Self {
            source: ItemPagingSource::new(db.clone(), feed),
            mediator,
            db,
            feed,
            config,
            items: Vec::new(),
            states: LoadStates::default(),
            prepend_end: false,
            append_end: false,
            last_failed: None,
            tx,
        }
    }

    pub fn feed(&self) -> &Feed {
        &self.feed
    }

    pub fn snapshot(&self) -> PagingSnapshot<T> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PagingSnapshot<T>> {
        self.tx.subscribe()
    }

    /// Show whatever the cache already holds without touching the network
    pub fn load_cached(&mut self) -> Result<(), AppError> {
        self.reload(self.items.len().max(self.config.initial_load_size))?;
        self.publish();
        Ok(())
    }

    /// Reload the window if the store changed underneath it
    pub fn reload_if_invalid(&mut self) -> Result<bool, AppError> {
        if !self.source.is_invalid() {
            return Ok(false);
        }
        self.load_cached()?;
        Ok(true)
    }

    /// Replace the feed with its latest page. Clears end-of-pagination in
    /// both directions.
    pub async fn refresh(&mut self) -> LoadState {
        self.prepend_end = false;
        self.append_end = false;
        self.run(LoadType::Refresh).await
    }

    /// Extend the window towards older items. Rows already cached are
    /// served first; the network is asked only once they run out.
    pub async fn append(&mut self) -> LoadState {
        match self.extend_from_cache() {
            Ok(true) => return self.states.append.clone(),
            Ok(false) => {}
            Err(e) => return self.fail(LoadType::Append, e),
        }
        if self.append_end {
            debug!(feed = %self.feed, "append skipped, end of pagination");
            return self.states.append.clone();
        }
        self.run(LoadType::Append).await
    }

    /// Pull items newer than the top of the window
    pub async fn prepend(&mut self) -> LoadState {
        if self.prepend_end {
            debug!(feed = %self.feed, "prepend skipped, end of pagination");
            return self.states.prepend.clone();
        }
        self.run(LoadType::Prepend).await
    }

    /// Re-issue the most recent failed load
    pub async fn retry(&mut self) -> Option<LoadState> {
        let load_type = self.last_failed?;
        Some(match load_type {
            LoadType::Refresh => self.refresh().await,
            LoadType::Prepend => self.prepend().await,
            LoadType::Append => self.append().await,
        })
    }

    async fn run(&mut self, load_type: LoadType) -> LoadState {
        self.states.set(load_type, LoadState::Loading);
        self.publish();

        let before = match self.row_count() {
            Ok(count) => count,
            Err(e) => return self.fail(load_type, e),
        };

        match self.mediator.load(load_type).await {
            MediatorResult::Success {
                end_of_pagination_reached,
            } => {
                let window = match load_type {
                    LoadType::Refresh => self.config.initial_load_size,
                    LoadType::Prepend | LoadType::Append => {
                        let after = match self.row_count() {
                            Ok(count) => count,
                            Err(e) => return self.fail(load_type, e),
                        };
                        self.items.len() + after.saturating_sub(before)
                    }
                };
                if let Err(e) = self.reload(window) {
                    return self.fail(load_type, e);
                }

                let end = LoadState::NotLoading {
                    end_of_pagination_reached,
                };
                match load_type {
                    LoadType::Refresh => {
                        self.append_end = end_of_pagination_reached;
                        self.states.refresh = LoadState::idle();
                        self.states.prepend = LoadState::idle();
                        self.states.append = end;
                    }
                    LoadType::Prepend => {
                        self.prepend_end = end_of_pagination_reached;
                        self.states.prepend = end;
                    }
                    LoadType::Append => {
                        self.append_end = end_of_pagination_reached;
                        self.states.append = end;
                    }
                }
                self.last_failed = None;
                self.publish();
                self.states.get(load_type).clone()
            }
            MediatorResult::Error(e) => {
                // the cached rows stay visible on failure
                if load_type == LoadType::Refresh {
                    let window = self.items.len().max(self.config.initial_load_size);
                    if let Err(cache_err) = self.reload(window) {
                        warn!(feed = %self.feed, error = %cache_err, "failed to reload cached rows");
                    }
                }
                self.fail(load_type, e)
            }
        }
    }

    fn fail(&mut self, load_type: LoadType, e: impl Into<AppError>) -> LoadState {
        let state = LoadState::Error(Arc::new(e.into()));
        self.last_failed = Some(load_type);
        self.states.set(load_type, state.clone());
        self.publish();
        state
    }

    fn row_count(&self) -> Result<usize, CacheError> {
        ItemCache::<T>::new(&self.db).count(&self.feed)
    }

    fn has_more_cached(&self) -> Result<bool, CacheError> {
        Ok(self.row_count()? > self.items.len())
    }

    /// Page further into rows the cache already has. Returns whether the
    /// window grew.
    fn extend_from_cache(&mut self) -> Result<bool, CacheError> {
        if !self.has_more_cached()? {
            return Ok(false);
        }
        let offset = self.items.len();
        match self.source.load(Some(offset), self.config.page_size)? {
            LoadResult::Page { data, .. } => self.items.extend(data),
            LoadResult::Invalid => self.reload(offset + self.config.page_size)?,
        }
        self.publish();
        Ok(self.items.len() > offset)
    }

    /// Build a fresh source and read the first `window` rows from it
    fn reload(&mut self, window: usize) -> Result<(), CacheError> {
        self.source = ItemPagingSource::new(self.db.clone(), self.feed);
        self.items = match self.source.load(None, window)? {
            LoadResult::Page { data, .. } => data,
            LoadResult::Invalid => Vec::new(),
        };
        Ok(())
    }

    fn publish(&self) {
        self.tx.send_replace(PagingSnapshot {
            items: self.items.clone(),
            load_states: self.states.clone(),
        });
    }
}
