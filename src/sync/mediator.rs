// SPDX-License-Identifier: MPL-2.0

use crate::api::{Feed, Id, NeworkClient};
use crate::cache::{CacheDb, CacheError, Cacheable, ItemCache, RemoteKeyCache, RemoteKeyType};
use crate::error::AppError;
use crate::sync::paging::{LoadType, MediatorResult};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Fetches feed pages on demand and merges them into the local store.
///
/// Every applied page and the remote keys bounding it are written in one
/// transaction, so a failed load leaves the cache as it was.
pub struct RemoteMediator<T> {
    client: Arc<NeworkClient>,
    db: CacheDb,
    feed: Feed,
    page_size: usize,
    _kind: PhantomData<T>,
}

impl<T: Cacheable> RemoteMediator<T> {
    pub fn new(
        client: Arc<NeworkClient>,
        db: CacheDb,
        feed: Feed,
        page_size: usize,
    ) -> Result<Self, AppError> {
        if feed.item_kind() != T::KIND {
            return Err(AppError::Unknown(format!(
                "feed {feed} does not hold {} items",
                T::KIND.as_str()
            )));
        }
        Ok(Self {
            client,
            db,
            feed,
            page_size: page_size.max(1),
            _kind: PhantomData,
        })
    }

    pub fn feed(&self) -> &Feed {
        &self.feed
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub async fn load(&self, load_type: LoadType) -> MediatorResult {
        match self.try_load(load_type).await {
            Ok(end_of_pagination_reached) => MediatorResult::Success {
                end_of_pagination_reached,
            },
            Err(e) => {
                warn!(feed = %self.feed, ?load_type, error = %e, "mediator load failed");
                MediatorResult::Error(e)
            }
        }
    }

    async fn try_load(&self, load_type: LoadType) -> Result<bool, AppError> {
        let (applied_as, page) = match load_type {
            LoadType::Refresh => (LoadType::Refresh, self.fetch_latest().await?),
            LoadType::Prepend => {
                let Some(before) = self.remote_key(RemoteKeyType::Before)? else {
                    debug!(feed = %self.feed, "no BEFORE key, nothing to prepend");
                    return Ok(true);
                };
                let page = self
                    .client
                    .before(&self.feed, before, self.page_size)
                    .await?;
                (LoadType::Prepend, page)
            }
            LoadType::Append => {
                let after = if ItemCache::<T>::new(&self.db).is_empty(&self.feed)? {
                    None
                } else {
                    self.remote_key(RemoteKeyType::After)?
                };
                match after {
                    Some(after) => {
                        let page = self.client.after(&self.feed, after, self.page_size).await?;
                        (LoadType::Append, page)
                    }
                    None => {
                        debug!(feed = %self.feed, "nothing to append to, refreshing instead");
                        (LoadType::Refresh, self.fetch_latest().await?)
                    }
                }
            }
        };

        self.apply(applied_as, &page)?;

        let end = page.len() < self.page_size;
        info!(
            feed = %self.feed,
            ?load_type,
            count = page.len(),
            end_of_pagination = end,
            "page applied"
        );
        Ok(end)
    }

    async fn fetch_latest(&self) -> Result<Vec<T>, AppError> {
        Ok(self.client.latest(&self.feed, self.page_size).await?)
    }

    fn remote_key(&self, key_type: RemoteKeyType) -> Result<Option<Id>, CacheError> {
        RemoteKeyCache::new(&self.db).get(&self.feed, key_type)
    }

    fn apply(&self, load_type: LoadType, page: &[T]) -> Result<(), CacheError> {
        let newest = page.iter().map(|item| item.id()).max();
        let oldest = page.iter().map(|item| item.id()).min();

        {
            let mut conn = self.db.conn();
            let tx = conn.transaction()?;

            match load_type {
                LoadType::Refresh => {
                    ItemCache::<T>::clear_tx(&tx, &self.feed)?;
                    RemoteKeyCache::clear_tx(&tx, &self.feed)?;
                    if let (Some(newest), Some(oldest)) = (newest, oldest) {
                        RemoteKeyCache::set_tx(&tx, &self.feed, RemoteKeyType::Before, newest)?;
                        RemoteKeyCache::set_tx(&tx, &self.feed, RemoteKeyType::After, oldest)?;
                    }
                }
                LoadType::Prepend => {
                    if let Some(newest) = newest {
                        RemoteKeyCache::set_tx(&tx, &self.feed, RemoteKeyType::Before, newest)?;
                    }
                }
                LoadType::Append => {
                    if let Some(oldest) = oldest {
                        RemoteKeyCache::set_tx(&tx, &self.feed, RemoteKeyType::After, oldest)?;
                    }
                }
            }

            match load_type {
                LoadType::Refresh => ItemCache::<T>::store_batch_tx(&tx, page, true)?,
                // rows the poll stored stay unread until acknowledged
                LoadType::Prepend | LoadType::Append => {
                    ItemCache::<T>::merge_batch_tx(&tx, page, true)?
                }
            }
            tx.commit()?;
        }

        self.db.notify_changed();
        Ok(())
    }
}
