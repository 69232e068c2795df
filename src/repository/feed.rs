// SPDX-License-Identifier: MPL-2.0

use crate::api::{
    Attachment, AttachmentType, ClientError, Event, Feed, Id, MediaUpload, NeworkClient, Post,
    User,
};
use crate::cache::{CacheDb, CacheError, Cacheable, CachedItem, ItemCache, Toggle};
use crate::error::AppError;
use crate::repository::users::UserRepository;
use crate::state::{AppSettings, AuthState};
use crate::sync::{
    Pager, PagingConfig, PagingSnapshot, PollConfig, PollerHandle, RemoteMediator,
    spawn_newer_poller,
};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Set `owned_by_me` on every row from the current session
pub fn annotate<T: Cacheable>(items: &mut [CachedItem<T>], auth: &AuthState) {
    for row in items {
        let owned = auth.is_authenticated() && row.item.author_id() == auth.id;
        row.item.set_owned_by_me(owned);
    }
}

/// Repository for one feed of posts or events.
///
/// Mutations hit the local store first and are reconciled with the server
/// response; a failed request undoes the local change before the error is
/// returned.
pub struct FeedRepository<T> {
    client: Arc<NeworkClient>,
    db: CacheDb,
    feed: Feed,
    paging: PagingConfig,
    poll: PollConfig,
    _kind: PhantomData<T>,
}

impl<T: Cacheable> FeedRepository<T> {
    pub fn new(
        client: Arc<NeworkClient>,
        db: CacheDb,
        feed: Feed,
        settings: &AppSettings,
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
            paging: PagingConfig::new(settings.page_size.max(1)),
            poll: PollConfig {
                interval: settings.poll_interval(),
            },
            _kind: PhantomData,
        })
    }

    pub fn feed(&self) -> &Feed {
        &self.feed
    }

    /// Page stream over this feed, backed by the cache and the mediator
    pub fn pager(&self) -> Result<Pager<T>, AppError> {
        let mediator = RemoteMediator::new(
            self.client.clone(),
            self.db.clone(),
            self.feed,
            self.paging.page_size,
        )?;
        Ok(Pager::new(mediator, self.db.clone(), self.paging))
    }

    /// Follow a pager's snapshots, re-annotating ownership whenever either
    /// the page or the session changes.
    pub fn spawn_annotated(
        &self,
        mut pages: watch::Receiver<PagingSnapshot<T>>,
    ) -> watch::Receiver<PagingSnapshot<T>> {
        let mut auth = self.client.auth().subscribe();

        let mut initial = pages.borrow_and_update().clone();
        annotate(&mut initial.items, &auth.borrow_and_update());
        let (tx, rx) = watch::channel(initial);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = pages.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    changed = auth.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = tx.closed() => break,
                }

                let mut snapshot = pages.borrow_and_update().clone();
                let session = auth.borrow_and_update().clone();
                annotate(&mut snapshot.items, &session);
                tx.send_replace(snapshot);
            }
        });

        rx
    }

    pub async fn like(&self, item: &T) -> Result<T, AppError> {
        let snapshot = item
            .toggle_state(Toggle::Like)
            .is_some_and(|state| state.by_me);
        self.optimistic_toggle(item.id(), Toggle::Like, snapshot, |id, liked| async move {
            if liked {
                self.client.unlike::<T>(&self.feed, id).await
            } else {
                self.client.like::<T>(&self.feed, id).await
            }
        })
        .await
    }

    /// Flip the cached toggle, then send the request for the state it was
    /// flipped from. `snapshot` stands in for that state when the row is not
    /// cached.
    async fn optimistic_toggle<F, Fut>(
        &self,
        id: Id,
        toggle: Toggle,
        snapshot: bool,
        request: F,
    ) -> Result<T, AppError>
    where
        F: FnOnce(Id, bool) -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let cache = ItemCache::<T>::new(&self.db);
        let user_id = self.client.auth().my_id();

        let flipped = cache.toggle_by_id(id, toggle, user_id)?;
        let was_on = flipped.as_ref().map_or(snapshot, |next| !next.by_me);

        match request(id, was_on).await {
            Ok(updated) => {
                debug!(feed = %self.feed, id, ?toggle, "toggle confirmed");
                self.upsert(updated)
            }
            Err(e) => {
                warn!(feed = %self.feed, id, ?toggle, error = %e, "toggle failed, reverting");
                if flipped.is_some() {
                    cache.toggle_by_id(id, toggle, user_id)?;
                }
                Err(e.into())
            }
        }
    }

    /// Delete locally, then on the server. A failed request puts the row
    /// back as it was.
    pub async fn remove(&self, item: &T) -> Result<(), AppError> {
        let id = item.id();
        let cache = ItemCache::<T>::new(&self.db);
        let held = match cache.get(id) {
            Ok(row) => Some(row),
            Err(CacheError::NotFound) => None,
            Err(e) => return Err(e.into()),
        };

        cache.delete_by_id(id)?;

        if let Err(e) = self.client.remove(&self.feed, id).await {
            warn!(feed = %self.feed, id, error = %e, "remove failed, restoring");
            if let Some(row) = held {
                cache.store(&row.item, row.read)?;
            }
            return Err(e.into());
        }

        info!(feed = %self.feed, id, "item removed");
        Ok(())
    }

    /// Create or update on the server, then cache what it echoes back
    pub async fn save(&self, item: &T) -> Result<T, AppError> {
        let saved = self.client.save(&self.feed, item).await?;
        self.upsert(saved)
    }

    /// Upload the media first, attach its url, then save
    pub async fn save_with_attachment(
        &self,
        item: &T,
        upload: MediaUpload,
        kind: AttachmentType,
    ) -> Result<T, AppError> {
        let media = self.client.upload(upload).await?;
        let mut item = item.clone();
        item.set_attachment(Some(Attachment {
            url: media.url,
            kind,
        }));
        self.save(&item).await
    }

    pub async fn fetch_by_id(&self, id: Id) -> Result<T, AppError> {
        let item = self.client.get_by_id(&self.feed, id).await?;
        self.upsert(item)
    }

    /// Acknowledge every unread row of this feed
    pub fn mark_read(&self) -> Result<usize, AppError> {
        Ok(ItemCache::<T>::new(&self.db).mark_all_read(&self.feed)?)
    }

    /// Highest acknowledged id, 0 when nothing has been read
    pub fn latest_read_id(&self) -> Result<Id, AppError> {
        Ok(ItemCache::<T>::new(&self.db)
            .max_read_id(&self.feed)?
            .unwrap_or(0))
    }

    pub fn unread_count(&self) -> Result<usize, AppError> {
        Ok(ItemCache::<T>::new(&self.db).count_unread(&self.feed)?)
    }

    /// Start the newer-item poll. Each round counts items newer than the
    /// latest read id at that moment.
    pub fn newer_count(
        &self,
        update_tx: mpsc::Sender<Result<usize, AppError>>,
    ) -> Result<PollerHandle, AppError> {
        let since_id = self.latest_read_id()?;
        info!(feed = %self.feed, since_id, "starting newer poll");
        Ok(spawn_newer_poller::<T>(
            self.client.clone(),
            self.db.clone(),
            self.feed,
            self.poll,
            update_tx,
        ))
    }

    /// Users who liked the item
    pub async fn likers(&self, item: &T, users: &UserRepository) -> Result<Vec<User>, AppError> {
        let owners = item
            .toggle_state(Toggle::Like)
            .map(|state| state.owner_ids)
            .unwrap_or_default();
        users.users_by_ids(&owners).await
    }

    /// Insert or replace with the server copy, keeping the local read flag
    fn upsert(&self, mut item: T) -> Result<T, AppError> {
        item.recount();
        let session = self.client.auth().state();
        item.set_owned_by_me(session.is_authenticated() && item.author_id() == session.id);

        let cache = ItemCache::<T>::new(&self.db);
        let read = match cache.get(item.id()) {
            Ok(row) => row.read,
            Err(CacheError::NotFound) => true,
            Err(e) => return Err(e.into()),
        };
        cache.store(&item, read)?;
        Ok(item)
    }
}

impl FeedRepository<Post> {
    /// Users mentioned in the post
    pub async fn mentioned(
        &self,
        post: &Post,
        users: &UserRepository,
    ) -> Result<Vec<User>, AppError> {
        users.users_by_ids(&post.mention_ids).await
    }
}

impl FeedRepository<Event> {
    pub async fn participate(&self, event: &Event) -> Result<Event, AppError> {
        self.optimistic_toggle(
            event.id,
            Toggle::Participate,
            event.participated_by_me,
            |id, participating| async move {
                if participating {
                    self.client.unparticipate(id).await
                } else {
                    self.client.participate(id).await
                }
            },
        )
        .await
    }

    pub async fn participants(
        &self,
        event: &Event,
        users: &UserRepository,
    ) -> Result<Vec<User>, AppError> {
        users.users_by_ids(&event.participants_ids).await
    }

    pub async fn speakers(
        &self,
        event: &Event,
        users: &UserRepository,
    ) -> Result<Vec<User>, AppError> {
        users.users_by_ids(&event.speaker_ids).await
    }
}
