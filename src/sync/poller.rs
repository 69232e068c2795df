// SPDX-License-Identifier: MPL-2.0

use crate::api::{Feed, Id, NeworkClient};
use crate::cache::{CacheDb, Cacheable, ItemCache};
use crate::config::DEFAULT_POLL_INTERVAL_SECS;
use crate::error::AppError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }
}

pub struct PollerHandle {
    cancel_tx: broadcast::Sender<()>,
    join: JoinHandle<()>,
}

impl PollerHandle {
    pub async fn stop(self) -> Result<(), AppError> {
        let _ = self.cancel_tx.send(());
        self.join
            .await
            .map_err(|e| AppError::Unknown(format!("poller task failed: {e}")))
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// Fetch everything newer than `since_id` once and store it unread. Rows
/// already cached keep their read flag. Returns how many items the server
/// reported.
pub async fn poll_newer_once<T: Cacheable>(
    client: &NeworkClient,
    db: &CacheDb,
    feed: &Feed,
    since_id: Id,
) -> Result<usize, AppError> {
    let items: Vec<T> = client.newer(feed, since_id).await?;
    if !items.is_empty() {
        ItemCache::<T>::new(db).merge_batch(&items, false)?;
    }
    debug!(%feed, since_id, count = items.len(), "newer items polled");
    Ok(items.len())
}

/// One poll round anchored at the highest acknowledged id (0 when none)
pub async fn poll_newer_than_read<T: Cacheable>(
    client: &NeworkClient,
    db: &CacheDb,
    feed: &Feed,
) -> Result<usize, AppError> {
    let since_id = ItemCache::<T>::new(db).max_read_id(feed)?.unwrap_or(0);
    poll_newer_once::<T>(client, db, feed, since_id).await
}

/// Poll for items newer than the latest read one every `config.interval`,
/// sending the count after each round. The anchor is read again before
/// every round, so acknowledged rows are not reported twice. The first
/// error is sent and ends the loop; so do dropping the receiver and
/// [`PollerHandle::stop`].
pub fn spawn_newer_poller<T: Cacheable>(
    client: Arc<NeworkClient>,
    db: CacheDb,
    feed: Feed,
    config: PollConfig,
    update_tx: mpsc::Sender<Result<usize, AppError>>,
) -> PollerHandle {
    let (cancel_tx, mut cancel_rx) = broadcast::channel(1);
    let join = tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + config.interval, config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel_rx.recv() => {
                    info!(%feed, "newer poll shutdown requested");
                    break;
                }
                _ = update_tx.closed() => {
                    debug!(%feed, "newer poll receiver dropped");
                    break;
                }
                _ = ticker.tick() => {
                    let result = poll_newer_than_read::<T>(&client, &db, &feed).await;
                    let failed = result.is_err();
                    if let Err(err) = &result {
                        warn!(%feed, error = %err, "newer poll failed");
                    }
                    if update_tx.send(result).await.is_err() || failed {
                        break;
                    }
                }
            }
        }
    });

    PollerHandle { cancel_tx, join }
}
