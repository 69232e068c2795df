// SPDX-License-Identifier: MPL-2.0

use nework::api::{Feed, NeworkClient, Post};
use nework::cache::CacheDb;
use nework::config::APP_NAME;
use nework::repository::FeedRepository;
use nework::state::{AppAuth, AppSettings};
use nework::sync::LoadState;
use nework::{AppError, logging};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    logging::init();

    if let Err(e) = run().await {
        error!(error = %e, "{APP_NAME} exited with an error");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let settings = AppSettings::load();
    let auth = AppAuth::load();
    info!(
        base_url = %settings.base_url,
        user = auth.my_id(),
        authenticated = auth.state().is_authenticated(),
        "starting {APP_NAME}"
    );

    let client = Arc::new(NeworkClient::new(&settings, auth.clone())?);
    let db = CacheDb::open(auth.my_id())?;
    let posts = FeedRepository::<Post>::new(client, db, Feed::Posts, &settings)?;

    let mut pager = posts.pager()?;
    if let LoadState::Error(e) = pager.refresh().await {
        warn!(error = %e, "refresh failed, showing cached posts");
    }
    for row in pager.snapshot().items {
        let post = row.item;
        println!(
            "#{} {} ({}) likes={}\n  {}",
            post.id,
            post.author,
            post.formatted_published(),
            post.likes,
            post.content
        );
    }

    let (update_tx, mut update_rx) = mpsc::channel(8);
    let poller = posts.newer_count(update_tx)?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            update = update_rx.recv() => match update {
                Some(Ok(count)) => info!(count, "newer posts available"),
                Some(Err(e)) => {
                    warn!(error = %e, "newer poll stopped");
                    break;
                }
                None => break,
            },
        }
    }

    poller.stop().await
}
