// SPDX-License-Identifier: MPL-2.0

mod common;

use common::{PAGE_SIZE, post, posts_json, server_harness};
use nework::AppError;
use nework::api::{Feed, Id, Post};
use nework::cache::ItemCache;
use nework::repository::FeedRepository;
use nework::sync::{LoadState, Pager};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn window(pager: &Pager<Post>) -> Vec<Id> {
    pager.snapshot().items.iter().map(|row| row.item.id).collect()
}

async fn mount(server: &MockServer, route: &str, ids: impl IntoIterator<Item = Id>) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(posts_json(ids)))
        .mount(server)
        .await;
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.unwrap().len()
}

#[tokio::test]
async fn append_stops_at_end_of_pagination_until_refresh() {
    let server = MockServer::start().await;
    mount(&server, "/api/posts/latest", (76..=100).rev()).await;
    mount(&server, "/api/posts/76/after", (66..=75).rev()).await;

    let h = server_harness(&server);
    let repo = FeedRepository::<Post>::new(h.client, h.db, Feed::Posts, &h.settings).unwrap();
    let mut pager = repo.pager().unwrap();

    let state = pager.refresh().await;
    assert!(matches!(state, LoadState::NotLoading { .. }));
    assert_eq!(window(&pager), (76..=100).rev().collect::<Vec<_>>());
    assert!(!pager.snapshot().load_states.append.is_end());

    let state = pager.append().await;
    assert!(state.is_end());
    assert_eq!(window(&pager).len(), 35);
    assert_eq!(request_count(&server).await, 2);

    // gated: no further request
    assert!(pager.append().await.is_end());
    assert_eq!(request_count(&server).await, 2);

    // refresh clears the gate
    pager.refresh().await;
    assert!(!pager.snapshot().load_states.append.is_end());
    pager.append().await;
    assert_eq!(request_count(&server).await, 4);
}

#[tokio::test]
async fn prepend_grows_window_at_the_top() {
    let server = MockServer::start().await;
    mount(&server, "/api/posts/latest", (76..=100).rev()).await;
    mount(&server, "/api/posts/100/before", (101..=103).rev()).await;

    let h = server_harness(&server);
    let repo = FeedRepository::<Post>::new(h.client, h.db, Feed::Posts, &h.settings).unwrap();
    let mut pager = repo.pager().unwrap();
    pager.refresh().await;

    let state = pager.prepend().await;
    assert!(state.is_end());
    let ids = window(&pager);
    assert_eq!(ids.len(), 28);
    assert_eq!(&ids[..4], &[103, 102, 101, 100]);

    // gated until the next refresh
    pager.prepend().await;
    assert_eq!(request_count(&server).await, 2);
}

#[tokio::test]
async fn cached_rows_are_served_before_the_network() {
    let server = MockServer::start().await;
    let h = server_harness(&server);
    let posts: Vec<Post> = (1..=30).map(|id| post(id, 1)).collect();
    ItemCache::new(&h.db).store_batch(&posts, true).unwrap();

    let repo =
        FeedRepository::<Post>::new(h.client, h.db.clone(), Feed::Posts, &h.settings).unwrap();
    let mut pager = repo.pager().unwrap();
    pager.load_cached().unwrap();
    assert_eq!(window(&pager).len(), PAGE_SIZE);

    pager.append().await;
    assert_eq!(window(&pager).len(), 30);
    assert_eq!(request_count(&server).await, 0);
}

#[tokio::test]
async fn failed_refresh_keeps_cache_and_retry_recovers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/posts/latest"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let h = server_harness(&server);
    ItemCache::new(&h.db).store(&post(1, 1), true).unwrap();
    let repo =
        FeedRepository::<Post>::new(h.client, h.db.clone(), Feed::Posts, &h.settings).unwrap();
    let mut pager = repo.pager().unwrap();

    let state = pager.refresh().await;
    let err = state.error().expect("refresh should fail");
    assert!(!err.is_retryable());
    assert_eq!(window(&pager), vec![1]);
    assert!(pager.snapshot().load_states.refresh.error().is_some());

    server.reset().await;
    mount(&server, "/api/posts/latest", (1..=3).rev()).await;

    let state = pager.retry().await.expect("a failed load to retry");
    assert!(state.error().is_none());
    assert_eq!(window(&pager), vec![3, 2, 1]);
    assert!(pager.retry().await.is_none());
}

#[tokio::test]
async fn subscribers_see_published_pages() {
    let server = MockServer::start().await;
    mount(&server, "/api/posts/latest", (1..=2).rev()).await;

    let h = server_harness(&server);
    let repo = FeedRepository::<Post>::new(h.client, h.db, Feed::Posts, &h.settings).unwrap();
    let mut pager = repo.pager().unwrap();
    let mut rx = pager.subscribe();

    pager.refresh().await;
    assert!(rx.has_changed().unwrap());
    let snapshot = rx.borrow_and_update().clone();
    assert_eq!(snapshot.items.len(), 2);
    assert!(matches!(
        snapshot.load_states.refresh,
        LoadState::NotLoading { .. }
    ));
}

#[tokio::test]
async fn reload_picks_up_outside_writes() {
    let server = MockServer::start().await;
    mount(&server, "/api/posts/latest", (1..=2).rev()).await;

    let h = server_harness(&server);
    let repo =
        FeedRepository::<Post>::new(h.client, h.db.clone(), Feed::Posts, &h.settings).unwrap();
    let mut pager = repo.pager().unwrap();
    pager.refresh().await;
    assert!(!pager.reload_if_invalid().unwrap());

    ItemCache::new(&h.db).store(&post(3, 1), false).unwrap();
    assert!(pager.reload_if_invalid().unwrap());
    assert_eq!(window(&pager), vec![3, 2, 1]);
}

#[tokio::test]
async fn append_reports_cache_failure_past_the_end() {
    let server = MockServer::start().await;
    mount(&server, "/api/posts/latest", (1..=10).rev()).await;

    let h = server_harness(&server);
    let repo =
        FeedRepository::<Post>::new(h.client, h.db.clone(), Feed::Posts, &h.settings).unwrap();
    let mut pager = repo.pager().unwrap();
    assert!(pager.refresh().await.is_end());

    h.db.conn().execute("DROP TABLE items", []).unwrap();

    let state = pager.append().await;
    assert!(
        matches!(state.error(), Some(AppError::Cache(_))),
        "got {state:?}"
    );
    assert_eq!(request_count(&server).await, 1);
}
