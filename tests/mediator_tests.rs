// SPDX-License-Identifier: MPL-2.0

mod common;

use common::{PAGE_SIZE, harness, post, posts_json, server_harness, unreachable_base};
use nework::AppError;
use nework::api::{Feed, Id, Post};
use nework::cache::{ItemCache, RemoteKeyCache, RemoteKeyType};
use nework::sync::{LoadType, MediatorResult, RemoteMediator};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn ids(db: &nework::cache::CacheDb, feed: &Feed) -> Vec<Id> {
    ItemCache::<Post>::new(db)
        .page(feed, 0, 1000)
        .unwrap()
        .into_iter()
        .map(|row| row.item.id)
        .collect()
}

async fn mount_latest(server: &MockServer, ids: impl IntoIterator<Item = Id>) {
    Mock::given(method("GET"))
        .and(path("/api/posts/latest"))
        .and(query_param("count", PAGE_SIZE.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(posts_json(ids)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn refresh_replaces_feed_and_sets_both_keys() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/posts/latest"))
        .and(header("Api-Key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(posts_json((76..=100).rev())))
        .mount(&server)
        .await;

    let h = server_harness(&server);
    // stale row that the refresh must drop
    ItemCache::new(&h.db).store(&post(5, 1), true).unwrap();

    let mediator = RemoteMediator::<Post>::new(h.client, h.db.clone(), Feed::Posts, PAGE_SIZE)
        .unwrap();
    let result = mediator.load(LoadType::Refresh).await;
    assert!(matches!(
        result,
        MediatorResult::Success {
            end_of_pagination_reached: false
        }
    ));

    assert_eq!(ids(&h.db, &Feed::Posts), (76..=100).rev().collect::<Vec<_>>());
    let keys = RemoteKeyCache::new(&h.db);
    assert_eq!(keys.get(&Feed::Posts, RemoteKeyType::Before).unwrap(), Some(100));
    assert_eq!(keys.get(&Feed::Posts, RemoteKeyType::After).unwrap(), Some(76));
    assert_eq!(ItemCache::<Post>::new(&h.db).count_unread(&Feed::Posts).unwrap(), 0);
}

#[tokio::test]
async fn append_continues_from_after_key() {
    let server = MockServer::start().await;
    mount_latest(&server, (76..=100).rev()).await;
    Mock::given(method("GET"))
        .and(path("/api/posts/76/after"))
        .respond_with(ResponseTemplate::new(200).set_body_json(posts_json((51..=75).rev())))
        .mount(&server)
        .await;

    let h = server_harness(&server);
    let mediator = RemoteMediator::<Post>::new(h.client, h.db.clone(), Feed::Posts, PAGE_SIZE)
        .unwrap();
    assert!(mediator.load(LoadType::Refresh).await.is_success());

    let result = mediator.load(LoadType::Append).await;
    assert!(matches!(
        result,
        MediatorResult::Success {
            end_of_pagination_reached: false
        }
    ));

    assert_eq!(ids(&h.db, &Feed::Posts), (51..=100).rev().collect::<Vec<_>>());
    let keys = RemoteKeyCache::new(&h.db);
    assert_eq!(keys.get(&Feed::Posts, RemoteKeyType::After).unwrap(), Some(51));
    assert_eq!(keys.get(&Feed::Posts, RemoteKeyType::Before).unwrap(), Some(100));
}

#[tokio::test]
async fn prepend_moves_only_before_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/posts/30/before"))
        .and(query_param("count", PAGE_SIZE.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(posts_json((31..=35).rev())))
        .mount(&server)
        .await;

    let h = server_harness(&server);
    ItemCache::new(&h.db).store(&post(30, 1), true).unwrap();
    let keys = RemoteKeyCache::new(&h.db);
    keys.set(&Feed::Posts, RemoteKeyType::Before, 30).unwrap();
    keys.set(&Feed::Posts, RemoteKeyType::After, 30).unwrap();

    let mediator = RemoteMediator::<Post>::new(h.client, h.db.clone(), Feed::Posts, PAGE_SIZE)
        .unwrap();
    let result = mediator.load(LoadType::Prepend).await;
    assert!(matches!(
        result,
        MediatorResult::Success {
            end_of_pagination_reached: true
        }
    ));

    assert_eq!(keys.get(&Feed::Posts, RemoteKeyType::Before).unwrap(), Some(35));
    assert_eq!(keys.get(&Feed::Posts, RemoteKeyType::After).unwrap(), Some(30));
    assert_eq!(ids(&h.db, &Feed::Posts), vec![35, 34, 33, 32, 31, 30]);
}

#[tokio::test]
async fn prepend_keeps_polled_rows_unread() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/posts/30/before"))
        .respond_with(ResponseTemplate::new(200).set_body_json(posts_json((31..=33).rev())))
        .mount(&server)
        .await;

    let h = server_harness(&server);
    let cache = ItemCache::new(&h.db);
    cache.store(&post(30, 1), true).unwrap();
    // stored by the newer-item poll, not yet acknowledged
    cache.store(&post(32, 1), false).unwrap();
    RemoteKeyCache::new(&h.db)
        .set(&Feed::Posts, RemoteKeyType::Before, 30)
        .unwrap();

    let mediator = RemoteMediator::<Post>::new(h.client, h.db.clone(), Feed::Posts, PAGE_SIZE)
        .unwrap();
    assert!(mediator.load(LoadType::Prepend).await.is_success());

    let cache = ItemCache::<Post>::new(&h.db);
    assert!(!cache.get(32).unwrap().read);
    assert!(cache.get(31).unwrap().read);
    assert!(cache.get(33).unwrap().read);
    assert_eq!(cache.count_unread(&Feed::Posts).unwrap(), 1);
}

#[tokio::test]
async fn prepend_without_before_key_does_not_fetch() {
    let server = MockServer::start().await;
    let h = server_harness(&server);
    let mediator = RemoteMediator::<Post>::new(h.client, h.db.clone(), Feed::Posts, PAGE_SIZE)
        .unwrap();

    let result = mediator.load(LoadType::Prepend).await;
    assert!(matches!(
        result,
        MediatorResult::Success {
            end_of_pagination_reached: true
        }
    ));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn append_on_empty_feed_refreshes() {
    let server = MockServer::start().await;
    mount_latest(&server, (1..=10).rev()).await;

    let h = server_harness(&server);
    let mediator = RemoteMediator::<Post>::new(h.client, h.db.clone(), Feed::Posts, PAGE_SIZE)
        .unwrap();

    let result = mediator.load(LoadType::Append).await;
    assert!(matches!(
        result,
        MediatorResult::Success {
            end_of_pagination_reached: true
        }
    ));
    let keys = RemoteKeyCache::new(&h.db);
    assert_eq!(keys.get(&Feed::Posts, RemoteKeyType::Before).unwrap(), Some(10));
    assert_eq!(keys.get(&Feed::Posts, RemoteKeyType::After).unwrap(), Some(1));
}

#[tokio::test]
async fn empty_refresh_clears_keys() {
    let server = MockServer::start().await;
    mount_latest(&server, std::iter::empty()).await;

    let h = server_harness(&server);
    ItemCache::new(&h.db).store(&post(9, 1), true).unwrap();
    RemoteKeyCache::new(&h.db)
        .set(&Feed::Posts, RemoteKeyType::Before, 9)
        .unwrap();

    let mediator = RemoteMediator::<Post>::new(h.client, h.db.clone(), Feed::Posts, PAGE_SIZE)
        .unwrap();
    assert!(mediator.load(LoadType::Refresh).await.is_success());

    assert!(ids(&h.db, &Feed::Posts).is_empty());
    assert_eq!(
        RemoteKeyCache::new(&h.db)
            .get(&Feed::Posts, RemoteKeyType::Before)
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn server_error_leaves_cache_untouched() {
    let server = MockServer::start().await;
    mount_latest(&server, (76..=100).rev()).await;

    let h = server_harness(&server);
    let mediator = RemoteMediator::<Post>::new(h.client, h.db.clone(), Feed::Posts, PAGE_SIZE)
        .unwrap();
    assert!(mediator.load(LoadType::Refresh).await.is_success());

    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/api/posts/76/after"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    match mediator.load(LoadType::Append).await {
        MediatorResult::Error(AppError::Api { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "boom");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(ids(&h.db, &Feed::Posts).len(), 25);
    assert_eq!(
        RemoteKeyCache::new(&h.db)
            .get(&Feed::Posts, RemoteKeyType::After)
            .unwrap(),
        Some(76)
    );
}

#[tokio::test]
async fn unreachable_server_is_retryable() {
    let h = harness(&unreachable_base());
    let mediator = RemoteMediator::<Post>::new(h.client, h.db.clone(), Feed::Posts, PAGE_SIZE)
        .unwrap();

    match mediator.load(LoadType::Refresh).await {
        MediatorResult::Error(e) => assert!(e.is_retryable(), "got {e:?}"),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn wall_refresh_keeps_other_authors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/7/wall/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let h = server_harness(&server);
    let cache = ItemCache::new(&h.db);
    cache.store_batch(&[post(1, 7), post(2, 8)], true).unwrap();

    let wall = Feed::Wall { author_id: 7 };
    let mediator =
        RemoteMediator::<Post>::new(h.client, h.db.clone(), wall, PAGE_SIZE).unwrap();
    assert!(mediator.load(LoadType::Refresh).await.is_success());

    assert!(ids(&h.db, &wall).is_empty());
    assert_eq!(ids(&h.db, &Feed::Posts), vec![2]);
}
