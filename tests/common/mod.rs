// SPDX-License-Identifier: MPL-2.0

#![allow(dead_code)]

use nework::api::{Id, NeworkClient, Post};
use nework::cache::CacheDb;
use nework::state::{AppAuth, AppSettings};
use serde_json::{Value, json};
use std::sync::Arc;
use wiremock::MockServer;

pub const PAGE_SIZE: usize = 25;

pub fn settings_for(base: &str) -> AppSettings {
    let mut settings = AppSettings::with_base_url(format!("{base}/api/"));
    settings.page_size = PAGE_SIZE;
    settings.request_timeout_secs = 5;
    settings.api_key = Some("test-key".into());
    settings
}

pub struct Harness {
    pub settings: AppSettings,
    pub auth: AppAuth,
    pub client: Arc<NeworkClient>,
    pub db: CacheDb,
}

pub fn harness(base: &str) -> Harness {
    let settings = settings_for(base);
    let auth = AppAuth::in_memory();
    let client = Arc::new(NeworkClient::new(&settings, auth.clone()).unwrap());
    let db = CacheDb::open_in_memory().unwrap();
    Harness {
        settings,
        auth,
        client,
        db,
    }
}

pub fn server_harness(server: &MockServer) -> Harness {
    harness(&server.uri())
}

/// Base url nothing listens on
pub fn unreachable_base() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

pub fn post_json(id: Id) -> Value {
    json!({
        "id": id,
        "authorId": 1,
        "author": "Alice",
        "content": format!("post {id}"),
        "published": "2024-01-01T10:00:00Z",
        "likeOwnerIds": [],
        "likedByMe": false
    })
}

/// Posts for the given ids, in the order given
pub fn posts_json(ids: impl IntoIterator<Item = Id>) -> Value {
    Value::Array(ids.into_iter().map(post_json).collect())
}

pub fn post(id: Id, author_id: Id) -> Post {
    let mut post = Post::draft(format!("post {id}"));
    post.id = id;
    post.author_id = author_id;
    post.author = "Alice".into();
    post.published = "2024-01-01T10:00:00Z".into();
    post
}

pub fn event_json(id: Id, participants: &[Id], participated_by_me: bool) -> Value {
    json!({
        "id": id,
        "authorId": 2,
        "author": "Org",
        "content": "meetup",
        "datetime": "2024-06-01T18:00:00Z",
        "published": "2024-05-01T10:00:00Z",
        "type": "OFFLINE",
        "likeOwnerIds": [],
        "likedByMe": false,
        "speakerIds": [],
        "participantsIds": participants,
        "participatedByMe": participated_by_me
    })
}
