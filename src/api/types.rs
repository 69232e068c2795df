// SPDX-License-Identifier: MPL-2.0

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Server-assigned numeric identifier shared by every feed item.
pub type Id = i64;

/// Token pair returned by the authentication and registration endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    pub id: Id,
    pub token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coords {
    pub lat: f64,
    pub long: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttachmentType {
    Image,
    Video,
    Audio,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: AttachmentType,
}

/// Result of a media upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub url: String,
}

/// A file to be sent to the media endpoint
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreview {
    pub name: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Id,
    pub author_id: Id,
    pub author: String,
    #[serde(default)]
    pub author_job: Option<String>,
    #[serde(default)]
    pub author_avatar: Option<String>,
    #[serde(default)]
    pub coords: Option<Coords>,
    pub content: String,
    pub published: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub mention_ids: Vec<Id>,
    #[serde(default)]
    pub mentioned_me: bool,
    #[serde(default)]
    pub like_owner_ids: Vec<Id>,
    #[serde(default)]
    pub liked_by_me: bool,
    #[serde(default)]
    pub attachment: Option<Attachment>,
    #[serde(default)]
    pub users: HashMap<String, UserPreview>,
    /// Computed locally from the session, never sent by the server
    #[serde(default, skip_serializing)]
    pub owned_by_me: bool,
    /// Local like counter, seeded from `like_owner_ids`
    #[serde(default, skip_serializing)]
    pub likes: u32,
}

impl Post {
    /// Draft for a new post; the server assigns id, author and timestamp.
    pub fn draft(content: impl Into<String>) -> Self {
        Self {
            id: 0,
            author_id: 0,
            author: String::new(),
            author_job: None,
            author_avatar: None,
            coords: None,
            content: content.into(),
            published: String::new(),
            link: None,
            mention_ids: Vec::new(),
            mentioned_me: false,
            like_owner_ids: Vec::new(),
            liked_by_me: false,
            attachment: None,
            users: HashMap::new(),
            owned_by_me: false,
            likes: 0,
        }
    }

    /// Publication time as `dd.MM.yyyy HH:mm` in local time, or the raw
    /// string when the server value does not parse.
    pub fn formatted_published(&self) -> String {
        format_timestamp(&self.published)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Online,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Id,
    pub author_id: Id,
    pub author: String,
    #[serde(default)]
    pub author_job: Option<String>,
    #[serde(default)]
    pub author_avatar: Option<String>,
    pub content: String,
    pub datetime: String,
    pub published: String,
    #[serde(default)]
    pub coords: Option<Coords>,
    #[serde(rename = "type")]
    pub kind: EventType,
    #[serde(default)]
    pub like_owner_ids: Vec<Id>,
    #[serde(default)]
    pub liked_by_me: bool,
    #[serde(default)]
    pub speaker_ids: Vec<Id>,
    #[serde(default)]
    pub participants_ids: Vec<Id>,
    #[serde(default)]
    pub participated_by_me: bool,
    #[serde(default)]
    pub attachment: Option<Attachment>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub users: HashMap<String, UserPreview>,
    #[serde(default, skip_serializing)]
    pub owned_by_me: bool,
    #[serde(default, skip_serializing)]
    pub likes: u32,
    #[serde(default, skip_serializing)]
    pub participants: u32,
}

impl Event {
    pub fn formatted_published(&self) -> String {
        format_timestamp(&self.published)
    }

    pub fn formatted_datetime(&self) -> String {
        format_timestamp(&self.datetime)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: Id,
    pub name: String,
    pub position: String,
    pub start: String,
    #[serde(default)]
    pub finish: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default, skip_serializing)]
    pub user_id: Id,
    #[serde(default, skip_serializing)]
    pub owned_by_me: bool,
}

impl Job {
    /// A job without a finish date is the user's current one
    pub fn is_current(&self) -> bool {
        self.finish.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Id,
    pub login: String,
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl User {
    /// Single-letter fallback shown when the user has no avatar
    pub fn initial(&self) -> Option<char> {
        self.name.chars().next()
    }
}

/// Anything that can appear in a scrollable list.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedItem {
    Post(Post),
    Event(Event),
    Job(Job),
    User(User),
}

impl FeedItem {
    pub fn id(&self) -> Id {
        match self {
            FeedItem::Post(p) => p.id,
            FeedItem::Event(e) => e.id,
            FeedItem::Job(j) => j.id,
            FeedItem::User(u) => u.id,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            FeedItem::Post(_) => "post",
            FeedItem::Event(_) => "event",
            FeedItem::Job(_) => "job",
            FeedItem::User(_) => "user",
        }
    }

    /// Whether the item was authored by (or belongs to) `user_id`
    pub fn is_owned_by(&self, user_id: Id) -> bool {
        if user_id == 0 {
            return false;
        }
        match self {
            FeedItem::Post(p) => p.author_id == user_id,
            FeedItem::Event(e) => e.author_id == user_id,
            FeedItem::Job(j) => j.user_id == user_id,
            FeedItem::User(u) => u.id == user_id,
        }
    }
}

impl From<Post> for FeedItem {
    fn from(post: Post) -> Self {
        FeedItem::Post(post)
    }
}

impl From<Event> for FeedItem {
    fn from(event: Event) -> Self {
        FeedItem::Event(event)
    }
}

impl From<Job> for FeedItem {
    fn from(job: Job) -> Self {
        FeedItem::Job(job)
    }
}

impl From<User> for FeedItem {
    fn from(user: User) -> Self {
        FeedItem::User(user)
    }
}

fn format_timestamp(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => ts
            .with_timezone(&Local)
            .format("%d.%m.%Y %H:%M")
            .to_string(),
        Err(_) => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_deserializes_with_missing_optionals() {
        let json = r#"{
            "id": 7,
            "authorId": 3,
            "author": "Ann",
            "content": "hello",
            "published": "2024-05-01T10:00:00Z",
            "likeOwnerIds": [1, 2]
        }"#;
        let post: Post = serde_json::from_str(json).unwrap();
        assert_eq!(post.id, 7);
        assert_eq!(post.like_owner_ids, vec![1, 2]);
        assert!(!post.liked_by_me);
        assert!(post.users.is_empty());
        assert_eq!(post.likes, 0);
    }

    #[test]
    fn test_post_serialization_skips_local_fields() {
        let mut post = Post::draft("text");
        post.likes = 5;
        post.owned_by_me = true;
        let value = serde_json::to_value(&post).unwrap();
        assert!(value.get("likes").is_none());
        assert!(value.get("ownedByMe").is_none());
        assert_eq!(value["content"], "text");
    }

    #[test]
    fn test_event_type_wire_names() {
        let json = r#"{
            "id": 1, "authorId": 2, "author": "Bob", "content": "meetup",
            "datetime": "2024-06-01T18:00:00Z", "published": "2024-05-01T10:00:00Z",
            "type": "OFFLINE", "participantsIds": [4],
            "attachment": {"url": "http://x/a.mp3", "type": "AUDIO"}
        }"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind, EventType::Offline);
        assert_eq!(event.participants_ids, vec![4]);
        assert_eq!(event.attachment.unwrap().kind, AttachmentType::Audio);
    }

    #[test]
    fn test_formatted_published_falls_back_to_raw() {
        let mut post = Post::draft("x");
        post.published = "yesterday".to_string();
        assert_eq!(post.formatted_published(), "yesterday");
    }

    #[test]
    fn test_feed_item_dispatch() {
        let user = User {
            id: 9,
            login: "u".into(),
            name: "Uma".into(),
            avatar: None,
        };
        let item = FeedItem::from(user);
        assert_eq!(item.id(), 9);
        assert_eq!(item.tag(), "user");
        assert!(item.is_owned_by(9));
        assert!(!item.is_owned_by(0));
    }

    #[test]
    fn test_job_is_current() {
        let job = Job {
            id: 1,
            name: "Acme".into(),
            position: "Dev".into(),
            start: "2020-01-01T00:00:00Z".into(),
            finish: None,
            link: None,
            user_id: 3,
            owned_by_me: false,
        };
        assert!(job.is_current());
    }
}
