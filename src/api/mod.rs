// SPDX-License-Identifier: MPL-2.0

mod client;
mod feed;
mod types;

pub use client::{ClientError, NeworkClient};
pub use feed::{Feed, ItemKind};
pub use types::{
    Attachment, AttachmentType, AuthToken, Coords, Event, EventType, FeedItem, Id, Job, Media,
    MediaUpload, Post, User, UserPreview,
};
