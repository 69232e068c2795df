// SPDX-License-Identifier: MPL-2.0

use crate::api::types::Id;
use std::fmt;

/// Which kind of row a feed pages over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Post,
    Event,
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::Post => "post",
            ItemKind::Event => "event",
        }
    }
}

/// A pageable feed instance.
///
/// Walls share the post table with the main feed; their rows are scoped by
/// author. Each feed keeps its own pair of remote keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feed {
    Posts,
    Events,
    Wall { author_id: Id },
    MyWall { author_id: Id },
}

impl Feed {
    /// Stable key used to scope remote keys
    pub fn key(&self) -> String {
        match self {
            Feed::Posts => "posts".to_string(),
            Feed::Events => "events".to_string(),
            Feed::Wall { author_id } => format!("wall:{author_id}"),
            Feed::MyWall { author_id } => format!("my-wall:{author_id}"),
        }
    }

    pub fn item_kind(&self) -> ItemKind {
        match self {
            Feed::Events => ItemKind::Event,
            _ => ItemKind::Post,
        }
    }

    /// Rows of this feed are restricted to one author
    pub fn author_filter(&self) -> Option<Id> {
        match self {
            Feed::Wall { author_id } | Feed::MyWall { author_id } => Some(*author_id),
            _ => None,
        }
    }

    /// Path prefix for the paging endpoints (latest/before/after/newer)
    pub fn paging_path(&self) -> String {
        match self {
            Feed::Posts => "posts".to_string(),
            Feed::Events => "events".to_string(),
            Feed::Wall { author_id } => format!("{author_id}/wall"),
            Feed::MyWall { .. } => "my/wall".to_string(),
        }
    }

    /// Collection used for create, fetch-by-id and delete
    pub fn collection_path(&self) -> &'static str {
        match self.item_kind() {
            ItemKind::Post => "posts",
            ItemKind::Event => "events",
        }
    }

    pub fn likes_path(&self, id: Id) -> String {
        match self {
            Feed::Wall { author_id } => format!("{author_id}/wall/{id}/likes"),
            _ => format!("{}/{id}/likes", self.collection_path()),
        }
    }
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}
