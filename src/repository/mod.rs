// SPDX-License-Identifier: MPL-2.0

mod auth;
mod feed;
mod users;

pub use auth::AuthRepository;
pub use feed::{FeedRepository, annotate};
pub use users::UserRepository;
