// SPDX-License-Identifier: MPL-2.0

//! Offline-first paging and sync core of the NeWork client.
//!
//! Feed pages are fetched by a [`sync::RemoteMediator`], merged into the
//! SQLite [`cache`], and read back through a [`sync::Pager`]. The
//! [`repository`] layer adds optimistic mutations on top.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod repository;
pub mod state;
pub mod sync;

pub use error::AppError;
