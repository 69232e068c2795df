// SPDX-License-Identifier: MPL-2.0

mod mediator;
mod pager;
mod paging;
mod poller;

pub use mediator::RemoteMediator;
pub use pager::{Pager, PagingSnapshot};
pub use paging::{
    ItemPagingSource, LoadResult, LoadState, LoadStates, LoadType, MediatorResult, PagingConfig,
};
pub use poller::{
    PollConfig, PollerHandle, poll_newer_once, poll_newer_than_read, spawn_newer_poller,
};
