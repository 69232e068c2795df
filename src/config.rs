// SPDX-License-Identifier: MPL-2.0

pub const APP_ID: &str = "ru.social.nework";
pub const APP_NAME: &str = "NeWork";

pub const DEFAULT_BASE_URL: &str = "http://localhost:9999/api/";

/// Items per mediator fetch
pub const DEFAULT_PAGE_SIZE: usize = 25;
/// Wait between newer-item polls
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
