// SPDX-License-Identifier: MPL-2.0

use crate::api::ClientError;
use crate::cache::CacheError;
use crate::state::SessionError;
use thiserror::Error;

/// Errors surfaced to callers of the sync and repository layers
#[derive(Error, Debug)]
pub enum AppError {
    /// No response was received; retrying may help
    #[error("network error: {0}")]
    Network(String),
    /// The server rejected the request
    #[error("{message} ({status})")]
    Api { status: u16, message: String },
    #[error("unknown error: {0}")]
    Unknown(String),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl AppError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Network(_))
    }
}

impl From<ClientError> for AppError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Network(msg) => AppError::Network(msg),
            ClientError::Api { status, message } => AppError::Api { status, message },
            ClientError::InvalidResponse(msg) | ClientError::InvalidUrl(msg) => {
                AppError::Unknown(msg)
            }
        }
    }
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        AppError::Unknown(e.to_string())
    }
}
