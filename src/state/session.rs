// SPDX-License-Identifier: MPL-2.0

use crate::api::Id;
use crate::config::APP_ID;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, warn};

const AUTH_FILE: &str = "auth.json";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("auth store unavailable: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid session data: {0}")]
    InvalidData(#[from] serde_json::Error),
}

/// Current user id and token. `id == 0` means anonymous.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthState {
    #[serde(default)]
    pub id: Id,
    #[serde(default)]
    pub token: Option<String>,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        self.id != 0 && self.token.as_deref().is_some_and(|t| !t.trim().is_empty())
    }
}

struct Inner {
    tx: watch::Sender<AuthState>,
    path: Option<PathBuf>,
    write_lock: Mutex<()>,
}

/// Process-wide auth state with replay-latest subscribers.
///
/// Every mutation is written to the key-value file before it is published.
#[derive(Clone)]
pub struct AppAuth {
    inner: Arc<Inner>,
}

impl AppAuth {
    /// Load from `~/.config/<app id>/auth.json`
    pub fn load() -> Self {
        match Self::auth_path() {
            Some(path) => Self::load_from(path),
            None => {
                warn!("no config directory, auth state will not persist");
                Self::in_memory()
            }
        }
    }

    /// Load from an explicit file; a missing, broken or unauthenticated
    /// record is cleared and the state starts anonymous.
    pub fn load_from(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();

        let stored = std::fs::read_to_string(&path)
            .ok()
            .and_then(|contents| serde_json::from_str::<AuthState>(&contents).ok())
            .unwrap_or_default();

        let state = if stored.is_authenticated() {
            stored
        } else {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(&path) {
                    warn!(path = %path.display(), error = %e, "failed to clear auth store");
                }
            }
            AuthState::default()
        };

        let (tx, _) = watch::channel(state);
        Self {
            inner: Arc::new(Inner {
                tx,
                path: Some(path),
                write_lock: Mutex::new(()),
            }),
        }
    }

    pub fn in_memory() -> Self {
        let (tx, _) = watch::channel(AuthState::default());
        Self {
            inner: Arc::new(Inner {
                tx,
                path: None,
                write_lock: Mutex::new(()),
            }),
        }
    }

    fn auth_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push(APP_ID);
            p.push(AUTH_FILE);
            p
        })
    }

    pub fn state(&self) -> AuthState {
        self.inner.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.tx.subscribe()
    }

    pub fn my_id(&self) -> Id {
        self.inner.tx.borrow().id
    }

    pub fn token(&self) -> Option<String> {
        self.inner.tx.borrow().token.clone()
    }

    pub fn set_auth(&self, id: Id, token: &str) -> Result<(), SessionError> {
        let _guard = self.inner.write_lock.lock().expect("auth lock poisoned");
        let state = AuthState {
            id,
            token: Some(token.to_string()),
        };
        self.persist(Some(&state))?;
        self.inner.tx.send_replace(state);
        debug!(id, "auth state updated");
        Ok(())
    }

    pub fn clear_auth(&self) -> Result<(), SessionError> {
        let _guard = self.inner.write_lock.lock().expect("auth lock poisoned");
        self.persist(None)?;
        self.inner.tx.send_replace(AuthState::default());
        debug!("auth state cleared");
        Ok(())
    }

    fn persist(&self, state: Option<&AuthState>) -> Result<(), SessionError> {
        let Some(path) = &self.inner.path else {
            return Ok(());
        };

        match state {
            Some(state) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(path, serde_json::to_string(state)?)?;
            }
            None => {
                if path.exists() {
                    std::fs::remove_file(path)?;
                }
            }
        }
        Ok(())
    }
}
