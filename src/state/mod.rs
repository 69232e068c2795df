// SPDX-License-Identifier: MPL-2.0

mod session;
pub mod settings;

pub use session::{AppAuth, AuthState, SessionError};
pub use settings::AppSettings;
