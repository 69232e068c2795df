// SPDX-License-Identifier: MPL-2.0

use crate::api::{AuthToken, MediaUpload, NeworkClient};
use crate::error::AppError;
use std::sync::Arc;
use tracing::info;

/// Sign-in, sign-up and sign-out against the shared auth state
pub struct AuthRepository {
    client: Arc<NeworkClient>,
}

impl AuthRepository {
    pub fn new(client: Arc<NeworkClient>) -> Self {
        Self { client }
    }

    pub async fn login(&self, login: &str, pass: &str) -> Result<AuthToken, AppError> {
        let token = self.client.authenticate(login, pass).await?;
        self.client.auth().set_auth(token.id, &token.token)?;
        info!(id = token.id, "signed in");
        Ok(token)
    }

    pub async fn register(
        &self,
        login: &str,
        pass: &str,
        name: &str,
        avatar: Option<MediaUpload>,
    ) -> Result<AuthToken, AppError> {
        let token = self.client.register(login, pass, name, avatar).await?;
        self.client.auth().set_auth(token.id, &token.token)?;
        info!(id = token.id, "registered");
        Ok(token)
    }

    pub fn logout(&self) -> Result<(), AppError> {
        self.client.auth().clear_auth()?;
        info!("signed out");
        Ok(())
    }
}
