// SPDX-License-Identifier: MPL-2.0

use crate::api::feed::Feed;
use crate::api::types::{AuthToken, Event, Id, Job, Media, MediaUpload, User};
use crate::state::{AppAuth, AppSettings};
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;
use url::Url;

const API_KEY_HEADER: &str = "Api-Key";

#[derive(Error, Debug)]
pub enum ClientError {
    /// No response was received (connect, timeout, reset)
    #[error("network error: {0}")]
    Network(String),
    /// The server answered with a non-2xx status
    #[error("api error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    /// Build an API error, preferring a readable message for well-known codes
    pub fn api(status: u16, server_message: &str) -> Self {
        let message = match status {
            400 => "invalid login or password".to_string(),
            403 => "already exists".to_string(),
            404 => "not found".to_string(),
            415 => "unsupported media type".to_string(),
            _ if !server_message.trim().is_empty() => server_message.trim().to_string(),
            _ => StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("unknown error")
                .to_string(),
        };
        ClientError::Api { status, message }
    }
}

/// HTTP client for the NeWork REST API.
///
/// Adds `Api-Key` on every request and `Authorization` whenever the shared
/// auth state carries a token.
pub struct NeworkClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
    auth: AppAuth,
}

impl NeworkClient {
    pub fn new(settings: &AppSettings, auth: AppAuth) -> Result<Self, ClientError> {
        let mut base = settings.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            api_key: settings.api_key.clone(),
            auth,
        })
    }

    pub fn auth(&self) -> &AppAuth {
        &self.auth
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| ClientError::InvalidUrl(format!("{path}: {e}")))?;

        debug!(%method, %url, "api request");
        let mut request = self.http.request(method, url);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }
        if let Some(token) = self.auth.token() {
            request = request.header(AUTHORIZATION, token);
        }
        Ok(request)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = Self::dispatch(request).await?;
        response.json::<T>().await.map_err(|e| {
            if e.is_decode() {
                ClientError::InvalidResponse(e.to_string())
            } else {
                ClientError::Network(e.to_string())
            }
        })
    }

    async fn send_empty(&self, request: RequestBuilder) -> Result<(), ClientError> {
        Self::dispatch(request).await.map(|_| ())
    }

    async fn dispatch(request: RequestBuilder) -> Result<reqwest::Response, ClientError> {
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), "api error response");
            return Err(ClientError::api(status.as_u16(), &body));
        }
        Ok(response)
    }

    // Paging

    pub async fn latest<T: DeserializeOwned>(
        &self,
        feed: &Feed,
        count: usize,
    ) -> Result<Vec<T>, ClientError> {
        let path = format!("{}/latest", feed.paging_path());
        let request = self.request(Method::GET, &path)?.query(&[("count", count)]);
        self.send(request).await
    }

    /// Items immediately newer than `id`
    pub async fn before<T: DeserializeOwned>(
        &self,
        feed: &Feed,
        id: Id,
        count: usize,
    ) -> Result<Vec<T>, ClientError> {
        let path = format!("{}/{id}/before", feed.paging_path());
        let request = self.request(Method::GET, &path)?.query(&[("count", count)]);
        self.send(request).await
    }

    /// Items immediately older than `id`
    pub async fn after<T: DeserializeOwned>(
        &self,
        feed: &Feed,
        id: Id,
        count: usize,
    ) -> Result<Vec<T>, ClientError> {
        let path = format!("{}/{id}/after", feed.paging_path());
        let request = self.request(Method::GET, &path)?.query(&[("count", count)]);
        self.send(request).await
    }

    /// Every item newer than `id`, unbounded
    pub async fn newer<T: DeserializeOwned>(
        &self,
        feed: &Feed,
        id: Id,
    ) -> Result<Vec<T>, ClientError> {
        let path = format!("{}/{id}/newer", feed.paging_path());
        self.send(self.request(Method::GET, &path)?).await
    }

    // Items

    pub async fn get_by_id<T: DeserializeOwned>(
        &self,
        feed: &Feed,
        id: Id,
    ) -> Result<T, ClientError> {
        let path = format!("{}/{id}", feed.collection_path());
        self.send(self.request(Method::GET, &path)?).await
    }

    /// Create or update; the server echoes the stored item
    pub async fn save<T: Serialize + DeserializeOwned>(
        &self,
        feed: &Feed,
        item: &T,
    ) -> Result<T, ClientError> {
        let request = self.request(Method::POST, feed.collection_path())?.json(item);
        self.send(request).await
    }

    pub async fn remove(&self, feed: &Feed, id: Id) -> Result<(), ClientError> {
        let path = format!("{}/{id}", feed.collection_path());
        self.send_empty(self.request(Method::DELETE, &path)?).await
    }

    pub async fn like<T: DeserializeOwned>(&self, feed: &Feed, id: Id) -> Result<T, ClientError> {
        self.send(self.request(Method::POST, &feed.likes_path(id))?)
            .await
    }

    pub async fn unlike<T: DeserializeOwned>(
        &self,
        feed: &Feed,
        id: Id,
    ) -> Result<T, ClientError> {
        self.send(self.request(Method::DELETE, &feed.likes_path(id))?)
            .await
    }

    pub async fn participate(&self, id: Id) -> Result<Event, ClientError> {
        let path = format!("events/{id}/participants");
        self.send(self.request(Method::POST, &path)?).await
    }

    pub async fn unparticipate(&self, id: Id) -> Result<Event, ClientError> {
        let path = format!("events/{id}/participants");
        self.send(self.request(Method::DELETE, &path)?).await
    }

    pub async fn upload(&self, upload: MediaUpload) -> Result<Media, ClientError> {
        let part = Part::bytes(upload.bytes).file_name(upload.file_name);
        let form = Form::new().part("file", part);
        let request = self.request(Method::POST, "media")?.multipart(form);
        self.send(request).await
    }

    // Users

    pub async fn authenticate(&self, login: &str, pass: &str) -> Result<AuthToken, ClientError> {
        let request = self
            .request(Method::POST, "users/authentication")?
            .form(&[("login", login), ("pass", pass)]);
        self.send(request).await
    }

    pub async fn register(
        &self,
        login: &str,
        pass: &str,
        name: &str,
        avatar: Option<MediaUpload>,
    ) -> Result<AuthToken, ClientError> {
        let request = self.request(Method::POST, "users/registration")?;
        let request = match avatar {
            Some(upload) => {
                let form = Form::new()
                    .text("login", login.to_string())
                    .text("pass", pass.to_string())
                    .text("name", name.to_string())
                    .part(
                        "file",
                        Part::bytes(upload.bytes).file_name(upload.file_name),
                    );
                request.multipart(form)
            }
            None => request.form(&[("login", login), ("pass", pass), ("name", name)]),
        };
        self.send(request).await
    }

    pub async fn users(&self) -> Result<Vec<User>, ClientError> {
        self.send(self.request(Method::GET, "users")?).await
    }

    pub async fn user(&self, id: Id) -> Result<User, ClientError> {
        let path = format!("users/{id}");
        self.send(self.request(Method::GET, &path)?).await
    }

    // Jobs

    pub async fn jobs(&self, user_id: Id) -> Result<Vec<Job>, ClientError> {
        let path = format!("{user_id}/jobs");
        let mut jobs: Vec<Job> = self.send(self.request(Method::GET, &path)?).await?;
        for job in &mut jobs {
            job.user_id = user_id;
        }
        Ok(jobs)
    }

    pub async fn save_job(&self, job: &Job) -> Result<Job, ClientError> {
        let request = self.request(Method::POST, "my/jobs")?.json(job);
        let mut saved: Job = self.send(request).await?;
        saved.user_id = self.auth.my_id();
        Ok(saved)
    }

    pub async fn remove_job(&self, id: Id) -> Result<(), ClientError> {
        let path = format!("my/jobs/{id}");
        self.send_empty(self.request(Method::DELETE, &path)?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_known_status_messages() {
        match ClientError::api(400, "") {
            ClientError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "invalid login or password");
            }
            other => panic!("unexpected {other:?}"),
        }
        match ClientError::api(500, "  boom  ") {
            ClientError::Api { message, .. } => assert_eq!(message, "boom"),
            other => panic!("unexpected {other:?}"),
        }
        match ClientError::api(502, "") {
            ClientError::Api { message, .. } => assert_eq!(message, "Bad Gateway"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let settings = AppSettings::with_base_url("http://localhost:1234/api");
        let client = NeworkClient::new(&settings, AppAuth::in_memory()).unwrap();
        assert_eq!(client.base_url.as_str(), "http://localhost:1234/api/");
        let joined = client.base_url.join("posts/latest").unwrap();
        assert_eq!(joined.as_str(), "http://localhost:1234/api/posts/latest");
    }

    #[test]
    fn test_invalid_base_url() {
        let settings = AppSettings::with_base_url("not a url");
        assert!(matches!(
            NeworkClient::new(&settings, AppAuth::in_memory()),
            Err(ClientError::InvalidUrl(_))
        ));
    }
}
