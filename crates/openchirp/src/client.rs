//! The top-level API client.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret as _, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::error::Error;
use crate::resources::{DeviceResource, LocationResource};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) struct ClientInner {
    http: reqwest::Client,
    base_url: String,
    user_id: String,
    user_token: SecretString,
}

impl std::fmt::Debug for ClientInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientInner")
            .field("base_url", &self.base_url)
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

/// Handle to the OpenChirp REST API.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Debug, Clone)]
pub struct OpenChirp {
    pub(crate) inner: Arc<ClientInner>,
}

/// Builder for [`OpenChirp`].
#[derive(Debug)]
pub struct ClientBuilder {
    base_url: String,
    user_id: String,
    user_token: SecretString,
    timeout: Duration,
}

impl ClientBuilder {
    /// Start building a client that authenticates as `user_id` with `user_token`.
    #[must_use]
    pub fn new(user_id: impl Into<String>, user_token: SecretString) -> Self {
        Self {
            base_url: crate::DEFAULT_API_URL.to_owned(),
            user_id: user_id.into(),
            user_token,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the API base URL, e.g. for a self-hosted deployment.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Per-request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is not an http(s) URL or the TLS backend fails to
    /// initialize.
    pub fn build(self) -> Result<OpenChirp, Error> {
        let base_url = self.base_url.trim_end_matches('/').to_owned();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(Error::InvalidBaseUrl(base_url));
        }

        let http = reqwest::Client::builder().timeout(self.timeout).build()?;
        Ok(OpenChirp {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                user_id: self.user_id,
                user_token: self.user_token,
            }),
        })
    }
}

impl OpenChirp {
    /// Operations on a single location. The empty id addresses the root location.
    #[must_use]
    pub fn location(&self, id: &str) -> LocationResource<'_> {
        LocationResource::new(self, id.to_owned())
    }

    /// Operations on a single device.
    #[must_use]
    pub fn device(&self, id: &str) -> DeviceResource<'_> {
        DeviceResource::new(self, id.to_owned())
    }

    /// The base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    #[instrument(skip(self, query), fields(base = %self.inner.base_url))]
    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, Error> {
        let url = format!("{}/{}", self.inner.base_url, path);
        let response = self
            .inner
            .http
            .request(Method::GET, &url)
            .basic_auth(
                &self.inner.user_id,
                Some(self.inner.user_token.expose_secret()),
            )
            .query(query)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        debug!(status = status.as_u16(), bytes = body.len(), "received response");

        if status != StatusCode::OK {
            return Err(Error::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        serde_json::from_slice(&body).map_err(|source| Error::Decode {
            path: path.to_owned(),
            source,
        })
    }
}
