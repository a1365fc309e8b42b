//! remoteStorage-style HTTP backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, ETAG, IF_MATCH};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use tracing::debug;

use super::{Body, Document, RemoteStore};
use crate::error::{AppError, Result};

/// Default request deadline in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Store reached over HTTP with bearer-token auth.
pub struct HttpStore {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpStore {
    /// Create a store rooted at `base_url` (document paths are appended to it).
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        debug!(%method, %url, "store request");
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => builder,
        }
    }

    /// Map non-success statuses onto the error taxonomy.
    fn check(method: &str, path: &str, response: &Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(match status {
            StatusCode::UNAUTHORIZED => AppError::Unauthorized(format!("{} {}", method, path)),
            StatusCode::PRECONDITION_FAILED | StatusCode::CONFLICT => {
                AppError::Conflict(path.to_string())
            }
            other => AppError::Transport(format!("{} {}: HTTP {}", method, path, other)),
        })
    }

    fn revision(response: &Response) -> Option<String> {
        response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    }
}

#[async_trait]
impl RemoteStore for HttpStore {
    async fn get(&self, path: &str) -> Result<Option<Document>> {
        let response = self.request(Method::GET, path).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::check("GET", path, &response)?;

        let revision = Self::revision(&response);
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let bytes = response.bytes().await?;
        Ok(Some(Document {
            body: Body::decode(content_type.as_deref(), bytes.to_vec()),
            revision,
        }))
    }

    async fn put(
        &self,
        path: &str,
        body: &Body,
        if_match: Option<&str>,
    ) -> Result<Option<String>> {
        let mut builder = self
            .request(Method::PUT, path)
            .header(CONTENT_TYPE, body.content_type())
            .body(body.to_bytes());
        if let Some(revision) = if_match {
            builder = builder.header(IF_MATCH, revision);
        }
        let response = builder.send().await?;
        Self::check("PUT", path, &response)?;
        Ok(Self::revision(&response))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let response = self.request(Method::DELETE, path).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::check("DELETE", path, &response)
    }
}
