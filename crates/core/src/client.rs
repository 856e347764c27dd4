//! Remote data client.
//!
//! Every service in this crate talks to the hospital backend through the [`RemoteClient`] trait:
//! `get`, `post` and `put` against a path relative to the configured API base URL, returning an
//! [`ApiResponse`] whose `data` is the decoded JSON payload. The backend is authoritative for
//! everything; this seam carries no retries and no caching.
//!
//! [`HttpClient`] is the production implementation over `reqwest`.

use crate::config::CoreConfig;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde_json::Value;

/// Errors surfaced by a [`RemoteClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid request URL: {0}")]
    InvalidUrl(String),
    #[error("invalid header value: {0}")]
    InvalidHeader(String),
}

impl ClientError {
    /// HTTP status of the failure, if the backend answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            ClientError::Transport(e) => e.status().map(|s| s.as_u16()),
            ClientError::InvalidUrl(_) | ClientError::InvalidHeader(_) => None,
        }
    }
}

/// Response of a remote call: HTTP status plus the JSON payload.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub data: Value,
}

/// Generic HTTP-like collaborator used by every service.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// `GET path?query`.
    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<ApiResponse, ClientError>;

    /// `POST path` with a JSON body.
    async fn post(&self, path: &str, body: &Value) -> Result<ApiResponse, ClientError>;

    /// `PUT path` with a JSON body.
    async fn put(&self, path: &str, body: &Value) -> Result<ApiResponse, ClientError>;
}

/// [`RemoteClient`] over HTTP.
#[derive(Clone, Debug)]
pub struct HttpClient {
    base_url: String,
    inner: reqwest::Client,
}

impl HttpClient {
    /// Build a client from the startup configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if:
    /// - the configured token cannot be used as a header value,
    /// - the underlying TLS/HTTP client cannot be constructed.
    pub fn new(cfg: &CoreConfig) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = cfg.api_token() {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                ClientError::InvalidHeader("API token contains invalid characters".into())
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let inner = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(cfg.request_timeout())
            .build()?;

        Ok(Self {
            base_url: cfg.api_base_url().to_string(),
            inner,
        })
    }

    fn url(&self, path: &str) -> Result<String, ClientError> {
        if !path.starts_with('/') {
            return Err(ClientError::InvalidUrl(format!(
                "path must start with '/': {path}"
            )));
        }
        Ok(format!("{}{}", self.base_url, path))
    }

    async fn finish(response: reqwest::Response) -> Result<ApiResponse, ClientError> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(ApiResponse {
            status: status.as_u16(),
            data: decode_body(&text),
        })
    }
}

/// Decode a response body leniently: empty → `null`, non-JSON → the raw text.
fn decode_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

#[async_trait]
impl RemoteClient for HttpClient {
    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<ApiResponse, ClientError> {
        let url = self.url(path)?;
        tracing::debug!("GET {} {:?}", url, query);
        let response = self.inner.get(url).query(query).send().await?;
        Self::finish(response).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<ApiResponse, ClientError> {
        let url = self.url(path)?;
        tracing::debug!("POST {}", url);
        let response = self.inner.post(url).json(body).send().await?;
        Self::finish(response).await
    }

    async fn put(&self, path: &str, body: &Value) -> Result<ApiResponse, ClientError> {
        let url = self.url(path)?;
        tracing::debug!("PUT {}", url);
        let response = self.inner.put(url).json(body).send().await?;
        Self::finish(response).await
    }
}

/// Pull a list out of a payload that is either a bare array or an object wrapping one.
///
/// Backend list endpoints are inconsistent: some answer `[...]`, others `{ "data": [...] }` or
/// a resource-named key. The first matching key in `keys` wins.
pub(crate) fn list_payload<'a>(data: &'a Value, keys: &[&str]) -> Option<&'a Vec<Value>> {
    match data {
        Value::Array(items) => Some(items),
        Value::Object(map) => keys.iter().find_map(|k| map.get(*k)?.as_array()),
        _ => None,
    }
}
