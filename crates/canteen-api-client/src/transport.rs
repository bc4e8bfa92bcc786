//! Transport seam between the client and the HTTP stack.
//!
//! [`Transport`] is the one async boundary the client core depends on;
//! production traffic goes through [`ReqwestTransport`], tests script the
//! trait directly.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, ClientBuilder};
use url::Url;

use crate::config::ClientConfig;
use crate::descriptor::Method;
use crate::error::ApiError;

/// A fully resolved outgoing request: absolute URL, final headers,
/// serialized body.
#[derive(Debug, Clone)]
pub struct WireRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

/// Raw result of one transport attempt. Any HTTP status lands here;
/// classifying non-2xx responses is the client's job.
#[derive(Debug, Clone)]
pub struct WireResponse {
    pub status: u16,
    pub body: Bytes,
}

impl WireResponse {
    /// Whether the HTTP status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure before any HTTP response was produced.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportFailure {
    #[error("request timed out")]
    Timeout,

    #[error("network failure: {0}")]
    Network(String),
}

impl From<reqwest::Error> for TransportFailure {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// One attempt against the network. Implementations must be cheap to
/// call repeatedly; the client drives retries and cancellation.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: WireRequest) -> Result<WireResponse, TransportFailure>;
}

/// Production transport on a pooled [`reqwest::Client`].
pub struct ReqwestTransport {
    inner: Client,
}

impl ReqwestTransport {
    /// Build the underlying client from the shared configuration.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let inner = ClientBuilder::new()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .gzip(true)
            .build()
            .map_err(|e| ApiError::ClientBuild {
                message: e.to_string(),
            })?;
        Ok(Self { inner })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: WireRequest) -> Result<WireResponse, TransportFailure> {
        let mut builder = self
            .inner
            .request(request.method.into(), request.url.clone());

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(TransportFailure::from)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(TransportFailure::from)?;

        Ok(WireResponse { status, body })
    }
}
