//! The API client: URL resolution, bearer injection, envelope
//! unwrapping, bounded retry, and en-masse cancellation.

use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use canteen_common_secret::SessionStore;

use crate::cancel::{CancelSignal, PendingRegistry};
use crate::config::ClientConfig;
use crate::descriptor::{Method, RequestDescriptor};
use crate::envelope::Envelope;
use crate::error::{ApiError, TransportKind};
use crate::transport::{
    ReqwestTransport, Transport, TransportFailure, WireRequest, WireResponse,
};

/// REST client for the Canteen backend.
///
/// All state (config, transport, session, pending registry) lives on the
/// instance; two clients built on different configs or session stores are
/// fully independent.
pub struct ApiClient {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    session: SessionStore,
    pending: PendingRegistry,
}

impl ApiClient {
    /// Create a client on the production reqwest transport.
    pub fn new(config: ClientConfig, session: SessionStore) -> Result<Self, ApiError> {
        let transport = Arc::new(ReqwestTransport::new(&config)?);
        Ok(Self::with_transport(config, session, transport))
    }

    /// Create a client on a caller-supplied transport.
    pub fn with_transport(
        config: ClientConfig,
        session: SessionStore,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            config,
            transport,
            session,
            pending: PendingRegistry::new(),
        }
    }

    /// The session store this client reads its bearer token from.
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Number of requests currently in flight through this client.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// GET `path` and unwrap the envelope into `T`.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        self.request(with_query(Method::Get, path, query)).await
    }

    /// POST a JSON body to `path` and unwrap the envelope into `T`.
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.request(RequestDescriptor::new(Method::Post, path).json_body(body)?)
            .await
    }

    /// PUT a JSON body to `path` and unwrap the envelope into `T`.
    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.request(RequestDescriptor::new(Method::Put, path).json_body(body)?)
            .await
    }

    /// DELETE `path` and unwrap the envelope into `T`.
    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        self.request(with_query(Method::Delete, path, query)).await
    }

    /// Issue an arbitrary descriptor and unwrap the envelope into `T`.
    pub async fn request<T: DeserializeOwned>(
        &self,
        descriptor: RequestDescriptor,
    ) -> Result<T, ApiError> {
        let response = self.dispatch(&descriptor).await?;
        Envelope::parse(&response.body)?.into_payload(self.config.success_code)
    }

    /// Fetch a binary payload (file exports). The envelope contract does
    /// not apply; a 2xx body is returned as-is. Retry, cancellation, and
    /// bearer injection behave exactly as for envelope calls.
    pub async fn get_bytes(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Bytes, ApiError> {
        let response = self.dispatch(&with_query(Method::Get, path, query)).await?;
        Ok(response.body)
    }

    /// Abort every request currently in flight through this client.
    /// Each aborted call settles with [`ApiError::Cancelled`] through its
    /// own error path.
    pub fn cancel_all(&self) {
        self.pending.cancel_all();
    }

    /// Register, run the attempt loop, and unregister on every outcome.
    async fn dispatch(&self, descriptor: &RequestDescriptor) -> Result<WireResponse, ApiError> {
        let wire = self.resolve(descriptor)?;
        let key = descriptor.request_key();
        let (mut signal, ticket) = self.pending.register(&key, self.config.cancel_duplicates);

        tracing::debug!(method = %descriptor.method(), url = %wire.url, "dispatching request");
        let result = self.attempts(&wire, descriptor, &mut signal).await;
        self.pending.remove(&key, ticket);

        match &result {
            Ok(response) => {
                tracing::debug!(status = response.status, url = %wire.url, "request settled");
            }
            Err(error) => {
                tracing::debug!(%error, url = %wire.url, "request failed");
            }
        }
        result
    }

    /// Bounded attempt loop: 1 initial try plus up to `retry` more, with
    /// a fixed delay in between. Only transport failures re-enter the
    /// loop; cancellation wins any race immediately.
    async fn attempts(
        &self,
        wire: &WireRequest,
        descriptor: &RequestDescriptor,
        signal: &mut CancelSignal,
    ) -> Result<WireResponse, ApiError> {
        let budget = descriptor.retry_override().unwrap_or(self.config.retry);
        let delay = descriptor
            .retry_delay_override()
            .unwrap_or(self.config.retry_delay);

        let mut last_error = None;

        for attempt in 0..=budget {
            if attempt > 0 {
                tracing::warn!(attempt, url = %wire.url, "retrying after transport failure");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = signal.cancelled() => return Err(ApiError::Cancelled),
                }
            }

            let outcome = tokio::select! {
                sent = self.transport.send(wire.clone()) => sent,
                _ = signal.cancelled() => return Err(ApiError::Cancelled),
            };

            match outcome {
                Ok(response) if response.is_success() => return Ok(response),
                Ok(response) => {
                    last_error = Some(ApiError::Transport {
                        kind: TransportKind::from_status(response.status),
                        status: Some(response.status),
                        message: format!("HTTP {}", response.status),
                    });
                }
                Err(TransportFailure::Timeout) => {
                    last_error = Some(ApiError::Transport {
                        kind: TransportKind::Timeout,
                        status: None,
                        message: "attempt timed out".to_string(),
                    });
                }
                Err(TransportFailure::Network(message)) => {
                    last_error = Some(ApiError::Transport {
                        kind: TransportKind::Network,
                        status: None,
                        message,
                    });
                }
            }
        }

        Err(last_error.unwrap_or(ApiError::Transport {
            kind: TransportKind::Other,
            status: None,
            message: "no attempt was made".to_string(),
        }))
    }

    /// Resolve a descriptor into an absolute URL with final headers and a
    /// serialized body. Fails before anything is registered.
    fn resolve(&self, descriptor: &RequestDescriptor) -> Result<WireRequest, ApiError> {
        let path = descriptor.path();
        let raw = if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
        };

        let mut url = url::Url::parse(&raw).map_err(|e| ApiError::InvalidUrl {
            url: raw.clone(),
            message: e.to_string(),
        })?;

        if !descriptor.query_pairs().is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in descriptor.query_pairs() {
                pairs.append_pair(name, value);
            }
        }

        let body = match descriptor.body() {
            Some(value) => Some(Bytes::from(serde_json::to_vec(value).map_err(|e| {
                ApiError::Encode {
                    message: e.to_string(),
                }
            })?)),
            None => None,
        };

        let mut headers: Vec<(String, String)> = Vec::new();
        if let Some(token) = self.session.token() {
            headers.push((
                "authorization".to_string(),
                format!("Bearer {}", token.expose()),
            ));
        }
        if body.is_some() {
            headers.push(("content-type".to_string(), "application/json".to_string()));
        }
        // per-call overrides replace any default under the same name
        for (name, value) in descriptor.header_overrides() {
            headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
            headers.push((name.clone(), value.clone()));
        }

        Ok(WireRequest {
            method: descriptor.method(),
            url,
            headers,
            body,
        })
    }
}

fn with_query(method: Method, path: &str, query: &[(&str, &str)]) -> RequestDescriptor {
    let mut descriptor = RequestDescriptor::new(method, path);
    for (name, value) in query {
        descriptor = descriptor.query(*name, *value);
    }
    descriptor
}
