//! Error taxonomy for API calls.

use thiserror::Error;

/// Classification of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// HTTP 401 — session missing or expired; callers usually re-authenticate.
    Unauthorized,
    /// HTTP 403.
    Forbidden,
    /// HTTP 404.
    NotFound,
    /// HTTP 5xx.
    Server,
    /// The attempt exceeded the configured timeout.
    Timeout,
    /// Connection-level failure; no HTTP status was observed.
    Network,
    /// Any other HTTP status outside 2xx.
    Other,
}

impl TransportKind {
    /// Classify by HTTP status code.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            500..=599 => Self::Server,
            _ => Self::Other,
        }
    }
}

/// Errors surfaced by [`ApiClient`](crate::ApiClient) operations.
///
/// Only `Transport` is ever retried, and only within the configured
/// budget; everything else propagates to the caller immediately.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request transported successfully but the envelope's code was
    /// not the success code. Carries the server's message for display.
    #[error("{message} (code {code})")]
    Business { code: i64, message: String },

    /// The transport layer failed and the retry budget is exhausted.
    #[error("transport error ({kind:?}): {message}")]
    Transport {
        kind: TransportKind,
        /// Last observed HTTP status, if any attempt got that far.
        status: Option<u16>,
        message: String,
    },

    /// The call was aborted via `cancel_all` or a per-call handle.
    #[error("request cancelled")]
    Cancelled,

    /// A completed 2xx response was not a usable envelope, or its payload
    /// did not match the caller's expected type.
    #[error("failed to decode response: {message}")]
    Decode { message: String },

    /// The request body could not be serialized.
    #[error("failed to encode request body: {message}")]
    Encode { message: String },

    /// The descriptor's path could not be resolved against the base URL.
    #[error("invalid request URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    /// The underlying HTTP client could not be constructed.
    #[error("failed to build HTTP client: {message}")]
    ClientBuild { message: String },
}

impl ApiError {
    /// Transport classification, if this is a transport error.
    pub fn transport_kind(&self) -> Option<TransportKind> {
        match self {
            Self::Transport { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Server-supplied message of a business error.
    pub fn business_message(&self) -> Option<&str> {
        match self {
            Self::Business { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Whether another attempt could change the outcome.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}
