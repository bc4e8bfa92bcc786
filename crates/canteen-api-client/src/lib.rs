//! REST client core for the Canteen management platform.
//!
//! Every Canteen backend endpoint responds with a `{code, message, data}`
//! envelope. This crate provides the one client all feature modules
//! (tenant, branch, staff, member, order, inventory, finance) issue their
//! calls through:
//!
//! - bearer-token injection from a shared [`SessionStore`],
//! - envelope unwrapping into the caller's payload type,
//! - bounded retry with a fixed delay for transport failures,
//! - per-request cancellation tracking and [`ApiClient::cancel_all`].
//!
//! Clients are plain values with no process-global state; independently
//! configured instances (different base URLs, different sessions) coexist.

pub mod cancel;
pub mod config;
pub mod descriptor;
pub mod envelope;
pub mod error;
pub mod transport;

mod client;

pub use cancel::{cancel_pair, CancelHandle, CancelSignal, PendingRegistry};
pub use client::ApiClient;
pub use config::ClientConfig;
pub use descriptor::{Method, RequestDescriptor};
pub use envelope::Envelope;
pub use error::{ApiError, TransportKind};

pub use canteen_common_secret::{SecretString, SessionStore};
