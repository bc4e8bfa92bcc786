//! Secret handling for Canteen.
//!
//! Provides a wrapper type for sensitive values (session tokens, API
//! credentials) that is redacted in logs and serialized output, plus the
//! process-wide session store the API client reads its bearer token from.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::{Arc, RwLock};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A secret value that is redacted in logs and debug output.
///
/// # Example
///
/// ```rust
/// use canteen_common_secret::Secret;
///
/// let token = Secret::new("tok-abc123".to_string());
/// assert_eq!(format!("{}", token), "[REDACTED]");
/// assert_eq!(token.expose(), "tok-abc123");
/// ```
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Secret<T: Zeroize>(T);

impl<T: Zeroize> Secret<T> {
    /// Create a new secret.
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Expose the secret value.
    ///
    /// Use this method sparingly and only when necessary.
    pub fn expose(&self) -> &T {
        &self.0
    }

    /// Consume and return the inner value.
    pub fn into_inner(self) -> T {
        // Note: Zeroize won't run since we're moving out
        let this = std::mem::ManuallyDrop::new(self);
        unsafe { std::ptr::read(&this.0) }
    }
}

impl<T: Zeroize> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl<T: Zeroize + PartialEq> PartialEq for Secret<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

// Serde: deserialize normally, but serialize as redacted
impl<'de, T: Zeroize + Deserialize<'de>> Deserialize<'de> for Secret<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        T::deserialize(deserializer).map(Secret::new)
    }
}

impl<T: Zeroize + Serialize> Serialize for Secret<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        "[REDACTED]".serialize(serializer)
    }
}

/// Type alias for a secret string.
pub type SecretString = Secret<String>;

/// Shared session token storage.
///
/// Holds the bearer token for the current sign-in, written by login/logout
/// flows and read by the API client on every dispatch. Clones share the
/// same underlying cell, so a token set through one handle is visible to
/// all of them. Each store is an independent instance — two clients built
/// on two stores do not observe each other's tokens.
#[derive(Clone, Default)]
pub struct SessionStore {
    token: Arc<RwLock<Option<SecretString>>>,
}

impl SessionStore {
    /// Create an empty (signed-out) store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current token, if a session is active.
    pub fn token(&self) -> Option<SecretString> {
        self.token.read().unwrap().clone()
    }

    /// Store the token for a new session.
    pub fn set_token(&self, token: impl Into<String>) {
        *self.token.write().unwrap() = Some(Secret::new(token.into()));
    }

    /// Drop the current session token.
    pub fn clear(&self) {
        *self.token.write().unwrap() = None;
    }

    /// Whether a token is currently stored.
    pub fn is_authenticated(&self) -> bool {
        self.token.read().unwrap().is_some()
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}
