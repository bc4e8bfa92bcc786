//! Client configuration.

use std::time::Duration;

/// API client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Root for relative request paths, e.g. `https://api.example.com`.
    pub base_url: String,
    /// Overall timeout for a single attempt.
    pub timeout: Duration,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Additional attempts after the first transport failure.
    pub retry: u32,
    /// Fixed wait between attempts.
    pub retry_delay: Duration,
    /// Envelope code that marks business success.
    pub success_code: i64,
    /// Abort an already-pending request when a new one with the same
    /// request key is dispatched.
    pub cancel_duplicates: bool,
    /// User agent string.
    pub user_agent: String,
    /// Maximum idle connections per host.
    pub pool_max_idle_per_host: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            retry: 3,
            retry_delay: Duration::from_millis(1000),
            success_code: 200,
            cancel_duplicates: false,
            user_agent: format!("canteen/{}", env!("CARGO_PKG_VERSION")),
            pool_max_idle_per_host: 10,
        }
    }
}

impl ClientConfig {
    /// Default configuration rooted at the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Create config from environment variables.
    ///
    /// Recognizes `CANTEEN_API_BASE_URL`, `CANTEEN_API_TIMEOUT_MS`,
    /// `CANTEEN_API_RETRY` and `CANTEEN_API_RETRY_DELAY_MS`; anything
    /// unset keeps its default.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(base_url) = std::env::var("CANTEEN_API_BASE_URL") {
            config.base_url = base_url;
        }

        if let Some(ms) = env_u64("CANTEEN_API_TIMEOUT_MS") {
            config.timeout = Duration::from_millis(ms);
        }

        if let Some(retry) = env_u64("CANTEEN_API_RETRY") {
            config.retry = retry as u32;
        }

        if let Some(ms) = env_u64("CANTEEN_API_RETRY_DELAY_MS") {
            config.retry_delay = Duration::from_millis(ms);
        }

        config
    }
}

fn env_u64(var: &str) -> Option<u64> {
    std::env::var(var).ok().and_then(|v| v.parse().ok())
}
