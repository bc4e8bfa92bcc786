//! Request descriptors and request-key derivation.

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

use crate::error::ApiError;

/// HTTP method of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    /// Canonical upper-case form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// One logical request, immutable once issued.
///
/// Built with the builder methods below; per-call `retry`/`retry_delay`
/// override the client defaults for that call only.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
    headers: Vec<(String, String)>,
    retry: Option<u32>,
    retry_delay: Option<Duration>,
}

impl RequestDescriptor {
    /// Create a descriptor for `path`, relative to the client's base URL
    /// (absolute `http(s)://` paths are used as-is).
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            headers: Vec::new(),
            retry: None,
            retry_delay: None,
        }
    }

    /// Append a query parameter.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Set a JSON body.
    pub fn json_body<B: Serialize>(mut self, body: &B) -> Result<Self, ApiError> {
        self.body = Some(serde_json::to_value(body).map_err(|e| ApiError::Encode {
            message: e.to_string(),
        })?);
        Ok(self)
    }

    /// Add a per-call header; overrides any default the client would set
    /// under the same name.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Override the retry budget for this call.
    pub fn retry(mut self, retry: u32) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Override the delay between attempts for this call.
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn header_overrides(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn retry_override(&self) -> Option<u32> {
        self.retry
    }

    pub fn retry_delay_override(&self) -> Option<Duration> {
        self.retry_delay
    }

    /// Deterministic key identifying "the same logical request".
    ///
    /// Combines method, path, query (order-insensitive) and body
    /// (object-key-order-insensitive). Structurally identical requests
    /// produce identical keys; any difference in those four fields
    /// produces a different key.
    pub fn request_key(&self) -> String {
        use std::fmt::Write;

        let mut key = format!("{}-{}-", self.method.as_str(), self.path);

        let mut pairs = self.query.clone();
        pairs.sort();
        for (name, value) in &pairs {
            // JSON string quoting keeps names/values with separators unambiguous
            let _ = write!(key, "{}={}&", Value::from(name.as_str()), Value::from(value.as_str()));
        }

        key.push('-');
        match &self.body {
            Some(body) => key.push_str(&canonical_json(body)),
            None => key.push_str("null"),
        }
        key
    }
}

/// Serialize a JSON value with object keys sorted at every level.
fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = String::from("{");
            for (i, k) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::from(k.as_str()).to_string());
                out.push(':');
                out.push_str(&canonical_json(&map[k.as_str()]));
            }
            out.push('}');
            out
        }
        Value::Array(items) => {
            let mut out = String::from("[");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&canonical_json(item));
            }
            out.push(']');
            out
        }
        other => other.to_string(),
    }
}
