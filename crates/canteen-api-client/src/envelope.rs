//! The `{code, message, data}` response envelope contract.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::ApiError;

/// Wire envelope every business endpoint responds with.
///
/// `code` may arrive as a JSON integer or a numeric string; it is
/// normalized to `i64` at deserialization time, so `"200"` and `200` are
/// equivalent. `data` stays untyped here and is resolved into the
/// caller's expected type by [`Envelope::into_payload`].
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(deserialize_with = "deserialize_code")]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Value,
}

fn deserialize_code<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(code) => Ok(code),
        Raw::Str(s) => s.trim().parse().map_err(|_| {
            serde::de::Error::custom(format!("non-numeric envelope code {:?}", s))
        }),
    }
}

impl Envelope {
    /// Parse an envelope from a response body.
    pub fn parse(body: &[u8]) -> Result<Self, ApiError> {
        serde_json::from_slice(body).map_err(|e| ApiError::Decode {
            message: format!("invalid envelope: {}", e),
        })
    }

    /// Resolve the envelope into the caller's payload type.
    ///
    /// A code other than `success_code` becomes a business error carrying
    /// the server's message, regardless of the HTTP status the envelope
    /// arrived with.
    pub fn into_payload<T: DeserializeOwned>(self, success_code: i64) -> Result<T, ApiError> {
        if self.code != success_code {
            return Err(ApiError::Business {
                code: self.code,
                message: if self.message.is_empty() {
                    "business error".to_string()
                } else {
                    self.message
                },
            });
        }

        serde_json::from_value(self.data).map_err(|e| ApiError::Decode {
            message: format!("payload did not match expected type: {}", e),
        })
    }
}
