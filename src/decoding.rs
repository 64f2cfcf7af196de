//! Decoding collaborator.
//!
//! Decoding runs per caller against the shared raw bytes, so two callers joined
//! on one in-flight call may decode it into different types.

use crate::error::DecodingError;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub trait Decoder: Send + Sync {
    fn decode<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T, DecodingError>;
}

/// JSON decoder with two conveniences for real-world endpoints:
///
/// - an empty body decodes as `null`, so `Option<T>` yields `None` and `()` succeeds;
/// - a non-JSON UTF-8 body is retried as a JSON string, so plain-text endpoints
///   decode into `String`.
#[derive(Debug, Clone, Copy)]
pub struct JsonDecoder {
    empty_as_null: bool,
    plain_text_fallback: bool,
}

impl Default for JsonDecoder {
    fn default() -> Self {
        Self {
            empty_as_null: true,
            plain_text_fallback: true,
        }
    }
}

impl JsonDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Strict JSON only: no null substitution, no plain-text fallback.
    pub fn strict() -> Self {
        Self {
            empty_as_null: false,
            plain_text_fallback: false,
        }
    }

    pub fn empty_as_null(mut self, enable: bool) -> Self {
        self.empty_as_null = enable;
        self
    }

    pub fn plain_text_fallback(mut self, enable: bool) -> Self {
        self.plain_text_fallback = enable;
        self
    }
}

impl Decoder for JsonDecoder {
    fn decode<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T, DecodingError> {
        if body.is_empty() && self.empty_as_null {
            return serde_json::from_value(Value::Null)
                .map_err(|e| DecodingError::new::<T>(e.to_string()));
        }

        match serde_json::from_slice::<T>(body) {
            Ok(value) => Ok(value),
            Err(err) => {
                if self.plain_text_fallback {
                    if let Ok(text) = std::str::from_utf8(body) {
                        if let Ok(value) = serde_json::from_value(Value::String(text.to_owned())) {
                            return Ok(value);
                        }
                    }
                }
                Err(DecodingError::new::<T>(err.to_string()))
            }
        }
    }
}
