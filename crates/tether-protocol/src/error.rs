//! Errors raised while decoding wire messages.

use thiserror::Error;

/// Reasons a payload failed schema validation.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Payload did not match any known message shape.
    #[error("malformed message: {message}")]
    Malformed {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// Line contained nothing but whitespace.
    #[error("empty message line")]
    Empty,

    /// Line exceeded the framing limit.
    #[error("message too large: {size} bytes exceeds {max_size} byte limit")]
    TooLarge { size: usize, max_size: usize },

    /// Outbound message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}

impl SchemaError {
    /// Wraps a decoding failure from `serde_json`.
    pub fn from_json_error(source: serde_json::Error) -> Self {
        Self::Malformed {
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Creates a malformed-message error with a custom description.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
            source: None,
        }
    }
}
