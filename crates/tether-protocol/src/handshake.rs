//! Envelope that opens a dedicated channel.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Handshake posted on the broad-scope transport alongside a channel handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HandshakeMessage {
    /// Request to bind a fresh session to the attached channel.
    #[serde(rename = "zupass-client-connect")]
    Connect {
        /// Opaque descriptor of the embedded application.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        zapp: Option<Value>,
    },
}

impl HandshakeMessage {
    /// Builds a connect envelope.
    pub fn connect(zapp: Option<Value>) -> Self {
        Self::Connect { zapp }
    }

    /// Checks an untrusted payload.
    ///
    /// Returns `None` for anything that is not a handshake. Callers drop such
    /// payloads without replying, so this never reports why validation failed.
    pub fn validate(raw: &Value) -> Option<Self> {
        Self::deserialize(raw).ok()
    }

    /// Application descriptor supplied by the peer.
    pub fn zapp(&self) -> Option<&Value> {
        match self {
            Self::Connect { zapp } => zapp.as_ref(),
        }
    }
}
