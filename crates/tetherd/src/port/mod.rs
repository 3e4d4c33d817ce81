//! Dedicated duplex channels between the daemon and one embedded peer.
//!
//! A [`MessagePort`] is one end of an ordered, message-based pipe. Messages
//! posted by the peer queue up until the port is started, so nothing sent
//! between the handshake and the dispatcher attaching is lost.

pub mod stream;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

use tether_protocol::{Message, SchemaError};

/// Factory for entangled port pairs.
#[derive(Debug, Default, Clone, Copy)]
pub struct MessageChannel;

impl MessageChannel {
    /// Creates two ports; whatever one posts, the other receives.
    #[must_use]
    pub fn pair() -> (MessagePort, MessagePort) {
        let (left_tx, left_rx) = mpsc::unbounded_channel();
        let (right_tx, right_rx) = mpsc::unbounded_channel();
        (
            MessagePort {
                outbound: left_tx,
                inbound: right_rx,
            },
            MessagePort {
                outbound: right_tx,
                inbound: left_rx,
            },
        )
    }
}

/// One end of a dedicated channel that has not been started yet.
#[derive(Debug)]
pub struct MessagePort {
    outbound: mpsc::UnboundedSender<Value>,
    inbound: mpsc::UnboundedReceiver<Value>,
}

impl MessagePort {
    /// Activates the port and splits it into its two directions.
    #[must_use]
    pub fn start(self) -> (PortSender, PortReceiver) {
        (
            PortSender {
                outbound: self.outbound,
            },
            PortReceiver {
                inbound: self.inbound,
            },
        )
    }
}

/// Errors raised when posting to a port.
#[derive(Debug, Error)]
pub enum PortError {
    /// The peer end has gone away.
    #[error("message port is closed")]
    Closed,
    /// The message could not be converted to JSON.
    #[error(transparent)]
    Encode(#[from] SchemaError),
}

/// Outbound half of a started port.
#[derive(Debug, Clone)]
pub struct PortSender {
    outbound: mpsc::UnboundedSender<Value>,
}

impl PortSender {
    /// Posts an untyped payload.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::Closed`] once the peer has dropped its end.
    pub fn post_value(&self, value: Value) -> Result<(), PortError> {
        self.outbound.send(value).map_err(|_| PortError::Closed)
    }

    /// Posts a channel message.
    ///
    /// # Errors
    ///
    /// Returns an error when the message cannot be encoded or the port is
    /// closed.
    pub fn post(&self, message: &Message) -> Result<(), PortError> {
        self.post_value(message.to_value()?)
    }

    /// Reports whether the peer has dropped its end.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }
}

/// Inbound half of a started port.
#[derive(Debug)]
pub struct PortReceiver {
    inbound: mpsc::UnboundedReceiver<Value>,
}

impl PortReceiver {
    /// Waits for the next payload; `None` once the peer has hung up.
    pub async fn recv(&mut self) -> Option<Value> {
        self.inbound.recv().await
    }
}
