//! Fire-and-forget control signals sent to the embedded peer.

use tracing::debug;

use tether_protocol::Message;

use crate::port::PortSender;

const CLIENT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::client");

/// Outbound control channel bound to one session's port.
#[derive(Debug, Clone)]
pub struct ClientChannel {
    port: PortSender,
}

impl ClientChannel {
    /// Wraps the session's outbound port.
    #[must_use]
    pub fn new(port: PortSender) -> Self {
        Self { port }
    }

    /// Asks the peer to reveal the embedded surface.
    pub fn notify_show(&self) {
        self.signal(&Message::ClientShow);
    }

    /// Asks the peer to hide the embedded surface.
    pub fn notify_hide(&self) {
        self.signal(&Message::ClientHide);
    }

    fn signal(&self, message: &Message) {
        if let Err(error) = self.port.post(message) {
            debug!(
                target: CLIENT_TARGET,
                kind = message.kind(),
                error = %error,
                "control signal not delivered"
            );
        }
    }
}
