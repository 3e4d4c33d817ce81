//! Embedded-side end of an in-process channel.

use std::time::Duration;

use serde_json::{Value, json};

use crate::port::{MessageChannel, MessagePort, PortReceiver, PortSender};

const RECEIVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Peer holding the far end of a session's port.
pub struct Peer {
    tx: Option<PortSender>,
    rx: PortReceiver,
}

/// Creates a channel, returning the daemon's unstarted end and the peer.
pub fn connect_peer() -> (MessagePort, Peer) {
    let (daemon, peer) = MessageChannel::pair();
    let (tx, rx) = peer.start();
    (daemon, Peer { tx: Some(tx), rx })
}

impl Peer {
    pub fn send(&self, raw: Value) {
        self.tx
            .as_ref()
            .expect("peer already hung up")
            .post_value(raw)
            .expect("daemon end dropped");
    }

    pub fn invoke(&self, function: &str, args: Value, serial: u64) {
        self.send(json!({
            "type": "zupass-client-invoke",
            "fn": function,
            "args": args,
            "serial": serial,
        }));
    }

    /// Next message from the daemon; `None` once it hung up.
    pub async fn next(&mut self) -> Option<Value> {
        tokio::time::timeout(RECEIVE_TIMEOUT, self.rx.recv())
            .await
            .expect("timed out waiting for daemon message")
    }

    /// Closes the peer's outbound side so the dispatcher drains and stops.
    pub fn hang_up(&mut self) {
        self.tx = None;
    }
}
