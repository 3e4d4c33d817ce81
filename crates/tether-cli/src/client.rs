//! Host-side counterparty of the bridge.
//!
//! [`BridgeClient`] performs the handshake on a daemon socket, waits for the
//! daemon to announce readiness, and then correlates every invocation with
//! its response by serial. Responses may arrive in any order; each one is
//! routed to the caller parked on the matching serial.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::io::BufReader;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use tether_config::SocketEndpoint;
use tether_protocol::{HandshakeMessage, Invoke, Message, SchemaError, Serial};
use tetherd::port::stream::attach;
use tetherd::{PortError, PortReceiver, PortSender};

use crate::transport;

const CLIENT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::client");

/// Time the daemon has to announce readiness after the handshake.
pub const READY_TIMEOUT: Duration = Duration::from_secs(5);

type Reply = Result<Value, String>;
/// Waiters keyed by serial; `None` once the router has stopped reading.
type PendingMap = Arc<Mutex<Option<HashMap<Serial, oneshot::Sender<Reply>>>>>;

/// Errors raised while talking to the daemon.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The daemon host name could not be resolved.
    #[error("failed to resolve daemon address {endpoint}: {source}")]
    Resolve {
        /// Endpoint being resolved.
        endpoint: String,
        /// Resolver error.
        #[source]
        source: io::Error,
    },
    /// The socket could not be opened.
    #[error("failed to connect to daemon at {endpoint}: {source}")]
    Connect {
        /// Endpoint being dialled.
        endpoint: String,
        /// Connection error.
        #[source]
        source: io::Error,
    },
    /// Unix sockets are unavailable on this platform.
    #[cfg(not(unix))]
    #[error("platform does not support Unix sockets: {0}")]
    UnsupportedUnixTransport(String),
    /// The handshake envelope could not be encoded.
    #[error("failed to encode handshake: {0}")]
    Handshake(#[source] SchemaError),
    /// The daemon did not announce readiness in time.
    #[error("daemon did not become ready within {} ms", READY_TIMEOUT.as_millis())]
    ReadyTimeout,
    /// The channel closed before a response arrived.
    #[error("daemon closed the channel")]
    Closed,
    /// The invocation could not be sent.
    #[error("failed to send invocation: {0}")]
    Send(#[from] PortError),
    /// The daemon answered with an `InvokeError`.
    #[error("{function} failed: {message}")]
    Remote {
        /// Function that was invoked.
        function: String,
        /// Error text reported by the daemon.
        message: String,
    },
}

/// Fire-and-forget signals the daemon sends outside of any invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// The embedded peer asked to be shown.
    Show,
    /// The embedded peer asked to be hidden.
    Hide,
}

/// Connected bridge session.
#[derive(Debug)]
pub struct BridgeClient {
    sender: PortSender,
    next_serial: AtomicU64,
    pending: PendingMap,
    control: Mutex<Option<mpsc::UnboundedReceiver<ControlEvent>>>,
    router: JoinHandle<()>,
}

impl BridgeClient {
    /// Dials `endpoint`, sends the handshake and waits for `ClientReady`.
    ///
    /// # Errors
    ///
    /// Fails when the socket cannot be reached, the daemon hangs up before
    /// readiness, or readiness does not arrive within [`READY_TIMEOUT`].
    pub async fn connect(endpoint: &SocketEndpoint, zapp: Option<Value>) -> Result<Self, ClientError> {
        let (reader, writer) = transport::connect(endpoint).await?;
        let (sender, mut receiver) = attach(BufReader::new(reader), writer).start();
        let handshake =
            serde_json::to_value(HandshakeMessage::connect(zapp)).map_err(|error| {
                ClientError::Handshake(SchemaError::from_json_error(error))
            })?;
        sender.post_value(handshake)?;

        tokio::time::timeout(READY_TIMEOUT, wait_until_ready(&mut receiver))
            .await
            .map_err(|_| ClientError::ReadyTimeout)??;
        debug!(target: CLIENT_TARGET, endpoint = %endpoint, "bridge ready");

        let pending: PendingMap = Arc::new(Mutex::new(Some(HashMap::new())));
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let router = tokio::spawn(route_responses(receiver, Arc::clone(&pending), control_tx));
        Ok(Self {
            sender,
            next_serial: AtomicU64::new(1),
            pending,
            control: Mutex::new(Some(control_rx)),
            router,
        })
    }

    /// Invokes `function` with positional `args` and waits for its response.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Remote`] carrying the daemon's error text, or
    /// [`ClientError::Closed`] if the channel closed first.
    pub async fn invoke(&self, function: &str, args: Vec<Value>) -> Result<Value, ClientError> {
        let serial = self.next_serial.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();
        lock(&self.pending)
            .as_mut()
            .ok_or(ClientError::Closed)?
            .insert(serial, reply_tx);

        let message = Message::Invoke(Invoke::new(function, args, serial));
        if let Err(error) = self.sender.post(&message) {
            if let Some(waiters) = lock(&self.pending).as_mut() {
                waiters.remove(&serial);
            }
            return Err(error.into());
        }

        match reply_rx.await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(message)) => Err(ClientError::Remote {
                function: function.to_owned(),
                message,
            }),
            Err(_) => Err(ClientError::Closed),
        }
    }

    /// Takes the stream of `ClientShow`/`ClientHide` signals.
    ///
    /// Only the first call receives the stream; later calls return `None`.
    pub fn control_events(&self) -> Option<mpsc::UnboundedReceiver<ControlEvent>> {
        self.control
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl Drop for BridgeClient {
    fn drop(&mut self) {
        self.router.abort();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn wait_until_ready(receiver: &mut PortReceiver) -> Result<(), ClientError> {
    while let Some(raw) = receiver.recv().await {
        match Message::from_value(raw) {
            Ok(Message::ClientReady) => return Ok(()),
            Ok(other) => {
                debug!(target: CLIENT_TARGET, kind = other.kind(), "ignoring message before readiness");
            }
            Err(error) => {
                warn!(target: CLIENT_TARGET, error = %error, "dropping malformed message");
            }
        }
    }
    Err(ClientError::Closed)
}

async fn route_responses(
    mut receiver: PortReceiver,
    pending: PendingMap,
    control: mpsc::UnboundedSender<ControlEvent>,
) {
    while let Some(raw) = receiver.recv().await {
        let (serial, reply) = match Message::from_value(raw) {
            Ok(Message::InvokeResult(result)) => (result.serial, Ok(result.result)),
            Ok(Message::InvokeError(failure)) => match failure.serial {
                Some(serial) => (serial, Err(failure.error)),
                None => {
                    warn!(target: CLIENT_TARGET, error = %failure.error, "unattributed invocation error");
                    continue;
                }
            },
            Ok(Message::ClientShow) => {
                let _ = control.send(ControlEvent::Show);
                continue;
            }
            Ok(Message::ClientHide) => {
                let _ = control.send(ControlEvent::Hide);
                continue;
            }
            Ok(other) => {
                debug!(target: CLIENT_TARGET, kind = other.kind(), "ignoring message");
                continue;
            }
            Err(error) => {
                warn!(target: CLIENT_TARGET, error = %error, "dropping malformed message");
                continue;
            }
        };
        let waiter = lock(&pending).as_mut().and_then(|waiters| waiters.remove(&serial));
        match waiter {
            Some(waiter) => {
                let _ = waiter.send(reply);
            }
            None => debug!(target: CLIENT_TARGET, serial, "response for unknown serial"),
        }
    }
    lock(&pending).take();
}
