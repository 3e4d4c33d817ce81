//! Turns an accepted connection into an inbound handshake event.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

use super::LISTENER_TARGET;
use crate::port::stream::{self, LineError, read_bounded_line};
use crate::setup::InboundEvent;

/// Time a peer has to send its handshake line after connecting.
pub(crate) const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Reads the first line as the handshake envelope and hands the rest of the
/// connection to channel setup as the event's port.
///
/// Connections that close, time out or send an unreadable first line are
/// dropped without a reply.
pub(crate) async fn serve<R, W>(
    reader: R,
    writer: W,
    origin: String,
    events: mpsc::Sender<InboundEvent>,
) where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    let handshake = match tokio::time::timeout(
        HANDSHAKE_TIMEOUT,
        read_bounded_line(&mut reader, &mut line),
    )
    .await
    {
        Ok(Ok(Some(value))) => value,
        Ok(Ok(None)) => {
            debug!(target: LISTENER_TARGET, origin = %origin, "connection closed before handshake");
            return;
        }
        Ok(Err(LineError::Skipped(error))) => {
            debug!(target: LISTENER_TARGET, origin = %origin, error = %error, "unreadable handshake line");
            return;
        }
        Ok(Err(LineError::Io(error))) => {
            debug!(target: LISTENER_TARGET, origin = %origin, error = %error, "handshake read failed");
            return;
        }
        Err(_) => {
            debug!(target: LISTENER_TARGET, origin = %origin, "handshake timed out");
            return;
        }
    };

    let port = stream::attach(reader, writer);
    let event = InboundEvent::new(handshake, port).with_origin(origin);
    if events.send(event).await.is_err() {
        debug!(target: LISTENER_TARGET, "channel setup is no longer accepting events");
    }
}
