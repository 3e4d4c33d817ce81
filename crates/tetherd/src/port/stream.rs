//! Bridges a byte stream to a [`MessagePort`] using JSON lines.

use std::io;

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use tether_protocol::frame::{self, MAX_MESSAGE_BYTES};

use super::{MessageChannel, MessagePort, PortReceiver, PortSender};

const STREAM_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::port");

/// Spawns reader and writer tasks that pump JSONL between the stream halves
/// and the returned port.
///
/// Lines that are not JSON are logged and skipped. The inbound side of the
/// returned port closes at end of stream; the writer shuts down once every
/// sender for the port has been dropped.
///
/// Must be called from within a tokio runtime.
pub fn attach<R, W>(reader: R, writer: W) -> MessagePort
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (local, remote) = MessageChannel::pair();
    let (to_local, from_local) = remote.start();
    tokio::spawn(pump_inbound(reader, to_local));
    tokio::spawn(pump_outbound(from_local, writer));
    local
}

async fn pump_inbound<R>(mut reader: R, port: PortSender)
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    loop {
        match read_bounded_line(&mut reader, &mut line).await {
            Ok(None) => break,
            Ok(Some(value)) => {
                if port.post_value(value).is_err() {
                    break;
                }
            }
            Err(LineError::Io(error)) => {
                debug!(target: STREAM_TARGET, error = %error, "stream read failed");
                break;
            }
            Err(LineError::Skipped(reason)) => {
                warn!(target: STREAM_TARGET, reason = %reason, "skipping unreadable line");
            }
        }
    }
}

async fn pump_outbound<W>(mut port: PortReceiver, mut writer: W)
where
    W: AsyncWrite + Unpin,
{
    while let Some(value) = port.recv().await {
        let line = match frame::encode_line(&value) {
            Ok(line) => line,
            Err(error) => {
                warn!(target: STREAM_TARGET, error = %error, "dropping unencodable message");
                continue;
            }
        };
        if let Err(error) = write_line(&mut writer, &line).await {
            debug!(target: STREAM_TARGET, error = %error, "stream write failed");
            return;
        }
    }
    let _ = writer.shutdown().await;
}

async fn write_line<W>(writer: &mut W, line: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(line).await?;
    writer.flush().await
}

/// Failure to turn the next line into a value.
#[derive(Debug)]
pub(crate) enum LineError {
    /// The stream itself failed.
    Io(io::Error),
    /// The line was consumed but did not hold a usable payload.
    Skipped(tether_protocol::SchemaError),
}

/// Reads and decodes one line, never buffering more than the framing limit.
///
/// Returns `Ok(None)` at end of stream. Blank, oversized and non-JSON lines
/// are consumed and reported as [`LineError::Skipped`].
pub(crate) async fn read_bounded_line<R>(
    reader: &mut R,
    buffer: &mut Vec<u8>,
) -> Result<Option<Value>, LineError>
where
    R: AsyncBufRead + Unpin,
{
    buffer.clear();
    let limit = (MAX_MESSAGE_BYTES + 1) as u64;
    let read = (&mut *reader)
        .take(limit)
        .read_until(b'\n', buffer)
        .await
        .map_err(LineError::Io)?;
    if read == 0 {
        return Ok(None);
    }
    if read > MAX_MESSAGE_BYTES {
        discard_rest_of_line(reader).await.map_err(LineError::Io)?;
    }
    frame::decode_value(buffer)
        .map(Some)
        .map_err(LineError::Skipped)
}

async fn discard_rest_of_line<R>(reader: &mut R) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(());
        }
        if let Some(position) = available.iter().position(|byte| *byte == b'\n') {
            reader.consume(position + 1);
            return Ok(());
        }
        let length = available.len();
        reader.consume(length);
    }
}
