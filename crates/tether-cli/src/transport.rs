//! Socket transport helpers for the Tether CLI.
//!
//! The functions here establish a connection to the daemon socket and split
//! it into boxed read and write halves so the bridge client can stay
//! transport agnostic.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, lookup_host};

use tether_config::SocketEndpoint;

#[cfg(unix)]
use tokio::net::UnixStream;

use crate::ClientError;

pub(crate) const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) type ReadHalf = Box<dyn AsyncRead + Unpin + Send>;
pub(crate) type WriteHalf = Box<dyn AsyncWrite + Unpin + Send>;

pub(crate) async fn connect(endpoint: &SocketEndpoint) -> Result<(ReadHalf, WriteHalf), ClientError> {
    match endpoint {
        SocketEndpoint::Tcp { host, port } => {
            let address = resolve_tcp_address(host, *port)
                .await
                .map_err(|source| ClientError::Resolve {
                    endpoint: endpoint.to_string(),
                    source,
                })?;
            let stream = with_timeout(TcpStream::connect(address))
                .await
                .map_err(|source| ClientError::Connect {
                    endpoint: endpoint.to_string(),
                    source,
                })?;
            let (reader, writer) = stream.into_split();
            Ok((Box::new(reader), Box::new(writer)))
        }
        #[cfg(unix)]
        SocketEndpoint::Unix { path } => {
            let stream = with_timeout(UnixStream::connect(path.as_std_path()))
                .await
                .map_err(|source| ClientError::Connect {
                    endpoint: endpoint.to_string(),
                    source,
                })?;
            let (reader, writer) = stream.into_split();
            Ok((Box::new(reader), Box::new(writer)))
        }
        #[cfg(not(unix))]
        SocketEndpoint::Unix { .. } => Err(ClientError::UnsupportedUnixTransport(endpoint.to_string())),
    }
}

async fn with_timeout<T>(connecting: impl Future<Output = io::Result<T>>) -> io::Result<T> {
    tokio::time::timeout(CONNECTION_TIMEOUT, connecting)
        .await
        .unwrap_or_else(|_| Err(io::Error::new(io::ErrorKind::TimedOut, "connection timed out")))
}

async fn resolve_tcp_address(host: &str, port: u16) -> io::Result<SocketAddr> {
    let mut addrs = lookup_host((host, port)).await?;
    addrs
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "no resolved addresses"))
}
