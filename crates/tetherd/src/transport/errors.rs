//! Failures of the handshake endpoint.

use std::io;

use thiserror::Error;
use tokio::task::JoinError;

use tether_config::SocketEndpoint;

/// Errors surfaced while binding the handshake endpoint or running its
/// accept loop. Every bind failure names the configured endpoint so the
/// operator can match it against `TETHER_DAEMON_SOCKET`.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("cannot resolve handshake endpoint {endpoint}: {source}")]
    Resolve {
        endpoint: SocketEndpoint,
        #[source]
        source: io::Error,
    },
    #[error("handshake endpoint {endpoint} resolved to no addresses")]
    Unresolved { endpoint: SocketEndpoint },
    #[error("cannot bind handshake endpoint {endpoint}: {source}")]
    Bind {
        endpoint: SocketEndpoint,
        #[source]
        source: io::Error,
    },
    #[cfg(not(unix))]
    #[error("handshake endpoint {endpoint} needs Unix sockets, which this platform lacks")]
    UnsupportedUnix { endpoint: SocketEndpoint },
    #[cfg(unix)]
    #[error("another bridge daemon is already serving {endpoint}")]
    DaemonRunning { endpoint: SocketEndpoint },
    #[cfg(unix)]
    #[error("cannot reclaim handshake endpoint {endpoint}: {reason}")]
    Reclaim {
        endpoint: SocketEndpoint,
        #[source]
        reason: ReclaimError,
    },
    #[error("handshake accept loop failed: {source}")]
    Task {
        #[source]
        source: JoinError,
    },
}

/// Why a leftover Unix socket file could not be replaced.
#[cfg(unix)]
#[derive(Debug, Error)]
pub enum ReclaimError {
    #[error("the path exists but is not a socket")]
    NotASocket,
    #[error("failed to inspect the socket file: {0}")]
    Inspect(#[source] io::Error),
    #[error("failed to check for a live daemon: {0}")]
    Liveness(#[source] io::Error),
    #[error("failed to remove the stale socket file: {0}")]
    Remove(#[source] io::Error),
}
