//! Listener implementation for daemon transport sockets.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, lookup_host};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use tether_config::SocketEndpoint;

use super::{LISTENER_TARGET, ListenerError, connection};
#[cfg(unix)]
use super::ReclaimError;
use crate::setup::InboundEvent;

#[cfg(unix)]
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::FileTypeExt;
#[cfg(unix)]
use std::path::Path;
#[cfg(unix)]
use tokio::net::UnixListener;

const ERROR_BACKOFF: Duration = Duration::from_millis(150);

/// Listener that binds to a socket endpoint.
#[derive(Debug)]
pub struct SocketListener {
    endpoint: SocketEndpoint,
    listener: ListenerKind,
}

#[derive(Debug)]
enum ListenerKind {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

impl SocketListener {
    /// Binds the endpoint, replacing a stale Unix socket file if one is left
    /// over from an earlier run.
    ///
    /// # Errors
    ///
    /// Fails when the address cannot be resolved or bound, or when a live
    /// daemon already owns the Unix socket.
    pub async fn bind(endpoint: &SocketEndpoint) -> Result<Self, ListenerError> {
        let listener = match endpoint {
            SocketEndpoint::Tcp { host, port } => {
                ListenerKind::Tcp(bind_tcp(endpoint, host, *port).await?)
            }
            #[cfg(unix)]
            SocketEndpoint::Unix { path } => {
                ListenerKind::Unix(bind_unix(endpoint, path.as_std_path())?)
            }
            #[cfg(not(unix))]
            SocketEndpoint::Unix { .. } => {
                return Err(ListenerError::UnsupportedUnix {
                    endpoint: endpoint.clone(),
                });
            }
        };
        Ok(Self {
            endpoint: endpoint.clone(),
            listener,
        })
    }

    /// Bound TCP address; `None` for Unix sockets.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.listener {
            ListenerKind::Tcp(listener) => listener.local_addr().ok(),
            #[cfg(unix)]
            ListenerKind::Unix(_) => None,
        }
    }

    /// Endpoint the listener was bound from.
    #[must_use]
    pub fn endpoint(&self) -> &SocketEndpoint {
        &self.endpoint
    }

    /// Accepts connections on a background task, forwarding each handshake
    /// to `events`.
    pub fn start(self, events: mpsc::Sender<InboundEvent>) -> ListenerHandle {
        let (shutdown, signal) = watch::channel(false);
        let task = tokio::spawn(run_accept_loop(self, signal, events));
        ListenerHandle {
            shutdown,
            task: Some(task),
        }
    }

    async fn accept(&self) -> io::Result<Accepted> {
        match &self.listener {
            ListenerKind::Tcp(listener) => {
                let (stream, peer) = listener.accept().await?;
                let (reader, writer) = stream.into_split();
                Ok(Accepted {
                    reader: Box::new(reader),
                    writer: Box::new(writer),
                    origin: format!("tcp://{peer}"),
                })
            }
            #[cfg(unix)]
            ListenerKind::Unix(listener) => {
                let (stream, _) = listener.accept().await?;
                let (reader, writer) = stream.into_split();
                Ok(Accepted {
                    reader: Box::new(reader),
                    writer: Box::new(writer),
                    origin: self.endpoint.to_string(),
                })
            }
        }
    }
}

struct Accepted {
    reader: Box<dyn AsyncRead + Unpin + Send>,
    writer: Box<dyn AsyncWrite + Unpin + Send>,
    origin: String,
}

/// Handle to the background listener task.
#[derive(Debug)]
pub struct ListenerHandle {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    /// Asks the accept loop to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Waits for the accept loop to stop.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::Task`] if the loop panicked.
    pub async fn join(mut self) -> Result<(), ListenerError> {
        match self.task.take() {
            Some(task) => task.await.map_err(|source| ListenerError::Task { source }),
            None => Ok(()),
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

async fn run_accept_loop(
    listener: SocketListener,
    mut shutdown: watch::Receiver<bool>,
    events: mpsc::Sender<InboundEvent>,
) {
    info!(
        target: LISTENER_TARGET,
        endpoint = %listener.endpoint,
        "socket listener active"
    );
    let mut last_error = None::<io::ErrorKind>;
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok(Accepted { reader, writer, origin }) => {
                    last_error = None;
                    tokio::spawn(connection::serve(reader, writer, origin, events.clone()));
                }
                Err(error) => {
                    let kind = error.kind();
                    if last_error != Some(kind) {
                        warn!(
                            target: LISTENER_TARGET,
                            error = %error,
                            "socket accept error"
                        );
                    }
                    last_error = Some(kind);
                    tokio::time::sleep(ERROR_BACKOFF).await;
                }
            },
        }
    }

    #[cfg(unix)]
    cleanup_unix_socket(&listener.endpoint);
    info!(target: LISTENER_TARGET, "socket listener stopped");
}

async fn bind_tcp(
    endpoint: &SocketEndpoint,
    host: &str,
    port: u16,
) -> Result<TcpListener, ListenerError> {
    let addr = lookup_host((host, port))
        .await
        .map_err(|source| ListenerError::Resolve {
            endpoint: endpoint.clone(),
            source,
        })?
        .next()
        .ok_or_else(|| ListenerError::Unresolved {
            endpoint: endpoint.clone(),
        })?;
    TcpListener::bind(addr)
        .await
        .map_err(|source| ListenerError::Bind {
            endpoint: endpoint.clone(),
            source,
        })
}

/// Binds `path`, first replacing a socket file left by a daemon that is no
/// longer accepting connections.
#[cfg(unix)]
fn bind_unix(endpoint: &SocketEndpoint, path: &Path) -> Result<UnixListener, ListenerError> {
    if path.exists() {
        reclaim_stale_socket(path).map_err(|reason| match reason {
            Reclaim::Live => ListenerError::DaemonRunning {
                endpoint: endpoint.clone(),
            },
            Reclaim::Failed(reason) => ListenerError::Reclaim {
                endpoint: endpoint.clone(),
                reason,
            },
        })?;
    }
    UnixListener::bind(path).map_err(|source| ListenerError::Bind {
        endpoint: endpoint.clone(),
        source,
    })
}

#[cfg(unix)]
enum Reclaim {
    Live,
    Failed(ReclaimError),
}

#[cfg(unix)]
fn reclaim_stale_socket(path: &Path) -> Result<(), Reclaim> {
    let metadata = fs::symlink_metadata(path)
        .map_err(|error| Reclaim::Failed(ReclaimError::Inspect(error)))?;
    if !metadata.file_type().is_socket() {
        return Err(Reclaim::Failed(ReclaimError::NotASocket));
    }
    match std::os::unix::net::UnixStream::connect(path) {
        Ok(_stream) => Err(Reclaim::Live),
        Err(error)
            if matches!(
                error.kind(),
                io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound
            ) =>
        {
            fs::remove_file(path).map_err(|error| Reclaim::Failed(ReclaimError::Remove(error)))
        }
        Err(error) => Err(Reclaim::Failed(ReclaimError::Liveness(error))),
    }
}

#[cfg(unix)]
fn cleanup_unix_socket(endpoint: &SocketEndpoint) {
    let SocketEndpoint::Unix { path } = endpoint else {
        return;
    };
    if let Err(error) = fs::remove_file(path.as_std_path())
        && error.kind() != io::ErrorKind::NotFound
    {
        warn!(
            target: LISTENER_TARGET,
            error = %error,
            path = %path,
            "failed to remove unix socket file"
        );
    }
}
