//! Supervises daemon launch sequencing and runtime orchestration.

use std::future::Future;
use std::io;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::info;

use crate::bootstrap::{BootstrapError, SystemConfigLoader, bootstrap_with};
use crate::context::{ExecutionContext, MemoryContext};
use crate::dispatch::DispatchOptions;
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::setup::{ChannelSetup, EmbeddedMarker};
use crate::transport::{ListenerError, SocketListener};

const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");

/// Handshakes accepted by the listener but not yet taken by channel setup.
const EVENT_BACKLOG: usize = 64;

/// Errors surfaced while launching or supervising the daemon process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Bootstrapping the daemon failed.
    #[error("daemon bootstrap failed: {source}")]
    Bootstrap {
        /// Underlying bootstrap error.
        #[source]
        source: BootstrapError,
    },
    /// Socket listener startup failed.
    #[error("daemon socket listener failed: {source}")]
    Listener {
        /// Underlying listener error.
        #[source]
        source: ListenerError,
    },
    /// Installing the termination signal handler failed.
    #[error("failed to install signal handlers: {source}")]
    Signal {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl From<BootstrapError> for LaunchError {
    fn from(source: BootstrapError) -> Self {
        Self::Bootstrap { source }
    }
}

impl From<ListenerError> for LaunchError {
    fn from(source: ListenerError) -> Self {
        Self::Listener { source }
    }
}

/// Runs the daemon using the production collaborators until a termination
/// signal arrives.
pub async fn run_daemon() -> Result<(), LaunchError> {
    let reporter: Arc<dyn HealthReporter> = Arc::new(StructuredHealthReporter::new());
    let daemon = bootstrap_with(&SystemConfigLoader, reporter)?;
    let listener = SocketListener::bind(daemon.config().daemon_socket()).await?;
    let context: Arc<dyn ExecutionContext> = Arc::new(MemoryContext::new());
    let setup = ChannelSetup::new(context, Arc::new(EmbeddedMarker::default()), daemon.reporter())
        .with_options(DispatchOptions::from_config(daemon.config()));
    let shutdown = termination_signal()?;
    serve(listener, setup, shutdown).await
}

/// Serves handshakes from `listener` until `shutdown` resolves.
pub async fn serve<F>(
    listener: SocketListener,
    setup: ChannelSetup,
    shutdown: F,
) -> Result<(), LaunchError>
where
    F: Future<Output = ()>,
{
    let (events_tx, events_rx) = mpsc::channel(EVENT_BACKLOG);
    let handle = listener.start(events_tx);
    let serving = setup.listen(events_rx);
    tokio::pin!(serving);
    tokio::select! {
        () = shutdown => {
            info!(target: PROCESS_TARGET, "shutdown signal received");
        }
        started = &mut serving => {
            info!(target: PROCESS_TARGET, sessions = started, "handshake source closed");
        }
    }
    handle.shutdown();
    handle.join().await?;
    info!(target: PROCESS_TARGET, "shutdown sequence completed");
    Ok(())
}

#[cfg(unix)]
fn termination_signal() -> Result<impl Future<Output = ()>, LaunchError> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate =
        signal(SignalKind::terminate()).map_err(|source| LaunchError::Signal { source })?;
    Ok(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = terminate.recv() => {}
        }
    })
}

#[cfg(not(unix))]
fn termination_signal() -> Result<impl Future<Output = ()>, LaunchError> {
    Ok(async {
        let _ = tokio::signal::ctrl_c().await;
    })
}
