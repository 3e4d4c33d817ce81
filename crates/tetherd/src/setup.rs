//! Handshake acceptance and per-session wiring.
//!
//! A [`ChannelSetup`] watches a broad-scope stream of [`InboundEvent`]s. Each
//! event carrying a valid handshake and at least one port becomes a session:
//! the port is started, a fresh registry is bound to it, the host is told an
//! embedded session began, a [`Dispatcher`] is bound to the port, and only
//! then is `zupass-client-ready` posted and the dispatcher spawned.
//! Invocations the peer sends before readiness queue in the port and are
//! answered once the dispatcher runs.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{Instrument, debug, warn};

use tether_protocol::{HandshakeMessage, Message};

use crate::client_channel::ClientChannel;
use crate::context::ExecutionContext;
use crate::dispatch::{DispatchOptions, DispatchSummary, Dispatcher};
use crate::health::HealthReporter;
use crate::port::MessagePort;
use crate::registry::ServiceRegistry;
use crate::services::{self, ServiceScope};
use crate::telemetry;

pub(crate) const SESSION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::session");

/// Identifier assigned to each accepted handshake, unique per setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Numeric value of the identifier.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// A message delivered on the broad-scope source, with any attached ports.
#[derive(Debug)]
pub struct InboundEvent {
    /// Untrusted payload, expected to be a handshake envelope.
    pub data: Value,
    /// Sender origin, recorded for logging only.
    pub origin: Option<String>,
    /// Channel handles delivered with the payload.
    pub ports: Vec<MessagePort>,
}

impl InboundEvent {
    /// Event carrying a single port.
    #[must_use]
    pub fn new(data: Value, port: MessagePort) -> Self {
        Self {
            data,
            origin: None,
            ports: vec![port],
        }
    }

    /// Records the sender origin.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}

/// Host hooks fired as sessions begin.
pub trait HostSignals: Send + Sync {
    /// Called once per session, before its dispatcher is attached.
    fn session_started(&self, session: SessionId, origin: Option<&str>);
}

/// Default host hook: remembers that the host is serving an embedded peer.
#[derive(Debug, Default)]
pub struct EmbeddedMarker {
    embedded: AtomicBool,
}

impl EmbeddedMarker {
    /// Whether any session has started.
    #[must_use]
    pub fn is_embedded(&self) -> bool {
        self.embedded.load(Ordering::SeqCst)
    }
}

impl HostSignals for EmbeddedMarker {
    fn session_started(&self, _session: SessionId, _origin: Option<&str>) {
        self.embedded.store(true, Ordering::SeqCst);
    }
}

/// Builds the registry bound to a new session.
pub type RegistryFactory = Arc<dyn Fn(ServiceScope) -> ServiceRegistry + Send + Sync>;

/// Handle to a running session.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    task: JoinHandle<DispatchSummary>,
}

impl Session {
    /// Identifier of the session.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Whether the session's dispatcher has stopped.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the peer to hang up and in-flight calls to drain.
    ///
    /// # Errors
    ///
    /// Returns the join error if the dispatcher task was cancelled or panicked.
    pub async fn join(self) -> Result<DispatchSummary, JoinError> {
        self.task.await
    }
}

/// Accepts handshakes and spawns one dispatcher per dedicated channel.
pub struct ChannelSetup {
    context: Arc<dyn ExecutionContext>,
    signals: Arc<dyn HostSignals>,
    reporter: Arc<dyn HealthReporter>,
    factory: RegistryFactory,
    options: DispatchOptions,
    next_id: AtomicU64,
}

impl ChannelSetup {
    /// Creates a setup that binds the default services.
    #[must_use]
    pub fn new(
        context: Arc<dyn ExecutionContext>,
        signals: Arc<dyn HostSignals>,
        reporter: Arc<dyn HealthReporter>,
    ) -> Self {
        Self {
            context,
            signals,
            reporter,
            factory: Arc::new(services::build_registry),
            options: DispatchOptions::default(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Replaces the registry shape bound to new sessions.
    #[must_use]
    pub fn with_registry_factory(mut self, factory: RegistryFactory) -> Self {
        self.factory = factory;
        self
    }

    /// Replaces the options applied to every session's dispatcher.
    #[must_use]
    pub fn with_options(mut self, options: DispatchOptions) -> Self {
        self.options = options;
        self
    }

    /// Turns one inbound event into a running session.
    ///
    /// Returns `None`, without replying, when the payload is not a handshake
    /// or no port came with it. Must be called within a tokio runtime.
    pub fn accept(&self, event: InboundEvent) -> Option<Session> {
        let InboundEvent {
            data,
            origin,
            ports,
        } = event;
        let Some(handshake) = HandshakeMessage::validate(&data) else {
            self.reporter.handshake_rejected(origin.as_deref());
            return None;
        };
        let Some(port) = ports.into_iter().next() else {
            debug!(
                target: SESSION_TARGET,
                origin = origin.as_deref().unwrap_or("unknown"),
                "handshake arrived without a port"
            );
            self.reporter.handshake_rejected(origin.as_deref());
            return None;
        };

        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = port.start();
        let scope = ServiceScope::new(
            Arc::clone(&self.context),
            ClientChannel::new(sender.clone()),
            handshake.zapp().cloned(),
            origin.clone(),
        );
        let registry = (self.factory)(scope);

        self.signals.session_started(id, origin.as_deref());
        self.reporter.session_opened(id, origin.as_deref());

        let dispatcher = Dispatcher::new(registry, sender.clone()).with_options(self.options);
        // Queued invocations are only read once the task runs, so readiness
        // always precedes the first response.
        if let Err(error) = sender.post(&Message::ClientReady) {
            warn!(
                target: SESSION_TARGET,
                session = %id,
                error = %error,
                "peer left before readiness was announced"
            );
        }
        let reporter = Arc::clone(&self.reporter);
        let span = telemetry::session_span(id, origin.as_deref());
        let task = tokio::spawn(
            async move {
                let summary = dispatcher.run(receiver).await;
                reporter.session_closed(id, &summary);
                summary
            }
            .instrument(span),
        );

        Some(Session { id, task })
    }

    /// Accepts events until the source closes, then waits for every session
    /// to finish. Returns the number of sessions started.
    pub async fn listen(&self, mut events: mpsc::Receiver<InboundEvent>) -> usize {
        let mut sessions: Vec<Session> = Vec::new();
        let mut started = 0;
        while let Some(event) = events.recv().await {
            sessions.retain(|session| !session.is_finished());
            if let Some(session) = self.accept(event) {
                started += 1;
                sessions.push(session);
            }
        }
        for session in sessions {
            let id = session.id();
            if let Err(error) = session.join().await {
                warn!(
                    target: SESSION_TARGET,
                    session = %id,
                    error = %error,
                    "session task failed"
                );
            }
        }
        started
    }
}
