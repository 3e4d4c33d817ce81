//! Test double for [`HealthReporter`] that records structured events for assertions.

use std::sync::Mutex;

use tether_config::Config;

use crate::bootstrap::BootstrapError;
use crate::dispatch::DispatchSummary;
use crate::health::HealthReporter;
use crate::setup::SessionId;

/// Structured health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    /// Bootstrap started.
    BootstrapStarting,
    /// Bootstrap completed successfully.
    BootstrapSucceeded,
    /// Bootstrap failed with an error description.
    BootstrapFailed(String),
    /// A handshake opened a session.
    SessionOpened(SessionId),
    /// A session's channel closed.
    SessionClosed(SessionId, DispatchSummary),
    /// An inbound event was discarded.
    HandshakeRejected,
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    pub fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn session_opened(&self, session: SessionId, _origin: Option<&str>) {
        self.record(HealthEvent::SessionOpened(session));
    }

    fn session_closed(&self, session: SessionId, summary: &DispatchSummary) {
        self.record(HealthEvent::SessionClosed(session, *summary));
    }

    fn handshake_rejected(&self, _origin: Option<&str>) {
        self.record(HealthEvent::HandshakeRejected);
    }
}
