//! Structured health reporting for daemon and session lifecycle events.

use std::sync::Arc;

use tether_config::Config;

use crate::bootstrap::BootstrapError;
use crate::dispatch::DispatchSummary;
use crate::setup::SessionId;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked once a handshake bound a fresh registry to its channel.
    fn session_opened(&self, session: SessionId, origin: Option<&str>);

    /// Invoked when a session's channel closed and its dispatcher drained.
    fn session_closed(&self, session: SessionId, summary: &DispatchSummary);

    /// Invoked when an inbound event was not a usable handshake.
    fn handshake_rejected(&self, origin: Option<&str>);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn session_opened(&self, session: SessionId, origin: Option<&str>) {
        (**self).session_opened(session, origin);
    }

    fn session_closed(&self, session: SessionId, summary: &DispatchSummary) {
        (**self).session_closed(session, summary);
    }

    fn handshake_rejected(&self, origin: Option<&str>) {
        (**self).handshake_rejected(origin);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting bridge bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            socket = %config.daemon_socket(),
            log_filter = %config.log_filter(),
            log_format = %config.log_format(),
            invoke_timeout_ms = ?config.invoke_timeout_ms,
            "bridge bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "bridge bootstrap failed"
        );
    }

    fn session_opened(&self, session: SessionId, origin: Option<&str>) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "session_opened",
            session = %session,
            origin = origin.unwrap_or("unknown"),
            "embedded session started"
        );
    }

    fn session_closed(&self, session: SessionId, summary: &DispatchSummary) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "session_closed",
            session = %session,
            handled = summary.handled,
            dropped = summary.dropped,
            ignored = summary.ignored,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "embedded session closed"
        );
    }

    fn handshake_rejected(&self, origin: Option<&str>) {
        tracing::debug!(
            target: HEALTH_TARGET,
            event = "handshake_rejected",
            origin = origin.unwrap_or("unknown"),
            "ignoring inbound event that is not a handshake"
        );
    }
}
