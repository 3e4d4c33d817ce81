//! Bridge daemon that serves capability invocations to embedded peers.
//!
//! A peer opens a session with a `zupass-client-connect` handshake. The
//! daemon then binds a fresh [`ServiceRegistry`] to the session's dedicated
//! channel and answers every `zupass-client-invoke` on it with exactly one
//! correlated `zupass-client-invoke-result` or `zupass-client-invoke-error`.
//!
//! The crate is layered so hosts can embed the bridge without the socket
//! transport:
//!
//! - [`port`] provides the dedicated duplex channel ([`MessagePort`]) and a
//!   JSON-lines adapter for byte streams.
//! - [`setup`] validates handshakes and wires one session per port.
//! - [`registry`] and [`services`] define the callable service tree.
//! - [`dispatch`] runs the per-channel invocation loop.
//! - [`transport`] and [`run_daemon`] expose the bridge on the configured
//!   socket endpoint.
//!
//! Configuration comes from [`tether_config`]; telemetry is structured
//! `tracing` output configured once during [`bootstrap_with`].

mod bootstrap;
mod client_channel;
pub mod context;
pub mod dispatch;
mod health;
pub mod port;
mod process;
pub mod registry;
pub mod services;
pub mod setup;
mod telemetry;
pub mod transport;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use client_channel::ClientChannel;
pub use context::{Action, ContextError, ExecutionContext, HostState, MemoryContext};
pub use dispatch::{CallError, DispatchOptions, DispatchSummary, Dispatcher};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use port::{MessageChannel, MessagePort, PortError, PortReceiver, PortSender};
pub use process::{LaunchError, run_daemon, serve};
pub use registry::{CapabilityError, ServiceBuilder, ServiceRegistry};
pub use services::{ServiceScope, build_registry};
pub use setup::{ChannelSetup, EmbeddedMarker, HostSignals, InboundEvent, Session, SessionId};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
