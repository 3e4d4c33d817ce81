//! Test harness utilities shared by the daemon suites.

mod config_loader;
mod context;
mod peer;
mod reporter;

pub use config_loader::FlagConfigLoader;
pub use context::RecordingContext;
pub use peer::{Peer, connect_peer};
pub use reporter::{HealthEvent, RecordingHealthReporter};
