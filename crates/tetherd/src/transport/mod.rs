//! Socket listener for daemon transport endpoints.
//!
//! The transport module binds to the configured socket endpoint and accepts
//! connections on a background task. Each connection's first JSON line is
//! the handshake; the rest of the connection becomes the session's port.

mod connection;
mod errors;
mod listener;

pub use self::errors::ListenerError;
#[cfg(unix)]
pub use self::errors::ReclaimError;
pub use self::listener::{ListenerHandle, SocketListener};

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
