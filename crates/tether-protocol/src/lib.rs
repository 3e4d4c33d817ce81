//! Wire schema for the Tether bridge.
//!
//! Two message families cross the bridge. A [`HandshakeMessage`] arrives once
//! on the broad-scope transport and carries the dedicated channel; every
//! subsequent exchange on that channel is a [`Message`]. Field names and
//! `type` discriminators are fixed by existing counterparties, so the serde
//! attributes here are the source of truth for interoperability.
//!
//! Channel messages travel as JSON lines. The [`frame`] helpers share the
//! framing and size limits between the daemon and the CLI.
//!
//! ```json
//! {"type":"zupass-client-invoke","fn":"fs.get","args":["folder/abc"],"serial":3}
//! {"type":"zupass-client-invoke-result","result":{"type":"pod-pcd","pcd":"..."},"serial":3}
//! ```

mod error;
pub mod frame;
mod handshake;
mod message;

pub use error::SchemaError;
pub use handshake::HandshakeMessage;
pub use message::{FunctionPath, Invoke, InvokeError, InvokeResult, Message, Serial};
