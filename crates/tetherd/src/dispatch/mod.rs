//! Invocation dispatch for an established channel.
//!
//! The dispatcher reads untyped payloads from a session's port, keeps only
//! `zupass-client-invoke` messages, resolves the dotted `fn` path against the
//! session's registry and posts exactly one correlated response per serial:
//!
//! ```json
//! {"type":"zupass-client-invoke","fn":"identity.getIdentityCommitment","args":[],"serial":7}
//! {"type":"zupass-client-invoke-result","result":100,"serial":7}
//! ```
//!
//! Failures never stop the loop. Unknown paths answer `Function not found`;
//! capability failures, panics and deadline expiry answer `Error: <message>`.

mod dispatcher;
mod errors;

pub use self::dispatcher::{DispatchOptions, DispatchSummary, Dispatcher, PendingCall};
pub use self::errors::CallError;

const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
