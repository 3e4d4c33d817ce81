//! Failures of a single invocation.
//!
//! Each variant renders as the `error` string of exactly one `InvokeError`
//! carrying the invocation's serial.

use thiserror::Error;

use crate::registry::{CapabilityError, ResolveError};

/// Why an invocation produced an error response.
#[derive(Debug, Error)]
pub enum CallError {
    /// The dotted path did not resolve.
    #[error(transparent)]
    NotFound(#[from] ResolveError),
    /// The capability method failed.
    #[error("Error: {0}")]
    Capability(#[from] CapabilityError),
    /// The configured deadline elapsed first.
    #[error("Error: Invocation timed out after {millis} ms")]
    TimedOut { millis: u128 },
    /// The capability method panicked.
    #[error("Error: capability panicked")]
    Panicked,
}
