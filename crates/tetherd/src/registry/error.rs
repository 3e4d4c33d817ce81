//! Errors raised by registry lookup and capability methods.

use thiserror::Error;

use super::args::ArgumentError;
use crate::context::ContextError;

/// Dotted path did not name a callable method.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Unknown service, unknown method, or an empty method name.
    #[error("Function not found")]
    FunctionNotFound { function: String },
}

/// Failure reported by a capability method.
///
/// The display text is what the peer sees after the `Error: ` prefix.
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// The capability exists but has no implementation yet.
    #[error("Not implemented")]
    NotImplemented,
    /// Arguments did not match the method's declared parameters.
    #[error("Invalid arguments for {method}")]
    InvalidArguments {
        method: String,
        #[source]
        reason: ArgumentError,
    },
    /// The path addressed a record id but none was present.
    #[error("No PCD ID found in path")]
    MissingId,
    /// The addressed record does not exist.
    #[error("PCD with ID {id} does not exist")]
    NotFound { id: String },
    /// The execution context rejected a mutation.
    #[error(transparent)]
    Context(#[from] ContextError),
    /// Free-form failure from an external collaborator.
    #[error("{0}")]
    Failed(String),
    /// The method's return value could not be encoded.
    #[error("failed to encode result: {0}")]
    Encode(#[source] serde_json::Error),
}
