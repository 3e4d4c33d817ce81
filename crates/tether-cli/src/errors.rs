//! Error types for the CLI runtime.

use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::ClientError;

/// Failures surfaced by the `tether` binary.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration layers failed to load.
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    /// Arguments did not match the command grammar.
    #[error("{0}")]
    CliUsage(clap::Error),
    /// The `--zapp` descriptor was not valid JSON.
    #[error("the --zapp descriptor must be valid JSON: {0}")]
    InvalidZapp(serde_json::Error),
    /// The async runtime could not be started.
    #[error("failed to start runtime: {0}")]
    Runtime(io::Error),
    /// The bridge session failed.
    #[error(transparent)]
    Client(#[from] ClientError),
    /// The invocation result could not be rendered.
    #[error("failed to serialise result: {0}")]
    SerialiseResult(serde_json::Error),
    /// Output could not be written.
    #[error("failed to write output: {0}")]
    EmitOutput(io::Error),
}
