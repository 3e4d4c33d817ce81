//! Shared configuration for the Tether bridge daemon and its CLI.
//!
//! Configuration is layered by [`ortho_config`]: built-in defaults, then an
//! optional TOML file (`--config-path` or `TETHER_CONFIG_PATH`), then
//! `TETHER_*` environment variables, then command-line flags. Both binaries
//! load the same [`Config`] so they agree on the socket the daemon listens
//! on.

use std::sync::Arc;
use std::time::Duration;

use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};

mod defaults;
mod logging;
mod socket;

pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_TCP_PORT, SOCKET_DIRECTORY, SOCKET_FILE_NAME, default_log_filter,
    default_log_format, default_socket_endpoint,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Resolved configuration shared by `tetherd` and `tether`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "TETHER")]
pub struct Config {
    /// Endpoint the daemon listens on for handshakes.
    #[ortho_config(default = default_socket_endpoint())]
    pub daemon_socket: SocketEndpoint,
    /// `tracing` filter expression applied to daemon telemetry.
    #[ortho_config(default = default_log_filter())]
    pub log_filter: String,
    /// Output format for daemon telemetry.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// Optional deadline applied to every capability invocation.
    pub invoke_timeout_ms: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon_socket: default_socket_endpoint(),
            log_filter: default_log_filter(),
            log_format: default_log_format(),
            invoke_timeout_ms: None,
        }
    }
}

impl Config {
    /// Loads configuration from an explicit argument list and the process
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns the aggregated loader error when any layer fails to parse.
    pub fn load_from_args<I, T>(args: I) -> Result<Self, Arc<OrthoError>>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as OrthoConfig>::load_from_iter(args)
    }

    /// Endpoint the daemon listens on.
    #[must_use]
    pub fn daemon_socket(&self) -> &SocketEndpoint {
        &self.daemon_socket
    }

    /// Filter expression for telemetry.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Telemetry output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Per-call deadline, when one is configured.
    #[must_use]
    pub fn invoke_timeout(&self) -> Option<Duration> {
        self.invoke_timeout_ms.map(Duration::from_millis)
    }
}
