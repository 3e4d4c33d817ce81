//! Built-in values for the lowest configuration layer.
//!
//! The daemon socket lives in a per-user directory so that two users on one
//! host never share a bridge: the XDG runtime directory when there is one,
//! otherwise a `uid-<euid>` namespace under the temporary directory.
//! Platforms without Unix sockets fall back to a loopback TCP port.

use crate::logging::LogFormat;
use crate::socket::SocketEndpoint;

/// Loopback port used when Unix domain sockets are not available.
pub const DEFAULT_TCP_PORT: u16 = 9787;

/// Filter applied to daemon telemetry unless overridden.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Directory, below the per-user base, holding the daemon socket.
pub const SOCKET_DIRECTORY: &str = "tether";

/// File name of the daemon socket.
pub const SOCKET_FILE_NAME: &str = "tetherd.sock";

/// Owned copy of [`DEFAULT_LOG_FILTER`] for the configuration default.
#[must_use]
pub fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Telemetry is emitted as JSON lines unless overridden.
#[must_use]
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Endpoint the daemon listens on and the CLI dials when none is configured.
#[must_use]
pub fn default_socket_endpoint() -> SocketEndpoint {
    #[cfg(unix)]
    {
        SocketEndpoint::unix(unix::socket_directory().join(SOCKET_FILE_NAME))
    }

    #[cfg(not(unix))]
    {
        SocketEndpoint::tcp("127.0.0.1", DEFAULT_TCP_PORT)
    }
}

#[cfg(unix)]
mod unix {
    use camino::Utf8PathBuf;

    use super::SOCKET_DIRECTORY;

    pub(super) fn socket_directory() -> Utf8PathBuf {
        match runtime_directory() {
            Some(runtime) => runtime.join(SOCKET_DIRECTORY),
            None => shared_temp_directory()
                .join(SOCKET_DIRECTORY)
                .join(user_namespace()),
        }
    }

    fn runtime_directory() -> Option<Utf8PathBuf> {
        dirs::runtime_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
    }

    fn shared_temp_directory() -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(std::env::temp_dir()).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
    }

    fn user_namespace() -> String {
        // SAFETY: `geteuid` has no preconditions and cannot fail.
        let uid = unsafe { libc::geteuid() };
        format!("uid-{uid}")
    }
}
