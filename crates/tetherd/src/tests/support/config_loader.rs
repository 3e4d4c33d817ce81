//! Configuration loaders that read a fixed argument list.

use std::ffi::OsString;
use std::sync::Arc;

use ortho_config::OrthoError;
use tempfile::TempDir;
use tether_config::Config;

use crate::bootstrap::ConfigLoader;

/// Resolves configuration from flags exactly as `tetherd` would from argv.
pub struct FlagConfigLoader {
    flags: Vec<OsString>,
    _socket_dir: Option<TempDir>,
}

impl FlagConfigLoader {
    /// Uses `flags` verbatim.
    pub fn new(flags: &[&str]) -> Self {
        Self {
            flags: flags.iter().map(OsString::from).collect(),
            _socket_dir: None,
        }
    }

    /// Points the daemon at a Unix socket in a not-yet-created directory
    /// under a fresh temporary directory, then appends `flags`.
    pub fn with_temp_socket(flags: &[&str]) -> Self {
        let dir = TempDir::new().expect("temporary socket directory");
        let socket = dir.path().join("run").join("tetherd.sock");
        let socket = socket.to_str().expect("temporary path is UTF-8");
        let mut loader = Self::new(&["--daemon-socket", &format!("unix://{socket}")]);
        loader.flags.extend(flags.iter().map(OsString::from));
        loader._socket_dir = Some(dir);
        loader
    }
}

impl ConfigLoader for FlagConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let argv = std::iter::once(OsString::from("tetherd")).chain(self.flags.iter().cloned());
        Config::load_from_args(argv)
    }
}
