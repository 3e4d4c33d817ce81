//! Configuration that cannot be parsed stops loading instead of falling back
//! to defaults, and every failing layer is reported.

use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use once_cell::sync::Lazy;
use ortho_config::OrthoError;
use rstest::{fixture, rstest};
use tempfile::TempDir;
use tether_config::Config;

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Scratch space plus exclusive, self-restoring access to the environment.
struct Sandbox {
    dir: TempDir,
    restore: Vec<(&'static str, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl Sandbox {
    fn file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, contents).expect("write configuration file");
        path
    }

    fn set_env(&mut self, key: &'static str, value: impl Into<OsString>) {
        self.restore.push((key, std::env::var_os(key)));
        // Edition 2024 marks environment mutation `unsafe`; `ENV_MUTEX`
        // serialises it and `Drop` puts the previous values back.
        unsafe { std::env::set_var(key, value.into()) };
    }

    fn load(&self, flags: &[OsString]) -> Result<Config, std::sync::Arc<OrthoError>> {
        let args = std::iter::once(OsString::from("tetherd")).chain(flags.iter().cloned());
        Config::load_from_args(args)
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        for (key, previous) in self.restore.drain(..).rev() {
            match previous {
                Some(value) => unsafe { std::env::set_var(key, value) },
                None => unsafe { std::env::remove_var(key) },
            }
        }
    }
}

#[fixture]
fn sandbox() -> Sandbox {
    Sandbox {
        dir: TempDir::new().expect("create temp dir"),
        restore: Vec::new(),
        _guard: ENV_MUTEX.lock().unwrap_or_else(|poisoned| poisoned.into_inner()),
    }
}

fn flags(values: &[&str]) -> Vec<OsString> {
    values.iter().map(OsString::from).collect()
}

#[rstest]
#[case::timeout_not_a_number(&["--invoke-timeout-ms", "soon"])]
#[case::negative_timeout(&["--invoke-timeout-ms", "-5"])]
#[case::unknown_scheme(&["--daemon-socket", "ftp://127.0.0.1:1"])]
#[case::tcp_without_port(&["--daemon-socket", "tcp://127.0.0.1"])]
fn invalid_flags_fail_loading(sandbox: Sandbox, #[case] values: &[&str]) {
    assert!(sandbox.load(&flags(values)).is_err(), "{values:?} should be rejected");
}

#[rstest]
fn invalid_timeout_in_the_environment_fails_loading(mut sandbox: Sandbox) {
    sandbox.set_env("TETHER_INVOKE_TIMEOUT_MS", "in a bit");
    assert!(sandbox.load(&[]).is_err());
}

#[rstest]
fn mistyped_timeout_in_a_file_fails_loading(sandbox: Sandbox) {
    let path = sandbox.file("tether.toml", "invoke_timeout_ms = \"1500\"\n");
    let args = vec![OsString::from("--config-path"), path.into_os_string()];
    assert!(sandbox.load(&args).is_err());
}

#[rstest]
fn every_malformed_file_is_reported(mut sandbox: Sandbox) {
    let flagged = sandbox.file(
        "flagged.toml",
        "daemon_socket = { transport = \"tcp\" host = \"127.0.0.1\" }",
    );
    let from_env = sandbox.file("from_env.toml", "invoke_timeout_ms = [");
    sandbox.set_env("TETHER_CONFIG_PATH", from_env.clone());

    let error = sandbox
        .load(&[OsString::from("--config-path"), flagged.clone().into_os_string()])
        .expect_err("loading must fail");

    let OrthoError::Aggregate(aggregate) = error.as_ref() else {
        panic!("expected an aggregated error, got {error:?}");
    };
    let reported: Vec<PathBuf> = aggregate
        .iter()
        .filter_map(|failure| match failure {
            OrthoError::File { path, .. } => Some(path.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(reported.len(), 2, "both files should be reported: {reported:?}");
    assert!(reported.contains(&flagged));
    assert!(reported.contains(&from_env));
}
