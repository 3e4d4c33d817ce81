//! CLI entrypoint for the Tether bridge.
//!
//! The binary delegates to [`tether_cli::run`], which loads configuration,
//! parses command-line arguments and talks to the configured daemon socket.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    tether_cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}
