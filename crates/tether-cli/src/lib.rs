//! Command-line interface and host-side client for the Tether bridge.
//!
//! The crate owns argument parsing, configuration bootstrapping and the
//! [`BridgeClient`] that speaks the handshake and invocation protocol to a
//! running `tetherd`. The runtime is designed to be exercised both from the
//! binary entrypoint and from tests where configuration loading and IO
//! streams can be substituted.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use serde_json::Value;
use tether_config::Config;

mod cli;
mod client;
mod config;
mod errors;
mod transport;

use cli::{Cli, CliCommand};
pub use client::{BridgeClient, ClientError, ControlEvent, READY_TIMEOUT};
use config::{ConfigArgumentSplit, split_config_arguments};
pub(crate) use config::{ConfigLoader, OrthoConfigLoader};
pub use errors::AppError;

/// CLI flags recognised by the configuration loader.
///
/// MAINTENANCE: This list must be kept in sync with the configuration flags
/// defined in `tether-config`.
const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--daemon-socket",
    "--log-filter",
    "--log-format",
    "--invoke-timeout-ms",
];

/// Bundles the IO streams provided to the CLI runtime.
pub(crate) struct IoStreams<'a, W: Write, E: Write> {
    pub(crate) stdout: &'a mut W,
    pub(crate) stderr: &'a mut E,
}

impl<'a, W: Write, E: Write> IoStreams<'a, W, E> {
    pub(crate) fn new(stdout: &'a mut W, stderr: &'a mut E) -> Self {
        Self { stdout, stderr }
    }
}

struct CliRunner<'a, W: Write, E: Write, L: ConfigLoader> {
    io: &'a mut IoStreams<'a, W, E>,
    loader: &'a L,
}

impl<'a, W, E, L> CliRunner<'a, W, E, L>
where
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    fn new(io: &'a mut IoStreams<'a, W, E>, loader: &'a L) -> Self {
        Self { io, loader }
    }

    fn run<I>(&mut self, args: I) -> ExitCode
    where
        I: IntoIterator<Item = OsString>,
    {
        let args: Vec<OsString> = args.into_iter().collect();
        let split = split_config_arguments(&args);
        let cli_arguments = prepare_cli_arguments(&args, &split);

        let result = Cli::try_parse_from(cli_arguments)
            .map_err(AppError::CliUsage)
            .and_then(|cli| match cli.command {
                CliCommand::Paths => emit_paths(&mut *self.io.stdout),
                CliCommand::Invoke {
                    zapp,
                    function,
                    arguments,
                } => {
                    let config = self.loader.load(&split.config_arguments)?;
                    let zapp = zapp
                        .as_deref()
                        .map(serde_json::from_str)
                        .transpose()
                        .map_err(AppError::InvalidZapp)?;
                    let args = arguments.iter().map(|raw| parse_argument(raw)).collect();
                    let result = invoke_once(&config, zapp, &function, args)?;
                    emit_json(&mut *self.io.stdout, &result)
                }
            });

        match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(AppError::CliUsage(error)) if !error.use_stderr() => {
                let _ = write!(self.io.stdout, "{error}");
                ExitCode::SUCCESS
            }
            Err(error) => {
                let _ = writeln!(self.io.stderr, "{error}");
                ExitCode::FAILURE
            }
        }
    }
}

/// Runs the CLI using the provided arguments and IO handles.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let mut io = IoStreams::new(stdout, stderr);
    run_with_loader(args, &mut io, &OrthoConfigLoader)
}

/// Runs the CLI with a custom configuration loader.
#[must_use]
pub(crate) fn run_with_loader<'a, I, W, E, L>(
    args: I,
    io: &'a mut IoStreams<'a, W, E>,
    loader: &'a L,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    CliRunner::new(io, loader).run(args)
}

fn prepare_cli_arguments(args: &[OsString], split: &ConfigArgumentSplit) -> Vec<OsString> {
    args.iter()
        .take(1)
        .chain(args.iter().skip(split.command_start))
        .cloned()
        .collect()
}

/// Reads a command-line argument as JSON, falling back to a plain string.
fn parse_argument(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()))
}

fn invoke_once(
    config: &Config,
    zapp: Option<Value>,
    function: &str,
    args: Vec<Value>,
) -> Result<Value, AppError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(AppError::Runtime)?;
    runtime.block_on(async {
        let client = BridgeClient::connect(config.daemon_socket(), zapp).await?;
        Ok::<_, AppError>(client.invoke(function, args).await?)
    })
}

/// Paths served by a freshly built default registry.
fn default_paths() -> Vec<String> {
    let (port, _peer) = tetherd::MessageChannel::pair();
    let (sender, _receiver) = port.start();
    let scope = tetherd::ServiceScope::new(
        Arc::new(tetherd::MemoryContext::new()),
        tetherd::ClientChannel::new(sender),
        None,
        None,
    );
    tetherd::build_registry(scope).paths()
}

fn emit_paths<W: Write>(stdout: &mut W) -> Result<(), AppError> {
    for path in default_paths() {
        writeln!(stdout, "{path}").map_err(AppError::EmitOutput)?;
    }
    stdout.flush().map_err(AppError::EmitOutput)
}

fn emit_json<W: Write>(stdout: &mut W, value: &Value) -> Result<(), AppError> {
    serde_json::to_writer_pretty(&mut *stdout, value).map_err(AppError::SerialiseResult)?;
    stdout.write_all(b"\n").map_err(AppError::EmitOutput)?;
    stdout.flush().map_err(AppError::EmitOutput)
}
