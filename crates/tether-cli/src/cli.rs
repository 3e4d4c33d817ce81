//! CLI argument definitions for the `tether` binary.

use clap::{Parser, Subcommand};

/// Command-line interface for the Tether bridge.
#[derive(Parser, Debug)]
#[command(name = "tether", disable_help_subcommand = true)]
pub(crate) struct Cli {
    /// Operation to perform.
    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

/// Structured subcommands for the Tether CLI.
#[derive(Subcommand, Debug, Clone)]
pub(crate) enum CliCommand {
    /// Invokes a capability method through the daemon and prints the result.
    Invoke {
        /// JSON descriptor of the application, sent with the handshake.
        #[arg(long, value_name = "JSON")]
        zapp: Option<String>,
        /// Dotted function path (for example `fs.get`).
        #[arg(value_name = "FUNCTION")]
        function: String,
        /// Positional arguments; each is parsed as JSON, or passed as a
        /// string when it is not valid JSON.
        #[arg(
            value_name = "ARG",
            num_args = 0..,
            trailing_var_arg = true,
            allow_hyphen_values = true
        )]
        arguments: Vec<String>,
    },
    /// Lists every callable path of the default service registry.
    Paths,
}
