//! CLI argument definitions for `unity-bridge`.

use bridge_client::MAX_TIMEOUT;
use clap::Parser;

/// Command sent when none is given.
pub(crate) const DEFAULT_COMMAND: &str = "ping";

const MAX_TIMEOUT_SECS: u64 = MAX_TIMEOUT.as_secs();

/// Sends one command to the Unity Bridge Lite endpoint and prints the reply.
#[derive(Parser, Debug)]
#[command(name = "unity-bridge", version)]
pub(crate) struct Cli {
    /// Command to send; short aliases such as `rotate` are accepted.
    #[arg(value_name = "COMMAND", default_value = DEFAULT_COMMAND)]
    pub(crate) command: String,
    /// Parameter overrides; values are parsed as JSON when possible.
    #[arg(value_name = "KEY=VALUE", num_args = 0..)]
    pub(crate) arguments: Vec<String>,
    /// Parameters as a JSON object, applied before any KEY=VALUE overrides.
    #[arg(short = 'p', long = "params", value_name = "JSON")]
    pub(crate) params: Option<String>,
    /// Seconds to wait for the reply.
    #[arg(
        short = 't',
        long,
        value_name = "SECONDS",
        value_parser = clap::value_parser!(u64).range(1..=MAX_TIMEOUT_SECS)
    )]
    pub(crate) timeout: Option<u64>,
    /// Pretty-prints the JSON reply.
    #[arg(long)]
    pub(crate) pretty: bool,
    /// Prints the alias table and exits.
    #[arg(long, conflicts_with_all = ["batch", "params"])]
    pub(crate) list_aliases: bool,
    /// Reads one JSON request per line from stdin and sends each in turn.
    #[arg(long, conflicts_with_all = ["params", "pretty"])]
    pub(crate) batch: bool,
}
