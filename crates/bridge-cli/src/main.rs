//! CLI entrypoint for `unity-bridge`.
//!
//! Delegates to [`bridge_cli::run`], which loads configuration, sends one
//! command (or a batch read from stdin), and prints the JSON reply.

use std::io::{self, StderrLock, StdinLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdin: StdinLock<'_> = io::stdin().lock();
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    bridge_cli::run(std::env::args_os(), &mut stdin, &mut stdout, &mut stderr)
}
