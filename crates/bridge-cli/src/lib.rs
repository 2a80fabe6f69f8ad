//! Command-line interface runtime for the Unity Bridge client.
//!
//! The runtime owns argument parsing, configuration bootstrapping, parameter
//! assembly, and reply rendering. It can be driven from the binary entrypoint
//! or from tests, where configuration loading and IO streams are substituted.

use std::ffi::OsString;
use std::io::{BufRead, Write};
use std::process::ExitCode;
use std::time::Duration;

use bridge_client::{BridgeClient, Failure, FailureReason, Response};
use bridge_config::Config;
use clap::Parser;

mod batch;
mod cli;
mod config;
mod errors;
mod output;
mod params;
mod telemetry;

use cli::Cli;
use config::{command_arguments, split_config_arguments};
pub(crate) use config::{ConfigLoader, OrthoConfigLoader};
pub(crate) use errors::AppError;
use output::{OutputStyle, emit_aliases, exit_code_for, write_response};

/// CLI flags recognised by the configuration loader.
///
/// MAINTENANCE: keep in sync with the fields of `bridge_config::Config`.
const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--status-dirs",
    "--request-timeout-secs",
    "--log-filter",
    "--log-format",
];

const CLI_TARGET: &str = "unity_bridge::cli";

/// Bundles the IO streams provided to the CLI runtime.
pub(crate) struct IoStreams<'a, R: BufRead, W: Write, E: Write> {
    pub(crate) stdin: &'a mut R,
    pub(crate) stdout: &'a mut W,
    pub(crate) stderr: &'a mut E,
}

impl<'a, R: BufRead, W: Write, E: Write> IoStreams<'a, R, W, E> {
    pub(crate) fn new(stdin: &'a mut R, stdout: &'a mut W, stderr: &'a mut E) -> Self {
        Self {
            stdin,
            stdout,
            stderr,
        }
    }
}

struct CliRunner<'a, R: BufRead, W: Write, E: Write, L: ConfigLoader> {
    io: IoStreams<'a, R, W, E>,
    loader: &'a L,
}

impl<'a, R, W, E, L> CliRunner<'a, R, W, E, L>
where
    R: BufRead,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    const fn new(io: IoStreams<'a, R, W, E>, loader: &'a L) -> Self {
        Self { io, loader }
    }

    #[expect(
        clippy::let_underscore_must_use,
        reason = "failures writing the final message have nowhere left to go"
    )]
    fn run<I>(&mut self, arguments: I) -> ExitCode
    where
        I: IntoIterator<Item = OsString>,
    {
        let args: Vec<OsString> = arguments.into_iter().collect();
        let split = split_config_arguments(&args);
        let cli_arguments = command_arguments(&args, &split);

        let result = Cli::try_parse_from(cli_arguments)
            .map_err(AppError::CliUsage)
            .and_then(|cli| {
                self.loader
                    .load(&split.config_arguments)
                    .map(|config| (cli, config))
            })
            .and_then(|(cli, config)| self.execute(cli, &config));

        match result {
            Ok(exit_code) => exit_code,
            Err(error) if error.is_informational() => {
                let _ = write!(self.io.stdout, "{error}");
                let _ = self.io.stdout.flush();
                ExitCode::SUCCESS
            }
            Err(error) => {
                let _ = writeln!(self.io.stderr, "{error}");
                ExitCode::FAILURE
            }
        }
    }

    fn execute(&mut self, cli: Cli, config: &Config) -> Result<ExitCode, AppError> {
        telemetry::initialise(config)?;
        let mut client = BridgeClient::from_config(config);

        if cli.list_aliases {
            emit_aliases(self.io.stdout, client.resolver())?;
            return Ok(ExitCode::SUCCESS);
        }

        let timeout = cli
            .timeout
            .map_or_else(|| config.request_timeout(), Duration::from_secs);

        if cli.batch {
            return batch::run_batch(&mut client, self.io.stdin, self.io.stdout, timeout);
        }

        let response = match params::build_params(cli.params.as_deref(), &cli.arguments) {
            Ok(params) => client.send_command(&cli.command, params, timeout),
            Err(error) => Response::from(Failure::new(
                FailureReason::InvalidParams,
                error.to_string(),
            )),
        };
        client.close();

        write_response(
            self.io.stdout,
            &response,
            OutputStyle::from_pretty(cli.pretty),
        )?;
        Ok(exit_code_for(&response))
    }
}

/// Runs the CLI using the provided arguments and IO handles.
#[must_use]
pub fn run<I, R, W, E>(args: I, stdin: &mut R, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    R: BufRead,
    W: Write,
    E: Write,
{
    let io = IoStreams::new(stdin, stdout, stderr);
    run_with_loader(args, io, &OrthoConfigLoader)
}

/// Runs the CLI with a custom configuration loader.
#[must_use]
pub(crate) fn run_with_loader<I, R, W, E, L>(
    args: I,
    io: IoStreams<'_, R, W, E>,
    loader: &L,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    R: BufRead,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    CliRunner::new(io, loader).run(args)
}

#[cfg(test)]
mod tests;
