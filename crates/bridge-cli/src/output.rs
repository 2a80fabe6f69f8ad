//! Rendering of replies and the alias table on stdout.

use std::io::Write;
use std::process::ExitCode;

use bridge_client::{AliasResolver, Response};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::AppError;

/// JSON layout for replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutputStyle {
    /// One line per reply.
    Compact,
    /// Indented with two spaces.
    Pretty,
}

impl OutputStyle {
    pub(crate) const fn from_pretty(pretty: bool) -> Self {
        if pretty { Self::Pretty } else { Self::Compact }
    }
}

/// Writes `response` followed by a newline and flushes.
pub(crate) fn write_response<W>(
    stdout: &mut W,
    response: &Response,
    style: OutputStyle,
) -> Result<(), AppError>
where
    W: Write,
{
    write_json(stdout, response, style)
}

/// Writes the alias table as a JSON object mapping alias to command.
pub(crate) fn emit_aliases<W>(stdout: &mut W, resolver: &AliasResolver) -> Result<(), AppError>
where
    W: Write,
{
    let table: Map<String, Value> = resolver
        .aliases()
        .map(|(alias, canonical)| (alias.to_owned(), Value::from(canonical)))
        .collect();
    write_json(stdout, &table, OutputStyle::Pretty)
}

/// Exit status for a reply: success only when the endpoint reported success.
pub(crate) fn exit_code_for(response: &Response) -> ExitCode {
    if response.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn write_json<W, T>(stdout: &mut W, value: &T, style: OutputStyle) -> Result<(), AppError>
where
    W: Write,
    T: Serialize + ?Sized,
{
    match style {
        OutputStyle::Compact => serde_json::to_writer(&mut *stdout, value),
        OutputStyle::Pretty => serde_json::to_writer_pretty(&mut *stdout, value),
    }
    .map_err(AppError::SerialiseResponse)?;
    stdout.write_all(b"\n").map_err(AppError::EmitResponse)?;
    stdout.flush().map_err(AppError::EmitResponse)
}
