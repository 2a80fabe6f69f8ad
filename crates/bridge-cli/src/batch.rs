//! Line-oriented batch mode.
//!
//! Each non-blank stdin line is one request object:
//! `{"command": "...", "params": {...}, "timeout": <seconds>}`, where `params`
//! and `timeout` are optional. All requests go through one client, so the
//! pooled connection is reused from line to line. One compact reply is
//! printed per request.

use std::io::{BufRead, Write};
use std::process::ExitCode;
use std::time::Duration;

use bridge_client::{BridgeClient, Failure, FailureReason, Response};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::AppError;
use crate::CLI_TARGET;
use crate::output::{OutputStyle, write_response};

#[derive(Debug, Deserialize)]
struct BatchRequest {
    command: String,
    #[serde(default)]
    params: Map<String, Value>,
    #[serde(default)]
    timeout: Option<f64>,
}

#[derive(Debug, Error)]
enum RequestError {
    #[error("line {line}: {source}")]
    Decode {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("line {line}: timeout must be a positive number of seconds")]
    Timeout { line: usize },
}

/// Sends every request read from `input` and reports success only when every
/// reply succeeded.
pub(crate) fn run_batch<R, W>(
    client: &mut BridgeClient,
    input: &mut R,
    stdout: &mut W,
    default_timeout: Duration,
) -> Result<ExitCode, AppError>
where
    R: BufRead,
    W: Write,
{
    let mut all_succeeded = true;
    let mut sent = 0usize;

    for (index, read) in input.lines().enumerate() {
        let line = read.map_err(AppError::ReadBatch)?;
        if line.trim().is_empty() {
            continue;
        }

        let response = match parse_request(&line, index + 1, default_timeout) {
            Ok((request, timeout)) => {
                sent += 1;
                client.send_command(&request.command, request.params, timeout)
            }
            Err(error) => Response::from(Failure::new(
                FailureReason::InvalidRequest,
                error.to_string(),
            )),
        };
        all_succeeded &= response.is_success();
        write_response(stdout, &response, OutputStyle::Compact)?;
    }

    debug!(target: CLI_TARGET, sent, "batch complete");
    client.close();
    Ok(if all_succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn parse_request(
    text: &str,
    line: usize,
    default_timeout: Duration,
) -> Result<(BatchRequest, Duration), RequestError> {
    let request: BatchRequest =
        serde_json::from_str(text).map_err(|source| RequestError::Decode { line, source })?;
    let timeout = match request.timeout {
        None => default_timeout,
        Some(seconds) if seconds > 0.0 => {
            Duration::try_from_secs_f64(seconds).map_err(|_| RequestError::Timeout { line })?
        }
        Some(_) => return Err(RequestError::Timeout { line }),
    };
    Ok((request, timeout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    const DEFAULT: Duration = Duration::from_secs(30);

    #[test]
    fn params_and_timeout_are_optional() {
        let (request, timeout) = parse_request(r#"{"command": "ping"}"#, 1, DEFAULT).expect("parse");
        assert_eq!(request.command, "ping");
        assert!(request.params.is_empty());
        assert_eq!(timeout, DEFAULT);
    }

    #[test]
    fn fractional_timeouts_are_honoured() {
        let (request, timeout) = parse_request(
            r#"{"command": "rotate", "params": {"speed": 45}, "timeout": 2.5}"#,
            1,
            DEFAULT,
        )
        .expect("parse");
        assert_eq!(Value::Object(request.params), json!({"speed": 45}));
        assert_eq!(timeout, Duration::from_millis(2500));
    }

    #[test]
    fn enormous_timeouts_are_accepted() {
        let (_, timeout) = parse_request(r#"{"command": "ping", "timeout": 1.5e19}"#, 1, DEFAULT)
            .expect("parse");
        assert!(timeout > bridge_client::MAX_TIMEOUT);
    }

    #[rstest]
    #[case(r#"{"params": {}}"#)]
    #[case(r#"{"command": "ping", "params": [1]}"#)]
    #[case("not json")]
    #[case(r#"{"command": "ping", "timeout": 0}"#)]
    #[case(r#"{"command": "ping", "timeout": -3}"#)]
    fn invalid_requests_are_rejected(#[case] text: &str) {
        let error = parse_request(text, 7, DEFAULT).expect_err("request should be rejected");
        assert!(error.to_string().starts_with("line 7: "), "{error}");
    }
}
