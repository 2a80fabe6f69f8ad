//! Builds the request parameter object from `--params` and `KEY=VALUE`
//! arguments.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::CLI_TARGET;

#[derive(Debug, Error)]
pub(crate) enum ParamsError {
    #[error("--params is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("--params must be a JSON object, got {kind}")]
    NotAnObject { kind: &'static str },
}

/// Starts from the `--params` object (empty when absent) and applies each
/// override in order. Later overrides replace earlier values for the same key.
pub(crate) fn build_params(
    blob: Option<&str>,
    overrides: &[String],
) -> Result<Map<String, Value>, ParamsError> {
    let mut params = match blob {
        Some(text) => match serde_json::from_str(text).map_err(ParamsError::InvalidJson)? {
            Value::Object(map) => map,
            other => {
                return Err(ParamsError::NotAnObject {
                    kind: json_kind(&other),
                });
            }
        },
        None => Map::new(),
    };

    for argument in overrides {
        match argument.split_once('=') {
            Some((key, raw)) => {
                params.insert(key.to_owned(), parse_value(raw));
            }
            None => warn!(
                target: CLI_TARGET,
                argument = %argument,
                "ignoring argument without '='"
            ),
        }
    }
    Ok(params)
}

/// Parses an override value as JSON, falling back to the literal string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()))
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
