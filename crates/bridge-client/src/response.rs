//! The uniform result returned by the client facade.
//!
//! A [`Response`] keeps two layers apart: whether the exchange itself worked,
//! and whether the endpoint reported success. Transport-level failures and
//! application-level failures both end up as [`Response::Error`], told apart by
//! [`FailureReason`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{ConnectError, DiscoveryError, TransportError};

/// Status value the endpoint uses to report success.
pub const SUCCESS_STATUS: &str = "success";

/// Outcome of a single command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    /// The endpoint accepted the command.
    Success {
        /// Payload returned by the endpoint; `null` when it sent none.
        #[serde(default)]
        result: Value,
    },
    /// The command failed somewhere between discovery and the endpoint.
    Error(Failure),
}

/// Structured description of a failed command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    /// Human-readable explanation, usually the proximate error text.
    #[serde(rename = "error")]
    pub message: String,
    /// Machine-stable classification.
    pub reason: FailureReason,
    /// Raw endpoint response for application failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

/// Machine-stable failure classification, serialised in `snake_case`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// No status file was found.
    NoStatusFiles,
    /// Status files exist but none named a usable port.
    NoValidPort,
    /// The socket could not be created or configured.
    SocketSetup,
    /// The endpoint refused or ignored the connection attempt.
    ConnectFailed,
    /// The request could not be serialised.
    SerialiseFailed,
    /// Writing the request failed.
    SendFailed,
    /// No response arrived within the timeout.
    Timeout,
    /// The endpoint closed the connection mid-exchange.
    ConnectionClosed,
    /// Reading the response failed.
    ReceiveFailed,
    /// The response exceeded the frame size limit.
    FrameTooLarge,
    /// The response was not UTF-8.
    InvalidUtf8,
    /// The response was not JSON.
    MalformedResponse,
    /// The endpoint answered but reported a failure.
    Application,
    /// Caller-supplied parameters were rejected before sending.
    InvalidParams,
    /// A caller-supplied request could not be decoded.
    InvalidRequest,
}

impl Failure {
    /// Builds a failure without endpoint detail.
    #[must_use]
    pub fn new(reason: FailureReason, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            reason,
            detail: None,
        }
    }

    /// Builds an application failure from a raw endpoint response.
    ///
    /// The message is the endpoint's `error` field when it is a string, its
    /// JSON text when it is another value, and a description of the status
    /// otherwise.
    #[must_use]
    pub fn application(raw: Value) -> Self {
        let status = raw.get("status").and_then(Value::as_str);
        let message = match raw.get("error") {
            Some(Value::String(text)) => text.clone(),
            Some(Value::Null) | None => match status {
                Some(other) => {
                    format!("Unity reported status '{other}' without an error message")
                }
                None => String::from("Unity response carried no status field"),
            },
            Some(other) => other.to_string(),
        };
        Self {
            message,
            reason: FailureReason::Application,
            detail: Some(raw),
        }
    }
}

impl From<DiscoveryError> for Failure {
    fn from(error: DiscoveryError) -> Self {
        Self::new(error.reason(), error.to_string())
    }
}

impl From<ConnectError> for Failure {
    fn from(error: ConnectError) -> Self {
        Self::new(error.reason(), error.to_string())
    }
}

impl From<TransportError> for Failure {
    fn from(error: TransportError) -> Self {
        Self::new(error.reason(), error.to_string())
    }
}

impl Response {
    /// Classifies a raw endpoint reply.
    ///
    /// Only a JSON object whose `status` is `"success"` counts as success; its
    /// `result` field becomes the payload. Everything else is an application
    /// failure.
    #[must_use]
    pub fn from_remote(raw: Value) -> Self {
        match raw {
            Value::Object(mut fields)
                if fields.get("status").and_then(Value::as_str) == Some(SUCCESS_STATUS) =>
            {
                Self::Success {
                    result: fields.remove("result").unwrap_or(Value::Null),
                }
            }
            other => Self::Error(Failure::application(other)),
        }
    }

    /// Whether the endpoint reported success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Success payload, if any.
    #[must_use]
    pub const fn result(&self) -> Option<&Value> {
        match self {
            Self::Success { result } => Some(result),
            Self::Error(_) => None,
        }
    }

    /// Failure description, if any.
    #[must_use]
    pub const fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Success { .. } => None,
            Self::Error(failure) => Some(failure),
        }
    }
}

impl From<Failure> for Response {
    fn from(failure: Failure) -> Self {
        Self::Error(failure)
    }
}
