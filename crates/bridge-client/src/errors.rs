//! Error types for each client layer.
//!
//! Every variant maps onto a [`FailureReason`] so the facade can fold it into
//! the uniform [`crate::Response`] shape.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::discovery::{Endpoint, STATUS_FILE_PATTERN};
use crate::response::FailureReason;

/// Failures locating the endpoint from its status records.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// No file matched the status file pattern in any directory.
    #[error(
        "no status files matching {pattern} in {}; is Unity running with Bridge Lite?",
        display_directories(.searched),
        pattern = STATUS_FILE_PATTERN
    )]
    NoCandidates {
        /// Directories that were searched.
        searched: Vec<PathBuf>,
    },
    /// Status files exist but none carried a usable port.
    #[error("could not read a port from {candidates} status file(s)")]
    NoValidPort {
        /// Number of status files tried.
        candidates: usize,
    },
}

impl DiscoveryError {
    /// Machine-stable reason for this failure.
    #[must_use]
    pub const fn reason(&self) -> FailureReason {
        match self {
            Self::NoCandidates { .. } => FailureReason::NoStatusFiles,
            Self::NoValidPort { .. } => FailureReason::NoValidPort,
        }
    }
}

/// Failures opening a connection to the endpoint.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The socket could not be created or configured.
    #[error("failed to prepare socket for {endpoint}: {source}")]
    Socket {
        /// Endpoint being connected to.
        endpoint: Endpoint,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
    /// The endpoint refused or did not answer the connection attempt.
    #[error("cannot connect to Unity at {endpoint}: {source}")]
    Connect {
        /// Endpoint being connected to.
        endpoint: Endpoint,
        /// Underlying connect error.
        #[source]
        source: io::Error,
    },
}

impl ConnectError {
    /// Machine-stable reason for this failure.
    #[must_use]
    pub const fn reason(&self) -> FailureReason {
        match self {
            Self::Socket { .. } => FailureReason::SocketSetup,
            Self::Connect { .. } => FailureReason::ConnectFailed,
        }
    }
}

/// Failures during one request/response exchange.
///
/// Any of these invalidates the connection it happened on.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request could not be serialised.
    #[error("failed to serialise request: {0}")]
    Serialise(#[source] serde_json::Error),
    /// Writing the request frame failed.
    #[error("failed to send request: {0}")]
    SendFailed(#[source] io::Error),
    /// No complete response frame arrived in time.
    #[error("connection timeout after {} ms waiting for a response", .after.as_millis())]
    Timeout {
        /// Time budget that elapsed.
        after: Duration,
    },
    /// The endpoint closed the connection before completing a frame.
    #[error("connection closed by Unity before a response arrived")]
    ConnectionClosed,
    /// Reading from the socket failed.
    #[error("failed to read response: {0}")]
    ReceiveFailed(#[source] io::Error),
    /// The response grew past the frame size limit without a delimiter.
    #[error("response exceeded {limit} bytes without a newline delimiter")]
    FrameTooLarge {
        /// Maximum accepted frame size in bytes.
        limit: usize,
    },
    /// The response frame was not valid UTF-8.
    #[error("response was not valid UTF-8: {0}")]
    InvalidUtf8(#[source] std::str::Utf8Error),
    /// The response frame was not valid JSON.
    #[error("malformed response: {0}")]
    MalformedResponse(#[source] serde_json::Error),
}

impl TransportError {
    /// Machine-stable reason for this failure.
    #[must_use]
    pub const fn reason(&self) -> FailureReason {
        match self {
            Self::Serialise(_) => FailureReason::SerialiseFailed,
            Self::SendFailed(_) => FailureReason::SendFailed,
            Self::Timeout { .. } => FailureReason::Timeout,
            Self::ConnectionClosed => FailureReason::ConnectionClosed,
            Self::ReceiveFailed(_) => FailureReason::ReceiveFailed,
            Self::FrameTooLarge { .. } => FailureReason::FrameTooLarge,
            Self::InvalidUtf8(_) => FailureReason::InvalidUtf8,
            Self::MalformedResponse(_) => FailureReason::MalformedResponse,
        }
    }
}

fn display_directories(directories: &[PathBuf]) -> String {
    if directories.is_empty() {
        return String::from("<no directories>");
    }
    directories
        .iter()
        .map(|directory| directory.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
