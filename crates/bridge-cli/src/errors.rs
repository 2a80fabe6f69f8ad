//! Error types for the CLI runtime.

use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::telemetry::TelemetryError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error("failed to serialise response: {0}")]
    SerialiseResponse(serde_json::Error),
    #[error("failed to write response: {0}")]
    EmitResponse(io::Error),
    #[error("failed to read batch input: {0}")]
    ReadBatch(io::Error),
}

impl AppError {
    /// Whether clap asked for help or version text rather than reporting a
    /// usage mistake.
    pub(crate) fn is_informational(&self) -> bool {
        matches!(
            self,
            Self::CliUsage(error)
                if matches!(
                    error.kind(),
                    clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
                )
        )
    }
}
