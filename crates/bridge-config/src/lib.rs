//! Shared configuration for the Unity Bridge client and CLI.
//!
//! Values are layered by `ortho_config`: built-in defaults, then an optional
//! TOML file (`--config-path` or `UNITY_BRIDGE_CONFIG_PATH`), then
//! `UNITY_BRIDGE_*` environment variables, then command-line flags.

mod defaults;
mod logging;

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_REQUEST_TIMEOUT_SECS, LEGACY_STATUS_DIR_ENV, STATUS_DIR_NAME,
    default_log_filter, default_log_filter_string, default_log_format,
    default_request_timeout_secs, default_status_directory, default_status_dirs,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Resolved configuration shared by the bridge crates.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "UNITY_BRIDGE")]
pub struct Config {
    /// Directories searched for `bridge-*.json` status records, joined with
    /// the platform path-list separator (`:` on Unix).
    #[ortho_config(default = default_status_dirs())]
    #[serde(default = "default_status_dirs")]
    pub status_dirs: String,
    /// Timeout applied to each request when the caller does not supply one.
    #[ortho_config(default = DEFAULT_REQUEST_TIMEOUT_SECS)]
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// `tracing` filter expression for diagnostics on stderr.
    #[ortho_config(default = default_log_filter_string())]
    #[serde(default = "default_log_filter_string")]
    pub log_filter: String,
    /// Output format for diagnostics on stderr.
    #[ortho_config(default = default_log_format())]
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            status_dirs: default_status_dirs(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Directories to scan for status records, in configured order.
    ///
    /// Empty entries are dropped. When nothing usable remains the default
    /// status directory is returned so discovery always has somewhere to look.
    #[must_use]
    pub fn status_directories(&self) -> Vec<PathBuf> {
        let directories: Vec<PathBuf> = env::split_paths(&self.status_dirs)
            .filter(|path| !path.as_os_str().is_empty())
            .collect();
        if directories.is_empty() {
            vec![default_status_directory()]
        } else {
            directories
        }
    }

    /// Timeout applied to requests that do not carry their own.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Log filter expression for the telemetry subscriber.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format for the telemetry subscriber.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}
