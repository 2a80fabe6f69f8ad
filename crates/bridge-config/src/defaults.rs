use std::env;
use std::path::PathBuf;

use dirs::home_dir;

/// Environment variable honoured by earlier bridge clients for the status
/// directory. Still consulted when computing the default search path.
pub const LEGACY_STATUS_DIR_ENV: &str = "UNITY_MCP_STATUS_DIR";

/// Directory name, relative to the home directory, where the Unity plugin
/// publishes its status records.
pub const STATUS_DIR_NAME: &str = ".unity-bridge";

/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default log filter expression used by the CLI.
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Default per-request timeout in seconds.
pub const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

/// Default log filter expression used by the CLI.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the CLI.
pub fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Compact
}

/// Computes the directory searched for status records when nothing is
/// configured.
///
/// A non-empty [`LEGACY_STATUS_DIR_ENV`] wins; otherwise the directory lives
/// under the user's home, falling back to the temporary directory when no home
/// can be determined.
pub fn default_status_directory() -> PathBuf {
    if let Some(dir) = env::var_os(LEGACY_STATUS_DIR_ENV).filter(|value| !value.is_empty()) {
        return PathBuf::from(dir);
    }
    match home_dir() {
        Some(home) => home.join(STATUS_DIR_NAME),
        None => env::temp_dir().join(STATUS_DIR_NAME),
    }
}

/// Default status directory list, rendered as a platform path list.
pub fn default_status_dirs() -> String {
    default_status_directory().to_string_lossy().into_owned()
}
