//! Endpoint discovery from published status records.
//!
//! The Unity plugin writes a small JSON record (`bridge-<id>.json`) whenever it
//! starts listening, and rewrites it on every restart. The port it advertises
//! changes between restarts, so discovery runs on every call and never caches.

use std::fmt;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use bridge_config::Config;
use glob::Pattern;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::DiscoveryError;

/// File name pattern of status records inside a status directory.
pub const STATUS_FILE_PATTERN: &str = "bridge-*.json";

const DISCOVERY_TARGET: &str = "unity_bridge::discovery";

/// Address of the automation endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: IpAddr,
    port: u16,
}

impl Endpoint {
    /// Builds an endpoint on the IPv4 loopback interface.
    #[must_use]
    pub const fn loopback(port: u16) -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port,
        }
    }

    /// Host the endpoint listens on.
    #[must_use]
    pub const fn host(&self) -> IpAddr {
        self.host
    }

    /// TCP port the endpoint listens on.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Pool key in `host:port` form.
    #[must_use]
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// Socket address to connect to.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.host, self.port)
    }
}

/// Key of the advertised port in a status record; other keys are ignored.
const PORT_FIELD: &str = "port";

#[derive(Debug, thiserror::Error)]
enum RecordError {
    #[error("unreadable: {0}")]
    Read(#[source] std::io::Error),
    #[error("not JSON: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("expected a JSON object")]
    NotAnObject,
    #[error("no `port` field")]
    MissingPort,
    #[error("`port` is not an integer in 1..=65535: {0}")]
    InvalidPort(Value),
}

#[derive(Debug)]
struct Candidate {
    path: PathBuf,
    modified: Option<SystemTime>,
}

/// Locates the endpoint by scanning status directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDiscovery {
    directories: Vec<PathBuf>,
}

impl EndpointDiscovery {
    /// Builds a discovery over the given directories, searched in order.
    #[must_use]
    pub fn new<I, P>(directories: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            directories: directories.into_iter().map(Into::into).collect(),
        }
    }

    /// Builds a discovery over the configured status directories.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.status_directories())
    }

    /// Directories searched for status records.
    #[must_use]
    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    /// Finds the endpoint advertised by the most recent valid status record.
    ///
    /// Candidates are tried newest first by modification time. Records that
    /// cannot be read, are not JSON objects, or lack an integer `port` in `1..=65535`
    /// are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::NoCandidates`] when no status file exists and
    /// [`DiscoveryError::NoValidPort`] when none of them names a usable port.
    pub fn discover(&self) -> Result<Endpoint, DiscoveryError> {
        let candidates = self.candidates();
        if candidates.is_empty() {
            return Err(DiscoveryError::NoCandidates {
                searched: self.directories.clone(),
            });
        }

        let total = candidates.len();
        for candidate in candidates {
            match read_port(&candidate.path) {
                Ok(port) => {
                    debug!(
                        target: DISCOVERY_TARGET,
                        file = %candidate.path.display(),
                        port,
                        "endpoint discovered"
                    );
                    return Ok(Endpoint::loopback(port));
                }
                Err(error) => {
                    debug!(
                        target: DISCOVERY_TARGET,
                        file = %candidate.path.display(),
                        error = %error,
                        "skipping status file"
                    );
                }
            }
        }

        Err(DiscoveryError::NoValidPort { candidates: total })
    }

    fn candidates(&self) -> Vec<Candidate> {
        let mut candidates: Vec<Candidate> = self
            .directories
            .iter()
            .flat_map(|directory| status_files(directory))
            .map(|path| {
                let modified = fs::metadata(&path)
                    .and_then(|metadata| metadata.modified())
                    .ok();
                Candidate { path, modified }
            })
            .collect();
        // Stable sort: equal timestamps keep directory and glob order.
        candidates.sort_by(|left, right| right.modified.cmp(&left.modified));
        candidates
    }
}

fn status_files(directory: &Path) -> Vec<PathBuf> {
    let Some(directory_text) = directory.to_str() else {
        warn!(
            target: DISCOVERY_TARGET,
            directory = %directory.display(),
            "skipping status directory with a non UTF-8 path"
        );
        return Vec::new();
    };
    let pattern = Path::new(&Pattern::escape(directory_text)).join(STATUS_FILE_PATTERN);
    let Some(pattern_text) = pattern.to_str() else {
        return Vec::new();
    };

    match glob::glob(pattern_text) {
        Ok(paths) => paths
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(error) => {
                    debug!(
                        target: DISCOVERY_TARGET,
                        error = %error,
                        "skipping unreadable status path"
                    );
                    None
                }
            })
            .filter(|path| path.is_file())
            .collect(),
        Err(error) => {
            warn!(
                target: DISCOVERY_TARGET,
                directory = %directory.display(),
                error = %error,
                "invalid status file pattern"
            );
            Vec::new()
        }
    }
}

fn read_port(path: &Path) -> Result<u16, RecordError> {
    let contents = fs::read(path).map_err(RecordError::Read)?;
    let record: Value = serde_json::from_slice(&contents).map_err(RecordError::Parse)?;
    let Value::Object(mut fields) = record else {
        return Err(RecordError::NotAnObject);
    };
    let port = fields
        .remove(PORT_FIELD)
        .ok_or(RecordError::MissingPort)?;
    port.as_u64()
        .and_then(|number| u16::try_from(number).ok())
        .filter(|number| *number != 0)
        .ok_or(RecordError::InvalidPort(port))
}
