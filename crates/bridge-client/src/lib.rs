//! Client for the Unity Bridge Lite automation endpoint.
//!
//! The editor plugin listens on a loopback TCP port that it advertises in
//! `bridge-*.json` status records. This crate finds the current port, keeps a
//! persistent connection to it, and exchanges newline-delimited JSON frames.
//! Callers talk to [`BridgeClient`], which always answers with a
//! [`Response`]: discovery, connection, transport, and application failures
//! are all reported the same way, told apart by [`FailureReason`].

pub mod alias;
pub mod client;
pub mod discovery;
mod errors;
pub mod pool;
mod response;
pub mod transport;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

#[cfg(test)]
mod tests;

pub use alias::AliasResolver;
pub use client::BridgeClient;
pub use discovery::{Endpoint, EndpointDiscovery, STATUS_FILE_PATTERN};
pub use errors::{ConnectError, DiscoveryError, TransportError};
pub use pool::{ConnectionPool, PooledConnection};
pub use response::{Failure, FailureReason, Response, SUCCESS_STATUS};
pub use transport::{Command, FrameStream, MAX_FRAME_BYTES, MAX_TIMEOUT};
