//! Keyed pool of persistent connections to the endpoint.
//!
//! At most one connection is held per endpoint key. A pooled connection is
//! checked before each reuse with a non-blocking one-byte peek; anything other
//! than "no data yet" means the connection is discarded and replaced.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::net::{Shutdown, TcpStream};
use std::time::{Duration, Instant};

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use thiserror::Error;
use tracing::{debug, trace};

use crate::discovery::Endpoint;
use crate::errors::ConnectError;
use crate::transport::effective_timeout;

const POOL_TARGET: &str = "unity_bridge::pool";

/// Reasons a pooled connection failed its reuse check.
#[derive(Debug, Error)]
enum StaleConnection {
    #[error("peer closed the connection")]
    Closed,
    #[error("{0} unsolicited byte(s) pending")]
    UnsolicitedData(usize),
    #[error("liveness probe failed: {0}")]
    Probe(#[source] io::Error),
}

/// A connection owned by the pool.
pub struct PooledConnection {
    endpoint: Endpoint,
    stream: TcpStream,
    last_validated_alive: Instant,
}

impl PooledConnection {
    fn open(endpoint: Endpoint, timeout: Duration) -> Result<Self, ConnectError> {
        let address = endpoint.socket_addr();
        let socket_error = |source| ConnectError::Socket { endpoint, source };

        let socket = Socket::new(
            Domain::for_address(address),
            Type::STREAM,
            Some(Protocol::TCP),
        )
        .map_err(socket_error)?;
        socket.set_nodelay(true).map_err(socket_error)?;
        socket
            .connect_timeout(&SockAddr::from(address), timeout)
            .map_err(|source| ConnectError::Connect { endpoint, source })?;

        let stream = TcpStream::from(socket);
        apply_timeouts(&stream, timeout).map_err(socket_error)?;
        debug!(target: POOL_TARGET, endpoint = %endpoint, "connection opened");
        Ok(Self {
            endpoint,
            stream,
            last_validated_alive: Instant::now(),
        })
    }

    /// Endpoint this connection is attached to.
    #[must_use]
    pub const fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    /// The underlying stream.
    #[must_use]
    pub const fn stream(&self) -> &TcpStream {
        &self.stream
    }

    /// The underlying stream, for exchanging frames.
    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    /// When the connection was last opened or found alive.
    #[must_use]
    pub const fn last_validated_alive(&self) -> Instant {
        self.last_validated_alive
    }

    fn revalidate(&mut self, timeout: Duration) -> Result<(), StaleConnection> {
        self.probe()?;
        apply_timeouts(&self.stream, timeout).map_err(StaleConnection::Probe)?;
        self.last_validated_alive = Instant::now();
        Ok(())
    }

    fn probe(&self) -> Result<(), StaleConnection> {
        self.stream
            .set_nonblocking(true)
            .map_err(StaleConnection::Probe)?;
        let mut byte = [0_u8; 1];
        let observed = match self.stream.peek(&mut byte) {
            Ok(0) => Err(StaleConnection::Closed),
            // A reply nobody asked for would be read as the next response.
            Ok(pending) => Err(StaleConnection::UnsolicitedData(pending)),
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(error) => Err(StaleConnection::Probe(error)),
        };
        self.stream
            .set_nonblocking(false)
            .map_err(StaleConnection::Probe)?;
        observed
    }

    /// Shuts the connection down. Failures are expected on connections the
    /// peer already dropped, so they are only traced.
    fn close(self) {
        if let Err(error) = self.stream.shutdown(Shutdown::Both) {
            trace!(
                target: POOL_TARGET,
                endpoint = %self.endpoint,
                error = %error,
                "ignoring shutdown failure"
            );
        }
        debug!(target: POOL_TARGET, endpoint = %self.endpoint, "connection closed");
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("PooledConnection")
            .field("endpoint", &self.endpoint)
            .field("local_addr", &self.stream.local_addr().ok())
            .field("last_validated_alive", &self.last_validated_alive)
            .finish()
    }
}

fn apply_timeouts(stream: &TcpStream, timeout: Duration) -> io::Result<()> {
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))
}

/// Persistent connections keyed by `host:port`.
///
/// The pool is not synchronised. Every mutating operation takes `&mut self`;
/// sharing a pool across threads needs an outer lock, and even then requests
/// must not interleave because replies carry no correlation identifier.
#[derive(Debug, Default)]
pub struct ConnectionPool {
    connections: HashMap<String, PooledConnection>,
}

impl ConnectionPool {
    /// Builds an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a live connection to `endpoint`, reusing the pooled one when
    /// it passes the liveness check and opening a new one otherwise.
    ///
    /// `timeout` bounds the connect and becomes the socket's read and write
    /// timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError`] when a new connection cannot be opened. The
    /// pool holds no entry for `endpoint` afterwards.
    pub fn acquire(
        &mut self,
        endpoint: Endpoint,
        timeout: Duration,
    ) -> Result<&mut PooledConnection, ConnectError> {
        let key = endpoint.key();
        let budget = effective_timeout(timeout);

        if let Some(mut existing) = self.connections.remove(&key) {
            match existing.revalidate(budget) {
                Ok(()) => {
                    trace!(target: POOL_TARGET, endpoint = %endpoint, "reusing connection");
                    return Ok(self.connections.entry(key).or_insert(existing));
                }
                Err(stale) => {
                    debug!(
                        target: POOL_TARGET,
                        endpoint = %endpoint,
                        reason = %stale,
                        "discarding stale connection"
                    );
                    existing.close();
                }
            }
        }

        let connection = PooledConnection::open(endpoint, budget)?;
        Ok(self.connections.entry(key).or_insert(connection))
    }

    /// Evicts and closes the connection to `endpoint`, if any.
    pub fn release(&mut self, endpoint: Endpoint) {
        if let Some(connection) = self.connections.remove(&endpoint.key()) {
            connection.close();
        }
    }

    /// Evicts and closes every connection other than the one to `endpoint`.
    ///
    /// Once the endpoint has moved, connections to its earlier ports are never
    /// acquired again.
    pub fn release_others(&mut self, endpoint: Endpoint) {
        let current = endpoint.key();
        let superseded: Vec<String> = self
            .connections
            .keys()
            .filter(|key| **key != current)
            .cloned()
            .collect();
        for key in superseded {
            if let Some(connection) = self.connections.remove(&key) {
                debug!(
                    target: POOL_TARGET,
                    endpoint = %connection.endpoint(),
                    current = %endpoint,
                    "releasing connection to a superseded endpoint"
                );
                connection.close();
            }
        }
    }

    /// Evicts and closes every pooled connection.
    pub fn close_all(&mut self) {
        for (_, connection) in self.connections.drain() {
            connection.close();
        }
    }

    /// Number of pooled connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether the pool holds no connections.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Whether a connection to `endpoint` is pooled.
    #[must_use]
    pub fn contains(&self, endpoint: Endpoint) -> bool {
        self.connections.contains_key(&endpoint.key())
    }
}

impl Drop for ConnectionPool {
    fn drop(&mut self) {
        self.close_all();
    }
}
