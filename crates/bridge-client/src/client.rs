//! The client facade.
//!
//! [`BridgeClient`] strings the layers together: alias resolution, endpoint
//! discovery, pooled connection reuse, and the framed exchange. Every outcome,
//! including local failures, is folded into a [`Response`].

use std::time::Duration;

use bridge_config::Config;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::alias::AliasResolver;
use crate::discovery::EndpointDiscovery;
use crate::pool::ConnectionPool;
use crate::response::{Failure, Response};
use crate::transport::{self, Command};

const CLIENT_TARGET: &str = "unity_bridge::client";

/// Sends commands to the automation endpoint over a pooled connection.
///
/// Requests are strictly sequential: `send_command` takes `&mut self`, and
/// the protocol has no correlation identifier, so a client shared between
/// threads needs an outer lock that is held for the whole call.
#[derive(Debug)]
pub struct BridgeClient {
    aliases: AliasResolver,
    discovery: EndpointDiscovery,
    pool: ConnectionPool,
}

impl BridgeClient {
    /// Builds a client from its parts.
    #[must_use]
    pub fn new(aliases: AliasResolver, discovery: EndpointDiscovery) -> Self {
        Self {
            aliases,
            discovery,
            pool: ConnectionPool::new(),
        }
    }

    /// Builds a client with the built-in aliases and the configured status
    /// directories.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(AliasResolver::new(), EndpointDiscovery::from_config(config))
    }

    /// Sends `name` with `params` and waits up to `timeout` for the reply.
    ///
    /// `name` is alias-resolved before sending. A transport failure evicts
    /// the connection it happened on, so the next call reconnects. Connections
    /// to ports the endpoint no longer advertises are closed.
    pub fn send_command(
        &mut self,
        name: &str,
        params: Map<String, Value>,
        timeout: Duration,
    ) -> Response {
        let canonical = self.aliases.resolve(name).to_owned();
        if canonical != name {
            debug!(target: CLIENT_TARGET, alias = name, command = %canonical, "resolved alias");
        }
        self.send(&Command::new(canonical, params), timeout)
    }

    /// Sends an already canonical command.
    pub fn send(&mut self, command: &Command, timeout: Duration) -> Response {
        let endpoint = match self.discovery.discover() {
            Ok(endpoint) => endpoint,
            Err(error) => {
                debug!(target: CLIENT_TARGET, error = %error, "discovery failed");
                return Failure::from(error).into();
            }
        };

        self.pool.release_others(endpoint);
        let connection = match self.pool.acquire(endpoint, timeout) {
            Ok(connection) => connection,
            Err(error) => {
                debug!(target: CLIENT_TARGET, error = %error, "connect failed");
                return Failure::from(error).into();
            }
        };

        match transport::exchange(connection.stream_mut(), command, timeout) {
            Ok(raw) => Response::from_remote(raw),
            Err(error) => {
                warn!(
                    target: CLIENT_TARGET,
                    command = command.name(),
                    endpoint = %endpoint,
                    error = %error,
                    "exchange failed; evicting connection"
                );
                self.pool.release(endpoint);
                Failure::from(error).into()
            }
        }
    }

    /// Closes every pooled connection. The client stays usable.
    pub fn close(&mut self) {
        self.pool.close_all();
    }

    /// Alias table used to canonicalise command names.
    #[must_use]
    pub const fn resolver(&self) -> &AliasResolver {
        &self.aliases
    }

    /// Endpoint discovery used for every call.
    #[must_use]
    pub const fn discovery(&self) -> &EndpointDiscovery {
        &self.discovery
    }

    /// Pooled connections, for introspection.
    #[must_use]
    pub const fn pool(&self) -> &ConnectionPool {
        &self.pool
    }
}
