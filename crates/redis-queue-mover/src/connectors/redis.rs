//! Redis list connector.
//!
//! Queues are Redis lists: items are popped with `RPOP` and delivered with a
//! single multi-value `LPUSH` per batch. A node list with one entry opens a
//! standalone multiplexed connection, several entries open a cluster
//! connection.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::cluster::ClusterClientBuilder;
use redis::cluster_async::ClusterConnection;
use redis::{AsyncConnectionConfig, Client, FromRedisValue, IntoConnectionInfo, RedisResult};
use std::time::Duration;
use tracing::debug;

use crate::config::{DestinationConfig, MoverConfig, SourceConfig};
use crate::connectors::common::parse_nodes;
use crate::connectors::{Connector, QueueStore};
use crate::error::{Error, Result};

/// Address, credentials and timeout of one store.
#[derive(Clone)]
pub struct RedisEndpoint {
    /// Node list as configured, for log lines.
    pub nodes: String,
    /// Parsed node URLs.
    pub urls: Vec<String>,
    /// Optional password.
    pub password: Option<String>,
    /// Connect and response timeout.
    pub timeout: Duration,
}

impl std::fmt::Debug for RedisEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisEndpoint")
            .field("nodes", &self.nodes)
            .field("urls", &self.urls)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RedisEndpoint {
    /// Builds an endpoint from a comma-separated node list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the node list is empty or malformed.
    pub fn new(nodes: &str, password: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            nodes: nodes.to_string(),
            urls: parse_nodes(nodes)?,
            password: password.filter(|p| !p.is_empty()),
            timeout,
        })
    }

    /// Endpoint of the source store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the node list is invalid.
    pub fn source(config: &SourceConfig) -> Result<Self> {
        Self::new(&config.redis, config.password.clone(), config.timeout())
    }

    /// Endpoint of the destination store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the node list is invalid.
    pub fn destination(config: &DestinationConfig) -> Result<Self> {
        Self::new(&config.redis, config.password.clone(), config.timeout())
    }

    /// True if more than one node is configured.
    #[must_use]
    pub fn is_cluster(&self) -> bool {
        self.urls.len() > 1
    }
}

enum Connection {
    Standalone(MultiplexedConnection),
    Cluster(ClusterConnection),
}

/// Queue store backed by a Redis server or cluster.
pub struct RedisQueueStore {
    nodes: String,
    connection: Connection,
}

impl RedisQueueStore {
    /// Connects to `endpoint`.
    pub async fn connect(endpoint: &RedisEndpoint) -> RedisResult<Self> {
        let mut infos = Vec::with_capacity(endpoint.urls.len());
        for url in &endpoint.urls {
            let mut info = url.as_str().into_connection_info()?;
            if let Some(password) = &endpoint.password {
                info.redis.password = Some(password.clone());
            }
            infos.push(info);
        }

        let connection = if endpoint.is_cluster() {
            let mut builder = ClusterClientBuilder::new(infos)
                .connection_timeout(endpoint.timeout)
                .response_timeout(endpoint.timeout);
            if let Some(password) = &endpoint.password {
                builder = builder.password(password.clone());
            }
            let client = builder.build()?;
            Connection::Cluster(client.get_async_connection().await?)
        } else {
            let info = infos.remove(0);
            let client = Client::open(info)?;
            let config = AsyncConnectionConfig::new()
                .set_connection_timeout(endpoint.timeout)
                .set_response_timeout(endpoint.timeout);
            Connection::Standalone(
                client
                    .get_multiplexed_async_connection_with_config(&config)
                    .await?,
            )
        };

        debug!(nodes = %endpoint.nodes, cluster = endpoint.is_cluster(), "connected");
        Ok(Self {
            nodes: endpoint.nodes.clone(),
            connection,
        })
    }

    async fn query<T: FromRedisValue>(&mut self, cmd: &redis::Cmd) -> RedisResult<T> {
        match &mut self.connection {
            Connection::Standalone(conn) => cmd.query_async(conn).await,
            Connection::Cluster(conn) => cmd.query_async(conn).await,
        }
    }
}

/// Builds the `RPOP` command for `key`.
#[must_use]
pub fn pop_command(key: &str) -> redis::Cmd {
    let mut cmd = redis::cmd("RPOP");
    cmd.arg(key);
    cmd
}

/// Builds one `LPUSH` command carrying every value of the batch.
#[must_use]
pub fn push_command(key: &str, values: &[Vec<u8>]) -> redis::Cmd {
    let mut cmd = redis::cmd("LPUSH");
    cmd.arg(key);
    for value in values {
        cmd.arg(value.as_slice());
    }
    cmd
}

#[async_trait]
impl QueueStore for RedisQueueStore {
    fn describe(&self) -> String {
        format!("redis://{}", self.nodes)
    }

    async fn pop(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        self.query(&pop_command(key))
            .await
            .map_err(|e| Error::Pop {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    async fn push(&mut self, key: &str, values: &[Vec<u8>]) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        let _len: i64 = self
            .query(&push_command(key, values))
            .await
            .map_err(|e| Error::Push {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }
}

/// Opens Redis connections for each worker.
#[derive(Debug, Clone)]
pub struct RedisConnector {
    source: RedisEndpoint,
    destination: Option<RedisEndpoint>,
}

impl RedisConnector {
    /// Creates a connector from explicit endpoints.
    #[must_use]
    pub fn new(source: RedisEndpoint, destination: Option<RedisEndpoint>) -> Self {
        Self {
            source,
            destination,
        }
    }

    /// Creates a connector from the mover configuration.
    ///
    /// The destination endpoint is only built when a destination store is set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a node list is invalid.
    pub fn from_config(config: &MoverConfig) -> Result<Self> {
        let source = RedisEndpoint::source(&config.source)?;
        let destination = if config.destination.redis.trim().is_empty() {
            None
        } else {
            Some(RedisEndpoint::destination(&config.destination)?)
        };
        Ok(Self::new(source, destination))
    }
}

#[async_trait]
impl Connector for RedisConnector {
    async fn open_source(&self) -> Result<Box<dyn QueueStore>> {
        let store = RedisQueueStore::connect(&self.source)
            .await
            .map_err(|e| Error::SourceConnection {
                nodes: self.source.nodes.clone(),
                reason: e.to_string(),
            })?;
        Ok(Box::new(store))
    }

    async fn open_destination(&self) -> Result<Box<dyn QueueStore>> {
        let Some(endpoint) = &self.destination else {
            return Err(Error::Config("destination redis is not set".to_string()));
        };
        let store = RedisQueueStore::connect(endpoint)
            .await
            .map_err(|e| Error::DestinationConnection {
                nodes: endpoint.nodes.clone(),
                reason: e.to_string(),
            })?;
        Ok(Box::new(store))
    }
}

#[cfg(test)]
#[path = "redis_tests.rs"]
mod tests;
