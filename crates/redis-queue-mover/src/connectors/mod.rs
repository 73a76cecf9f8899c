//! Store connectors for list-backed queues.

pub mod common;
pub mod memory;
pub mod redis;

use async_trait::async_trait;

use crate::error::Result;

/// A key-value store holding FIFO queues as lists.
///
/// Items enter at the head and leave at the tail. Each connection is owned
/// by a single worker.
#[async_trait]
pub trait QueueStore: Send {
    /// Short description used in log lines (e.g. the node list).
    fn describe(&self) -> String;

    /// Atomically pops one item from the tail of `key`.
    ///
    /// Returns `Ok(None)` when the queue is empty.
    async fn pop(&mut self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Pushes all `values` to the head of `key` in one call, in argument order.
    async fn push(&mut self, key: &str, values: &[Vec<u8>]) -> Result<()>;
}

/// Opens per-worker store connections.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a connection to the source store.
    async fn open_source(&self) -> Result<Box<dyn QueueStore>>;

    /// Opens a connection to the destination store.
    async fn open_destination(&self) -> Result<Box<dyn QueueStore>>;
}

pub use self::memory::{MemoryConnector, MemoryQueueStore};
pub use self::redis::{RedisConnector, RedisEndpoint, RedisQueueStore};
