//! In-process queue store.
//!
//! Follows Redis list semantics (`LPUSH` pushes each argument to the head
//! in turn, `RPOP` takes from the tail) and records every call, so the move
//! engine can be driven without a server. Failures can be injected to
//! exercise the retry paths.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::connectors::{Connector, QueueStore};
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct Inner {
    lists: HashMap<String, VecDeque<Vec<u8>>>,
    pop_calls: u64,
    pushes: Vec<Vec<Vec<u8>>>,
    fail_pops: u32,
    fail_pushes: u32,
}

/// Shared in-memory store. Clones see the same lists.
#[derive(Debug, Clone, Default)]
pub struct MemoryQueueStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryQueueStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends `values` to the tail of `key` (like `RPUSH`).
    pub fn append<I, V>(&self, key: &str, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<Vec<u8>>,
    {
        let mut inner = self.lock();
        let list = inner.lists.entry(key.to_string()).or_default();
        list.extend(values.into_iter().map(Into::into));
    }

    /// Items of `key`, head to tail.
    #[must_use]
    pub fn items(&self, key: &str) -> Vec<Vec<u8>> {
        self.lock()
            .lists
            .get(key)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Items of `key` as strings, head to tail.
    #[must_use]
    pub fn items_lossy(&self, key: &str) -> Vec<String> {
        self.items(key)
            .iter()
            .map(|v| String::from_utf8_lossy(v).into_owned())
            .collect()
    }

    /// Number of items in `key`.
    #[must_use]
    pub fn len(&self, key: &str) -> usize {
        self.lock().lists.get(key).map_or(0, VecDeque::len)
    }

    /// True if `key` holds no items.
    #[must_use]
    pub fn is_empty(&self, key: &str) -> bool {
        self.len(key) == 0
    }

    /// Makes the next `n` pops fail.
    pub fn fail_next_pops(&self, n: u32) {
        self.lock().fail_pops = n;
    }

    /// Makes the next `n` pushes fail.
    pub fn fail_next_pushes(&self, n: u32) {
        self.lock().fail_pushes = n;
    }

    /// Number of pop calls so far, failed ones included.
    #[must_use]
    pub fn pop_calls(&self) -> u64 {
        self.lock().pop_calls
    }

    /// Batch size of every successful push, in call order.
    #[must_use]
    pub fn push_sizes(&self) -> Vec<usize> {
        self.lock().pushes.iter().map(Vec::len).collect()
    }

    /// Values of every successful push as strings, in call order.
    #[must_use]
    pub fn pushes_lossy(&self) -> Vec<Vec<String>> {
        self.lock()
            .pushes
            .iter()
            .map(|values| {
                values
                    .iter()
                    .map(|v| String::from_utf8_lossy(v).into_owned())
                    .collect()
            })
            .collect()
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn pop(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut inner = self.lock();
        inner.pop_calls += 1;
        if inner.fail_pops > 0 {
            inner.fail_pops -= 1;
            return Err(Error::Pop {
                key: key.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        Ok(inner.lists.get_mut(key).and_then(VecDeque::pop_back))
    }

    async fn push(&mut self, key: &str, values: &[Vec<u8>]) -> Result<()> {
        let mut inner = self.lock();
        if inner.fail_pushes > 0 {
            inner.fail_pushes -= 1;
            return Err(Error::Push {
                key: key.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        let list = inner.lists.entry(key.to_string()).or_default();
        for value in values {
            list.push_front(value.clone());
        }
        inner.pushes.push(values.to_vec());
        Ok(())
    }
}

/// Hands out clones of in-memory stores.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    source: MemoryQueueStore,
    destination: MemoryQueueStore,
}

impl MemoryConnector {
    /// Source and destination are separate stores.
    #[must_use]
    pub fn new(source: MemoryQueueStore, destination: MemoryQueueStore) -> Self {
        Self {
            source,
            destination,
        }
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn open_source(&self) -> Result<Box<dyn QueueStore>> {
        Ok(Box::new(self.source.clone()))
    }

    async fn open_destination(&self) -> Result<Box<dyn QueueStore>> {
        Ok(Box::new(self.destination.clone()))
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
