//! Queue key naming.
//!
//! A queue key is a prefix followed by the queue index, e.g. with prefix
//! `mooon:` and three queues the keys are `mooon:0`, `mooon:1` and `mooon:2`.
//! With `only_prefix` the prefix itself is the key for every index.

use crate::config::MoverConfig;

/// Builds the key of queue `index`.
#[must_use]
pub fn queue_key(prefix: &str, index: usize, only_prefix: bool) -> String {
    if only_prefix {
        prefix.to_string()
    } else {
        format!("{prefix}{index}")
    }
}

/// Source and destination keys addressed by one queue index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuePair {
    /// Queue index in `[0, queues)`.
    pub index: usize,
    /// Key popped from.
    pub source_key: String,
    /// Key pushed to.
    pub dest_key: String,
}

impl QueuePair {
    /// Keys for queue `index` under `config`.
    #[must_use]
    pub fn new(config: &MoverConfig, index: usize) -> Self {
        Self {
            index,
            source_key: queue_key(&config.source.prefix, index, config.source.only_prefix),
            dest_key: queue_key(
                &config.destination.prefix,
                index,
                config.destination.only_prefix,
            ),
        }
    }

    /// Pair served by worker `worker` when there are `queues` pairs.
    #[must_use]
    pub fn for_worker(config: &MoverConfig, worker: usize) -> Self {
        Self::new(config, worker % config.options.queues.max(1))
    }
}

impl std::fmt::Display for QueuePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] => [{}]", self.source_key, self.dest_key)
    }
}
