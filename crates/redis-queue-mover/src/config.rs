//! Configuration types for redis-queue-mover.
//!
//! Settings can come from a YAML file, from the command line, or both
//! (command-line values win). Every field has a default so a config file
//! only needs to name what differs.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Largest accepted number of queue pairs.
pub const MAX_QUEUES: usize = 2019;
/// Largest accepted thread factor.
pub const MAX_THREAD_FACTOR: usize = 20;
/// Largest accepted batch size.
pub const MAX_BATCH: usize = 100_000;

/// Main mover configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MoverConfig {
    /// Where items are popped from.
    #[serde(default)]
    pub source: SourceConfig,
    /// Where items are delivered to.
    #[serde(default)]
    pub destination: DestinationConfig,
    /// Pool sizing, batching and timing.
    #[serde(default)]
    pub options: MoverOptions,
}

/// Source store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Comma-separated nodes, e.g. `127.0.0.1:6379,127.0.0.1:6380`.
    pub redis: String,
    /// Queue key prefix.
    pub prefix: String,
    /// Use `prefix` as the whole key instead of `prefix` + index.
    pub only_prefix: bool,
    /// Connect and response timeout in milliseconds.
    pub timeout_ms: u64,
    /// Optional password.
    pub password: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            redis: String::new(),
            prefix: String::new(),
            only_prefix: false,
            timeout_ms: default_timeout_ms(),
            password: None,
        }
    }
}

/// Destination configuration: a store, or a flat file when no store is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationConfig {
    /// Comma-separated nodes. Takes priority over `file`.
    pub redis: String,
    /// Output file, one item per line.
    pub file: Option<PathBuf>,
    /// Queue key prefix (required with `redis`).
    pub prefix: String,
    /// Use `prefix` as the whole key instead of `prefix` + index.
    pub only_prefix: bool,
    /// Connect and response timeout in milliseconds.
    pub timeout_ms: u64,
    /// Optional password.
    pub password: Option<String>,
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            redis: String::new(),
            file: None,
            prefix: String::new(),
            only_prefix: false,
            timeout_ms: default_timeout_ms(),
            password: None,
        }
    }
}

/// Mover options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MoverOptions {
    /// Number of queue pairs.
    pub queues: usize,
    /// Workers per queue pair; the pool holds `queues * threads` workers.
    pub threads: usize,
    /// Maximum number of items moved by one push.
    pub batch: usize,
    /// Log a progress line every `tick` items moved by a worker.
    pub tick: u64,
    /// Seconds between throughput lines.
    pub stat_interval_secs: u64,
    /// Milliseconds to wait when a queue is empty or a push failed.
    pub retry_interval_ms: u64,
    /// Distinguishes log output of concurrently running instances.
    pub label: String,
}

impl Default for MoverOptions {
    fn default() -> Self {
        Self {
            queues: 1,
            threads: 1,
            batch: 1,
            tick: 10_000,
            stat_interval_secs: 2,
            retry_interval_ms: 100,
            label: String::new(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    10_000
}

/// Which Destination Target the workers write to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestinationKind {
    /// Push into destination store queues.
    Store,
    /// Append lines to a file.
    File(PathBuf),
}

impl SourceConfig {
    /// Connect and response timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl DestinationConfig {
    /// Connect and response timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl MoverOptions {
    /// Total number of mover workers.
    #[must_use]
    pub fn num_workers(&self) -> usize {
        self.queues * self.threads
    }

    /// Idle backoff and push retry interval.
    #[must_use]
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    /// Sampling interval of the stats reporter.
    #[must_use]
    pub fn stat_interval(&self) -> Duration {
        Duration::from_secs(self.stat_interval_secs)
    }
}

impl MoverConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Active destination variant. A store wins over a file.
    #[must_use]
    pub fn destination_kind(&self) -> Option<DestinationKind> {
        if !self.destination.redis.trim().is_empty() {
            return Some(DestinationKind::Store);
        }
        self.destination
            .file
            .as_ref()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| DestinationKind::File(p.clone()))
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first offending setting.
    pub fn validate(&self) -> Result<()> {
        if self.source.redis.trim().is_empty() {
            return Err(Error::Config("source redis (--src-redis) is not set".to_string()));
        }
        let Some(kind) = self.destination_kind() else {
            return Err(Error::Config(
                "both destination redis (--dst-redis) and destination file (--dst-file) are not set"
                    .to_string(),
            ));
        };
        if self.source.prefix.is_empty() {
            return Err(Error::Config("source prefix (--src-prefix) is not set".to_string()));
        }
        if kind == DestinationKind::Store && self.destination.prefix.is_empty() {
            return Err(Error::Config(
                "destination prefix (--dst-prefix) is not set".to_string(),
            ));
        }

        let opts = &self.options;
        check_range("queues", opts.queues, 1, MAX_QUEUES)?;
        check_range("threads", opts.threads, 1, MAX_THREAD_FACTOR)?;
        check_range("batch", opts.batch, 1, MAX_BATCH)?;
        if opts.tick == 0 {
            return Err(Error::Config("tick must be greater than 0".to_string()));
        }
        if opts.stat_interval_secs == 0 {
            return Err(Error::Config("stat interval must be at least 1 second".to_string()));
        }
        if opts.retry_interval_ms == 0 {
            return Err(Error::Config(
                "retry interval must be at least 1 millisecond".to_string(),
            ));
        }
        if self.source.timeout_ms == 0 || self.destination.timeout_ms == 0 {
            return Err(Error::Config("timeouts must be at least 1 millisecond".to_string()));
        }
        Ok(())
    }
}

fn check_range(name: &str, value: usize, min: usize, max: usize) -> Result<()> {
    if value < min || value > max {
        return Err(Error::Config(format!(
            "{name} must be between {min} and {max}, got {value}"
        )));
    }
    Ok(())
}
