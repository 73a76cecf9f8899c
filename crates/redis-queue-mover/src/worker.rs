//! Mover worker: the batched pop/push loop for one queue pair.
//!
//! Each iteration pops up to `batch` items one by one from the tail of the
//! source queue, then delivers them as one unit. An empty pop ends the batch
//! early; an empty batch makes the worker sleep for the retry interval.
//!
//! A worker preserves the order of the items it moves. Workers sharing a
//! queue pair interleave their batches on the destination in no particular
//! order.
//!
//! Popped items live only in the worker's memory until the destination
//! accepts them. If the process dies in between, or shutdown arrives while a
//! delivery is being retried, those items are lost: delivery is at most once
//! under a crash.

use tracing::{debug, error, info, warn};

use crate::config::{DestinationKind, MoverConfig};
use crate::connectors::{Connector, QueueStore};
use crate::destination::{Destination, FileDestination, QueueDestination};
use crate::error::{Error, Result};
use crate::keys::QueuePair;
use crate::retry::{deliver_with_retry, Delivery, RetryPolicy};
use crate::shutdown::ShutdownFlag;
use crate::stats::MoveCounter;

/// Per-worker tuning taken from the options.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Maximum items per batch.
    pub batch: usize,
    /// Idle backoff and push retry policy.
    pub retry: RetryPolicy,
    /// Log progress every `tick` items.
    pub tick: u64,
}

impl WorkerSettings {
    /// Settings from the mover configuration.
    #[must_use]
    pub fn from_config(config: &MoverConfig) -> Self {
        Self {
            batch: config.options.batch.max(1),
            retry: RetryPolicy::new(config.options.retry_interval()),
            tick: config.options.tick.max(1),
        }
    }
}

/// Why a worker stopped.
#[derive(Debug)]
pub enum WorkerExit {
    /// The shutdown flag was observed.
    Shutdown,
    /// A source or destination connection could not be established.
    ConnectFailed(Error),
    /// The destination rejected a batch with a non-retryable error.
    WriteFailed(Error),
}

/// Summary returned by a finished worker.
#[derive(Debug)]
pub struct WorkerReport {
    /// Worker number.
    pub worker: usize,
    /// Queue pair served.
    pub pair: QueuePair,
    /// Items this worker delivered.
    pub moved: u64,
    /// Why it stopped.
    pub exit: WorkerExit,
}

/// One mover worker with its own connections.
pub struct MoverWorker {
    id: usize,
    pair: QueuePair,
    source: Box<dyn QueueStore>,
    destination: Box<dyn Destination>,
    settings: WorkerSettings,
    counter: MoveCounter,
    shutdown: ShutdownFlag,
    moved: u64,
    last_tick: u64,
}

impl MoverWorker {
    /// Creates a worker over already opened connections.
    #[must_use]
    pub fn new(
        id: usize,
        pair: QueuePair,
        source: Box<dyn QueueStore>,
        destination: Box<dyn Destination>,
        settings: WorkerSettings,
        counter: MoveCounter,
        shutdown: ShutdownFlag,
    ) -> Self {
        Self {
            id,
            pair,
            source,
            destination,
            settings,
            counter,
            shutdown,
            moved: 0,
            last_tick: 0,
        }
    }

    /// Opens the worker's own source connection and destination.
    ///
    /// # Errors
    ///
    /// Returns a connection or file-open error; the worker must not start.
    pub async fn open(
        id: usize,
        pair: QueuePair,
        connector: &dyn Connector,
        destination: &DestinationKind,
        settings: WorkerSettings,
        counter: MoveCounter,
        shutdown: ShutdownFlag,
    ) -> Result<Self> {
        let source = connector.open_source().await?;
        let destination: Box<dyn Destination> = match destination {
            DestinationKind::Store => Box::new(QueueDestination::new(
                connector.open_destination().await?,
                pair.dest_key.clone(),
            )),
            DestinationKind::File(path) => Box::new(FileDestination::open(path).await?),
        };
        Ok(Self::new(
            id,
            pair,
            source,
            destination,
            settings,
            counter,
            shutdown,
        ))
    }

    /// Runs until shutdown or a fatal delivery error.
    pub async fn run(mut self) -> WorkerReport {
        info!(
            worker = self.id,
            "[{}] => [{}]",
            self.pair.source_key,
            self.destination.describe()
        );

        let mut batch = Vec::with_capacity(self.settings.batch);
        let exit = loop {
            if self.shutdown.is_set() {
                break WorkerExit::Shutdown;
            }

            batch.clear();
            self.fill_batch(&mut batch).await;

            if batch.is_empty() {
                if self.shutdown.sleep(self.settings.retry.interval).await {
                    break WorkerExit::Shutdown;
                }
                continue;
            }

            match deliver_with_retry(
                &self.settings.retry,
                self.destination.as_mut(),
                &batch,
                &self.shutdown,
            )
            .await
            {
                Ok(Delivery::Delivered { .. }) => self.record(batch.len() as u64),
                Ok(Delivery::Abandoned { attempts }) => {
                    error!(
                        worker = self.id,
                        "{}: {} items popped from [{}] were not delivered after {} attempts, shutting down",
                        self.pair,
                        batch.len(),
                        self.pair.source_key,
                        attempts
                    );
                    break WorkerExit::Shutdown;
                }
                Err(e) => {
                    error!(worker = self.id, "{}: {}", self.pair, e);
                    break WorkerExit::WriteFailed(e);
                }
            }
        };

        if let Err(e) = self.destination.close().await {
            warn!(worker = self.id, "{}: closing destination failed: {}", self.pair, e);
        }
        info!(
            worker = self.id,
            moved = self.moved,
            "redis queue mover worker {} exit now",
            self.id
        );

        WorkerReport {
            worker: self.id,
            pair: self.pair,
            moved: self.moved,
            exit,
        }
    }

    /// Pops up to `batch` items. Pop errors are logged and polling goes on.
    async fn fill_batch(&mut self, batch: &mut Vec<Vec<u8>>) {
        for k in 0..self.settings.batch {
            if self.shutdown.is_set() {
                break;
            }
            match self.source.pop(&self.pair.source_key).await {
                Ok(Some(value)) => {
                    debug!(
                        worker = self.id,
                        "[{}] {}",
                        k,
                        String::from_utf8_lossy(&value)
                    );
                    batch.push(value);
                }
                Ok(None) => break,
                Err(e) => error!(worker = self.id, "[{}]: {}", self.pair.source_key, e),
            }
        }
    }

    fn record(&mut self, n: u64) {
        self.counter.increment_by(n);
        self.moved += n;
        if self.moved - self.last_tick >= self.settings.tick {
            self.last_tick = self.moved;
            info!(worker = self.id, "{}: {}", self.pair, self.moved);
        }
    }
}
