//! Engine: starts the worker pool, the stats reporter and the signal
//! watcher, then waits for all of them.

use futures::future::join_all;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument, Span};

use crate::config::{DestinationKind, MoverConfig};
use crate::connectors::{Connector, RedisConnector};
use crate::error::{Error, Result};
use crate::keys::QueuePair;
use crate::shutdown::{watch_signals, ShutdownFlag};
use crate::stats::{run_reporter, MoveCounter};
use crate::worker::{MoverWorker, WorkerExit, WorkerReport, WorkerSettings};

/// Outcome of a complete run.
#[derive(Debug)]
pub struct MoveSummary {
    /// Items delivered by all workers.
    pub moved: u64,
    /// One report per worker, ordered by worker number.
    pub workers: Vec<WorkerReport>,
    /// Workers whose task panicked; their items are in `moved` but they
    /// have no report.
    pub lost_workers: usize,
}

impl MoveSummary {
    /// Number of reported workers that stopped on a connection or write error.
    #[must_use]
    pub fn failed_workers(&self) -> usize {
        self.workers
            .iter()
            .filter(|r| !matches!(r.exit, WorkerExit::Shutdown))
            .count()
    }

    /// First connection error, if no reported worker got past opening its
    /// connections.
    fn startup_failure(&self) -> Option<&Error> {
        let mut first = None;
        for report in &self.workers {
            match &report.exit {
                WorkerExit::ConnectFailed(e) => {
                    first.get_or_insert(e);
                }
                _ => return None,
            }
        }
        first
    }
}

/// The move engine.
pub struct Engine {
    config: MoverConfig,
    destination: DestinationKind,
    connector: Arc<dyn Connector>,
    counter: MoveCounter,
    shutdown: ShutdownFlag,
    watch_signals: bool,
}

impl Engine {
    /// Creates an engine over `connector`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid.
    pub fn new(config: MoverConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        config.validate()?;
        let destination = config
            .destination_kind()
            .ok_or_else(|| Error::Config("no destination configured".to_string()))?;
        Ok(Self {
            config,
            destination,
            connector,
            counter: MoveCounter::new(),
            shutdown: ShutdownFlag::new(),
            watch_signals: true,
        })
    }

    /// Creates an engine talking to the Redis stores named in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid.
    pub fn from_config(config: MoverConfig) -> Result<Self> {
        config.validate()?;
        let connector = RedisConnector::from_config(&config)?;
        Self::new(config, Arc::new(connector))
    }

    /// Does not install the signal watcher; shutdown then only comes from
    /// [`Engine::shutdown_flag`].
    #[must_use]
    pub fn without_signal_watcher(mut self) -> Self {
        self.watch_signals = false;
        self
    }

    /// Handle on the shutdown flag.
    #[must_use]
    pub fn shutdown_flag(&self) -> ShutdownFlag {
        self.shutdown.clone()
    }

    /// Handle on the move counter.
    #[must_use]
    pub fn counter(&self) -> MoveCounter {
        self.counter.clone()
    }

    /// Effective settings, one line each. Passwords are left out.
    fn settings_lines(&self) -> Vec<String> {
        let src = &self.config.source;
        let dst = &self.config.destination;
        let opts = &self.config.options;
        let destination = match &self.destination {
            DestinationKind::Store => format!("Destination redis: {}", dst.redis),
            DestinationKind::File(path) => format!("Destination file: {}", path.display()),
        };
        vec![
            format!("Source redis: {}", src.redis),
            destination,
            format!("Source timeout: {:?}", src.timeout()),
            format!("Destination timeout: {:?}", dst.timeout()),
            format!("Source key prefix: {}", src.prefix),
            format!("Destination key prefix: {}", dst.prefix),
            format!("Number of queues: {}", opts.queues),
            format!("Factor of threads: {}", opts.threads),
            format!("Number of threads: {}", opts.num_workers()),
            format!("Number of batch to move: {}", opts.batch),
            format!("Only prefix of source: {}", src.only_prefix),
            format!("Only prefix of destination: {}", dst.only_prefix),
            format!("Retry interval: {:?}", opts.retry_interval()),
            format!("Stat interval: {:?}", opts.stat_interval()),
            format!("Tick: {}", opts.tick),
            format!("Label: {}", opts.label),
        ]
    }

    fn log_settings(&self) {
        for line in self.settings_lines() {
            info!("{}", line);
        }

        let opts = &self.config.options;
        if self.destination == DestinationKind::Store && self.config.destination.file.is_some() {
            warn!("Destination redis is set, destination file is ignored");
        }
        if matches!(self.destination, DestinationKind::File(_)) && opts.threads > 1 {
            warn!(
                "{} workers per queue append to the same file; lines from different workers may interleave",
                opts.threads
            );
        }
    }

    /// Runs until every worker has stopped.
    ///
    /// Workers that fail on their own are reported in the summary while
    /// others keep running.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoWorkerStarted`] if every worker failed to open its
    /// connections or destination file.
    pub async fn run(self) -> Result<MoveSummary> {
        let span = if self.config.options.label.is_empty() {
            Span::none()
        } else {
            info_span!("mover", label = %self.config.options.label)
        };
        self.run_inner(span.clone()).instrument(span).await
    }

    async fn run_inner(self, span: Span) -> Result<MoveSummary> {
        self.log_settings();

        let watcher = self
            .watch_signals
            .then(|| tokio::spawn(watch_signals(self.shutdown.clone()).instrument(span.clone())));
        let reporter = tokio::spawn(
            run_reporter(
                self.counter.clone(),
                self.config.options.stat_interval(),
                self.shutdown.clone(),
            )
            .instrument(span.clone()),
        );

        let settings = WorkerSettings::from_config(&self.config);
        let handles: Vec<_> = (0..self.config.options.num_workers())
            .map(|id| {
                let pair = QueuePair::for_worker(&self.config, id);
                tokio::spawn(
                    run_worker(
                        id,
                        pair,
                        Arc::clone(&self.connector),
                        self.destination.clone(),
                        settings.clone(),
                        self.counter.clone(),
                        self.shutdown.clone(),
                    )
                    .instrument(span.clone()),
                )
            })
            .collect();

        let mut workers = Vec::with_capacity(handles.len());
        let mut lost_workers = 0;
        for result in join_all(handles).await {
            match result {
                Ok(report) => workers.push(report),
                Err(e) => {
                    lost_workers += 1;
                    error!("mover worker task failed, its report is lost: {}", e);
                }
            }
        }

        if !self.shutdown.is_set() {
            warn!("all mover workers exited, stopping");
            self.shutdown.set();
        }
        if let Err(e) = reporter.await {
            error!("stats reporter task failed: {}", e);
        }
        if let Some(watcher) = watcher {
            if let Err(e) = watcher.await {
                error!("signal watcher task failed: {}", e);
            }
        }

        let summary = MoveSummary {
            moved: self.counter.snapshot(),
            workers,
            lost_workers,
        };
        info!(
            moved = summary.moved,
            failed_workers = summary.failed_workers(),
            lost_workers = summary.lost_workers,
            "RedisQueueMover process exit now"
        );

        if let Some(e) = summary.startup_failure() {
            return Err(Error::NoWorkerStarted {
                workers: summary.workers.len(),
                reason: e.to_string(),
            });
        }
        Ok(summary)
    }
}

async fn run_worker(
    id: usize,
    pair: QueuePair,
    connector: Arc<dyn Connector>,
    destination: DestinationKind,
    settings: WorkerSettings,
    counter: MoveCounter,
    shutdown: ShutdownFlag,
) -> WorkerReport {
    match MoverWorker::open(
        id,
        pair.clone(),
        connector.as_ref(),
        &destination,
        settings,
        counter,
        shutdown,
    )
    .await
    {
        Ok(worker) => worker.run().await,
        Err(e) => {
            error!(worker = id, "{}: {}", pair, e);
            WorkerReport {
                worker: id,
                pair,
                moved: 0,
                exit: WorkerExit::ConnectFailed(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::MemoryConnector;

    fn config() -> MoverConfig {
        let mut config = MoverConfig::default();
        config.source.redis = "127.0.0.1:6379".to_string();
        config.source.prefix = "mooon:".to_string();
        config.source.timeout_ms = 1500;
        config.source.password = Some("src-secret".to_string());
        config.destination.redis = "127.0.0.1:6380".to_string();
        config.destination.prefix = "mooon:".to_string();
        config.destination.timeout_ms = 2500;
        config.destination.password = Some("dst-secret".to_string());
        config.options.tick = 500;
        config.options.label = "test".to_string();
        config
    }

    #[test]
    fn test_settings_lines_cover_timeouts_tick_label() {
        let engine = Engine::new(config(), Arc::new(MemoryConnector::default())).unwrap();
        let lines = engine.settings_lines();

        assert!(lines.contains(&"Source timeout: 1.5s".to_string()));
        assert!(lines.contains(&"Destination timeout: 2.5s".to_string()));
        assert!(lines.contains(&"Tick: 500".to_string()));
        assert!(lines.contains(&"Label: test".to_string()));
        assert!(lines.contains(&"Destination redis: 127.0.0.1:6380".to_string()));
    }

    #[test]
    fn test_settings_lines_hide_passwords() {
        let engine = Engine::new(config(), Arc::new(MemoryConnector::default())).unwrap();
        assert!(engine
            .settings_lines()
            .iter()
            .all(|line| !line.contains("secret")));
    }

    #[test]
    fn test_startup_failure_needs_every_worker_failed() {
        let pair = QueuePair {
            index: 0,
            source_key: "src:0".to_string(),
            dest_key: "dst:0".to_string(),
        };
        let failed = |worker| WorkerReport {
            worker,
            pair: pair.clone(),
            moved: 0,
            exit: WorkerExit::ConnectFailed(Error::Config("refused".to_string())),
        };

        let all_failed = MoveSummary {
            moved: 0,
            workers: vec![failed(0), failed(1)],
            lost_workers: 0,
        };
        assert!(all_failed.startup_failure().is_some());

        let one_ran = MoveSummary {
            moved: 4,
            workers: vec![
                failed(0),
                WorkerReport {
                    worker: 1,
                    pair: pair.clone(),
                    moved: 4,
                    exit: WorkerExit::Shutdown,
                },
            ],
            lost_workers: 0,
        };
        assert!(one_ran.startup_failure().is_none());

        let empty = MoveSummary {
            moved: 0,
            workers: Vec::new(),
            lost_workers: 1,
        };
        assert!(empty.startup_failure().is_none());
    }
}
