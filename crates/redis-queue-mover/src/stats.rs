//! Move counter and periodic throughput reporting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::shutdown::ShutdownFlag;

/// Log target of throughput lines, so they can be filtered on their own.
pub const STAT_TARGET: &str = "redis_queue_mover::stat";

/// Total number of items delivered by all workers.
///
/// Incremented only after a destination write succeeded. Never decreases.
#[derive(Debug, Clone, Default)]
pub struct MoveCounter {
    moved: Arc<AtomicU64>,
}

impl MoveCounter {
    /// Creates a counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `n` delivered items.
    pub fn increment_by(&self, n: u64) {
        self.moved.fetch_add(n, Ordering::Relaxed);
    }

    /// Current total.
    #[must_use]
    pub fn snapshot(&self) -> u64 {
        self.moved.load(Ordering::Relaxed)
    }
}

/// One throughput sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThroughputSample {
    /// Total at this sample.
    pub total: u64,
    /// Total at the previous sample.
    pub previous: u64,
    /// Items moved in between.
    pub delta: u64,
    /// Items per second, truncated.
    pub per_second: u64,
}

impl ThroughputSample {
    /// Builds a sample, or `None` if nothing moved during the interval.
    #[must_use]
    pub fn between(previous: u64, total: u64, interval: Duration) -> Option<Self> {
        if total <= previous {
            return None;
        }
        let delta = total - previous;
        let secs = interval.as_secs().max(1);
        Some(Self {
            total,
            previous,
            delta,
            per_second: delta / secs,
        })
    }
}

/// Samples `counter` every `interval` and logs a line when it moved.
///
/// Returns once `shutdown` is set.
pub async fn run_reporter(counter: MoveCounter, interval: Duration, shutdown: ShutdownFlag) {
    let mut previous = 0u64;

    while !shutdown.is_set() {
        if shutdown.sleep(interval).await {
            break;
        }

        let total = counter.snapshot();
        if let Some(sample) = ThroughputSample::between(previous, total, interval) {
            info!(
                target: STAT_TARGET,
                total = sample.total,
                previous = sample.previous,
                delta = sample.delta,
                per_second = sample.per_second,
                "{} {} {} {}/s MOVED",
                sample.total,
                sample.previous,
                sample.delta,
                sample.per_second
            );
        }
        previous = total;
    }
    info!("stats reporter exit now, {} items moved", counter.snapshot());
}
