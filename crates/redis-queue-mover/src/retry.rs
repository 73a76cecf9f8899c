//! Fixed-interval retry of batch delivery.
//!
//! A batch that failed to reach the destination store is offered again,
//! unchanged, every `interval` until it is accepted or shutdown is
//! requested. There is no backoff growth and no attempt limit:
//! items are never dropped because the destination is unavailable.

use std::time::Duration;
use tracing::{debug, error};

use crate::destination::Destination;
use crate::error::Result;
use crate::shutdown::ShutdownFlag;

/// Retry behavior for destination delivery: forever, every `interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait between attempts.
    pub interval: Duration,
}

impl RetryPolicy {
    /// Retries every `interval`.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

/// Result of delivering one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The destination accepted the batch.
    Delivered {
        /// Attempts made, the successful one included.
        attempts: u32,
    },
    /// Shutdown was requested before the batch was accepted.
    Abandoned {
        /// Failed attempts made.
        attempts: u32,
    },
}

/// Delivers `batch` to `destination`, retrying retryable failures.
///
/// # Errors
///
/// Returns the first non-retryable error.
pub async fn deliver_with_retry(
    policy: &RetryPolicy,
    destination: &mut dyn Destination,
    batch: &[Vec<u8>],
    shutdown: &ShutdownFlag,
) -> Result<Delivery> {
    let mut failed = 0u32;

    loop {
        match destination.deliver(batch).await {
            Ok(()) => {
                if failed > 0 {
                    debug!(
                        "{}: delivered {} items after {} retries",
                        destination.describe(),
                        batch.len(),
                        failed
                    );
                }
                return Ok(Delivery::Delivered {
                    attempts: failed + 1,
                });
            }
            Err(e) if e.is_retryable() => {
                failed += 1;
                error!(
                    "{}: delivery attempt {} of {} items failed: {}",
                    destination.describe(),
                    failed,
                    batch.len(),
                    e
                );
                if shutdown.sleep(policy.interval).await {
                    return Ok(Delivery::Abandoned { attempts: failed });
                }
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::MemoryQueueStore;
    use crate::destination::QueueDestination;
    use crate::error::Error;
    use async_trait::async_trait;

    struct BrokenFile;

    #[async_trait]
    impl Destination for BrokenFile {
        fn describe(&self) -> String {
            "broken".to_string()
        }

        async fn deliver(&mut self, _batch: &[Vec<u8>]) -> Result<()> {
            Err(Error::FileWrite {
                path: "/dev/full".into(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "no space"),
            })
        }
    }

    fn batch() -> Vec<Vec<u8>> {
        vec![b"a".to_vec(), b"b".to_vec()]
    }

    #[tokio::test]
    async fn test_delivered_first_try() {
        let store = MemoryQueueStore::new();
        let mut dest = QueueDestination::new(Box::new(store.clone()), "d");
        let policy = RetryPolicy::new(Duration::from_millis(1));

        let outcome = deliver_with_retry(&policy, &mut dest, &batch(), &ShutdownFlag::new())
            .await
            .unwrap();

        assert_eq!(outcome, Delivery::Delivered { attempts: 1 });
        assert_eq!(store.len("d"), 2);
    }

    #[tokio::test]
    async fn test_same_batch_delivered_once_after_failures() {
        let store = MemoryQueueStore::new();
        store.fail_next_pushes(3);
        let mut dest = QueueDestination::new(Box::new(store.clone()), "d");
        let policy = RetryPolicy::new(Duration::from_millis(1));

        let outcome = deliver_with_retry(&policy, &mut dest, &batch(), &ShutdownFlag::new())
            .await
            .unwrap();

        assert_eq!(outcome, Delivery::Delivered { attempts: 4 });
        assert_eq!(store.push_sizes(), vec![2]);
        assert_eq!(store.items_lossy("d"), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_no_attempt_limit() {
        let store = MemoryQueueStore::new();
        store.fail_next_pushes(200);
        let mut dest = QueueDestination::new(Box::new(store.clone()), "d");
        let policy = RetryPolicy::new(Duration::from_millis(1));

        let outcome = deliver_with_retry(&policy, &mut dest, &batch(), &ShutdownFlag::new())
            .await
            .unwrap();

        assert_eq!(outcome, Delivery::Delivered { attempts: 201 });
        assert_eq!(store.items_lossy("d"), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_abandoned_on_shutdown() {
        let store = MemoryQueueStore::new();
        store.fail_next_pushes(u32::MAX);
        let mut dest = QueueDestination::new(Box::new(store.clone()), "d");
        let policy = RetryPolicy::new(Duration::from_secs(60));
        let shutdown = ShutdownFlag::new();
        let setter = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            setter.set();
        });

        let outcome = deliver_with_retry(&policy, &mut dest, &batch(), &shutdown)
            .await
            .unwrap();

        assert_eq!(outcome, Delivery::Abandoned { attempts: 1 });
        assert!(store.is_empty("d"));
    }

    #[tokio::test]
    async fn test_file_error_not_retried() {
        let policy = RetryPolicy::new(Duration::from_millis(1));
        let err = deliver_with_retry(&policy, &mut BrokenFile, &batch(), &ShutdownFlag::new())
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
    }
}
