//! Cooperative shutdown.
//!
//! [`ShutdownFlag`] is a clonable handle around a cancellation token. It goes
//! from unset to set once and never back. Workers poll it between store
//! calls and race their sleeps against it, so a worker blocked inside a store
//! call only notices shutdown once that call returns or times out.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Process-wide shutdown flag shared by every task.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag {
    token: CancellationToken,
}

impl ShutdownFlag {
    /// Creates an unset flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag. Setting it again is a no-op.
    pub fn set(&self) {
        self.token.cancel();
    }

    /// Returns true once [`ShutdownFlag::set`] has been called on any clone.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes when the flag is set.
    pub async fn wait(&self) {
        self.token.cancelled().await;
    }

    /// Sleeps for `duration` or until the flag is set.
    ///
    /// Returns true if the sleep was cut short by shutdown.
    pub async fn sleep(&self, duration: std::time::Duration) -> bool {
        tokio::select! {
            () = self.token.cancelled() => true,
            () = tokio::time::sleep(duration) => self.is_set(),
        }
    }
}

/// Waits for SIGINT or SIGTERM and sets `shutdown`.
///
/// Keeps listening after a signal until the flag is observed set, then
/// returns. Also returns when some other task sets the flag first.
pub async fn watch_signals(shutdown: ShutdownFlag) {
    #[cfg(unix)]
    let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
    {
        Ok(sigterm) => Some(sigterm),
        Err(e) => {
            warn!(error = %e, "failed to register SIGTERM handler, listening for ctrl+c only");
            None
        }
    };

    while !shutdown.is_set() {
        #[cfg(unix)]
        let terminate = async {
            match sigterm.as_mut() {
                Some(sigterm) => {
                    sigterm.recv().await;
                }
                None => std::future::pending::<()>().await,
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = shutdown.wait() => break,
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => info!("sigint (ctrl+c) received, stopping movers"),
                Err(e) => {
                    warn!(error = %e, "failed to listen for ctrl+c");
                    shutdown.wait().await;
                    break;
                }
            },
            () = terminate => info!("sigterm received, stopping movers"),
        }
        shutdown.set();
    }
    info!("signal watcher exit now");
}
