//! Error types for redis-queue-mover.
//!
//! The variants mirror how a failure is handled at runtime:
//! configuration errors stop the process before any worker starts,
//! connection errors stop the affected worker only (and the whole run when
//! no worker could start), store errors are logged and retried, and
//! file-write errors stop the affected worker.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for mover operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while moving queue items.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or out-of-range setting.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Could not reach the source store.
    #[error("Failed to connect to source store '{nodes}': {reason}")]
    SourceConnection {
        /// Configured node list.
        nodes: String,
        /// Underlying cause.
        reason: String,
    },

    /// Could not reach the destination store.
    #[error("Failed to connect to destination store '{nodes}': {reason}")]
    DestinationConnection {
        /// Configured node list.
        nodes: String,
        /// Underlying cause.
        reason: String,
    },

    /// Pop from a source queue failed.
    #[error("Pop from '{key}' failed: {reason}")]
    Pop {
        /// Source queue key.
        key: String,
        /// Underlying cause.
        reason: String,
    },

    /// Push to a destination queue failed.
    #[error("Push to '{key}' failed: {reason}")]
    Push {
        /// Destination queue key.
        key: String,
        /// Underlying cause.
        reason: String,
    },

    /// Destination file could not be opened.
    #[error("Failed to open destination file '{path}': {source}")]
    FileOpen {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Write to the destination file failed.
    #[error("Failed to write destination file '{path}': {source}")]
    FileWrite {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Every worker failed to open its connections, so nothing can be moved.
    #[error("No mover worker started, all {workers} failed: {reason}")]
    NoWorkerStarted {
        /// Number of workers that failed.
        workers: usize,
        /// First failure reported.
        reason: String,
    },

    /// YAML configuration could not be parsed.
    #[error("Invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Other I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true if the failed operation may be repeated with the same input.
    ///
    /// Only store round-trips qualify. A file write is never retried and a
    /// connection that could not be established ends the worker.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Pop { .. } | Self::Push { .. })
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_are_retryable() {
        let pop = Error::Pop {
            key: "mooon:0".to_string(),
            reason: "timeout".to_string(),
        };
        let push = Error::Push {
            key: "dst:0".to_string(),
            reason: "connection reset".to_string(),
        };

        assert!(pop.is_retryable());
        assert!(push.is_retryable());
    }

    #[test]
    fn test_file_write_is_fatal_not_retryable() {
        let err = Error::FileWrite {
            path: PathBuf::from("/tmp/out.data"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };

        assert!(!err.is_retryable());
        assert!(err.to_string().contains("/tmp/out.data"));
    }

    #[test]
    fn test_config_error_not_retryable() {
        let err = Error::Config("src_redis is not set".to_string());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_no_worker_started_names_cause() {
        let err = Error::NoWorkerStarted {
            workers: 3,
            reason: "Failed to open destination file '/x/out.data'".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("all 3 failed"));
        assert!(msg.contains("/x/out.data"));
    }
}
