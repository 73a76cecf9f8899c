//! Destination targets.
//!
//! A worker delivers each batch either to a destination queue (one push
//! per batch) or to a flat file (one line per item). The variant is chosen
//! once at startup and fixed for the worker's lifetime.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::connectors::QueueStore;
use crate::error::{Error, Result};

/// Where a worker delivers its batches.
#[async_trait]
pub trait Destination: Send {
    /// Short description used in log lines.
    fn describe(&self) -> String;

    /// Delivers the whole batch, preserving its order.
    async fn deliver(&mut self, batch: &[Vec<u8>]) -> Result<()>;

    /// Releases the underlying handle.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Pushes batches into a destination queue.
pub struct QueueDestination {
    store: Box<dyn QueueStore>,
    key: String,
}

impl QueueDestination {
    /// Delivers into `key` through `store`.
    #[must_use]
    pub fn new(store: Box<dyn QueueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }
}

#[async_trait]
impl Destination for QueueDestination {
    fn describe(&self) -> String {
        format!("{}/{}", self.store.describe(), self.key)
    }

    async fn deliver(&mut self, batch: &[Vec<u8>]) -> Result<()> {
        self.store.push(&self.key, batch).await
    }
}

/// Appends one line per item to a file.
///
/// Several workers may hold their own handle on the same path. Lines from
/// different handles can interleave; a single batch is written with one
/// buffered flush.
pub struct FileDestination {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl FileDestination {
    /// Opens `path` for appending, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileOpen`] if the file cannot be opened.
    pub async fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|source| Error::FileOpen {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    async fn write_batch(&mut self, batch: &[Vec<u8>]) -> std::io::Result<()> {
        for value in batch {
            self.writer.write_all(value).await?;
            self.writer.write_all(b"\n").await?;
        }
        self.writer.flush().await
    }
}

#[async_trait]
impl Destination for FileDestination {
    fn describe(&self) -> String {
        format!("file://{}", self.path.display())
    }

    async fn deliver(&mut self, batch: &[Vec<u8>]) -> Result<()> {
        self.write_batch(batch)
            .await
            .map_err(|source| Error::FileWrite {
                path: self.path.clone(),
                source,
            })
    }

    async fn close(&mut self) -> Result<()> {
        self.writer.shutdown().await.map_err(|source| Error::FileWrite {
            path: self.path.clone(),
            source,
        })
    }
}
