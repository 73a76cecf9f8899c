// Mover tool - pedantic lints relaxed for CLI ergonomics
#![allow(clippy::pedantic)]

//! # Redis Queue Mover
//!
//! `redis-queue-mover` is a CLI tool and library that moves items, in order,
//! from one set of Redis list queues into another set of queues (or into a
//! flat file), continuously and concurrently, until told to stop.
//!
//! Queue `i` is addressed by a key made of a prefix and the index, e.g.
//! `mooon:0`, `mooon:1`, `mooon:2`. Items are popped from the tail of the
//! source queue and pushed to the head of the destination queue.
//!
//! ## Quick Start
//!
//! ```bash
//! # Three queue pairs, two workers each, batches of 100
//! redis-queue-mover --src-redis 127.0.0.1:6379 --src-prefix 'mooon:' \
//!     --dst-redis 127.0.0.1:6380 --dst-prefix 'mooon:' \
//!     --queues 3 --threads 2 --batch 100
//!
//! # Drain into a file
//! redis-queue-mover --src-redis 127.0.0.1:6379 --src-prefix 'mooon:' \
//!     --dst-file /data/mooon.data
//! ```
//!
//! ## Configuration Example
//!
//! ```yaml
//! source:
//!   redis: 127.0.0.1:6379,127.0.0.1:6380
//!   prefix: "mooon:"
//!
//! destination:
//!   redis: 127.0.0.1:6381
//!   prefix: "mooon:"
//!
//! options:
//!   queues: 3
//!   threads: 2
//!   batch: 100
//! ```
//!
//! ## Delivery guarantees
//!
//! Each worker preserves the order of the items it moves. Items popped but
//! not yet delivered exist only in memory, so a crash in that window loses
//! them: delivery is at most once under a crash.

#![warn(missing_docs)]

pub mod config;
pub mod connectors;
pub mod destination;
pub mod engine;
pub mod error;
pub mod keys;
pub mod retry;
pub mod shutdown;
pub mod stats;
pub mod worker;

pub use config::{DestinationKind, MoverConfig, MoverOptions};
pub use connectors::{Connector, MemoryConnector, MemoryQueueStore, QueueStore, RedisConnector};
pub use destination::{Destination, FileDestination, QueueDestination};
pub use engine::{Engine, MoveSummary};
pub use error::{Error, Result};
pub use keys::{queue_key, QueuePair};
pub use shutdown::ShutdownFlag;
pub use stats::MoveCounter;
pub use worker::{MoverWorker, WorkerExit, WorkerReport};
