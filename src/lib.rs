//! Transcript Relay - reliable delivery of transcription records
//!
//! This crate is the offline-tolerant delivery subsystem of a dictation
//! client: transcribed speech fragments are produced continuously while the
//! app is active and must reach a remote collector without being lost when
//! the network is flaky or absent. It provides:
//!
//! - A durable FIFO queue of undelivered records, persisted as a single
//!   JSON slot that survives restarts
//! - An HTTP delivery client that posts single records or atomic batches
//!   and classifies every attempt as delivered or failed
//! - A sync coordinator that degrades failed live deliveries to queued
//!   records and drains the backlog when connectivity returns
//!
//! # Example
//!
//! ```rust,no_run
//! use transcript_relay::{
//!     config::RelayConfig,
//!     delivery::DeliveryClient,
//!     protocol::Record,
//!     queue::PendingQueue,
//!     sync::SyncCoordinator,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = RelayConfig::default();
//!     let queue = PendingQueue::open(config.queue_slot.clone()).await?;
//!     let client = DeliveryClient::new(&config)?;
//!     let coordinator = SyncCoordinator::new(queue, client);
//!
//!     // Live path: try to deliver, fall back to the queue on failure.
//!     let record = Record::new("hello world");
//!     let report = coordinator.deliver_now(record).await;
//!     println!("{}", report.message);
//!
//!     // Connectivity restored: flush whatever is pending.
//!     let report = coordinator.drain().await;
//!     println!("{}", report.message);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod delivery;
pub mod protocol;
pub mod queue;
pub mod sync;

// Re-export commonly used types for convenience
pub use config::RelayConfig;
pub use delivery::{Collector, DeliveryClient};
pub use protocol::{BatchEnvelope, DeliveryOutcome, Record, SyncReport};
pub use queue::PendingQueue;
pub use sync::SyncCoordinator;

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in the transcript-relay system
#[derive(Error, Debug)]
pub enum RelayError {
    /// Durable slot could not be read or written
    #[error("Persistence error at {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias for transcript-relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
