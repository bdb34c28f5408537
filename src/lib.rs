//! # Spool
//!
//! Durable batching and delivery engine for bulk-ingestion sinks.
//!
//! Spool sits between a high-rate stream of small event documents and a
//! remote bulk-ingestion service with per-call overhead. It accumulates
//! documents, flushes them in batches when one of three independent triggers
//! fires (item count, byte size, elapsed time), uploads batches through a
//! bounded pool of concurrent workers with retry and backoff, and spills
//! undeliverable batches to disk so nothing is lost across restarts.
//!
//! ## Quick Start
//!
//! ```ignore
//! use spool::prelude::*;
//!
//! let spool = Spool::builder()
//!     .client(client)                  // your configured IngestClient
//!     .directory("./spool-data")
//!     .max_items(500)
//!     .recover_on_startup(true)
//!     .build()?;
//!
//! spool.add(serde_json::json!({"event": "login"}));
//!
//! // Graceful shutdown: drains the buffer and the upload queue.
//! spool.close();
//! ```
//!
//! ## Delivery guarantees
//!
//! At-least-once: every document handed to [`Spool::add`] is eventually
//! acknowledged by the ingestion client or sits in exactly one spool file on
//! disk. Exactly-once is a non-goal; idempotency is left to the receiving
//! service. The single exception is when delivery *and* persistence both
//! fail (e.g. the disk is gone), which is logged at `error` level and
//! counted in [`MetricsSnapshot::documents_lost`].

#![warn(missing_docs)]

mod error;
mod spool;

pub mod prelude;

// Re-export main entry points
pub use error::{Error, Result};
pub use spool::{Spool, SpoolBuilder};

// Re-export the vocabulary types producers interact with
pub use spool_core::{
    BackoffPolicy, Batch, ConfigError, DeliveryError, Document, FlushOptions, IngestAck,
    IngestClient, PersistenceOptions, SpoolConfig, UploadOptions,
};
pub use spool_durability::StoreError;
pub use spool_engine::MetricsSnapshot;
