//! Main entry point: the `Spool` facade and its builder.

use crate::error::Result;
use spool_core::{
    BackoffPolicy, Document, IngestClient, SpoolConfig,
};
use spool_engine::{MetricsSnapshot, Pipeline};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// The spool engine, ready to accept documents.
///
/// Create one with [`Spool::builder`]. Cloning is cheap and shares the same
/// engine, so producer threads can each hold their own handle.
///
/// # Example
///
/// ```ignore
/// use spool::prelude::*;
///
/// let spool = Spool::builder()
///     .client(client)
///     .directory("./spool-data")
///     .build()?;
///
/// spool.add(serde_json::json!({"action": "login"}));
/// spool.close();
/// ```
#[derive(Clone)]
pub struct Spool {
    inner: Arc<Pipeline>,
}

impl Spool {
    /// Create a builder for spool configuration.
    pub fn builder() -> SpoolBuilder {
        SpoolBuilder::new()
    }

    /// Accept one document for eventual delivery.
    ///
    /// Returns immediately; the only way this blocks is caller-runs
    /// backpressure, when a triggered flush meets a full upload queue.
    /// Downstream delivery problems never surface here.
    pub fn add(&self, document: impl Into<Document>) {
        self.inner.add(document.into());
    }

    /// Force-flush pending documents regardless of triggers.
    ///
    /// Returns the number of documents handed to the upload pool — 0 when
    /// the buffer is empty or another flush is already in progress.
    pub fn flush(&self) -> usize {
        self.inner.flush()
    }

    /// Gracefully shut down: stop the flush timer, run one final flush, and
    /// drain the upload queue to completion.
    ///
    /// Returns only once every buffered document has been observed by the
    /// ingestion client or persisted on disk. Idempotent.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    /// Alias for [`Spool::shutdown`].
    pub fn close(&self) {
        self.shutdown();
    }

    /// Point-in-time delivery counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics()
    }

    /// Root directory of the persistence store.
    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// The configuration this spool was built with.
    pub fn config(&self) -> &SpoolConfig {
        self.inner.config()
    }
}

/// Builder for spool configuration.
///
/// # Example
///
/// ```ignore
/// let spool = Spool::builder()
///     .client(client)
///     .directory("/var/lib/myapp/spool")
///     .max_items(500)
///     .max_batch_bytes(4 * 1024 * 1024)
///     .max_interval(Duration::from_secs(5))
///     .backoff(BackoffPolicy::Exponential {
///         base: Duration::from_secs(1),
///         cap: Duration::from_secs(30),
///     })
///     .recover_on_startup(true)
///     .build()?;
/// ```
pub struct SpoolBuilder {
    config: SpoolConfig,
    client: Option<Arc<dyn IngestClient>>,
}

impl SpoolBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        SpoolBuilder {
            config: SpoolConfig::default(),
            client: None,
        }
    }

    /// Set the ingestion client. Required.
    pub fn client(mut self, client: Arc<dyn IngestClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the persistence store directory. Required.
    pub fn directory(mut self, path: impl AsRef<Path>) -> Self {
        self.config.persistence.directory = path.as_ref().to_path_buf();
        self
    }

    /// Resubmit persisted batches at startup.
    pub fn recover_on_startup(mut self, recover: bool) -> Self {
        self.config.persistence.recover_on_startup = recover;
        self
    }

    /// Item-count flush trigger.
    pub fn max_items(mut self, max_items: usize) -> Self {
        self.config.flush.max_items = max_items;
        self
    }

    /// Byte-size flush trigger. Zero disables it.
    pub fn max_batch_bytes(mut self, max_batch_bytes: usize) -> Self {
        self.config.flush.max_batch_bytes = max_batch_bytes;
        self
    }

    /// Time-based flush trigger.
    pub fn max_interval(mut self, max_interval: Duration) -> Self {
        self.config.flush.max_interval = max_interval;
        self
    }

    /// Delivery attempts before a batch is persisted.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.upload.max_retries = max_retries;
        self
    }

    /// Per-attempt deadline passed to the ingestion client.
    pub fn attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.config.upload.attempt_timeout = attempt_timeout;
        self
    }

    /// Delay schedule between delivery attempts.
    pub fn backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.config.upload.backoff = backoff;
        self
    }

    /// Number of concurrent uploader threads.
    pub fn upload_concurrency(mut self, concurrency: usize) -> Self {
        self.config.upload.concurrency = concurrency;
        self
    }

    /// Upload queue depth before caller-runs backpressure applies.
    pub fn upload_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.upload.queue_capacity = capacity;
        self
    }

    /// Replace the whole configuration at once.
    pub fn config(mut self, config: SpoolConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate the configuration and start the engine.
    pub fn build(self) -> Result<Spool> {
        let client = self
            .client
            .ok_or(spool_core::ConfigError::MissingClient)?;
        let pipeline = Pipeline::start(self.config, client)?;
        Ok(Spool {
            inner: Arc::new(pipeline),
        })
    }
}

impl Default for SpoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}
