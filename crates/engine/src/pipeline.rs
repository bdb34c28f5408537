//! Construction and lifecycle of the whole engine.

use crate::buffer::{BatchBuffer, FlushMode};
use crate::dispatcher::{DeliveryJob, UploadDispatcher};
use crate::metrics::{MetricsSnapshot, SpoolMetrics};
use crate::pool::WorkerPool;
use crate::timer::PeriodicTask;
use parking_lot::Mutex;
use spool_core::{ConfigError, Document, IngestClient, SpoolConfig};
use spool_durability::{RecoveryLoader, SpoolStore, StoreError};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Failures while constructing a [`Pipeline`].
///
/// Nothing after construction returns errors to the producer; delivery and
/// persistence failures are handled downstream.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The configuration failed validation.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The persistence store could not be opened or scanned.
    #[error("persistence store error: {0}")]
    Store(#[from] StoreError),

    /// An engine thread could not be spawned.
    #[error("failed to spawn engine thread: {0}")]
    Io(#[from] io::Error),
}

/// The assembled engine: buffer, pool, dispatcher, store, timer.
///
/// Explicitly constructed and explicitly owned — there is no ambient state.
/// All methods take `&self`; producers on multiple threads share one
/// instance behind an `Arc`.
pub struct Pipeline {
    config: SpoolConfig,
    store: Arc<SpoolStore>,
    metrics: Arc<SpoolMetrics>,
    buffer: Arc<BatchBuffer>,
    pool: Arc<WorkerPool<DeliveryJob>>,
    timer: Mutex<Option<PeriodicTask>>,
    closed: AtomicBool,
}

impl Pipeline {
    /// Validate the configuration, open the store, run startup recovery if
    /// configured, and start the worker and timer threads.
    pub fn start(
        config: SpoolConfig,
        client: Arc<dyn IngestClient>,
    ) -> Result<Pipeline, PipelineError> {
        config.validate()?;

        let store = Arc::new(SpoolStore::open(&config.persistence.directory)?);
        let metrics = Arc::new(SpoolMetrics::default());
        let dispatcher = Arc::new(UploadDispatcher::new(
            client,
            store.clone(),
            config.upload.clone(),
            metrics.clone(),
        ));

        let pool = {
            let dispatcher = dispatcher.clone();
            Arc::new(WorkerPool::start(
                config.upload.concurrency,
                config.upload.queue_capacity,
                move |job| dispatcher.dispatch(job),
            )?)
        };

        let buffer = {
            let pool = pool.clone();
            Arc::new(BatchBuffer::new(
                config.flush.clone(),
                metrics.clone(),
                move |batch| {
                    pool.submit(DeliveryJob::live(batch));
                },
            ))
        };

        if config.persistence.recover_on_startup {
            let report = RecoveryLoader::new(store.clone()).run(|claimed, batch| {
                pool.submit(DeliveryJob::recovered(batch, claimed));
            })?;
            metrics.record_recovered(report.resubmitted() as u64);
            metrics.record_quarantined(report.quarantined as u64);
        }

        let timer = {
            let buffer = buffer.clone();
            PeriodicTask::spawn("spool-flush-timer", config.flush.max_interval, move || {
                buffer.flush(FlushMode::Timed);
            })?
        };

        info!(directory = %store.root().display(), "spool pipeline started");
        Ok(Pipeline {
            config,
            store,
            metrics,
            buffer,
            pool,
            timer: Mutex::new(Some(timer)),
            closed: AtomicBool::new(false),
        })
    }

    /// Accept one document for eventual delivery.
    ///
    /// Delivery problems never surface here; a document handed to `add` is
    /// eventually acknowledged by the client or persisted on disk.
    pub fn add(&self, document: Document) {
        if self.closed.load(Ordering::SeqCst) {
            warn!("document received after shutdown; discarding");
            return;
        }
        self.buffer.add(document);
    }

    /// Force-flush pending documents, returning how many were handed off.
    pub fn flush(&self) -> usize {
        self.buffer.flush(FlushMode::Force)
    }

    /// Stop the timer, drain the buffer and the upload queue, and join all
    /// engine threads. Idempotent; returns once nothing buffered remains
    /// in memory.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("shutting down spool pipeline");

        // Timer first, so a timed flush cannot race the final flush.
        if let Some(timer) = self.timer.lock().take() {
            timer.stop();
        }

        let drained = self.buffer.flush(FlushMode::Final);
        debug!(documents = drained, "final flush complete");

        self.pool.shutdown();
        info!("spool pipeline stopped");
    }

    /// Counter snapshot.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Root directory of the persistence store.
    pub fn path(&self) -> &Path {
        self.store.root()
    }

    /// The configuration this pipeline was built with.
    pub fn config(&self) -> &SpoolConfig {
        &self.config
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;
    use serde_json::json;
    use spool_core::{BackoffPolicy, Batch, DeliveryError, IngestAck};
    use std::time::Duration;

    /// Acknowledges everything, remembering the documents of each payload.
    #[derive(Default)]
    struct CountingClient {
        batches: PlMutex<Vec<usize>>,
    }

    impl IngestClient for CountingClient {
        fn ingest(&self, payload: &[u8], _timeout: Duration) -> Result<IngestAck, DeliveryError> {
            let batch = Batch::from_json_slice(payload)
                .map_err(|e| DeliveryError::Permanent(e.to_string()))?;
            self.batches.lock().push(batch.len());
            Ok(IngestAck::default())
        }
    }

    fn quiet_config(dir: &Path) -> SpoolConfig {
        let mut config = SpoolConfig::new(dir);
        config.flush.max_items = 1000;
        config.flush.max_batch_bytes = 0;
        config.flush.max_interval = Duration::from_secs(3600);
        config.upload.backoff = BackoffPolicy::Linear {
            base: Duration::ZERO,
        };
        config
    }

    #[test]
    fn starts_and_shuts_down_with_nothing_buffered() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline =
            Pipeline::start(quiet_config(dir.path()), Arc::new(CountingClient::default()))
                .unwrap();
        pipeline.shutdown();
        pipeline.shutdown();
        assert_eq!(pipeline.metrics(), MetricsSnapshot::default());
    }

    #[test]
    fn rejects_invalid_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = quiet_config(dir.path());
        config.upload.concurrency = 0;

        let result = Pipeline::start(config, Arc::new(CountingClient::default()));
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn shutdown_drains_pending_documents() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(CountingClient::default());
        let pipeline = Pipeline::start(quiet_config(dir.path()), client.clone()).unwrap();

        for n in 0..5 {
            pipeline.add(Document::new(json!({ "n": n })));
        }
        assert!(client.batches.lock().is_empty(), "no trigger fired yet");

        pipeline.shutdown();
        assert_eq!(client.batches.lock().as_slice(), &[5]);
        assert_eq!(pipeline.metrics().documents_delivered, 5);
    }

    #[test]
    fn add_after_shutdown_is_discarded_quietly() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(CountingClient::default());
        let pipeline = Pipeline::start(quiet_config(dir.path()), client.clone()).unwrap();

        pipeline.shutdown();
        pipeline.add(Document::new(json!({ "late": true })));
        assert!(client.batches.lock().is_empty());
    }

    #[test]
    fn startup_recovery_resubmits_persisted_batches() {
        let dir = tempfile::tempdir().unwrap();

        // A previous run left one undelivered batch behind.
        {
            let store = SpoolStore::open(dir.path()).unwrap();
            let mut batch = Batch::new();
            batch.push(Document::new(json!({ "left": "behind" })));
            store.save(&batch).unwrap();
        }

        let client = Arc::new(CountingClient::default());
        let mut config = quiet_config(dir.path());
        config.persistence.recover_on_startup = true;

        let pipeline = Pipeline::start(config, client.clone()).unwrap();
        pipeline.shutdown();

        assert_eq!(client.batches.lock().as_slice(), &[1]);
        assert_eq!(pipeline.metrics().batches_recovered, 1);

        let store = SpoolStore::open(dir.path()).unwrap();
        assert!(store.written().unwrap().is_empty());
        assert!(store.orphaned_claims().unwrap().is_empty());
    }
}
