//! Shared helpers for the integration tests: scripted ingestion clients and
//! a spool configuration that keeps every timer and backoff out of the way.

// Not every test binary uses every helper.
#![allow(dead_code)]

use parking_lot::{Condvar, Mutex};
use spool::{BackoffPolicy, Batch, DeliveryError, IngestAck, IngestClient, Spool, SpoolBuilder};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Install a test-writer subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A builder with quiet triggers: nothing flushes unless the test asks.
pub fn quiet_builder(dir: &std::path::Path, client: Arc<dyn IngestClient>) -> SpoolBuilder {
    Spool::builder()
        .client(client)
        .directory(dir)
        .max_items(1000)
        .max_batch_bytes(0)
        .max_interval(Duration::from_secs(3600))
        .backoff(BackoffPolicy::Linear {
            base: Duration::ZERO,
        })
}

/// Acknowledges every batch and remembers the documents it saw.
#[derive(Default)]
pub struct RecordingClient {
    batches: Mutex<Vec<Batch>>,
}

impl RecordingClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Sizes of the delivered batches, in arrival order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().iter().map(Batch::len).collect()
    }

    /// Total documents acknowledged so far.
    pub fn document_count(&self) -> usize {
        self.batches.lock().iter().map(Batch::len).sum()
    }

    /// All acknowledged documents, flattened in batch order.
    pub fn documents(&self) -> Vec<serde_json::Value> {
        self.batches
            .lock()
            .iter()
            .flat_map(|b| b.documents().iter().map(|d| d.value().clone()))
            .collect()
    }
}

impl IngestClient for RecordingClient {
    fn ingest(&self, payload: &[u8], _timeout: Duration) -> Result<IngestAck, DeliveryError> {
        let batch = Batch::from_json_slice(payload)
            .map_err(|e| DeliveryError::Permanent(e.to_string()))?;
        self.batches.lock().push(batch);
        Ok(IngestAck::default())
    }
}

/// Always fails with a transient error, counting the attempts.
#[derive(Default)]
pub struct TransientFailureClient {
    pub calls: AtomicU32,
}

impl TransientFailureClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl IngestClient for TransientFailureClient {
    fn ingest(&self, _payload: &[u8], _timeout: Duration) -> Result<IngestAck, DeliveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(DeliveryError::Transient("service unavailable".into()))
    }
}

/// Blocks every call until released, then acknowledges.
pub struct BlockingClient {
    release: Mutex<bool>,
    signal: Condvar,
    pub entered: AtomicU32,
}

impl BlockingClient {
    pub fn new() -> Arc<Self> {
        Arc::new(BlockingClient {
            release: Mutex::new(false),
            signal: Condvar::new(),
            entered: AtomicU32::new(0),
        })
    }

    /// Let every in-flight and future call complete.
    pub fn release_all(&self) {
        *self.release.lock() = true;
        self.signal.notify_all();
    }
}

impl IngestClient for BlockingClient {
    fn ingest(&self, _payload: &[u8], _timeout: Duration) -> Result<IngestAck, DeliveryError> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        let mut released = self.release.lock();
        while !*released {
            self.signal.wait(&mut released);
        }
        Ok(IngestAck::default())
    }
}
