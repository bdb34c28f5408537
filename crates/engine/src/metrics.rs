//! Delivery counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters for the whole pipeline. Cheap to bump from any thread.
#[derive(Debug, Default)]
pub struct SpoolMetrics {
    documents_buffered: AtomicU64,
    batches_flushed: AtomicU64,
    batches_delivered: AtomicU64,
    documents_delivered: AtomicU64,
    delivery_retries: AtomicU64,
    batches_persisted: AtomicU64,
    batches_recovered: AtomicU64,
    batches_quarantined: AtomicU64,
    documents_lost: AtomicU64,
}

impl SpoolMetrics {
    pub(crate) fn record_buffered(&self, documents: u64) {
        self.documents_buffered.fetch_add(documents, Ordering::Relaxed);
    }

    pub(crate) fn record_flush(&self) {
        self.batches_flushed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivered(&self, documents: u64) {
        self.batches_delivered.fetch_add(1, Ordering::Relaxed);
        self.documents_delivered.fetch_add(documents, Ordering::Relaxed);
    }

    pub(crate) fn record_retry(&self) {
        self.delivery_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_persisted(&self) {
        self.batches_persisted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_recovered(&self, batches: u64) {
        self.batches_recovered.fetch_add(batches, Ordering::Relaxed);
    }

    pub(crate) fn record_quarantined(&self, batches: u64) {
        self.batches_quarantined.fetch_add(batches, Ordering::Relaxed);
    }

    pub(crate) fn record_lost(&self, documents: u64) {
        self.documents_lost.fetch_add(documents, Ordering::Relaxed);
    }

    /// Consistent-enough point-in-time copy of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_buffered: self.documents_buffered.load(Ordering::Relaxed),
            batches_flushed: self.batches_flushed.load(Ordering::Relaxed),
            batches_delivered: self.batches_delivered.load(Ordering::Relaxed),
            documents_delivered: self.documents_delivered.load(Ordering::Relaxed),
            delivery_retries: self.delivery_retries.load(Ordering::Relaxed),
            batches_persisted: self.batches_persisted.load(Ordering::Relaxed),
            batches_recovered: self.batches_recovered.load(Ordering::Relaxed),
            batches_quarantined: self.batches_quarantined.load(Ordering::Relaxed),
            documents_lost: self.documents_lost.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of [`SpoolMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Documents accepted by `add`.
    pub documents_buffered: u64,
    /// Batches frozen and handed to the worker pool.
    pub batches_flushed: u64,
    /// Batches acknowledged by the ingestion client.
    pub batches_delivered: u64,
    /// Documents acknowledged by the ingestion client.
    pub documents_delivered: u64,
    /// Individual delivery attempts that failed and were retried.
    pub delivery_retries: u64,
    /// Batches written to the persistence store after delivery gave up.
    pub batches_persisted: u64,
    /// Persisted batches resubmitted by startup recovery.
    pub batches_recovered: u64,
    /// Corrupt persisted batches moved to quarantine.
    pub batches_quarantined: u64,
    /// Documents dropped because even persistence failed. The only loss path.
    pub documents_lost: u64,
}
