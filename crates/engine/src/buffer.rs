//! The batching buffer: accumulation and flush decisions.

use crate::metrics::SpoolMetrics;
use parking_lot::Mutex;
use spool_core::{Batch, Document, FlushOptions};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Why a flush is being attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushMode {
    /// Evaluation after an `add`; flushes only if a trigger condition holds.
    Triggered,
    /// Evaluation from the periodic flusher; same trigger conditions.
    Timed,
    /// Bypass the triggers (still requires a non-empty buffer). Skips if
    /// another flush is in progress.
    Force,
    /// Shutdown path: bypass the triggers and wait for an in-progress flush
    /// instead of skipping, guaranteeing drain-to-zero.
    Final,
}

impl FlushMode {
    fn bypasses_triggers(self) -> bool {
        matches!(self, FlushMode::Force | FlushMode::Final)
    }
}

struct BufferState {
    pending: Batch,
    last_flush: Instant,
}

/// Accumulates documents and swaps out frozen batches when one of the flush
/// triggers fires.
///
/// Two locks, two jobs: the state lock protects the O(1) append and the O(1)
/// swap-and-reset and is never held across delivery; the flush gate ensures
/// a single flush executes at a time. Non-final flushes `try_lock` the gate
/// and treat "someone else is flushing" as an expected skip.
pub struct BatchBuffer {
    opts: FlushOptions,
    state: Mutex<BufferState>,
    flush_gate: Mutex<()>,
    sink: Box<dyn Fn(Batch) + Send + Sync>,
    metrics: Arc<SpoolMetrics>,
}

impl BatchBuffer {
    /// Buffer with the given triggers, delivering frozen batches to `sink`.
    pub fn new<F>(opts: FlushOptions, metrics: Arc<SpoolMetrics>, sink: F) -> Self
    where
        F: Fn(Batch) + Send + Sync + 'static,
    {
        BatchBuffer {
            opts,
            state: Mutex::new(BufferState {
                pending: Batch::new(),
                last_flush: Instant::now(),
            }),
            flush_gate: Mutex::new(()),
            sink: Box::new(sink),
            metrics,
        }
    }

    /// Append one document and evaluate the flush triggers.
    ///
    /// Never returns an error and never blocks the producer, except through
    /// caller-runs backpressure when a triggered flush meets a full upload
    /// queue. An oversized single document is accepted; the size trigger
    /// fires on this same post-append evaluation.
    pub fn add(&self, document: Document) {
        {
            let mut state = self.state.lock();
            state.pending.push(document);
        }
        self.metrics.record_buffered(1);
        self.flush(FlushMode::Triggered);
    }

    /// Attempt a flush, returning the number of documents handed off.
    ///
    /// Returns 0 when the buffer is empty, when no trigger holds for a
    /// non-forcing mode, or when another flush is already in progress for a
    /// non-final mode — all expected outcomes, none of them errors.
    pub fn flush(&self, mode: FlushMode) -> usize {
        let _gate = match mode {
            FlushMode::Final => self.flush_gate.lock(),
            _ => match self.flush_gate.try_lock() {
                Some(gate) => gate,
                None => return 0,
            },
        };

        let batch = {
            let mut state = self.state.lock();
            if state.pending.is_empty() {
                return 0;
            }
            if !mode.bypasses_triggers() && !self.due(&state) {
                return 0;
            }
            state.last_flush = Instant::now();
            std::mem::take(&mut state.pending)
        };

        let flushed = batch.len();
        debug!(
            documents = flushed,
            bytes = batch.size_bytes(),
            ?mode,
            "flushing buffer"
        );
        (self.sink)(batch);
        self.metrics.record_flush();
        flushed
    }

    /// Documents currently pending.
    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Aggregate byte size of pending documents.
    pub fn pending_bytes(&self) -> usize {
        self.state.lock().pending.size_bytes()
    }

    fn due(&self, state: &BufferState) -> bool {
        state.pending.len() >= self.opts.max_items
            || (self.opts.max_batch_bytes > 0
                && state.pending.size_bytes() >= self.opts.max_batch_bytes)
            || state.last_flush.elapsed() >= self.opts.max_interval
    }
}
