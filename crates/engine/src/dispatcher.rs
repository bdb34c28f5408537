//! Send-with-retry and the spillover handoff.

use crate::metrics::SpoolMetrics;
use spool_core::{Batch, DeliveryError, IngestClient, UploadOptions};
use spool_durability::{ClaimedFile, SpoolFile, SpoolStore, StoreError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Write attempts against the store before the last-resort drop.
const PERSIST_WRITE_ATTEMPTS: u32 = 3;
const PERSIST_RETRY_DELAY: Duration = Duration::from_millis(100);

/// A unit of work for the worker pool: one frozen batch plus where it came
/// from. Recovered batches carry their claimed file so the dispatcher can
/// finish the on-disk lifecycle after the delivery attempt.
pub struct DeliveryJob {
    batch: Batch,
    origin: Origin,
}

enum Origin {
    Live,
    Recovered(ClaimedFile),
}

impl DeliveryJob {
    /// A batch freshly flushed from the buffer.
    pub fn live(batch: Batch) -> Self {
        DeliveryJob {
            batch,
            origin: Origin::Live,
        }
    }

    /// A batch reloaded from the persistence store during recovery.
    pub fn recovered(batch: Batch, claimed: ClaimedFile) -> Self {
        DeliveryJob {
            batch,
            origin: Origin::Recovered(claimed),
        }
    }
}

/// Outcome of the bounded retry loop in [`UploadDispatcher::send`].
#[derive(Debug)]
pub enum SendResult {
    /// The ingestion client acknowledged the batch.
    Delivered {
        /// Attempts used, including the successful one.
        attempts: u32,
    },
    /// All attempts failed, or a permanent failure cut retrying short.
    Failed {
        /// The last error observed.
        error: DeliveryError,
        /// Attempts used.
        attempts: u32,
    },
}

/// Wraps the external ingestion client with timeout, retry and spillover.
///
/// Failure never propagates upward from here: a batch that cannot be
/// delivered is persisted, and only when even persistence fails (after its
/// own bounded retries) is the batch dropped — loudly.
pub struct UploadDispatcher {
    client: Arc<dyn IngestClient>,
    store: Arc<SpoolStore>,
    opts: UploadOptions,
    metrics: Arc<SpoolMetrics>,
}

impl UploadDispatcher {
    /// Dispatcher over a configured client and an open store.
    pub fn new(
        client: Arc<dyn IngestClient>,
        store: Arc<SpoolStore>,
        opts: UploadOptions,
        metrics: Arc<SpoolMetrics>,
    ) -> Self {
        UploadDispatcher {
            client,
            store,
            opts,
            metrics,
        }
    }

    /// Run the full delivery routine for one job: send with retries, then
    /// persist on failure and settle any claimed file.
    pub fn dispatch(&self, job: DeliveryJob) {
        let DeliveryJob { batch, origin } = job;

        match self.send(&batch) {
            SendResult::Delivered { attempts } => {
                self.metrics.record_delivered(batch.len() as u64);
                debug!(documents = batch.len(), attempts, "batch delivered");
                if let Origin::Recovered(claimed) = origin {
                    if let Err(e) = self.store.delete(&claimed) {
                        warn!(error = %e, "failed to delete spool file for delivered batch");
                    }
                }
            }
            SendResult::Failed { error, attempts } => {
                warn!(
                    error = %error,
                    attempts,
                    documents = batch.len(),
                    "delivery gave up; spilling batch to disk"
                );
                match self.persist_with_retry(&batch) {
                    Ok(file) => {
                        self.metrics.record_persisted();
                        info!(
                            file = %file.path().display(),
                            documents = batch.len(),
                            "undelivered batch persisted"
                        );
                        if let Origin::Recovered(claimed) = origin {
                            if let Err(e) = self.store.delete(&claimed) {
                                warn!(error = %e, "failed to delete superseded spool file");
                            }
                        }
                    }
                    Err(persist_error) => match origin {
                        Origin::Live => {
                            self.metrics.record_lost(batch.len() as u64);
                            error!(
                                error = %persist_error,
                                documents = batch.len(),
                                "dropping batch: delivery and persistence both failed"
                            );
                        }
                        Origin::Recovered(claimed) => {
                            // The claimed file is the only remaining copy;
                            // put it back in the scan set instead of losing it.
                            match self.store.release(claimed) {
                                Ok(file) => warn!(
                                    file = %file.path().display(),
                                    "recovered batch still undeliverable; left on disk"
                                ),
                                Err(e) => error!(
                                    error = %e,
                                    "could not release claimed spool file; it will be resumed after restart"
                                ),
                            }
                        }
                    },
                }
            }
        }
    }

    /// The bounded retry loop: exactly `max_retries` attempts, backoff
    /// between them, permanent failures cut short.
    pub fn send(&self, batch: &Batch) -> SendResult {
        if batch.is_empty() {
            warn!("skipping delivery of empty batch");
            return SendResult::Delivered { attempts: 0 };
        }

        let payload = match batch.to_json_vec() {
            Ok(payload) => payload,
            Err(e) => {
                return SendResult::Failed {
                    error: DeliveryError::Permanent(format!("batch serialization failed: {e}")),
                    attempts: 0,
                }
            }
        };

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.client.ingest(&payload, self.opts.attempt_timeout) {
                Ok(_ack) => return SendResult::Delivered { attempts: attempt },
                Err(error) if error.is_retryable() && attempt < self.opts.max_retries => {
                    self.metrics.record_retry();
                    warn!(
                        attempt,
                        max_retries = self.opts.max_retries,
                        error = %error,
                        "delivery attempt failed; backing off"
                    );
                    thread::sleep(self.opts.backoff.delay(attempt));
                }
                Err(error) => return SendResult::Failed { error, attempts: attempt },
            }
        }
    }

    fn persist_with_retry(&self, batch: &Batch) -> Result<SpoolFile, StoreError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.store.save(batch) {
                Ok(file) => return Ok(file),
                Err(e) if attempt < PERSIST_WRITE_ATTEMPTS => {
                    warn!(attempt, error = %e, "persisting batch failed; retrying");
                    thread::sleep(PERSIST_RETRY_DELAY);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
