//! Startup recovery of persisted and orphaned batches.

use crate::store::{ClaimedFile, SpoolStore, StoreError};
use spool_core::Batch;
use std::sync::Arc;
use tracing::{info, warn};

/// Counts from one recovery scan.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryReport {
    /// `.processing` files resumed from an unclean shutdown.
    pub resumed: usize,
    /// Written files claimed and resubmitted by this scan.
    pub claimed: usize,
    /// Corrupt files moved to quarantine.
    pub quarantined: usize,
    /// Files another consumer claimed or deleted first.
    pub contended: usize,
}

impl RecoveryReport {
    /// Total batches handed back into the delivery path.
    pub fn resubmitted(&self) -> usize {
        self.resumed + self.claimed
    }

    /// Human-readable one-liner.
    pub fn summary(&self) -> String {
        format!(
            "recovery complete: {} resumed, {} claimed, {} quarantined, {} contended",
            self.resumed, self.claimed, self.quarantined, self.contended
        )
    }
}

/// Scans the store at startup and feeds undelivered batches back into the
/// live delivery path.
///
/// Orphaned `.processing` files are resumed first — they were claimed by a
/// previous run that never finished. Then every written file is claimed and
/// resubmitted. One corrupt file never blocks recovery of the rest: it is
/// quarantined and the scan moves on.
#[derive(Debug)]
pub struct RecoveryLoader {
    store: Arc<SpoolStore>,
}

impl RecoveryLoader {
    /// Loader over `store`.
    pub fn new(store: Arc<SpoolStore>) -> Self {
        RecoveryLoader { store }
    }

    /// Run one scan, handing each recovered batch to `submit`.
    ///
    /// `submit` receives the claim alongside the batch; whoever delivers the
    /// batch is responsible for deleting (or re-persisting and deleting) the
    /// claimed file.
    pub fn run<F>(&self, mut submit: F) -> Result<RecoveryReport, StoreError>
    where
        F: FnMut(ClaimedFile, Batch),
    {
        let mut report = RecoveryReport::default();

        for claimed in self.store.orphaned_claims()? {
            if self.resubmit(claimed, &mut submit, &mut report)? {
                report.resumed += 1;
            }
        }

        for file in self.store.written()? {
            let Some(claimed) = self.store.claim(&file)? else {
                report.contended += 1;
                continue;
            };
            if self.resubmit(claimed, &mut submit, &mut report)? {
                report.claimed += 1;
            }
        }

        if report.resubmitted() > 0 || report.quarantined > 0 {
            info!(summary = %report.summary(), "spool recovery scan finished");
        }
        Ok(report)
    }

    /// Read one claimed file and submit it; quarantine on corruption.
    /// Returns whether a batch was actually resubmitted.
    fn resubmit<F>(
        &self,
        claimed: ClaimedFile,
        submit: &mut F,
        report: &mut RecoveryReport,
    ) -> Result<bool, StoreError>
    where
        F: FnMut(ClaimedFile, Batch),
    {
        match self.store.read_claimed(&claimed) {
            Ok(batch) => {
                submit(claimed, batch);
                Ok(true)
            }
            Err(StoreError::Corrupt { ref path, .. }) => {
                warn!(file = %path.display(), "corrupt persisted batch, moving to quarantine");
                if let Err(e) = self.store.quarantine(claimed) {
                    warn!(error = %e, "failed to quarantine corrupt spool file");
                } else {
                    report.quarantined += 1;
                }
                Ok(false)
            }
            Err(StoreError::Io(ref e)) if e.kind() == std::io::ErrorKind::NotFound => {
                report.contended += 1;
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
