//! Boundary trait for the external bulk-ingestion service.

use crate::error::DeliveryError;
use std::time::Duration;

/// Acknowledgement returned by a successful ingestion call.
#[derive(Debug, Clone, Default)]
pub struct IngestAck {
    /// Opaque receipt identifier reported by the service, if any.
    pub receipt: Option<String>,
}

/// A fully configured client for the remote bulk-ingestion service.
///
/// The engine never constructs or authenticates one of these; it receives it
/// ready to use and consumes exactly one operation. Implementations must be
/// safe to call from multiple uploader threads at once.
///
/// `payload` is the serialized batch (a UTF-8 JSON array of documents).
/// `timeout` is the per-attempt deadline; implementations should give up and
/// return [`DeliveryError::Timeout`] once it elapses — the dispatcher counts
/// that as a transient failure.
pub trait IngestClient: Send + Sync {
    /// Deliver one serialized batch to the service.
    fn ingest(&self, payload: &[u8], timeout: Duration) -> Result<IngestAck, DeliveryError>;
}
