//! Error taxonomy for delivery and configuration.

use std::time::Duration;
use thiserror::Error;

/// Failure reported by the external ingestion service, or by the transport
/// on the way there.
///
/// The dispatcher decides whether to retry based on [`DeliveryError::is_retryable`]:
/// transient failures and timeouts are retried up to the configured attempt
/// limit, permanent failures are persisted immediately for operator
/// inspection.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Network error, remote throttling, 5xx-equivalent. Worth retrying.
    #[error("transient delivery failure: {0}")]
    Transient(String),

    /// The attempt exceeded its per-call deadline. Counted as transient.
    #[error("delivery attempt timed out after {0:?}")]
    Timeout(Duration),

    /// The service rejected the payload (malformed batch, schema mismatch).
    /// Retrying cannot help; the batch is persisted as-is.
    #[error("permanent delivery failure: {0}")]
    Permanent(String),
}

impl DeliveryError {
    /// Check whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DeliveryError::Transient(_) | DeliveryError::Timeout(_))
    }
}

/// Configuration rejected by [`SpoolConfig::validate`](crate::SpoolConfig::validate).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A numeric option that must be at least one was zero.
    #[error("{option} must be greater than zero")]
    ZeroOption {
        /// Name of the offending option.
        option: &'static str,
    },

    /// No persistence directory was configured.
    #[error("persistence directory is not set")]
    MissingDirectory,

    /// No ingestion client was supplied to the builder.
    #[error("ingest client is not set")]
    MissingClient,
}
