//! Unified error type for the spool facade.

use spool_core::ConfigError;
use spool_durability::StoreError;
use spool_engine::PipelineError;
use thiserror::Error;

/// All spool construction errors.
///
/// Only building a [`Spool`](crate::Spool) can fail. Once running, delivery
/// and persistence problems are handled inside the engine — retried,
/// spilled to disk, and logged — and never surface to producers.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or incomplete configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The persistence store could not be opened or scanned.
    #[error("persistence error: {0}")]
    Store(#[from] StoreError),

    /// An engine thread could not be spawned.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for spool operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<PipelineError> for Error {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Config(e) => Error::Config(e),
            PipelineError::Store(e) => Error::Store(e),
            PipelineError::Io(e) => Error::Io(e),
        }
    }
}
