//! Convenience re-exports for typical use.
//!
//! ```ignore
//! use spool::prelude::*;
//! ```

pub use crate::error::{Error, Result};
pub use crate::spool::{Spool, SpoolBuilder};
pub use spool_core::{
    BackoffPolicy, Batch, DeliveryError, Document, IngestAck, IngestClient, SpoolConfig,
};
pub use spool_engine::MetricsSnapshot;
