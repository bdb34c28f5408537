//! Batching and delivery engine
//!
//! Wires the in-memory side of spool together:
//! - [`BatchBuffer`]: accumulates documents and decides when a batch is ready
//! - [`WorkerPool`]: bounded concurrent uploaders with caller-runs backpressure
//! - [`UploadDispatcher`]: send-with-retry, spilling to disk on exhaustion
//! - [`PeriodicTask`]: the cancellable timer driving time-based flushes
//! - [`Pipeline`]: constructs and owns all of the above

#![warn(clippy::all)]

mod buffer;
mod dispatcher;
mod metrics;
mod pipeline;
mod pool;
mod timer;

pub use buffer::{BatchBuffer, FlushMode};
pub use dispatcher::{DeliveryJob, SendResult, UploadDispatcher};
pub use metrics::{MetricsSnapshot, SpoolMetrics};
pub use pipeline::{Pipeline, PipelineError};
pub use pool::{SubmitOutcome, WorkerPool};
pub use timer::PeriodicTask;
