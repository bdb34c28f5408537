//! Durable spillover for spool
//!
//! This crate implements the on-disk side of at-least-once delivery:
//! - [`SpoolStore`]: atomic writes of undeliverable batches, rename-based
//!   claiming, quarantine for corrupt files
//! - [`RecoveryLoader`]: startup scan that resubmits persisted and orphaned
//!   batches through the live delivery path
//!
//! Claims are serialized by filesystem rename atomicity rather than an
//! in-process lock, so concurrent recovery from separate process invocations
//! stays safe.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod recovery;
mod store;

pub use recovery::{RecoveryLoader, RecoveryReport};
pub use store::{ClaimedFile, SpoolFile, SpoolStore, StoreError};
