//! Core types for spool
//!
//! This crate defines the vocabulary shared by the buffering engine and the
//! persistence layer:
//! - [`Document`]: one opaque, JSON-serializable unit of input
//! - [`Batch`]: an ordered group of documents with an aggregate size counter
//! - [`SpoolConfig`] and its option groups, consumed read-only by the engine
//! - [`IngestClient`]: the boundary trait for the external ingestion service
//! - The delivery/configuration error taxonomy

#![warn(missing_docs)]
#![warn(clippy::all)]

mod client;
mod error;
mod types;

pub use client::{IngestAck, IngestClient};
pub use error::{ConfigError, DeliveryError};
pub use types::{
    BackoffPolicy, Batch, Document, FlushOptions, PersistenceOptions, SpoolConfig, UploadOptions,
};
