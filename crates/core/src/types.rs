//! Documents, batches, and the configuration surface.

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Per-document framing allowance added to the serialized length, covering
/// the separator/bracket bytes a document occupies inside the batch array.
const DOCUMENT_FRAMING_BYTES: usize = 2;

/// One unit of input data accepted by `add`.
///
/// A document is an opaque JSON value, immutable once constructed. The
/// serialized byte size is computed up front so that buffer size accounting
/// stays O(1) per operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    value: Value,
    encoded_len: usize,
}

impl Document {
    /// Wrap a JSON value as a document.
    pub fn new(value: Value) -> Self {
        let encoded_len =
            serde_json::to_vec(&value).map_or(0, |bytes| bytes.len()) + DOCUMENT_FRAMING_BYTES;
        Document { value, encoded_len }
    }

    /// Serialized size in bytes, including the framing allowance.
    pub fn byte_size(&self) -> usize {
        self.encoded_len
    }

    /// Borrow the underlying JSON value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Consume the document, returning the JSON value.
    pub fn into_value(self) -> Value {
        self.value
    }
}

impl From<Value> for Document {
    fn from(value: Value) -> Self {
        Document::new(value)
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Document::new(Value::deserialize(deserializer)?))
    }
}

/// An ordered group of documents flushed together.
///
/// Maintains the invariant `size_bytes == Σ byte_size(document)` across every
/// mutation. Serializes to a UTF-8 JSON array of the documents — the upload
/// payload and the persisted spool file share this encoding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    documents: Vec<Document>,
    size_bytes: usize,
}

impl Batch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Batch::default()
    }

    /// Create an empty batch with room for `capacity` documents.
    pub fn with_capacity(capacity: usize) -> Self {
        Batch {
            documents: Vec::with_capacity(capacity),
            size_bytes: 0,
        }
    }

    /// Rebuild a batch from documents, recomputing the size counter.
    pub fn from_documents(documents: Vec<Document>) -> Self {
        let size_bytes = documents.iter().map(Document::byte_size).sum();
        Batch {
            documents,
            size_bytes,
        }
    }

    /// Append a document, growing the size counter.
    pub fn push(&mut self, document: Document) {
        self.size_bytes += document.byte_size();
        self.documents.push(document);
    }

    /// Number of documents in the batch.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the batch holds no documents.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Aggregate serialized size of all documents.
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    /// Borrow the documents in insertion order.
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Consume the batch, returning its documents in insertion order.
    pub fn into_documents(self) -> Vec<Document> {
        self.documents
    }

    /// Serialize to the wire/file encoding: a UTF-8 JSON array.
    pub fn to_json_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Parse the wire/file encoding back into a batch.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

impl Serialize for Batch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.documents.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Batch {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Batch::from_documents(Vec::<Document>::deserialize(
            deserializer,
        )?))
    }
}

/// Retry backoff schedule for delivery attempts.
///
/// The delay before retry `n` (1-based attempt counter) is:
/// - `Linear`: `base * n`
/// - `Exponential`: `base * 2^(n-1)`, capped at `cap`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffPolicy {
    /// Delay grows by `base` per attempt.
    Linear {
        /// Delay unit.
        base: Duration,
    },
    /// Delay doubles per attempt, up to `cap`.
    Exponential {
        /// First-retry delay.
        base: Duration,
        /// Upper bound on any single delay.
        cap: Duration,
    },
}

impl BackoffPolicy {
    /// Delay to sleep after a failed attempt number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        match *self {
            BackoffPolicy::Linear { base } => base * attempt,
            BackoffPolicy::Exponential { base, cap } => {
                // Shift is clamped so the factor cannot overflow u32.
                let factor = 1u32 << (attempt - 1).min(16);
                (base * factor).min(cap)
            }
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy::Linear {
            base: Duration::from_secs(3),
        }
    }
}

/// Flush-trigger settings for the batching buffer.
#[derive(Debug, Clone)]
pub struct FlushOptions {
    /// Item-count flush trigger.
    pub max_items: usize,
    /// Byte-size flush trigger. Zero disables the size trigger.
    pub max_batch_bytes: usize,
    /// Time-based flush trigger, driven by the periodic flusher.
    pub max_interval: Duration,
}

impl Default for FlushOptions {
    fn default() -> Self {
        FlushOptions {
            max_items: 1000,
            max_batch_bytes: 10 * 1024 * 1024,
            max_interval: Duration::from_secs(10),
        }
    }
}

/// Upload dispatch and worker-pool settings.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Delivery attempts before a batch is persisted.
    pub max_retries: u32,
    /// Per-attempt deadline passed to the ingestion client.
    pub attempt_timeout: Duration,
    /// Delay schedule between attempts.
    pub backoff: BackoffPolicy,
    /// Number of concurrent uploader threads.
    pub concurrency: usize,
    /// Bounded queue depth before caller-runs backpressure applies.
    pub queue_capacity: usize,
}

impl Default for UploadOptions {
    fn default() -> Self {
        UploadOptions {
            max_retries: 3,
            attempt_timeout: Duration::from_secs(30),
            backoff: BackoffPolicy::default(),
            concurrency: 3,
            queue_capacity: 30,
        }
    }
}

/// On-disk spillover settings.
#[derive(Debug, Clone, Default)]
pub struct PersistenceOptions {
    /// Root directory of the persistence store.
    pub directory: PathBuf,
    /// Whether recovery runs at construction.
    pub recover_on_startup: bool,
}

impl PersistenceOptions {
    /// Persistence options rooted at `directory`, recovery disabled.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        PersistenceOptions {
            directory: directory.into(),
            recover_on_startup: false,
        }
    }
}

/// Complete configuration consumed by the engine.
///
/// Owned by the caller's configuration layer; the engine reads it once at
/// construction and never mutates it.
#[derive(Debug, Clone, Default)]
pub struct SpoolConfig {
    /// Flush-trigger settings.
    pub flush: FlushOptions,
    /// Upload and worker-pool settings.
    pub upload: UploadOptions,
    /// Spillover settings.
    pub persistence: PersistenceOptions,
}

impl SpoolConfig {
    /// Configuration rooted at `directory` with all other options defaulted.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        SpoolConfig {
            persistence: PersistenceOptions::new(directory),
            ..SpoolConfig::default()
        }
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.flush.max_items == 0 {
            return Err(ConfigError::ZeroOption { option: "max_items" });
        }
        if self.flush.max_interval.is_zero() {
            return Err(ConfigError::ZeroOption {
                option: "max_interval",
            });
        }
        if self.upload.max_retries == 0 {
            return Err(ConfigError::ZeroOption {
                option: "max_retries",
            });
        }
        if self.upload.concurrency == 0 {
            return Err(ConfigError::ZeroOption {
                option: "upload_concurrency",
            });
        }
        if self.upload.queue_capacity == 0 {
            return Err(ConfigError::ZeroOption {
                option: "upload_queue_capacity",
            });
        }
        if self.persistence.directory.as_os_str().is_empty() {
            return Err(ConfigError::MissingDirectory);
        }
        Ok(())
    }
}
