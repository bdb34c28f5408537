//! On-disk store for batches that could not be delivered.
//!
//! File lifecycle: `written` (`failed_batch_<ts>_<uuid>.json`) → `claimed`
//! (`*.json.processing`) → deleted or quarantined. Writes go through a
//! temporary sibling and a rename, so a crash mid-write never leaves a
//! half-written file visible to readers. Claiming is a rename too, which is
//! what serializes concurrent consumers — including ones in other processes.

use spool_core::Batch;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

const FILE_PREFIX: &str = "failed_batch_";
const FILE_SUFFIX: &str = ".json";
const CLAIM_SUFFIX: &str = ".json.processing";
const TMP_SUFFIX: &str = ".json.tmp";
const QUARANTINE_DIR: &str = "quarantine";

/// Errors from the persistence store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure (disk full, permissions, missing directory).
    #[error("spool store I/O error: {0}")]
    Io(#[from] io::Error),

    /// A batch could not be encoded for writing.
    #[error("spool store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A persisted file exists but does not parse as a batch.
    #[error("corrupt spool file {}: {source}", .path.display())]
    Corrupt {
        /// The offending file.
        path: PathBuf,
        /// Parse failure detail.
        source: serde_json::Error,
    },
}

/// Handle to a persisted batch in the `written` state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpoolFile {
    path: PathBuf,
}

impl SpoolFile {
    /// Full path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Handle to a persisted batch this consumer has claimed.
///
/// Holding a `ClaimedFile` means the `*.json` → `*.json.processing` rename
/// succeeded here; no other consumer will pick the file up until it is
/// deleted, released, or left behind by an unclean shutdown.
#[derive(Debug, PartialEq, Eq)]
pub struct ClaimedFile {
    path: PathBuf,
}

impl ClaimedFile {
    /// Full path of the claimed (`.processing`) file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Durable directory of undeliverable batches.
#[derive(Debug)]
pub struct SpoolStore {
    root: PathBuf,
}

impl SpoolStore {
    /// Open (creating if needed) a store rooted at `root`.
    ///
    /// Sweeps temporary files left by a crash mid-write; they were never
    /// visible to readers and hold no committed data.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;

        let store = SpoolStore { root };
        let mut swept = 0usize;
        for path in store.matching_files(is_stale_tmp)? {
            fs::remove_file(&path)?;
            swept += 1;
        }
        if swept > 0 {
            warn!(swept, root = %store.root.display(), "removed stale temporary spool files");
        }
        Ok(store)
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Durably write a batch, returning a handle to the new file.
    pub fn save(&self, batch: &Batch) -> Result<SpoolFile, StoreError> {
        let encoded = batch.to_json_vec()?;

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        let name = format!(
            "{FILE_PREFIX}{timestamp}_{}{FILE_SUFFIX}",
            Uuid::new_v4().simple()
        );
        let path = self.root.join(&name);
        let tmp = self.root.join(format!("{name}.tmp"));

        fs::write(&tmp, &encoded)?;
        fs::rename(&tmp, &path)?;

        debug!(
            file = %path.display(),
            documents = batch.len(),
            bytes = encoded.len(),
            "persisted batch"
        );
        Ok(SpoolFile { path })
    }

    /// Lazily read every written batch currently visible in the store.
    ///
    /// Restartable and safe to run concurrently with `save`: files written
    /// after the scan started are simply picked up by the next invocation,
    /// and files claimed underneath the iterator are skipped. A corrupt file
    /// yields a [`StoreError::Corrupt`] item rather than ending iteration.
    pub fn load_all(&self) -> Result<LoadAll, StoreError> {
        Ok(LoadAll {
            entries: fs::read_dir(&self.root)?,
        })
    }

    /// Written (unclaimed) files, oldest first by name.
    pub fn written(&self) -> Result<Vec<SpoolFile>, StoreError> {
        let mut paths = self.matching_files(is_written)?;
        paths.sort();
        Ok(paths.into_iter().map(|path| SpoolFile { path }).collect())
    }

    /// Claimed files left behind by an unclean shutdown, oldest first.
    pub fn orphaned_claims(&self) -> Result<Vec<ClaimedFile>, StoreError> {
        let mut paths = self.matching_files(is_claim)?;
        paths.sort();
        Ok(paths.into_iter().map(|path| ClaimedFile { path }).collect())
    }

    /// Try to claim a written file for exclusive processing.
    ///
    /// Returns `Ok(None)` when the file is already gone — another consumer
    /// claimed or deleted it first. That is the expected outcome of a claim
    /// race, not an error.
    pub fn claim(&self, file: &SpoolFile) -> Result<Option<ClaimedFile>, StoreError> {
        let claimed = PathBuf::from(append_suffix(file.path(), ".processing"));
        match fs::rename(file.path(), &claimed) {
            Ok(()) => Ok(Some(ClaimedFile { path: claimed })),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Read the batch held by a claimed file.
    pub fn read_claimed(&self, claimed: &ClaimedFile) -> Result<Batch, StoreError> {
        let bytes = fs::read(claimed.path())?;
        Batch::from_json_slice(&bytes).map_err(|source| StoreError::Corrupt {
            path: claimed.path().to_path_buf(),
            source,
        })
    }

    /// Delete a claimed file after its batch was handled.
    ///
    /// Deleting a file that is already gone is a no-op.
    pub fn delete(&self, claimed: &ClaimedFile) -> Result<(), StoreError> {
        match fs::remove_file(claimed.path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Return a claimed file to the `written` state.
    ///
    /// Used when a recovered batch could not be re-persisted: the claimed
    /// file is the only remaining copy, so it goes back into the scan set
    /// instead of waiting for an unclean-shutdown resume.
    pub fn release(&self, claimed: ClaimedFile) -> Result<SpoolFile, StoreError> {
        let written = match claimed.path().to_str() {
            Some(s) => PathBuf::from(s.trim_end_matches(".processing")),
            None => claimed.path().with_extension(""),
        };
        fs::rename(claimed.path(), &written)?;
        Ok(SpoolFile { path: written })
    }

    /// Move a claimed file into the quarantine subdirectory.
    ///
    /// Quarantined files are never retried automatically; they are kept for
    /// operator inspection.
    pub fn quarantine(&self, claimed: ClaimedFile) -> Result<PathBuf, StoreError> {
        let quarantine = self.root.join(QUARANTINE_DIR);
        fs::create_dir_all(&quarantine)?;

        let name = claimed
            .path()
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "unnamed".into());
        let target = quarantine.join(name);
        fs::rename(claimed.path(), &target)?;

        warn!(file = %target.display(), "quarantined corrupt spool file");
        Ok(target)
    }

    fn matching_files(&self, matches: fn(&str) -> bool) -> Result<Vec<PathBuf>, StoreError> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            if name.to_str().is_some_and(matches) {
                paths.push(entry.path());
            }
        }
        Ok(paths)
    }
}

/// Lazy iterator over `(file, batch)` pairs, see [`SpoolStore::load_all`].
pub struct LoadAll {
    entries: fs::ReadDir,
}

impl Iterator for LoadAll {
    type Item = Result<(SpoolFile, Batch), StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(e.into())),
            };
            if !entry.file_name().to_str().is_some_and(is_written) {
                continue;
            }
            let path = entry.path();
            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                // Claimed or deleted underneath the scan.
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Some(Err(e.into())),
            };
            return Some(match Batch::from_json_slice(&bytes) {
                Ok(batch) => Ok((SpoolFile { path }, batch)),
                Err(source) => Err(StoreError::Corrupt { path, source }),
            });
        }
    }
}

fn is_written(name: &str) -> bool {
    name.starts_with(FILE_PREFIX) && name.ends_with(FILE_SUFFIX)
}

fn is_claim(name: &str) -> bool {
    name.starts_with(FILE_PREFIX) && name.ends_with(CLAIM_SUFFIX)
}

fn is_stale_tmp(name: &str) -> bool {
    name.starts_with(FILE_PREFIX) && name.ends_with(TMP_SUFFIX)
}

fn append_suffix(path: &Path, suffix: &str) -> std::ffi::OsString {
    let mut s = path.as_os_str().to_os_string();
    s.push(suffix);
    s
}
