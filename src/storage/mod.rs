//! Study and trial storage backends.
//!
//! The core only talks to storage through [`StorageClient`]. Reads are
//! incremental: every read takes an optional `since` timestamp and returns
//! at least every entity written at or after it. Backends may over-return
//! but must never omit.
//!
//! A client handle is owned by one worker. A [`Storage`] is the shareable
//! factory that hands out an independent client per worker thread through
//! [`create_client`](Storage::create_client).
//!
//! # Available backends
//!
//! | Backend | Description | Feature flag |
//! |---------|-------------|-------------|
//! | [`MemoryStorage`] | In-memory log behind a read-write lock (the default) | — |
//! | `JournalStorage` | JSONL file with `fs2` file locking for multi-process sharing | `journal` |
//!
//! # Implementing a custom backend
//!
//! Implement [`StorageClient`] for the per-worker handle and [`Storage`] for
//! the shareable factory. Writes are idempotent overwrites keyed by id;
//! last writer wins.
//!
//! ```
//! use optsync::storage::{MemoryStorage, StorageClient};
//! use optsync::{StudyInfo, Target};
//!
//! let storage = MemoryStorage::new();
//! storage
//!     .write_study(&StudyInfo::new("demo", vec![Target::minimize("loss")]))
//!     .unwrap();
//! assert_eq!(storage.get_studies(None).unwrap().len(), 1);
//! ```

#[cfg(feature = "journal")]
mod journal;
mod ledger;
mod memory;

#[cfg(feature = "journal")]
pub use journal::JournalStorage;
pub use memory::MemoryStorage;

use crate::error::Result;
use crate::record::{StudyInfo, TrialRecord};
use crate::types::Timestamp;

/// A per-worker handle onto a storage backend.
///
/// Handles are `Send` so they can move into a worker thread, but nothing
/// requires one handle to be usable from several threads at once.
pub trait StorageClient: Send {
    /// A non-decreasing marker of the backend's write position.
    ///
    /// `None` means the backend does not support incremental reads and
    /// ignores `since` filters.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    fn get_current_timestamp(&self) -> Result<Option<Timestamp>>;

    /// Studies written at or after `since`, or all studies for `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get_studies(&self, since: Option<Timestamp>) -> Result<Vec<StudyInfo>>;

    /// Trials written at or after `since`, optionally scoped to one study.
    ///
    /// Each trial appears at most once, in its latest written form.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get_trials(
        &self,
        study_id: Option<&str>,
        since: Option<Timestamp>,
    ) -> Result<Vec<TrialRecord>>;

    /// A single trial in its latest written form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`](crate::Error::NotFound) if no such trial
    /// exists in the given study (or any study for `None`).
    fn get_trial(&self, trial_id: &str, study_id: Option<&str>) -> Result<TrialRecord>;

    /// Creates or overwrites a study.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn write_study(&self, study: &StudyInfo) -> Result<()>;

    /// Creates or overwrites a trial.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`](crate::Error::NotFound) if the trial's
    /// study does not exist.
    fn write_trial(&self, trial: &TrialRecord) -> Result<()>;
}

/// A storage backend that can be shared across workers.
pub trait Storage: StorageClient + Sync {
    /// Hands out an independent client for worker thread `thread_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot open another connection.
    fn create_client(&self, thread_id: u32) -> Result<Box<dyn StorageClient>>;
}
