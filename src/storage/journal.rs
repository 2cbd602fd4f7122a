//! JSONL-based journal storage backend.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::ledger::Ledger;
use super::{Storage, StorageClient};
use crate::error::{Error, Result};
use crate::record::{StudyInfo, TrialRecord};
use crate::types::Timestamp;

/// One line of the journal.
#[derive(Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Event {
    WriteStudy { study: StudyInfo },
    WriteTrial { trial: TrialRecord },
}

/// A storage backend that appends every write as a JSON line to a file.
///
/// The zero-based line number of a write is its timestamp. Each handle
/// replays only the lines it has not seen yet. Multiple processes can
/// safely share the same file: writes use an exclusive file lock, reads
/// use a shared file lock.
///
/// # Examples
///
/// ```no_run
/// use optsync::storage::JournalStorage;
///
/// let storage = JournalStorage::new("study.jsonl");
/// ```
pub struct JournalStorage {
    path: PathBuf,
    cache: Mutex<Cache>,
}

#[derive(Default)]
struct Cache {
    /// Bytes of the file already replayed.
    offset: u64,
    /// Lines already replayed; the timestamp of the next write.
    lines: u64,
    ledger: Ledger,
}

fn storage_err(e: impl core::fmt::Display) -> Error {
    Error::Storage(e.to_string())
}

impl JournalStorage {
    /// Creates a journal storage backed by `path`.
    ///
    /// The file does not need to exist yet; it is created on the first
    /// write. Existing lines are replayed lazily on the first access.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            cache: Mutex::new(Cache::default()),
        }
    }

    /// The journal file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replays new lines under a shared lock and runs `f` on the cache.
    fn read<T>(&self, f: impl FnOnce(&Cache) -> Result<T>) -> Result<T> {
        let mut cache = self.cache.lock();
        let file = match File::open(&self.path) {
            Ok(file) => Some(file),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(storage_err(e)),
        };
        if let Some(mut file) = file {
            file.lock_shared().map_err(storage_err)?;
            let replayed = cache.catch_up(&mut file);
            file.unlock().map_err(storage_err)?;
            replayed?;
        }
        f(&cache)
    }

    /// Replays new lines and appends `event` under an exclusive lock.
    ///
    /// `check` runs against the caught-up cache before anything is written.
    fn append(&self, event: &Event, check: impl FnOnce(&Cache) -> Result<()>) -> Result<()> {
        let line = serde_json::to_string(event).map_err(storage_err)?;
        let mut cache = self.cache.lock();

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(storage_err)?;
        file.lock_exclusive().map_err(storage_err)?;

        let written = cache
            .catch_up(&mut file)
            .and_then(|()| check(&cache))
            .and_then(|()| {
                writeln!(file, "{line}").map_err(storage_err)?;
                file.flush().map_err(storage_err)
            })
            .and_then(|()| cache.catch_up(&mut file));

        file.unlock().map_err(storage_err)?;
        written
    }
}

impl Cache {
    /// Applies every complete line past `offset`.
    fn catch_up(&mut self, file: &mut File) -> Result<()> {
        file.seek(SeekFrom::Start(self.offset)).map_err(storage_err)?;
        let mut reader = BufReader::new(file);
        let mut buf = String::new();
        loop {
            buf.clear();
            let n = reader.read_line(&mut buf).map_err(storage_err)?;
            if n == 0 || !buf.ends_with('\n') {
                break;
            }
            let ts = Timestamp(self.lines);
            match serde_json::from_str::<Event>(buf.trim()).map_err(storage_err)? {
                Event::WriteStudy { study } => self.ledger.apply_study(ts, &study),
                Event::WriteTrial { trial } => self.ledger.apply_trial(ts, &trial),
            }
            self.offset += n as u64;
            self.lines += 1;
        }
        Ok(())
    }
}

impl StorageClient for JournalStorage {
    fn get_current_timestamp(&self) -> Result<Option<Timestamp>> {
        self.read(|cache| Ok(Some(Timestamp(cache.lines))))
    }

    fn get_studies(&self, since: Option<Timestamp>) -> Result<Vec<StudyInfo>> {
        self.read(|cache| Ok(cache.ledger.studies(since)))
    }

    fn get_trials(
        &self,
        study_id: Option<&str>,
        since: Option<Timestamp>,
    ) -> Result<Vec<TrialRecord>> {
        self.read(|cache| Ok(cache.ledger.trials(study_id, since)))
    }

    fn get_trial(&self, trial_id: &str, study_id: Option<&str>) -> Result<TrialRecord> {
        self.read(|cache| cache.ledger.trial(trial_id, study_id))
    }

    fn write_study(&self, study: &StudyInfo) -> Result<()> {
        let event = Event::WriteStudy {
            study: study.clone(),
        };
        self.append(&event, |_| Ok(()))
    }

    fn write_trial(&self, trial: &TrialRecord) -> Result<()> {
        let event = Event::WriteTrial {
            trial: trial.clone(),
        };
        self.append(&event, |cache| {
            if cache.ledger.has_study(&trial.study_id) {
                Ok(())
            } else {
                Err(Error::NotFound(format!("study {}", trial.study_id)))
            }
        })
    }
}

impl Storage for JournalStorage {
    fn create_client(&self, _thread_id: u32) -> Result<Box<dyn StorageClient>> {
        Ok(Box::new(Self::new(&self.path)))
    }
}
