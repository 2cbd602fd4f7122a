use std::sync::Arc;

use parking_lot::RwLock;

use super::ledger::Ledger;
use super::{Storage, StorageClient};
use crate::error::{Error, Result};
use crate::record::{StudyInfo, TrialRecord};
use crate::types::Timestamp;

/// In-memory storage (the default).
///
/// Timestamps come from a logical clock bumped on every write. Cloning the
/// storage, or calling [`create_client`](Storage::create_client), yields a
/// handle onto the same data.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    clock: u64,
    ledger: Ledger,
}

impl Inner {
    fn tick(&mut self) -> Timestamp {
        let ts = Timestamp(self.clock);
        self.clock += 1;
        ts
    }
}

impl MemoryStorage {
    /// Creates a new, empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageClient for MemoryStorage {
    fn get_current_timestamp(&self) -> Result<Option<Timestamp>> {
        Ok(Some(Timestamp(self.inner.read().clock)))
    }

    fn get_studies(&self, since: Option<Timestamp>) -> Result<Vec<StudyInfo>> {
        Ok(self.inner.read().ledger.studies(since))
    }

    fn get_trials(
        &self,
        study_id: Option<&str>,
        since: Option<Timestamp>,
    ) -> Result<Vec<TrialRecord>> {
        Ok(self.inner.read().ledger.trials(study_id, since))
    }

    fn get_trial(&self, trial_id: &str, study_id: Option<&str>) -> Result<TrialRecord> {
        self.inner.read().ledger.trial(trial_id, study_id)
    }

    fn write_study(&self, study: &StudyInfo) -> Result<()> {
        let mut inner = self.inner.write();
        let ts = inner.tick();
        inner.ledger.apply_study(ts, study);
        Ok(())
    }

    fn write_trial(&self, trial: &TrialRecord) -> Result<()> {
        let mut inner = self.inner.write();
        if !inner.ledger.has_study(&trial.study_id) {
            return Err(Error::NotFound(format!("study {}", trial.study_id)));
        }
        let ts = inner.tick();
        inner.ledger.apply_trial(ts, trial);
        Ok(())
    }
}

impl Storage for MemoryStorage {
    fn create_client(&self, _thread_id: u32) -> Result<Box<dyn StorageClient>> {
        Ok(Box::new(self.clone()))
    }
}
