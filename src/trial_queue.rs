//! Per-worker queue of trials the worker may claim.

use std::collections::BTreeMap;

use crate::record::{TrialRecord, WorkerId};
use crate::types::{Timestamp, TrialState};

/// Trials in a tracked set of states that are owned by one worker.
///
/// A queue belongs to exactly one worker; it is not meant to be shared.
#[derive(Debug)]
pub struct TrialQueue {
    worker_id: WorkerId,
    states: Vec<TrialState>,
    trials: BTreeMap<String, TrialRecord>,
    last_update_time: Option<Timestamp>,
}

impl TrialQueue {
    /// Creates an empty queue tracking `states` for `worker_id`.
    #[must_use]
    pub fn new(worker_id: WorkerId, states: &[TrialState]) -> Self {
        Self {
            worker_id,
            states: states.to_vec(),
            trials: BTreeMap::new(),
            last_update_time: None,
        }
    }

    /// The worker this queue serves.
    #[must_use]
    pub fn worker_id(&self) -> &WorkerId {
        &self.worker_id
    }

    /// Absorbs a batch of trials read from storage.
    ///
    /// Owned trials in a tracked state are inserted or replaced; tracked
    /// trials that have moved to another state are dropped.
    pub fn sync(&mut self, trials: &[TrialRecord]) {
        for trial in trials {
            if !self.worker_id.owns(&trial.worker_id) {
                continue;
            }
            if self.states.contains(&trial.state) {
                self.trials.insert(trial.trial_id.clone(), trial.clone());
            } else {
                self.trials.remove(&trial.trial_id);
            }
        }
    }

    /// Removes and returns one trial in `state`, if any.
    pub fn get_trial(&mut self, state: TrialState) -> Option<TrialRecord> {
        let id = self
            .trials
            .iter()
            .find(|(_, t)| t.state == state)
            .map(|(id, _)| id.clone())?;
        self.trials.remove(&id)
    }

    /// Puts back a trial taken with [`get_trial`](Self::get_trial) that
    /// could not be started.
    ///
    /// The trial is already behind the sync timestamp, so it would not be
    /// read again.
    pub fn requeue(&mut self, trial: TrialRecord) {
        self.trials.insert(trial.trial_id.clone(), trial);
    }

    /// Number of trials currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.trials.len()
    }

    /// Whether the queue holds no trials.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    /// Timestamp the next incremental sync starts from.
    #[must_use]
    pub fn last_update_time(&self) -> Option<Timestamp> {
        self.last_update_time
    }

    /// Advances the sync timestamp.
    pub fn update_timestamp(&mut self, timestamp: Option<Timestamp>) {
        self.last_update_time = timestamp;
    }
}
