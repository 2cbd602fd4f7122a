//! Timestamped index of studies and trials shared by the backends.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::record::{StudyInfo, TrialRecord};
use crate::types::Timestamp;

/// Latest version of every entity plus a per-study write log.
///
/// The log is ordered by timestamp and may hold superseded entries; an
/// entry is live when its timestamp matches the trial's latest write.
#[derive(Debug, Default)]
pub(super) struct Ledger {
    studies: BTreeMap<String, StudyInfo>,
    trials: BTreeMap<String, TrialRecord>,
    log: BTreeMap<String, Vec<(Timestamp, String)>>,
}

impl Ledger {
    pub(super) fn has_study(&self, study_id: &str) -> bool {
        self.studies.contains_key(study_id)
    }

    /// Stores `study` as written at `ts`.
    pub(super) fn apply_study(&mut self, ts: Timestamp, study: &StudyInfo) {
        let mut study = study.clone();
        study.last_update_time = Some(ts);
        self.log.entry(study.study_id.clone()).or_default();
        self.studies.insert(study.study_id.clone(), study);
    }

    /// Stores `trial` as written at `ts`.
    ///
    /// The caller checks that the study exists.
    pub(super) fn apply_trial(&mut self, ts: Timestamp, trial: &TrialRecord) {
        let mut trial = trial.clone();
        trial.create_time = self
            .trials
            .get(&trial.trial_id)
            .and_then(|t| t.create_time)
            .or(Some(ts));
        trial.last_update_time = Some(ts);

        let log = self.log.entry(trial.study_id.clone()).or_default();
        log.push((ts, trial.trial_id.clone()));
        self.trials.insert(trial.trial_id.clone(), trial);

        if log.len() > 2 * self.trials.len().max(16) {
            let trials = &self.trials;
            log.retain(|(ts, id)| is_live(trials, *ts, id));
        }
    }

    pub(super) fn studies(&self, since: Option<Timestamp>) -> Vec<StudyInfo> {
        self.studies
            .values()
            .filter(|s| since.is_none_or(|since| s.last_update_time >= Some(since)))
            .cloned()
            .collect()
    }

    pub(super) fn trials(&self, study_id: Option<&str>, since: Option<Timestamp>) -> Vec<TrialRecord> {
        let logs: Vec<&Vec<(Timestamp, String)>> = match study_id {
            Some(id) => self.log.get(id).into_iter().collect(),
            None => self.log.values().collect(),
        };

        let mut out = Vec::new();
        for log in logs {
            let start = since.map_or(0, |since| log.partition_point(|(ts, _)| *ts < since));
            for (ts, id) in &log[start..] {
                if is_live(&self.trials, *ts, id)
                    && let Some(trial) = self.trials.get(id)
                {
                    out.push(trial.clone());
                }
            }
        }
        out
    }

    pub(super) fn trial(&self, trial_id: &str, study_id: Option<&str>) -> Result<TrialRecord> {
        self.trials
            .get(trial_id)
            .filter(|t| study_id.is_none_or(|s| t.study_id == s))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("trial {trial_id}")))
    }
}

fn is_live(trials: &BTreeMap<String, TrialRecord>, ts: Timestamp, id: &str) -> bool {
    trials
        .get(id)
        .is_some_and(|t| t.last_update_time == Some(ts))
}
