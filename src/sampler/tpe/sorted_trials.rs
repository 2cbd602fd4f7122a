//! Trial history kept in quality order for the good/bad split.

use std::collections::{BTreeMap, HashSet};

use crate::record::TrialRecord;
use crate::types::{Direction, TrialState};

/// Decides which finished trials enter the sorted history.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrialQualityFilter {
    /// Drop trials whose outcome is `Unknown`.
    pub filter_unknown: bool,
}

impl Default for TrialQualityFilter {
    fn default() -> Self {
        Self {
            filter_unknown: true,
        }
    }
}

impl TrialQualityFilter {
    /// Whether `trial` belongs in the history.
    ///
    /// Only terminal trials qualify; running trials are skipped until they finish.
    #[must_use]
    pub fn accepts(&self, trial: &TrialRecord) -> bool {
        trial.state.is_terminal() && !(self.filter_unknown && trial.state == TrialState::Unknown)
    }
}

/// Terminal trials ordered so that smaller keys are better.
///
/// A completed trial's key is its first target value, negated when that
/// target is maximized. Every other qualifying trial sorts last.
#[derive(Clone, Debug)]
pub struct SortedTrials {
    filter: TrialQualityFilter,
    direction: Direction,
    entries: Vec<(f64, TrialRecord)>,
}

impl SortedTrials {
    /// An empty history ordered by the first target's `direction`.
    #[must_use]
    pub fn new(filter: TrialQualityFilter, direction: Direction) -> Self {
        Self {
            filter,
            direction,
            entries: Vec::new(),
        }
    }

    /// The direction trials are ordered by.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    fn key(&self, trial: &TrialRecord) -> f64 {
        if trial.state != TrialState::Completed {
            return f64::INFINITY;
        }
        trial
            .values
            .first()
            .and_then(crate::types::ObjectiveValue::valid)
            .map_or(f64::INFINITY, |v| v * self.direction.sign())
    }

    /// Merges a batch of trials into the history.
    ///
    /// A trial id seen again replaces its earlier entry. With `M` new trials
    /// and `N` stored ones this takes `O(M log M + N)`.
    pub fn sync(&mut self, trials: &[TrialRecord]) {
        // Latest occurrence of each id within the batch wins.
        let mut latest: BTreeMap<&str, &TrialRecord> = BTreeMap::new();
        for trial in trials.iter().filter(|t| self.filter.accepts(t)) {
            latest.insert(&trial.trial_id, trial);
        }
        if latest.is_empty() {
            return;
        }

        let mut incoming: Vec<(f64, TrialRecord)> = latest
            .values()
            .map(|t| (self.key(t), (*t).clone()))
            .collect();
        incoming.sort_by(|a, b| a.0.total_cmp(&b.0));

        let replaced: HashSet<&str> = latest.keys().copied().collect();
        let existing = core::mem::take(&mut self.entries);
        let mut merged = Vec::with_capacity(existing.len() + incoming.len());
        let mut new_iter = incoming.into_iter().peekable();
        for entry in existing {
            if replaced.contains(entry.1.trial_id.as_str()) {
                continue;
            }
            while let Some(next) = new_iter.next_if(|n| n.0.total_cmp(&entry.0).is_lt()) {
                merged.push(next);
            }
            merged.push(entry);
        }
        merged.extend(new_iter);
        self.entries = merged;
    }

    /// Trials from best to worst.
    pub fn trials(&self) -> impl ExactSizeIterator<Item = &TrialRecord> {
        self.entries.iter().map(|(_, t)| t)
    }

    /// Number of stored trials.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no trial has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::WorkerId;
    use crate::types::ObjectiveValue;

    fn trial(id: &str, state: TrialState, value: Option<f64>) -> TrialRecord {
        let mut t = TrialRecord::new(id, "s", WorkerId::new("c", 1), state);
        t.values = value.into_iter().map(ObjectiveValue::from_f64).collect();
        t
    }

    fn ids(sorted: &SortedTrials) -> Vec<&str> {
        sorted.trials().map(|t| t.trial_id.as_str()).collect()
    }

    #[test]
    fn sorts_by_value_with_failures_last() {
        let mut sorted = SortedTrials::new(TrialQualityFilter::default(), Direction::Minimize);
        sorted.sync(&[
            trial("c", TrialState::Completed, Some(3.0)),
            trial("f", TrialState::Failed, None),
            trial("a", TrialState::Completed, Some(1.0)),
            trial("r", TrialState::Running, None),
            trial("u", TrialState::Unknown, None),
        ]);
        assert_eq!(ids(&sorted), vec!["a", "c", "f"]);
    }

    #[test]
    fn maximize_flips_order() {
        let mut sorted = SortedTrials::new(TrialQualityFilter::default(), Direction::Maximize);
        sorted.sync(&[
            trial("low", TrialState::Completed, Some(1.0)),
            trial("high", TrialState::Completed, Some(9.0)),
        ]);
        assert_eq!(ids(&sorted), vec!["high", "low"]);
    }

    #[test]
    fn incremental_sync_merges_and_replaces() {
        let mut sorted = SortedTrials::new(TrialQualityFilter::default(), Direction::Minimize);
        sorted.sync(&[
            trial("a", TrialState::Completed, Some(1.0)),
            trial("b", TrialState::Completed, Some(5.0)),
            trial("c", TrialState::Completed, Some(9.0)),
        ]);
        sorted.sync(&[
            trial("d", TrialState::Completed, Some(4.0)),
            trial("c", TrialState::Completed, Some(0.5)),
            trial("e", TrialState::Completed, Some(10.0)),
        ]);
        assert_eq!(ids(&sorted), vec!["c", "a", "d", "b", "e"]);

        // Syncing the same terminal trials again is a no-op.
        sorted.sync(&[trial("d", TrialState::Completed, Some(4.0))]);
        assert_eq!(ids(&sorted), vec!["c", "a", "d", "b", "e"]);
        assert_eq!(sorted.len(), 5);
    }

    #[test]
    fn equal_keys_keep_arrival_order() {
        let mut sorted = SortedTrials::new(TrialQualityFilter::default(), Direction::Minimize);
        sorted.sync(&[trial("first", TrialState::Failed, None)]);
        sorted.sync(&[trial("second", TrialState::Pruned, None)]);
        assert_eq!(ids(&sorted), vec!["first", "second"]);
    }

    #[test]
    fn unknown_kept_when_not_filtered() {
        let filter = TrialQualityFilter {
            filter_unknown: false,
        };
        let mut sorted = SortedTrials::new(filter, Direction::Minimize);
        sorted.sync(&[
            trial("u", TrialState::Unknown, None),
            trial("a", TrialState::Completed, Some(2.0)),
        ]);
        assert_eq!(ids(&sorted), vec!["a", "u"]);
    }
}
