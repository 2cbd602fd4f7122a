//! Search-space inference from trial history.
//!
//! Workers observe trials in no particular order, so the tracker only ever
//! merges: the result is the same whichever order the trials arrive in.

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::distribution::Distribution;
use crate::error::Result;
use crate::param::ParameterValue;
use crate::record::TrialRecord;
use crate::types::Timestamp;

/// A mapping from parameter name to its distribution.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SearchSpace(BTreeMap<String, Distribution>);

impl SearchSpace {
    /// An empty search space.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the distribution for `name`.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, distribution: Distribution) -> Self {
        self.0.insert(name.into(), distribution);
        self
    }

    /// Distribution recorded for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Distribution> {
        self.0.get(name)
    }

    /// Iterates over `(name, distribution)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Distribution)> {
        self.0.iter()
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the space has no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merges `distribution` into the entry for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompatibleSearchSpace`](crate::Error::IncompatibleSearchSpace)
    /// if the distributions cannot be reconciled. The space is unchanged in that case.
    pub fn merge(&mut self, name: &str, distribution: &Distribution) -> Result<()> {
        let merged = match self.0.get(name) {
            Some(existing) => existing.merge(distribution, name)?,
            None => distribution.clone(),
        };
        self.0.insert(name.to_owned(), merged);
        Ok(())
    }
}

impl FromIterator<(String, Distribution)> for SearchSpace {
    fn from_iter<I: IntoIterator<Item = (String, Distribution)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Incrementally tracks the search space observed across trials.
#[derive(Debug, Clone, Default)]
pub struct SearchSpaceTracker {
    search_space: SearchSpace,
    last_update_time: Option<Timestamp>,
}

impl SearchSpaceTracker {
    /// A tracker seeded with `search_space`, due for a full resync.
    #[must_use]
    pub fn new(search_space: SearchSpace) -> Self {
        Self {
            search_space,
            last_update_time: None,
        }
    }

    /// Merges every parameter of every trial into the tracked space.
    ///
    /// All trials are merged or none are.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompatibleSearchSpace`](crate::Error::IncompatibleSearchSpace)
    /// if a recorded distribution conflicts with the tracked one.
    pub fn sync(&mut self, trials: &[TrialRecord]) -> Result<()> {
        let mut next = self.search_space.clone();
        for trial in trials {
            for (name, parameter) in &trial.parameters {
                next.merge(name, &parameter.effective_distribution())?;
            }
        }
        self.search_space = next;
        Ok(())
    }

    /// The tracked space.
    #[must_use]
    pub fn current_search_space(&self) -> &SearchSpace {
        &self.search_space
    }

    /// Whether `value` is compatible with what has been seen for `name`.
    ///
    /// Untracked names accept any value.
    #[must_use]
    pub fn contains(&self, name: &str, value: &ParameterValue) -> bool {
        self.search_space
            .get(name)
            .is_none_or(|d| d.contains(value))
    }

    /// Timestamp of the last sync, `None` when a full resync is due.
    #[must_use]
    pub fn last_update_time(&self) -> Option<Timestamp> {
        self.last_update_time
    }

    /// Records the timestamp the next incremental sync starts from.
    pub fn update_timestamp(&mut self, timestamp: Option<Timestamp>) {
        self.last_update_time = timestamp;
    }
}
