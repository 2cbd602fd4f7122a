//! Persisted entities exchanged with storage.

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::distribution::Distribution;
use crate::param::ParameterValue;
use crate::search_space::SearchSpace;
use crate::types::{ObjectiveValue, Target, Timestamp, TrialState};

/// Identity of a worker: a client plus a thread within that client.
///
/// Thread id `0` is a wildcard owner that claims every trial issued under
/// its client id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WorkerId {
    /// The client (process or study handle) id.
    pub client_id: String,
    /// The thread within the client.
    pub thread_id: u32,
}

impl WorkerId {
    /// Creates a worker id.
    #[must_use]
    pub fn new(client_id: impl Into<String>, thread_id: u32) -> Self {
        Self {
            client_id: client_id.into(),
            thread_id,
        }
    }

    /// Whether this worker may claim a trial owned by `owner`.
    #[must_use]
    pub fn owns(&self, owner: &WorkerId) -> bool {
        self.client_id == owner.client_id
            && (self.thread_id == 0 || self.thread_id == owner.thread_id)
    }
}

/// A user or system attribute value attached to a trial.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AttrValue {
    /// A floating-point value.
    Float(f64),
    /// An integer value.
    Int(i64),
    /// A string value.
    String(String),
    /// A boolean value.
    Bool(bool),
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<usize> for AttrValue {
    fn from(v: usize) -> Self {
        Self::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// Study metadata.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StudyInfo {
    /// Unique id of the study.
    pub study_id: String,
    /// What is being optimized, one entry per objective value.
    pub targets: Vec<Target>,
    /// A declared search space, if any.
    pub search_space: Option<SearchSpace>,
    /// Set by storage on write.
    pub last_update_time: Option<Timestamp>,
}

impl StudyInfo {
    /// Creates study metadata without a declared search space.
    #[must_use]
    pub fn new(study_id: impl Into<String>, targets: Vec<Target>) -> Self {
        Self {
            study_id: study_id.into(),
            targets,
            search_space: None,
            last_update_time: None,
        }
    }
}

/// A parameter value paired with the distribution it was drawn from.
///
/// Externally fixed values carry no distribution.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Parameter {
    /// The value.
    pub value: ParameterValue,
    /// Where the value came from, if known.
    pub distribution: Option<Distribution>,
}

impl Parameter {
    /// A value drawn from `distribution`.
    #[must_use]
    pub fn sampled(value: ParameterValue, distribution: Distribution) -> Self {
        Self {
            value,
            distribution: Some(distribution),
        }
    }

    /// A value without a known distribution.
    #[must_use]
    pub fn fixed(value: ParameterValue) -> Self {
        Self {
            value,
            distribution: None,
        }
    }

    /// The recorded distribution, or an unknown distribution over this value.
    #[must_use]
    pub fn effective_distribution(&self) -> Distribution {
        self.distribution
            .clone()
            .unwrap_or_else(|| Distribution::unknown(self.value.clone()))
    }
}

/// The persisted form of a trial.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrialRecord {
    /// Unique id of the trial.
    pub trial_id: String,
    /// The study the trial belongs to.
    pub study_id: String,
    /// The worker that owns the trial.
    pub worker_id: WorkerId,
    /// Lifecycle state as last written.
    pub state: TrialState,
    /// Parameters keyed by name.
    pub parameters: BTreeMap<String, Parameter>,
    /// Objective results, one per target.
    pub values: Vec<ObjectiveValue>,
    /// Attributes set by the user.
    pub user_attrs: BTreeMap<String, AttrValue>,
    /// Attributes set by the engine and samplers.
    pub system_attrs: BTreeMap<String, AttrValue>,
    /// Set by storage on first write.
    pub create_time: Option<Timestamp>,
    /// Set by storage on every write.
    pub last_update_time: Option<Timestamp>,
}

impl TrialRecord {
    /// Creates an empty trial in the given state.
    #[must_use]
    pub fn new(
        trial_id: impl Into<String>,
        study_id: impl Into<String>,
        worker_id: WorkerId,
        state: TrialState,
    ) -> Self {
        Self {
            trial_id: trial_id.into(),
            study_id: study_id.into(),
            worker_id,
            state,
            parameters: BTreeMap::new(),
            values: Vec::new(),
            user_attrs: BTreeMap::new(),
            system_attrs: BTreeMap::new(),
            create_time: None,
            last_update_time: None,
        }
    }

    /// Value of a parameter by name.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&ParameterValue> {
        self.parameters.get(name).map(|p| &p.value)
    }

    /// The valid objective values, or `None` if any target lacks one.
    #[must_use]
    pub fn valid_values(&self) -> Option<Vec<f64>> {
        self.values.iter().map(ObjectiveValue::valid).collect()
    }
}
