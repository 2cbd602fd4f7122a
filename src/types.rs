//! Core types for the optimization engine.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The direction of optimization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Direction {
    /// Minimize the objective value.
    Minimize,
    /// Maximize the objective value.
    Maximize,
}

impl Direction {
    /// Multiplier that turns a value into "smaller is better".
    #[must_use]
    pub(crate) fn sign(self) -> f64 {
        match self {
            Self::Minimize => 1.0,
            Self::Maximize => -1.0,
        }
    }
}

/// One optimization target of a study.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Target {
    /// Display name of the target.
    pub name: String,
    /// Whether the target is minimized or maximized.
    pub direction: Direction,
}

impl Target {
    /// A target to minimize.
    #[must_use]
    pub fn minimize(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: Direction::Minimize,
        }
    }

    /// A target to maximize.
    #[must_use]
    pub fn maximize(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: Direction::Maximize,
        }
    }
}

/// The state of a trial in its lifecycle.
///
/// ```text
/// Created -> Waiting | Running -> Completed | PartiallyCompleted
///                                 | PartiallyFailed | Failed | Pruned | Unknown
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TrialState {
    /// Freshly created, not yet owned by a running objective.
    Created,
    /// Enqueued and waiting for its owner to pick it up.
    Waiting,
    /// Currently being evaluated.
    Running,
    /// Every objective value is valid.
    Completed,
    /// Some objective values were skipped, the rest are valid.
    PartiallyCompleted,
    /// At least one objective value is NaN, infinite, or infeasible.
    PartiallyFailed,
    /// The objective raised an error.
    Failed,
    /// The objective signalled an early stop.
    Pruned,
    /// The outcome could not be resolved.
    Unknown,
}

impl TrialState {
    /// Whether the trial can no longer change.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Created | Self::Waiting | Self::Running)
    }

    /// Derives a finished trial's state from its objective values.
    ///
    /// The checks run in a fixed order: `Unknown` dominates, then the
    /// failure-like statuses, then full success, then skip-tolerant success.
    #[must_use]
    pub fn from_objective_values(values: &[ObjectiveValue]) -> Self {
        if values.is_empty() || values.iter().any(|v| v.status == ObjectiveStatus::Unknown) {
            return Self::Unknown;
        }
        if values.iter().any(|v| {
            matches!(
                v.status,
                ObjectiveStatus::Nan
                    | ObjectiveStatus::Inf
                    | ObjectiveStatus::NegativeInf
                    | ObjectiveStatus::Infeasible
            )
        }) {
            return Self::PartiallyFailed;
        }
        if values.iter().all(|v| v.status == ObjectiveStatus::Valid) {
            return Self::Completed;
        }
        if values
            .iter()
            .all(|v| matches!(v.status, ObjectiveStatus::Valid | ObjectiveStatus::Skipped))
        {
            return Self::PartiallyCompleted;
        }
        Self::Failed
    }
}

/// How an objective value should be interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ObjectiveStatus {
    /// A finite value.
    Valid,
    /// The objective produced NaN.
    Nan,
    /// The objective produced positive infinity.
    Inf,
    /// The objective produced negative infinity.
    NegativeInf,
    /// The configuration violates a constraint.
    Infeasible,
    /// The objective was intentionally not evaluated.
    Skipped,
    /// The status could not be determined.
    Unknown,
}

/// A single objective result.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ObjectiveValue {
    /// How to interpret `value`.
    pub status: ObjectiveStatus,
    /// The numeric result. `None` for NaN and the non-numeric statuses.
    pub value: Option<f64>,
}

impl ObjectiveValue {
    /// Classifies a raw float.
    ///
    /// NaN carries no value; infinities keep their signed value.
    #[must_use]
    pub fn from_f64(value: f64) -> Self {
        let status = if value.is_nan() {
            ObjectiveStatus::Nan
        } else if value.is_infinite() {
            if value.is_sign_positive() {
                ObjectiveStatus::Inf
            } else {
                ObjectiveStatus::NegativeInf
            }
        } else {
            ObjectiveStatus::Valid
        };
        Self {
            status,
            value: (!value.is_nan()).then_some(value),
        }
    }

    /// A value without a numeric payload.
    #[must_use]
    pub fn with_status(status: ObjectiveStatus) -> Self {
        Self {
            status,
            value: None,
        }
    }

    /// The value if it is valid.
    #[must_use]
    pub fn valid(&self) -> Option<f64> {
        match self.status {
            ObjectiveStatus::Valid => self.value,
            _ => None,
        }
    }
}

/// A storage-assigned, monotonically non-decreasing marker.
///
/// Timestamps come from the storage backend, never from a worker's clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Timestamp(pub u64);
