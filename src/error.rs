#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when a study or trial cannot be found in storage.
    #[error("not found: {0}")]
    NotFound(String),

    /// Returned when creating a study whose id is already taken.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Returned when a component is used before its required setup.
    #[error("uninitialized: {0}")]
    Uninitialized(&'static str),

    /// Returned when two distributions recorded under the same name cannot be merged.
    #[error("incompatible search space for '{name}': {reason}")]
    IncompatibleSearchSpace {
        /// The name of the parameter.
        name: String,
        /// Why the distributions could not be reconciled.
        reason: String,
    },

    /// Returned when the lower bound is greater than the upper bound.
    #[error("invalid bounds: low ({low}) must be less than or equal to high ({high})")]
    InvalidBounds {
        /// The lower bound value.
        low: f64,
        /// The upper bound value.
        high: f64,
    },

    /// Returned when log scale is used with non-positive bounds.
    #[error("invalid log bounds: low must be positive for log scale")]
    InvalidLogBounds,

    /// Returned when a sampler or study setting is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// Returned when categorical choices are empty.
    #[error("categorical choices cannot be empty")]
    EmptyChoices,

    /// Returned when a parameter is suggested with a different configuration.
    #[error("parameter conflict for '{name}': {reason}")]
    ParameterConflict {
        /// The name of the conflicting parameter.
        name: String,
        /// The reason for the conflict.
        reason: String,
    },

    /// Returned when requesting the best trial but no trials have completed.
    #[error("no completed trials available")]
    NoCompletedTrials,

    /// Returned when a trial is pruned (stopped early by the objective function).
    #[error("trial was pruned")]
    TrialPruned,

    /// Returned when the objective returns the wrong number of values.
    #[error("objective dimension mismatch: expected {expected} values, got {got}")]
    ObjectiveDimensionMismatch {
        /// The expected number of objective values.
        expected: usize,
        /// The actual number of objective values returned.
        got: usize,
    },

    /// Returned when the objective fails with an error that is not in the catch list.
    ///
    /// The trial has already been written as failed when this is returned.
    #[error("objective failed in trial {trial_id}: {message}")]
    Objective {
        /// The id of the failed trial.
        trial_id: String,
        /// The rendered objective error.
        message: String,
    },

    /// Returned when a worker thread panics during `optimize`.
    #[error("worker {0} panicked")]
    WorkerPanicked(u32),

    /// Returned when an internal invariant is violated.
    #[error("internal error: {0}")]
    Internal(&'static str),

    /// Returned when an async task fails.
    #[cfg(feature = "async")]
    #[error("async task error: {0}")]
    TaskError(String),

    /// Returned when a storage operation fails.
    #[cfg(feature = "journal")]
    #[error("storage error: {0}")]
    Storage(String),
}

pub type Result<T> = core::result::Result<T, Error>;

/// Convenience type for signalling a pruned trial from an objective function.
///
/// Implements `Into<Error>` so it can be used with `?` in objectives that
/// return `Result<V, Error>`.
///
/// # Examples
///
/// ```
/// use optsync::{Error, TrialPruned};
///
/// fn objective_that_prunes() -> Result<f64, Error> {
///     // ... some computation ...
///     Err(TrialPruned)?
/// }
/// ```
#[derive(Debug)]
pub struct TrialPruned;

impl core::fmt::Display for TrialPruned {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "trial was pruned")
    }
}

impl core::error::Error for TrialPruned {}

impl From<TrialPruned> for Error {
    fn from(_: TrialPruned) -> Self {
        Error::TrialPruned
    }
}
