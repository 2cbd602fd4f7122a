//! The [`ObjectiveOutput`] trait converts what an objective returns into
//! per-target [`ObjectiveValue`]s.
//!
//! Single-target objectives return an `f64`; multi-target objectives
//! return a `Vec<f64>` or an array with one entry per target. Objectives
//! that need to report a skipped or infeasible target can return
//! [`ObjectiveValue`]s directly.
//!
//! ```
//! use optsync::objective::ObjectiveOutput;
//! use optsync::{ObjectiveStatus, ObjectiveValue};
//!
//! let values = [1.5, f64::NAN].into_objective_values();
//! assert_eq!(values[0].status, ObjectiveStatus::Valid);
//! assert_eq!(values[1], ObjectiveValue::with_status(ObjectiveStatus::Nan));
//! ```

use crate::types::ObjectiveValue;

/// A value an objective function can return.
pub trait ObjectiveOutput {
    /// Converts the output into one [`ObjectiveValue`] per target.
    fn into_objective_values(self) -> Vec<ObjectiveValue>;
}

impl ObjectiveOutput for f64 {
    fn into_objective_values(self) -> Vec<ObjectiveValue> {
        vec![ObjectiveValue::from_f64(self)]
    }
}

impl ObjectiveOutput for Vec<f64> {
    fn into_objective_values(self) -> Vec<ObjectiveValue> {
        self.into_iter().map(ObjectiveValue::from_f64).collect()
    }
}

impl<const N: usize> ObjectiveOutput for [f64; N] {
    fn into_objective_values(self) -> Vec<ObjectiveValue> {
        self.into_iter().map(ObjectiveValue::from_f64).collect()
    }
}

impl ObjectiveOutput for ObjectiveValue {
    fn into_objective_values(self) -> Vec<ObjectiveValue> {
        vec![self]
    }
}

impl ObjectiveOutput for Vec<ObjectiveValue> {
    fn into_objective_values(self) -> Vec<ObjectiveValue> {
        self
    }
}
