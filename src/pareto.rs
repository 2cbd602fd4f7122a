//! Trial ordering for single- and multi-target studies.
//!
//! With several targets there is generally no single best trial. A
//! [`TrialComparator`] defines a strict partial order over finished trials;
//! [`ParetoComparator`] uses Pareto dominance, and [`pareto_front`] keeps
//! the trials no other trial beats.
//!
//! # Example
//!
//! ```
//! use optsync::pareto::dominates;
//! use optsync::Direction;
//!
//! let dirs = [Direction::Minimize, Direction::Maximize];
//! assert!(dominates(&[1.0, 5.0], &[2.0, 4.0], &dirs));
//! assert!(!dominates(&[1.0, 3.0], &[2.0, 4.0], &dirs));
//! ```

use crate::record::TrialRecord;
use crate::types::{Direction, Target};

/// Returns `true` if solution `a` Pareto-dominates solution `b`.
///
/// A solution dominates another if it is at least as good in all objectives
/// and strictly better in at least one, respecting the given directions.
#[must_use]
pub fn dominates(a: &[f64], b: &[f64], directions: &[Direction]) -> bool {
    debug_assert_eq!(a.len(), b.len());
    debug_assert_eq!(a.len(), directions.len());

    let mut strictly_better = false;
    for ((&av, &bv), dir) in a.iter().zip(b.iter()).zip(directions.iter()) {
        let (better, worse) = match dir {
            Direction::Minimize => (av < bv, av > bv),
            Direction::Maximize => (av > bv, av < bv),
        };
        if worse {
            return false;
        }
        if better {
            strictly_better = true;
        }
    }
    strictly_better
}

/// A strict partial order over trials: `is_better(a, b)` means `a` beats `b`.
pub trait TrialComparator: Send + Sync {
    /// Whether `a` is strictly better than `b`.
    ///
    /// Must be irreflexive and transitive. Trials without a valid value for
    /// every target are never better than anything.
    fn is_better(&self, a: &TrialRecord, b: &TrialRecord) -> bool;
}

/// Orders trials by Pareto dominance over the study's targets.
#[derive(Clone, Debug)]
pub struct ParetoComparator {
    directions: Vec<Direction>,
}

impl ParetoComparator {
    /// A comparator for the given targets.
    #[must_use]
    pub fn new(targets: &[Target]) -> Self {
        Self {
            directions: targets.iter().map(|t| t.direction).collect(),
        }
    }
}

impl TrialComparator for ParetoComparator {
    fn is_better(&self, a: &TrialRecord, b: &TrialRecord) -> bool {
        let Some(av) = a.valid_values() else {
            return false;
        };
        if av.len() != self.directions.len() {
            return false;
        }
        match b.valid_values() {
            Some(bv) if bv.len() == self.directions.len() => {
                dominates(&av, &bv, &self.directions)
            }
            _ => true,
        }
    }
}

/// Trials with valid values that no other trial beats.
///
/// Runs in `O(n²)` comparisons.
#[must_use]
pub fn pareto_front<'a>(
    trials: &'a [TrialRecord],
    comparator: &dyn TrialComparator,
) -> Vec<&'a TrialRecord> {
    let candidates: Vec<&TrialRecord> = trials
        .iter()
        .filter(|t| t.valid_values().is_some_and(|v| !v.is_empty()))
        .collect();
    candidates
        .iter()
        .filter(|t| !candidates.iter().any(|o| comparator.is_better(o, t)))
        .copied()
        .collect()
}
