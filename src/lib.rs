#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(unreachable_pub)]
#![deny(clippy::correctness)]
#![deny(clippy::suspicious)]
#![deny(clippy::style)]
#![deny(clippy::complexity)]
#![deny(clippy::perf)]
#![deny(clippy::pedantic)]
#![deny(clippy::std_instead_of_core)]

//! Ask/tell hyperparameter optimization for studies that many workers
//! drive at once. Workers in one process or many share a study through
//! storage that only promises eventual consistency: reads are incremental
//! and writes are whole-entity overwrites. Each worker keeps its own
//! sampler cache and trial queue in sync from those reads.
//!
//! # Getting Started
//!
//! ```
//! use optsync::prelude::*;
//!
//! let mut study = Study::builder()
//!     .target(Target::minimize("loss"))
//!     .sampler(TpeSampler::builder().seed(1).build().unwrap())
//!     .build()
//!     .unwrap();
//!
//! study
//!     .optimize(
//!         |trial: &mut Trial| {
//!             let x = trial.suggest_float("x", -10.0, 10.0)?;
//!             let layers = trial.suggest_int("layers", 1, 4)?;
//!             Ok::<_, Error>((x - 3.0).powi(2) + 0.1 * layers as f64)
//!         },
//!         OptimizeOptions::new().n_trials(30),
//!     )
//!     .unwrap();
//!
//! let best = study.best_trial().unwrap();
//! println!("best loss = {:?}", best.values[0].valid());
//! ```
//!
//! Driving trials by hand works the same way:
//!
//! ```
//! use optsync::prelude::*;
//!
//! let mut study = Study::builder()
//!     .target(Target::maximize("accuracy"))
//!     .build()
//!     .unwrap();
//! let mut trial = study.ask().unwrap();
//! let dropout = trial.suggest_float("dropout", 0.0, 0.5).unwrap();
//! let record = study.tell(trial, Ok::<_, Error>(1.0 - dropout)).unwrap();
//! assert_eq!(record.state, TrialState::Completed);
//! ```
//!
//! # Core Concepts
//!
//! | Type | Role |
//! |------|------|
//! | [`Study`] | One client of a stored study: ask, tell, optimize, query results. |
//! | [`Trial`] | A single evaluation of the objective function, carrying suggested parameter values. |
//! | [`Distribution`] | The range a parameter is drawn from; merged across trials by [`SearchSpaceTracker`]. |
//! | [`Sampler`](sampler::Sampler) | Strategy for choosing the next point to evaluate. |
//! | [`StorageClient`](storage::StorageClient) | Incremental reads and overwriting writes of studies and trials. |
//! | [`TrialQueue`] | Waiting trials a worker may claim. |
//! | [`Target`] | A named objective and whether it is minimized or maximized. |
//!
//! # Samplers
//!
//! | Sampler | Algorithm |
//! |---------|-----------|
//! | [`RandomSampler`](sampler::RandomSampler) | Uniform random, log-uniform for log ranges |
//! | [`TpeSampler`](sampler::TpeSampler) | Tree-structured Parzen Estimator over [`kde`] mixtures |
//!
//! # Feature Flags
//!
//! | Flag | What it enables | Default |
//! |------|----------------|---------|
//! | `async` | [`Study::optimize_async`] via tokio | off |
//! | `serde` | `Serialize`/`Deserialize` on records and configurations | off |
//! | `journal` | [`JournalStorage`](storage::JournalStorage): JSONL persistence with file locking (enables `serde`) | off |
//! | `tracing` | Structured log events via [`tracing`](https://docs.rs/tracing) at key optimization points | off |

/// Emit a `tracing::info!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_info {
    ($($arg:tt)*) => { tracing::info!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_info {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::warn!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_warn {
    ($($arg:tt)*) => { tracing::warn!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_warn {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::debug!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_debug {
    ($($arg:tt)*) => { tracing::debug!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug {
    ($($arg:tt)*) => {};
}

mod distribution;
mod error;
pub mod kde;
pub mod objective;
mod param;
pub mod pareto;
mod record;
mod rng_util;
pub mod sampler;
mod search_space;
pub mod storage;
mod study;
mod trial;
mod trial_queue;
mod types;

pub use distribution::{
    CategoricalDistribution, Distribution, FixedDistribution, FloatDistribution, IntDistribution,
    UnknownDistribution, are_identical,
};
pub use error::{Error, Result, TrialPruned};
pub use objective::ObjectiveOutput;
pub use param::ParameterValue;
pub use record::{AttrValue, Parameter, StudyInfo, TrialRecord, WorkerId};
pub use search_space::{SearchSpace, SearchSpaceTracker};
pub use study::{Callback, Catch, FAIL_REASON_ATTR, OptimizeOptions, Study, StudyBuilder};
pub use trial::Trial;
pub use trial_queue::TrialQueue;
pub use types::{Direction, ObjectiveStatus, ObjectiveValue, Target, Timestamp, TrialState};

/// Convenient wildcard import for the most common types.
///
/// ```
/// use optsync::prelude::*;
/// ```
pub mod prelude {
    pub use crate::distribution::Distribution;
    pub use crate::error::{Error, Result, TrialPruned};
    pub use crate::objective::ObjectiveOutput;
    pub use crate::param::ParameterValue;
    pub use crate::record::{AttrValue, TrialRecord};
    pub use crate::sampler::{RandomSampler, Sampler, TpeSampler};
    pub use crate::search_space::SearchSpace;
    #[cfg(feature = "journal")]
    pub use crate::storage::JournalStorage;
    pub use crate::storage::{MemoryStorage, Storage, StorageClient};
    pub use crate::study::{Catch, OptimizeOptions, Study, StudyBuilder};
    pub use crate::trial::Trial;
    pub use crate::types::{Direction, ObjectiveStatus, ObjectiveValue, Target, TrialState};
}
