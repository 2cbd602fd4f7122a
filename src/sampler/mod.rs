//! Sampler trait and implementations for parameter sampling.
//!
//! A sampler keeps a private cache built from the trials it has been
//! [`sync`](Sampler::sync)ed with. Drawing values never touches that cache,
//! so a sampler can be shared by reference with the trial it serves. Every
//! worker owns its own sampler instance, built from a [`SamplerConfig`].

pub mod random;
pub mod tpe;

pub use random::RandomSampler;
pub use tpe::TpeSampler;

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::distribution::Distribution;
use crate::error::Result;
use crate::param::ParameterValue;
use crate::record::{AttrValue, Parameter, StudyInfo, TrialRecord};
use crate::search_space::SearchSpace;
use crate::types::Timestamp;

/// The outcome of [`Sampler::joint_sample`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JointSample {
    /// The fixed parameters passed in, plus every newly drawn value.
    pub parameters: BTreeMap<String, Parameter>,
    /// Attributes to merge into the trial's system attributes.
    pub system_attrs: BTreeMap<String, AttrValue>,
}

impl JointSample {
    /// A draw that only echoes `fixed`.
    #[must_use]
    pub fn from_fixed(fixed: &BTreeMap<String, Parameter>) -> Self {
        Self {
            parameters: fixed.clone(),
            system_attrs: BTreeMap::new(),
        }
    }
}

/// Trait for pluggable parameter sampling strategies.
///
/// `sync` and the timestamp accessors mutate the sampler's cache;
/// `joint_sample` and `sample` only read it.
pub trait Sampler: Send {
    /// Prepares the sampler for `study`.
    ///
    /// Installs the study's declared search space, if any.
    ///
    /// # Errors
    ///
    /// Implementations may reject studies they cannot handle.
    fn init(&mut self, study: &StudyInfo) -> Result<()>;

    /// Absorbs newly observed trials.
    ///
    /// Syncing a trial again in the same terminal state is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompatibleSearchSpace`](crate::Error::IncompatibleSearchSpace)
    /// if the trials conflict with the tracked search space.
    fn sync(&mut self, trials: &[TrialRecord]) -> Result<()>;

    /// Storage timestamp the next incremental sync starts from.
    ///
    /// `None` requests a full resync.
    fn last_update_time(&self) -> Option<Timestamp>;

    /// Records the storage timestamp observed before the last sync.
    fn update_timestamp(&mut self, timestamp: Option<Timestamp>);

    /// Replaces the tracked search space and forces a full resync.
    fn set_search_space(&mut self, search_space: SearchSpace);

    /// The search space the sampler currently draws from.
    fn search_space(&self) -> &SearchSpace;

    /// Draws a value for every parameter of the search space not in `fixed`.
    ///
    /// # Errors
    ///
    /// Returns an error if the sampler is not initialized or a distribution
    /// cannot be sampled.
    fn joint_sample(&self, fixed: &BTreeMap<String, Parameter>) -> Result<JointSample>;

    /// Draws a single value from `distribution`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyChoices`](crate::Error::EmptyChoices) for a
    /// distribution without values.
    fn sample(&self, distribution: &Distribution) -> Result<ParameterValue>;

    /// The configuration that rebuilds an equivalent, empty sampler.
    fn config(&self) -> SamplerConfig;
}

/// Configuration of the random sampler.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RandomSamplerConfig {
    /// Seed for reproducible draws.
    pub seed: Option<u64>,
}

/// Configuration of the TPE sampler.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TpeSamplerConfig {
    /// Qualifying trials required before TPE takes over from random sampling.
    pub n_startup_trials: usize,
    /// Candidates drawn from the good density per joint sample.
    pub n_ei_candidates: usize,
    /// Seed for reproducible draws.
    pub seed: Option<u64>,
    /// Drop trials in the `Unknown` state from the history.
    pub filter_unknown: bool,
}

impl Default for TpeSamplerConfig {
    fn default() -> Self {
        Self {
            n_startup_trials: 10,
            n_ei_candidates: 24,
            seed: None,
            filter_unknown: true,
        }
    }
}

/// Serializable description of a sampler.
///
/// Workers build their own sampler from this instead of sharing one.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SamplerConfig {
    /// See [`RandomSampler`](random::RandomSampler).
    Random(RandomSamplerConfig),
    /// See [`TpeSampler`](tpe::TpeSampler).
    Tpe(TpeSamplerConfig),
}

impl SamplerConfig {
    /// Builds a fresh sampler with an empty cache.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`](crate::Error::InvalidConfig) if the
    /// TPE settings are invalid.
    pub fn build(&self) -> Result<Box<dyn Sampler>> {
        match self {
            Self::Random(c) => Ok(Box::new(random::RandomSampler::from_config(c))),
            Self::Tpe(c) => Ok(Box::new(tpe::TpeSampler::from_config(c)?)),
        }
    }

    /// The same configuration with any seed shifted by `offset`.
    ///
    /// Gives each worker of a seeded study its own stream.
    #[must_use]
    pub fn for_worker(&self, offset: u64) -> Self {
        let shift = |seed: Option<u64>| seed.map(|s| s.wrapping_add(offset));
        match self {
            Self::Random(c) => Self::Random(RandomSamplerConfig {
                seed: shift(c.seed),
            }),
            Self::Tpe(c) => Self::Tpe(TpeSamplerConfig {
                seed: shift(c.seed),
                ..c.clone()
            }),
        }
    }
}
