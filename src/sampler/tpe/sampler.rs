//! Tree-Parzen Estimator (TPE) sampler implementation.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::StdRng;

use super::sorted_trials::{SortedTrials, TrialQualityFilter};
use crate::distribution::Distribution;
use crate::error::{Error, Result};
use crate::kde::ParzenEstimator;
use crate::param::ParameterValue;
use crate::record::{AttrValue, Parameter, StudyInfo, TrialRecord};
use crate::sampler::random::RandomSampler;
use crate::sampler::{JointSample, Sampler, SamplerConfig, TpeSamplerConfig};
use crate::search_space::{SearchSpace, SearchSpaceTracker};
use crate::types::Timestamp;

/// System attribute recording how many trials informed a TPE draw.
pub const N_TRIALS_ATTR: &str = "tpe:n_trials";

/// A Tree-Parzen Estimator (TPE) sampler for Bayesian optimization.
///
/// TPE sorts the finished trials by quality and splits them at the midpoint
/// into a good half `D_l` and a bad half `D_g`. It fits a
/// [`ParzenEstimator`] to each half, draws `n_ei_candidates` joint
/// candidates from the good density and keeps the one maximizing
/// `log l(x) - log g(x)`.
///
/// Until `n_startup_trials` trials qualify, `joint_sample` draws nothing
/// and every parameter comes from the random fallback through
/// [`Sampler::sample`], which always delegates to it.
///
/// # Examples
///
/// ```
/// use optsync::sampler::tpe::TpeSampler;
///
/// // Create with default settings
/// let sampler = TpeSampler::new();
///
/// // Create with custom settings using the builder
/// let sampler = TpeSampler::builder()
///     .n_startup_trials(20)
///     .n_ei_candidates(32)
///     .seed(42)
///     .build()
///     .unwrap();
/// ```
pub struct TpeSampler {
    /// Number of qualifying trials before TPE kicks in.
    n_startup_trials: usize,
    /// Number of candidate samples to evaluate per joint sample.
    n_ei_candidates: usize,
    seed: Option<u64>,
    filter: TrialQualityFilter,
    fallback: RandomSampler,
    /// `None` until [`Sampler::init`] tells us the study's direction.
    sorted_trials: Option<SortedTrials>,
    tracker: SearchSpaceTracker,
    /// Thread-safe RNG for sampling.
    rng: Mutex<StdRng>,
}

impl TpeSampler {
    /// Creates a new TPE sampler with default settings.
    ///
    /// Default settings:
    /// - `n_startup_trials`: 10
    /// - `n_ei_candidates`: 24
    /// - unknown trials are filtered out of the history
    #[must_use]
    pub fn new() -> Self {
        Self::with_parts(&TpeSamplerConfig::default())
    }

    /// Creates a builder for configuring a TPE sampler.
    ///
    /// # Examples
    ///
    /// ```
    /// use optsync::sampler::tpe::TpeSampler;
    ///
    /// let sampler = TpeSampler::builder()
    ///     .n_startup_trials(5)
    ///     .seed(42)
    ///     .build()
    ///     .unwrap();
    /// ```
    #[must_use]
    pub fn builder() -> TpeSamplerBuilder {
        TpeSamplerBuilder::new()
    }

    /// Creates a sampler from its configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `n_ei_candidates` is zero.
    pub fn from_config(config: &TpeSamplerConfig) -> Result<Self> {
        if config.n_ei_candidates == 0 {
            return Err(Error::InvalidConfig("n_ei_candidates must be at least 1"));
        }
        Ok(Self::with_parts(config))
    }

    fn with_parts(config: &TpeSamplerConfig) -> Self {
        let (rng, fallback) = match config.seed {
            Some(s) => (
                StdRng::seed_from_u64(s),
                RandomSampler::with_seed(s.wrapping_add(1)),
            ),
            None => (StdRng::from_os_rng(), RandomSampler::new()),
        };
        Self {
            n_startup_trials: config.n_startup_trials,
            n_ei_candidates: config.n_ei_candidates,
            seed: config.seed,
            filter: TrialQualityFilter {
                filter_unknown: config.filter_unknown,
            },
            fallback,
            sorted_trials: None,
            tracker: SearchSpaceTracker::default(),
            rng: Mutex::new(rng),
        }
    }

    /// Number of trials currently in the sorted history.
    #[must_use]
    pub fn n_history(&self) -> usize {
        self.sorted_trials.as_ref().map_or(0, SortedTrials::len)
    }

    fn sorted(&self) -> Result<&SortedTrials> {
        self.sorted_trials
            .as_ref()
            .ok_or(Error::Uninitialized("TPE sampler used before init"))
    }
}

impl Default for TpeSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for TpeSampler {
    fn init(&mut self, study: &StudyInfo) -> Result<()> {
        let Some(target) = study.targets.first() else {
            return Err(Error::InvalidConfig("study needs at least one target"));
        };
        self.fallback.init(study)?;
        self.sorted_trials = Some(SortedTrials::new(self.filter, target.direction));
        if let Some(space) = &study.search_space {
            self.set_search_space(space.clone());
        }
        Ok(())
    }

    fn sync(&mut self, trials: &[TrialRecord]) -> Result<()> {
        let Some(sorted) = self.sorted_trials.as_mut() else {
            return Err(Error::Uninitialized("TPE sampler synced before init"));
        };
        self.fallback.sync(trials)?;
        sorted.sync(trials);
        self.tracker.sync(trials)
    }

    fn last_update_time(&self) -> Option<Timestamp> {
        self.tracker.last_update_time()
    }

    fn update_timestamp(&mut self, timestamp: Option<Timestamp>) {
        self.tracker.update_timestamp(timestamp);
        self.fallback.update_timestamp(timestamp);
    }

    fn set_search_space(&mut self, search_space: SearchSpace) {
        self.fallback.set_search_space(search_space.clone());
        self.tracker = SearchSpaceTracker::new(search_space);
        if let Some(sorted) = &self.sorted_trials {
            self.sorted_trials = Some(SortedTrials::new(self.filter, sorted.direction()));
        }
    }

    fn search_space(&self) -> &SearchSpace {
        self.tracker.current_search_space()
    }

    fn joint_sample(&self, fixed: &BTreeMap<String, Parameter>) -> Result<JointSample> {
        let sorted = self.sorted()?;
        let n = sorted.len();
        if n < self.n_startup_trials.max(2) {
            return Ok(JointSample::from_fixed(fixed));
        }

        let mut out = JointSample::from_fixed(fixed);
        let mut modeled = SearchSpace::new();
        for (name, distribution) in self.tracker.current_search_space().iter() {
            if fixed.contains_key(name) {
                continue;
            }
            if distribution.is_value_set() {
                let value = self.fallback.sample(distribution)?;
                out.parameters
                    .insert(name.clone(), Parameter::sampled(value, distribution.clone()));
            } else {
                modeled = modeled.with(name.clone(), distribution.clone());
            }
        }

        if !modeled.is_empty() {
            let history: Vec<&TrialRecord> = sorted.trials().collect();
            let (below, above) = history.split_at(n / 2);
            let l = ParzenEstimator::new(&modeled, below)?;
            let g = ParzenEstimator::new(&modeled, above)?;

            let mut rng = self.rng.lock();
            let candidates = l.sample(self.n_ei_candidates, &mut *rng);
            drop(rng);

            let best = candidates
                .into_iter()
                .map(|c| {
                    let score = l.log_pdf(&c) - g.log_pdf(&c);
                    (score, c)
                })
                .max_by(|a, b| a.0.total_cmp(&b.0))
                .map(|(_, c)| c)
                .ok_or(Error::Internal("no TPE candidates were drawn"))?;

            for (name, value) in best {
                let distribution = modeled
                    .get(&name)
                    .cloned()
                    .ok_or(Error::Internal("candidate parameter outside modeled space"))?;
                out.parameters
                    .insert(name, Parameter::sampled(value, distribution));
            }
        }

        out.system_attrs
            .insert(N_TRIALS_ATTR.to_owned(), AttrValue::from(n));
        trace_debug!(n_trials = n, n_params = out.parameters.len(), "TPE joint sample");
        Ok(out)
    }

    fn sample(&self, distribution: &Distribution) -> Result<ParameterValue> {
        self.fallback.sample(distribution)
    }

    fn config(&self) -> SamplerConfig {
        SamplerConfig::Tpe(TpeSamplerConfig {
            n_startup_trials: self.n_startup_trials,
            n_ei_candidates: self.n_ei_candidates,
            seed: self.seed,
            filter_unknown: self.filter.filter_unknown,
        })
    }
}

/// Builder for configuring a [`TpeSampler`].
///
/// # Examples
///
/// ```
/// use optsync::sampler::tpe::TpeSamplerBuilder;
///
/// let sampler = TpeSamplerBuilder::new()
///     .n_startup_trials(20)
///     .n_ei_candidates(32)
///     .filter_unknown(false)
///     .seed(42)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct TpeSamplerBuilder {
    config: TpeSamplerConfig,
}

impl TpeSamplerBuilder {
    /// Creates a builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of qualifying trials before TPE sampling starts.
    #[must_use]
    pub fn n_startup_trials(mut self, n: usize) -> Self {
        self.config.n_startup_trials = n;
        self
    }

    /// Sets the number of candidates evaluated per joint sample.
    #[must_use]
    pub fn n_ei_candidates(mut self, n: usize) -> Self {
        self.config.n_ei_candidates = n;
        self
    }

    /// Keeps or drops `Unknown` trials in the history.
    #[must_use]
    pub fn filter_unknown(mut self, filter: bool) -> Self {
        self.config.filter_unknown = filter;
        self
    }

    /// Sets a seed for reproducible sampling.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Builds the configured [`TpeSampler`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `n_ei_candidates` is zero.
    pub fn build(self) -> Result<TpeSampler> {
        TpeSampler::from_config(&self.config)
    }
}
