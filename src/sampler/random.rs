//! Random sampler implementation.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::distribution::Distribution;
use crate::error::{Error, Result};
use crate::param::ParameterValue;
use crate::record::{Parameter, StudyInfo, TrialRecord};
use crate::rng_util;
use crate::sampler::{JointSample, RandomSamplerConfig, Sampler, SamplerConfig};
use crate::search_space::{SearchSpace, SearchSpaceTracker};
use crate::types::Timestamp;

/// A simple random sampler that samples uniformly from distributions.
///
/// This sampler ignores the trial history apart from tracking the search
/// space, so `joint_sample` can fill in every known parameter. Log-scale
/// ranges are sampled uniformly in log space. It serves as a baseline and
/// as the TPE sampler's fallback.
///
/// # Examples
///
/// ```
/// use optsync::sampler::random::RandomSampler;
///
/// // Create with default RNG
/// let sampler = RandomSampler::new();
///
/// // Create with a fixed seed for reproducibility
/// let sampler = RandomSampler::with_seed(42);
/// ```
pub struct RandomSampler {
    rng: Mutex<fastrand::Rng>,
    seed: Option<u64>,
    tracker: SearchSpaceTracker,
}

impl RandomSampler {
    /// Creates a new random sampler with a default random seed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::new()),
            seed: None,
            tracker: SearchSpaceTracker::default(),
        }
    }

    /// Creates a new random sampler with a fixed seed for reproducibility.
    ///
    /// Using the same seed will produce the same sequence of sampled values.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::with_seed(seed)),
            seed: Some(seed),
            tracker: SearchSpaceTracker::default(),
        }
    }

    /// Creates a sampler from its configuration.
    #[must_use]
    pub fn from_config(config: &RandomSamplerConfig) -> Self {
        config.seed.map_or_else(Self::new, Self::with_seed)
    }
}

impl Default for RandomSampler {
    fn default() -> Self {
        Self::new()
    }
}

fn pick(rng: &mut fastrand::Rng, values: &[ParameterValue]) -> Result<ParameterValue> {
    if values.is_empty() {
        return Err(Error::EmptyChoices);
    }
    Ok(values[rng.usize(0..values.len())].clone())
}

impl Sampler for RandomSampler {
    fn init(&mut self, study: &StudyInfo) -> Result<()> {
        if let Some(space) = &study.search_space {
            self.set_search_space(space.clone());
        }
        Ok(())
    }

    fn sync(&mut self, trials: &[TrialRecord]) -> Result<()> {
        self.tracker.sync(trials)
    }

    fn last_update_time(&self) -> Option<Timestamp> {
        self.tracker.last_update_time()
    }

    fn update_timestamp(&mut self, timestamp: Option<Timestamp>) {
        self.tracker.update_timestamp(timestamp);
    }

    fn set_search_space(&mut self, search_space: SearchSpace) {
        self.tracker = SearchSpaceTracker::new(search_space);
    }

    fn search_space(&self) -> &SearchSpace {
        self.tracker.current_search_space()
    }

    fn joint_sample(&self, fixed: &BTreeMap<String, Parameter>) -> Result<JointSample> {
        let mut out = JointSample::from_fixed(fixed);
        for (name, distribution) in self.tracker.current_search_space().iter() {
            if fixed.contains_key(name) {
                continue;
            }
            let value = self.sample(distribution)?;
            out.parameters.insert(
                name.clone(),
                Parameter::sampled(value, distribution.clone()),
            );
        }
        Ok(out)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn sample(&self, distribution: &Distribution) -> Result<ParameterValue> {
        let mut rng = self.rng.lock();

        match distribution {
            Distribution::Float(d) => {
                let value = if d.log_scale {
                    // Sample uniformly in log space
                    let log_value = rng_util::f64_range(&mut rng, d.low.ln(), d.high.ln());
                    log_value.exp().clamp(d.low, d.high)
                } else {
                    rng_util::f64_range(&mut rng, d.low, d.high)
                };
                Ok(ParameterValue::Double(value))
            }
            Distribution::Int(d) => {
                let value = if d.log_scale {
                    // Cover [low - 0.5, high + 0.5) so the end points keep their share.
                    let log_low = (d.low as f64 - 0.5).ln();
                    let log_high = (d.high as f64 + 0.5).ln();
                    let log_value = rng_util::f64_range(&mut rng, log_low, log_high);
                    (log_value.exp().round() as i64).clamp(d.low, d.high)
                } else {
                    rng.i64(d.low..=d.high)
                };
                Ok(ParameterValue::Int(value))
            }
            Distribution::Categorical(d) => pick(&mut rng, &d.choices),
            Distribution::Fixed(d) => pick(&mut rng, &d.values),
            Distribution::Unknown(d) => pick(&mut rng, &d.values),
        }
    }

    fn config(&self) -> SamplerConfig {
        SamplerConfig::Random(RandomSamplerConfig { seed: self.seed })
    }
}
