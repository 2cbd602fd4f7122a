use std::collections::BTreeMap;

use rand::RngCore;

use super::{
    AitchisonAitkenKernels, MixtureKernel, TruncatedLogisticKernels, choose_weighted, logsumexp,
};
use crate::distribution::Distribution;
use crate::error::{Error, Result};
use crate::param::ParameterValue;
use crate::record::TrialRecord;
use crate::search_space::SearchSpace;

/// A factorized Parzen estimator over a search space.
///
/// Each trial contributes one mixture component; inside a component the
/// parameters are independent. Fixed and unknown distributions are not
/// modeled.
pub struct ParzenEstimator {
    kernels: BTreeMap<String, Box<dyn MixtureKernel>>,
    weights: Vec<f64>,
    log_weights: Vec<f64>,
}

impl core::fmt::Debug for ParzenEstimator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ParzenEstimator")
            .field("parameters", &self.kernels.keys().collect::<Vec<_>>())
            .field("n_components", &self.weights.len())
            .finish()
    }
}

impl ParzenEstimator {
    /// Fits an estimator with uniform component weights.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Uninitialized`] if `trials` is empty.
    #[allow(clippy::cast_precision_loss)]
    pub fn new(search_space: &SearchSpace, trials: &[&TrialRecord]) -> Result<Self> {
        let n = trials.len();
        Self::with_weights(search_space, trials, vec![1.0 / n.max(1) as f64; n])
    }

    /// Fits an estimator with caller-supplied component weights.
    ///
    /// Weights are normalized; they must be non-negative with a positive sum.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Uninitialized`] if `trials` is empty and
    /// [`Error::Internal`] if `weights` does not match `trials`.
    pub fn with_weights(
        search_space: &SearchSpace,
        trials: &[&TrialRecord],
        weights: Vec<f64>,
    ) -> Result<Self> {
        if trials.is_empty() {
            return Err(Error::Uninitialized("parzen estimator needs at least one trial"));
        }
        if weights.len() != trials.len() {
            return Err(Error::Internal("one weight per trial is required"));
        }
        let total: f64 = weights.iter().sum();
        if weights.iter().any(|w| *w < 0.0 || !w.is_finite()) || total <= 0.0 {
            return Err(Error::Internal("weights must be non-negative with a positive sum"));
        }
        let weights: Vec<f64> = weights.iter().map(|w| w / total).collect();
        let log_weights = weights.iter().map(|w| w.max(super::EPS).ln()).collect();

        let modeled: Vec<(&String, &Distribution)> = search_space
            .iter()
            .filter(|(_, d)| !d.is_value_set())
            .collect();
        let n_params = modeled.len();

        let mut kernels: BTreeMap<String, Box<dyn MixtureKernel>> = BTreeMap::new();
        for (name, distribution) in modeled {
            let observed: Vec<Option<&ParameterValue>> = trials
                .iter()
                .map(|t| t.value(name).filter(|v| distribution.contains(v)))
                .collect();
            let kernel: Box<dyn MixtureKernel> = match distribution {
                Distribution::Categorical(d) => Box::new(AitchisonAitkenKernels::new(
                    &d.choices, &observed, n_params,
                )?),
                _ => {
                    let numeric: Vec<Option<f64>> = observed
                        .iter()
                        .map(|v| v.and_then(ParameterValue::as_f64))
                        .collect();
                    Box::new(TruncatedLogisticKernels::new(
                        distribution,
                        &numeric,
                        n_params,
                    )?)
                }
            };
            kernels.insert(name.clone(), kernel);
        }

        Ok(Self {
            kernels,
            weights,
            log_weights,
        })
    }

    /// Names of the modeled parameters.
    pub fn parameters(&self) -> impl Iterator<Item = &String> {
        self.kernels.keys()
    }

    /// Draws `k` joint samples.
    ///
    /// Each sample picks one component by weight and draws every parameter
    /// from it.
    pub fn sample(&self, k: usize, rng: &mut dyn RngCore) -> Vec<BTreeMap<String, ParameterValue>> {
        (0..k)
            .map(|_| {
                let component = choose_weighted(&self.weights, rng);
                self.kernels
                    .iter()
                    .map(|(name, kernel)| (name.clone(), kernel.sample(component, rng)))
                    .collect()
            })
            .collect()
    }

    /// Joint log density of `sample` over the modeled parameters.
    ///
    /// Parameters missing from `sample` are marginalized out.
    pub fn log_pdf(&self, sample: &BTreeMap<String, ParameterValue>) -> f64 {
        let mut per_component = self.log_weights.clone();
        for (name, kernel) in &self.kernels {
            let Some(value) = sample.get(name) else {
                continue;
            };
            for (acc, lp) in per_component.iter_mut().zip(kernel.log_pdf(value)) {
                *acc += lp;
            }
        }
        logsumexp(&per_component)
    }
}
