//! Kernel Density Estimation for parameter distributions.
//!
//! This module provides the factorized Parzen estimator used by the TPE
//! sampler to model the good and bad regions of the search space. Each
//! parameter gets its own mixture with one component per trial:
//!
//! - [`TruncatedLogisticKernels`] for integer and float ranges
//! - [`AitchisonAitkenKernels`] for categorical choices
//!
//! [`ParzenEstimator`] combines the per-parameter mixtures, sharing one
//! component index across all parameters of a sample.

mod aitchison_aitken;
mod logistic;
mod parzen;

pub use aitchison_aitken::AitchisonAitkenKernels;
pub use logistic::TruncatedLogisticKernels;
pub use parzen::ParzenEstimator;
use rand::{Rng, RngCore};

use crate::param::ParameterValue;

/// Floor applied to every probability, scale and normalizer before a log or division.
pub(crate) const EPS: f64 = 1e-6;

/// A univariate mixture with one component per observation.
pub trait MixtureKernel: Send + Sync {
    /// Number of mixture components.
    fn n_components(&self) -> usize;

    /// Draws one value from `component`.
    fn sample(&self, component: usize, rng: &mut dyn RngCore) -> ParameterValue;

    /// Log density (or log mass) of `value` under every component.
    fn log_pdf(&self, value: &ParameterValue) -> Vec<f64>;
}

/// A mixture over a finite, ordered set of choices.
pub trait CategoricalMixtureKernel: MixtureKernel {
    /// The choices, in index order.
    fn choices(&self) -> &[ParameterValue];

    /// Probability of each choice under `component`.
    fn probabilities(&self, component: usize) -> Vec<f64>;
}

/// Index drawn from unnormalized, non-negative `weights`.
pub(crate) fn choose_weighted(weights: &[f64], rng: &mut dyn RngCore) -> usize {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return rng.random_range(0..weights.len().max(1));
    }
    let threshold = rng.random::<f64>() * total;
    let mut cumulative = 0.0;
    for (i, &w) in weights.iter().enumerate() {
        cumulative += w;
        if threshold < cumulative {
            return i;
        }
    }
    weights.len() - 1
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// `ln(1 + e^z)` without overflow.
pub(crate) fn softplus(z: f64) -> f64 {
    z.max(0.0) + (-z.abs()).exp().ln_1p()
}

pub(crate) fn logsumexp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}
