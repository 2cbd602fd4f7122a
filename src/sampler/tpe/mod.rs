//! Tree-Parzen Estimator (TPE) sampler for Bayesian optimization.
//!
//! TPE models P(x|y) instead of P(y|x). It keeps the finished trials sorted
//! by quality, splits them at the midpoint into a "good" and a "bad" half,
//! fits a Parzen estimator to each, and proposes the candidate maximizing
//! the l(x)/g(x) ratio, an approximation of Expected Improvement.
//!
//! | Type | Role |
//! |------|------|
//! | [`TpeSampler`] | The sampler itself, configured through [`TpeSamplerBuilder`]. |
//! | [`SortedTrials`] | Incrementally merged history, best first. |
//! | [`TrialQualityFilter`] | Which finished trials enter the history. |
//!
//! # Examples
//!
//! ```
//! use optsync::sampler::SamplerConfig;
//! use optsync::sampler::TpeSamplerConfig;
//!
//! let config = SamplerConfig::Tpe(TpeSamplerConfig {
//!     n_startup_trials: 5,
//!     seed: Some(42),
//!     ..TpeSamplerConfig::default()
//! });
//! let sampler = config.build().unwrap();
//! assert_eq!(sampler.config(), config);
//! ```

mod sampler;
mod sorted_trials;

pub use sampler::{N_TRIALS_ATTR, TpeSampler, TpeSamplerBuilder};
pub use sorted_trials::{SortedTrials, TrialQualityFilter};
