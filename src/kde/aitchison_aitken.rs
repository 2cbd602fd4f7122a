//! Aitchison–Aitken kernel for categorical parameters.

use rand::RngCore;

use super::{CategoricalMixtureKernel, EPS, MixtureKernel, choose_weighted};
use crate::error::{Error, Result};
use crate::param::ParameterValue;

/// One Aitchison–Aitken component per observation over a fixed set of choices.
///
/// A component centred on choice `c` puts `1 - λ` on `c` and spreads `λ`
/// evenly across the other `k - 1` choices, with
/// `λ = ((k - 1) / k) * n_observed^(-1 / (n_params + 4))`.
/// Components for trials that never set the parameter are uniform.
#[derive(Clone, Debug)]
pub struct AitchisonAitkenKernels {
    choices: Vec<ParameterValue>,
    /// Centre choice per component; `None` for unobserved.
    centres: Vec<Option<usize>>,
    lambda: f64,
}

impl AitchisonAitkenKernels {
    /// Fits one component per entry of `observations`.
    ///
    /// Observations that are not among `choices` count as unobserved.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyChoices`] if `choices` is empty.
    #[allow(clippy::cast_precision_loss)]
    pub fn new(
        choices: &[ParameterValue],
        observations: &[Option<&ParameterValue>],
        n_params: usize,
    ) -> Result<Self> {
        if choices.is_empty() {
            return Err(Error::EmptyChoices);
        }
        let centres: Vec<Option<usize>> = observations
            .iter()
            .map(|o| o.and_then(|v| choices.iter().position(|c| c == v)))
            .collect();
        let k = choices.len() as f64;
        let n_observed = centres.iter().filter(|c| c.is_some()).count().max(1) as f64;
        let max_lambda = if k > 1.0 { (k - 1.0) / k } else { 0.0 };
        let lambda = (max_lambda * n_observed.powf(-1.0 / (n_params as f64 + 4.0)))
            .clamp(0.0, max_lambda);
        Ok(Self {
            choices: choices.to_vec(),
            centres,
            lambda,
        })
    }

    /// The smoothing weight moved off the centre choice.
    #[must_use]
    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    #[allow(clippy::cast_precision_loss)]
    fn probability(&self, component: usize, choice: usize) -> f64 {
        let k = self.choices.len();
        match self.centres[component] {
            None => 1.0 / k as f64,
            Some(_) if k == 1 => 1.0,
            Some(c) if c == choice => 1.0 - self.lambda,
            Some(_) => self.lambda / (k - 1) as f64,
        }
    }
}

impl MixtureKernel for AitchisonAitkenKernels {
    fn n_components(&self) -> usize {
        self.centres.len()
    }

    fn sample(&self, component: usize, rng: &mut dyn RngCore) -> ParameterValue {
        let probs = self.probabilities(component);
        self.choices[choose_weighted(&probs, rng)].clone()
    }

    fn log_pdf(&self, value: &ParameterValue) -> Vec<f64> {
        let Some(choice) = self.choices.iter().position(|c| c == value) else {
            return vec![EPS.ln(); self.n_components()];
        };
        (0..self.n_components())
            .map(|i| self.probability(i, choice).max(EPS).ln())
            .collect()
    }
}

impl CategoricalMixtureKernel for AitchisonAitkenKernels {
    fn choices(&self) -> &[ParameterValue] {
        &self.choices
    }

    fn probabilities(&self, component: usize) -> Vec<f64> {
        (0..self.choices.len())
            .map(|c| self.probability(component, c))
            .collect()
    }
}
