//! Truncated logistic mixture for numeric parameters.

use rand::{Rng, RngCore};

use super::{EPS, MixtureKernel, sigmoid, softplus};
use crate::distribution::Distribution;
use crate::error::{Error, Result};
use crate::param::ParameterValue;

#[derive(Clone, Copy, Debug, PartialEq)]
enum Kind {
    Int { low: i64, high: i64 },
    Float { low: f64, high: f64 },
}

/// One truncated logistic component per observation over a numeric range.
///
/// Integer ranges are widened by ±0.5 before truncation and values are
/// scored by the probability mass of their unit cell, so `exp(log_pdf)`
/// never exceeds 1 for them. Log-scale ranges live in log space; float
/// densities include the Jacobian back to the original scale.
#[derive(Clone, Debug)]
pub struct TruncatedLogisticKernels {
    kind: Kind,
    log_scale: bool,
    /// Truncation bounds in internal space.
    low: f64,
    high: f64,
    locations: Vec<f64>,
    scales: Vec<f64>,
}

impl TruncatedLogisticKernels {
    /// Fits one component per entry of `observations`.
    ///
    /// `None` entries (the trial never set this parameter) become wide,
    /// near-uniform components centred on the midpoint. Observed entries use
    /// the bandwidth `((high - low) / 2) * n_observed^(-1 / (n_params + 4))`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if `distribution` is not numeric.
    #[allow(clippy::cast_precision_loss)]
    pub fn new(
        distribution: &Distribution,
        observations: &[Option<f64>],
        n_params: usize,
    ) -> Result<Self> {
        let (kind, log_scale) = match distribution {
            Distribution::Int(d) => (
                Kind::Int {
                    low: d.low,
                    high: d.high,
                },
                d.log_scale,
            ),
            Distribution::Float(d) => (
                Kind::Float {
                    low: d.low,
                    high: d.high,
                },
                d.log_scale,
            ),
            _ => return Err(Error::Internal("logistic kernels need a numeric distribution")),
        };
        let (raw_low, raw_high) = match kind {
            Kind::Int { low, high } => (low as f64 - 0.5, high as f64 + 0.5),
            Kind::Float { low, high } => (low, high),
        };
        let mut this = Self {
            kind,
            log_scale,
            low: 0.0,
            high: 0.0,
            locations: Vec::with_capacity(observations.len()),
            scales: Vec::with_capacity(observations.len()),
        };
        this.low = this.to_internal(raw_low);
        this.high = this.to_internal(raw_high);

        let width = this.high - this.low;
        let n_observed = observations.iter().filter(|o| o.is_some()).count().max(1);
        let exponent = -1.0 / (n_params as f64 + 4.0);
        let observed_scale = (width / 2.0 * (n_observed as f64).powf(exponent)).max(EPS);
        let unobserved_scale = (width * 100.0).max(EPS);
        let midpoint = (this.low + this.high) / 2.0;

        for observation in observations {
            match observation {
                Some(x) => {
                    let loc = this.to_internal(*x).clamp(this.low, this.high);
                    this.locations.push(loc);
                    this.scales.push(observed_scale);
                }
                None => {
                    this.locations.push(midpoint);
                    this.scales.push(unobserved_scale);
                }
            }
        }
        Ok(this)
    }

    fn to_internal(&self, x: f64) -> f64 {
        if self.log_scale { x.max(EPS).ln() } else { x }
    }

    fn from_internal(&self, x: f64) -> f64 {
        if self.log_scale { x.exp() } else { x }
    }

    /// Probability mass of `(a, b)` under a logistic with the given location and scale.
    fn mass(loc: f64, scale: f64, a: f64, b: f64) -> f64 {
        let za = (a - loc) / scale;
        let zb = (b - loc) / scale;
        // Subtract in whichever tail keeps precision.
        if za > 0.0 {
            sigmoid(-za) - sigmoid(-zb)
        } else {
            sigmoid(zb) - sigmoid(za)
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn value_to_f64(&self, value: &ParameterValue) -> Option<f64> {
        match (self.kind, value) {
            (Kind::Int { .. }, ParameterValue::Int(v)) => Some(*v as f64),
            (Kind::Float { .. }, ParameterValue::Double(v)) => Some(*v),
            _ => None,
        }
    }

    /// Log probability of `x` (original scale) under component `i`.
    fn component_log_pdf(&self, i: usize, x: f64) -> f64 {
        let loc = self.locations[i];
        let scale = self.scales[i];
        let normalizer = Self::mass(loc, scale, self.low, self.high).max(EPS);
        match self.kind {
            Kind::Int { .. } => {
                let a = self.to_internal(x - 0.5).max(self.low);
                let b = self.to_internal(x + 0.5).min(self.high);
                if b <= a {
                    return EPS.ln();
                }
                let p = (Self::mass(loc, scale, a, b) / normalizer).clamp(EPS, 1.0);
                p.ln()
            }
            Kind::Float { .. } => {
                let xi = self.to_internal(x);
                if xi < self.low || xi > self.high {
                    return EPS.ln();
                }
                let z = (xi - loc) / scale;
                let jacobian = if self.log_scale { x.max(EPS).ln() } else { 0.0 };
                -softplus(-z) - softplus(z) - scale.ln() - normalizer.ln() - jacobian
            }
        }
    }
}

impl MixtureKernel for TruncatedLogisticKernels {
    fn n_components(&self) -> usize {
        self.locations.len()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn sample(&self, component: usize, rng: &mut dyn RngCore) -> ParameterValue {
        let loc = self.locations[component];
        let scale = self.scales[component];
        let za = (self.low - loc) / scale;
        let zb = (self.high - loc) / scale;
        let u = rng.random::<f64>();

        // Inverse CDF restricted to [low, high], working in the lighter tail.
        let internal = if za > 0.0 {
            let hi = sigmoid(-za);
            let lo = sigmoid(-zb);
            let q = lo + u * (hi - lo);
            loc - scale * (q.ln() - (-q).ln_1p())
        } else {
            let lo = sigmoid(za);
            let hi = sigmoid(zb);
            let p = lo + u * (hi - lo);
            loc + scale * (p.ln() - (-p).ln_1p())
        };
        let internal = if internal.is_nan() {
            loc
        } else {
            internal.clamp(self.low, self.high)
        };
        let x = self.from_internal(internal);

        match self.kind {
            Kind::Int { low, high } => ParameterValue::Int((x.round() as i64).clamp(low, high)),
            Kind::Float { low, high } => ParameterValue::Double(x.clamp(low, high)),
        }
    }

    fn log_pdf(&self, value: &ParameterValue) -> Vec<f64> {
        let Some(x) = self.value_to_f64(value) else {
            return vec![EPS.ln(); self.n_components()];
        };
        (0..self.n_components())
            .map(|i| self.component_log_pdf(i, x))
            .collect()
    }
}
