//! Parameter distribution types and the merge rules used by search-space inference.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::param::ParameterValue;

/// Distribution for integer parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IntDistribution {
    /// Lower bound (inclusive).
    pub low: i64,
    /// Upper bound (inclusive).
    pub high: i64,
    /// Whether to sample in log space.
    pub log_scale: bool,
}

/// Distribution for floating-point parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FloatDistribution {
    /// Lower bound (inclusive).
    pub low: f64,
    /// Upper bound (inclusive).
    pub high: f64,
    /// Whether to sample in log space.
    pub log_scale: bool,
}

/// Distribution over an ordered list of choices.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CategoricalDistribution {
    /// The available choices.
    pub choices: Vec<ParameterValue>,
}

/// The set of values a parameter was explicitly fixed to.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FixedDistribution {
    /// Every value observed so far.
    pub values: Vec<ParameterValue>,
}

/// Values recorded for a parameter whose distribution was never declared.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UnknownDistribution {
    /// Every value observed so far.
    pub values: Vec<ParameterValue>,
}

/// Enum wrapping all parameter distribution types.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Distribution {
    /// An integer range.
    Int(IntDistribution),
    /// A floating-point range.
    Float(FloatDistribution),
    /// A categorical choice.
    Categorical(CategoricalDistribution),
    /// Externally fixed values.
    Fixed(FixedDistribution),
    /// Values without a declared distribution.
    Unknown(UnknownDistribution),
}

impl Distribution {
    /// Creates an integer distribution over `[low, high]`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBounds`] if `low > high` and
    /// [`Error::InvalidLogBounds`] if `log_scale` is set and `low < 1`.
    #[allow(clippy::cast_precision_loss)]
    pub fn int(low: i64, high: i64, log_scale: bool) -> Result<Self> {
        if low > high {
            return Err(Error::InvalidBounds {
                low: low as f64,
                high: high as f64,
            });
        }
        if log_scale && low < 1 {
            return Err(Error::InvalidLogBounds);
        }
        Ok(Self::Int(IntDistribution {
            low,
            high,
            log_scale,
        }))
    }

    /// Creates a floating-point distribution over `[low, high]`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBounds`] if the bounds are not finite or
    /// `low > high`, and [`Error::InvalidLogBounds`] if `log_scale` is set
    /// and `low <= 0`.
    pub fn float(low: f64, high: f64, log_scale: bool) -> Result<Self> {
        if !low.is_finite() || !high.is_finite() || low > high {
            return Err(Error::InvalidBounds { low, high });
        }
        if log_scale && low <= 0.0 {
            return Err(Error::InvalidLogBounds);
        }
        Ok(Self::Float(FloatDistribution {
            low,
            high,
            log_scale,
        }))
    }

    /// Creates a categorical distribution.
    ///
    /// Duplicate choices are dropped, keeping the first occurrence.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyChoices`] if `choices` is empty.
    pub fn categorical<I, T>(choices: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<ParameterValue>,
    {
        let choices = dedup(choices.into_iter().map(Into::into));
        if choices.is_empty() {
            return Err(Error::EmptyChoices);
        }
        Ok(Self::Categorical(CategoricalDistribution { choices }))
    }

    /// A fixed distribution holding a single value.
    #[must_use]
    pub fn fixed(value: ParameterValue) -> Self {
        Self::Fixed(FixedDistribution {
            values: vec![value],
        })
    }

    /// An unknown distribution holding a single observed value.
    #[must_use]
    pub fn unknown(value: ParameterValue) -> Self {
        Self::Unknown(UnknownDistribution {
            values: vec![value],
        })
    }

    /// Whether `value` lies in this distribution.
    ///
    /// Numeric kinds check both the value's variant and its range.
    #[must_use]
    pub fn contains(&self, value: &ParameterValue) -> bool {
        match (self, value) {
            (Self::Int(d), ParameterValue::Int(v)) => d.low <= *v && *v <= d.high,
            (Self::Float(d), ParameterValue::Double(v)) => d.low <= *v && *v <= d.high,
            (Self::Int(_) | Self::Float(_), _) => false,
            (Self::Categorical(d), v) => d.choices.contains(v),
            (Self::Fixed(FixedDistribution { values }), v)
            | (Self::Unknown(UnknownDistribution { values }), v) => values.contains(v),
        }
    }

    /// Whether two distributions describe the same space.
    ///
    /// Value-set kinds compare as sets, so choice order does not matter.
    #[must_use]
    pub fn is_identical(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Categorical(a), Self::Categorical(b)) => same_values(&a.choices, &b.choices),
            (Self::Fixed(a), Self::Fixed(b)) => same_values(&a.values, &b.values),
            (Self::Unknown(a), Self::Unknown(b)) => same_values(&a.values, &b.values),
            _ => false,
        }
    }

    /// Merges two observations of the distribution recorded under `name`.
    ///
    /// - two fixed distributions merge into the union of their values;
    /// - an unknown distribution merged with a fixed or unknown one yields
    ///   an unknown distribution over the union;
    /// - a fixed or unknown distribution whose values all lie in a concrete
    ///   distribution is absorbed by the concrete side;
    /// - two concrete distributions must be identical.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompatibleSearchSpace`] when none of the rules apply.
    pub fn merge(&self, other: &Self, name: &str) -> Result<Self> {
        match (self, other) {
            (Self::Fixed(a), Self::Fixed(b)) => Ok(Self::Fixed(FixedDistribution {
                values: union(&a.values, &b.values),
            })),
            (Self::Unknown(a), Self::Unknown(b)) => Ok(Self::Unknown(UnknownDistribution {
                values: union(&a.values, &b.values),
            })),
            (Self::Unknown(UnknownDistribution { values: a }), Self::Fixed(FixedDistribution { values: b }))
            | (Self::Fixed(FixedDistribution { values: a }), Self::Unknown(UnknownDistribution { values: b })) => {
                Ok(Self::Unknown(UnknownDistribution {
                    values: union(a, b),
                }))
            }
            (Self::Fixed(FixedDistribution { values }), concrete)
            | (Self::Unknown(UnknownDistribution { values }), concrete)
            | (concrete, Self::Fixed(FixedDistribution { values }))
            | (concrete, Self::Unknown(UnknownDistribution { values })) => {
                match values.iter().find(|v| !concrete.contains(v)) {
                    None => Ok(concrete.clone()),
                    Some(outside) => Err(Error::IncompatibleSearchSpace {
                        name: name.to_owned(),
                        reason: format!("value {outside} is outside {}", concrete.describe()),
                    }),
                }
            }
            (a, b) if a.is_identical(b) => Ok(a.clone()),
            (a, b) => Err(Error::IncompatibleSearchSpace {
                name: name.to_owned(),
                reason: format!("{} conflicts with {}", a.describe(), b.describe()),
            }),
        }
    }

    /// Whether this distribution only records observed values.
    #[must_use]
    pub fn is_value_set(&self) -> bool {
        matches!(self, Self::Fixed(_) | Self::Unknown(_))
    }

    fn describe(&self) -> String {
        match self {
            Self::Int(d) => format!("int[{}, {}] (log={})", d.low, d.high, d.log_scale),
            Self::Float(d) => format!("float[{}, {}] (log={})", d.low, d.high, d.log_scale),
            Self::Categorical(d) => format!("categorical with {} choices", d.choices.len()),
            Self::Fixed(d) => format!("fixed with {} values", d.values.len()),
            Self::Unknown(d) => format!("unknown with {} values", d.values.len()),
        }
    }
}

/// Order-insensitive identity check; see [`Distribution::is_identical`].
#[must_use]
pub fn are_identical(a: &Distribution, b: &Distribution) -> bool {
    a.is_identical(b)
}

fn same_values(a: &[ParameterValue], b: &[ParameterValue]) -> bool {
    a.iter().all(|v| b.contains(v)) && b.iter().all(|v| a.contains(v))
}

fn union(a: &[ParameterValue], b: &[ParameterValue]) -> Vec<ParameterValue> {
    dedup(a.iter().chain(b).cloned())
}

fn dedup(values: impl Iterator<Item = ParameterValue>) -> Vec<ParameterValue> {
    let mut out: Vec<ParameterValue> = Vec::new();
    for v in values {
        if !out.contains(&v) {
            out.push(v);
        }
    }
    out
}
