//! Parameter value storage types.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A sampled or fixed parameter value.
///
/// Equality is structural: `Int(1)` and `Double(1.0)` are different values.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ParameterValue {
    /// An integer value.
    Int(i64),
    /// A floating-point value.
    Double(f64),
    /// A string value, typically a categorical choice.
    String(String),
}

impl ParameterValue {
    /// Returns the integer payload, if this is an `Int`.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the float payload, if this is a `Double`.
    #[must_use]
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the string payload, if this is a `String`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Numeric view used by the density estimators.
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Double(v) => Some(*v),
            Self::String(_) => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for ParameterValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_structural() {
        assert_eq!(ParameterValue::Int(1), ParameterValue::from(1_i64));
        assert_ne!(ParameterValue::Int(1), ParameterValue::Double(1.0));
        assert_eq!(ParameterValue::from("a"), ParameterValue::String("a".into()));
    }

    #[test]
    fn accessors() {
        assert_eq!(ParameterValue::Int(3).as_int(), Some(3));
        assert_eq!(ParameterValue::Int(3).as_double(), None);
        assert_eq!(ParameterValue::Double(0.5).as_f64(), Some(0.5));
        assert_eq!(ParameterValue::from("x").as_str(), Some("x"));
        assert_eq!(ParameterValue::from("x").as_f64(), None);
    }
}
