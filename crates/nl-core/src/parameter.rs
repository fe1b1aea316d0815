//! Named, typed, bounded parameters.
//!
//! Every tunable dial of a solver, model, tuner or splitter is declared as a
//! [`Parameter`]: a `(name, kind, bounds, value)` tuple whose value is
//! guaranteed to stay inside its declared bounds for the whole lifetime of
//! the owning component.

use crate::errors::{Error, Result};
use crate::{fail, Real};
use std::fmt;

/// Interval bounds with independently open or closed end points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds<T> {
    min: T,
    max: T,
    min_open: bool,
    max_open: bool,
}

impl<T: PartialOrd + Copy + fmt::Display> Bounds<T> {
    /// `min <= value <= max`.
    pub fn closed(min: T, max: T) -> Self {
        Self { min, max, min_open: false, max_open: false }
    }

    /// `min < value < max`.
    pub fn open(min: T, max: T) -> Self {
        Self { min, max, min_open: true, max_open: true }
    }

    /// `min < value <= max`.
    pub fn open_closed(min: T, max: T) -> Self {
        Self { min, max, min_open: true, max_open: false }
    }

    /// `min <= value < max`.
    pub fn closed_open(min: T, max: T) -> Self {
        Self { min, max, min_open: false, max_open: true }
    }

    /// Lower limit.
    pub fn min(&self) -> T {
        self.min
    }

    /// Upper limit.
    pub fn max(&self) -> T {
        self.max
    }

    /// Return `true` if `value` lies inside the bounds.
    pub fn contains(&self, value: T) -> bool {
        let lo_ok = if self.min_open { value > self.min } else { value >= self.min };
        let hi_ok = if self.max_open { value < self.max } else { value <= self.max };
        lo_ok && hi_ok
    }
}

impl<T: fmt::Display> fmt::Display for Bounds<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lo = if self.min_open { '(' } else { '[' };
        let hi = if self.max_open { ')' } else { ']' };
        write!(f, "{lo}{}, {}{hi}", self.min, self.max)
    }
}

/// The value stored by a [`Parameter`].
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// Signed integer.
    Int(i64),
    /// Floating point scalar.
    Float(Real),
    /// One of a fixed set of string choices.
    Enum(String),
    /// Ordered pair of integers.
    IntPair(i64, i64),
    /// Ordered pair of floating point scalars.
    FloatPair(Real, Real),
}

impl ParamValue {
    /// Stable tag used by the stream framing.
    pub fn kind_tag(&self) -> u8 {
        match self {
            ParamValue::Int(_) => 0,
            ParamValue::Float(_) => 1,
            ParamValue::Enum(_) => 2,
            ParamValue::IntPair(..) => 3,
            ParamValue::FloatPair(..) => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum ParamDomain {
    Int(Bounds<i64>),
    Float(Bounds<Real>),
    Enum(Vec<String>),
    IntPair(Bounds<i64>),
    FloatPair(Bounds<Real>),
}

/// A named, typed parameter with declared bounds.
///
/// The value is validated against the bounds on construction and on every
/// mutation, so a parameter can never hold an out-of-range value.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    value: ParamValue,
    domain: ParamDomain,
}

impl Parameter {
    /// Create an integer parameter.
    pub fn integer(name: &str, value: i64, bounds: Bounds<i64>) -> Result<Self> {
        let param = Self {
            name: name.to_string(),
            value: ParamValue::Int(value),
            domain: ParamDomain::Int(bounds),
        };
        param.validate(&param.value)?;
        Ok(param)
    }

    /// Create a floating point parameter.
    pub fn float(name: &str, value: Real, bounds: Bounds<Real>) -> Result<Self> {
        let param = Self {
            name: name.to_string(),
            value: ParamValue::Float(value),
            domain: ParamDomain::Float(bounds),
        };
        param.validate(&param.value)?;
        Ok(param)
    }

    /// Create an enumeration parameter with the given choices.
    pub fn enumeration(name: &str, value: &str, choices: &[&str]) -> Result<Self> {
        let param = Self {
            name: name.to_string(),
            value: ParamValue::Enum(value.to_string()),
            domain: ParamDomain::Enum(choices.iter().map(|c| c.to_string()).collect()),
        };
        param.validate(&param.value)?;
        Ok(param)
    }

    /// Create an ordered integer pair parameter.
    pub fn integer_pair(name: &str, value: (i64, i64), bounds: Bounds<i64>) -> Result<Self> {
        let param = Self {
            name: name.to_string(),
            value: ParamValue::IntPair(value.0, value.1),
            domain: ParamDomain::IntPair(bounds),
        };
        param.validate(&param.value)?;
        Ok(param)
    }

    /// Create an ordered floating point pair parameter.
    pub fn float_pair(name: &str, value: (Real, Real), bounds: Bounds<Real>) -> Result<Self> {
        let param = Self {
            name: name.to_string(),
            value: ParamValue::FloatPair(value.0, value.1),
            domain: ParamDomain::FloatPair(bounds),
        };
        param.validate(&param.value)?;
        Ok(param)
    }

    /// Parameter name (unique within the owning component).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current value.
    pub fn value(&self) -> &ParamValue {
        &self.value
    }

    /// Set a new value of the same kind, validated against the bounds.
    pub fn set(&mut self, value: ParamValue) -> Result<()> {
        self.validate(&value)?;
        self.value = value;
        Ok(())
    }

    /// Current value as an integer.
    pub fn as_int(&self) -> Result<i64> {
        match self.value {
            ParamValue::Int(v) => Ok(v),
            _ => Err(Error::InvalidArgument(format!("parameter '{}' is not an integer", self.name))),
        }
    }

    /// Current value as a non-negative size.
    pub fn as_size(&self) -> Result<usize> {
        let v = self.as_int()?;
        usize::try_from(v).map_err(|_| {
            Error::InvalidArgument(format!("parameter '{}' is negative ({v})", self.name))
        })
    }

    /// Current value as a floating point scalar.
    pub fn as_float(&self) -> Result<Real> {
        match self.value {
            ParamValue::Float(v) => Ok(v),
            _ => Err(Error::InvalidArgument(format!("parameter '{}' is not a float", self.name))),
        }
    }

    /// Current value as an enumeration choice.
    pub fn as_enum(&self) -> Result<&str> {
        match &self.value {
            ParamValue::Enum(v) => Ok(v.as_str()),
            _ => Err(Error::InvalidArgument(format!("parameter '{}' is not an enum", self.name))),
        }
    }

    /// Current value as an ordered integer pair.
    pub fn as_int_pair(&self) -> Result<(i64, i64)> {
        match self.value {
            ParamValue::IntPair(a, b) => Ok((a, b)),
            _ => Err(Error::InvalidArgument(format!(
                "parameter '{}' is not an integer pair",
                self.name
            ))),
        }
    }

    /// Current value as an ordered floating point pair.
    pub fn as_float_pair(&self) -> Result<(Real, Real)> {
        match self.value {
            ParamValue::FloatPair(a, b) => Ok((a, b)),
            _ => Err(Error::InvalidArgument(format!(
                "parameter '{}' is not a float pair",
                self.name
            ))),
        }
    }

    fn validate(&self, value: &ParamValue) -> Result<()> {
        let name = &self.name;
        match (&self.domain, value) {
            (ParamDomain::Int(bounds), ParamValue::Int(v)) => {
                if !bounds.contains(*v) {
                    fail!("parameter '{name}': value {v} outside {bounds}");
                }
            }
            (ParamDomain::Float(bounds), ParamValue::Float(v)) => {
                if !v.is_finite() || !bounds.contains(*v) {
                    fail!("parameter '{name}': value {v} outside {bounds}");
                }
            }
            (ParamDomain::Enum(choices), ParamValue::Enum(v)) => {
                if !choices.iter().any(|c| c == v) {
                    fail!("parameter '{name}': unknown choice '{v}' (available: {choices:?})");
                }
            }
            (ParamDomain::IntPair(bounds), ParamValue::IntPair(a, b)) => {
                if a > b || !bounds.contains(*a) || !bounds.contains(*b) {
                    fail!("parameter '{name}': pair ({a}, {b}) outside {bounds}");
                }
            }
            (ParamDomain::FloatPair(bounds), ParamValue::FloatPair(a, b)) => {
                if !a.is_finite() || !b.is_finite() || a > b || !bounds.contains(*a) || !bounds.contains(*b)
                {
                    fail!("parameter '{name}': pair ({a}, {b}) outside {bounds}");
                }
            }
            _ => fail!("parameter '{name}': value kind does not match the declared kind"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn bounds_open_closed() {
        let bounds = Bounds::open_closed(0.0, 1.0);
        assert!(!bounds.contains(0.0));
        assert!(bounds.contains(1e-8));
        assert!(bounds.contains(1.0));
        assert!(!bounds.contains(1.1));
    }

    #[test]
    fn float_parameter_rejects_out_of_range() {
        let mut param = Parameter::float("solver::c1", 1e-4, Bounds::open(0.0, 0.5)).unwrap();
        assert!(param.set(ParamValue::Float(0.4)).is_ok());
        assert!(param.set(ParamValue::Float(0.5)).is_err());
        assert!(param.set(ParamValue::Float(f64::NAN)).is_err());
        assert_eq!(param.as_float().unwrap(), 0.4);
    }

    #[test]
    fn enum_parameter() {
        let param = Parameter::enumeration("cgd::variant", "prp", &["hs", "fr", "prp"]).unwrap();
        assert_eq!(param.as_enum().unwrap(), "prp");
        assert!(Parameter::enumeration("cgd::variant", "xx", &["hs", "fr"]).is_err());
    }

    #[test]
    fn pair_parameter_keeps_order() {
        let param =
            Parameter::float_pair("bundle::miu0_range", (1e-4, 1e+4), Bounds::open(0.0, 1e+6));
        assert!(param.is_ok());
        let param =
            Parameter::float_pair("bundle::miu0_range", (1e+4, 1e-4), Bounds::open(0.0, 1e+6));
        assert!(param.is_err());
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let mut param = Parameter::integer("solver::max_evals", 100, Bounds::closed(1, 1000)).unwrap();
        assert!(param.set(ParamValue::Float(3.0)).is_err());
    }

    proptest! {
        #[test]
        fn set_never_stores_out_of_bounds(value in -10.0f64..10.0) {
            let mut param = Parameter::float("p", 0.5, Bounds::closed(0.0, 1.0)).unwrap();
            let _ = param.set(ParamValue::Float(value));
            let stored = param.as_float().unwrap();
            prop_assert!((0.0..=1.0).contains(&stored));
        }
    }
}
