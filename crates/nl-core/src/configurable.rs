//! Ordered parameter sets.
//!
//! Every solver, model, tuner and splitter embeds a [`Configurable`]: the
//! ordered collection of its registered [`Parameter`]s, addressable by name.

use crate::errors::{Error, Result};
use crate::parameter::{ParamValue, Parameter};
use crate::{fail, Real};

/// An ordered set of named parameters with unique names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Configurable {
    params: Vec<Parameter>,
}

impl Configurable {
    /// Create an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new parameter; names must be unique within the set.
    pub fn register(&mut self, param: Parameter) -> Result<()> {
        if self.params.iter().any(|p| p.name() == param.name()) {
            fail!("duplicate parameter '{}'", param.name());
        }
        self.params.push(param);
        Ok(())
    }

    /// Number of registered parameters.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Return `true` if no parameter is registered.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Iterate over the parameters in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    /// Look up a parameter by name.
    pub fn get(&self, name: &str) -> Result<&Parameter> {
        self.params
            .iter()
            .find(|p| p.name() == name)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown parameter '{name}'")))
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut Parameter> {
        self.params
            .iter_mut()
            .find(|p| p.name() == name)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown parameter '{name}'")))
    }

    /// Set a parameter value, validated against the declared bounds.
    pub fn set(&mut self, name: &str, value: ParamValue) -> Result<()> {
        self.get_mut(name)?.set(value)
    }

    /// Set an integer parameter.
    pub fn set_int(&mut self, name: &str, value: i64) -> Result<()> {
        self.set(name, ParamValue::Int(value))
    }

    /// Set a floating point parameter.
    pub fn set_float(&mut self, name: &str, value: Real) -> Result<()> {
        self.set(name, ParamValue::Float(value))
    }

    /// Set an enumeration parameter.
    pub fn set_enum(&mut self, name: &str, value: &str) -> Result<()> {
        self.set(name, ParamValue::Enum(value.to_string()))
    }

    /// Set a floating point pair parameter.
    pub fn set_float_pair(&mut self, name: &str, value: (Real, Real)) -> Result<()> {
        self.set(name, ParamValue::FloatPair(value.0, value.1))
    }

    /// Integer value of the named parameter.
    pub fn int(&self, name: &str) -> Result<i64> {
        self.get(name)?.as_int()
    }

    /// Non-negative size value of the named parameter.
    pub fn size(&self, name: &str) -> Result<usize> {
        self.get(name)?.as_size()
    }

    /// Floating point value of the named parameter.
    pub fn float(&self, name: &str) -> Result<Real> {
        self.get(name)?.as_float()
    }

    /// Enumeration choice of the named parameter.
    pub fn enumeration(&self, name: &str) -> Result<&str> {
        self.get(name)?.as_enum()
    }

    /// Ordered integer pair value of the named parameter.
    pub fn int_pair(&self, name: &str) -> Result<(i64, i64)> {
        self.get(name)?.as_int_pair()
    }

    /// Ordered floating point pair value of the named parameter.
    pub fn float_pair(&self, name: &str) -> Result<(Real, Real)> {
        self.get(name)?.as_float_pair()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::Bounds;

    fn make() -> Configurable {
        let mut config = Configurable::new();
        config
            .register(Parameter::integer("solver::max_evals", 1000, Bounds::closed(10, 1_000_000)).unwrap())
            .unwrap();
        config
            .register(Parameter::float("solver::epsilon", 1e-8, Bounds::open(0.0, 1.0)).unwrap())
            .unwrap();
        config
    }

    #[test]
    fn register_and_lookup() {
        let config = make();
        assert_eq!(config.len(), 2);
        assert_eq!(config.int("solver::max_evals").unwrap(), 1000);
        assert_eq!(config.float("solver::epsilon").unwrap(), 1e-8);
        assert!(config.get("solver::nope").is_err());
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut config = make();
        let dup = Parameter::integer("solver::max_evals", 10, Bounds::closed(10, 100)).unwrap();
        assert!(config.register(dup).is_err());
    }

    #[test]
    fn set_checks_bounds() {
        let mut config = make();
        assert!(config.set_float("solver::epsilon", 1e-6).is_ok());
        assert!(config.set_float("solver::epsilon", 2.0).is_err());
        assert_eq!(config.float("solver::epsilon").unwrap(), 1e-6);
    }
}
