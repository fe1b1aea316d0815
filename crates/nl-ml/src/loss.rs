//! Pointwise losses `ℓ(output, target)`.
//!
//! Regression losses compare the prediction to the target directly;
//! classification losses assume `±1` targets and penalize the margin
//! `target · output`.

use nl_core::{Factory, Real};
use std::sync::OnceLock;

/// A pointwise loss with value and derivative wrt the output.
pub trait Loss: Send + Sync {
    /// Stable factory id.
    fn id(&self) -> &str;

    /// Clone into a boxed trait object.
    fn clone_box(&self) -> Box<dyn Loss>;

    /// Loss value.
    fn value(&self, output: Real, target: Real) -> Real;

    /// Loss value and derivative wrt the output.
    fn vgrad(&self, output: Real, target: Real) -> (Real, Real);

    /// Return `true` when the derivative is defined everywhere.
    fn smooth(&self) -> bool;

    /// The error reported by model evaluation (absolute deviation for
    /// regression, margin violation for classification).
    fn error(&self, output: Real, target: Real) -> Real {
        (output - target).abs()
    }
}

impl Clone for Box<dyn Loss> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// The process-wide loss registry.
pub fn losses() -> &'static Factory<dyn Loss> {
    static FACTORY: OnceLock<Factory<dyn Loss>> = OnceLock::new();
    FACTORY.get_or_init(|| {
        let mut factory: Factory<dyn Loss> = Factory::new();
        factory.add("mse", "squared error (regression)", || Box::new(Mse));
        factory.add("mae", "absolute error (regression)", || Box::new(Mae));
        factory.add("cauchy", "Cauchy robust error (regression)", || Box::new(Cauchy));
        factory.add("hinge", "hinge margin loss (classification)", || Box::new(Hinge));
        factory.add("squared-hinge", "squared hinge margin loss (classification)", || {
            Box::new(SquaredHinge)
        });
        factory.add("logistic", "logistic margin loss (classification)", || Box::new(Logistic));
        factory
    })
}

/// `½(output − target)²`.
#[derive(Debug, Clone, Copy)]
pub struct Mse;

impl Loss for Mse {
    fn id(&self) -> &str {
        "mse"
    }

    fn clone_box(&self) -> Box<dyn Loss> {
        Box::new(*self)
    }

    fn value(&self, output: Real, target: Real) -> Real {
        0.5 * (output - target) * (output - target)
    }

    fn vgrad(&self, output: Real, target: Real) -> (Real, Real) {
        (self.value(output, target), output - target)
    }

    fn smooth(&self) -> bool {
        true
    }
}

/// `|output − target|`.
#[derive(Debug, Clone, Copy)]
pub struct Mae;

impl Loss for Mae {
    fn id(&self) -> &str {
        "mae"
    }

    fn clone_box(&self) -> Box<dyn Loss> {
        Box::new(*self)
    }

    fn value(&self, output: Real, target: Real) -> Real {
        (output - target).abs()
    }

    fn vgrad(&self, output: Real, target: Real) -> (Real, Real) {
        let delta = output - target;
        (delta.abs(), if delta == 0.0 { 0.0 } else { delta.signum() })
    }

    fn smooth(&self) -> bool {
        false
    }
}

/// `log(1 + (output − target)²)` — robust to outliers.
#[derive(Debug, Clone, Copy)]
pub struct Cauchy;

impl Loss for Cauchy {
    fn id(&self) -> &str {
        "cauchy"
    }

    fn clone_box(&self) -> Box<dyn Loss> {
        Box::new(*self)
    }

    fn value(&self, output: Real, target: Real) -> Real {
        let delta = output - target;
        (1.0 + delta * delta).ln()
    }

    fn vgrad(&self, output: Real, target: Real) -> (Real, Real) {
        let delta = output - target;
        ((1.0 + delta * delta).ln(), 2.0 * delta / (1.0 + delta * delta))
    }

    fn smooth(&self) -> bool {
        true
    }
}

/// `max(0, 1 − target·output)` with `±1` targets.
#[derive(Debug, Clone, Copy)]
pub struct Hinge;

impl Loss for Hinge {
    fn id(&self) -> &str {
        "hinge"
    }

    fn clone_box(&self) -> Box<dyn Loss> {
        Box::new(*self)
    }

    fn value(&self, output: Real, target: Real) -> Real {
        (1.0 - target * output).max(0.0)
    }

    fn vgrad(&self, output: Real, target: Real) -> (Real, Real) {
        let margin = 1.0 - target * output;
        if margin > 0.0 {
            (margin, -target)
        } else {
            (0.0, 0.0)
        }
    }

    fn smooth(&self) -> bool {
        false
    }

    fn error(&self, output: Real, target: Real) -> Real {
        if target * output > 0.0 {
            0.0
        } else {
            1.0
        }
    }
}

/// `max(0, 1 − target·output)²`.
#[derive(Debug, Clone, Copy)]
pub struct SquaredHinge;

impl Loss for SquaredHinge {
    fn id(&self) -> &str {
        "squared-hinge"
    }

    fn clone_box(&self) -> Box<dyn Loss> {
        Box::new(*self)
    }

    fn value(&self, output: Real, target: Real) -> Real {
        let margin = (1.0 - target * output).max(0.0);
        margin * margin
    }

    fn vgrad(&self, output: Real, target: Real) -> (Real, Real) {
        let margin = (1.0 - target * output).max(0.0);
        (margin * margin, -2.0 * target * margin)
    }

    fn smooth(&self) -> bool {
        true
    }

    fn error(&self, output: Real, target: Real) -> Real {
        if target * output > 0.0 {
            0.0
        } else {
            1.0
        }
    }
}

/// `log(1 + exp(−target·output))`.
#[derive(Debug, Clone, Copy)]
pub struct Logistic;

impl Loss for Logistic {
    fn id(&self) -> &str {
        "logistic"
    }

    fn clone_box(&self) -> Box<dyn Loss> {
        Box::new(*self)
    }

    fn value(&self, output: Real, target: Real) -> Real {
        (-target * output).exp().ln_1p()
    }

    fn vgrad(&self, output: Real, target: Real) -> (Real, Real) {
        let exponent = (-target * output).exp();
        (exponent.ln_1p(), -target * exponent / (1.0 + exponent))
    }

    fn smooth(&self) -> bool {
        true
    }

    fn error(&self, output: Real, target: Real) -> Real {
        if target * output > 0.0 {
            0.0
        } else {
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn check_gradient(loss: &dyn Loss, output: Real, target: Real) {
        let step = 1e-7;
        let (_, analytic) = loss.vgrad(output, target);
        let approx = (loss.value(output + step, target) - loss.value(output - step, target)) / (2.0 * step);
        assert_relative_eq!(analytic, approx, epsilon = 1e-5);
    }

    #[test]
    fn derivatives_match_finite_differences() {
        let factory = losses();
        for id in factory.ids() {
            let loss = factory.get(id).unwrap();
            for (output, target) in [(0.3, 1.0), (-0.7, 1.0), (1.4, -1.0), (2.0, 0.5)] {
                // stay away from the hinge/mae kinks
                check_gradient(loss.as_ref(), output, target);
            }
        }
    }

    #[test]
    fn classification_losses_count_misclassifications() {
        let loss = Hinge;
        assert_eq!(loss.error(0.8, 1.0), 0.0);
        assert_eq!(loss.error(-0.8, 1.0), 1.0);
    }

    #[test]
    fn mse_basics() {
        let loss = Mse;
        assert_relative_eq!(loss.value(2.0, 1.0), 0.5);
        assert_relative_eq!(loss.vgrad(2.0, 1.0).1, 1.0);
        assert!(loss.smooth());
    }
}
