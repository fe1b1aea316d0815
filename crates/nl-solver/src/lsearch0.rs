//! Initial step-length strategies.
//!
//! The first trial step handed to a step refiner, selected by factory id:
//! `constant`, `linear` and `quadratic` interpolate the previous line-search
//! steps, `cgdescent` implements the CG-DESCENT starting rule.

use crate::state::SolverState;
use nl_core::{Bounds, Configurable, Factory, Parameter, Real};
use nl_function::Function;
use nl_tensor::Vector;
use std::sync::OnceLock;

/// An initial step-length strategy.
///
/// Implementations keep per-`minimize` memory (previous step, previous
/// directional derivative), so a fresh instance is built for every solver
/// call.
pub trait Lsearch0: Send {
    /// Stable factory id.
    fn id(&self) -> &str;

    /// The registered parameters.
    fn config(&self) -> &Configurable;

    /// Mutable access to the registered parameters.
    fn config_mut(&mut self) -> &mut Configurable;

    /// Produce the initial trial step for the given descent direction;
    /// `iteration` counts line searches within the current solver call
    /// starting from 1.
    fn get(&mut self, function: &dyn Function, state: &SolverState, descent: &Vector, iteration: usize) -> Real;
}

/// The process-wide initial step-length registry.
pub fn lsearch0s() -> &'static Factory<dyn Lsearch0> {
    static FACTORY: OnceLock<Factory<dyn Lsearch0>> = OnceLock::new();
    FACTORY.get_or_init(|| {
        let mut factory: Factory<dyn Lsearch0> = Factory::new();
        factory.add("constant", "constant initial step length", || Box::new(Lsearch0Constant::new()));
        factory.add("linear", "linearly interpolate the previous step length", || {
            Box::new(Lsearch0Linear::new())
        });
        factory.add("quadratic", "quadratically interpolate the previous step length", || {
            Box::new(Lsearch0Quadratic::new())
        });
        factory.add("cgdescent", "the CG-DESCENT initial step length", || {
            Box::new(Lsearch0CgDescent::new())
        });
        factory
    })
}

fn common_config() -> Configurable {
    let mut config = Configurable::new();
    config
        .register(
            Parameter::float("lsearch0::epsilon", 1e-6, Bounds::open(0.0, 1.0))
                .expect("static parameter defaults are valid"),
        )
        .expect("unique parameter name");
    config
}

// ── Constant ──────────────────────────────────────────────────────────────────

/// Fixed initial step length (useful for L-BFGS and Newton methods).
pub struct Lsearch0Constant {
    config: Configurable,
}

impl Lsearch0Constant {
    /// Create with the default unit step.
    pub fn new() -> Self {
        let mut config = common_config();
        config
            .register(
                Parameter::float("lsearch0::constant::t0", 1.0, Bounds::open(0.0, 1e+6))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        Self { config }
    }
}

impl Default for Lsearch0Constant {
    fn default() -> Self {
        Self::new()
    }
}

impl Lsearch0 for Lsearch0Constant {
    fn id(&self) -> &str {
        "constant"
    }

    fn config(&self) -> &Configurable {
        &self.config
    }

    fn config_mut(&mut self) -> &mut Configurable {
        &mut self.config
    }

    fn get(&mut self, _function: &dyn Function, _state: &SolverState, _descent: &Vector, _iteration: usize) -> Real {
        self.config.float("lsearch0::constant::t0").expect("registered parameter")
    }
}

// ── Linear interpolation ──────────────────────────────────────────────────────

/// `t₀ = min(1, α·t_{k−1}·dg_{k−1}/dg_k)`, clamped away from zero through
/// the `β·ε` safeguard.
pub struct Lsearch0Linear {
    config: Configurable,
    prevdg: Real,
}

impl Lsearch0Linear {
    /// Create with the default correction factors.
    pub fn new() -> Self {
        let mut config = common_config();
        config
            .register(
                Parameter::float("lsearch0::linear::alpha", 1.01, Bounds::open(1.0, 2.0))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::float("lsearch0::linear::beta", 10.0, Bounds::open(1.0, 1e+6))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        Self { config, prevdg: 1.0 }
    }
}

impl Default for Lsearch0Linear {
    fn default() -> Self {
        Self::new()
    }
}

impl Lsearch0 for Lsearch0Linear {
    fn id(&self) -> &str {
        "linear"
    }

    fn config(&self) -> &Configurable {
        &self.config
    }

    fn config_mut(&mut self) -> &mut Configurable {
        &mut self.config
    }

    fn get(&mut self, _function: &dyn Function, state: &SolverState, descent: &Vector, iteration: usize) -> Real {
        let alpha = self.config.float("lsearch0::linear::alpha").expect("registered parameter");
        let beta = self.config.float("lsearch0::linear::beta").expect("registered parameter");
        let epsilon = self.config.float("lsearch0::epsilon").expect("registered parameter");

        let dg = descent.dot(state.gx());
        let t0 = if iteration <= 1 {
            1.0
        } else {
            (-alpha * (-state.t() * self.prevdg).max(beta * epsilon) / dg).min(1.0)
        };
        self.prevdg = dg;
        t0
    }
}

// ── Quadratic interpolation ───────────────────────────────────────────────────

/// `t₀ = min(1, −2α(f_{k−1} − f_k)/dg_{k−1})`, safeguarded by `β·ε`.
pub struct Lsearch0Quadratic {
    config: Configurable,
    prevf: Real,
    prevdg: Real,
}

impl Lsearch0Quadratic {
    /// Create with the default correction factors.
    pub fn new() -> Self {
        let mut config = common_config();
        config
            .register(
                Parameter::float("lsearch0::quadratic::alpha", 1.01, Bounds::open(1.0, 2.0))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::float("lsearch0::quadratic::beta", 10.0, Bounds::open(1.0, 1e+6))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        Self { config, prevf: 0.0, prevdg: 1.0 }
    }
}

impl Default for Lsearch0Quadratic {
    fn default() -> Self {
        Self::new()
    }
}

impl Lsearch0 for Lsearch0Quadratic {
    fn id(&self) -> &str {
        "quadratic"
    }

    fn config(&self) -> &Configurable {
        &self.config
    }

    fn config_mut(&mut self) -> &mut Configurable {
        &mut self.config
    }

    fn get(&mut self, _function: &dyn Function, state: &SolverState, descent: &Vector, iteration: usize) -> Real {
        let alpha = self.config.float("lsearch0::quadratic::alpha").expect("registered parameter");
        let beta = self.config.float("lsearch0::quadratic::beta").expect("registered parameter");
        let epsilon = self.config.float("lsearch0::epsilon").expect("registered parameter");

        let t0 = if iteration <= 1 {
            1.0
        } else {
            (-alpha * 2.0 * (self.prevf - state.fx()).max(beta * epsilon) / self.prevdg).min(1.0)
        };
        self.prevf = state.fx();
        self.prevdg = descent.dot(state.gx());
        t0
    }
}

// ── CG-DESCENT ────────────────────────────────────────────────────────────────

/// The starting rule described with CG-DESCENT: norm-based on the first
/// iteration, quadratic interpolation at `ψ₁·t_{k−1}` afterwards with the
/// `ψ₂·t_{k−1}` fallback.
pub struct Lsearch0CgDescent {
    config: Configurable,
    prevt: Real,
}

impl Lsearch0CgDescent {
    /// Create with the ψ₀/ψ₁/ψ₂ defaults.
    pub fn new() -> Self {
        let mut config = common_config();
        config
            .register(
                Parameter::float("lsearch0::cgdescent::phi0", 0.01, Bounds::open(0.0, 1.0))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::float("lsearch0::cgdescent::phi1", 0.1, Bounds::open(0.0, 1.0))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::float("lsearch0::cgdescent::phi2", 2.0, Bounds::open(1.0, 1e+6))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        Self { config, prevt: 1.0 }
    }
}

impl Default for Lsearch0CgDescent {
    fn default() -> Self {
        Self::new()
    }
}

impl Lsearch0 for Lsearch0CgDescent {
    fn id(&self) -> &str {
        "cgdescent"
    }

    fn config(&self) -> &Configurable {
        &self.config
    }

    fn config_mut(&mut self) -> &mut Configurable {
        &mut self.config
    }

    fn get(&mut self, function: &dyn Function, state: &SolverState, descent: &Vector, iteration: usize) -> Real {
        let phi0 = self.config.float("lsearch0::cgdescent::phi0").expect("registered parameter");
        let phi1 = self.config.float("lsearch0::cgdescent::phi1").expect("registered parameter");
        let phi2 = self.config.float("lsearch0::cgdescent::phi2").expect("registered parameter");

        let t0 = if iteration <= 1 {
            let xnorm = state.x().lp_norm_inf();
            let fnorm = state.fx().abs();
            if xnorm > 0.0 {
                phi0 * xnorm / state.gx().lp_norm_inf()
            } else if fnorm > 0.0 {
                phi0 * fnorm / state.gx().norm_squared()
            } else {
                1.0
            }
        } else {
            // quadratic interpolation through phi(0), phi'(0) and the trial
            // value at psi1 * t_{k-1}
            let f0 = state.fx();
            let dg0 = descent.dot(state.gx());
            let tx = phi1 * self.prevt;
            let fx = function.value(&(state.x() + &(tx * descent)));

            let curvature = (fx - f0 - dg0 * tx) / (tx * tx);
            if fx < f0 && curvature > 0.0 {
                -dg0 / (2.0 * curvature)
            } else {
                phi2 * self.prevt
            }
        };
        self.prevt = t0;
        t0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nl_function::functions::Sphere;

    fn setup() -> (Sphere, SolverState, Vector) {
        let function = Sphere::new(2);
        let state = SolverState::new(&function, &Vector::from_slice(&[3.0, 4.0]));
        let descent = -state.gx().clone();
        (function, state, descent)
    }

    #[test]
    fn constant_returns_t0() {
        let (function, state, descent) = setup();
        let mut init = Lsearch0Constant::new();
        assert_eq!(init.get(&function, &state, &descent, 1), 1.0);

        init.config_mut().set_float("lsearch0::constant::t0", 0.25).unwrap();
        assert_eq!(init.get(&function, &state, &descent, 2), 0.25);
    }

    #[test]
    fn linear_first_iteration_is_unit() {
        let (function, state, descent) = setup();
        let mut init = Lsearch0Linear::new();
        assert_eq!(init.get(&function, &state, &descent, 1), 1.0);
        // second call interpolates and caps at 1
        let t0 = init.get(&function, &state, &descent, 2);
        assert!(t0 > 0.0 && t0 <= 1.0);
    }

    #[test]
    fn quadratic_uses_previous_decrease() {
        let (function, mut state, descent) = setup();
        let mut init = Lsearch0Quadratic::new();
        assert_eq!(init.get(&function, &state, &descent, 1), 1.0);

        // simulate a decrease from 12.5 to 8
        state.update(state.x().clone(), 8.0, state.gx().clone());
        let t0 = init.get(&function, &state, &descent, 2);
        assert!(t0 > 0.0 && t0 <= 1.0);
    }

    #[test]
    fn cgdescent_first_step_uses_infinity_norms() {
        let (function, state, descent) = setup();
        let mut init = Lsearch0CgDescent::new();
        let t0 = init.get(&function, &state, &descent, 1);
        // phi0 * |x|_inf / |g|_inf = 0.01 * 4 / 4
        assert!((t0 - 0.01).abs() < 1e-15);
    }

    #[test]
    fn factory_ids() {
        assert_eq!(lsearch0s().ids(), vec!["constant", "linear", "quadratic", "cgdescent"]);
    }
}
