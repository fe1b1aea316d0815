//! Wolfe-condition step refiners.
//!
//! A refiner receives the state at the line-search origin, a descent
//! direction and an initial trial step, and produces a step satisfying its
//! acceptance criterion (Armijo for `backtrack`, strong Wolfe for
//! `fletcher`/`lemarechal`/`morethuente`, approximate Wolfe for
//! `cgdescent`). Steps never leave `[STPMIN, STPMAX]`.

mod backtrack;
mod cgdescent;
mod fletcher;
mod lemarechal;
mod morethuente;

pub use backtrack::LsearchkBacktrack;
pub use cgdescent::LsearchkCgDescent;
pub use fletcher::LsearchkFletcher;
pub use lemarechal::LsearchkLemarechal;
pub use morethuente::LsearchkMoreThuente;

use crate::state::SolverState;
use nl_core::{Bounds, Configurable, Factory, Parameter, Real};
use nl_function::Function;
use nl_tensor::Vector;
use std::sync::OnceLock;

/// Smallest admissible step length.
pub const STPMIN: Real = 1e-20;

/// Largest admissible step length.
pub const STPMAX: Real = 1e+20;

/// A line-search trial: step length, value and directional derivative.
#[derive(Debug, Clone, Copy)]
pub struct LsearchStep {
    /// Step length `t ≥ 0`.
    pub t: Real,
    /// `φ(t) = f(x + t·d)`.
    pub phi: Real,
    /// `φ'(t) = ∇f(x + t·d)·d`.
    pub dphi: Real,
}

impl LsearchStep {
    /// Sufficient decrease: `φ(t) ≤ φ(0) + c₁·t·φ'(0)`.
    pub fn has_armijo(&self, f0: Real, dg0: Real, c1: Real) -> bool {
        self.phi <= f0 + c1 * self.t * dg0
    }

    /// Curvature condition: `φ'(t) ≥ c₂·φ'(0)`.
    pub fn has_wolfe(&self, dg0: Real, c2: Real) -> bool {
        self.dphi >= c2 * dg0
    }

    /// Strong curvature condition: `|φ'(t)| ≤ −c₂·φ'(0)`.
    pub fn has_strong_wolfe(&self, dg0: Real, c2: Real) -> bool {
        self.dphi.abs() <= -c2 * dg0
    }

    /// Approximate Wolfe: `(2c₁−1)·φ'(0) ≥ φ'(t) ≥ c₂·φ'(0)`.
    pub fn has_approx_wolfe(&self, dg0: Real, c1: Real, c2: Real) -> bool {
        (2.0 * c1 - 1.0) * dg0 >= self.dphi && self.dphi >= c2 * dg0
    }
}

/// How to pick the next trial inside an interval of uncertainty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    /// Interval midpoint.
    Bisection,
    /// Quadratic through `(t_a, φ_a, φ'_a)` and `(t_b, φ_b)`.
    Quadratic,
    /// Cubic through both end points (values and slopes).
    Cubic,
}

impl Interpolation {
    fn from_id(id: &str) -> Self {
        match id {
            "bisection" => Interpolation::Bisection,
            "quadratic" => Interpolation::Quadratic,
            _ => Interpolation::Cubic,
        }
    }
}

/// Minimizer of the quadratic through `(a.t, a.phi, a.dphi)` and
/// `(b.t, b.phi)`; falls back to bisection when the quadratic is concave.
pub fn quadratic(a: &LsearchStep, b: &LsearchStep) -> Real {
    let dt = b.t - a.t;
    let curvature = (b.phi - a.phi - a.dphi * dt) / (dt * dt);
    if curvature > 0.0 {
        a.t - 0.5 * a.dphi / curvature
    } else {
        0.5 * (a.t + b.t)
    }
}

/// Minimizer of the cubic through both end points; falls back to the
/// quadratic (then bisection) when ill-defined.
pub fn cubic(a: &LsearchStep, b: &LsearchStep) -> Real {
    // see ch.3 (eq. 3.59) "Numerical Optimization", Nocedal & Wright, 2nd edition
    let d1 = a.dphi + b.dphi - 3.0 * (a.phi - b.phi) / (a.t - b.t);
    let delta = d1 * d1 - a.dphi * b.dphi;
    if delta >= 0.0 {
        let d2 = (b.t - a.t).signum() * delta.sqrt();
        let t = b.t - (b.t - a.t) * (b.dphi + d2 - d1) / (b.dphi - a.dphi + 2.0 * d2);
        if t.is_finite() {
            return t;
        }
    }
    quadratic(a, b)
}

/// Interpolate inside `[a, b]` with the requested scheme.
pub fn interpolate(a: &LsearchStep, b: &LsearchStep, method: Interpolation) -> Real {
    let t = match method {
        Interpolation::Bisection => 0.5 * (a.t + b.t),
        Interpolation::Quadratic => quadratic(a, b),
        Interpolation::Cubic => cubic(a, b),
    };
    if t.is_finite() {
        t
    } else {
        0.5 * (a.t + b.t)
    }
}

/// The point materialized by a refiner.
#[derive(Debug, Clone)]
pub struct LsearchResult {
    /// Whether the acceptance criterion was met.
    pub ok: bool,
    /// Accepted step length.
    pub t: Real,
    /// The point `x₀ + t·d`.
    pub x: Vector,
    /// Function value at the point.
    pub fx: Real,
    /// Gradient at the point.
    pub gx: Vector,
}

/// Scalar view `φ(t) = f(x₀ + t·d)` of the objective along the descent
/// direction, caching the last evaluated point.
pub(crate) struct Phi<'a> {
    function: &'a dyn Function,
    x0: &'a Vector,
    descent: &'a Vector,
    /// `φ(0)`.
    pub f0: Real,
    /// `φ'(0) < 0`.
    pub dg0: Real,
    t: Real,
    x: Vector,
    fx: Real,
    gx: Vector,
}

impl<'a> Phi<'a> {
    pub(crate) fn new(function: &'a dyn Function, state0: &'a SolverState, descent: &'a Vector) -> Phi<'a> {
        let f0 = state0.fx();
        let dg0 = descent.dot(state0.gx());
        Phi {
            function,
            x0: state0.x(),
            descent,
            f0,
            dg0,
            t: 0.0,
            x: state0.x().clone(),
            fx: f0,
            gx: state0.gx().clone(),
        }
    }

    /// Evaluate the trial step `t` (clamped to the admissible range).
    pub(crate) fn eval(&mut self, t: Real) -> LsearchStep {
        let t = t.clamp(STPMIN, STPMAX);
        self.t = t;
        self.x = self.x0 + &(t * self.descent);
        self.fx = self.function.vgrad(&self.x, &mut self.gx);
        LsearchStep { t, phi: self.fx, dphi: self.gx.dot(self.descent) }
    }

    /// Materialize the result at step `t`, re-evaluating only when `t` is
    /// not the last evaluated trial.
    pub(crate) fn into_result(mut self, ok: bool, t: Real) -> LsearchResult {
        if (t - self.t).abs() > Real::EPSILON * t.abs() {
            self.eval(t);
        }
        LsearchResult { ok, t: self.t, x: self.x, fx: self.fx, gx: self.gx }
    }
}

/// A Wolfe-condition step refiner.
pub trait Lsearchk: Send {
    /// Stable factory id.
    fn id(&self) -> &str;

    /// The registered parameters.
    fn config(&self) -> &Configurable;

    /// Mutable access to the registered parameters.
    fn config_mut(&mut self) -> &mut Configurable;

    /// Refine the trial step `t0` along `descent` from `state0`.
    fn get(&self, function: &dyn Function, state0: &SolverState, descent: &Vector, t0: Real) -> LsearchResult;
}

/// The process-wide step refiner registry.
pub fn lsearchks() -> &'static Factory<dyn Lsearchk> {
    static FACTORY: OnceLock<Factory<dyn Lsearchk>> = OnceLock::new();
    FACTORY.get_or_init(|| {
        let mut factory: Factory<dyn Lsearchk> = Factory::new();
        factory.add("backtrack", "backtracking to the Armijo condition", || {
            Box::new(LsearchkBacktrack::new())
        });
        factory.add("fletcher", "bracketing + zoom to strong Wolfe", || {
            Box::new(LsearchkFletcher::new())
        });
        factory.add("lemarechal", "Lemarechal's bracketing to Wolfe", || {
            Box::new(LsearchkLemarechal::new())
        });
        factory.add("morethuente", "More-Thuente safeguarded Wolfe search", || {
            Box::new(LsearchkMoreThuente::new())
        });
        factory.add("cgdescent", "Hager-Zhang approximate Wolfe search", || {
            Box::new(LsearchkCgDescent::new())
        });
        factory
    })
}

pub(crate) fn common_config() -> Configurable {
    let mut config = Configurable::new();
    config
        .register(
            Parameter::float_pair("lsearchk::tolerance", (1e-4, 0.9), Bounds::open(0.0, 1.0))
                .expect("static parameter defaults are valid"),
        )
        .expect("unique parameter name");
    config
        .register(
            Parameter::integer("lsearchk::max_iterations", 100, Bounds::closed(1, 1000))
                .expect("static parameter defaults are valid"),
        )
        .expect("unique parameter name");
    config
        .register(
            Parameter::enumeration("lsearchk::interpolation", "cubic", &["bisection", "quadratic", "cubic"])
                .expect("static parameter defaults are valid"),
        )
        .expect("unique parameter name");
    config
}

pub(crate) struct CommonParams {
    pub c1: Real,
    pub c2: Real,
    pub max_iterations: usize,
    pub interpolation: Interpolation,
}

impl CommonParams {
    pub(crate) fn from_config(config: &Configurable) -> Self {
        let (c1, c2) = config.float_pair("lsearchk::tolerance").expect("registered parameter");
        Self {
            c1,
            c2,
            max_iterations: config.size("lsearchk::max_iterations").expect("registered parameter"),
            interpolation: Interpolation::from_id(
                config.enumeration("lsearchk::interpolation").expect("registered parameter"),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nl_function::functions::{Rosenbrock, Sphere};
    use nl_function::Function;

    fn check_wolfe(refiner: &dyn Lsearchk, function: &dyn Function, x0: Vector, strong: bool) {
        let state0 = SolverState::new(function, &x0);
        let descent = -state0.gx().clone();
        let (c1, c2) = refiner.config().float_pair("lsearchk::tolerance").unwrap();

        for t0 in [0.01, 0.1, 1.0, 3.0] {
            let result = refiner.get(function, &state0, &descent, t0);
            assert!(result.ok, "{}: no acceptable step from t0 = {t0}", refiner.id());
            assert!(result.t >= STPMIN && result.t <= STPMAX);

            let dg0 = descent.dot(state0.gx());
            let step = LsearchStep { t: result.t, phi: result.fx, dphi: result.gx.dot(&descent) };
            assert!(step.has_armijo(state0.fx(), dg0, c1), "{}: Armijo fails at t = {}", refiner.id(), result.t);
            if strong {
                assert!(
                    step.has_strong_wolfe(dg0, c2) || step.has_approx_wolfe(dg0, c1, c2),
                    "{}: curvature fails at t = {} (dphi = {})",
                    refiner.id(),
                    result.t,
                    step.dphi
                );
            }
        }
    }

    #[test]
    fn all_refiners_satisfy_their_criteria() {
        let sphere = Sphere::new(4);
        let rosenbrock = Rosenbrock::new(2);
        let refiners = lsearchks();
        for id in refiners.ids() {
            let refiner = refiners.get(id).unwrap();
            let strong = id != "backtrack" && id != "lemarechal";
            check_wolfe(refiner.as_ref(), &sphere, Vector::from_slice(&[1.0, -2.0, 3.0, 0.5]), strong);
            check_wolfe(refiner.as_ref(), &rosenbrock, Vector::from_slice(&[-1.2, 1.0]), strong);
        }
    }

    #[test]
    fn cubic_interpolation_finds_quadratic_minimum() {
        // φ(t) = (t - 2)² has the minimum at t = 2
        let phi = |t: Real| (t - 2.0) * (t - 2.0);
        let dphi = |t: Real| 2.0 * (t - 2.0);
        let a = LsearchStep { t: 0.0, phi: phi(0.0), dphi: dphi(0.0) };
        let b = LsearchStep { t: 3.0, phi: phi(3.0), dphi: dphi(3.0) };
        assert!((cubic(&a, &b) - 2.0).abs() < 1e-12);
        assert!((quadratic(&a, &b) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn bisection_is_the_fallback() {
        let a = LsearchStep { t: 1.0, phi: 1.0, dphi: 0.0 };
        let b = LsearchStep { t: 3.0, phi: 1.0, dphi: 0.0 };
        assert_eq!(interpolate(&a, &b, Interpolation::Bisection), 2.0);
    }
}
