//! Practical augmented Lagrangian method.

use crate::solver::{base_config, solvers, Logger, Solver};
use crate::state::{SolverState, Status};
use nl_core::{ensure, Bounds, Configurable, Parameter, Real, Result};
use nl_function::{Convexity, Function, FunctionMeta, Smoothness};
use nl_tensor::{Matrix, Vector};

/// The augmented Lagrangian
/// `L_A(x; λ, μ, ρ) = f(x) + Σ λⱼhⱼ + (ρ/2)Σ hⱼ² + (1/2ρ)Σ[max(0, μᵢ+ρgᵢ)² − μᵢ²]`.
struct AugmentedFunction {
    base: Box<dyn Function>,
    meta: FunctionMeta,
    lambda: Vector,
    miu: Vector,
    rho: Real,
}

impl AugmentedFunction {
    fn new(base: Box<dyn Function>, lambda: Vector, miu: Vector, rho: Real) -> Self {
        let meta = FunctionMeta::new(base.size())
            .convex(Convexity::Ignore)
            .smooth(Smoothness::Smooth);
        Self { base, meta, lambda, miu, rho }
    }
}

impl Function for AugmentedFunction {
    fn name(&self) -> String {
        format!("augmented-lagrangian[{}]", self.base.name())
    }

    fn meta(&self) -> &FunctionMeta {
        &self.meta
    }

    fn clone_dyn(&self) -> Box<dyn Function> {
        Box::new(Self::new(self.base.clone(), self.lambda.clone(), self.miu.clone(), self.rho))
    }

    fn do_evaluate(&self, x: &Vector, gx: Option<&mut Vector>, hx: Option<&mut Matrix>) -> Real {
        assert!(hx.is_none(), "{}: Hessian not available", self.name());

        let constraints = self.base.constraints();
        let mut gradient = gx;
        let mut term_gx = Vector::zeros(x.size());

        let mut fx = match &mut gradient {
            Some(gx) => self.base.vgrad(x, gx),
            None => self.base.value(x),
        };

        for j in 0..constraints.n_equalities() {
            let value = constraints.eq_value_grad(j, x, Some(&mut term_gx));
            fx += self.lambda[j] * value + 0.5 * self.rho * value * value;
            if let Some(gx) = &mut gradient {
                **gx += &((self.lambda[j] + self.rho * value) * &term_gx);
            }
        }
        for i in 0..constraints.n_inequalities() {
            let value = constraints.ineq_value_grad(i, x, Some(&mut term_gx));
            let shifted = (self.miu[i] + self.rho * value).max(0.0);
            fx += (shifted * shifted - self.miu[i] * self.miu[i]) / (2.0 * self.rho);
            if let Some(gx) = &mut gradient {
                if shifted > 0.0 {
                    **gx += &(shifted * &term_gx);
                }
            }
        }
        fx
    }
}

/// The Birgin-Martinez practical augmented Lagrangian driver.
///
/// Multiplier estimates are safeguarded to declared ranges; the penalty
/// grows by `γ` whenever the infeasibility fails to shrink by the factor
/// `τ`. The subproblem is solved without bound constraints.
pub struct SolverAugmented {
    config: Configurable,
}

impl SolverAugmented {
    /// Create with the default multipliers ranges and growth factors.
    pub fn new() -> Self {
        let mut config = base_config();
        config
            .register(
                Parameter::float("solver::augmented::rho0", 1.0, Bounds::open_closed(0.0, 1e+6))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::float("solver::augmented::gamma", 10.0, Bounds::open_closed(1.0, 1e+3))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::float("solver::augmented::tau", 0.5, Bounds::open(0.0, 1.0))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::float("solver::augmented::epsilon_feas", 1e-6, Bounds::open(0.0, 1.0))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::float("solver::augmented::multiplier_max", 1e+8, Bounds::open(0.0, 1e+12))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::integer("solver::augmented::max_outers", 50, Bounds::closed(1, 1000))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::enumeration("solver::augmented::solver", "lbfgs", &["gd", "lbfgs", "cgd"])
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        Self { config }
    }
}

impl Default for SolverAugmented {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver for SolverAugmented {
    fn id(&self) -> &str {
        "augmented-lagrangian"
    }

    fn config(&self) -> &Configurable {
        &self.config
    }

    fn config_mut(&mut self) -> &mut Configurable {
        &mut self.config
    }

    fn clone_box(&self) -> Box<dyn Solver> {
        Box::new(Self { config: self.config.clone() })
    }

    fn minimize(&self, function: &dyn Function, x0: &Vector, logger: &mut Logger) -> Result<SolverState> {
        ensure!(x0.size() == function.size(), "augmented-lagrangian: x0 must be {}-dimensional", function.size());
        ensure!(
            !function.constraints().is_empty(),
            "augmented-lagrangian: the function must be constrained"
        );

        let epsilon = self.config.float("solver::epsilon")?;
        let mut rho = self.config.float("solver::augmented::rho0")?;
        let gamma = self.config.float("solver::augmented::gamma")?;
        let tau = self.config.float("solver::augmented::tau")?;
        let epsilon_feas = self.config.float("solver::augmented::epsilon_feas")?;
        let multiplier_max = self.config.float("solver::augmented::multiplier_max")?;
        let max_outers = self.config.size("solver::augmented::max_outers")?;
        let inner_id = self.config.enumeration("solver::augmented::solver")?;

        let mut inner = solvers().get(inner_id)?;
        inner.config_mut().set_float("solver::epsilon", epsilon)?;

        let constraints = function.constraints();
        let neqs = constraints.n_equalities();
        let nineqs = constraints.n_inequalities();

        let mut lambda = Vector::zeros(neqs);
        let mut miu = Vector::zeros(nineqs);
        let mut x = x0.clone();
        let mut state = SolverState::new(function, x0);
        let mut prev_infeasibility = Real::INFINITY;

        for _ in 0..max_outers {
            let subproblem =
                AugmentedFunction::new(function.clone_dyn(), lambda.clone(), miu.clone(), rho);
            let inner_state = inner.minimize(&subproblem, &x, &mut Logger::none())?;
            x = inner_state.x().clone();

            // first-order multiplier updates, safeguarded to the declared box
            let mut infeasibility: Real = 0.0;
            for j in 0..neqs {
                let value = constraints.eq_value_grad(j, &x, None);
                infeasibility = infeasibility.max(value.abs());
                lambda[j] = (lambda[j] + rho * value).clamp(-multiplier_max, multiplier_max);
            }
            for i in 0..nineqs {
                let value = constraints.ineq_value_grad(i, &x, None);
                infeasibility = infeasibility.max(value.max(0.0));
                miu[i] = (miu[i] + rho * value).clamp(0.0, multiplier_max);
            }

            let mut gx = Vector::zeros(function.size());
            let fx = function.vgrad(&x, &mut gx);
            state.update(x.clone(), fx, gx);
            state.set_duals(miu.clone(), lambda.clone());
            state.set_calls(function);
            state.next_iteration();

            if infeasibility <= epsilon_feas && inner_state.gradient_test() <= epsilon.max(1e-6) {
                state.finish(Status::KktOptimality);
                return Ok(state);
            }
            if !logger.call(&state) {
                state.finish(Status::Stopped);
                return Ok(state);
            }

            if infeasibility > tau * prev_infeasibility {
                rho = (rho * gamma).min(1e+12);
            }
            prev_infeasibility = infeasibility;
        }
        state.finish(Status::MaxIters);
        Ok(state)
    }
}
