//! Penalty method for general nonlinear constraints.

use crate::solver::{base_config, solvers, Logger, Solver};
use crate::state::{SolverState, Status};
use nl_core::{ensure, Bounds, Configurable, Parameter, Real, Result};
use nl_function::{Convexity, Function, FunctionMeta, Smoothness};
use nl_tensor::{Matrix, Vector};

/// The exact (linear) and quadratic penalty aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PenaltyKind {
    Linear,
    Quadratic,
}

/// `F_c(x) = f(x) + c·Π(x)` with `Π` the linear or quadratic aggregate of
/// the constraint violations.
struct PenaltyFunction {
    base: Box<dyn Function>,
    meta: FunctionMeta,
    c: Real,
    kind: PenaltyKind,
}

impl PenaltyFunction {
    fn new(base: Box<dyn Function>, c: Real, kind: PenaltyKind) -> Self {
        let smoothness = match kind {
            PenaltyKind::Linear => Smoothness::Nonsmooth,
            PenaltyKind::Quadratic => base.smoothness(),
        };
        let meta = FunctionMeta::new(base.size()).convex(Convexity::Ignore).smooth(smoothness);
        Self { base, meta, c, kind }
    }
}

impl Function for PenaltyFunction {
    fn name(&self) -> String {
        format!("penalty[{}]", self.base.name())
    }

    fn meta(&self) -> &FunctionMeta {
        &self.meta
    }

    fn clone_dyn(&self) -> Box<dyn Function> {
        Box::new(Self::new(self.base.clone(), self.c, self.kind))
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
            match self.kind {
                PenaltyKind::Linear => {
                    fx += self.c * value.abs();
                    if let Some(gx) = &mut gradient {
                        if value != 0.0 {
                            **gx += &(self.c * value.signum() * &term_gx);
                        }
                    }
                }
                PenaltyKind::Quadratic => {
                    fx += self.c * value * value;
                    if let Some(gx) = &mut gradient {
                        **gx += &(2.0 * self.c * value * &term_gx);
                    }
                }
            }
        }
        for i in 0..constraints.n_inequalities() {
            let value = constraints.ineq_value_grad(i, x, Some(&mut term_gx));
            if value <= 0.0 {
                continue;
            }
            match self.kind {
                PenaltyKind::Linear => {
                    fx += self.c * value;
                    if let Some(gx) = &mut gradient {
                        **gx += &(self.c * &term_gx);
                    }
                }
                PenaltyKind::Quadratic => {
                    fx += self.c * value * value;
                    if let Some(gx) = &mut gradient {
                        **gx += &(2.0 * self.c * value * &term_gx);
                    }
                }
            }
        }
        fx
    }
}

/// The penalty driver: minimize `F_c` with an inner solver and grow `c`
/// until the iterate is feasible within tolerance.
pub struct SolverPenalty {
    config: Configurable,
}

impl SolverPenalty {
    /// Create with the default quadratic penalty and L-BFGS inner solver.
    pub fn new() -> Self {
        let mut config = base_config();
        config
            .register(
                Parameter::float("solver::penalty::c0", 1.0, Bounds::open_closed(0.0, 1e+3))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::float("solver::penalty::gamma", 2.0, Bounds::open_closed(1.0, 1e+3))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::float("solver::penalty::epsilon_feas", 1e-6, Bounds::open(0.0, 1.0))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::integer("solver::penalty::max_outers", 30, Bounds::closed(1, 1000))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::enumeration("solver::penalty::variant", "quadratic", &["linear", "quadratic"])
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::enumeration(
                    "solver::penalty::solver",
                    "lbfgs",
                    &["gd", "lbfgs", "cgd", "sgm", "osga", "rqb", "fpba1", "fpba2"],
                )
                .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        Self { config }
    }
}

impl Default for SolverPenalty {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver for SolverPenalty {
    fn id(&self) -> &str {
        "penalty"
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
        ensure!(x0.size() == function.size(), "penalty: x0 must be {}-dimensional", function.size());
        ensure!(!function.constraints().is_empty(), "penalty: the function must be constrained");

        let epsilon = self.config.float("solver::epsilon")?;
        let c0 = self.config.float("solver::penalty::c0")?;
        let gamma = self.config.float("solver::penalty::gamma")?;
        let epsilon_feas = self.config.float("solver::penalty::epsilon_feas")?;
        let max_outers = self.config.size("solver::penalty::max_outers")?;
        let kind = match self.config.enumeration("solver::penalty::variant")? {
            "linear" => PenaltyKind::Linear,
            _ => PenaltyKind::Quadratic,
        };
        let inner_id = self.config.enumeration("solver::penalty::solver")?;

        let mut inner = solvers().get(inner_id)?;
        inner.config_mut().set_float("solver::epsilon", epsilon)?;

        let mut c = c0;
        let mut x = x0.clone();
        let mut state = SolverState::new(function, x0);

        for _ in 0..max_outers {
            let penalized = PenaltyFunction::new(function.clone_dyn(), c, kind);
            let inner_state = inner.minimize(&penalized, &x, &mut Logger::none())?;
            x = inner_state.x().clone();

            let mut gx = Vector::zeros(function.size());
            let fx = function.vgrad(&x, &mut gx);
            state.update(x.clone(), fx, gx);
            state.set_calls(function);
            state.next_iteration();

            if function.constraint_residual(&x) <= epsilon_feas {
                state.finish(Status::Converged);
                return Ok(state);
            }
            if !logger.call(&state) {
                state.finish(Status::Stopped);
                return Ok(state);
            }
            c *= gamma;
        }
        state.finish(Status::MaxIters);
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nl_function::{LinearProgram, QuadraticProgram};

    #[test]
    fn equality_constrained_quadratic() {
        // min ½|x|² − (2,3,5)·x s.t. Σx = 1 -> x* = (−1, 0, 2)
        let program = QuadraticProgram::new(Matrix::identity(3), Vector::from_slice(&[-2.0, -3.0, -5.0]))
            .unwrap()
            .with_equality(Matrix::from_row_slice(1, 3, &[1.0, 1.0, 1.0]), Vector::from_slice(&[1.0]))
            .unwrap();
        let function = program.to_function().unwrap();

        let solver = SolverPenalty::new();
        let state = solver.minimize(function.as_ref(), &Vector::zeros(3), &mut Logger::none()).unwrap();
        assert_eq!(state.status(), Status::Converged);
        assert!((state.x().sum() - 1.0).abs() < 1e-5, "sum = {}", state.x().sum());
        assert!((state.x() - &Vector::from_slice(&[-1.0, 0.0, 2.0])).lp_norm_inf() < 1e-2);
    }

    #[test]
    fn inequality_constrained_linear() {
        // min x0 + x1 s.t. x >= 0: the optimum sits at the vertex
        let program = LinearProgram::new(Vector::constant(2, 1.0)).with_nonnegative();
        let function = program.to_function().unwrap();

        let mut solver = SolverPenalty::new();
        solver.config_mut().set_enum("solver::penalty::variant", "linear").unwrap();
        solver.config_mut().set_enum("solver::penalty::solver", "rqb").unwrap();
        let state = solver
            .minimize(function.as_ref(), &Vector::constant(2, 2.0), &mut Logger::none())
            .unwrap();
        assert_eq!(state.status(), Status::Converged);
        assert!(state.fx() > -1e-4, "f = {}", state.fx());
    }

    #[test]
    fn unconstrained_functions_are_rejected() {
        let solver = SolverPenalty::new();
        let function = nl_function::functions::Sphere::new(2);
        assert!(solver.minimize(&function, &Vector::zeros(2), &mut Logger::none()).is_err());
    }
}
