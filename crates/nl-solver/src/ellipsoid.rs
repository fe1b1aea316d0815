//! The ellipsoid method.

use crate::solver::{base_config, warn_constrained, Logger, Solver};
use crate::state::{NonsmoothState, SolverState, Status};
use nl_core::{ensure, Bounds, Configurable, Parameter, Real, Result, EPSILON0};
use nl_function::Function;
use nl_tensor::{Matrix, Vector};

/// The (deep-cut) ellipsoid method.
///
/// Maintains a center and a positive-definite shape matrix; every
/// subgradient cuts the ellipsoid roughly in half. The current
/// function-value slack sharpens the cut whenever the best value is below
/// the center value. Sensitive to the initial radius.
pub struct SolverEllipsoid {
    config: Configurable,
}

impl SolverEllipsoid {
    /// Create with the default initial radius.
    pub fn new() -> Self {
        let mut config = base_config();
        config
            .register(
                Parameter::float("solver::ellipsoid::radius", 10.0, Bounds::open(0.0, 1e+12))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        Self { config }
    }
}

impl Default for SolverEllipsoid {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver for SolverEllipsoid {
    fn id(&self) -> &str {
        "ellipsoid"
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
        let n = function.size();
        ensure!(x0.size() == n, "ellipsoid: x0 must be {n}-dimensional");
        warn_constrained("ellipsoid", function);

        let epsilon = self.config.float("solver::epsilon")?;
        let max_evals = self.config.int("solver::max_evals")? as u64;
        let patience = self.config.size("solver::patience")?;
        let radius = self.config.float("solver::ellipsoid::radius")?;

        let mut tracked = NonsmoothState::new(SolverState::new(function, x0), patience);
        let mut center = x0.clone();
        let mut gx = tracked.state().gx().clone();
        let mut fx = tracked.state().fx();
        let mut shape = Matrix::identity(n).scale(radius * radius);

        while function.evals() < max_evals {
            let qg = shape.mul_vec(&gx);
            let gqg = gx.dot(&qg);
            if !gqg.is_finite() {
                tracked.state_mut().finish(Status::Failed);
                break;
            }
            if gqg <= EPSILON0 {
                tracked.state_mut().finish(Status::Converged);
                break;
            }
            let bound = gqg.sqrt();

            // f(center) - f* <= sqrt(g'Qg), the method's specific test
            if bound <= epsilon * tracked.state().fx().abs().max(1.0) {
                tracked.state_mut().finish(Status::Converged);
                break;
            }

            // deep cut from the slack between the center and the best value
            let alpha = ((fx - tracked.state().fx()) / bound).clamp(0.0, 1.0 - EPSILON0);

            let nf = n as Real;
            if n == 1 {
                center -= &((0.5 * (1.0 + alpha) / bound) * &qg);
                let scale = 0.25 * (1.0 - alpha) * (1.0 - alpha);
                shape = shape.scale(scale);
            } else {
                center -= &(((1.0 + nf * alpha) / (nf + 1.0) / bound) * &qg);
                let mut updated = shape.clone();
                updated.rank1_update(
                    -2.0 * (1.0 + nf * alpha) / ((nf + 1.0) * (1.0 + alpha)) / gqg,
                    &qg,
                    &qg,
                );
                shape = updated.scale(nf * nf * (1.0 - alpha * alpha) / (nf * nf - 1.0));
            }

            fx = function.vgrad(&center, &mut gx);
            tracked.update_if_better(&center, &gx, fx);

            tracked.state_mut().set_calls(function);
            tracked.state_mut().next_iteration();
            if !tracked.state().is_valid() {
                tracked.state_mut().finish(Status::Failed);
                break;
            }
            if !logger.call(tracked.state()) {
                tracked.state_mut().finish(Status::Stopped);
                break;
            }
        }
        let mut state = tracked.into_state();
        state.finish(Status::MaxIters);
        state.set_calls(function);
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nl_function::functions::{MaxQ, Sphere};

    #[test]
    fn shrinks_onto_smooth_minima() {
        let mut solver = SolverEllipsoid::new();
        solver.config_mut().set_int("solver::max_evals", 20_000).unwrap();
        let function = Sphere::new(2);
        let state = solver
            .minimize(&function, &Vector::from_slice(&[2.0, -3.0]), &mut Logger::none())
            .unwrap();
        assert_eq!(state.status(), Status::Converged);
        assert!(state.fx() < 1e-10, "f = {}", state.fx());
    }

    #[test]
    fn handles_nonsmooth_objectives() {
        let mut solver = SolverEllipsoid::new();
        solver.config_mut().set_int("solver::max_evals", 50_000).unwrap();
        let function = MaxQ::new(3);
        let state = solver
            .minimize(&function, &Vector::constant(3, 2.0), &mut Logger::none())
            .unwrap();
        assert!(state.fx() < 1e-6, "f = {}", state.fx());
    }
}
