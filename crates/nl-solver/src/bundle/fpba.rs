//! Proximal bundle solvers: RQB and the fast (accelerated) variants.

use super::csearch::{Csearch, CsearchStatus};
use super::proximity::Proximity;
use super::Bundle;
use crate::interior::SolverIpm;
use crate::solver::{base_config, warn_constrained, Logger, Solver};
use crate::state::{NonsmoothState, SolverState, Status};
use nl_core::{ensure, Bounds, Configurable, Parameter, Real, Result};
use nl_function::Function;
use nl_tensor::Vector;

/// The momentum sequence applied to the stability center after serious
/// steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Momentum {
    /// No momentum (the plain proximal bundle with RQB updates).
    None,
    /// Nesterov sequence with `β = 0`.
    Sequence1,
    /// Nesterov sequence with `β = λₖ/λₖ₊₁`.
    Sequence2,
}

/// Proximal bundle solver with curve-search, RQB proximal parameter and an
/// optional Nesterov momentum on the stability center (with adaptive
/// function-value restarts).
pub struct SolverBundle {
    config: Configurable,
    momentum: Momentum,
}

impl SolverBundle {
    fn new(momentum: Momentum) -> Self {
        let mut config = base_config();
        config
            .register(
                Parameter::integer("solver::bundle::max_size", 25, Bounds::closed(4, 1000))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::float_pair("solver::bundle::miu0_range", (1e-4, 1e+4), Bounds::open(0.0, 1e+6))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::float("solver::bundle::m1", 0.5, Bounds::open(0.0, 1.0))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::float("solver::bundle::m2", 0.9, Bounds::open(0.0, 1.0))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        Self { config, momentum }
    }

    /// Plain proximal bundle with reversal quasi-Newton `μ` updates.
    pub fn rqb() -> Self {
        Self::new(Momentum::None)
    }

    /// Fast proximal bundle, first accelerated sequence.
    pub fn fpba1() -> Self {
        Self::new(Momentum::Sequence1)
    }

    /// Fast proximal bundle, second accelerated sequence.
    pub fn fpba2() -> Self {
        Self::new(Momentum::Sequence2)
    }
}

/// `λₖ₊₁ = (1 + √(1+4λₖ²))/2` and the matching `(α, β)` extrapolation
/// factors.
fn make_alpha_beta(momentum: Momentum, lambda: &mut Real) -> (Real, Real) {
    let current = *lambda;
    let next = 0.5 * (1.0 + (1.0 + 4.0 * current * current).sqrt());
    *lambda = next;
    let alpha = (current - 1.0) / next;
    let beta = match momentum {
        Momentum::None => 0.0,
        Momentum::Sequence1 => 0.0,
        Momentum::Sequence2 => current / next,
    };
    (alpha, beta)
}

impl Solver for SolverBundle {
    fn id(&self) -> &str {
        match self.momentum {
            Momentum::None => "rqb",
            Momentum::Sequence1 => "fpba1",
            Momentum::Sequence2 => "fpba2",
        }
    }

    fn config(&self) -> &Configurable {
        &self.config
    }

    fn config_mut(&mut self) -> &mut Configurable {
        &mut self.config
    }

    fn clone_box(&self) -> Box<dyn Solver> {
        Box::new(Self { config: self.config.clone(), momentum: self.momentum })
    }

    fn minimize(&self, function: &dyn Function, x0: &Vector, logger: &mut Logger) -> Result<SolverState> {
        ensure!(x0.size() == function.size(), "{}: x0 must be {}-dimensional", self.id(), function.size());
        warn_constrained(self.id(), function);

        let epsilon = self.config.float("solver::epsilon")?;
        let max_evals = self.config.int("solver::max_evals")? as u64;
        let patience = self.config.size("solver::patience")?;
        let max_size = self.config.size("solver::bundle::max_size")?;
        let miu_range = self.config.float_pair("solver::bundle::miu0_range")?;
        let m1 = self.config.float("solver::bundle::m1")?;
        let m2 = self.config.float("solver::bundle::m2")?;

        let csearch = Csearch { m1, m2, ..Csearch::default() };
        let ipm = SolverIpm::new();

        let mut tracked = NonsmoothState::new(SolverState::new(function, x0), patience);
        let mut proximity = Proximity::new(tracked.state(), miu_range);

        let mut bundle = Bundle::new(
            tracked.state().x().clone(),
            tracked.state().fx(),
            tracked.state().gx().clone(),
            max_size,
        );
        let mut prev_center = bundle.center().clone();
        let mut lambda: Real = 1.0;

        while function.evals() < max_evals {
            let step = bundle.solve(proximity.miu(), &ipm)?;
            let point = csearch.search(function, &bundle, &step, epsilon);

            match point.status {
                CsearchStatus::Converged => {
                    tracked.state_mut().finish(Status::Converged);
                    break;
                }
                CsearchStatus::Failed => {
                    tracked.state_mut().finish(Status::Failed);
                    break;
                }
                CsearchStatus::DescentStep => {
                    let old_center = bundle.center().clone();
                    let old_gradient = bundle.gcenter().clone();
                    proximity.update(point.t, &old_center, &point.y, &old_gradient, &point.gy);

                    tracked.update_if_better(&point.y, &point.gy, point.fy);
                    bundle.move_center(&point.y, point.fy, &point.gy);

                    // accelerated variants extrapolate the new center along
                    // the last serious move, restarting when the value grows
                    let (alpha, beta) = make_alpha_beta(self.momentum, &mut lambda);
                    if self.momentum != Momentum::None {
                        let shift = &point.y - &prev_center;
                        let extrapolated = &point.y + &((alpha + beta) * &shift);
                        let mut gz = point.gy.clone();
                        let fz = function.vgrad(&extrapolated, &mut gz);
                        if fz < point.fy {
                            tracked.update_if_better(&extrapolated, &gz, fz);
                            bundle.move_center(&extrapolated, fz, &gz);
                        } else {
                            lambda = 1.0;
                        }
                    }
                    prev_center = old_center;
                }
                CsearchStatus::CuttingPlaneStep | CsearchStatus::NullStep | CsearchStatus::MaxIters => {
                    bundle.append(&point.y, point.fy, &point.gy);
                    tracked.update_if_better(&point.y, &point.gy, point.fy);
                }
            }

            tracked.state_mut().set_calls(function);
            tracked.state_mut().next_iteration();
            if tracked.converged(epsilon) {
                tracked.state_mut().finish(Status::Converged);
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
