//! Solver state shared by all solvers.
//!
//! A [`SolverState`] carries the current iterate, objective value, gradient,
//! optional Hessian, the last line-search step, dual multipliers for
//! constrained solvers and a monotone status: once terminal it never
//! changes.

use nl_function::Function;
use nl_core::Real;
use nl_tensor::{Matrix, Vector};

/// Terminal and non-terminal solver statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The solver is still iterating.
    Running,
    /// The evaluation or iteration budget was exhausted.
    MaxIters,
    /// The applicable convergence test passed.
    Converged,
    /// The iterates diverged.
    Diverged,
    /// A numerical failure was detected; the best state seen is returned.
    Failed,
    /// The caller cancelled through the logger callback.
    Stopped,
    /// The problem is unbounded from below.
    Unbounded,
    /// The problem is infeasible.
    Unfeasible,
    /// The KKT optimality test passed (constrained solvers).
    KktOptimality,
}

impl Status {
    /// Return `true` for any status other than [`Status::Running`].
    pub fn is_terminal(self) -> bool {
        self != Status::Running
    }

    /// Return `true` for statuses that indicate a usable solution.
    pub fn is_converged(self) -> bool {
        matches!(self, Status::Converged | Status::KktOptimality)
    }
}

/// The state of a solver: iterate, value, derivatives, duals and status.
#[derive(Debug, Clone)]
pub struct SolverState {
    x: Vector,
    fx: Real,
    gx: Vector,
    hx: Option<Matrix>,
    t: Real,
    d: Vector,
    u: Vector,
    v: Vector,
    status: Status,
    iterations: usize,
    fcalls: u64,
    gcalls: u64,
    hcalls: u64,
}

impl SolverState {
    /// Create a state by evaluating `function` (value and gradient) at `x0`.
    pub fn new(function: &dyn Function, x0: &Vector) -> Self {
        let mut gx = Vector::zeros(function.size());
        let fx = function.vgrad(x0, &mut gx);
        Self {
            x: x0.clone(),
            fx,
            gx,
            hx: None,
            t: 1.0,
            d: Vector::zeros(0),
            u: Vector::zeros(0),
            v: Vector::zeros(0),
            status: Status::Running,
            iterations: 0,
            fcalls: 0,
            gcalls: 0,
            hcalls: 0,
        }
    }

    /// Create a state holding only an iterate (no evaluation).
    pub fn from_point(x: Vector, fx: Real) -> Self {
        let n = x.size();
        Self {
            x,
            fx,
            gx: Vector::zeros(n),
            hx: None,
            t: 1.0,
            d: Vector::zeros(0),
            u: Vector::zeros(0),
            v: Vector::zeros(0),
            status: Status::Running,
            iterations: 0,
            fcalls: 0,
            gcalls: 0,
            hcalls: 0,
        }
    }

    /// Current iterate.
    pub fn x(&self) -> &Vector {
        &self.x
    }

    /// Current objective value.
    pub fn fx(&self) -> Real {
        self.fx
    }

    /// Current gradient (or subgradient).
    pub fn gx(&self) -> &Vector {
        &self.gx
    }

    /// Stored Hessian, when a solver produced one.
    pub fn hx(&self) -> Option<&Matrix> {
        self.hx.as_ref()
    }

    /// Last accepted line-search step length.
    pub fn t(&self) -> Real {
        self.t
    }

    /// Last descent direction (empty before the first line search).
    pub fn d(&self) -> &Vector {
        &self.d
    }

    /// Dual multipliers of the inequality constraints.
    pub fn u(&self) -> &Vector {
        &self.u
    }

    /// Dual multipliers of the equality constraints.
    pub fn v(&self) -> &Vector {
        &self.v
    }

    /// Current status.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Number of outer iterations performed.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Function value evaluations charged to the solved function.
    pub fn fcalls(&self) -> u64 {
        self.fcalls
    }

    /// Gradient evaluations charged to the solved function.
    pub fn gcalls(&self) -> u64 {
        self.gcalls
    }

    /// Hessian evaluations charged to the solved function.
    pub fn hcalls(&self) -> u64 {
        self.hcalls
    }

    /// Overwrite the iterate, value and gradient.
    pub fn update(&mut self, x: Vector, fx: Real, gx: Vector) {
        debug_assert_eq!(x.size(), self.x.size());
        self.x = x;
        self.fx = fx;
        self.gx = gx;
    }

    /// Replace the state only when `fx` improves on the current value;
    /// returns `true` when the update was performed.
    pub fn update_if_better(&mut self, x: &Vector, gx: &Vector, fx: Real) -> bool {
        if fx.is_finite() && fx < self.fx {
            self.x = x.clone();
            self.gx = gx.clone();
            self.fx = fx;
            true
        } else {
            false
        }
    }

    /// Store the Hessian computed at the current iterate.
    pub fn set_hessian(&mut self, hx: Matrix) {
        self.hx = Some(hx);
    }

    /// Record an accepted line-search step and its descent direction.
    pub fn set_step(&mut self, t: Real, d: &Vector) {
        self.t = t;
        self.d = d.clone();
    }

    /// Attach dual multipliers (constrained solvers).
    pub fn set_duals(&mut self, u: Vector, v: Vector) {
        self.u = u;
        self.v = v;
    }

    /// Bump the outer iteration counter.
    pub fn next_iteration(&mut self) {
        self.iterations += 1;
    }

    /// Snapshot the evaluation counters of the solved function.
    pub fn set_calls(&mut self, function: &dyn Function) {
        self.fcalls = function.meta().fcalls();
        self.gcalls = function.meta().gcalls();
        self.hcalls = function.meta().hcalls();
    }

    /// Set a terminal status; the transition is monotone, so later calls on
    /// a terminal state are ignored.
    pub fn finish(&mut self, status: Status) {
        if self.status == Status::Running {
            self.status = status;
        }
    }

    /// Return `true` when the iterate, value and gradient are all finite.
    pub fn is_valid(&self) -> bool {
        self.fx.is_finite() && self.x.all_finite() && self.gx.all_finite()
    }

    /// The relative gradient test `‖g‖∞ / max(1, |f|)`.
    pub fn gradient_test(&self) -> Real {
        self.gx.lp_norm_inf() / self.fx.abs().max(1.0)
    }
}

/// Wrapper deciding convergence for nonsmooth solvers: no significant
/// improvement of the function value and of the iterate over the last
/// `patience` updates.
#[derive(Debug)]
pub struct NonsmoothState {
    state: SolverState,
    iteration: usize,
    df_history: Vector,
    dx_history: Vector,
}

impl NonsmoothState {
    /// Wrap a freshly initialized state with the given patience.
    pub fn new(state: SolverState, patience: usize) -> Self {
        assert!(patience > 0);
        Self {
            state,
            iteration: 0,
            df_history: Vector::zeros(patience),
            dx_history: Vector::zeros(patience),
        }
    }

    /// The wrapped state.
    pub fn state(&self) -> &SolverState {
        &self.state
    }

    /// Mutable access to the wrapped state.
    pub fn state_mut(&mut self) -> &mut SolverState {
        &mut self.state
    }

    /// Consume the wrapper and return the tracked best state.
    pub fn into_state(self) -> SolverState {
        self.state
    }

    /// Track a candidate; the state is replaced only when the value improves
    /// and the improvement is recorded in the patience window.
    pub fn update_if_better(&mut self, x: &Vector, gx: &Vector, fx: Real) -> bool {
        let df = self.state.fx() - fx;
        let dx = (self.state.x() - x).lp_norm_inf();
        let updated = self.state.update_if_better(x, gx, fx);

        let patience = self.df_history.size();
        self.df_history[self.iteration % patience] = if updated { df } else { 0.0 };
        self.dx_history[self.iteration % patience] = if updated { dx } else { 0.0 };
        self.iteration += 1;
        updated
    }

    /// Return `true` when the recent improvements have dried up.
    pub fn converged(&self, epsilon: Real) -> bool {
        self.iteration >= self.df_history.size()
            && self.df_history.sum() < epsilon
            && self.dx_history.sum() < epsilon
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nl_function::functions::Sphere;

    #[test]
    fn construction_evaluates_value_and_gradient() {
        let function = Sphere::new(3);
        let x0 = Vector::from_slice(&[1.0, 2.0, 2.0]);
        let state = SolverState::new(&function, &x0);
        assert_eq!(state.fx(), 4.5);
        assert_eq!(state.gx().as_slice(), x0.as_slice());
        assert_eq!(state.status(), Status::Running);
    }

    #[test]
    fn update_if_better_only_improves() {
        let function = Sphere::new(2);
        let mut state = SolverState::new(&function, &Vector::from_slice(&[2.0, 0.0]));
        let better = Vector::from_slice(&[1.0, 0.0]);
        let worse = Vector::from_slice(&[3.0, 0.0]);

        assert!(state.update_if_better(&better, &better, 0.5));
        assert!(!state.update_if_better(&worse, &worse, 4.5));
        assert!(!state.update_if_better(&worse, &worse, Real::NAN));
        assert_eq!(state.fx(), 0.5);
    }

    #[test]
    fn status_is_monotone() {
        let function = Sphere::new(1);
        let mut state = SolverState::new(&function, &Vector::zeros(1));
        state.finish(Status::Converged);
        state.finish(Status::Failed);
        assert_eq!(state.status(), Status::Converged);
    }

    #[test]
    fn gradient_test_is_relative() {
        let function = Sphere::new(1);
        let state = SolverState::new(&function, &Vector::from_slice(&[4.0]));
        // f = 8, g = 4
        assert!((state.gradient_test() - 0.5).abs() < 1e-15);
    }

    #[test]
    fn nonsmooth_patience() {
        let function = Sphere::new(1);
        let state = SolverState::new(&function, &Vector::from_slice(&[1.0]));
        let mut wrapper = NonsmoothState::new(state, 3);

        // improvements keep it running
        let g = Vector::zeros(1);
        assert!(wrapper.update_if_better(&Vector::from_slice(&[0.5]), &g, 0.125));
        assert!(!wrapper.converged(1e-9));

        // three stalled updates in a row dry the window out
        for _ in 0..3 {
            wrapper.update_if_better(&Vector::from_slice(&[0.5]), &g, 0.125);
        }
        assert!(wrapper.converged(1e-9));
    }
}
