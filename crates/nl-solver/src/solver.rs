//! The solver interface and the process-wide solver factory.

use crate::lsearch0::{self, Lsearch0};
use crate::lsearchk::{self, Lsearchk};
use crate::state::{NonsmoothState, SolverState, Status};
use nl_core::{Configurable, Factory, Real, Result};
use nl_function::{Function, Smoothness};
use nl_tensor::Vector;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Cancellation and progress callback: invoked at the end of every outer
/// iteration; returning `false` stops the solver with [`Status::Stopped`].
pub struct Logger<'a> {
    callback: Option<&'a mut dyn FnMut(&SolverState) -> bool>,
}

impl<'a> Logger<'a> {
    /// A logger that never cancels.
    pub fn none() -> Self {
        Self { callback: None }
    }

    /// Wrap a callback.
    pub fn on(callback: &'a mut dyn FnMut(&SolverState) -> bool) -> Self {
        Self { callback: Some(callback) }
    }

    /// Invoke the callback; `true` means keep iterating.
    pub fn call(&mut self, state: &SolverState) -> bool {
        match &mut self.callback {
            Some(callback) => callback(state),
            None => true,
        }
    }
}

/// A numerical optimization method.
///
/// Solvers are configurable, clonable and registered in the process-wide
/// [`solvers`] factory under a stable string id.
pub trait Solver: Send + Sync {
    /// Stable factory id.
    fn id(&self) -> &str;

    /// The registered parameters.
    fn config(&self) -> &Configurable;

    /// Mutable access to the registered parameters.
    fn config_mut(&mut self) -> &mut Configurable;

    /// Clone into a boxed trait object.
    fn clone_box(&self) -> Box<dyn Solver>;

    /// Minimize `function` starting from `x0`.
    ///
    /// Preconditions surface as errors; numerical and convergence failures
    /// are reported through the status of the returned state.
    fn minimize(&self, function: &dyn Function, x0: &Vector, logger: &mut Logger) -> Result<SolverState>;
}

impl Clone for Box<dyn Solver> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// The process-wide solver registry, initialized once and read-only after.
pub fn solvers() -> &'static Factory<dyn Solver> {
    static FACTORY: OnceLock<Factory<dyn Solver>> = OnceLock::new();
    FACTORY.get_or_init(|| {
        let mut factory: Factory<dyn Solver> = Factory::new();
        factory.add("gd", "gradient descent", || Box::new(crate::gd::SolverGd::new()));
        factory.add("lbfgs", "limited-memory BFGS", || Box::new(crate::lbfgs::SolverLbfgs::new()));
        factory.add("cgd", "nonlinear conjugate gradient", || Box::new(crate::cgd::SolverCgd::new()));
        factory.add("newton", "line-search Newton", || Box::new(crate::newton::SolverNewton::new()));
        factory.add("sgm", "sub-gradient method", || Box::new(crate::sgm::SolverSgm::new()));
        factory.add("ellipsoid", "ellipsoid method with deep cuts", || {
            Box::new(crate::ellipsoid::SolverEllipsoid::new())
        });
        factory.add("osga", "optimal subgradient algorithm", || Box::new(crate::osga::SolverOsga::new()));
        factory.add("fgm", "universal fast gradient method", || Box::new(crate::fgm::SolverFgm::new()));
        factory.add("sda", "simple dual averages", || Box::new(crate::pdsgm::SolverPdsgm::sda()));
        factory.add("wda", "weighted dual averages", || Box::new(crate::pdsgm::SolverPdsgm::wda()));
        factory.add("gs", "gradient sampling", || Box::new(crate::gsample::SolverGs::new()));
        factory.add("rqb", "proximal bundle with reversal quasi-Newton updates", || {
            Box::new(crate::bundle::fpba::SolverBundle::rqb())
        });
        factory.add("fpba1", "fast proximal bundle algorithm (variant 1)", || {
            Box::new(crate::bundle::fpba::SolverBundle::fpba1())
        });
        factory.add("fpba2", "fast proximal bundle algorithm (variant 2)", || {
            Box::new(crate::bundle::fpba::SolverBundle::fpba2())
        });
        factory.add("ipm", "primal-dual interior-point method for LP/QP", || {
            Box::new(crate::interior::SolverIpm::new())
        });
        factory.add("penalty", "penalty method for nonlinear constraints", || {
            Box::new(crate::penalty::SolverPenalty::new())
        });
        factory.add("augmented-lagrangian", "practical augmented Lagrangian method", || {
            Box::new(crate::augmented::SolverAugmented::new())
        });
        factory
    })
}

// ── Shared configuration ──────────────────────────────────────────────────────

use nl_core::{Bounds, Parameter};

pub(crate) fn base_config() -> Configurable {
    let mut config = Configurable::new();
    config
        .register(
            Parameter::float("solver::epsilon", 1e-8, Bounds::open(0.0, 1.0))
                .expect("static parameter defaults are valid"),
        )
        .expect("unique parameter name");
    config
        .register(
            Parameter::integer("solver::max_evals", 5000, Bounds::closed(10, 1_000_000_000))
                .expect("static parameter defaults are valid"),
        )
        .expect("unique parameter name");
    config
        .register(
            Parameter::integer("solver::patience", 32, Bounds::closed(1, 1_000_000))
                .expect("static parameter defaults are valid"),
        )
        .expect("unique parameter name");
    config
}

pub(crate) fn with_lsearch(config: &mut Configurable, c1: Real, c2: Real, lsearch0_id: &str, lsearchk_id: &str) {
    config
        .register(
            Parameter::float_pair("solver::tolerance", (c1, c2), Bounds::open(0.0, 1.0))
                .expect("static parameter defaults are valid"),
        )
        .expect("unique parameter name");
    config
        .register(
            Parameter::enumeration("solver::lsearch0", lsearch0_id, &lsearch0::lsearch0s().ids())
                .expect("static parameter defaults are valid"),
        )
        .expect("unique parameter name");
    config
        .register(
            Parameter::enumeration("solver::lsearchk", lsearchk_id, &lsearchk::lsearchks().ids())
                .expect("static parameter defaults are valid"),
        )
        .expect("unique parameter name");
}

// ── Line-search driver ────────────────────────────────────────────────────────

/// One initial-length strategy plus one step refiner, assembled per
/// `minimize` call from the owning solver's configuration.
pub(crate) struct LsearchDriver {
    init: Box<dyn Lsearch0>,
    refine: Box<dyn Lsearchk>,
    iteration: usize,
}

impl LsearchDriver {
    pub(crate) fn from_config(config: &Configurable) -> Result<Self> {
        let (c1, c2) = config.float_pair("solver::tolerance")?;
        let epsilon = config.float("solver::epsilon")?;

        let init = lsearch0::lsearch0s().get(config.enumeration("solver::lsearch0")?)?;
        let mut refine = lsearchk::lsearchks().get(config.enumeration("solver::lsearchk")?)?;
        refine.config_mut().set_float_pair("lsearchk::tolerance", (c1, c2))?;

        let mut init = init;
        init.config_mut().set_float("lsearch0::epsilon", epsilon.min(1e-6))?;
        Ok(Self { init, refine, iteration: 0 })
    }

    /// Run one line search along `descent`; on success the state moves to
    /// the accepted point and the step is recorded.
    pub(crate) fn get(
        &mut self,
        function: &dyn Function,
        state: &mut SolverState,
        descent: &Vector,
    ) -> bool {
        let dg = descent.dot(state.gx());
        if !dg.is_finite() || dg >= 0.0 {
            debug!(solver.dg = dg, "line-search: not a descent direction");
            return false;
        }

        self.iteration += 1;
        let t0 = self
            .init
            .get(function, state, descent, self.iteration)
            .clamp(lsearchk::STPMIN, lsearchk::STPMAX);

        let result = self.refine.get(function, state, descent, t0);
        if result.ok && result.fx <= state.fx() && result.fx.is_finite() {
            state.update(result.x, result.fx, result.gx);
            state.set_step(result.t, descent);
            true
        } else {
            false
        }
    }
}

// ── Shared stopping tests ─────────────────────────────────────────────────────

/// Gradient-test bookkeeping shared by the smooth solvers; returns `true`
/// when the outer loop must stop.
pub(crate) fn done_gradient_test(
    state: &mut SolverState,
    function: &dyn Function,
    epsilon: Real,
    iter_ok: bool,
    logger: &mut Logger,
) -> bool {
    state.set_calls(function);
    state.next_iteration();

    if !iter_ok || !state.is_valid() {
        state.finish(Status::Failed);
        return true;
    }
    if state.gradient_test() < epsilon {
        state.finish(Status::Converged);
        return true;
    }
    if !logger.call(state) {
        state.finish(Status::Stopped);
        return true;
    }
    false
}

/// Value-test bookkeeping shared by the nonsmooth solvers; returns `true`
/// when the outer loop must stop.
pub(crate) fn done_value_test(
    tracked: &mut NonsmoothState,
    function: &dyn Function,
    epsilon: Real,
    logger: &mut Logger,
) -> bool {
    tracked.state_mut().set_calls(function);
    tracked.state_mut().next_iteration();

    if !tracked.state().is_valid() {
        tracked.state_mut().finish(Status::Failed);
        return true;
    }
    if tracked.converged(epsilon) {
        tracked.state_mut().finish(Status::Converged);
        return true;
    }
    if !logger.call(tracked.state()) {
        tracked.state_mut().finish(Status::Stopped);
        return true;
    }
    false
}

/// Emit a warning when a solver is applied outside its comfort zone.
pub(crate) fn warn_nonsmooth(solver_id: &str, function: &dyn Function) {
    if function.smoothness() == Smoothness::Nonsmooth {
        warn!(solver = solver_id, function = %function.name(), "applied to a nonsmooth function");
    }
}

/// Emit a warning when a solver ignores the attached constraints.
pub(crate) fn warn_constrained(solver_id: &str, function: &dyn Function) {
    if !function.constraints().is_empty() {
        warn!(solver = solver_id, function = %function.name(), "the functional constraints are ignored");
    }
}
