//! Primal-dual interior-point solver for linear and quadratic programs.
//!
//! Infeasible-start Mehrotra-style predictor-corrector on the normalized
//! problem `min ½xᵀPx + qᵀx  s.t. Ax = b, Gx ≤ h`:
//!
//! - equality rows are reduced to full row rank up front;
//! - the data is rescaled by modified Ruiz equilibration;
//! - the Newton system is condensed to the symmetric KKT matrix and solved
//!   by LDLᵀ, falling back to MINRES when the factorization is not positive
//!   on the leading block;
//! - primal and dual step lengths are chosen independently from the largest
//!   positivity-preserving step, damped by `1 − (1−s₀)/(k+1)^γ`.

pub mod equilibration;
pub mod minres;

use crate::solver::{base_config, Logger, Solver};
use crate::state::{SolverState, Status};
use equilibration::{equilibrate, Scaling};
use minres::minres;
use nl_core::{ensure, Bounds, Configurable, Parameter, Real, Result};
use nl_function::{Function, LinearProgram, QuadraticProgram};
use nl_tensor::{matrix::reduce_rows, Matrix, Vector};
use tracing::debug;

const DIVERGENCE: Real = 1e+14;

/// The primal-dual interior-point solver.
pub struct SolverIpm {
    config: Configurable,
}

impl SolverIpm {
    /// Create with the default tolerances and step-length decay.
    pub fn new() -> Self {
        let mut config = base_config();
        config
            .register(
                Parameter::integer("solver::ipm::max_iterations", 100, Bounds::closed(10, 10000))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::float("solver::ipm::s0", 0.99, Bounds::open(0.0, 1.0))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::float("solver::ipm::gamma", 1.0, Bounds::open_closed(0.0, 10.0))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        Self { config }
    }

    /// Solve a linear program.
    pub fn solve_linear(&self, program: &LinearProgram, logger: &mut Logger) -> Result<SolverState> {
        let n = program.size();
        self.solve_program(
            ProgramData::new(
                Matrix::zeros(n, n),
                program.c.clone(),
                program.a.clone(),
                program.b.clone(),
                program.g.clone(),
                program.h.clone(),
            ),
            logger,
        )
    }

    /// Solve a quadratic program.
    pub fn solve_quadratic(&self, program: &QuadraticProgram, logger: &mut Logger) -> Result<SolverState> {
        self.solve_program(
            ProgramData::new(
                program.p.clone(),
                program.q.clone(),
                program.a.clone(),
                program.b.clone(),
                program.g.clone(),
                program.h.clone(),
            ),
            logger,
        )
    }

    fn solve_program(&self, mut data: ProgramData, logger: &mut Logger) -> Result<SolverState> {
        let epsilon = self.config.float("solver::epsilon")?;
        let max_iters = self.config.size("solver::ipm::max_iterations")?;
        let s0 = self.config.float("solver::ipm::s0")?;
        let gamma = self.config.float("solver::ipm::gamma")?;

        if data.g.rows() == 0 {
            self.solve_without_inequality(&data, epsilon)
        } else {
            self.solve_with_inequality(&mut data, epsilon, max_iters, s0, gamma, logger)
        }
    }

    /// Only equality constraints: a single symmetric KKT solve.
    fn solve_without_inequality(&self, data: &ProgramData, epsilon: Real) -> Result<SolverState> {
        let n = data.q.size();
        let neqs = data.b.size();

        let kkt = assemble_kkt(&data.p, &data.a, &Vector::zeros(0), &data.g);
        let mut rhs = Vector::zeros(n + neqs);
        rhs.set_segment(0, &data.b);
        rhs.set_segment(neqs, &(-&data.q));

        let mut solution = Vector::zeros(n + neqs);
        let solved = solve_kkt(&kkt, &rhs, n, &mut solution);

        let v_hat = solution.segment(0, neqs);
        let x_hat = solution.segment(neqs, n);
        let (x, u, v) = data.unscale(&x_hat, &Vector::zeros(0), &v_hat);

        let mut state = data.make_state(&x, &u, &v);
        if !solved || !state.is_valid() {
            state.finish(Status::Failed);
        } else {
            let (rdual, rprim, _, _) = data.residuals(&x, &u, &v);
            if rdual < epsilon && rprim < epsilon {
                state.finish(Status::Converged);
            } else if rprim >= epsilon {
                state.finish(Status::Unfeasible);
            } else {
                state.finish(Status::Unbounded);
            }
        }
        Ok(state)
    }

    /// The Mehrotra predictor-corrector loop.
    fn solve_with_inequality(
        &self,
        data: &mut ProgramData,
        epsilon: Real,
        max_iters: usize,
        s0: Real,
        gamma: Real,
        logger: &mut Logger,
    ) -> Result<SolverState> {
        let n = data.q.size();
        let neqs = data.b.size();
        let nineqs = data.h.size();
        let m = nineqs as Real;

        // strictly positive starting slacks and multipliers; the iterates
        // may start infeasible wrt both residuals
        let mut x = data.least_norm_start();
        let mut s = (&data.h - &data.g.mul_vec(&x)).map(|value| value.max(1.0));
        let mut u = Vector::constant(nineqs, 1.0);
        let mut v = Vector::zeros(neqs);

        let mut prev_objective = Real::INFINITY;
        let mut prev_dual_value = Real::INFINITY;

        for iteration in 0..max_iters {
            let (x0, u0, v0) = data.unscale(&x, &u, &v);
            let (rdual, rprim, eta, objective) = data.residuals(&x0, &u0, &v0);

            let mut state = data.make_state(&x0, &u0, &v0);
            for _ in 0..iteration {
                state.next_iteration();
            }
            debug!(iteration, rdual, rprim, eta, objective, "ipm");

            let qtx = data.q0.dot(&x0);
            if rdual.max(rprim).max(eta / qtx.abs().max(1.0)) < epsilon {
                state.finish(Status::Converged);
                return Ok(state);
            }
            if x0.lp_norm_inf() > DIVERGENCE && objective < prev_objective {
                state.finish(Status::Unbounded);
                return Ok(state);
            }
            let dual_value = data.b0.dot(&v0) + data.h0.dot(&u0);
            if u0.lp_norm_inf().max(v0.lp_norm_inf()) > DIVERGENCE && dual_value < prev_dual_value {
                state.finish(Status::Unfeasible);
                return Ok(state);
            }
            if !logger.call(&state) {
                state.finish(Status::Stopped);
                return Ok(state);
            }
            prev_objective = objective;
            prev_dual_value = dual_value;

            // scaled residuals drive the Newton step
            let rd = &(&data.p.mul_vec(&x) + &data.q) + &(&data.a.tr_mul_vec(&v) + &data.g.tr_mul_vec(&u));
            let rp_eq = &data.a.mul_vec(&x) - &data.b;
            let rp_in = &(&data.g.mul_vec(&x) + &s) - &data.h;
            let mu = u.dot(&s) / m;

            let w = u.component_div(&s);
            let kkt = assemble_kkt(&data.p, &data.a, &w, &data.g);

            // predictor: affine scaling direction (sigma = 0)
            let rc_aff = u.component_mul(&s);
            let (dx_aff, ds_aff, du_aff, _dv_aff, ok) =
                newton_step(data, &kkt, &w, &rd, &rp_eq, &rp_in, &rc_aff, &s, n, neqs);
            if !ok {
                let mut state = data.make_state(&x0, &u0, &v0);
                state.finish(Status::Failed);
                return Ok(state);
            }

            let alpha_p_aff = max_step(&s, &ds_aff);
            let alpha_d_aff = max_step(&u, &du_aff);
            let mu_aff = (&s + &(alpha_p_aff * &ds_aff)).dot(&(&u + &(alpha_d_aff * &du_aff))) / m;
            let sigma = (mu_aff / mu).powi(3).clamp(0.0, 1.0);

            // corrector: recentered complementarity with the affine product
            let mut rc = u.component_mul(&s);
            for i in 0..nineqs {
                rc[i] += ds_aff[i] * du_aff[i] - sigma * mu;
            }
            let (dx, ds, du, dv, ok) =
                newton_step(data, &kkt, &w, &rd, &rp_eq, &rp_in, &rc, &s, n, neqs);
            if !ok {
                let mut state = data.make_state(&x0, &u0, &v0);
                state.finish(Status::Failed);
                return Ok(state);
            }

            // geometrically decaying fraction-to-the-boundary step lengths
            let decay = 1.0 - (1.0 - s0) / ((iteration + 1) as Real).powf(gamma);
            let alpha_p = decay * max_step(&s, &ds);
            let alpha_d = decay * max_step(&u, &du);

            x += &(alpha_p * &dx);
            s += &(alpha_p * &ds);
            u += &(alpha_d * &du);
            v += &(alpha_d * &dv);
        }

        let (x0, u0, v0) = data.unscale(&x, &u, &v);
        let mut state = data.make_state(&x0, &u0, &v0);
        for _ in 0..max_iters {
            state.next_iteration();
        }
        state.finish(Status::MaxIters);
        Ok(state)
    }
}

impl Default for SolverIpm {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver for SolverIpm {
    fn id(&self) -> &str {
        "ipm"
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

    /// Probe a quadratic objective (constant Hessian, linear constraints)
    /// and run the program solver on it.
    fn minimize(&self, function: &dyn Function, x0: &Vector, logger: &mut Logger) -> Result<SolverState> {
        let n = function.size();
        ensure!(x0.size() == n, "ipm: x0 must be {n}-dimensional");

        let constraints = function.constraints();
        ensure!(
            constraints.quadratics().is_empty(),
            "ipm: only linear constraints are supported"
        );
        ensure!(
            constraints.n_equalities() + constraints.n_inequalities()
                == constraints.equality().map_or(0, |eq| eq.a().rows())
                    + constraints.inequality().map_or(0, |ineq| ineq.g().rows()),
            "ipm: only linear constraints are supported"
        );

        let origin = Vector::zeros(n);
        let mut q = Vector::zeros(n);
        let mut p = Matrix::zeros(n, n);
        function.evaluate(&origin, Some(&mut q), Some(&mut p));

        let (a, b) = match constraints.equality() {
            Some(eq) => (eq.a().clone(), eq.b().clone()),
            None => (Matrix::zeros(0, n), Vector::zeros(0)),
        };
        let (g, h) = match constraints.inequality() {
            Some(ineq) => (ineq.g().clone(), ineq.h().clone()),
            None => (Matrix::zeros(0, n), Vector::zeros(0)),
        };

        self.solve_program(ProgramData::new(p, q, a, b, g, h), logger)
    }
}

// ── Program data ──────────────────────────────────────────────────────────────

struct ProgramData {
    // original (row-reduced) data
    p0: Matrix,
    q0: Vector,
    a0: Matrix,
    b0: Vector,
    g0: Matrix,
    h0: Vector,
    // equilibrated data
    p: Matrix,
    q: Vector,
    a: Matrix,
    b: Vector,
    g: Matrix,
    h: Vector,
    scaling: Scaling,
}

impl ProgramData {
    fn new(p: Matrix, q: Vector, mut a: Matrix, mut b: Vector, g: Matrix, h: Vector) -> Self {
        if a.rows() > 0 {
            reduce_rows(&mut a, &mut b, nl_core::EPSILON1);
        }

        let (p0, q0, a0, b0, g0, h0) = (p.clone(), q.clone(), a.clone(), b.clone(), g.clone(), h.clone());
        let (mut p, mut q, mut a, mut b, mut g, mut h) = (p, q, a, b, g, h);
        let scaling = equilibrate(&mut p, &mut q, &mut a, &mut b, &mut g, &mut h);

        Self { p0, q0, a0, b0, g0, h0, p, q, a, b, g, h, scaling }
    }

    /// Least-norm point of the scaled equality constraints.
    fn least_norm_start(&self) -> Vector {
        let n = self.q.size();
        if self.a.rows() == 0 {
            return Vector::zeros(n);
        }
        let gram = &self.a * &self.a.transpose();
        match gram.lu_solve(&self.b) {
            Some(multipliers) => self.a.tr_mul_vec(&multipliers),
            None => Vector::zeros(n),
        }
    }

    /// Map scaled iterates back to the original units.
    fn unscale(&self, x: &Vector, u: &Vector, v: &Vector) -> (Vector, Vector, Vector) {
        (
            x.component_mul(&self.scaling.d),
            u.component_mul(&self.scaling.f),
            v.component_mul(&self.scaling.e),
        )
    }

    /// Original-units residuals: `(‖r_dual‖∞, ‖r_prim‖∞, η, objective)`.
    fn residuals(&self, x: &Vector, u: &Vector, v: &Vector) -> (Real, Real, Real, Real) {
        let mut rdual = &self.p0.mul_vec(x) + &self.q0;
        if self.a0.rows() > 0 {
            rdual += &self.a0.tr_mul_vec(v);
        }
        if self.g0.rows() > 0 {
            rdual += &self.g0.tr_mul_vec(u);
        }

        let rprim_eq = if self.a0.rows() > 0 {
            (&self.a0.mul_vec(x) - &self.b0).lp_norm_inf()
        } else {
            0.0
        };
        let (rprim_in, eta) = if self.g0.rows() > 0 {
            let slack = &self.h0 - &self.g0.mul_vec(x);
            ((-&slack).max().max(0.0), u.dot(&slack))
        } else {
            (0.0, 0.0)
        };

        let objective = 0.5 * self.p0.quadratic_form(x) + self.q0.dot(x);
        (rdual.lp_norm_inf(), rprim_eq.max(rprim_in), eta, objective)
    }

    fn make_state(&self, x: &Vector, u: &Vector, v: &Vector) -> SolverState {
        let objective = 0.5 * self.p0.quadratic_form(x) + self.q0.dot(x);
        let mut state = SolverState::from_point(x.clone(), objective);
        state.update(x.clone(), objective, &self.p0.mul_vec(x) + &self.q0);
        state.set_duals(u.clone(), v.clone());
        state
    }
}

// ── Newton system helpers ─────────────────────────────────────────────────────

/// The condensed symmetric KKT matrix, ordered `[v | x]`:
/// `[[0, A], [Aᵀ, P + GᵀWG]]`.
///
/// The equality block comes first so that the LDLᵀ factorization (which
/// eliminates trailing variables first) pivots on the positive block and
/// meets the equality rows only through their nonsingular negative Schur
/// complement.
fn assemble_kkt(p: &Matrix, a: &Matrix, w: &Vector, g: &Matrix) -> Matrix {
    let n = p.rows();
    let neqs = a.rows();

    let mut kkt = Matrix::zeros(n + neqs, n + neqs);
    let mut lower_right = p.clone();
    if w.size() > 0 {
        for i in 0..w.size() {
            let row = g.row(i);
            lower_right.rank1_update(w[i], &row, &row);
        }
    }
    kkt.set_block(neqs, neqs, &lower_right);
    if neqs > 0 {
        kkt.set_block(0, neqs, a);
        kkt.set_block(neqs, 0, &a.transpose());
    }
    kkt
}

/// Factor-and-solve the condensed system; MINRES when the LDLᵀ is not
/// positive on the leading block.
fn solve_kkt(kkt: &Matrix, rhs: &Vector, n: usize, solution: &mut Vector) -> bool {
    if let Some(ldlt) = kkt.ldlt() {
        let positive_pivots = ldlt.diagonal().iter().filter(|&&pivot| pivot > 0.0).count();
        if positive_pivots >= n {
            if let Some(direct) = ldlt.solve(rhs) {
                if direct.all_finite() {
                    *solution = direct;
                    return true;
                }
            }
        }
    }
    solution.fill(0.0);
    minres(kkt, rhs, solution, 20 * kkt.rows().max(10), 1e-12)
        || (&kkt.mul_vec(solution) - rhs).lp_norm_inf() < 1e-8
}

/// One condensed Newton solve for the given centrality residual.
#[allow(clippy::too_many_arguments)]
fn newton_step(
    data: &ProgramData,
    kkt: &Matrix,
    w: &Vector,
    rd: &Vector,
    rp_eq: &Vector,
    rp_in: &Vector,
    rc: &Vector,
    s: &Vector,
    n: usize,
    neqs: usize,
) -> (Vector, Vector, Vector, Vector, bool) {
    let nineqs = s.size();

    // the x-block rhs is -(r_dual + Gᵀ(w ∘ r_in − r_cent / s))
    let mut coupled = Vector::zeros(nineqs);
    for i in 0..nineqs {
        coupled[i] = w[i] * rp_in[i] - rc[i] / s[i];
    }
    let mut rhs = Vector::zeros(n + neqs);
    if neqs > 0 {
        rhs.set_segment(0, &-rp_eq);
    }
    rhs.set_segment(neqs, &-&(rd + &data.g.tr_mul_vec(&coupled)));

    let mut solution = Vector::zeros(n + neqs);
    let ok = solve_kkt(kkt, &rhs, n, &mut solution);

    let dv = solution.segment(0, neqs);
    let dx = solution.segment(neqs, n);

    let gdx = data.g.mul_vec(&dx);
    let mut ds = Vector::zeros(nineqs);
    let mut du = Vector::zeros(nineqs);
    for i in 0..nineqs {
        ds[i] = -rp_in[i] - gdx[i];
        du[i] = w[i] * (gdx[i] + rp_in[i]) - rc[i] / s[i];
    }
    let dx_finite = dx.all_finite();
    (dx, ds, du, dv, ok && dx_finite)
}

/// Largest step in `[0, 1]` keeping `z + α·dz` strictly positive.
fn max_step(z: &Vector, dz: &Vector) -> Real {
    let mut step: Real = 1.0;
    for i in 0..z.size() {
        if dz[i] < 0.0 {
            step = step.min(-z[i] / dz[i]);
        }
    }
    step
}

// ── KKT residuals for tests and consumers ─────────────────────────────────────

/// Maximum KKT residual of a linear program at `(x, u, v)`: dual
/// stationarity, primal feasibility, multiplier sign and complementarity.
pub fn kkt_residual_linear(program: &LinearProgram, state: &SolverState) -> Real {
    kkt_residual(
        &Matrix::zeros(program.size(), program.size()),
        &program.c,
        &program.a,
        &program.b,
        &program.g,
        &program.h,
        state,
    )
}

/// Maximum KKT residual of a quadratic program at `(x, u, v)`.
pub fn kkt_residual_quadratic(program: &QuadraticProgram, state: &SolverState) -> Real {
    kkt_residual(&program.p, &program.q, &program.a, &program.b, &program.g, &program.h, state)
}

#[allow(clippy::too_many_arguments)]
fn kkt_residual(
    p: &Matrix,
    q: &Vector,
    a: &Matrix,
    b: &Vector,
    g: &Matrix,
    h: &Vector,
    state: &SolverState,
) -> Real {
    let x = state.x();
    let u = state.u();
    let v = state.v();

    let mut rdual = &p.mul_vec(x) + q;
    if a.rows() > 0 {
        rdual += &a.tr_mul_vec(v);
    }
    if g.rows() > 0 {
        rdual += &g.tr_mul_vec(u);
    }
    let mut residual = rdual.lp_norm_inf();

    if a.rows() > 0 {
        residual = residual.max((&a.mul_vec(x) - b).lp_norm_inf());
    }
    if g.rows() > 0 {
        let slack = h - &g.mul_vec(x);
        residual = residual.max((-&slack).max().max(0.0));
        residual = residual.max((-u.min()).max(0.0));
        residual = residual.max(u.component_mul(&slack).lp_norm_inf());
    }
    residual
}

#[cfg(test)]
mod tests {
    use super::*;
    use nl_function::program::instances;

    fn solver() -> SolverIpm {
        SolverIpm::new()
    }

    #[test]
    fn standard_form_lp() {
        // min x0+x1+x2 s.t. 2x0+x1 = 4, x0+x2 = 1, x >= 0 -> x* = (1, 2, 0)
        let program = LinearProgram::new(Vector::constant(3, 1.0))
            .with_equality(
                Matrix::from_row_slice(2, 3, &[2.0, 1.0, 0.0, 1.0, 0.0, 1.0]),
                Vector::from_slice(&[4.0, 1.0]),
            )
            .unwrap()
            .with_nonnegative();

        let state = solver().solve_linear(&program, &mut Logger::none()).unwrap();
        assert_eq!(state.status(), Status::Converged);
        assert!((state.x() - &Vector::from_slice(&[1.0, 2.0, 0.0])).lp_norm_inf() < 1e-7);
        assert!((state.fx() - 3.0).abs() < 1e-7);
        assert!(kkt_residual_linear(&program, &state) < 1e-6);
    }

    #[test]
    fn equality_constrained_qp() {
        // min ½|x|² − (2,3,5)·x s.t. Σx = 1
        let program = QuadraticProgram::new(Matrix::identity(3), Vector::from_slice(&[-2.0, -3.0, -5.0]))
            .unwrap()
            .with_equality(Matrix::from_row_slice(1, 3, &[1.0, 1.0, 1.0]), Vector::from_slice(&[1.0]))
            .unwrap();

        let state = solver().solve_quadratic(&program, &mut Logger::none()).unwrap();
        assert_eq!(state.status(), Status::Converged);
        // x* = x0 − (Σx0 − 1)/3 with x0 = (2, 3, 5)
        assert!((state.x() - &Vector::from_slice(&[-1.0, 0.0, 2.0])).lp_norm_inf() < 1e-9);
        let ax = state.x().sum();
        assert!((ax - 1.0).abs() < 1e-10);
    }

    #[test]
    fn textbook_instances_converge() {
        for seed in [1, 2, 3] {
            let instance = instances::cvx48c(6, seed);
            let state = solver().solve_linear(&instance.program, &mut Logger::none()).unwrap();
            assert_eq!(state.status(), Status::Converged, "cvx48c seed {seed}");
            assert!(
                (state.fx() - instance.fbest.unwrap()).abs() < 1e-6,
                "cvx48c seed {seed}: f = {}, f* = {}",
                state.fx(),
                instance.fbest.unwrap()
            );

            let instance = instances::numopt162(7, 3, seed);
            let state = solver().solve_quadratic(&instance.program, &mut Logger::none()).unwrap();
            assert_eq!(state.status(), Status::Converged, "numopt162 seed {seed}");
            assert!(
                (state.x() - instance.xbest.as_ref().unwrap()).lp_norm_inf() < 1e-6,
                "numopt162 seed {seed}"
            );

            let instance = instances::numopt1625(6, seed);
            let state = solver().solve_quadratic(&instance.program, &mut Logger::none()).unwrap();
            assert_eq!(state.status(), Status::Converged, "numopt1625 seed {seed}");
            assert!((state.x() - instance.xbest.as_ref().unwrap()).lp_norm_inf() < 1e-6);
        }
    }

    #[test]
    fn random_qp_kkt() {
        let instance = instances::random_qp(8, 12, 1e-2, 42);
        let state = solver().solve_quadratic(&instance.program, &mut Logger::none()).unwrap();
        assert_eq!(state.status(), Status::Converged);
        assert!(kkt_residual_quadratic(&instance.program, &state) < 1e-6);
    }

    #[test]
    fn unbounded_lp_is_detected() {
        // min -x0 with x0 free below no bound: G: -x0 <= 0 binds from below only
        let program = LinearProgram::new(Vector::from_slice(&[-1.0, 0.0]))
            .with_inequality(Matrix::from_row_slice(1, 2, &[-1.0, 0.0]), Vector::from_slice(&[0.0]))
            .unwrap();
        let state = solver().solve_linear(&program, &mut Logger::none()).unwrap();
        assert!(
            matches!(state.status(), Status::Unbounded | Status::MaxIters),
            "status = {:?}",
            state.status()
        );
    }

    #[test]
    fn infeasible_lp_is_detected() {
        // x0 <= -1 and -x0 <= -1 cannot hold together
        let program = LinearProgram::new(Vector::from_slice(&[1.0]))
            .with_inequality(
                Matrix::from_row_slice(2, 1, &[1.0, -1.0]),
                Vector::from_slice(&[-1.0, -1.0]),
            )
            .unwrap();
        let state = solver().solve_linear(&program, &mut Logger::none()).unwrap();
        assert!(
            matches!(state.status(), Status::Unfeasible | Status::MaxIters),
            "status = {:?}",
            state.status()
        );
    }
}
