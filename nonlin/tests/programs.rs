//! End-to-end interior-point scenarios.

use nonlin::function::program::instances;
use nonlin::function::{LinearProgram, QuadraticProgram};
use nonlin::solver::interior::{kkt_residual_linear, kkt_residual_quadratic};
use nonlin::solver::{Logger, Solver, SolverIpm, Status};
use nonlin::tensor::{Matrix, Vector};

fn tight_solver() -> SolverIpm {
    let mut solver = SolverIpm::new();
    solver.config_mut().set_float("solver::epsilon", 1e-10).unwrap();
    solver
}

#[test]
fn standard_form_lp_scenario() {
    // min (1,1,1)·x s.t. [[2,1,0],[1,0,1]]x = (4,1), x >= 0
    let program = LinearProgram::new(Vector::constant(3, 1.0))
        .with_equality(
            Matrix::from_row_slice(2, 3, &[2.0, 1.0, 0.0, 1.0, 0.0, 1.0]),
            Vector::from_slice(&[4.0, 1.0]),
        )
        .unwrap()
        .with_nonnegative();

    let state = tight_solver().solve_linear(&program, &mut Logger::none()).unwrap();
    assert_eq!(state.status(), Status::Converged);
    assert!((state.x() - &Vector::from_slice(&[1.0, 2.0, 0.0])).lp_norm_inf() < 1e-8);
    assert!((state.fx() - 3.0).abs() < 1e-8);

    // primal residual, dual residual and complementarity all below 1e-8
    assert!(kkt_residual_linear(&program, &state) < 1e-8);
}

#[test]
fn equality_qp_scenario() {
    // min ½xᵀx − (2,3,5)·x s.t. Σx = 1
    let program = QuadraticProgram::new(Matrix::identity(3), Vector::from_slice(&[-2.0, -3.0, -5.0]))
        .unwrap()
        .with_equality(Matrix::from_row_slice(1, 3, &[1.0, 1.0, 1.0]), Vector::from_slice(&[1.0]))
        .unwrap();

    let state = tight_solver().solve_quadratic(&program, &mut Logger::none()).unwrap();
    assert_eq!(state.status(), Status::Converged);
    assert!((state.x().sum() - 1.0).abs() < 1e-10, "|Ax - b| = {}", (state.x().sum() - 1.0).abs());
    assert!((state.x() - &Vector::from_slice(&[-1.0, 0.0, 2.0])).lp_norm_inf() < 1e-8);
}

#[test]
fn textbook_instances_with_known_optima() {
    for seed in [11, 22, 33] {
        let instance = instances::cvx48b(5, -0.5, seed);
        let state = tight_solver().solve_linear(&instance.program, &mut Logger::none()).unwrap();
        assert_eq!(state.status(), Status::Converged, "cvx48b seed {seed}");
        assert!((state.fx() - instance.fbest.unwrap()).abs() < 1e-7, "cvx48b seed {seed}");

        let instance = instances::cvx49(6, seed);
        let state = tight_solver().solve_linear(&instance.program, &mut Logger::none()).unwrap();
        assert_eq!(state.status(), Status::Converged, "cvx49 seed {seed}");
        assert!(
            (state.x() - instance.xbest.as_ref().unwrap()).lp_norm_inf() < 1e-6,
            "cvx49 seed {seed}"
        );

        let instance = instances::numopt162(8, 4, seed);
        let state = tight_solver().solve_quadratic(&instance.program, &mut Logger::none()).unwrap();
        assert_eq!(state.status(), Status::Converged, "numopt162 seed {seed}");
        assert!(
            (state.x() - instance.xbest.as_ref().unwrap()).lp_norm_inf() < 1e-7,
            "numopt162 seed {seed}"
        );
    }
}

#[test]
fn random_qp_satisfies_the_kkt_conditions() {
    for seed in [5, 6] {
        let instance = instances::random_qp(6, 9, 1e-2, seed);
        let state = tight_solver().solve_quadratic(&instance.program, &mut Logger::none()).unwrap();
        assert_eq!(state.status(), Status::Converged, "seed {seed}");
        assert!(
            kkt_residual_quadratic(&instance.program, &state) < 1e-7,
            "seed {seed}: kkt residual {}",
            kkt_residual_quadratic(&instance.program, &state)
        );
        // multipliers of inactive constraints vanish
        let slack = &instance.program.h - &instance.program.g.mul_vec(state.x());
        for i in 0..slack.size() {
            if slack[i] > 1e-3 {
                assert!(state.u()[i] < 1e-5, "seed {seed}: active multiplier on slack {}", slack[i]);
            }
        }
    }
}

#[test]
fn bundle_dual_shape_qp_on_the_simplex() {
    // min ½‖Gᵀw‖² + eᵀw on the probability simplex, the inner problem of
    // the proximal bundle solvers
    let gradients = Matrix::from_row_slice(3, 2, &[1.0, 0.0, -1.0, 0.0, 0.0, 1.0]);
    let gram = &gradients * &gradients.transpose();
    let errors = Vector::from_slice(&[0.0, 0.0, 0.5]);

    let program = QuadraticProgram::new(gram, errors)
        .unwrap()
        .with_equality(Matrix::from_row_slice(1, 3, &[1.0, 1.0, 1.0]), Vector::from_slice(&[1.0]))
        .unwrap()
        .with_nonnegative();

    let state = tight_solver().solve_quadratic(&program, &mut Logger::none()).unwrap();
    assert_eq!(state.status(), Status::Converged);
    // the first two opposed gradients cancel: w ≈ (½, ½, 0)
    assert!((state.x() - &Vector::from_slice(&[0.5, 0.5, 0.0])).lp_norm_inf() < 1e-6);
}
