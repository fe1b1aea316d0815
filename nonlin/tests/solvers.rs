//! End-to-end solver checks over the benchmark corpus.

use nonlin::function::{BenchmarkBuilder, Function, FunctionFilter};
use nonlin::solver::{solvers, Logger, Solver, SolverState, Status};
use nonlin::tensor::Vector;

fn starting_points(dims: usize) -> Vec<Vector> {
    vec![
        Vector::constant(dims, 2.0),
        Vector::from_fn(dims, |i| if i % 2 == 0 { -1.5 } else { 0.5 }),
    ]
}

fn configured(id: &str, max_evals: i64) -> Box<dyn Solver> {
    let mut solver = solvers().get(id).unwrap();
    solver.config_mut().set_int("solver::max_evals", max_evals).unwrap();
    solver
}

#[test]
fn smooth_solvers_pass_the_gradient_test_on_the_convex_corpus() {
    let corpus = BenchmarkBuilder::new()
        .min_dims(4)
        .max_dims(8)
        .filter(FunctionFilter::ConvexSmooth)
        .build();

    for id in ["gd", "lbfgs", "cgd", "newton"] {
        let solver = configured(id, 100_000);
        for function in &corpus {
            for x0 in starting_points(function.size()) {
                let state = solver.minimize(function.as_ref(), &x0, &mut Logger::none()).unwrap();
                assert_eq!(
                    state.status(),
                    Status::Converged,
                    "{id} on {}: status {:?}",
                    function.name(),
                    state.status()
                );
                assert!(
                    state.gradient_test() < 1e-6,
                    "{id} on {}: gradient test {}",
                    function.name(),
                    state.gradient_test()
                );
            }
        }
    }
}

#[test]
fn nonsmooth_solvers_close_the_gap_on_the_convex_corpus() {
    let corpus = BenchmarkBuilder::new()
        .min_dims(4)
        .max_dims(4)
        .filter(FunctionFilter::ConvexNonsmooth)
        .build();

    for id in ["rqb", "fpba1", "fpba2", "osga"] {
        let solver = configured(id, 100_000);
        for function in &corpus {
            let state = solver
                .minimize(function.as_ref(), &Vector::constant(function.size(), 1.5), &mut Logger::none())
                .unwrap();
            let fbest = function.optimum().fx.expect("nonsmooth corpus has known optima");
            let gap = state.fx() - fbest;
            assert!(
                gap <= 1e-4 * fbest.abs().max(1.0),
                "{id} on {}: gap {gap}",
                function.name()
            );
        }
    }
}

#[test]
fn baseline_subgradient_methods_make_progress() {
    let corpus = BenchmarkBuilder::new()
        .min_dims(4)
        .max_dims(4)
        .filter(FunctionFilter::ConvexNonsmooth)
        .build();

    for id in ["sgm", "sda", "wda", "gs"] {
        let solver = configured(id, 200_000);
        for function in &corpus {
            let x0 = Vector::constant(function.size(), 1.5);
            let f0 = function.value(&x0);
            let state = solver.minimize(function.as_ref(), &x0, &mut Logger::none()).unwrap();
            let fbest = function.optimum().fx.expect("nonsmooth corpus has known optima");
            assert!(
                state.fx() <= f0 && state.fx() - fbest <= 1e-1 * fbest.abs().max(1.0),
                "{id} on {}: f {} from {f0} (best {fbest})",
                function.name(),
                state.fx()
            );
        }
    }
}

#[test]
fn lbfgs_is_monotonically_non_worse_than_gd() {
    let corpus = BenchmarkBuilder::new()
        .min_dims(4)
        .max_dims(8)
        .filter(FunctionFilter::ConvexSmooth)
        .build();

    let gd = configured("gd", 4_000);
    for history in [3i64, 6, 10, 20] {
        let mut lbfgs = configured("lbfgs", 4_000);
        lbfgs.config_mut().set_int("solver::lbfgs::history", history).unwrap();

        for function in &corpus {
            let x0 = Vector::constant(function.size(), 2.0);
            let gd_state = gd.minimize(function.as_ref(), &x0, &mut Logger::none()).unwrap();
            let lbfgs_state = lbfgs.minimize(function.as_ref(), &x0, &mut Logger::none()).unwrap();
            assert!(
                lbfgs_state.fx() <= gd_state.fx() + 1e-10 * gd_state.fx().abs().max(1.0),
                "history {history} on {}: lbfgs {} vs gd {}",
                function.name(),
                lbfgs_state.fx(),
                gd_state.fx()
            );
        }
    }
}

#[test]
fn sphere_and_rosenbrock_scenarios() {
    use nonlin::function::functions::{Rosenbrock, Sphere};

    let lbfgs = solvers().get("lbfgs").unwrap();

    let sphere = Sphere::new(5);
    let state = lbfgs.minimize(&sphere, &Vector::constant(5, 3.0), &mut Logger::none()).unwrap();
    assert_eq!(state.status(), Status::Converged);
    assert!(state.x().lp_norm_inf() < 1e-8);
    assert!(state.iterations() <= 30);

    let rosenbrock = Rosenbrock::new(2);
    let state = lbfgs
        .minimize(&rosenbrock, &Vector::from_slice(&[-1.2, 1.0]), &mut Logger::none())
        .unwrap();
    assert_eq!(state.status(), Status::Converged);
    assert!((state.x() - &Vector::constant(2, 1.0)).lp_norm_inf() < 1e-6);
    assert!(state.iterations() <= 100);
}

#[test]
fn cancellation_returns_the_best_state_so_far() {
    use nonlin::function::functions::Trid;

    let solver = solvers().get("gd").unwrap();
    let function = Trid::new(6);

    let mut iterations = 0usize;
    let mut cancel_after_three = |_state: &SolverState| {
        iterations += 1;
        iterations < 3
    };
    let mut logger = Logger::on(&mut cancel_after_three);
    let state = solver.minimize(&function, &Vector::zeros(6), &mut logger).unwrap();
    assert_eq!(state.status(), Status::Stopped);
    assert!(state.is_valid());
    assert_eq!(iterations, 3);
}

#[test]
fn fixed_seeds_reproduce_the_iterate_sequence() {
    use nonlin::function::functions::Kinks;

    let solver = solvers().get("gs").unwrap();
    let run = || {
        let mut iterates: Vec<Vec<f64>> = Vec::new();
        let mut collect = |state: &SolverState| {
            iterates.push(state.x().as_slice().to_vec());
            true
        };
        let mut logger = Logger::on(&mut collect);
        let function = Kinks::new(3, 42);
        solver.minimize(&function, &Vector::zeros(3), &mut logger).unwrap();
        iterates
    };
    assert_eq!(run(), run());
}
