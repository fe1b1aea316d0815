//! End-to-end model, splitter, tuner and serialization scenarios.

use nonlin::core::stream::{read_configurable, write_configurable};
use nonlin::ml::dataset::make_synthetic_linear;
use nonlin::ml::tuner::SpaceKind;
use nonlin::ml::{splitters, tuners, GBoostModel, LinearModel, ParamSpace, Splitter, Tuner};
use nonlin::solver::{solvers, Solver};
use nonlin::tensor::Vector;

#[test]
fn lasso_recovers_the_sparse_generating_model() {
    // 4 relevant features (indices 0, 3, 6, 9) and noise-free targets
    let problem = make_synthetic_linear(200, 12, 3, 0.0, 42);
    let model = LinearModel::lasso();
    let fitted = model.fit(&problem.dataset, &problem.dataset.all_samples()).unwrap();

    for feature in 0..12 {
        if feature % 3 == 0 {
            assert!(
                fitted.weights[feature].abs() >= 1e-3,
                "relevant weight {feature} vanished: {}",
                fitted.weights[feature]
            );
        } else {
            assert!(
                fitted.weights[feature].abs() <= 1e-6,
                "irrelevant weight {feature} survived: {}",
                fitted.weights[feature]
            );
        }
    }
    assert!(
        (fitted.bias - problem.bias).abs() < 1e-6,
        "bias error {}",
        (fitted.bias - problem.bias).abs()
    );
}

#[test]
fn kfold_scenario_21_samples_5_folds() {
    let mut splitter = splitters().get("k-fold").unwrap();
    splitter.config_mut().set_int("splitter::seed", 42).unwrap();
    splitter.config_mut().set_int("splitter::folds", 5).unwrap();

    let samples: Vec<usize> = (0..21).collect();
    let splits = splitter.split(&samples).unwrap();

    let sizes: Vec<usize> = splits.iter().map(|(_, valid)| valid.len()).collect();
    assert_eq!(sizes, vec![4, 4, 4, 4, 5]);

    let mut union: Vec<usize> = splits.iter().flat_map(|(_, valid)| valid.iter().copied()).collect();
    union.sort_unstable();
    assert_eq!(union, samples);
}

#[test]
fn tuners_find_the_extremum_of_monotone_objectives() {
    let spaces = vec![ParamSpace::new(SpaceKind::Linear, Vector::from_fn(13, |i| i as f64)).unwrap()];

    for id in ["local-search", "surrogate"] {
        let tuner = tuners().get(id).unwrap();

        let mut decreasing = |values: &Vector| Ok(-values[0]);
        let steps = tuner.optimize(&spaces, &mut decreasing).unwrap();
        assert_eq!(steps[0].igrid, vec![12], "{id}: decreasing objective");

        let mut increasing = |values: &Vector| Ok(values[0]);
        let steps = tuner.optimize(&spaces, &mut increasing).unwrap();
        assert_eq!(steps[0].igrid, vec![0], "{id}: increasing objective");
    }
}

#[test]
fn configurable_round_trip_restores_parameters() {
    let mut solver = solvers().get("lbfgs").unwrap();
    solver.config_mut().set_float("solver::epsilon", 1e-9).unwrap();
    solver.config_mut().set_int("solver::lbfgs::history", 17).unwrap();

    let mut buffer = Vec::new();
    write_configurable(&mut buffer, solver.config()).unwrap();

    let mut restored = solvers().get("lbfgs").unwrap();
    read_configurable(&mut buffer.as_slice(), restored.config_mut()).unwrap();
    assert_eq!(solver.config(), restored.config());
    assert_eq!(restored.config().int("solver::lbfgs::history").unwrap(), 17);
}

#[test]
fn restored_solvers_produce_identical_iterates() {
    use nonlin::function::functions::Kinks;
    use nonlin::solver::{Logger, SolverState};

    let mut original = solvers().get("gs").unwrap();
    original.config_mut().set_int("solver::gs::seed", 123).unwrap();
    original.config_mut().set_int("solver::max_evals", 2_000).unwrap();

    let mut buffer = Vec::new();
    write_configurable(&mut buffer, original.config()).unwrap();
    let mut restored = solvers().get("gs").unwrap();
    read_configurable(&mut buffer.as_slice(), restored.config_mut()).unwrap();

    let run = |solver: &Box<dyn nonlin::solver::Solver>| {
        let mut iterates: Vec<Vec<f64>> = Vec::new();
        let mut collect = |state: &SolverState| {
            iterates.push(state.x().as_slice().to_vec());
            true
        };
        let mut logger = Logger::on(&mut collect);
        let function = Kinks::new(3, 7);
        solver.minimize(&function, &Vector::zeros(3), &mut logger).unwrap();
        iterates
    };
    assert_eq!(run(&original), run(&restored));
}

#[test]
fn gboost_fits_a_regression_target() {
    let problem = make_synthetic_linear(150, 3, 1, 0.0, 33);
    let samples = problem.dataset.all_samples();

    let mut model = GBoostModel::new();
    model.config_mut().set_enum("gboost::wlearner", "dtree").unwrap();
    model.config_mut().set_int("gboost::rounds", 200).unwrap();
    let fitted = model.fit(&problem.dataset, &samples).unwrap();

    let mean_error: f64 = samples
        .iter()
        .map(|&sample| {
            (fitted.predict(&problem.dataset.input(sample)) - problem.dataset.target(sample)).abs()
        })
        .sum::<f64>()
        / samples.len() as f64;
    assert!(mean_error < 0.25, "mean error {mean_error}");
}
