//! Hyper-parameter tuning.
//!
//! A tuner receives a list of parameter spaces and a black-box callback
//! mapping parameter values to a score (the lower the better), and returns
//! the ordered history of evaluated steps with the best step first. Both
//! variants share a coarse seed phase: the grid center followed by
//! radius-doubling neighborhood expansion.

mod local;
mod space;
mod surrogate;

pub use local::LocalSearchTuner;
pub use space::{ParamSpace, SpaceKind};
pub use surrogate::SurrogateTuner;

use nl_core::{ensure, Bounds, Configurable, Factory, Parameter, Real, Result};
use nl_tensor::Vector;
use std::sync::OnceLock;

/// One tuning trial: grid indices, parameter values and score.
#[derive(Debug, Clone)]
pub struct TunerStep {
    /// Grid index per parameter space.
    pub igrid: Vec<usize>,
    /// The parameter values at those indices.
    pub values: Vector,
    /// The callback score (finite, the lower the better).
    pub score: Real,
}

/// The black-box evaluation callback.
pub type TunerCallback<'a> = &'a mut dyn FnMut(&Vector) -> Result<Real>;

/// A hyper-parameter tuning strategy.
pub trait Tuner: Send + Sync {
    /// Stable factory id.
    fn id(&self) -> &str;

    /// The registered parameters.
    fn config(&self) -> &Configurable;

    /// Mutable access to the registered parameters.
    fn config_mut(&mut self) -> &mut Configurable;

    /// Clone into a boxed trait object.
    fn clone_box(&self) -> Box<dyn Tuner>;

    /// Tune over the given spaces; the returned history is ordered with the
    /// best step first.
    fn optimize(&self, spaces: &[ParamSpace], callback: TunerCallback) -> Result<Vec<TunerStep>>;
}

impl Clone for Box<dyn Tuner> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// The process-wide tuner registry.
pub fn tuners() -> &'static Factory<dyn Tuner> {
    static FACTORY: OnceLock<Factory<dyn Tuner>> = OnceLock::new();
    FACTORY.get_or_init(|| {
        let mut factory: Factory<dyn Tuner> = Factory::new();
        factory.add("local-search", "local search around the current optimum", || {
            Box::new(LocalSearchTuner::new())
        });
        factory.add("surrogate", "fit and minimize a quadratic surrogate function", || {
            Box::new(SurrogateTuner::new())
        });
        factory
    })
}

pub(crate) fn common_config() -> Configurable {
    let mut config = Configurable::new();
    config
        .register(
            Parameter::integer("tuner::max_evals", 100, Bounds::closed(10, 1000))
                .expect("static parameter defaults are valid"),
        )
        .expect("unique parameter name");
    config
}

// ── Grid utilities ────────────────────────────────────────────────────────────

pub(crate) fn min_igrid(spaces: &[ParamSpace]) -> Vec<usize> {
    vec![0; spaces.len()]
}

pub(crate) fn max_igrid(spaces: &[ParamSpace]) -> Vec<usize> {
    spaces.iter().map(|space| space.len() - 1).collect()
}

pub(crate) fn avg_igrid(spaces: &[ParamSpace]) -> Vec<usize> {
    spaces.iter().map(|space| space.len() / 2).collect()
}

pub(crate) fn map_to_values(spaces: &[ParamSpace], igrid: &[usize]) -> Vector {
    Vector::from_fn(spaces.len(), |dim| spaces[dim].value(igrid[dim]))
}

/// All grid points at offsets `{−radius, 0, +radius}` per dimension around
/// `source`, clamped to the grid and deduplicated.
pub(crate) fn local_search(
    min: &[usize],
    max: &[usize],
    source: &[usize],
    radius: usize,
) -> Vec<Vec<usize>> {
    let dims = source.len();
    let mut igrids: Vec<Vec<usize>> = Vec::new();

    let combinations = 3usize.pow(dims as u32);
    for combination in 0..combinations {
        let mut igrid = source.to_vec();
        let mut code = combination;
        for dim in 0..dims {
            let offset = code % 3;
            code /= 3;
            igrid[dim] = match offset {
                0 => igrid[dim],
                1 => igrid[dim].saturating_sub(radius).max(min[dim]),
                _ => (igrid[dim] + radius).min(max[dim]),
            };
        }
        if !igrids.contains(&igrid) {
            igrids.push(igrid);
        }
    }
    igrids
}

/// Evaluate the not-yet-visited grid points and merge them into `steps`
/// (kept sorted, best first). Returns `true` if anything new was evaluated.
pub(crate) fn evaluate(
    spaces: &[ParamSpace],
    callback: &mut dyn FnMut(&Vector) -> Result<Real>,
    igrids: Vec<Vec<usize>>,
    steps: &mut Vec<TunerStep>,
) -> Result<bool> {
    let mut any = false;
    for igrid in igrids {
        if steps.iter().any(|step| step.igrid == igrid) {
            continue;
        }
        let values = map_to_values(spaces, &igrid);
        let score = callback(&values)?;
        if !score.is_finite() {
            continue;
        }
        steps.push(TunerStep { igrid, values, score });
        any = true;
    }
    steps.sort_by(|lhs, rhs| lhs.score.partial_cmp(&rhs.score).expect("scores are finite"));
    Ok(any)
}

/// The shared seed phase: grid center, then radius-doubling neighborhoods.
pub(crate) fn seed_phase(
    spaces: &[ParamSpace],
    callback: &mut dyn FnMut(&Vector) -> Result<Real>,
    max_evals: usize,
    steps: &mut Vec<TunerStep>,
) -> Result<()> {
    ensure!(!spaces.is_empty(), "tuner: at least one parameter space is needed");

    let min = min_igrid(spaces);
    let max = max_igrid(spaces);
    evaluate(spaces, callback, vec![avg_igrid(spaces)], steps)?;

    let mut radius = 2;
    while !steps.is_empty() && steps.len() < max_evals / 2 {
        let igrids = local_search(&min, &max, &steps[0].igrid, radius);
        if !evaluate(spaces, callback, igrids, steps)? {
            break;
        }
        radius *= 2;
    }
    Ok(())
}
