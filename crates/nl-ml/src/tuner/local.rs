//! Local-search tuner.

use super::{
    common_config, evaluate, local_search, max_igrid, min_igrid, seed_phase, ParamSpace, Tuner,
    TunerCallback, TunerStep,
};
use nl_core::{Configurable, Result};

/// Seed on a coarse grid, then refine with unit-radius local search around
/// the best step until the budget is exhausted or no neighbor improves.
#[derive(Clone)]
pub struct LocalSearchTuner {
    config: Configurable,
}

impl LocalSearchTuner {
    /// Create with the default evaluation budget.
    pub fn new() -> Self {
        Self { config: common_config() }
    }
}

impl Default for LocalSearchTuner {
    fn default() -> Self {
        Self::new()
    }
}

impl Tuner for LocalSearchTuner {
    fn id(&self) -> &str {
        "local-search"
    }

    fn config(&self) -> &Configurable {
        &self.config
    }

    fn config_mut(&mut self) -> &mut Configurable {
        &mut self.config
    }

    fn clone_box(&self) -> Box<dyn Tuner> {
        Box::new(self.clone())
    }

    fn optimize(&self, spaces: &[ParamSpace], callback: TunerCallback) -> Result<Vec<TunerStep>> {
        let max_evals = self.config.size("tuner::max_evals")?;

        let mut steps = Vec::new();
        seed_phase(spaces, callback, max_evals, &mut steps)?;

        let min = min_igrid(spaces);
        let max = max_igrid(spaces);
        while !steps.is_empty() && steps.len() < max_evals {
            let igrids = local_search(&min, &max, &steps[0].igrid, 1);
            if !evaluate(spaces, callback, igrids, &mut steps)? {
                break;
            }
        }
        Ok(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuner::SpaceKind;
    use nl_core::Real;
    use nl_tensor::Vector;

    #[test]
    fn monotone_objective_reaches_the_grid_extremum() {
        let spaces =
            vec![ParamSpace::new(SpaceKind::Linear, Vector::from_fn(17, |i| i as Real)).unwrap()];
        let tuner = LocalSearchTuner::new();

        // decreasing in the parameter: the best step must sit at the top end
        let mut callback = |values: &Vector| Ok(-values[0]);
        let steps = tuner.optimize(&spaces, &mut callback).unwrap();
        assert_eq!(steps[0].igrid, vec![16]);

        // increasing: the best step must sit at the bottom end
        let mut callback = |values: &Vector| Ok(values[0]);
        let steps = tuner.optimize(&spaces, &mut callback).unwrap();
        assert_eq!(steps[0].igrid, vec![0]);
    }

    #[test]
    fn two_dimensional_quadratic_bowl() {
        let spaces = vec![
            ParamSpace::new(SpaceKind::Linear, Vector::from_fn(11, |i| i as Real)).unwrap(),
            ParamSpace::new(SpaceKind::Linear, Vector::from_fn(11, |i| i as Real)).unwrap(),
        ];
        let tuner = LocalSearchTuner::new();
        let mut callback =
            |values: &Vector| Ok((values[0] - 3.0).powi(2) + (values[1] - 8.0).powi(2));
        let steps = tuner.optimize(&spaces, &mut callback).unwrap();
        assert_eq!(steps[0].igrid, vec![3, 8]);
    }

    #[test]
    fn history_is_sorted_best_first() {
        let spaces =
            vec![ParamSpace::new(SpaceKind::Linear, Vector::from_fn(9, |i| i as Real)).unwrap()];
        let tuner = LocalSearchTuner::new();
        let mut callback = |values: &Vector| Ok((values[0] - 5.0).abs());
        let steps = tuner.optimize(&spaces, &mut callback).unwrap();
        assert!(steps.windows(2).all(|pair| pair[0].score <= pair[1].score));
    }
}
