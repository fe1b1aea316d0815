//! Train/validation splitters.
//!
//! A splitter partitions sample indices into `folds` disjoint
//! `(train, valid)` pairs; both sides are returned sorted and the same seed
//! always yields identical folds.

use nl_core::{ensure, make_rng, Bounds, Configurable, Factory, Parameter, Result};
use rand::seq::SliceRandom;
use std::sync::OnceLock;

/// One `(train, valid)` split of a sample universe.
pub type Split = (Vec<usize>, Vec<usize>);

/// Generates `(train, valid)` splits for training, tuning and evaluating
/// machine-learning models.
pub trait Splitter: Send + Sync {
    /// Stable factory id.
    fn id(&self) -> &str;

    /// The registered parameters.
    fn config(&self) -> &Configurable;

    /// Mutable access to the registered parameters.
    fn config_mut(&mut self) -> &mut Configurable;

    /// Clone into a boxed trait object.
    fn clone_box(&self) -> Box<dyn Splitter>;

    /// Generate the splits for the given sample indices.
    fn split(&self, samples: &[usize]) -> Result<Vec<Split>>;
}

impl Clone for Box<dyn Splitter> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// The process-wide splitter registry.
pub fn splitters() -> &'static Factory<dyn Splitter> {
    static FACTORY: OnceLock<Factory<dyn Splitter>> = OnceLock::new();
    FACTORY.get_or_init(|| {
        let mut factory: Factory<dyn Splitter> = Factory::new();
        factory.add("k-fold", "shuffle-and-chunk k-fold cross-validation", || {
            Box::new(KFoldSplitter::new())
        });
        factory.add("random", "independently shuffled train/valid splits", || {
            Box::new(RandomSplitter::new())
        });
        factory
    })
}

fn common_config() -> Configurable {
    let mut config = Configurable::new();
    config
        .register(
            Parameter::integer("splitter::seed", 42, Bounds::closed(0, 1_000_000))
                .expect("static parameter defaults are valid"),
        )
        .expect("unique parameter name");
    config
        .register(
            Parameter::integer("splitter::folds", 5, Bounds::closed(2, 100))
                .expect("static parameter defaults are valid"),
        )
        .expect("unique parameter name");
    config
}

// ── k-fold ────────────────────────────────────────────────────────────────────

/// Shuffle once, chunk into `folds` validation blocks; the last fold
/// absorbs the remainder.
#[derive(Clone)]
pub struct KFoldSplitter {
    config: Configurable,
}

impl KFoldSplitter {
    /// Create with the default 5 folds.
    pub fn new() -> Self {
        Self { config: common_config() }
    }
}

impl Default for KFoldSplitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Splitter for KFoldSplitter {
    fn id(&self) -> &str {
        "k-fold"
    }

    fn config(&self) -> &Configurable {
        &self.config
    }

    fn config_mut(&mut self) -> &mut Configurable {
        &mut self.config
    }

    fn clone_box(&self) -> Box<dyn Splitter> {
        Box::new(self.clone())
    }

    fn split(&self, samples: &[usize]) -> Result<Vec<Split>> {
        let seed = self.config.int("splitter::seed")? as u64;
        let folds = self.config.size("splitter::folds")?;
        ensure!(samples.len() >= folds, "k-fold: {} samples for {folds} folds", samples.len());

        let mut shuffled = samples.to_vec();
        shuffled.shuffle(&mut make_rng(seed));

        let chunk = shuffled.len() / folds;
        let mut splits = Vec::with_capacity(folds);
        for fold in 0..folds {
            let valid_begin = fold * chunk;
            let valid_end = if fold + 1 < folds { valid_begin + chunk } else { shuffled.len() };

            let mut valid: Vec<usize> = shuffled[valid_begin..valid_end].to_vec();
            let mut train: Vec<usize> = shuffled[..valid_begin]
                .iter()
                .chain(shuffled[valid_end..].iter())
                .copied()
                .collect();

            train.sort_unstable();
            valid.sort_unstable();
            splits.push((train, valid));
        }
        Ok(splits)
    }
}

// ── random ────────────────────────────────────────────────────────────────────

/// Independently shuffled splits with a fixed training percentage.
#[derive(Clone)]
pub struct RandomSplitter {
    config: Configurable,
}

impl RandomSplitter {
    /// Create with the default 80% training share.
    pub fn new() -> Self {
        let mut config = common_config();
        config
            .register(
                Parameter::integer("splitter::random::train_per", 80, Bounds::closed(10, 90))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        Self { config }
    }
}

impl Default for RandomSplitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Splitter for RandomSplitter {
    fn id(&self) -> &str {
        "random"
    }

    fn config(&self) -> &Configurable {
        &self.config
    }

    fn config_mut(&mut self) -> &mut Configurable {
        &mut self.config
    }

    fn clone_box(&self) -> Box<dyn Splitter> {
        Box::new(self.clone())
    }

    fn split(&self, samples: &[usize]) -> Result<Vec<Split>> {
        let seed = self.config.int("splitter::seed")? as u64;
        let folds = self.config.size("splitter::folds")?;
        let train_per = self.config.size("splitter::random::train_per")?;
        ensure!(samples.len() >= 2, "random: at least 2 samples are needed");

        let train_size = (train_per * samples.len() / 100).max(1);
        let mut rng = make_rng(seed);
        let mut shuffled = samples.to_vec();

        let mut splits = Vec::with_capacity(folds);
        for _ in 0..folds {
            shuffled.shuffle(&mut rng);
            let mut train: Vec<usize> = shuffled[..train_size].to_vec();
            let mut valid: Vec<usize> = shuffled[train_size..].to_vec();
            train.sort_unstable();
            valid.sort_unstable();
            splits.push((train, valid));
        }
        Ok(splits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn check_invariants(splits: &[Split], universe: &[usize], covering: bool) {
        for (train, valid) in splits {
            assert!(train.windows(2).all(|w| w[0] < w[1]), "train not sorted/unique");
            assert!(valid.windows(2).all(|w| w[0] < w[1]), "valid not sorted/unique");
            assert!(!valid.iter().any(|v| train.binary_search(v).is_ok()), "not disjoint");
            assert_eq!(train.len() + valid.len(), universe.len(), "does not cover");
        }
        if covering {
            let mut all_valid: Vec<usize> = splits.iter().flat_map(|(_, v)| v.iter().copied()).collect();
            all_valid.sort_unstable();
            assert_eq!(all_valid, universe, "valid folds must cover the universe once");
        }
    }

    #[test]
    fn kfold_21_samples_5_folds_seed_42() {
        let mut splitter = KFoldSplitter::new();
        splitter.config_mut().set_int("splitter::seed", 42).unwrap();
        splitter.config_mut().set_int("splitter::folds", 5).unwrap();

        let samples: Vec<usize> = (0..21).collect();
        let splits = splitter.split(&samples).unwrap();

        let sizes: Vec<usize> = splits.iter().map(|(_, valid)| valid.len()).collect();
        assert_eq!(sizes, vec![4, 4, 4, 4, 5]);
        check_invariants(&splits, &samples, true);
    }

    #[test]
    fn same_seed_same_folds() {
        let splitter = KFoldSplitter::new();
        let samples: Vec<usize> = (0..30).collect();
        assert_eq!(splitter.split(&samples).unwrap(), splitter.split(&samples).unwrap());
    }

    #[test]
    fn random_splitter_respects_the_training_share() {
        let splitter = RandomSplitter::new();
        let samples: Vec<usize> = (0..50).collect();
        let splits = splitter.split(&samples).unwrap();
        assert_eq!(splits.len(), 5);
        for (train, valid) in &splits {
            assert_eq!(train.len(), 40);
            assert_eq!(valid.len(), 10);
        }
        check_invariants(&splits, &samples, false);
    }

    proptest! {
        #[test]
        fn kfold_invariants_hold_for_any_universe(samples in 10usize..60, folds in 2usize..8, seed in 0i64..1000) {
            let mut splitter = KFoldSplitter::new();
            splitter.config_mut().set_int("splitter::seed", seed).unwrap();
            splitter.config_mut().set_int("splitter::folds", folds as i64).unwrap();

            let universe: Vec<usize> = (0..samples).collect();
            if samples >= folds {
                let splits = splitter.split(&universe).unwrap();
                prop_assert_eq!(splits.len(), folds);
                check_invariants(&splits, &universe, true);
            }
        }
    }
}
