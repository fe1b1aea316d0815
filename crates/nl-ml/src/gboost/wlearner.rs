//! Weak learners for gradient boosting.
//!
//! Every learner fits the pseudo-residuals over the given samples by
//! scanning single features (missing values are skipped) and returns its
//! residual sum of squares, so the boosting round can pick the best one.

use crate::dataset::Dataset;
use nl_core::{ensure, Factory, Real, Result};
use nl_tensor::Vector;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// A weak learner fitted to pseudo-residuals.
pub trait WLearner: Send + Sync {
    /// Stable factory id.
    fn id(&self) -> &str;

    /// Clone into a boxed trait object.
    fn clone_box(&self) -> Box<dyn WLearner>;

    /// Fit the residuals over `samples`; returns the residual sum of
    /// squares of the fitted learner (lower is better).
    fn fit(&mut self, dataset: &Dataset, samples: &[usize], residuals: &Vector) -> Result<Real>;

    /// Predict the correction for one feature vector.
    fn predict(&self, input: &Vector) -> Real;

    /// Scale the learner output (applied by the boosting line-search).
    fn scale(&mut self, factor: Real);
}

impl Clone for Box<dyn WLearner> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// The process-wide weak-learner registry.
pub fn wlearners() -> &'static Factory<dyn WLearner> {
    static FACTORY: OnceLock<Factory<dyn WLearner>> = OnceLock::new();
    FACTORY.get_or_init(|| {
        let mut factory: Factory<dyn WLearner> = Factory::new();
        factory.add("affine", "per-feature affine transformation", || Box::new(AffineWLearner::default()));
        factory.add("stump", "two-sided decision stump", || Box::new(StumpWLearner::default()));
        factory.add("hinge", "one-sided ramp", || Box::new(HingeWLearner::default()));
        factory.add("table", "look-up table over discrete feature values", || {
            Box::new(TableWLearner::default())
        });
        factory.add("step", "one-sided constant", || Box::new(StepWLearner::default()));
        factory.add("dtree", "depth-limited tree of stumps", || Box::new(DTreeWLearner::default()));
        factory
    })
}

fn residual_norm(samples: &[usize], residuals: &Vector) -> Real {
    samples.iter().map(|&sample| residuals[sample] * residuals[sample]).sum()
}

/// Present `(value, residual)` pairs of one feature, sorted by value.
fn sorted_column(dataset: &Dataset, samples: &[usize], feature: usize, residuals: &Vector) -> Vec<(Real, Real)> {
    let mut column: Vec<(Real, Real)> = samples
        .iter()
        .filter(|&&sample| dataset.has_value(sample, feature))
        .map(|&sample| (dataset.value(sample, feature), residuals[sample]))
        .collect();
    column.sort_by(|lhs, rhs| lhs.0.partial_cmp(&rhs.0).expect("finite feature values"));
    column
}

// ── Affine ────────────────────────────────────────────────────────────────────

/// `affine(x) = a·x(feature) + b` (zero when the feature is missing).
#[derive(Debug, Clone, Default)]
pub struct AffineWLearner {
    feature: usize,
    slope: Real,
    intercept: Real,
}

impl WLearner for AffineWLearner {
    fn id(&self) -> &str {
        "affine"
    }

    fn clone_box(&self) -> Box<dyn WLearner> {
        Box::new(self.clone())
    }

    fn fit(&mut self, dataset: &Dataset, samples: &[usize], residuals: &Vector) -> Result<Real> {
        ensure!(!samples.is_empty(), "affine: no samples to fit");
        let mut best = Real::INFINITY;

        for feature in 0..dataset.features() {
            let column = sorted_column(dataset, samples, feature, residuals);
            let count = column.len() as Real;
            if column.len() < 2 {
                continue;
            }

            let sum_v: Real = column.iter().map(|(value, _)| value).sum();
            let sum_r: Real = column.iter().map(|(_, residual)| residual).sum();
            let sum_vv: Real = column.iter().map(|(value, _)| value * value).sum();
            let sum_vr: Real = column.iter().map(|(value, residual)| value * residual).sum();

            let denominator = count * sum_vv - sum_v * sum_v;
            if denominator.abs() < nl_core::EPSILON0 {
                continue;
            }
            let slope = (count * sum_vr - sum_v * sum_r) / denominator;
            let intercept = (sum_r - slope * sum_v) / count;

            let score: Real = column
                .iter()
                .map(|(value, residual)| {
                    let delta = slope * value + intercept - residual;
                    delta * delta
                })
                .sum();
            if score < best {
                best = score;
                self.feature = feature;
                self.slope = slope;
                self.intercept = intercept;
            }
        }
        ensure!(best.is_finite(), "affine: no usable feature");
        Ok(best)
    }

    fn predict(&self, input: &Vector) -> Real {
        self.slope * input[self.feature] + self.intercept
    }

    fn scale(&mut self, factor: Real) {
        self.slope *= factor;
        self.intercept *= factor;
    }
}

// ── Stump ─────────────────────────────────────────────────────────────────────

/// `stump(x) = v₁ if x(feature) < threshold else v₂`.
#[derive(Debug, Clone, Default)]
pub struct StumpWLearner {
    feature: usize,
    threshold: Real,
    below: Real,
    above: Real,
}

/// Best threshold split of one sorted column: `(threshold, below, above,
/// score)`.
fn best_split(column: &[(Real, Real)]) -> Option<(Real, Real, Real, Real)> {
    if column.len() < 2 {
        return None;
    }
    let total: Real = column.iter().map(|(_, residual)| residual).sum();
    let total_squares: Real = column.iter().map(|(_, residual)| residual * residual).sum();

    let mut best: Option<(Real, Real, Real, Real)> = None;
    let mut prefix = 0.0;
    for index in 0..column.len() - 1 {
        prefix += column[index].1;
        if column[index].0 == column[index + 1].0 {
            continue;
        }
        let left = (index + 1) as Real;
        let right = (column.len() - index - 1) as Real;
        let mean_left = prefix / left;
        let mean_right = (total - prefix) / right;
        let score = total_squares - left * mean_left * mean_left - right * mean_right * mean_right;

        if best.map_or(true, |(_, _, _, best_score)| score < best_score) {
            let threshold = 0.5 * (column[index].0 + column[index + 1].0);
            best = Some((threshold, mean_left, mean_right, score));
        }
    }
    best
}

impl WLearner for StumpWLearner {
    fn id(&self) -> &str {
        "stump"
    }

    fn clone_box(&self) -> Box<dyn WLearner> {
        Box::new(self.clone())
    }

    fn fit(&mut self, dataset: &Dataset, samples: &[usize], residuals: &Vector) -> Result<Real> {
        ensure!(!samples.is_empty(), "stump: no samples to fit");
        let mut best = Real::INFINITY;

        for feature in 0..dataset.features() {
            let column = sorted_column(dataset, samples, feature, residuals);
            if let Some((threshold, below, above, score)) = best_split(&column) {
                if score < best {
                    best = score;
                    self.feature = feature;
                    self.threshold = threshold;
                    self.below = below;
                    self.above = above;
                }
            }
        }
        ensure!(best.is_finite(), "stump: no usable feature");
        Ok(best)
    }

    fn predict(&self, input: &Vector) -> Real {
        if input[self.feature] < self.threshold {
            self.below
        } else {
            self.above
        }
    }

    fn scale(&mut self, factor: Real) {
        self.below *= factor;
        self.above *= factor;
    }
}

// ── Hinge ─────────────────────────────────────────────────────────────────────

/// `hinge(x) = β·max(0, ±(x(feature) − threshold))` — a one-sided ramp in
/// either orientation.
#[derive(Debug, Clone, Default)]
pub struct HingeWLearner {
    feature: usize,
    threshold: Real,
    beta: Real,
    positive_side: bool,
}

impl HingeWLearner {
    fn ramp(&self, value: Real) -> Real {
        if self.positive_side {
            (value - self.threshold).max(0.0)
        } else {
            (self.threshold - value).max(0.0)
        }
    }
}

impl WLearner for HingeWLearner {
    fn id(&self) -> &str {
        "hinge"
    }

    fn clone_box(&self) -> Box<dyn WLearner> {
        Box::new(self.clone())
    }

    fn fit(&mut self, dataset: &Dataset, samples: &[usize], residuals: &Vector) -> Result<Real> {
        ensure!(!samples.is_empty(), "hinge: no samples to fit");
        let mut best = Real::INFINITY;

        for feature in 0..dataset.features() {
            let column = sorted_column(dataset, samples, feature, residuals);
            if column.len() < 2 {
                continue;
            }
            let total_squares: Real = column.iter().map(|(_, residual)| residual * residual).sum();

            for index in 0..column.len() - 1 {
                if column[index].0 == column[index + 1].0 {
                    continue;
                }
                let threshold = 0.5 * (column[index].0 + column[index + 1].0);
                for positive_side in [true, false] {
                    let phi = |value: Real| {
                        if positive_side {
                            (value - threshold).max(0.0)
                        } else {
                            (threshold - value).max(0.0)
                        }
                    };
                    let sum_pr: Real = column.iter().map(|(value, residual)| phi(*value) * residual).sum();
                    let sum_pp: Real = column.iter().map(|(value, _)| phi(*value) * phi(*value)).sum();
                    if sum_pp < nl_core::EPSILON0 {
                        continue;
                    }
                    let beta = sum_pr / sum_pp;
                    let score = total_squares - beta * sum_pr;
                    if score < best {
                        best = score;
                        self.feature = feature;
                        self.threshold = threshold;
                        self.beta = beta;
                        self.positive_side = positive_side;
                    }
                }
            }
        }
        ensure!(best.is_finite(), "hinge: no usable feature");
        Ok(best)
    }

    fn predict(&self, input: &Vector) -> Real {
        self.beta * self.ramp(input[self.feature])
    }

    fn scale(&mut self, factor: Real) {
        self.beta *= factor;
    }
}

// ── Table ─────────────────────────────────────────────────────────────────────

/// Look-up table over rounded discrete feature values; unknown values map
/// to zero.
#[derive(Debug, Clone, Default)]
pub struct TableWLearner {
    feature: usize,
    table: BTreeMap<i64, Real>,
}

impl WLearner for TableWLearner {
    fn id(&self) -> &str {
        "table"
    }

    fn clone_box(&self) -> Box<dyn WLearner> {
        Box::new(self.clone())
    }

    fn fit(&mut self, dataset: &Dataset, samples: &[usize], residuals: &Vector) -> Result<Real> {
        ensure!(!samples.is_empty(), "table: no samples to fit");
        let mut best = Real::INFINITY;

        for feature in 0..dataset.features() {
            let mut sums: BTreeMap<i64, (Real, usize)> = BTreeMap::new();
            let mut total_squares = 0.0;
            for &sample in samples {
                if !dataset.has_value(sample, feature) {
                    continue;
                }
                let key = dataset.value(sample, feature).round() as i64;
                let residual = residuals[sample];
                total_squares += residual * residual;
                let entry = sums.entry(key).or_insert((0.0, 0));
                entry.0 += residual;
                entry.1 += 1;
            }
            if sums.len() < 2 {
                continue;
            }

            let mut score = total_squares;
            let mut table = BTreeMap::new();
            for (key, (sum, count)) in &sums {
                let mean = sum / *count as Real;
                score -= *count as Real * mean * mean;
                table.insert(*key, mean);
            }
            if score < best {
                best = score;
                self.feature = feature;
                self.table = table;
            }
        }
        ensure!(best.is_finite(), "table: no usable discrete feature");
        Ok(best)
    }

    fn predict(&self, input: &Vector) -> Real {
        let key = input[self.feature].round() as i64;
        self.table.get(&key).copied().unwrap_or(0.0)
    }

    fn scale(&mut self, factor: Real) {
        for value in self.table.values_mut() {
            *value *= factor;
        }
    }
}

// ── Step ──────────────────────────────────────────────────────────────────────

/// `step(x) = v if x(feature) ≥ threshold else 0`.
#[derive(Debug, Clone, Default)]
pub struct StepWLearner {
    feature: usize,
    threshold: Real,
    value: Real,
}

impl WLearner for StepWLearner {
    fn id(&self) -> &str {
        "step"
    }

    fn clone_box(&self) -> Box<dyn WLearner> {
        Box::new(self.clone())
    }

    fn fit(&mut self, dataset: &Dataset, samples: &[usize], residuals: &Vector) -> Result<Real> {
        ensure!(!samples.is_empty(), "step: no samples to fit");
        let mut best = Real::INFINITY;

        for feature in 0..dataset.features() {
            let column = sorted_column(dataset, samples, feature, residuals);
            if column.len() < 2 {
                continue;
            }
            let total_squares: Real = column.iter().map(|(_, residual)| residual * residual).sum();
            let total: Real = column.iter().map(|(_, residual)| residual).sum();

            let mut prefix = 0.0;
            for index in 0..column.len() - 1 {
                prefix += column[index].1;
                if column[index].0 == column[index + 1].0 {
                    continue;
                }
                let right = (column.len() - index - 1) as Real;
                let mean_right = (total - prefix) / right;
                let score = total_squares - right * mean_right * mean_right;
                if score < best {
                    best = score;
                    self.feature = feature;
                    self.threshold = 0.5 * (column[index].0 + column[index + 1].0);
                    self.value = mean_right;
                }
            }
        }
        ensure!(best.is_finite(), "step: no usable feature");
        Ok(best)
    }

    fn predict(&self, input: &Vector) -> Real {
        if input[self.feature] >= self.threshold {
            self.value
        } else {
            0.0
        }
    }

    fn scale(&mut self, factor: Real) {
        self.value *= factor;
    }
}

// ── Decision tree ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum TreeNode {
    Leaf(Real),
    Split { feature: usize, threshold: Real, below: Box<TreeNode>, above: Box<TreeNode> },
}

/// A depth-limited regression tree of stump splits.
#[derive(Debug, Clone)]
pub struct DTreeWLearner {
    depth: usize,
    root: TreeNode,
}

impl Default for DTreeWLearner {
    fn default() -> Self {
        Self { depth: 2, root: TreeNode::Leaf(0.0) }
    }
}

impl DTreeWLearner {
    /// Create a tree learner with the given maximum depth.
    pub fn with_depth(depth: usize) -> Self {
        assert!(depth >= 1);
        Self { depth, root: TreeNode::Leaf(0.0) }
    }

    fn fit_node(
        dataset: &Dataset,
        samples: &[usize],
        residuals: &Vector,
        depth: usize,
    ) -> (TreeNode, Real) {
        let mean = samples.iter().map(|&sample| residuals[sample]).sum::<Real>()
            / samples.len().max(1) as Real;
        let leaf_score: Real = samples
            .iter()
            .map(|&sample| {
                let delta = residuals[sample] - mean;
                delta * delta
            })
            .sum();
        if depth == 0 || samples.len() < 4 {
            return (TreeNode::Leaf(mean), leaf_score);
        }

        // best stump split across features
        let mut best: Option<(usize, Real, Real)> = None;
        for feature in 0..dataset.features() {
            let column = sorted_column(dataset, samples, feature, residuals);
            if let Some((threshold, _, _, score)) = best_split(&column) {
                if best.map_or(true, |(_, _, best_score)| score < best_score) {
                    best = Some((feature, threshold, score));
                }
            }
        }
        let Some((feature, threshold, split_score)) = best else {
            return (TreeNode::Leaf(mean), leaf_score);
        };
        if split_score >= leaf_score {
            return (TreeNode::Leaf(mean), leaf_score);
        }

        let below: Vec<usize> = samples
            .iter()
            .copied()
            .filter(|&sample| dataset.has_value(sample, feature) && dataset.value(sample, feature) < threshold)
            .collect();
        let above: Vec<usize> = samples
            .iter()
            .copied()
            .filter(|&sample| dataset.has_value(sample, feature) && dataset.value(sample, feature) >= threshold)
            .collect();
        if below.is_empty() || above.is_empty() {
            return (TreeNode::Leaf(mean), leaf_score);
        }

        let (left, left_score) = Self::fit_node(dataset, &below, residuals, depth - 1);
        let (right, right_score) = Self::fit_node(dataset, &above, residuals, depth - 1);
        (
            TreeNode::Split { feature, threshold, below: Box::new(left), above: Box::new(right) },
            left_score + right_score,
        )
    }

    fn predict_node(node: &TreeNode, input: &Vector) -> Real {
        match node {
            TreeNode::Leaf(value) => *value,
            TreeNode::Split { feature, threshold, below, above } => {
                if input[*feature] < *threshold {
                    Self::predict_node(below, input)
                } else {
                    Self::predict_node(above, input)
                }
            }
        }
    }

    fn scale_node(node: &mut TreeNode, factor: Real) {
        match node {
            TreeNode::Leaf(value) => *value *= factor,
            TreeNode::Split { below, above, .. } => {
                Self::scale_node(below, factor);
                Self::scale_node(above, factor);
            }
        }
    }
}

impl WLearner for DTreeWLearner {
    fn id(&self) -> &str {
        "dtree"
    }

    fn clone_box(&self) -> Box<dyn WLearner> {
        Box::new(self.clone())
    }

    fn fit(&mut self, dataset: &Dataset, samples: &[usize], residuals: &Vector) -> Result<Real> {
        ensure!(!samples.is_empty(), "dtree: no samples to fit");
        let (root, score) = Self::fit_node(dataset, samples, residuals, self.depth);
        self.root = root;
        Ok(score)
    }

    fn predict(&self, input: &Vector) -> Real {
        Self::predict_node(&self.root, input)
    }

    fn scale(&mut self, factor: Real) {
        Self::scale_node(&mut self.root, factor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nl_tensor::Matrix;

    fn staircase() -> (Dataset, Vector) {
        // residuals follow a step in the first feature
        let inputs = Matrix::from_fn(20, 2, |sample, feature| {
            if feature == 0 {
                sample as Real
            } else {
                0.5
            }
        });
        let residuals = Vector::from_fn(20, |sample| if sample < 10 { -1.0 } else { 1.0 });
        (Dataset::new(inputs, Vector::zeros(20)).unwrap(), residuals)
    }

    #[test]
    fn stump_finds_the_step() {
        let (dataset, residuals) = staircase();
        let samples = dataset.all_samples();
        let mut stump = StumpWLearner::default();
        let score = stump.fit(&dataset, &samples, &residuals).unwrap();

        assert!(score < 1e-12, "score = {score}");
        assert_eq!(stump.feature, 0);
        assert!((stump.threshold - 9.5).abs() < 1e-12);
        assert_eq!(stump.predict(&Vector::from_slice(&[3.0, 0.0])), -1.0);
        assert_eq!(stump.predict(&Vector::from_slice(&[15.0, 0.0])), 1.0);
    }

    #[test]
    fn affine_fits_a_linear_trend() {
        let inputs = Matrix::from_fn(10, 1, |sample, _| sample as Real);
        let residuals = Vector::from_fn(10, |sample| 2.0 * sample as Real + 1.0);
        let dataset = Dataset::new(inputs, Vector::zeros(10)).unwrap();

        let mut affine = AffineWLearner::default();
        let score = affine.fit(&dataset, &dataset.all_samples(), &residuals).unwrap();
        assert!(score < 1e-18);
        assert!((affine.slope - 2.0).abs() < 1e-10);
        assert!((affine.intercept - 1.0).abs() < 1e-10);
    }

    #[test]
    fn table_learns_discrete_levels() {
        let inputs = Matrix::from_fn(12, 1, |sample, _| (sample % 3) as Real);
        let residuals = Vector::from_fn(12, |sample| (sample % 3) as Real * 10.0);
        let dataset = Dataset::new(inputs, Vector::zeros(12)).unwrap();

        let mut table = TableWLearner::default();
        table.fit(&dataset, &dataset.all_samples(), &residuals).unwrap();
        assert_eq!(table.predict(&Vector::from_slice(&[2.0])), 20.0);
        assert_eq!(table.predict(&Vector::from_slice(&[7.0])), 0.0);
    }

    #[test]
    fn missing_values_are_skipped() {
        let (mut dataset, residuals) = staircase();
        for sample in 0..20 {
            dataset.set_missing(sample, 1);
        }
        let mut stump = StumpWLearner::default();
        stump.fit(&dataset, &dataset.all_samples(), &residuals).unwrap();
        assert_eq!(stump.feature, 0);
    }

    #[test]
    fn scaling_scales_predictions() {
        let (dataset, residuals) = staircase();
        let factory = wlearners();
        for id in factory.ids() {
            let mut learner = factory.get(id).unwrap();
            learner.fit(&dataset, &dataset.all_samples(), &residuals).unwrap();
            let input = Vector::from_slice(&[15.0, 0.5]);
            let before = learner.predict(&input);
            learner.scale(0.5);
            let after = learner.predict(&input);
            assert!((after - 0.5 * before).abs() < 1e-12, "{id}");
        }
    }

    #[test]
    fn dtree_outperforms_a_single_stump_on_two_steps() {
        // residuals with two steps need depth 2 to be captured
        let inputs = Matrix::from_fn(30, 1, |sample, _| sample as Real);
        let residuals = Vector::from_fn(30, |sample| match sample {
            0..=9 => -1.0,
            10..=19 => 0.0,
            _ => 2.0,
        });
        let dataset = Dataset::new(inputs, Vector::zeros(30)).unwrap();
        let samples = dataset.all_samples();

        let mut stump = StumpWLearner::default();
        let stump_score = stump.fit(&dataset, &samples, &residuals).unwrap();
        let mut tree = DTreeWLearner::with_depth(2);
        let tree_score = tree.fit(&dataset, &samples, &residuals).unwrap();
        assert!(tree_score < stump_score);
        assert_eq!(tree.predict(&Vector::from_slice(&[25.0])), 2.0);
    }
}
