//! The linear empirical-risk-minimization objective.

use crate::loss::Loss;
use nl_core::Real;
use nl_function::{Convexity, Function, FunctionMeta, Smoothness};
use nl_tensor::{Matrix, Vector};
use rayon::prelude::*;

const CHUNK: usize = 1024;

/// Per-chunk partial results, reduced in chunk order so the sum is
/// deterministic regardless of the worker schedule.
struct Accumulator {
    fx: Real,
    gw: Vector,
    gb: Real,
}

impl Accumulator {
    fn zero(features: usize) -> Self {
        Self { fx: 0.0, gw: Vector::zeros(features), gb: 0.0 }
    }

    fn merge(mut self, other: Accumulator) -> Self {
        self.fx += other.fx;
        self.gw += &other.gw;
        self.gb += other.gb;
        self
    }
}

/// `F(w, b) = 1/(2N) Σᵢ ℓ(w·xᵢ + b, yᵢ) + α₁‖w‖₁ + ½α₂‖w‖²` over the
/// flattened variable `[w | b]`.
pub struct ErmFunction {
    meta: FunctionMeta,
    inputs: Matrix,
    targets: Vector,
    weights: Vector,
    loss: Box<dyn Loss>,
    alpha1: Real,
    alpha2: Real,
}

impl ErmFunction {
    /// Create the criterion over the given (already scaled) samples with
    /// unit per-sample weights.
    pub fn new(inputs: Matrix, targets: Vector, loss: Box<dyn Loss>, alpha1: Real, alpha2: Real) -> Self {
        let samples = inputs.rows();
        Self::weighted(inputs, targets, Vector::constant(samples, 1.0), loss, alpha1, alpha2)
    }

    /// Create the criterion with explicit per-sample weights.
    pub fn weighted(
        inputs: Matrix,
        targets: Vector,
        weights: Vector,
        loss: Box<dyn Loss>,
        alpha1: Real,
        alpha2: Real,
    ) -> Self {
        assert_eq!(inputs.rows(), targets.size());
        assert_eq!(inputs.rows(), weights.size());
        assert!(alpha1 >= 0.0 && alpha2 >= 0.0);

        let smoothness = if loss.smooth() && alpha1 == 0.0 {
            Smoothness::Smooth
        } else {
            Smoothness::Nonsmooth
        };
        let meta = FunctionMeta::new(inputs.cols() + 1)
            .convex(Convexity::Convex)
            .smooth(smoothness)
            .strong_convexity(0.0);
        Self { meta, inputs, targets, weights, loss, alpha1, alpha2 }
    }

    /// Number of features (the variable also carries the bias).
    pub fn features(&self) -> usize {
        self.inputs.cols()
    }

    fn accumulate(&self, range: std::ops::Range<usize>, w: &Vector, b: Real) -> Accumulator {
        let mut partial = Accumulator::zero(self.features());
        for sample in range {
            let x = self.inputs.row(sample);
            let output = w.dot(&x) + b;
            let (value, slope) = self.loss.vgrad(output, self.targets[sample]);
            let weight = self.weights[sample];
            partial.fx += weight * value;
            partial.gw += &(weight * slope * &x);
            partial.gb += weight * slope;
        }
        partial
    }
}

impl Function for ErmFunction {
    fn name(&self) -> String {
        format!("erm[{},a1={},a2={}]", self.loss.id(), self.alpha1, self.alpha2)
    }

    fn meta(&self) -> &FunctionMeta {
        &self.meta
    }

    fn clone_dyn(&self) -> Box<dyn Function> {
        Box::new(Self {
            meta: self.meta.clone(),
            inputs: self.inputs.clone(),
            targets: self.targets.clone(),
            weights: self.weights.clone(),
            loss: self.loss.clone(),
            alpha1: self.alpha1,
            alpha2: self.alpha2,
        })
    }

    fn do_evaluate(&self, x: &Vector, gx: Option<&mut Vector>, hx: Option<&mut Matrix>) -> Real {
        assert!(hx.is_none(), "{}: Hessian not available", self.name());

        let features = self.features();
        let samples = self.inputs.rows();
        let w = x.segment(0, features);
        let b = x[features];

        let chunks: Vec<std::ops::Range<usize>> = (0..samples)
            .step_by(CHUNK)
            .map(|start| start..(start + CHUNK).min(samples))
            .collect();
        let total = chunks
            .into_par_iter()
            .map(|range| self.accumulate(range, &w, b))
            .collect::<Vec<_>>()
            .into_iter()
            .fold(Accumulator::zero(features), Accumulator::merge);

        let norm = 1.0 / (2.0 * samples as Real);
        let mut fx = norm * total.fx + self.alpha1 * w.lp_norm_1() + 0.5 * self.alpha2 * w.norm_squared();

        if let Some(gx) = gx {
            for feature in 0..features {
                let l1 = if w[feature] == 0.0 { 0.0 } else { w[feature].signum() };
                gx[feature] =
                    norm * total.gw[feature] + self.alpha1 * l1 + self.alpha2 * w[feature];
            }
            gx[features] = norm * total.gb;
        }
        if !fx.is_finite() {
            fx = Real::INFINITY;
        }
        fx
    }
}
