//! Proximal bundle machinery.
//!
//! The bundle keeps a capped, ordered store of linearizations expressed by
//! their errors at the stability center; the proximal subproblem
//! `min_d ½μ‖d‖² + max_i (fᵢ + gᵢᵀ(x̂+d−yᵢ))` is solved through its simplex
//! dual with the interior-point solver, and the store aggregates (convex
//! combination by the last dual weights) when the cap is exceeded.

pub mod csearch;
pub mod fpba;
pub mod proximity;

use crate::interior::SolverIpm;
use crate::solver::Logger;
use nl_core::{Real, Result};
use nl_function::QuadraticProgram;
use nl_tensor::{Matrix, Vector};

/// One linearization, stored as `(e, g)`: the error at the current
/// stability center and the subgradient.
#[derive(Debug, Clone)]
struct Plane {
    error: Real,
    gradient: Vector,
}

/// The solution of the proximal subproblem.
#[derive(Debug, Clone)]
pub struct BundleStep {
    /// Proximal direction `d = −ĝ/μ`.
    pub d: Vector,
    /// Predicted decrease `v = ε̂ + ‖ĝ‖²/μ ≥ 0`.
    pub v: Real,
    /// Aggregate subgradient `ĝ = Σ wᵢ gᵢ`.
    pub aggregate_gradient: Vector,
    /// Aggregate error `ε̂ = Σ wᵢ eᵢ`.
    pub aggregate_error: Real,
}

/// A capped store of linearizations around a stability center.
pub struct Bundle {
    center: Vector,
    fcenter: Real,
    gcenter: Vector,
    planes: Vec<Plane>,
    max_size: usize,
    last_aggregate: Option<Plane>,
}

impl Bundle {
    /// Start a bundle at the initial stability center.
    pub fn new(center: Vector, fcenter: Real, gcenter: Vector, max_size: usize) -> Self {
        assert!(max_size >= 3);
        let planes = vec![Plane { error: 0.0, gradient: gcenter.clone() }];
        Self { center, fcenter, gcenter, planes, max_size, last_aggregate: None }
    }

    /// The stability center.
    pub fn center(&self) -> &Vector {
        &self.center
    }

    /// The objective value at the stability center.
    pub fn fcenter(&self) -> Real {
        self.fcenter
    }

    /// A subgradient at the stability center.
    pub fn gcenter(&self) -> &Vector {
        &self.gcenter
    }

    /// Number of stored linearizations.
    pub fn size(&self) -> usize {
        self.planes.len()
    }

    /// Append the linearization taken at `y` (value `fy`, subgradient `gy`),
    /// aggregating when the cap is exceeded.
    pub fn append(&mut self, y: &Vector, fy: Real, gy: &Vector) {
        // e = f(x̂) − fy − gy·(x̂ − y) >= 0 up to rounding for convex objectives
        let error = (self.fcenter - fy - gy.dot(&(&self.center - y))).max(0.0);
        self.planes.push(Plane { error, gradient: gy.clone() });

        if self.planes.len() > self.max_size {
            self.aggregate();
        }
    }

    /// Move the stability center after a serious step; the stored errors are
    /// rebased to the new center.
    pub fn move_center(&mut self, y: &Vector, fy: Real, gy: &Vector) {
        let shift = y - &self.center;
        let df = fy - self.fcenter;
        for plane in &mut self.planes {
            plane.error = (plane.error + df - plane.gradient.dot(&shift)).max(0.0);
        }
        if let Some(aggregate) = &mut self.last_aggregate {
            aggregate.error = (aggregate.error + df - aggregate.gradient.dot(&shift)).max(0.0);
        }
        self.center = y.clone();
        self.fcenter = fy;
        self.gcenter = gy.clone();
        self.append(y, fy, gy);
    }

    /// Shrink to the aggregate plane plus the most recent linearizations.
    fn aggregate(&mut self) {
        let keep = self.max_size / 2;
        let tail = self.planes.split_off(self.planes.len() - keep);
        self.planes = tail;
        if let Some(aggregate) = self.last_aggregate.take() {
            self.planes.insert(0, aggregate);
        }
    }

    /// Solve the proximal subproblem for the given `μ` through the simplex
    /// dual `min_w (1/2μ)‖Σ wᵢ gᵢ‖² + wᵀe`.
    pub fn solve(&mut self, miu: Real, ipm: &SolverIpm) -> Result<BundleStep> {
        let m = self.planes.len();
        let n = self.center.size();

        let mut gradients = Matrix::zeros(m, n);
        let mut errors = Vector::zeros(m);
        for (i, plane) in self.planes.iter().enumerate() {
            gradients.set_row(i, &plane.gradient);
            errors[i] = plane.error;
        }

        let mut gram = (&gradients * &gradients.transpose()).scale(1.0 / miu);
        for i in 0..m {
            gram[(i, i)] += 1e-12;
        }
        let program = QuadraticProgram::new(gram, errors.clone())?
            .with_equality(Matrix::from_fn(1, m, |_, _| 1.0), Vector::from_slice(&[1.0]))?
            .with_nonnegative();

        let weights = ipm.solve_quadratic(&program, &mut Logger::none())?;
        let w = weights.x().positive_part();
        let w = &w / w.sum().max(nl_core::EPSILON0);

        let aggregate_gradient = gradients.tr_mul_vec(&w);
        let aggregate_error = w.dot(&errors).max(0.0);
        let d = &aggregate_gradient / (-miu);
        let v = aggregate_error + aggregate_gradient.norm_squared() / miu;

        self.last_aggregate = Some(Plane { error: aggregate_error, gradient: aggregate_gradient.clone() });
        Ok(BundleStep { d, v, aggregate_gradient, aggregate_error })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nl_function::functions::MaxQ;
    use nl_function::Function as _;

    fn make_bundle(function: &MaxQ, center: &[f64], max_size: usize) -> Bundle {
        let center = Vector::from_slice(center);
        let mut gx = Vector::zeros(center.size());
        let fx = function.vgrad(&center, &mut gx);
        Bundle::new(center, fx, gx, max_size)
    }

    #[test]
    fn errors_are_nonnegative_for_convex_objectives() {
        let function = MaxQ::new(2);
        let mut bundle = make_bundle(&function, &[1.0, 0.5], 10);

        let mut gx = Vector::zeros(2);
        for point in [[0.5, 0.5], [-1.0, 0.2], [0.0, 0.0]] {
            let y = Vector::from_slice(&point);
            let fy = function.vgrad(&y, &mut gx);
            bundle.append(&y, fy, &gx);
        }
        assert_eq!(bundle.size(), 4);
        assert!(bundle.planes.iter().all(|p| p.error >= 0.0));
    }

    #[test]
    fn proximal_step_is_a_descent_prediction() {
        let function = MaxQ::new(2);
        let mut bundle = make_bundle(&function, &[1.0, 0.9], 10);
        let ipm = SolverIpm::new();

        let step = bundle.solve(1.0, &ipm).unwrap();
        assert!(step.v >= 0.0);
        // moving along d from the center must decrease the model
        assert!(step.d.dot(bundle.gcenter()) < 0.0);
    }

    #[test]
    fn cap_triggers_aggregation() {
        let function = MaxQ::new(2);
        let mut bundle = make_bundle(&function, &[1.0, 0.5], 4);
        let ipm = SolverIpm::new();
        bundle.solve(1.0, &ipm).unwrap();

        let mut gx = Vector::zeros(2);
        for i in 0..6 {
            let y = Vector::from_slice(&[0.1 * i as f64, -0.2 * i as f64]);
            let fy = function.vgrad(&y, &mut gx);
            bundle.append(&y, fy, &gx);
        }
        assert!(bundle.size() <= 4, "size = {}", bundle.size());
    }
}
