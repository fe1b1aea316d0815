//! Quadratic-surrogate tuner.
//!
//! After the coarse seed phase, a quadratic model of the score is fitted in
//! the scaled parameter space with a squared-error loss, minimized with an
//! inner smooth solver and projected back to the closest grid point.

use super::{
    common_config, evaluate, local_search, max_igrid, min_igrid, seed_phase, ParamSpace, Tuner,
    TunerCallback, TunerStep,
};
use nl_core::{Configurable, Real, Result};
use nl_function::{Convexity, Function, FunctionMeta, Smoothness};
use nl_solver::{solvers, Logger, Solver as _};
use nl_tensor::{Matrix, Vector};

/// Number of quadratic expansion terms for `k` parameters.
fn expansion_len(k: usize) -> usize {
    1 + k + k * (k + 1) / 2
}

/// `φ(p) = [1, p₀…p_{k−1}, pᵢpⱼ (i ≤ j)]`.
fn expand(p: &Vector) -> Vector {
    let k = p.size();
    let mut phi = Vector::zeros(expansion_len(k));
    phi[0] = 1.0;
    for i in 0..k {
        phi[1 + i] = p[i];
    }
    let mut index = 1 + k;
    for i in 0..k {
        for j in i..k {
            phi[index] = p[i] * p[j];
            index += 1;
        }
    }
    phi
}

/// Squared-error fit of the quadratic surrogate coefficients.
struct SurrogateFit {
    meta: FunctionMeta,
    design: Matrix,
    targets: Vector,
}

impl SurrogateFit {
    fn new(points: &[Vector], scores: &[Real]) -> Self {
        let k = points[0].size();
        let q = expansion_len(k);
        let mut design = Matrix::zeros(points.len(), q);
        for (row, point) in points.iter().enumerate() {
            design.set_row(row, &expand(point));
        }
        Self {
            meta: FunctionMeta::new(q).convex(Convexity::Convex).smooth(Smoothness::Smooth),
            design,
            targets: Vector::from_slice(scores),
        }
    }
}

impl Function for SurrogateFit {
    fn name(&self) -> String {
        format!("quadratic-surrogate-fit[{}]", self.size())
    }

    fn meta(&self) -> &FunctionMeta {
        &self.meta
    }

    fn clone_dyn(&self) -> Box<dyn Function> {
        Box::new(Self {
            meta: self.meta.clone(),
            design: self.design.clone(),
            targets: self.targets.clone(),
        })
    }

    fn do_evaluate(&self, theta: &Vector, gx: Option<&mut Vector>, hx: Option<&mut Matrix>) -> Real {
        let residuals = &self.design.mul_vec(theta) - &self.targets;
        if let Some(gx) = gx {
            *gx = self.design.tr_mul_vec(&residuals) * 2.0;
        }
        if let Some(hx) = hx {
            *hx = (&self.design.transpose() * &self.design).scale(2.0);
        }
        residuals.norm_squared()
    }
}

/// The fitted quadratic surrogate as a function of the scaled parameters.
struct Surrogate {
    meta: FunctionMeta,
    theta: Vector,
}

impl Surrogate {
    fn new(dims: usize, theta: Vector) -> Self {
        Self {
            meta: FunctionMeta::new(dims).convex(Convexity::Ignore).smooth(Smoothness::Smooth),
            theta,
        }
    }
}

impl Function for Surrogate {
    fn name(&self) -> String {
        format!("quadratic-surrogate[{}]", self.size())
    }

    fn meta(&self) -> &FunctionMeta {
        &self.meta
    }

    fn clone_dyn(&self) -> Box<dyn Function> {
        Box::new(Self { meta: self.meta.clone(), theta: self.theta.clone() })
    }

    fn do_evaluate(&self, p: &Vector, gx: Option<&mut Vector>, hx: Option<&mut Matrix>) -> Real {
        assert!(hx.is_none(), "{}: Hessian not available", self.name());
        let k = p.size();

        if let Some(gx) = gx {
            for d in 0..k {
                let mut derivative = self.theta[1 + d];
                let mut index = 1 + k;
                for i in 0..k {
                    for j in i..k {
                        if i == d && j == d {
                            derivative += 2.0 * self.theta[index] * p[d];
                        } else if i == d {
                            derivative += self.theta[index] * p[j];
                        } else if j == d {
                            derivative += self.theta[index] * p[i];
                        }
                        index += 1;
                    }
                }
                gx[d] = derivative;
            }
        }
        self.theta.dot(&expand(p))
    }
}

/// Seed with local search, then iterate fit → minimize → project →
/// evaluate.
#[derive(Clone)]
pub struct SurrogateTuner {
    config: Configurable,
}

impl SurrogateTuner {
    /// Create with the default evaluation budget.
    pub fn new() -> Self {
        Self { config: common_config() }
    }

    fn propose(&self, spaces: &[ParamSpace], steps: &[TunerStep]) -> Result<Vec<usize>> {
        let k = spaces.len();
        let points: Vec<Vector> = steps
            .iter()
            .map(|step| {
                Vector::from_fn(k, |dim| spaces[dim].to_surrogate(step.values[dim]))
            })
            .collect();
        let scores: Vec<Real> = steps.iter().map(|step| step.score).collect();

        let solver = solvers().get("lbfgs")?;

        // fit the surrogate coefficients with the inner smooth solver
        let fit = SurrogateFit::new(&points, &scores);
        let theta = solver.minimize(&fit, &Vector::zeros(expansion_len(k)), &mut Logger::none())?;

        // minimize the surrogate from the best scaled point
        let surrogate = Surrogate::new(k, theta.x().clone());
        let optimum = solver.minimize(&surrogate, &points[0], &mut Logger::none())?;

        Ok((0..k)
            .map(|dim| spaces[dim].closest_grid_from_surrogate(optimum.x()[dim].clamp(0.0, 1.0)))
            .collect())
    }
}

impl Default for SurrogateTuner {
    fn default() -> Self {
        Self::new()
    }
}

impl Tuner for SurrogateTuner {
    fn id(&self) -> &str {
        "surrogate"
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
            // the quadratic model needs more points than coefficients
            let proposal = if steps.len() > expansion_len(spaces.len()) {
                Some(self.propose(spaces, &steps)?)
            } else {
                None
            };

            let evaluated = match proposal {
                Some(igrid) => evaluate(spaces, callback, vec![igrid], &mut steps)?,
                None => false,
            };
            if !evaluated {
                // refine locally when the surrogate proposal is exhausted
                let igrids = local_search(&min, &max, &steps[0].igrid, 1);
                if !evaluate(spaces, callback, igrids, &mut steps)? {
                    break;
                }
            }
        }
        Ok(steps)
    }
}
