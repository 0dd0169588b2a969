//! Continuous-time algebraic Riccati equation and LQR feedback
//!
//! The stabilizing solution of `A'P + PA - PBR^-1B'P + Q = 0` is obtained
//! from the matrix sign function of the Hamiltonian
//! `H = [[A, -BR^-1B'], [-Q, -A']]`, computed by the scaled Newton
//! iteration `Z <- (Z / c + c Z^-1) / 2`.

use nalgebra::{DMatrix, DVector};
use rand::RngCore;
use tracing::trace;

use crate::config::LqrConfig;
use crate::error::ControllabilityError;
use crate::linearize::{linearize_plant, LinearSystem};
use crate::plant::Dynamics;
use crate::state::PendulumState;
use crate::{RLError, Result};

/// Iteration cap for the sign function
pub const MAX_SIGN_ITERATIONS: usize = 100;

/// Relative Frobenius change below which the sign iteration has converged
const SIGN_TOLERANCE: f64 = 1e-12;

/// Determinant scaling is dropped once the iteration is this close
const SCALING_CUTOFF: f64 = 1e-2;

/// Changes below this stop the iteration once they no longer shrink
const SIGN_FLOOR: f64 = 1e-9;

/// Relative residual accepted for the final solution
const RESIDUAL_TOLERANCE: f64 = 1e-8;

/// Weighting matrices of the quadratic cost
#[derive(Debug, Clone, PartialEq)]
pub struct LqrWeights {
    /// State weight, `n x n`, positive semidefinite
    pub q: DMatrix<f64>,
    /// Control weight, `m x m`, positive definite
    pub r: DMatrix<f64>,
}

impl LqrWeights {
    /// Diagonal pendulum weights from configuration
    #[must_use]
    pub fn from_config(config: &LqrConfig) -> Self {
        Self {
            q: DMatrix::from_diagonal(&DVector::from_column_slice(&config.q_diag)),
            r: DMatrix::from_element(1, 1, config.r),
        }
    }
}

impl Default for LqrWeights {
    fn default() -> Self {
        Self::from_config(&LqrConfig::default())
    }
}

fn check_shape(expected: (usize, usize), actual: (usize, usize)) -> Result<()> {
    if expected.0 != actual.0 {
        return Err(RLError::DimensionMismatch {
            expected: expected.0,
            actual: actual.0,
        });
    }
    if expected.1 != actual.1 {
        return Err(RLError::DimensionMismatch {
            expected: expected.1,
            actual: actual.1,
        });
    }
    Ok(())
}

/// Numerical rank of the controllability matrix `[B, AB, ..., A^(n-1)B]`
#[must_use]
pub fn controllability_rank(a: &DMatrix<f64>, b: &DMatrix<f64>) -> usize {
    let n = a.nrows();
    let m = b.ncols();
    let mut reach = DMatrix::zeros(n, n * m);
    let mut block = b.clone();
    for k in 0..n {
        reach.view_mut((0, k * m), (n, m)).copy_from(&block);
        block = a * &block;
    }
    let singular = reach.singular_values();
    #[allow(clippy::cast_precision_loss)]
    let tolerance = singular.max() * n.max(n * m) as f64 * f64::EPSILON;
    singular.iter().filter(|s| **s > tolerance).count()
}

/// Matrix sign function by the determinant-scaled Newton iteration
fn matrix_sign(h: DMatrix<f64>) -> std::result::Result<DMatrix<f64>, ControllabilityError> {
    #[allow(clippy::cast_precision_loss)]
    let order = h.nrows() as f64;
    let mut z = h;
    let mut delta = f64::INFINITY;

    for iteration in 1..=MAX_SIGN_ITERATIONS {
        let det = z.determinant().abs();
        let inverse = z.clone().try_inverse().ok_or(ControllabilityError::SingularHamiltonian)?;

        let scale = if delta > SCALING_CUTOFF {
            let c = det.powf(1.0 / order);
            if c.is_finite() && c > 0.0 {
                c
            } else {
                1.0
            }
        } else {
            1.0
        };

        let next = (&z / scale + inverse * scale) * 0.5;
        if !next.iter().all(|v| v.is_finite()) {
            return Err(ControllabilityError::NonFinite);
        }
        let previous = delta;
        delta = (&next - &z).norm() / next.norm();
        z = next;

        trace!(iteration, delta, "sign iteration");
        if delta < SIGN_TOLERANCE || (delta < SIGN_FLOOR && delta >= previous) {
            return Ok(z);
        }
    }

    Err(ControllabilityError::NotConverged {
        iterations: MAX_SIGN_ITERATIONS,
    })
}

/// Stabilizing solution `P` of the continuous algebraic Riccati equation
pub fn solve_care(a: &DMatrix<f64>, b: &DMatrix<f64>, q: &DMatrix<f64>, r: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let n = a.nrows();
    let m = b.ncols();
    check_shape((n, n), a.shape())?;
    check_shape((n, m), b.shape())?;
    check_shape((n, n), q.shape())?;
    check_shape((m, m), r.shape())?;

    let r_inverse = r
        .clone()
        .cholesky()
        .ok_or(ControllabilityError::SingularControlWeight)?
        .inverse();

    let rank = controllability_rank(a, b);
    if rank < n {
        return Err(ControllabilityError::Uncontrollable { rank, dimension: n }.into());
    }

    let g = b * &r_inverse * b.transpose();
    let mut h = DMatrix::zeros(2 * n, 2 * n);
    h.view_mut((0, 0), (n, n)).copy_from(a);
    h.view_mut((0, n), (n, n)).copy_from(&(-&g));
    h.view_mut((n, 0), (n, n)).copy_from(&(-q));
    h.view_mut((n, n), (n, n)).copy_from(&(-a.transpose()));

    let w = matrix_sign(h)?;
    let identity = DMatrix::<f64>::identity(n, n);

    // [W12; W22 + I] P = -[W11 + I; W21]
    let w11 = w.view((0, 0), (n, n)).clone_owned();
    let w12 = w.view((0, n), (n, n)).clone_owned();
    let w21 = w.view((n, 0), (n, n)).clone_owned();
    let w22 = w.view((n, n), (n, n)).clone_owned();
    let mut lhs = DMatrix::zeros(2 * n, n);
    lhs.view_mut((0, 0), (n, n)).copy_from(&w12);
    lhs.view_mut((n, 0), (n, n)).copy_from(&(w22 + &identity));
    let mut rhs = DMatrix::zeros(2 * n, n);
    rhs.view_mut((0, 0), (n, n)).copy_from(&(-(w11 + &identity)));
    rhs.view_mut((n, 0), (n, n)).copy_from(&(-w21));

    let p = lhs
        .svd(true, true)
        .solve(&rhs, f64::EPSILON)
        .map_err(|_| ControllabilityError::SingularHamiltonian)?;
    let p = (&p + p.transpose()) * 0.5;
    if !p.iter().all(|v| v.is_finite()) {
        return Err(ControllabilityError::NonFinite.into());
    }

    let residual = a.transpose() * &p + &p * a - &p * &g * &p + q;
    let scale = 1.0 + q.norm() + 2.0 * a.norm() * p.norm() + g.norm() * p.norm() * p.norm();
    let relative = residual.norm() / scale;
    if relative > RESIDUAL_TOLERANCE {
        return Err(ControllabilityError::ResidualTooLarge { residual: relative }.into());
    }

    Ok(p)
}

/// LQR state feedback `u = -K x`
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackGain {
    /// Gain `K = R^-1 B' P`, `m x n`
    pub k: DMatrix<f64>,
    /// Riccati solution it was derived from
    pub p: DMatrix<f64>,
}

impl FeedbackGain {
    /// Solve the Riccati equation for `system` and form the gain
    pub fn compute(system: &LinearSystem, weights: &LqrWeights) -> Result<Self> {
        let p = solve_care(&system.a, &system.b, &weights.q, &weights.r)?;
        let r_inverse = weights
            .r
            .clone()
            .try_inverse()
            .ok_or(ControllabilityError::SingularControlWeight)?;
        let k = r_inverse * system.b.transpose() * &p;
        Ok(Self { k, p })
    }

    /// Unclipped feedback `-K x`
    #[must_use]
    pub fn apply(&self, x: &DVector<f64>) -> DVector<f64> {
        -(&self.k * x)
    }
}

/// Per-step LQR for the pendulum: linearize, solve, clip
#[derive(Debug, Clone)]
pub struct RiccatiController {
    weights: LqrWeights,
    u_max: f64,
}

impl RiccatiController {
    /// Controller with the given weights and control limit
    #[must_use]
    pub fn new(weights: LqrWeights, u_max: f64) -> Self {
        Self { weights, u_max }
    }

    /// Control limit
    #[must_use]
    pub fn u_max(&self) -> f64 {
        self.u_max
    }

    /// Control for `state`, linearizing `plant` at `(state, operating_control)`.
    ///
    /// Returns `clip(-K x, -u_max, u_max)`.
    pub fn control<D>(&self, plant: &D, state: &PendulumState, operating_control: f64, rng: &mut dyn RngCore) -> Result<f64>
    where
        D: Dynamics + ?Sized,
    {
        let system = linearize_plant(plant, state, operating_control, rng)?;
        let gain = FeedbackGain::compute(&system, &self.weights)?;
        let x = DVector::from_column_slice(state.as_slice());
        Ok(gain.apply(&x)[0].clamp(-self.u_max, self.u_max))
    }
}
