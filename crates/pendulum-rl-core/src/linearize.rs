//! Numerical linearization of plant dynamics around an operating point

use nalgebra::{DMatrix, DVector};
use rand::RngCore;

use crate::plant::Dynamics;
use crate::state::{pendulum_state, PendulumState};
use crate::{RLError, Result};

/// Forward-difference perturbation
pub const PERTURBATION: f64 = 1e-6;

/// Local linear model `x' ≈ A x + B u`
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSystem {
    /// State Jacobian, `n x n`
    pub a: DMatrix<f64>,
    /// Input Jacobian, `n x m`
    pub b: DMatrix<f64>,
}

impl LinearSystem {
    /// State dimension
    #[must_use]
    pub fn state_dim(&self) -> usize {
        self.a.nrows()
    }

    /// Input dimension
    #[must_use]
    pub fn input_dim(&self) -> usize {
        self.b.ncols()
    }
}

/// Jacobians of `rhs` at `(x, u)` by forward differences.
///
/// The state and input dimensions are taken from `x` and `u`; `rhs` must
/// return a vector of the same length as `x`.
pub fn linearize<F>(mut rhs: F, x: &DVector<f64>, u: &DVector<f64>) -> Result<LinearSystem>
where
    F: FnMut(&DVector<f64>, &DVector<f64>) -> DVector<f64>,
{
    let n = x.len();
    let m = u.len();

    let f0 = rhs(x, u);
    if f0.len() != n {
        return Err(RLError::DimensionMismatch {
            expected: n,
            actual: f0.len(),
        });
    }

    let mut a = DMatrix::zeros(n, n);
    for k in 0..n {
        let mut shifted = x.clone();
        shifted[k] += PERTURBATION;
        let column = (rhs(&shifted, u) - &f0) / PERTURBATION;
        a.set_column(k, &column);
    }

    let mut b = DMatrix::zeros(n, m);
    for k in 0..m {
        let mut shifted = u.clone();
        shifted[k] += PERTURBATION;
        let column = (rhs(x, &shifted) - &f0) / PERTURBATION;
        b.set_column(k, &column);
    }

    Ok(LinearSystem { a, b })
}

/// Linearize a pendulum plant at `state` under `control` (`n = 2`, `m = 1`)
pub fn linearize_plant<D>(plant: &D, state: &PendulumState, control: f64, rng: &mut dyn RngCore) -> Result<LinearSystem>
where
    D: Dynamics + ?Sized,
{
    let x = DVector::from_column_slice(state.as_slice());
    let u = DVector::from_element(1, control);
    linearize(
        |x, u| {
            let derivative = plant.derivative(&pendulum_state(x[0], x[1]), u[0], &mut *rng);
            DVector::from_column_slice(derivative.as_slice())
        },
        &x,
        &u,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plant::Task;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn baseline_at_origin() {
        let mut rng = StdRng::seed_from_u64(0);
        let plant = Task::SimplePendulum.plant();
        let system = linearize_plant(&plant, &pendulum_state(0.0, 0.0), 0.0, &mut rng).unwrap();

        assert_eq!(system.state_dim(), 2);
        assert_eq!(system.input_dim(), 1);
        assert_relative_eq!(system.a[(0, 0)], 0.0, epsilon = 1e-6);
        assert_relative_eq!(system.a[(0, 1)], 1.0, epsilon = 1e-6);
        assert_relative_eq!(system.a[(1, 0)], 1.0, epsilon = 1e-6);
        assert_relative_eq!(system.a[(1, 1)], 0.0, epsilon = 1e-6);
        assert_relative_eq!(system.b[(0, 0)], 0.0, epsilon = 1e-6);
        assert_relative_eq!(system.b[(1, 0)], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn hanging_pendulum_flips_gravity_sign() {
        let mut rng = StdRng::seed_from_u64(0);
        let plant = Task::SimplePendulum.plant();
        let system =
            linearize_plant(&plant, &pendulum_state(std::f64::consts::PI, 0.0), 0.0, &mut rng).unwrap();
        assert_relative_eq!(system.a[(1, 0)], -1.0, epsilon = 1e-5);
    }

    #[test]
    fn swing_has_no_input_at_rest() {
        let mut rng = StdRng::seed_from_u64(0);
        let plant = Task::Swing.plant();
        let system = linearize_plant(&plant, &pendulum_state(0.0, 0.0), 0.0, &mut rng).unwrap();
        assert_relative_eq!(system.b[(1, 0)], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn dimensions_follow_inputs() {
        // x' = [x0 + 2 u0, x1 * u1, x2]
        let rhs = |x: &DVector<f64>, u: &DVector<f64>| {
            DVector::from_vec(vec![x[0] + 2.0 * u[0], x[1] * u[1], x[2]])
        };
        let x = DVector::from_vec(vec![0.0, 3.0, 0.0]);
        let u = DVector::from_vec(vec![0.0, 1.0]);
        let system = linearize(rhs, &x, &u).unwrap();

        assert_eq!(system.a.shape(), (3, 3));
        assert_eq!(system.b.shape(), (3, 2));
        assert_relative_eq!(system.b[(0, 0)], 2.0, epsilon = 1e-6);
        assert_relative_eq!(system.b[(1, 1)], 3.0, epsilon = 1e-6);
        assert_relative_eq!(system.a[(1, 1)], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn rejects_mismatched_output() {
        let rhs = |_x: &DVector<f64>, _u: &DVector<f64>| DVector::zeros(3);
        let x = DVector::zeros(2);
        let u = DVector::zeros(1);
        assert!(matches!(
            linearize(rhs, &x, &u),
            Err(RLError::DimensionMismatch { expected: 2, actual: 3 })
        ));
    }
}
