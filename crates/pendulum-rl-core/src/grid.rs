//! State-space discretization and angle wrapping

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::state::{pendulum_state, PendulumState};
use crate::{RLError, Result};

/// Wrap an angle into `[-pi, pi)` with a single period shift.
///
/// Inputs further than one period outside the interval are not brought back
/// into range; trajectories never move that far in one integration step.
#[must_use]
pub fn normalize_angle(theta: f64) -> f64 {
    if theta >= PI {
        -PI + (theta - PI)
    } else if theta < -PI {
        PI - (-PI - theta)
    } else {
        theta
    }
}

/// Regular two-dimensional grid over `(theta, omega)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateGrid {
    /// Angle samples, increasing
    pub theta: Vec<f64>,
    /// Angular velocity samples, increasing
    pub omega: Vec<f64>,
}

impl StateGrid {
    /// Grid spanning `[-pi, pi]` on both axes with the given steps
    pub fn new(theta_step: f64, omega_step: f64) -> Result<Self> {
        Ok(Self {
            theta: axis(-PI, PI, theta_step, "theta_step")?,
            omega: axis(-PI, PI, omega_step, "omega_step")?,
        })
    }

    /// Number of angle samples (`n1`)
    #[must_use]
    pub fn n_theta(&self) -> usize {
        self.theta.len()
    }

    /// Number of angular velocity samples (`n2`)
    #[must_use]
    pub fn n_omega(&self) -> usize {
        self.omega.len()
    }

    /// Total number of cells (`n1 * n2`)
    #[must_use]
    pub fn len(&self) -> usize {
        self.theta.len() * self.omega.len()
    }

    /// Whether the grid has no cells
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flat index of the cell nearest to `state`, `n2 * i + j`
    #[must_use]
    pub fn cell_index(&self, state: &PendulumState) -> usize {
        let i = nearest(&self.theta, state[0]);
        let j = nearest(&self.omega, state[1]);
        self.n_omega() * i + j
    }

    /// Grid coordinates `(i, j)` of a flat cell index
    #[must_use]
    pub fn cell_to_coordinates(&self, index: usize) -> (usize, usize) {
        let n2 = self.n_omega();
        (index / n2, index % n2)
    }

    /// Sample state at grid coordinates `(i, j)`
    #[must_use]
    pub fn grid_point(&self, i: usize, j: usize) -> PendulumState {
        pendulum_state(self.theta[i], self.omega[j])
    }

    /// Check that both axes are non-empty and strictly increasing
    pub fn validate(&self) -> Result<()> {
        for (name, axis) in [("theta", &self.theta), ("omega", &self.omega)] {
            if axis.is_empty() {
                return Err(RLError::config("grid", format!("{name} axis is empty")));
            }
            if axis.windows(2).any(|w| !(w[0] < w[1])) {
                return Err(RLError::config("grid", format!("{name} axis is not increasing")));
            }
        }
        Ok(())
    }
}

/// Samples `start, start + step, ...` strictly below `stop + step`
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn axis(start: f64, stop: f64, step: f64, parameter: &'static str) -> Result<Vec<f64>> {
    if !(step > 0.0) || !step.is_finite() {
        return Err(RLError::config(parameter, format!("must be > 0, got {step}")));
    }
    let n = ((stop + step - start) / step).ceil() as usize;
    Ok((0..n).map(|i| start + i as f64 * step).collect())
}

/// Index of the sample closest to `x`; ties go to the lower index
fn nearest(samples: &[f64], x: f64) -> usize {
    let upper = samples.partition_point(|&s| s < x);
    if upper == 0 {
        return 0;
    }
    if upper == samples.len() {
        return samples.len() - 1;
    }
    let below = x - samples[upper - 1];
    let above = samples[upper] - x;
    if below * below <= above * above {
        upper - 1
    } else {
        upper
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn default_grid() -> StateGrid {
        StateGrid::new(0.025, 0.05).unwrap()
    }

    #[test]
    fn default_axes_follow_arange_semantics() {
        let grid = default_grid();
        assert_eq!(grid.n_theta(), 253);
        assert_eq!(grid.n_omega(), 127);
        assert_eq!(grid.theta[0], -PI);
        assert!(grid.theta[252] >= PI);
        assert!(grid.omega[126] >= PI);
    }

    #[test]
    fn normalize_wraps_single_period() {
        assert_eq!(normalize_angle(PI), -PI);
        assert_eq!(normalize_angle(0.5), 0.5);
        assert!((normalize_angle(-PI - 0.5) - (PI - 0.5)).abs() < 1e-12);
        assert!((normalize_angle(PI + 0.25) - (-PI + 0.25)).abs() < 1e-12);
    }

    #[test]
    fn every_grid_point_maps_to_its_own_cell() {
        let grid = StateGrid::new(0.1, 0.2).unwrap();
        let n2 = grid.n_omega();
        for i in 0..grid.n_theta() {
            for j in 0..n2 {
                let index = grid.cell_index(&grid.grid_point(i, j));
                assert_eq!(index, n2 * i + j);
                assert_eq!(grid.cell_to_coordinates(index), (i, j));
            }
        }
    }

    #[test]
    fn nearest_prefers_lower_index_on_tie() {
        let samples = [0.0, 1.0, 2.0];
        assert_eq!(nearest(&samples, 0.5), 0);
        assert_eq!(nearest(&samples, 0.51), 1);
        assert_eq!(nearest(&samples, -10.0), 0);
        assert_eq!(nearest(&samples, 10.0), 2);
    }

    #[test]
    fn rejects_non_positive_step() {
        assert!(matches!(
            StateGrid::new(0.0, 0.05),
            Err(RLError::Configuration { parameter: "theta_step", .. })
        ));
    }

    fn linear_scan(samples: &[f64], x: f64) -> usize {
        let mut best = 0;
        for (k, s) in samples.iter().enumerate() {
            if (x - s).powi(2) < (x - samples[best]).powi(2) {
                best = k;
            }
        }
        best
    }

    proptest! {
        #[test]
        fn normalized_angle_in_half_open_interval(theta in -PI..3.0 * PI) {
            let wrapped = normalize_angle(theta);
            prop_assert!(wrapped >= -PI);
            prop_assert!(wrapped < PI);
        }

        #[test]
        fn cell_index_stays_in_bounds(theta in -PI..PI, omega in -10.0f64..10.0) {
            let grid = default_grid();
            prop_assert!(grid.cell_index(&pendulum_state(theta, omega)) < grid.len());
        }

        #[test]
        fn binary_search_agrees_with_linear_scan(x in -4.0f64..4.0) {
            let grid = default_grid();
            prop_assert_eq!(nearest(&grid.theta, x), linear_scan(&grid.theta, x));
        }
    }
}
