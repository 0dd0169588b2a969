//! Reward signals and the quadratic reward tables used in training

use serde::{Deserialize, Serialize};

use crate::grid::StateGrid;

/// Reward signal from the environment
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Reward(pub f64);

impl Reward {
    /// Get the reward value
    #[must_use]
    pub fn value(&self) -> f64 {
        self.0
    }
}

/// Quadratic cost weights
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostWeights {
    /// Angle weight
    pub qx1: f64,
    /// Angular velocity weight
    pub qx2: f64,
    /// Control weight
    pub ru1: f64,
}

/// Precomputed state and control rewards.
///
/// `state[n2 * i + j] = -(theta_i^2 * qx1 + omega_j^2 * qx2)` and
/// `control[k] = -ru1 * u_k^2`; both are constant for a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardTables {
    /// Per-cell state reward (`rx`)
    pub state: Vec<f64>,
    /// Per-action control reward (`ru`)
    pub control: Vec<f64>,
}

impl RewardTables {
    /// Build both tables from the grid and the scaled control values
    #[must_use]
    pub fn new(grid: &StateGrid, controls: &[f64], weights: CostWeights) -> Self {
        let state = grid
            .theta
            .iter()
            .flat_map(|theta| {
                grid.omega
                    .iter()
                    .map(move |omega| -(theta * theta * weights.qx1 + omega * omega * weights.qx2))
            })
            .collect();
        let control = controls.iter().map(|u| -weights.ru1 * u * u).collect();
        Self { state, control }
    }

    /// Reward for landing in `next_cell` after taking `action`
    #[must_use]
    pub fn transition(&self, next_cell: usize, action: usize) -> Reward {
        Reward(self.state[next_cell] + self.control[action])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn state_table_is_row_major_in_theta() {
        let grid = StateGrid::new(0.5, 1.0).unwrap();
        let weights = CostWeights { qx1: 1.0, qx2: 0.25, ru1: 0.0 };
        let tables = RewardTables::new(&grid, &[-1.0, 1.0], weights);
        assert_eq!(tables.state.len(), grid.len());

        let n2 = grid.n_omega();
        let (i, j) = (3, 2);
        let expected = -(grid.theta[i].powi(2) + 0.25 * grid.omega[j].powi(2));
        assert_relative_eq!(tables.state[n2 * i + j], expected);
    }

    #[test]
    fn control_table_penalizes_effort() {
        let grid = StateGrid::new(0.5, 1.0).unwrap();
        let weights = CostWeights { qx1: 0.0, qx2: 0.0, ru1: 2.0 };
        let tables = RewardTables::new(&grid, &[0.0, -1.5, 1.5], weights);
        assert_eq!(tables.control, vec![0.0, -4.5, -4.5]);
        assert!(tables.state.iter().all(|r| *r == 0.0));
        assert_relative_eq!(tables.transition(0, 1).value(), -4.5);
    }
}
