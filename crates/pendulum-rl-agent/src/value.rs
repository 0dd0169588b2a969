//! Tabular action-value function

use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Dense `Q(s, a)` table over grid cells and control indices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QTable {
    values: Array2<f64>,
}

impl QTable {
    /// Zero-initialized table
    #[must_use]
    pub fn zeros(num_states: usize, num_actions: usize) -> Self {
        Self {
            values: Array2::zeros((num_states, num_actions)),
        }
    }

    /// Number of rows (cells)
    #[must_use]
    pub fn num_states(&self) -> usize {
        self.values.nrows()
    }

    /// Number of columns (actions)
    #[must_use]
    pub fn num_actions(&self) -> usize {
        self.values.ncols()
    }

    /// Single entry
    #[must_use]
    pub fn get(&self, state: usize, action: usize) -> f64 {
        self.values[[state, action]]
    }

    /// Action values of one cell
    #[must_use]
    pub fn row(&self, state: usize) -> ArrayView1<'_, f64> {
        self.values.row(state)
    }

    /// Underlying array
    #[must_use]
    pub fn as_array(&self) -> &Array2<f64> {
        &self.values
    }

    /// Highest-valued action of a cell; the lowest index wins ties
    #[must_use]
    pub fn greedy_action(&self, state: usize) -> usize {
        argmax(self.values.row(state))
    }

    /// `max_a Q(state, a)`
    #[must_use]
    pub fn max_value(&self, state: usize) -> f64 {
        self.values[[state, self.greedy_action(state)]]
    }

    /// One-step temporal-difference update, returning the TD error.
    ///
    /// `Q[s,a] += alpha * (reward + gamma * max Q[s',:] - Q[s,a])`
    pub fn update(&mut self, state: usize, action: usize, reward: f64, next_state: usize, alpha: f64, gamma: f64) -> f64 {
        let target = reward + gamma * self.max_value(next_state);
        let td_error = target - self.values[[state, action]];
        self.values[[state, action]] += alpha * td_error;
        td_error
    }

    /// `V`: row-wise maximum
    #[must_use]
    pub fn value_table(&self) -> Vec<f64> {
        self.values
            .axis_iter(Axis(0))
            .map(|row| row[argmax(row)])
            .collect()
    }

    /// `U`: control value of the row-wise arg-max
    #[must_use]
    pub fn policy_table(&self, controls: &[f64]) -> Vec<f64> {
        self.values
            .axis_iter(Axis(0))
            .map(|row| controls[argmax(row)])
            .collect()
    }

    /// Frobenius norm of the whole table
    #[must_use]
    pub fn frobenius_norm(&self) -> f64 {
        self.values.iter().map(|q| q * q).sum::<f64>().sqrt()
    }

    /// Smallest and largest entry
    #[must_use]
    pub fn range(&self) -> (f64, f64) {
        min_max(self.values.iter().copied())
    }

    /// Number of rows with at least one non-zero entry
    #[must_use]
    pub fn visited_states(&self) -> usize {
        self.values
            .axis_iter(Axis(0))
            .filter(|row| row.iter().any(|q| *q != 0.0))
            .count()
    }
}

/// First index of the maximum (strict `>` keeps the earliest)
fn argmax(row: ArrayView1<'_, f64>) -> usize {
    let mut best = 0;
    for (k, value) in row.iter().enumerate().skip(1) {
        if *value > row[best] {
            best = k;
        }
    }
    best
}

/// Smallest and largest value of a sequence
pub(crate) fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

/// Euclidean norm of a table
pub(crate) fn l2_norm(values: &[f64]) -> f64 {
    values.iter().map(|v| v * v).sum::<f64>().sqrt()
}
