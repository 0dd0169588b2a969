//! Action selection over a Q-table

use rand::{Rng, RngCore};

use pendulum_rl_core::{DiscreteAction, DiscreteSpace};

use crate::value::QTable;

/// Picks an action for a cell given the current action values
pub trait Policy {
    /// Select an action for `state`
    fn select(&self, q: &QTable, state: usize, rng: &mut dyn RngCore) -> DiscreteAction;
}

/// Always the highest-valued action (lowest index on ties)
#[derive(Debug, Clone, Copy, Default)]
pub struct Greedy;

impl Policy for Greedy {
    fn select(&self, q: &QTable, state: usize, _rng: &mut dyn RngCore) -> DiscreteAction {
        DiscreteAction(q.greedy_action(state))
    }
}

/// Epsilon-greedy exploration
#[derive(Debug, Clone, Copy)]
pub struct EpsilonGreedy {
    /// Exploration rate
    pub epsilon: f64,
    /// Action space for random sampling
    pub action_space: DiscreteSpace,
}

impl EpsilonGreedy {
    /// Create a new epsilon-greedy policy
    #[must_use]
    pub fn new(epsilon: f64, action_space: DiscreteSpace) -> Self {
        Self { epsilon, action_space }
    }

    /// Set the exploration rate
    pub fn set_epsilon(&mut self, epsilon: f64) {
        self.epsilon = epsilon.clamp(0.0, 1.0);
    }
}

impl Policy for EpsilonGreedy {
    fn select(&self, q: &QTable, state: usize, rng: &mut dyn RngCore) -> DiscreteAction {
        // Exploit only when the draw lands strictly above epsilon
        if rng.gen::<f64>() > self.epsilon {
            Greedy.select(q, state, rng)
        } else {
            self.action_space.sample(rng)
        }
    }
}
