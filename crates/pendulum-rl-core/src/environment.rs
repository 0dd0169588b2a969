//! Environment traits and types

use crate::action::DiscreteAction;
use crate::grid::StateGrid;
use crate::{Reward, Terminal};

/// Result of a single environment step
#[derive(Debug, Clone)]
pub struct Step<O, S> {
    /// Observation after the transition
    pub observation: O,
    /// Reward signal
    pub reward: Reward,
    /// Whether the episode ended, and how
    pub terminal: Terminal,
    /// Continuous state after the transition (if available)
    pub state: Option<S>,
}

impl<O, S> Step<O, S> {
    /// Whether the episode is over after this step
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.terminal.is_terminal()
    }
}

/// Core environment trait
///
/// Stepping is synchronous: a transition is a handful of plant evaluations,
/// so callers that need concurrency run whole episodes on a blocking task.
pub trait Environment: Send {
    /// Observation type
    type Observation;
    /// Action type
    type Action;
    /// Continuous state type
    type State;

    /// Reset to the initial state and return its observation
    fn reset(&mut self) -> crate::Result<Self::Observation>;

    /// Apply one action for one integration step
    fn step(&mut self, action: Self::Action) -> crate::Result<Step<Self::Observation, Self::State>>;

    /// Current continuous state (if available)
    fn state(&self) -> Option<Self::State> {
        None
    }
}

/// An environment whose observations are cells of a finite grid and whose
/// actions index a finite control set.
pub trait TabularEnvironment: Environment<Observation = usize, Action = DiscreteAction> {
    /// Number of discrete states (grid cells)
    fn num_states(&self) -> usize {
        self.grid().len()
    }

    /// Number of discrete actions
    fn num_actions(&self) -> usize {
        self.control_values().len()
    }

    /// Physical control value of every action, in action order
    fn control_values(&self) -> &[f64];

    /// The state grid observations refer to
    fn grid(&self) -> &StateGrid;
}
