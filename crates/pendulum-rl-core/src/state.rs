//! State representations for the pendulum plant

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// Continuous pendulum state `(theta, omega)`: angle and angular velocity
pub type PendulumState = Vector2<f64>;

/// Build a pendulum state from its components
#[must_use]
pub fn pendulum_state(theta: f64, omega: f64) -> PendulumState {
    Vector2::new(theta, omega)
}

/// Terminal state indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Terminal {
    /// Not a terminal state
    No,
    /// Goal reached (episode ends)
    Yes,
    /// Truncated (step budget exhausted)
    Truncated,
}

impl Terminal {
    /// Check if the state is terminal (either Yes or Truncated)
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::No)
    }
}
