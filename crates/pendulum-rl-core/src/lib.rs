//! Core types for tabular pendulum control
//!
//! This crate provides the numerical engine shared by training and replay:
//! the plant model family, the RK4 integrator, the state grid, reward tables,
//! numerical linearization and the Riccati-based LQR gain, plus the
//! configuration records and policy snapshots that cross crate boundaries.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod action;
pub mod config;
pub mod environment;
pub mod error;
pub mod grid;
pub mod integrator;
pub mod linearize;
pub mod plant;
pub mod reward;
pub mod riccati;
pub mod snapshot;
pub mod state;

// Re-export core traits and types
pub use action::{ControlSet, DiscreteAction, DiscreteSpace};
pub use config::{LqrConfig, LqrFallback, SimulationConfig, TrainingConfig};
pub use environment::{Environment, Step, TabularEnvironment};
pub use error::{ControllabilityError, RLError, Result};
pub use grid::{normalize_angle, StateGrid};
pub use integrator::{advance, rk4_step};
pub use linearize::{linearize, linearize_plant, LinearSystem};
pub use plant::{Dynamics, PendulumParams, PlantModel, Task};
pub use reward::{CostWeights, Reward, RewardTables};
pub use riccati::{solve_care, FeedbackGain, LqrWeights, RiccatiController};
pub use snapshot::{PolicySnapshot, SnapshotStore};
pub use state::{pendulum_state, PendulumState, Terminal};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        advance, pendulum_state, ControlSet, DiscreteAction, Dynamics, Environment, LqrWeights, PendulumState,
        PlantModel, PolicySnapshot, Result, Reward, RiccatiController, SimulationConfig, StateGrid, Step,
        TabularEnvironment, Task, Terminal, TrainingConfig,
    };
}
