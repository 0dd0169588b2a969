//! Pendulum environment and policy replay
//!
//! This crate provides:
//! - [`PendulumEnv`], the tabular training environment over the plant family
//! - the table and LQR controllers used when replaying a snapshot
//! - [`Replayer`], a pausable, stoppable closed-loop simulation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod controller;
pub mod pendulum;
pub mod replay;

// Re-export environments
pub use pendulum::PendulumEnv;

// Re-export replay components
pub use controller::{ControlSource, LqrSupervisor, TablePolicy};
pub use replay::{CellTrace, ReplayControl, ReplayObservation, ReplayStatus, ReplaySummary, Replayer, FADE_WINDOW};

// Re-export core types
pub use pendulum_rl_core::{Environment, PolicySnapshot, SimulationConfig, Step, TabularEnvironment, TrainingConfig};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{PendulumEnv, ReplayControl, ReplayObservation, Replayer};
    pub use pendulum_rl_core::prelude::*;
}
