//! Tabular Q-learning for pendulum control
//!
//! This crate provides the learning side of the workspace:
//! - a dense Q-table with greedy derivation of the value and policy tables
//! - epsilon-greedy exploration with per-step exponential decay
//! - the episodic [`QLearner`] with convergence diagnostics
//! - observers that turn episodes and snapshots into logs, files or events

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod diagnostics;
pub mod observer;
pub mod policy;
pub mod qlearning;
pub mod utils;
pub mod value;

// Re-export the learner
pub use qlearning::{QLearner, RunStatus, TrainingOutcome};

// Re-export utilities
pub use diagnostics::{ConvergenceTracker, EpisodeStats};
pub use observer::{NullObserver, RecordingObserver, TrainingEvent, TrainingObserver};
pub use policy::{EpsilonGreedy, Greedy, Policy};
pub use utils::{ExponentialSchedule, Schedule, StopSignal};
pub use value::QTable;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{EpisodeStats, QLearner, QTable, RunStatus, StopSignal, TrainingEvent, TrainingObserver};
    pub use pendulum_rl_core::prelude::*;
}
