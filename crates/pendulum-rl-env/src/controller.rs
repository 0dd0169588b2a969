//! Replay-time controllers: the learned table and the LQR supervisor

use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::warn;

use pendulum_rl_core::{
    LqrFallback, LqrWeights, PendulumState, PlantModel, PolicySnapshot, RLError, Result, RiccatiController, StateGrid,
};

/// Where a replay step's control came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "kebab-case")]
pub enum ControlSource {
    /// Looked up in the learned policy table
    Table,
    /// Computed by the per-step LQR
    Lqr,
    /// LQR synthesis failed, the table control was applied instead
    TableFallback {
        /// Why the LQR gain could not be computed
        reason: String,
    },
}

/// Greedy control lookup over a snapshot's policy table
#[derive(Debug, Clone)]
pub struct TablePolicy {
    grid: StateGrid,
    policy: Vec<f64>,
}

impl TablePolicy {
    /// Policy table of a snapshot
    #[must_use]
    pub fn from_snapshot(snapshot: &PolicySnapshot) -> Self {
        Self {
            grid: snapshot.grid.clone(),
            policy: snapshot.policy.clone(),
        }
    }

    /// Grid the table is indexed by
    #[must_use]
    pub fn grid(&self) -> &StateGrid {
        &self.grid
    }

    /// Cell of `state` and the control stored for it
    #[must_use]
    pub fn lookup(&self, state: &PendulumState) -> (usize, f64) {
        let cell = self.grid.cell_index(state);
        (cell, self.policy[cell])
    }
}

/// LQR wrapped around the table policy with a failure policy
#[derive(Debug, Clone)]
pub struct LqrSupervisor {
    controller: RiccatiController,
    fallback: LqrFallback,
}

impl LqrSupervisor {
    /// Supervisor with the given weights, control limit and failure policy
    #[must_use]
    pub fn new(weights: LqrWeights, u_max: f64, fallback: LqrFallback) -> Self {
        Self {
            controller: RiccatiController::new(weights, u_max),
            fallback,
        }
    }

    /// LQR control linearized at `(state, table_control)`.
    ///
    /// A controllability failure either falls back to `table_control` or is
    /// returned, depending on the configured [`LqrFallback`].
    pub fn control(
        &self,
        plant: &PlantModel,
        state: &PendulumState,
        table_control: f64,
        rng: &mut dyn RngCore,
    ) -> Result<(f64, ControlSource)> {
        match self.controller.control(plant, state, table_control, rng) {
            Ok(u) => Ok((u, ControlSource::Lqr)),
            Err(RLError::Controllability(reason)) if self.fallback == LqrFallback::TablePolicy => {
                warn!(
                    theta = state[0],
                    omega = state[1],
                    %reason,
                    "LQR unavailable, applying table control"
                );
                Ok((
                    table_control,
                    ControlSource::TableFallback {
                        reason: reason.to_string(),
                    },
                ))
            }
            Err(e) => Err(e),
        }
    }
}
