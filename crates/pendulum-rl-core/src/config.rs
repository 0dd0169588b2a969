//! Training and simulation configuration records
//!
//! Both records deserialize with defaults for missing fields, so partial
//! configuration files are accepted. Validation is explicit and runs before
//! anything is allocated.

use serde::{Deserialize, Serialize};

use crate::action::ControlSet;
use crate::plant::Task;
use crate::reward::CostWeights;
use crate::{RLError, Result};

/// Configuration of a Q-learning run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Run label, used to name snapshots
    pub label: String,
    /// Plant scenario
    pub task: Task,
    /// Discrete control family
    pub control_set: ControlSet,
    /// Maximum control magnitude
    pub u_max: f64,
    /// Initial exploration rate
    pub epsilon: f64,
    /// Multiplicative exploration decay per step
    pub epsilon_decay: f64,
    /// Learning rate
    pub alpha: f64,
    /// Discount factor
    pub gamma: f64,
    /// Angle cost weight
    pub qx1: f64,
    /// Angular velocity cost weight
    pub qx2: f64,
    /// Control cost weight
    pub ru1: f64,
    /// Integration step
    pub dt: f64,
    /// Step budget per episode
    pub max_steps: usize,
    /// Episode budget
    pub max_episodes: usize,
    /// Emit a snapshot every this many episodes
    pub snapshot_interval: usize,
    /// Grid spacing along the angle axis
    pub theta_step: f64,
    /// Grid spacing along the angular velocity axis
    pub omega_step: f64,
    /// Episode ends once the state norm drops below this
    pub goal_threshold: f64,
    /// Seed for exploration and disturbances, entropy when absent
    pub seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            label: "Run 0".to_string(),
            task: Task::default(),
            control_set: ControlSet::default(),
            u_max: 1.0,
            epsilon: 0.5,
            epsilon_decay: 1.0,
            alpha: 0.99,
            gamma: 0.9,
            qx1: 1.0,
            qx2: 0.25,
            ru1: 0.0,
            dt: 0.1,
            max_steps: 1000,
            max_episodes: 15000,
            snapshot_interval: 10,
            theta_step: 0.025,
            omega_step: 0.05,
            goal_threshold: 0.01,
            seed: None,
        }
    }
}

fn unit_interval(parameter: &'static str, value: f64) -> Result<()> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(RLError::config(parameter, format!("must be in (0, 1], got {value}")))
    }
}

fn positive(parameter: &'static str, value: f64) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(RLError::config(parameter, format!("must be > 0, got {value}")))
    }
}

fn non_negative(parameter: &'static str, value: f64) -> Result<()> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(RLError::config(parameter, format!("must be >= 0, got {value}")))
    }
}

fn positive_count(parameter: &'static str, value: usize) -> Result<()> {
    if value > 0 {
        Ok(())
    } else {
        Err(RLError::config(parameter, "must be a positive integer"))
    }
}

/// Characters rejected in values that end up inside a file name
const FORBIDDEN_IN_FILE_NAMES: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

fn file_name_component(parameter: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(RLError::config(parameter, "must not be empty"));
    }
    if value.contains("..") {
        return Err(RLError::config(parameter, format!("must not contain `..`, got `{value}`")));
    }
    if let Some(c) = value
        .chars()
        .find(|c| c.is_control() || FORBIDDEN_IN_FILE_NAMES.contains(c))
    {
        return Err(RLError::config(
            parameter,
            format!("must be usable in a file name, `{}` is not allowed", c.escape_default()),
        ));
    }
    Ok(())
}

impl TrainingConfig {
    /// Check every parameter against its valid range
    pub fn validate(&self) -> Result<()> {
        file_name_component("label", &self.label)?;
        positive("u_max", self.u_max)?;
        unit_interval("epsilon", self.epsilon)?;
        unit_interval("epsilon_decay", self.epsilon_decay)?;
        unit_interval("alpha", self.alpha)?;
        unit_interval("gamma", self.gamma)?;
        non_negative("qx1", self.qx1)?;
        non_negative("qx2", self.qx2)?;
        non_negative("ru1", self.ru1)?;
        positive("dt", self.dt)?;
        positive_count("max_steps", self.max_steps)?;
        positive_count("max_episodes", self.max_episodes)?;
        positive_count("snapshot_interval", self.snapshot_interval)?;
        positive("theta_step", self.theta_step)?;
        positive("omega_step", self.omega_step)?;
        positive("goal_threshold", self.goal_threshold)?;
        Ok(())
    }

    /// Reward weights of this run
    #[must_use]
    pub fn cost_weights(&self) -> CostWeights {
        CostWeights {
            qx1: self.qx1,
            qx2: self.qx2,
            ru1: self.ru1,
        }
    }

    /// Physical control values of this run
    #[must_use]
    pub fn controls(&self) -> Vec<f64> {
        self.control_set.scaled(self.u_max)
    }
}

/// What the replay does when the LQR gain cannot be computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LqrFallback {
    /// Apply the learned table control for that step and report it
    TablePolicy,
    /// Abort the replay with the controllability error
    Halt,
}

impl Default for LqrFallback {
    fn default() -> Self {
        Self::TablePolicy
    }
}

/// LQR weighting matrices (diagonal state weight, scalar control weight)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LqrConfig {
    /// Diagonal of the state weight `Q`
    pub q_diag: [f64; 2],
    /// Control weight `R`
    pub r: f64,
}

impl Default for LqrConfig {
    fn default() -> Self {
        Self {
            q_diag: [1.0, 1.0],
            r: 1.0,
        }
    }
}

/// Configuration of a policy replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Wrap the table policy with a per-step LQR
    pub use_lqr: bool,
    /// Initial angle in degrees
    pub initial_angle_deg: f64,
    /// Initial angular velocity
    pub initial_omega: f64,
    /// Integration step, overrides the snapshot's step
    pub dt: f64,
    /// Wall-clock delay between steps, presentation only
    pub step_delay: f64,
    /// Step budget
    pub max_steps: usize,
    /// Keep the whole cell trace instead of a fading tail, presentation only
    pub persistent_trace: bool,
    /// Start in the paused state
    pub start_paused: bool,
    /// LQR weights
    pub lqr: LqrConfig,
    /// Behaviour when LQR synthesis fails
    pub lqr_fallback: LqrFallback,
    /// Seed for stochastic plants, entropy when absent
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            use_lqr: false,
            initial_angle_deg: 180.0,
            initial_omega: 0.0,
            dt: 0.1,
            step_delay: 0.05,
            max_steps: 20000,
            persistent_trace: false,
            start_paused: false,
            lqr: LqrConfig::default(),
            lqr_fallback: LqrFallback::default(),
            seed: None,
        }
    }
}

impl SimulationConfig {
    /// Check every parameter against its valid range
    pub fn validate(&self) -> Result<()> {
        if !self.initial_angle_deg.is_finite() {
            return Err(RLError::config("initial_angle_deg", "must be finite"));
        }
        if !self.initial_omega.is_finite() {
            return Err(RLError::config("initial_omega", "must be finite"));
        }
        positive("dt", self.dt)?;
        non_negative("step_delay", self.step_delay)?;
        positive_count("max_steps", self.max_steps)?;
        non_negative("lqr.q_diag[0]", self.lqr.q_diag[0])?;
        non_negative("lqr.q_diag[1]", self.lqr.q_diag[1])?;
        positive("lqr.r", self.lqr.r)?;
        Ok(())
    }
}
