//! Tabular environment over a continuous pendulum plant

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use pendulum_rl_core::{
    advance, DiscreteAction, DiscreteSpace, Environment, PendulumState, PlantModel, RLError, Result, RewardTables,
    StateGrid, Step, TabularEnvironment, Task, Terminal, TrainingConfig,
};

/// Mixed into the run seed so plant noise and exploration draw from
/// different streams
const PLANT_SEED_SALT: u64 = 0x9E37_79B9_7F4A_7C15;

/// Pendulum plant seen through the state grid.
///
/// Observations are flat cell indices, actions index the scaled control set,
/// and rewards come from the precomputed quadratic tables. An episode ends
/// once the state norm drops below the goal threshold, or is truncated at
/// the step budget.
pub struct PendulumEnv {
    task: Task,
    plant: PlantModel,
    grid: StateGrid,
    controls: Vec<f64>,
    space: DiscreteSpace,
    rewards: RewardTables,
    dt: f64,
    max_steps: usize,
    goal_threshold: f64,
    state: PendulumState,
    steps: usize,
    rng: StdRng,
}

impl PendulumEnv {
    /// Build the environment described by a training configuration
    pub fn from_config(config: &TrainingConfig) -> Result<Self> {
        config.validate()?;
        let grid = StateGrid::new(config.theta_step, config.omega_step)?;
        let controls = config.controls();
        let rewards = RewardTables::new(&grid, &controls, config.cost_weights());
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ PLANT_SEED_SALT),
            None => StdRng::from_entropy(),
        };
        debug!(
            task = %config.task,
            cells = grid.len(),
            actions = controls.len(),
            "Built pendulum environment"
        );

        Ok(Self {
            task: config.task,
            plant: config.task.plant(),
            space: config.control_set.space(),
            state: config.task.initial_state(),
            grid,
            controls,
            rewards,
            dt: config.dt,
            max_steps: config.max_steps,
            goal_threshold: config.goal_threshold,
            steps: 0,
            rng,
        })
    }

    /// Scenario being simulated
    #[must_use]
    pub fn task(&self) -> Task {
        self.task
    }

    /// Plant model being integrated
    #[must_use]
    pub fn plant(&self) -> &PlantModel {
        &self.plant
    }

    /// Current continuous state
    #[must_use]
    pub fn current_state(&self) -> PendulumState {
        self.state
    }

    /// Transitions since the last reset
    #[must_use]
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Reward tables used for transitions
    #[must_use]
    pub fn rewards(&self) -> &RewardTables {
        &self.rewards
    }
}

impl Environment for PendulumEnv {
    type Observation = usize;
    type Action = DiscreteAction;
    type State = PendulumState;

    fn reset(&mut self) -> Result<usize> {
        self.state = self.task.initial_state();
        self.steps = 0;
        Ok(self.grid.cell_index(&self.state))
    }

    fn step(&mut self, action: DiscreteAction) -> Result<Step<usize, PendulumState>> {
        if !self.space.contains(action) {
            return Err(RLError::InvalidAction(format!(
                "action {} outside control set of {}",
                action.index(),
                self.controls.len()
            )));
        }

        let control = self.controls[action.index()];
        self.state = advance(&self.plant, self.dt, &self.state, control, &mut self.rng);
        self.steps += 1;

        let cell = self.grid.cell_index(&self.state);
        let terminal = if self.state.norm() < self.goal_threshold {
            Terminal::Yes
        } else if self.steps >= self.max_steps {
            Terminal::Truncated
        } else {
            Terminal::No
        };

        Ok(Step {
            observation: cell,
            reward: self.rewards.transition(cell, action.index()),
            terminal,
            state: Some(self.state),
        })
    }

    fn state(&self) -> Option<PendulumState> {
        Some(self.state)
    }
}

impl TabularEnvironment for PendulumEnv {
    fn control_values(&self) -> &[f64] {
        &self.controls
    }

    fn grid(&self) -> &StateGrid {
        &self.grid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pendulum_rl_core::ControlSet;
    use std::f64::consts::PI;

    fn config() -> TrainingConfig {
        TrainingConfig {
            seed: Some(1),
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn reset_starts_hanging() {
        let mut env = PendulumEnv::from_config(&config()).unwrap();
        let cell = env.reset().unwrap();
        let (i, j) = env.grid().cell_to_coordinates(cell);
        assert!((env.grid().theta[i] - PI).abs() <= 0.0125);
        assert!(env.grid().omega[j].abs() <= 0.025);
        assert_eq!(env.num_states(), 253 * 127);
        assert_eq!(env.num_actions(), 2);
    }

    #[test]
    fn swing_starts_with_a_push() {
        let swing = TrainingConfig {
            task: Task::Swing,
            ..config()
        };
        let mut env = PendulumEnv::from_config(&swing).unwrap();
        env.reset().unwrap();
        assert_eq!(env.current_state()[1], 1.0);
    }

    #[test]
    fn step_angle_stays_wrapped() {
        let mut env = PendulumEnv::from_config(&config()).unwrap();
        env.reset().unwrap();
        for _ in 0..200 {
            let step = env.step(DiscreteAction(1)).unwrap();
            let state = step.state.unwrap();
            assert!(state[0] >= -PI && state[0] < PI);
            assert_eq!(step.observation, env.grid().cell_index(&state));
        }
    }

    #[test]
    fn budget_truncates_episode() {
        let short = TrainingConfig {
            max_steps: 3,
            ..config()
        };
        let mut env = PendulumEnv::from_config(&short).unwrap();
        env.reset().unwrap();
        assert_eq!(env.step(DiscreteAction(0)).unwrap().terminal, Terminal::No);
        assert_eq!(env.step(DiscreteAction(0)).unwrap().terminal, Terminal::No);
        assert_eq!(env.step(DiscreteAction(0)).unwrap().terminal, Terminal::Truncated);
    }

    #[test]
    fn out_of_range_action_is_rejected() {
        let mut env = PendulumEnv::from_config(&config()).unwrap();
        env.reset().unwrap();
        assert!(matches!(env.step(DiscreteAction(2)), Err(RLError::InvalidAction(_))));
    }

    #[test]
    fn reward_matches_tables() {
        let weighted = TrainingConfig {
            control_set: ControlSet::BangZeroBang,
            ru1: 0.5,
            ..config()
        };
        let mut env = PendulumEnv::from_config(&weighted).unwrap();
        env.reset().unwrap();
        let step = env.step(DiscreteAction(2)).unwrap();
        let expected = env.rewards().state[step.observation] - 0.5;
        approx::assert_relative_eq!(step.reward.value(), expected);
    }
}
