//! Episodic tabular Q-learning
//!
//! A [`QLearner`] owns its Q-table, its exploration state and its snapshot
//! cadence. It drives any [`TabularEnvironment`] and reports progress
//! through a [`TrainingObserver`]. The only outside input while running is
//! the [`StopSignal`], polled once per episode after all bookkeeping.

use std::time::Instant;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use uuid::Uuid;

use pendulum_rl_core::{PolicySnapshot, RLError, Result, TabularEnvironment, Terminal, TrainingConfig};

use crate::diagnostics::{ConvergenceTracker, EpisodeStats};
use crate::observer::TrainingObserver;
use crate::policy::{EpsilonGreedy, Policy};
use crate::utils::{ExponentialSchedule, Schedule, StopSignal};
use crate::value::{l2_norm, min_max, QTable};

/// Lifecycle of a training run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Created, not started
    Idle,
    /// Episodes in progress
    Running,
    /// Every configured episode ran
    Completed,
    /// Ended early by the stop signal or an error
    Stopped,
}

/// How a run ended
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    /// Final status, `Completed` or `Stopped`
    pub status: RunStatus,
    /// Episodes finished
    pub episodes: usize,
    /// Transitions taken over the whole run
    pub total_steps: u64,
    /// Stats of the last finished episode
    pub last_stats: Option<EpisodeStats>,
    /// Snapshot of the final tables
    pub snapshot: PolicySnapshot,
}

/// Tabular Q-learning agent bound to one environment
pub struct QLearner<E> {
    config: TrainingConfig,
    env: E,
    table: QTable,
    policy: EpsilonGreedy,
    schedule: ExponentialSchedule,
    rng: StdRng,
    stop: StopSignal,
    status: RunStatus,
    tracker: ConvergenceTracker,
    run_id: Uuid,
    total_steps: u64,
}

impl<E: TabularEnvironment> QLearner<E> {
    /// Validate `config` and allocate a zero Q-table sized by `env`
    pub fn new(config: TrainingConfig, env: E) -> Result<Self> {
        config.validate()?;
        let expected = config.control_set.len();
        if env.num_actions() != expected {
            return Err(RLError::DimensionMismatch {
                expected,
                actual: env.num_actions(),
            });
        }

        let table = QTable::zeros(env.num_states(), env.num_actions());
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let policy = EpsilonGreedy::new(config.epsilon, config.control_set.space());
        let schedule = ExponentialSchedule::new(config.epsilon, 0.0, config.epsilon_decay);

        Ok(Self {
            config,
            env,
            table,
            policy,
            schedule,
            rng,
            stop: StopSignal::new(),
            status: RunStatus::Idle,
            tracker: ConvergenceTracker::new(),
            run_id: Uuid::new_v4(),
            total_steps: 0,
        })
    }

    /// Handle that stops the run after the current episode
    #[must_use]
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Current lifecycle state
    #[must_use]
    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// The learned action values
    #[must_use]
    pub fn table(&self) -> &QTable {
        &self.table
    }

    /// Run configuration
    #[must_use]
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Identifier stamped on every snapshot of this run
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Transitions taken so far
    #[must_use]
    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    /// Exploration rate for the next transition
    #[must_use]
    pub fn epsilon(&self) -> f64 {
        self.schedule.value(self.total_steps)
    }

    /// The environment being trained on
    #[must_use]
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Immutable copy of the derived tables after `episode` episodes
    #[must_use]
    pub fn snapshot(&self, episode: usize) -> PolicySnapshot {
        let controls = self.env.control_values().to_vec();
        PolicySnapshot {
            label: self.config.label.clone(),
            run_id: self.run_id,
            created_at: Utc::now(),
            episode,
            task: self.config.task,
            control_set: self.config.control_set,
            u_max: self.config.u_max,
            policy: self.table.policy_table(&controls),
            value: self.table.value_table(),
            controls,
            dt: self.config.dt,
            max_steps: self.config.max_steps,
            grid: self.env.grid().clone(),
        }
    }

    /// Run every configured episode, or until the stop signal is raised
    pub fn run<O>(&mut self, observer: &mut O) -> Result<TrainingOutcome>
    where
        O: TrainingObserver + ?Sized,
    {
        if self.status != RunStatus::Idle {
            return Err(anyhow::anyhow!("training run `{}` was already started", self.config.label).into());
        }
        self.status = RunStatus::Running;
        info!(
            label = %self.config.label,
            task = %self.config.task,
            control_set = %self.config.control_set,
            states = self.table.num_states(),
            actions = self.table.num_actions(),
            episodes = self.config.max_episodes,
            "Starting Q-learning run"
        );

        match self.train(observer) {
            Ok(outcome) => {
                self.status = outcome.status;
                info!(
                    label = %self.config.label,
                    status = ?outcome.status,
                    episodes = outcome.episodes,
                    total_steps = outcome.total_steps,
                    "Q-learning run finished"
                );
                Ok(outcome)
            }
            Err(e) => {
                self.status = RunStatus::Stopped;
                error!(label = %self.config.label, error = %e, "Q-learning run aborted");
                Err(e)
            }
        }
    }

    fn train<O>(&mut self, observer: &mut O) -> Result<TrainingOutcome>
    where
        O: TrainingObserver + ?Sized,
    {
        let started = Instant::now();
        let interval = self.config.snapshot_interval;
        let mut last_snapshot: Option<PolicySnapshot> = None;
        let mut last_stats = None;
        let mut episodes = 0;
        let mut status = RunStatus::Completed;

        for index in 0..self.config.max_episodes {
            let stats = self.run_episode(index + 1, started)?;
            episodes = index + 1;
            debug!(
                episode = stats.episode,
                steps = stats.steps,
                goal = stats.reached_goal,
                v_norm = stats.v_norm,
                q_norm = stats.q_norm,
                v_delta = ?stats.v_delta,
                q_delta = ?stats.q_delta,
                epsilon = stats.epsilon,
                "Episode finished"
            );
            observer.on_episode(&stats)?;
            last_stats = Some(stats);

            if index % interval == 0 {
                let snapshot = self.snapshot(episodes);
                observer.on_snapshot(&snapshot)?;
                info!(label = %snapshot.label, episode = episodes, "Emitted policy snapshot");
                last_snapshot = Some(snapshot);
            }

            if self.stop.is_stop_requested() {
                info!(label = %self.config.label, episode = episodes, "Stop requested");
                status = RunStatus::Stopped;
                break;
            }
        }

        let snapshot = match last_snapshot {
            Some(snapshot) if snapshot.episode == episodes => snapshot,
            _ => {
                let snapshot = self.snapshot(episodes);
                observer.on_snapshot(&snapshot)?;
                info!(label = %snapshot.label, episode = episodes, "Emitted final policy snapshot");
                snapshot
            }
        };

        Ok(TrainingOutcome {
            status,
            episodes,
            total_steps: self.total_steps,
            last_stats,
            snapshot,
        })
    }

    fn run_episode(&mut self, episode: usize, started: Instant) -> Result<EpisodeStats> {
        let alpha = self.config.alpha;
        let gamma = self.config.gamma;
        let mut cell = self.env.reset()?;
        let mut steps = 0;
        let mut total_reward = 0.0;
        let mut reached_goal = false;

        while steps < self.config.max_steps {
            self.policy.set_epsilon(self.schedule.value(self.total_steps));
            let action = self.policy.select(&self.table, cell, &mut self.rng);
            let step = self.env.step(action)?;

            let reward = step.reward.value();
            self.table.update(cell, action.index(), reward, step.observation, alpha, gamma);
            self.total_steps += 1;
            steps += 1;
            total_reward += reward;
            cell = step.observation;

            match step.terminal {
                Terminal::No => {}
                Terminal::Yes => {
                    reached_goal = true;
                    break;
                }
                Terminal::Truncated => break,
            }
        }

        let value = self.table.value_table();
        let v_norm = l2_norm(&value);
        let q_norm = self.table.frobenius_norm();
        let (v_delta, q_delta) = self.tracker.record(v_norm, q_norm);

        Ok(EpisodeStats {
            episode,
            steps,
            reached_goal,
            total_reward,
            v_norm,
            q_norm,
            v_delta,
            q_delta,
            epsilon: self.epsilon(),
            q_range: self.table.range(),
            v_range: min_max(value.iter().copied()),
            elapsed: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::{NullObserver, RecordingObserver};
    use pendulum_rl_core::{ControlSet, DiscreteAction, Environment, Reward, StateGrid, Step};

    /// Three cells in a row; action 1 moves right, the right end is the goal
    struct Corridor {
        grid: StateGrid,
        controls: Vec<f64>,
        position: usize,
    }

    impl Corridor {
        fn new() -> Self {
            Self {
                grid: StateGrid {
                    theta: vec![0.0, 1.0, 2.0],
                    omega: vec![0.0],
                },
                controls: vec![-1.0, 1.0],
                position: 0,
            }
        }
    }

    impl Environment for Corridor {
        type Observation = usize;
        type Action = DiscreteAction;
        type State = usize;

        fn reset(&mut self) -> Result<usize> {
            self.position = 0;
            Ok(0)
        }

        fn step(&mut self, action: DiscreteAction) -> Result<Step<usize, usize>> {
            self.position = match action.index() {
                0 => self.position.saturating_sub(1),
                _ => (self.position + 1).min(2),
            };
            let at_goal = self.position == 2;
            Ok(Step {
                observation: self.position,
                reward: Reward(if at_goal { 0.0 } else { -1.0 }),
                terminal: if at_goal { Terminal::Yes } else { Terminal::No },
                state: Some(self.position),
            })
        }
    }

    impl TabularEnvironment for Corridor {
        fn control_values(&self) -> &[f64] {
            &self.controls
        }

        fn grid(&self) -> &StateGrid {
            &self.grid
        }
    }

    fn config(max_episodes: usize) -> TrainingConfig {
        TrainingConfig {
            label: "corridor".into(),
            control_set: ControlSet::BangBang,
            max_episodes,
            max_steps: 50,
            seed: Some(7),
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn learns_to_walk_right() {
        let mut learner = QLearner::new(config(200), Corridor::new()).unwrap();
        let outcome = learner.run(&mut NullObserver).unwrap();

        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.episodes, 200);
        assert_eq!(learner.status(), RunStatus::Completed);
        assert_eq!(learner.table().greedy_action(0), 1);
        assert_eq!(learner.table().greedy_action(1), 1);
        assert_eq!(outcome.snapshot.policy[..2], [1.0, 1.0]);
    }

    #[test]
    fn snapshot_cadence_includes_first_and_final_episode() {
        let mut observer = RecordingObserver::default();
        let mut learner = QLearner::new(config(25), Corridor::new()).unwrap();
        learner.run(&mut observer).unwrap();

        let episodes: Vec<_> = observer.snapshots.iter().map(|s| s.episode).collect();
        assert_eq!(episodes, vec![1, 11, 21, 25]);
        assert_eq!(observer.episodes.len(), 25);
        assert!(observer.snapshots.iter().all(|s| s.run_id == learner.run_id()));
    }

    #[test]
    fn final_snapshot_is_not_duplicated() {
        let mut observer = RecordingObserver::default();
        let mut learner = QLearner::new(config(21), Corridor::new()).unwrap();
        learner.run(&mut observer).unwrap();

        let episodes: Vec<_> = observer.snapshots.iter().map(|s| s.episode).collect();
        assert_eq!(episodes, vec![1, 11, 21]);
    }

    #[test]
    fn stop_is_honoured_after_the_current_episode() {
        let mut observer = RecordingObserver::default();
        let mut learner = QLearner::new(config(100), Corridor::new()).unwrap();
        learner.stop_signal().request_stop();
        let outcome = learner.run(&mut observer).unwrap();

        assert_eq!(outcome.status, RunStatus::Stopped);
        assert_eq!(outcome.episodes, 1);
        assert_eq!(observer.episodes.len(), 1);
        assert_eq!(observer.snapshots.len(), 1);
    }

    #[test]
    fn first_episode_reports_no_delta() {
        let mut observer = RecordingObserver::default();
        let mut learner = QLearner::new(config(3), Corridor::new()).unwrap();
        learner.run(&mut observer).unwrap();

        assert_eq!(observer.episodes[0].v_delta, None);
        assert!(observer.episodes[1].q_delta.is_some());
        assert_eq!(observer.episodes[2].episode, 3);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let bad = TrainingConfig {
            gamma: 1.1,
            ..config(10)
        };
        assert!(matches!(
            QLearner::new(bad, Corridor::new()),
            Err(RLError::Configuration { parameter: "gamma", .. })
        ));
    }

    #[test]
    fn action_count_must_match_control_set() {
        let wide = TrainingConfig {
            control_set: ControlSet::Discrete5,
            ..config(10)
        };
        assert!(matches!(
            QLearner::new(wide, Corridor::new()),
            Err(RLError::DimensionMismatch { expected: 5, actual: 2 })
        ));
    }

    #[test]
    fn a_run_cannot_be_restarted() {
        let mut learner = QLearner::new(config(1), Corridor::new()).unwrap();
        learner.run(&mut NullObserver).unwrap();
        assert!(learner.run(&mut NullObserver).is_err());
    }

    #[test]
    fn epsilon_decays_per_transition() {
        let decaying = TrainingConfig {
            epsilon: 0.5,
            epsilon_decay: 0.99,
            ..config(5)
        };
        let mut learner = QLearner::new(decaying, Corridor::new()).unwrap();
        learner.run(&mut NullObserver).unwrap();
        #[allow(clippy::cast_precision_loss)]
        let expected = 0.5 * 0.99_f64.powf(learner.total_steps() as f64);
        approx::assert_relative_eq!(learner.epsilon(), expected);
    }
}
