//! Closed-loop replay of a learned policy against the continuous plant
//!
//! A [`Replayer`] advances one integration step per [`Replayer::step`] call.
//! The outside world steers it through a cloneable [`ReplayControl`]: stop
//! ends the replay at the next step, pause freezes state and simulated time
//! while observations keep flowing. Paused steps do not count against the
//! step budget.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use pendulum_rl_core::{
    advance, pendulum_state, LqrWeights, PendulumState, PlantModel, PolicySnapshot, Result, SimulationConfig,
    SnapshotStore,
};

use crate::controller::{ControlSource, LqrSupervisor, TablePolicy};

/// Trace points kept when the trace fades
pub const FADE_WINDOW: usize = 50;

/// Shared stop and pause flags for a running replay
#[derive(Debug, Clone, Default)]
pub struct ReplayControl {
    stop: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
}

impl ReplayControl {
    /// End the replay at its next step
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Whether a stop has been requested
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Flip the pause flag, returning the new value
    pub fn toggle_pause(&self) -> bool {
        !self.paused.fetch_xor(true, Ordering::SeqCst)
    }

    /// Set the pause flag
    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    /// Whether the replay is paused
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}

/// Lifecycle of a replay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplayStatus {
    /// Constructed, no step taken
    Ready,
    /// Stepping
    Running,
    /// Step budget used up
    Finished,
    /// Ended by a stop request
    Stopped,
}

/// What one replay step produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayObservation {
    /// Steps integrated so far
    pub step: usize,
    /// Angle in degrees
    pub angle_deg: f64,
    /// Angular velocity
    pub omega: f64,
    /// Control applied (or that would have been applied while paused)
    pub control: f64,
    /// Simulated time after the step
    pub time: f64,
    /// Grid coordinates `(i, j)` of the state
    pub cell: (usize, usize),
    /// Where the control came from
    pub source: ControlSource,
    /// Whether this step was paused
    pub paused: bool,
}

/// Recent grid cells visited, for drawing the path over the policy map
#[derive(Debug, Clone)]
pub struct CellTrace {
    cells: VecDeque<(usize, usize)>,
    persistent: bool,
}

impl CellTrace {
    /// Fading trace of the last [`FADE_WINDOW`] cells, or a full one
    #[must_use]
    pub fn new(persistent: bool) -> Self {
        Self {
            cells: VecDeque::new(),
            persistent,
        }
    }

    /// Append a visited cell
    pub fn push(&mut self, cell: (usize, usize)) {
        self.cells.push_back(cell);
        if !self.persistent && self.cells.len() > FADE_WINDOW {
            self.cells.pop_front();
        }
    }

    /// Cells in visiting order, oldest first
    pub fn cells(&self) -> impl Iterator<Item = &(usize, usize)> + '_ {
        self.cells.iter()
    }

    /// Number of cells kept
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether no cell has been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Totals of a finished replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplaySummary {
    /// How the replay ended
    pub status: ReplayStatus,
    /// Steps integrated
    pub steps: usize,
    /// Simulated time
    pub time: f64,
    /// Final angle in degrees
    pub angle_deg: f64,
    /// Final angular velocity
    pub omega: f64,
}

/// Drives a snapshot's policy through the plant
pub struct Replayer {
    snapshot: PolicySnapshot,
    plant: PlantModel,
    table: TablePolicy,
    lqr: Option<LqrSupervisor>,
    dt: f64,
    max_steps: usize,
    step_delay: Duration,
    state: PendulumState,
    time: f64,
    steps: usize,
    status: ReplayStatus,
    control: ReplayControl,
    trace: CellTrace,
    rng: StdRng,
}

impl Replayer {
    /// Replay `snapshot` under `config`; the config's step overrides the
    /// snapshot's training step.
    pub fn new(snapshot: PolicySnapshot, config: &SimulationConfig) -> Result<Self> {
        config.validate()?;
        snapshot.validate()?;

        let lqr = config.use_lqr.then(|| {
            LqrSupervisor::new(LqrWeights::from_config(&config.lqr), snapshot.u_max, config.lqr_fallback)
        });
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let control = ReplayControl::default();
        control.set_paused(config.start_paused);

        info!(
            label = %snapshot.label,
            task = %snapshot.task,
            episode = snapshot.episode,
            lqr = config.use_lqr,
            "Prepared policy replay"
        );

        Ok(Self {
            plant: snapshot.task.plant(),
            table: TablePolicy::from_snapshot(&snapshot),
            snapshot,
            lqr,
            dt: config.dt,
            max_steps: config.max_steps,
            step_delay: Duration::from_secs_f64(config.step_delay),
            state: pendulum_state(config.initial_angle_deg.to_radians(), config.initial_omega),
            time: 0.0,
            steps: 0,
            status: ReplayStatus::Ready,
            control,
            trace: CellTrace::new(config.persistent_trace),
            rng,
        })
    }

    /// Load the snapshot at `path` and prepare its replay
    pub fn from_path(path: impl AsRef<Path>, config: &SimulationConfig) -> Result<Self> {
        let snapshot = SnapshotStore::load_path(path)?;
        Self::new(snapshot, config)
    }

    /// Handle for stopping and pausing from elsewhere
    #[must_use]
    pub fn control(&self) -> ReplayControl {
        self.control.clone()
    }

    /// Current lifecycle state
    #[must_use]
    pub fn status(&self) -> ReplayStatus {
        self.status
    }

    /// Current continuous state
    #[must_use]
    pub fn state(&self) -> PendulumState {
        self.state
    }

    /// Simulated time
    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Steps integrated so far
    #[must_use]
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Cells visited
    #[must_use]
    pub fn trace(&self) -> &CellTrace {
        &self.trace
    }

    /// Snapshot being replayed
    #[must_use]
    pub fn snapshot(&self) -> &PolicySnapshot {
        &self.snapshot
    }

    /// Advance one step, or `None` once the replay has ended
    pub fn step(&mut self) -> Result<Option<ReplayObservation>> {
        if matches!(self.status, ReplayStatus::Finished | ReplayStatus::Stopped) {
            return Ok(None);
        }
        if self.control.is_stop_requested() {
            self.status = ReplayStatus::Stopped;
            info!(steps = self.steps, time = self.time, "Replay stopped");
            return Ok(None);
        }
        if self.steps >= self.max_steps {
            self.status = ReplayStatus::Finished;
            info!(steps = self.steps, time = self.time, "Replay finished");
            return Ok(None);
        }
        self.status = ReplayStatus::Running;

        let (_, table_control) = self.table.lookup(&self.state);
        let (control, source) = match &self.lqr {
            Some(lqr) => lqr.control(&self.plant, &self.state, table_control, &mut self.rng)?,
            None => (table_control, ControlSource::Table),
        };

        let paused = self.control.is_paused();
        if !paused {
            self.state = advance(&self.plant, self.dt, &self.state, control, &mut self.rng);
            self.time += self.dt;
            self.steps += 1;
        }

        let cell = self.table.grid().cell_to_coordinates(self.table.grid().cell_index(&self.state));
        if !paused {
            self.trace.push(cell);
        }

        let observation = ReplayObservation {
            step: self.steps,
            angle_deg: self.state[0].to_degrees(),
            omega: self.state[1],
            control,
            time: self.time,
            cell,
            source,
            paused,
        };
        debug!(
            step = observation.step,
            angle_deg = observation.angle_deg,
            omega = observation.omega,
            control = observation.control,
            paused,
            "Replay step"
        );
        Ok(Some(observation))
    }

    /// Step until the replay ends, sleeping the configured delay between
    /// steps and handing every observation to `sink`.
    pub async fn play<F>(&mut self, mut sink: F) -> Result<ReplaySummary>
    where
        F: FnMut(&ReplayObservation),
    {
        while let Some(observation) = self.step()? {
            sink(&observation);
            if !self.step_delay.is_zero() {
                tokio::time::sleep(self.step_delay).await;
            }
        }
        Ok(self.summary())
    }

    /// Totals so far
    #[must_use]
    pub fn summary(&self) -> ReplaySummary {
        ReplaySummary {
            status: self.status,
            steps: self.steps,
            time: self.time,
            angle_deg: self.state[0].to_degrees(),
            omega: self.state[1],
        }
    }
}
