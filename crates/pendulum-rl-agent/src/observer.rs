//! Sinks for training progress
//!
//! The learner reports every finished episode and every snapshot through a
//! [`TrainingObserver`]. Persistence and display are just observers.

use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use pendulum_rl_core::{PolicySnapshot, Result, SnapshotStore};

use crate::diagnostics::EpisodeStats;

/// Receives training progress as it happens
pub trait TrainingObserver {
    /// Called after every episode's bookkeeping
    fn on_episode(&mut self, stats: &EpisodeStats) -> Result<()>;

    /// Called with every emitted snapshot
    fn on_snapshot(&mut self, snapshot: &PolicySnapshot) -> Result<()>;
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl TrainingObserver for NullObserver {
    fn on_episode(&mut self, _stats: &EpisodeStats) -> Result<()> {
        Ok(())
    }

    fn on_snapshot(&mut self, _snapshot: &PolicySnapshot) -> Result<()> {
        Ok(())
    }
}

/// Progress message sent to asynchronous consumers
#[derive(Debug, Clone)]
pub enum TrainingEvent {
    /// An episode finished
    Episode(EpisodeStats),
    /// A snapshot was emitted
    Snapshot(Box<PolicySnapshot>),
}

impl TrainingObserver for UnboundedSender<TrainingEvent> {
    fn on_episode(&mut self, stats: &EpisodeStats) -> Result<()> {
        if self.send(TrainingEvent::Episode(stats.clone())).is_err() {
            debug!(episode = stats.episode, "Training event receiver dropped");
        }
        Ok(())
    }

    fn on_snapshot(&mut self, snapshot: &PolicySnapshot) -> Result<()> {
        if self.send(TrainingEvent::Snapshot(Box::new(snapshot.clone()))).is_err() {
            debug!(episode = snapshot.episode, "Training event receiver dropped");
        }
        Ok(())
    }
}

impl TrainingObserver for SnapshotStore {
    fn on_episode(&mut self, _stats: &EpisodeStats) -> Result<()> {
        Ok(())
    }

    fn on_snapshot(&mut self, snapshot: &PolicySnapshot) -> Result<()> {
        self.save(snapshot).map(|_| ())
    }
}

/// Every event goes to both observers, left first
impl<A, B> TrainingObserver for (A, B)
where
    A: TrainingObserver,
    B: TrainingObserver,
{
    fn on_episode(&mut self, stats: &EpisodeStats) -> Result<()> {
        self.0.on_episode(stats)?;
        self.1.on_episode(stats)
    }

    fn on_snapshot(&mut self, snapshot: &PolicySnapshot) -> Result<()> {
        self.0.on_snapshot(snapshot)?;
        self.1.on_snapshot(snapshot)
    }
}

/// Collects everything in memory
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    /// Stats of every episode, in order
    pub episodes: Vec<EpisodeStats>,
    /// Every emitted snapshot, in order
    pub snapshots: Vec<PolicySnapshot>,
}

impl TrainingObserver for RecordingObserver {
    fn on_episode(&mut self, stats: &EpisodeStats) -> Result<()> {
        self.episodes.push(stats.clone());
        Ok(())
    }

    fn on_snapshot(&mut self, snapshot: &PolicySnapshot) -> Result<()> {
        self.snapshots.push(snapshot.clone());
        Ok(())
    }
}
