//! Policy snapshots and their on-disk store
//!
//! A snapshot is an immutable copy of the derived policy and value tables
//! together with everything a replay needs to interpret them. The store
//! writes one JSON document per run label and replaces it atomically.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::action::ControlSet;
use crate::grid::StateGrid;
use crate::plant::Task;
use crate::{RLError, Result};

/// Learned tables plus the run metadata needed to replay them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySnapshot {
    /// Run label
    pub label: String,
    /// Identifier shared by every snapshot of one run
    pub run_id: Uuid,
    /// When this snapshot was taken
    pub created_at: DateTime<Utc>,
    /// Episode the tables were derived after (1-based)
    pub episode: usize,
    /// Plant scenario
    pub task: Task,
    /// Control family
    pub control_set: ControlSet,
    /// Control magnitude the levels were scaled by
    pub u_max: f64,
    /// Physical control values, in action order
    pub controls: Vec<f64>,
    /// Training integration step
    pub dt: f64,
    /// Training step budget per episode
    pub max_steps: usize,
    /// Grid the tables are indexed by
    pub grid: StateGrid,
    /// Greedy control per cell (`U`)
    pub policy: Vec<f64>,
    /// Greedy value per cell (`V`)
    pub value: Vec<f64>,
}

impl PolicySnapshot {
    /// Check that the tables agree with the grid and the control set
    pub fn validate(&self) -> Result<()> {
        self.grid.validate()?;
        let cells = self.grid.len();
        for (name, table) in [("policy", &self.policy), ("value", &self.value)] {
            if table.len() != cells {
                return Err(RLError::config(
                    "snapshot",
                    format!("{name} table has {} entries, grid has {cells} cells", table.len()),
                ));
            }
        }
        if self.controls.len() != self.control_set.len() {
            return Err(RLError::DimensionMismatch {
                expected: self.control_set.len(),
                actual: self.controls.len(),
            });
        }
        Ok(())
    }

    /// Table control for a flat cell index
    #[must_use]
    pub fn control_at(&self, cell: usize) -> f64 {
        self.policy[cell]
    }

    /// Smallest and largest entry of the value table
    #[must_use]
    pub fn value_range(&self) -> (f64, f64) {
        self.value
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
    }
}

/// Directory of `learn_<label>.json` snapshot files
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Store rooted at `dir`; the directory is created on first save
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File a label's snapshot lives in
    #[must_use]
    pub fn path_for(&self, label: &str) -> PathBuf {
        self.dir.join(format!("learn_{label}.json"))
    }

    /// Serialize `snapshot` and atomically replace the label's file
    pub fn save(&self, snapshot: &PolicySnapshot) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let bytes = serde_json::to_vec(snapshot)?;

        let target = self.path_for(&snapshot.label);
        let mut staging = tempfile::NamedTempFile::new_in(&self.dir)?;
        staging.write_all(&bytes)?;
        staging.as_file().sync_all()?;
        staging.persist(&target).map_err(|e| RLError::Io(e.error))?;

        info!(
            label = %snapshot.label,
            episode = snapshot.episode,
            path = %target.display(),
            "Saved policy snapshot"
        );
        Ok(target)
    }

    /// Load the snapshot stored under `label`
    pub fn load(&self, label: &str) -> Result<PolicySnapshot> {
        Self::load_path(self.path_for(label))
    }

    /// Load and validate a snapshot file
    pub fn load_path(path: impl AsRef<Path>) -> Result<PolicySnapshot> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(RLError::MissingSnapshot(path.to_path_buf()));
        }
        let bytes = fs::read(path)?;
        let snapshot: PolicySnapshot = serde_json::from_slice(&bytes)?;
        snapshot.validate()?;
        debug!(path = %path.display(), episode = snapshot.episode, "Loaded policy snapshot");
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(label: &str) -> PolicySnapshot {
        let grid = StateGrid::new(0.5, 1.0).unwrap();
        let cells = grid.len();
        #[allow(clippy::cast_precision_loss)]
        let value = (0..cells).map(|k| -0.1 * k as f64 / 3.0).collect();
        PolicySnapshot {
            label: label.to_string(),
            run_id: Uuid::new_v4(),
            created_at: Utc::now(),
            episode: 10,
            task: Task::Bumpers,
            control_set: ControlSet::BangZeroBang,
            u_max: 0.7,
            controls: ControlSet::BangZeroBang.scaled(0.7),
            dt: 0.1,
            max_steps: 1000,
            grid,
            policy: (0..cells).map(|k| if k % 2 == 0 { 0.7 } else { -0.7 }).collect(),
            value,
        }
    }

    #[test]
    fn round_trips_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        let snapshot = sample("Run 0");

        let path = store.save(&snapshot).unwrap();
        assert_eq!(path, dir.path().join("learn_Run 0.json"));
        assert_eq!(store.load("Run 0").unwrap(), snapshot);
    }

    #[test]
    fn save_replaces_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        let mut snapshot = sample("swing");
        store.save(&snapshot).unwrap();
        snapshot.episode = 20;
        store.save(&snapshot).unwrap();

        assert_eq!(store.load("swing").unwrap().episode, 20);
        let files = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(files, 1);
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        match store.load("nope") {
            Err(RLError::MissingSnapshot(path)) => assert!(path.ends_with("learn_nope.json")),
            other => panic!("expected MissingSnapshot, got {other:?}"),
        }
    }

    #[test]
    fn inconsistent_tables_are_rejected() {
        let mut snapshot = sample("broken");
        snapshot.policy.pop();
        assert!(snapshot.validate().is_err());
    }
}
