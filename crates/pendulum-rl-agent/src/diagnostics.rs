//! Per-episode convergence bookkeeping

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::utils::relative_delta;

/// Summary of one finished training episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeStats {
    /// Episode number (1-based)
    pub episode: usize,
    /// Transitions taken
    pub steps: usize,
    /// Whether the goal region was reached before the step budget ran out
    pub reached_goal: bool,
    /// Sum of transition rewards
    pub total_reward: f64,
    /// Euclidean norm of `V`
    pub v_norm: f64,
    /// Frobenius norm of `Q`
    pub q_norm: f64,
    /// Relative change of `v_norm` since the previous episode
    pub v_delta: Option<f64>,
    /// Relative change of `q_norm` since the previous episode
    pub q_delta: Option<f64>,
    /// Exploration rate at the end of the episode
    pub epsilon: f64,
    /// Smallest and largest Q entry
    pub q_range: (f64, f64),
    /// Smallest and largest V entry
    pub v_range: (f64, f64),
    /// Wall time since the run started
    pub elapsed: Duration,
}

/// Tracks successive table norms to report their relative change
#[derive(Debug, Clone, Default)]
pub struct ConvergenceTracker {
    last_v_norm: Option<f64>,
    last_q_norm: Option<f64>,
}

impl ConvergenceTracker {
    /// Tracker with no history
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the newest norms, returning `(v_delta, q_delta)`
    pub fn record(&mut self, v_norm: f64, q_norm: f64) -> (Option<f64>, Option<f64>) {
        let v_delta = self.last_v_norm.and_then(|old| relative_delta(v_norm, old));
        let q_delta = self.last_q_norm.and_then(|old| relative_delta(q_norm, old));
        self.last_v_norm = Some(v_norm);
        self.last_q_norm = Some(q_norm);
        (v_delta, q_delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_episode_has_no_delta() {
        let mut tracker = ConvergenceTracker::new();
        assert_eq!(tracker.record(2.0, 4.0), (None, None));
        assert_eq!(tracker.record(4.0, 4.0), (Some(0.5), Some(0.0)));
        assert_eq!(tracker.record(0.0, 8.0), (None, Some(0.5)));
    }

    #[test]
    fn stats_serialize_for_event_sinks() {
        let stats = EpisodeStats {
            episode: 4,
            steps: 120,
            reached_goal: true,
            total_reward: -12.5,
            v_norm: 1.0,
            q_norm: 2.0,
            v_delta: None,
            q_delta: Some(0.25),
            epsilon: 0.4,
            q_range: (-3.0, 0.0),
            v_range: (-1.0, 0.0),
            elapsed: Duration::from_millis(1500),
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["episode"], 4);
        assert_eq!(json["v_delta"], serde_json::Value::Null);
        let back: EpisodeStats = serde_json::from_value(json).unwrap();
        assert_eq!(back, stats);
    }
}

