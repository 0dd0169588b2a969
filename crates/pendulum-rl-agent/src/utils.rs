//! Schedules and small helpers for the learner

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Trait for schedules (e.g., for epsilon decay)
pub trait Schedule: Send + Sync {
    /// Get value at step t
    fn value(&self, t: u64) -> f64;
}

/// Exponential decay schedule
#[derive(Debug, Clone)]
pub struct ExponentialSchedule {
    /// Starting value
    pub start: f64,
    /// Minimum value
    pub min_value: f64,
    /// Decay rate per step
    pub decay_rate: f64,
}

impl ExponentialSchedule {
    /// Create a new exponential schedule
    #[must_use]
    pub fn new(start: f64, min_value: f64, decay_rate: f64) -> Self {
        Self {
            start,
            min_value,
            decay_rate,
        }
    }
}

impl Schedule for ExponentialSchedule {
    #[allow(clippy::cast_precision_loss)]
    fn value(&self, t: u64) -> f64 {
        let value = self.start * self.decay_rate.powf(t as f64);
        value.max(self.min_value)
    }
}

/// Cooperative cancellation flag shared between a run and its controller
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    /// Fresh, unraised signal
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the run to stop at its next checkpoint
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop has been requested
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Relative change `(new - old) / new`, undefined when `new` is zero
#[must_use]
pub fn relative_delta(new: f64, old: f64) -> Option<f64> {
    if new == 0.0 {
        None
    } else {
        Some((new - old) / new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn exponential_decay_per_step() {
        let schedule = ExponentialSchedule::new(0.5, 0.0, 0.9);
        assert_relative_eq!(schedule.value(0), 0.5);
        assert_relative_eq!(schedule.value(2), 0.5 * 0.81, epsilon = 1e-12);
        assert_eq!(ExponentialSchedule::new(0.5, 0.0, 1.0).value(10_000), 0.5);
        assert_eq!(ExponentialSchedule::new(1.0, 0.2, 0.5).value(10), 0.2);
    }

    #[test]
    fn stop_signal_is_shared_between_clones() {
        let signal = StopSignal::new();
        let handle = signal.clone();
        assert!(!signal.is_stop_requested());
        handle.request_stop();
        assert!(signal.is_stop_requested());
    }

    #[test]
    fn relative_delta_undefined_at_zero() {
        assert_eq!(relative_delta(0.0, 3.0), None);
        assert_eq!(relative_delta(2.0, 1.0), Some(0.5));
        assert_eq!(relative_delta(-2.0, -1.0), Some(0.5));
    }
}
