//! Fixed-step explicit Runge-Kutta integration

use rand::RngCore;

use crate::grid::normalize_angle;
use crate::plant::Dynamics;
use crate::state::PendulumState;

/// Advance `state` by one classical RK4 step of length `dt`, holding
/// `control` constant over the step.
pub fn rk4_step<D>(dynamics: &D, dt: f64, state: &PendulumState, control: f64, rng: &mut dyn RngCore) -> PendulumState
where
    D: Dynamics + ?Sized,
{
    let k1 = dynamics.derivative(state, control, rng);
    let k2 = dynamics.derivative(&(state + k1 * (dt / 2.0)), control, rng);
    let k3 = dynamics.derivative(&(state + k2 * (dt / 2.0)), control, rng);
    let k4 = dynamics.derivative(&(state + k3 * dt), control, rng);
    state + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (dt / 6.0)
}

/// RK4 step followed by wrapping the angle into `[-pi, pi)`
pub fn advance<D>(dynamics: &D, dt: f64, state: &PendulumState, control: f64, rng: &mut dyn RngCore) -> PendulumState
where
    D: Dynamics + ?Sized,
{
    let mut next = rk4_step(dynamics, dt, state, control, rng);
    next[0] = normalize_angle(next[0]);
    next
}
