//! Continuous-time pendulum plant models
//!
//! Every model evaluates the right-hand side of `x' = f(x, u)` for the state
//! `x = (theta, omega)` and returns `[omega, alpha]`. The variants layer
//! different nonlinearities on top of the base equation
//! `alpha = (g / L) sin(theta) + u / (m L^2)`.

use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};

use crate::state::{pendulum_state, PendulumState};
use crate::RLError;

/// Right-hand side of a controlled ODE with a scalar input
pub trait Dynamics: Send + Sync {
    /// Evaluate the state derivative for `state` under `control`.
    ///
    /// `rng` is only consumed by stochastic models.
    fn derivative(&self, state: &PendulumState, control: f64, rng: &mut dyn RngCore) -> PendulumState;

    /// Whether repeated evaluations at the same point may differ
    fn is_stochastic(&self) -> bool {
        false
    }
}

impl<F> Dynamics for F
where
    F: Fn(&PendulumState, f64) -> PendulumState + Send + Sync,
{
    fn derivative(&self, state: &PendulumState, control: f64, _rng: &mut dyn RngCore) -> PendulumState {
        self(state, control)
    }
}

/// Physical constants of the base pendulum
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PendulumParams {
    /// Bob mass
    pub mass: f64,
    /// Gravitational acceleration
    pub gravity: f64,
    /// Rod length
    pub length: f64,
}

impl Default for PendulumParams {
    fn default() -> Self {
        Self {
            mass: 1.0,
            gravity: 1.0,
            length: 1.0,
        }
    }
}

/// The closed family of plant models
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "kebab-case")]
pub enum PlantModel {
    /// Base pendulum equation, no modification
    Simple {
        /// Physical constants
        params: PendulumParams,
    },
    /// Coulomb friction `-friction * sign(omega)`
    DryFriction {
        /// Physical constants
        params: PendulumParams,
        /// Friction torque magnitude
        friction: f64,
    },
    /// Cubic torsional spring `-stiffness * theta^3`
    TorsionalSpring {
        /// Physical constants
        params: PendulumParams,
        /// Spring coefficient
        stiffness: f64,
    },
    /// Gravity switched off while `|theta| < deadband`
    Backlash {
        /// Physical constants
        params: PendulumParams,
        /// Half-width of the gravity-free zone
        deadband: f64,
    },
    /// Restoring push inside `(-band, 0)` and `(0, band)`
    Bumpers {
        /// Physical constants
        params: PendulumParams,
        /// Half-width of the bumper zone
        band: f64,
        /// Push per radian of penetration
        stiffness: f64,
    },
    /// Mass switched to `inner_mass` while `|theta| < deadband`
    VariableMass {
        /// Physical constants
        params: PendulumParams,
        /// Half-width of the heavy zone
        deadband: f64,
        /// Mass inside the zone
        inner_mass: f64,
    },
    /// Additive zero-mean Gaussian disturbance, redrawn on every call
    RandomDisturbance {
        /// Physical constants
        params: PendulumParams,
        /// Standard deviation of the disturbance
        intensity: f64,
    },
    /// Length switched to `outer_length` once `|theta| > threshold`
    VariableLength {
        /// Physical constants
        params: PendulumParams,
        /// Angle beyond which the rod shortens
        threshold: f64,
        /// Length outside the threshold
        outer_length: f64,
    },
    /// Push swing: length follows the control, `L = L0 + length_gain * u`
    Swing {
        /// Physical constants
        params: PendulumParams,
        /// Length change per unit control
        length_gain: f64,
        /// Viscous damping coefficient
        damping: f64,
    },
}

/// `sign` with `sign(0) == 0`
fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

fn gravity_term(p: &PendulumParams, theta: f64) -> f64 {
    p.gravity / p.length * theta.sin()
}

fn input_term(p: &PendulumParams, control: f64) -> f64 {
    control / (p.mass * p.length * p.length)
}

impl Dynamics for PlantModel {
    fn derivative(&self, state: &PendulumState, control: f64, rng: &mut dyn RngCore) -> PendulumState {
        let theta = state[0];
        let omega = state[1];

        let alpha = match *self {
            Self::Simple { params } => gravity_term(&params, theta) + input_term(&params, control),
            Self::DryFriction { params, friction } => {
                gravity_term(&params, theta) - friction * sign(omega) + input_term(&params, control)
            }
            Self::TorsionalSpring { params, stiffness } => {
                gravity_term(&params, theta) - stiffness * theta.powi(3) + input_term(&params, control)
            }
            Self::Backlash { params, deadband } => {
                let params = if theta.abs() < deadband {
                    PendulumParams { gravity: 0.0, ..params }
                } else {
                    params
                };
                gravity_term(&params, theta) + input_term(&params, control)
            }
            Self::Bumpers { params, band, stiffness } => {
                let push = if theta > 0.0 && theta < band {
                    stiffness * (band - theta)
                } else if theta < 0.0 && theta > -band {
                    stiffness * (-band - theta)
                } else {
                    0.0
                };
                gravity_term(&params, theta) + push + input_term(&params, control)
            }
            Self::VariableMass { params, deadband, inner_mass } => {
                let params = if theta.abs() < deadband {
                    PendulumParams { mass: inner_mass, ..params }
                } else {
                    params
                };
                gravity_term(&params, theta) + input_term(&params, control)
            }
            Self::RandomDisturbance { params, intensity } => {
                let noise: f64 = StandardNormal.sample(rng);
                gravity_term(&params, theta) + input_term(&params, control) + intensity * noise
            }
            Self::VariableLength { params, threshold, outer_length } => {
                let params = if theta.abs() > threshold {
                    PendulumParams { length: outer_length, ..params }
                } else {
                    params
                };
                gravity_term(&params, theta) + input_term(&params, control)
            }
            Self::Swing { params, length_gain, damping } => {
                let params = PendulumParams {
                    length: params.length + length_gain * control,
                    ..params
                };
                gravity_term(&params, theta) - damping * omega
            }
        };

        pendulum_state(omega, alpha)
    }

    fn is_stochastic(&self) -> bool {
        matches!(self, Self::RandomDisturbance { .. })
    }
}

/// Training scenario, one per plant variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Task {
    /// Plain pendulum
    SimplePendulum,
    /// Pendulum with dry friction
    DryFriction,
    /// Pendulum with a nonlinear torsional spring
    TorsionalSpring,
    /// Pendulum with backlash around the origin
    Backlash,
    /// Pendulum with bumpers near the origin
    Bumpers,
    /// Pendulum whose mass grows near the origin
    VariableMass,
    /// Pendulum with random disturbances
    RandomDisturbance,
    /// Pendulum that shortens at large angles
    VariableLength,
    /// Push swing driven through its length
    Swing,
}

impl Task {
    /// Every task, in presentation order
    pub const ALL: [Task; 9] = [
        Task::SimplePendulum,
        Task::DryFriction,
        Task::TorsionalSpring,
        Task::Backlash,
        Task::Bumpers,
        Task::VariableMass,
        Task::RandomDisturbance,
        Task::VariableLength,
        Task::Swing,
    ];

    /// Stable key used in configuration files and on the command line
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::SimplePendulum => "simple-pendulum",
            Self::DryFriction => "dry-friction",
            Self::TorsionalSpring => "torsional-spring",
            Self::Backlash => "backlash",
            Self::Bumpers => "bumpers",
            Self::VariableMass => "variable-mass",
            Self::RandomDisturbance => "random-disturbance",
            Self::VariableLength => "variable-length",
            Self::Swing => "swing",
        }
    }

    /// Human readable description
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::SimplePendulum => "Simple pendulum",
            Self::DryFriction => "Pendulum with dry friction",
            Self::TorsionalSpring => "Pendulum with a nonlinear torsional spring",
            Self::Backlash => "Pendulum with backlash",
            Self::Bumpers => "Pendulum with bumpers",
            Self::VariableMass => "Pendulum with variable mass",
            Self::RandomDisturbance => "Pendulum with random disturbances",
            Self::VariableLength => "Pendulum with variable length",
            Self::Swing => "Swing",
        }
    }

    /// Plant model with the task's physical constants
    #[must_use]
    pub fn plant(self) -> PlantModel {
        let params = PendulumParams::default();
        match self {
            Self::SimplePendulum => PlantModel::Simple { params },
            Self::DryFriction => PlantModel::DryFriction { params, friction: 0.05 },
            Self::TorsionalSpring => PlantModel::TorsionalSpring { params, stiffness: 0.1 },
            Self::Backlash => PlantModel::Backlash { params, deadband: 0.7 },
            Self::Bumpers => PlantModel::Bumpers { params, band: 0.7, stiffness: 1.0 },
            Self::VariableMass => PlantModel::VariableMass {
                params,
                deadband: 0.7,
                inner_mass: 10.0,
            },
            Self::RandomDisturbance => PlantModel::RandomDisturbance { params, intensity: 1.0 },
            Self::VariableLength => PlantModel::VariableLength {
                params,
                threshold: 0.7,
                outer_length: 0.5,
            },
            Self::Swing => PlantModel::Swing {
                params,
                length_gain: 0.5,
                damping: 0.005,
            },
        }
    }

    /// Whether this is the push-swing scenario
    #[must_use]
    pub fn is_swing(self) -> bool {
        matches!(self, Self::Swing)
    }

    /// Episode start: hanging at `theta = pi`, the swing gets an initial push
    #[must_use]
    pub fn initial_state(self) -> PendulumState {
        let omega = if self.is_swing() { 1.0 } else { 0.0 };
        pendulum_state(std::f64::consts::PI, omega)
    }
}

impl Default for Task {
    fn default() -> Self {
        Self::SimplePendulum
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Task {
    type Err = RLError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|task| task.key() == s)
            .ok_or_else(|| {
                let keys: Vec<_> = Self::ALL.iter().map(|t| t.key()).collect();
                RLError::config("task", format!("must be one of {}, got `{s}`", keys.join(", ")))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn eval(task: Task, theta: f64, omega: f64, u: f64) -> PendulumState {
        let mut rng = StdRng::seed_from_u64(0);
        task.plant().derivative(&pendulum_state(theta, omega), u, &mut rng)
    }

    #[test]
    fn first_component_is_angular_velocity() {
        for task in Task::ALL {
            let d = eval(task, 0.3, -1.25, 0.5);
            assert_eq!(d[0], -1.25, "{task}");
        }
    }

    #[test]
    fn simple_pendulum_matches_base_equation() {
        let d = eval(Task::SimplePendulum, 0.4, 0.0, 0.5);
        assert_relative_eq!(d[1], 0.4_f64.sin() + 0.5);
    }

    #[test]
    fn dry_friction_has_zero_sign_at_rest() {
        assert_relative_eq!(eval(Task::DryFriction, 0.4, 0.0, 0.0)[1], 0.4_f64.sin());
        assert_relative_eq!(eval(Task::DryFriction, 0.4, 2.0, 0.0)[1], 0.4_f64.sin() - 0.05);
        assert_relative_eq!(eval(Task::DryFriction, 0.4, -2.0, 0.0)[1], 0.4_f64.sin() + 0.05);
    }

    #[test]
    fn torsional_spring_adds_cubic_term() {
        let d = eval(Task::TorsionalSpring, 1.5, 0.0, 0.0);
        assert_relative_eq!(d[1], 1.5_f64.sin() - 0.1 * 1.5_f64.powi(3));
    }

    #[test]
    fn backlash_gates_gravity_inside_deadband() {
        assert_relative_eq!(eval(Task::Backlash, 0.5, 0.0, 0.25)[1], 0.25);
        assert_relative_eq!(eval(Task::Backlash, 0.8, 0.0, 0.25)[1], 0.8_f64.sin() + 0.25);
    }

    #[test]
    fn bumpers_push_back_inside_band_only() {
        assert_relative_eq!(eval(Task::Bumpers, 0.2, 0.0, 0.0)[1], 0.2_f64.sin() + 0.5);
        assert_relative_eq!(eval(Task::Bumpers, -0.2, 0.0, 0.0)[1], (-0.2_f64).sin() - 0.5);
        assert_relative_eq!(eval(Task::Bumpers, 0.0, 0.0, 0.0)[1], 0.0);
        assert_relative_eq!(eval(Task::Bumpers, 1.0, 0.0, 0.0)[1], 1.0_f64.sin());
    }

    #[test]
    fn variable_mass_scales_input_inside_deadband() {
        assert_relative_eq!(eval(Task::VariableMass, 0.1, 0.0, 1.0)[1], 0.1_f64.sin() + 0.1);
        assert_relative_eq!(eval(Task::VariableMass, 1.0, 0.0, 1.0)[1], 1.0_f64.sin() + 1.0);
    }

    #[test]
    fn variable_length_shortens_at_large_angles() {
        // L = 0.5: gravity term doubles, input term quadruples
        assert_relative_eq!(eval(Task::VariableLength, 1.0, 0.0, 1.0)[1], 2.0 * 1.0_f64.sin() + 4.0);
        assert_relative_eq!(eval(Task::VariableLength, -1.0, 0.0, 1.0)[1], 2.0 * (-1.0_f64).sin() + 4.0);
        assert_relative_eq!(eval(Task::VariableLength, 0.5, 0.0, 1.0)[1], 0.5_f64.sin() + 1.0);
    }

    #[test]
    fn swing_length_follows_control() {
        let d = eval(Task::Swing, 0.6, 2.0, 1.0);
        assert_relative_eq!(d[1], 0.6_f64.sin() / 1.5 - 0.005 * 2.0);
    }

    #[test]
    fn random_disturbance_is_stochastic() {
        let plant = Task::RandomDisturbance.plant();
        assert!(plant.is_stochastic());
        assert!(!Task::SimplePendulum.plant().is_stochastic());

        let mut rng = StdRng::seed_from_u64(7);
        let x = pendulum_state(0.3, 0.0);
        let a = plant.derivative(&x, 0.0, &mut rng)[1];
        let b = plant.derivative(&x, 0.0, &mut rng)[1];
        assert_ne!(a, b);
    }

    #[test]
    fn initial_state_depends_on_scenario() {
        assert_eq!(Task::Swing.initial_state(), pendulum_state(std::f64::consts::PI, 1.0));
        assert_eq!(Task::Backlash.initial_state(), pendulum_state(std::f64::consts::PI, 0.0));
    }

    #[test]
    fn task_keys_round_trip() {
        for task in Task::ALL {
            assert_eq!(task.key().parse::<Task>().unwrap(), task);
            let json = serde_json::to_string(&task).unwrap();
            assert_eq!(json, format!("\"{}\"", task.key()));
        }
        assert!(matches!(
            "double-pendulum".parse::<Task>(),
            Err(RLError::Configuration { parameter: "task", .. })
        ));
    }
}
