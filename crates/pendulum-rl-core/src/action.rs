//! Discrete actions and the control sets they index into

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::RLError;

/// Index of a control level in the active control set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DiscreteAction(pub usize);

impl DiscreteAction {
    /// The wrapped index
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Discrete action space
#[derive(Debug, Clone, Copy)]
pub struct DiscreteSpace {
    /// Number of discrete actions
    pub n: usize,
}

impl DiscreteSpace {
    /// Create a new discrete action space
    #[must_use]
    pub fn new(n: usize) -> Self {
        Self { n }
    }

    /// Draw an action uniformly at random
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> DiscreteAction {
        DiscreteAction(rng.gen_range(0..self.n))
    }

    /// Check if an action is valid within this space
    #[must_use]
    pub fn contains(&self, action: DiscreteAction) -> bool {
        action.0 < self.n
    }
}

/// Named families of normalized control levels in `[-1, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControlSet {
    /// `{-1, 1}`
    BangBang,
    /// `{0, -1, 1}`
    BangZeroBang,
    /// `{-1, -0.5, 0, 0.5, 1}`
    Discrete5,
    /// 21 evenly spaced levels from -1 to 1
    Discrete21,
}

impl ControlSet {
    /// Every control set, in presentation order
    pub const ALL: [ControlSet; 4] = [
        ControlSet::BangBang,
        ControlSet::BangZeroBang,
        ControlSet::Discrete5,
        ControlSet::Discrete21,
    ];

    /// Stable key used in configuration files and on the command line
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::BangBang => "bang-bang",
            Self::BangZeroBang => "bang-zero-bang",
            Self::Discrete5 => "discrete-5",
            Self::Discrete21 => "discrete-21",
        }
    }

    /// Normalized levels; their order fixes the action indices
    #[must_use]
    pub fn levels(self) -> Vec<f64> {
        match self {
            Self::BangBang => vec![-1.0, 1.0],
            Self::BangZeroBang => vec![0.0, -1.0, 1.0],
            Self::Discrete5 => vec![-1.0, -0.5, 0.0, 0.5, 1.0],
            Self::Discrete21 => linspace(-1.0, 1.0, 21),
        }
    }

    /// Physical control values for a given maximum magnitude
    #[must_use]
    pub fn scaled(self, u_max: f64) -> Vec<f64> {
        self.levels().into_iter().map(|level| level * u_max).collect()
    }

    /// Number of actions in the set
    #[must_use]
    pub fn len(self) -> usize {
        match self {
            Self::BangBang => 2,
            Self::BangZeroBang => 3,
            Self::Discrete5 => 5,
            Self::Discrete21 => 21,
        }
    }

    /// Control sets are never empty
    #[must_use]
    pub fn is_empty(self) -> bool {
        false
    }

    /// Action space over this set
    #[must_use]
    pub fn space(self) -> DiscreteSpace {
        DiscreteSpace::new(self.len())
    }
}

impl Default for ControlSet {
    fn default() -> Self {
        Self::BangBang
    }
}

impl fmt::Display for ControlSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ControlSet {
    type Err = RLError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|set| set.key() == s)
            .ok_or_else(|| {
                let keys: Vec<_> = Self::ALL.iter().map(|c| c.key()).collect();
                RLError::config("control_set", format!("must be one of {}, got `{s}`", keys.join(", ")))
            })
    }
}

/// `n` evenly spaced samples over `[start, stop]`, endpoints included
#[allow(clippy::cast_precision_loss)]
fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![start];
    }
    let step = (stop - start) / (n - 1) as f64;
    let mut values: Vec<f64> = (0..n).map(|i| start + i as f64 * step).collect();
    values[n - 1] = stop;
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn level_order_is_preserved() {
        assert_eq!(ControlSet::BangZeroBang.levels(), vec![0.0, -1.0, 1.0]);
        assert_eq!(ControlSet::BangBang.scaled(2.5), vec![-2.5, 2.5]);
    }

    #[test]
    fn discrete_21_spans_unit_interval() {
        let levels = ControlSet::Discrete21.levels();
        assert_eq!(levels.len(), 21);
        assert_eq!(levels[0], -1.0);
        assert_eq!(levels[20], 1.0);
        assert_relative_eq!(levels[10], 0.0, epsilon = 1e-15);
        assert_relative_eq!(levels[11] - levels[10], 0.1, epsilon = 1e-12);
    }

    #[test]
    fn len_matches_levels() {
        for set in ControlSet::ALL {
            assert_eq!(set.len(), set.levels().len());
            assert_eq!(set.key().parse::<ControlSet>().unwrap(), set);
        }
    }

    #[test]
    fn sampled_actions_stay_in_space() {
        let space = ControlSet::Discrete5.space();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            assert!(space.contains(space.sample(&mut rng)));
        }
        assert!(!space.contains(DiscreteAction(5)));
    }
}
