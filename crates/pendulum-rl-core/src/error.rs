//! Error types for the pendulum RL core library

use std::path::PathBuf;

use thiserror::Error;

/// Core error type for training and replay operations
#[derive(Error, Debug)]
pub enum RLError {
    /// A training or simulation parameter is outside its valid range
    #[error("Configuration error: `{parameter}` {reason}")]
    Configuration {
        /// Name of the offending parameter
        parameter: &'static str,
        /// Human readable description of the valid range
        reason: String,
    },

    /// Replay was requested against a snapshot that does not exist
    #[error("Policy snapshot not found: {}", .0.display())]
    MissingSnapshot(PathBuf),

    /// LQR synthesis failed for the current linearization
    #[error("Controllability error: {0}")]
    Controllability(#[from] ControllabilityError),

    /// Invalid action
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Size the operation needed
        expected: usize,
        /// Size it was given
        actual: usize,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl RLError {
    /// Shorthand for a configuration error
    pub fn config(parameter: &'static str, reason: impl Into<String>) -> Self {
        Self::Configuration {
            parameter,
            reason: reason.into(),
        }
    }
}

/// Reasons the Riccati-based feedback gain could not be computed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControllabilityError {
    /// The controllability matrix is rank deficient
    #[error("linearization is uncontrollable (rank {rank} < {dimension})")]
    Uncontrollable {
        /// Numerical rank found
        rank: usize,
        /// State dimension required
        dimension: usize,
    },

    /// The control weighting matrix is not positive definite
    #[error("control weight R is not positive definite")]
    SingularControlWeight,

    /// The Hamiltonian has eigenvalues on the imaginary axis
    #[error("Hamiltonian matrix is singular during sign iteration")]
    SingularHamiltonian,

    /// The sign iteration did not settle
    #[error("Riccati iteration did not converge after {iterations} iterations")]
    NotConverged {
        /// Iterations spent
        iterations: usize,
    },

    /// The solution contains NaN or infinite entries
    #[error("Riccati solution is not finite")]
    NonFinite,

    /// The solution does not satisfy the Riccati equation
    #[error("Riccati residual too large: {residual:.3e}")]
    ResidualTooLarge {
        /// Relative Frobenius residual
        residual: f64,
    },
}

/// Result type alias for RL operations
pub type Result<T> = std::result::Result<T, RLError>;
