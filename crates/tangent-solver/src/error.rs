//! Error taxonomy for the strategy engine.
//!
//! Structural problems (unknown/incompatible kinds, failed component
//! construction) are typed errors surfaced before any combination is
//! attempted. Numeric failures of an otherwise well-formed solve are NOT
//! errors: they travel as [`SolveStatus`] values so the batch runner can
//! record them and keep going.

use serde::{Deserialize, Serialize};
use tangent_model::ModelError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StrategyError>;

#[derive(Error, Debug)]
pub enum StrategyError {
    /// Unknown or incompatible component kind in a strategy configuration.
    #[error("{component}: unknown or incompatible kind: {detail}")]
    Configuration {
        component: &'static str,
        detail: String,
    },

    /// A component failed to build during `setup()`.
    #[error("failed to build {component}: {detail}")]
    Setup {
        component: &'static str,
        detail: String,
    },

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl StrategyError {
    pub fn configuration(component: &'static str, detail: impl Into<String>) -> Self {
        Self::Configuration {
            component,
            detail: detail.into(),
        }
    }

    pub fn setup(component: &'static str, detail: impl Into<String>) -> Self {
        Self::Setup {
            component,
            detail: detail.into(),
        }
    }
}

/// Outcome of one numeric solve.
///
/// Stable integer codes: 0 success, positive numeric failure, and a
/// distinguished negative code for structural (configuration/setup) failure
/// as recorded by the batch runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveStatus {
    Success,
    /// The iterative algorithm exhausted its budget without satisfying the
    /// convergence test.
    ConvergenceFailure {
        iterations: usize,
    },
    /// The linear system could not be factored.
    SingularSystem,
    /// Structural failure (configuration or setup), never produced by a
    /// numeric solve itself.
    Fatal,
}

impl SolveStatus {
    pub fn code(self) -> i32 {
        match self {
            SolveStatus::Success => 0,
            SolveStatus::ConvergenceFailure { .. } => 1,
            SolveStatus::SingularSystem => 2,
            SolveStatus::Fatal => -3,
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, SolveStatus::Success)
    }
}

impl std::fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolveStatus::Success => write!(f, "success"),
            SolveStatus::ConvergenceFailure { iterations } => {
                write!(f, "no convergence after {iterations} iterations")
            }
            SolveStatus::SingularSystem => write!(f, "singular system of equations"),
            SolveStatus::Fatal => write!(f, "fatal configuration failure"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_are_stable() {
        assert_eq!(SolveStatus::Success.code(), 0);
        assert_eq!(SolveStatus::ConvergenceFailure { iterations: 10 }.code(), 1);
        assert_eq!(SolveStatus::SingularSystem.code(), 2);
        assert_eq!(SolveStatus::Fatal.code(), -3);
    }

    #[test]
    fn errors_name_the_component() {
        let err = StrategyError::configuration("integrator", "Newmark requires a time step");
        assert!(err.to_string().contains("integrator"));
        assert!(err.to_string().contains("Newmark"));
    }
}
