//! Error types for the DDP solver.

use thiserror::Error;

/// Errors that can occur while building a problem or running a solve.
#[derive(Error, Debug)]
pub enum SolverError {
    /// Problem construction failed (inconsistent stage dimensions, empty horizon)
    #[error("Invalid problem: {0}")]
    InvalidProblem(String),

    /// Solver settings are inconsistent
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// A supplied trajectory does not match the problem horizon/dimensions
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// A non-finite cost or state was produced during evaluation
    #[error("Non-finite {0}")]
    NonFinite(String),

    /// The control-control block stayed indefinite at the regularization cap
    #[error("Regularization saturated at {level:.3e}: Quu not positive definite at stage {stage}")]
    RegularizationSaturated { level: f64, stage: usize },
}

/// Result type for solver operations.
pub type SolverResult<T> = Result<T, SolverError>;
