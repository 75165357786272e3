//! Solver interface and diagnostics.

use nalgebra::DVector;

use crate::error::SolverResult;

pub mod ddp;

pub use ddp::DdpSolver;

/// Capability set shared by trajectory-optimization solvers.
///
/// `solve` drives the full loop; the remaining operations are the
/// primitives a manual driver needs for partial iterations (one backward
/// pass, one step attempt) in receding-horizon use.
pub trait Solver {
    /// Run the outer loop until the stationarity tolerance or the iteration
    /// budget is reached. Returns whether the tolerance was reached; the
    /// best trajectory and cost are left on the solver either way.
    fn solve(
        &mut self,
        init_xs: Option<&[DVector<f64>]>,
        init_us: Option<&[DVector<f64>]>,
        max_iter: usize,
        is_feasible: bool,
        reg_init: f64,
    ) -> SolverResult<bool>;

    /// Evaluate derivatives along the current trajectory and run one
    /// backward pass, including the internal regularization retry.
    fn compute_direction(&mut self) -> SolverResult<()>;

    /// Run one line-search attempt at `step_length` and return the actual
    /// cost improvement of the trial trajectory (current − trial).
    fn try_step(&mut self, step_length: f64) -> SolverResult<f64>;

    /// Stationarity measure from the latest backward pass. Pure read.
    fn stopping_criteria(&self) -> f64;

    /// Expected-improvement pair `(d1, d2)`: predicted cost reduction at
    /// step length `α` is `α·d1 + ½α²·d2`. Pure read.
    fn expected_improvement(&self) -> (f64, f64);
}

/// Summary of the last `solve` call.
#[derive(Debug, Clone, Default)]
pub struct SolveInfo {
    /// Outer iterations completed
    pub iters: usize,

    /// Whether the stationarity tolerance was reached
    pub converged: bool,

    /// Final trajectory cost
    pub cost: f64,

    /// Final stationarity measure
    pub stop: f64,

    /// Final regularization level
    pub reg: f64,

    /// Accepted line-search steps
    pub steps_accepted: usize,

    /// Rejected line-search attempts (including non-finite trials)
    pub steps_rejected: usize,

    /// Total solve time (milliseconds)
    pub solve_time_ms: u64,
}
