//! Differential Dynamic Programming for finite-horizon optimal control.
//!
//! This library solves discrete-time trajectory optimization problems —
//! minimize a sum of per-stage costs subject to (possibly nonlinear)
//! dynamics — with a regularized backward Riccati-like recursion and a
//! forward line search. It is meant as the inner solve of trajectory
//! optimizers and receding-horizon (MPC) controllers.
//!
//! # Algorithm
//!
//! - **Backward pass**: per-stage quadratic models of the cost-to-go,
//!   feedback/feedforward gains from a Cholesky factorization of the
//!   damped control-control block, with an adaptive regularization retry
//!   on factorization failure.
//! - **Forward pass**: trial rollouts over a descending step-length
//!   schedule, accepted when the actual/expected improvement ratio falls
//!   inside a configured band.
//! - **Infeasible warm starts**: trajectories that violate the dynamics
//!   are handled through per-stage gap terms that contract with the step
//!   length.
//!
//! # Example
//!
//! ```
//! use ddp_core::{DdpSolver, LqStageModel, LqTerminalModel, ShootingProblem,
//!                Solver, SolverSettings, StageModel};
//! use nalgebra::{dmatrix, dvector};
//!
//! // double integrator, quadratic cost
//! let dt = 0.1;
//! let a = dmatrix![1.0, dt; 0.0, 1.0];
//! let b = dmatrix![0.5 * dt * dt; dt];
//! let q = dmatrix![1.0, 0.0; 0.0, 0.1];
//! let r = dmatrix![0.01];
//! let running: Vec<Box<dyn StageModel>> = (0..20)
//!     .map(|_| Box::new(LqStageModel::new(a.clone(), b.clone(), q.clone(), r.clone()))
//!         as Box<dyn StageModel>)
//!     .collect();
//! let terminal = Box::new(LqTerminalModel::new(dmatrix![10.0, 0.0; 0.0, 10.0]));
//! let problem = ShootingProblem::new(dvector![1.0, 0.0], running, terminal).unwrap();
//!
//! let mut solver = DdpSolver::new(problem, SolverSettings::default()).unwrap();
//! let converged = solver.solve(None, None, 20, true, 1e-9).unwrap();
//! assert!(converged);
//! ```

#![warn(clippy::all)]

pub mod error;
pub mod lq;
pub mod model;
pub mod problem;
pub mod regularization;
pub mod settings;
pub mod solver;
pub mod state;
pub mod workspace;

pub use error::{SolverError, SolverResult};
pub use lq::{LqStageModel, LqTerminalModel};
pub use model::{StageData, StageModel, TerminalData, TerminalModel};
pub use problem::ShootingProblem;
pub use regularization::{RegularizationPolicy, RegularizationState};
pub use settings::SolverSettings;
pub use solver::{DdpSolver, SolveInfo, Solver};
pub use state::{EuclideanSpace, StateSpace};
pub use workspace::DdpWorkspace;

/// Convenience entry point: bind a solver to `problem` and run it from the
/// default candidate (zero controls, rollout states).
pub fn solve(
    problem: ShootingProblem,
    settings: SolverSettings,
    max_iter: usize,
) -> SolverResult<DdpSolver> {
    let mut solver = DdpSolver::new(problem, settings)?;
    let reg_init = solver.settings().reg_min;
    solver.solve(None, None, max_iter, true, reg_init)?;
    Ok(solver)
}
