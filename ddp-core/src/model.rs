//! Stage and terminal model interfaces.
//!
//! A model evaluates one stage of the control problem: `calc` produces the
//! stage cost and next state, `calc_diff` the first/second derivatives of
//! cost and dynamics. Results land in a preallocated data struct created
//! once per stage and overwritten in place, so the solver's hot loop never
//! allocates.
//!
//! `calc_diff` may assume `calc` was evaluated at the same `(x, u)`.

use nalgebra::{DMatrix, DVector};

use crate::state::StateSpace;

/// Evaluation buffers for one running stage.
#[derive(Debug, Clone)]
pub struct StageData {
    /// Stage cost at the evaluated point
    pub cost: f64,
    /// Next state produced by the dynamics (length `next nx`)
    pub xnext: DVector<f64>,
    /// Cost gradient w.r.t. the state tangent (length `ndx`)
    pub lx: DVector<f64>,
    /// Cost gradient w.r.t. the control (length `nu`)
    pub lu: DVector<f64>,
    /// Cost Hessian w.r.t. the state (`ndx × ndx`)
    pub lxx: DMatrix<f64>,
    /// Cost cross Hessian (`ndx × nu`)
    pub lxu: DMatrix<f64>,
    /// Cost Hessian w.r.t. the control (`nu × nu`)
    pub luu: DMatrix<f64>,
    /// Dynamics Jacobian w.r.t. the state (`next ndx × ndx`)
    pub fx: DMatrix<f64>,
    /// Dynamics Jacobian w.r.t. the control (`next ndx × nu`)
    pub fu: DMatrix<f64>,
}

impl StageData {
    /// Allocate buffers sized for `model`.
    pub fn new(model: &dyn StageModel) -> Self {
        let ndx = model.state().ndx();
        let nu = model.nu();
        let nx_next = model.next_state().nx();
        let ndx_next = model.next_state().ndx();
        Self {
            cost: 0.0,
            xnext: DVector::zeros(nx_next),
            lx: DVector::zeros(ndx),
            lu: DVector::zeros(nu),
            lxx: DMatrix::zeros(ndx, ndx),
            lxu: DMatrix::zeros(ndx, nu),
            luu: DMatrix::zeros(nu, nu),
            fx: DMatrix::zeros(ndx_next, ndx),
            fu: DMatrix::zeros(ndx_next, nu),
        }
    }
}

/// Evaluation buffers for the terminal stage.
#[derive(Debug, Clone)]
pub struct TerminalData {
    /// Terminal cost at the evaluated point
    pub cost: f64,
    /// Cost gradient w.r.t. the state tangent (length `ndx`)
    pub lx: DVector<f64>,
    /// Cost Hessian w.r.t. the state (`ndx × ndx`)
    pub lxx: DMatrix<f64>,
}

impl TerminalData {
    /// Allocate buffers sized for `model`.
    pub fn new(model: &dyn TerminalModel) -> Self {
        let ndx = model.state().ndx();
        Self {
            cost: 0.0,
            lx: DVector::zeros(ndx),
            lxx: DMatrix::zeros(ndx, ndx),
        }
    }
}

/// One running stage: cost, dynamics, and their derivatives.
pub trait StageModel {
    /// State space of this stage's state.
    fn state(&self) -> &dyn StateSpace;

    /// State space the dynamics map into. Defaults to this stage's own space;
    /// override when dimensions change across the stage boundary.
    fn next_state(&self) -> &dyn StateSpace {
        self.state()
    }

    /// Control dimension.
    fn nu(&self) -> usize;

    /// Evaluate stage cost and next state into `data.cost` / `data.xnext`.
    fn calc(&self, data: &mut StageData, x: &DVector<f64>, u: &DVector<f64>);

    /// Evaluate cost and dynamics derivatives into `data`.
    fn calc_diff(&self, data: &mut StageData, x: &DVector<f64>, u: &DVector<f64>);
}

/// The terminal stage: cost and its state derivatives only.
pub trait TerminalModel {
    /// State space of the terminal state.
    fn state(&self) -> &dyn StateSpace;

    /// Evaluate the terminal cost into `data.cost`.
    fn calc(&self, data: &mut TerminalData, x: &DVector<f64>);

    /// Evaluate the terminal cost derivatives into `data`.
    fn calc_diff(&self, data: &mut TerminalData, x: &DVector<f64>);
}
