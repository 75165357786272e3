//! Shooting-problem container and validation.
//!
//! A [`ShootingProblem`] holds the initial state, `T` running stage models,
//! one terminal model, and the evaluation buffers for all of them. It is the
//! solver's only window onto dynamics and costs; everything the solver needs
//! is reached through `calc` / `calc_diff` / `rollout` and the per-stage
//! data accessors.
//!
//! # Dimensions
//!
//! - horizon `T`: number of running stages
//! - `xs`: `T + 1` states, `xs[t]` of length `nx(t)`
//! - `us`: `T` controls, `us[t]` of length `nu(t)`
//!
//! Per-stage dimensions may differ; consecutive stages must chain
//! (`next_state` of stage `t` equals the state space of stage `t + 1`).

use nalgebra::DVector;

use crate::error::{SolverError, SolverResult};
use crate::model::{StageData, StageModel, TerminalData, TerminalModel};

/// A finite-horizon optimal control problem in shooting form.
pub struct ShootingProblem {
    x0: DVector<f64>,
    running: Vec<Box<dyn StageModel>>,
    terminal: Box<dyn TerminalModel>,
    datas: Vec<StageData>,
    terminal_data: TerminalData,
}

impl std::fmt::Debug for ShootingProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShootingProblem")
            .field("x0", &self.x0)
            .field("running_stages", &self.running.len())
            .field("datas", &self.datas.len())
            .field("terminal_data", &self.terminal_data)
            .finish()
    }
}

impl ShootingProblem {
    /// Build a problem and validate stage chaining.
    pub fn new(
        x0: DVector<f64>,
        running: Vec<Box<dyn StageModel>>,
        terminal: Box<dyn TerminalModel>,
    ) -> SolverResult<Self> {
        if running.is_empty() {
            return Err(SolverError::InvalidProblem(
                "horizon must have at least one running stage".to_string(),
            ));
        }
        if x0.len() != running[0].state().nx() {
            return Err(SolverError::InvalidProblem(format!(
                "x0 has length {}, stage 0 expects {}",
                x0.len(),
                running[0].state().nx()
            )));
        }
        for t in 0..running.len() - 1 {
            let next = running[t].next_state();
            let following = running[t + 1].state();
            if next.nx() != following.nx() || next.ndx() != following.ndx() {
                return Err(SolverError::InvalidProblem(format!(
                    "stage {} maps into ({}, {}) but stage {} expects ({}, {})",
                    t,
                    next.nx(),
                    next.ndx(),
                    t + 1,
                    following.nx(),
                    following.ndx()
                )));
            }
        }
        let last = running[running.len() - 1].next_state();
        if last.nx() != terminal.state().nx() || last.ndx() != terminal.state().ndx() {
            return Err(SolverError::InvalidProblem(format!(
                "last stage maps into ({}, {}) but the terminal model expects ({}, {})",
                last.nx(),
                last.ndx(),
                terminal.state().nx(),
                terminal.state().ndx()
            )));
        }

        let datas = running.iter().map(|m| StageData::new(m.as_ref())).collect();
        let terminal_data = TerminalData::new(terminal.as_ref());
        Ok(Self {
            x0,
            running,
            terminal,
            datas,
            terminal_data,
        })
    }

    /// Number of running stages.
    pub fn horizon(&self) -> usize {
        self.running.len()
    }

    /// Initial state of the problem.
    pub fn x0(&self) -> &DVector<f64> {
        &self.x0
    }

    /// Replace the initial state (receding-horizon use). The dimension is fixed.
    pub fn set_x0(&mut self, x0: DVector<f64>) -> SolverResult<()> {
        if x0.len() != self.x0.len() {
            return Err(SolverError::DimensionMismatch(format!(
                "x0 has length {}, expected {}",
                x0.len(),
                self.x0.len()
            )));
        }
        self.x0 = x0;
        Ok(())
    }

    /// Stage model at index `t`.
    pub fn stage_model(&self, t: usize) -> &dyn StageModel {
        self.running[t].as_ref()
    }

    /// Terminal model.
    pub fn terminal_model(&self) -> &dyn TerminalModel {
        self.terminal.as_ref()
    }

    /// Evaluation buffers of stage `t` (latest `calc`/`calc_diff` results).
    pub fn data(&self, t: usize) -> &StageData {
        &self.datas[t]
    }

    /// Evaluation buffers of the terminal stage.
    pub fn terminal_data(&self) -> &TerminalData {
        &self.terminal_data
    }

    /// State representation dimension at stage `t` (`t == horizon` is terminal).
    pub fn nx(&self, t: usize) -> usize {
        if t < self.running.len() {
            self.running[t].state().nx()
        } else {
            self.terminal.state().nx()
        }
    }

    /// State tangent dimension at stage `t` (`t == horizon` is terminal).
    pub fn ndx(&self, t: usize) -> usize {
        if t < self.running.len() {
            self.running[t].state().ndx()
        } else {
            self.terminal.state().ndx()
        }
    }

    /// Control dimension at stage `t`.
    pub fn nu(&self, t: usize) -> usize {
        self.running[t].nu()
    }

    /// Check a state sequence against the horizon and per-stage dimensions.
    pub fn validate_states(&self, xs: &[DVector<f64>]) -> SolverResult<()> {
        let horizon = self.horizon();
        if xs.len() != horizon + 1 {
            return Err(SolverError::DimensionMismatch(format!(
                "state sequence has length {}, expected {}",
                xs.len(),
                horizon + 1
            )));
        }
        for (t, x) in xs.iter().enumerate() {
            if x.len() != self.nx(t) {
                return Err(SolverError::DimensionMismatch(format!(
                    "state {} has length {}, expected {}",
                    t,
                    x.len(),
                    self.nx(t)
                )));
            }
        }
        Ok(())
    }

    /// Check a control sequence against the horizon and per-stage dimensions.
    pub fn validate_controls(&self, us: &[DVector<f64>]) -> SolverResult<()> {
        let horizon = self.horizon();
        if us.len() != horizon {
            return Err(SolverError::DimensionMismatch(format!(
                "control sequence has length {}, expected {}",
                us.len(),
                horizon
            )));
        }
        for (t, u) in us.iter().enumerate() {
            if u.len() != self.nu(t) {
                return Err(SolverError::DimensionMismatch(format!(
                    "control {} has length {}, expected {}",
                    t,
                    u.len(),
                    self.nu(t)
                )));
            }
        }
        Ok(())
    }

    /// Evaluate stage `t` at `(x, u)` and return its refreshed data.
    pub fn run_stage(&mut self, t: usize, x: &DVector<f64>, u: &DVector<f64>) -> &StageData {
        let model = &self.running[t];
        model.calc(&mut self.datas[t], x, u);
        &self.datas[t]
    }

    /// Evaluate the terminal model at `x` and return its refreshed data.
    pub fn run_terminal(&mut self, x: &DVector<f64>) -> &TerminalData {
        self.terminal.calc(&mut self.terminal_data, x);
        &self.terminal_data
    }

    /// Total cost of a candidate trajectory.
    pub fn calc(&mut self, xs: &[DVector<f64>], us: &[DVector<f64>]) -> SolverResult<f64> {
        self.validate_states(xs)?;
        self.validate_controls(us)?;
        let mut cost = 0.0;
        for t in 0..self.horizon() {
            let model = &self.running[t];
            model.calc(&mut self.datas[t], &xs[t], &us[t]);
            cost += self.datas[t].cost;
        }
        let h = self.horizon();
        self.terminal.calc(&mut self.terminal_data, &xs[h]);
        cost += self.terminal_data.cost;
        Ok(cost)
    }

    /// Total cost plus all stage/terminal derivatives, left in the data buffers.
    pub fn calc_diff(&mut self, xs: &[DVector<f64>], us: &[DVector<f64>]) -> SolverResult<f64> {
        self.validate_states(xs)?;
        self.validate_controls(us)?;
        let mut cost = 0.0;
        for t in 0..self.horizon() {
            let model = &self.running[t];
            model.calc(&mut self.datas[t], &xs[t], &us[t]);
            model.calc_diff(&mut self.datas[t], &xs[t], &us[t]);
            cost += self.datas[t].cost;
        }
        let xterm = &xs[self.horizon()];
        self.terminal.calc(&mut self.terminal_data, xterm);
        self.terminal.calc_diff(&mut self.terminal_data, xterm);
        cost += self.terminal_data.cost;
        Ok(cost)
    }

    /// Simulate forward from `x0` under `us`, writing states into `xs`.
    /// Returns the total cost of the rolled-out trajectory.
    pub fn rollout(&mut self, us: &[DVector<f64>], xs: &mut [DVector<f64>]) -> SolverResult<f64> {
        self.validate_controls(us)?;
        if xs.len() != self.horizon() + 1 {
            return Err(SolverError::DimensionMismatch(format!(
                "state buffer has length {}, expected {}",
                xs.len(),
                self.horizon() + 1
            )));
        }
        xs[0].copy_from(&self.x0);
        let mut cost = 0.0;
        for t in 0..self.horizon() {
            let model = &self.running[t];
            // split_at_mut keeps the borrow checker happy about xs[t] vs xs[t+1]
            let (head, tail) = xs.split_at_mut(t + 1);
            model.calc(&mut self.datas[t], &head[t], &us[t]);
            cost += self.datas[t].cost;
            tail[0].copy_from(&self.datas[t].xnext);
        }
        let h = self.horizon();
        self.terminal.calc(&mut self.terminal_data, &xs[h]);
        cost += self.terminal_data.cost;
        Ok(cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lq::{LqStageModel, LqTerminalModel};
    use nalgebra::{dmatrix, dvector};

    fn small_problem(horizon: usize) -> ShootingProblem {
        let a = dmatrix![1.0, 0.1; 0.0, 1.0];
        let b = dmatrix![0.005; 0.1];
        let q = dmatrix![1.0, 0.0; 0.0, 0.1];
        let r = dmatrix![0.01];
        let running: Vec<Box<dyn StageModel>> = (0..horizon)
            .map(|_| {
                Box::new(LqStageModel::new(a.clone(), b.clone(), q.clone(), r.clone()))
                    as Box<dyn StageModel>
            })
            .collect();
        let terminal = Box::new(LqTerminalModel::new(dmatrix![10.0, 0.0; 0.0, 10.0]));
        ShootingProblem::new(dvector![1.0, 0.0], running, terminal).unwrap()
    }

    #[test]
    fn rejects_empty_horizon() {
        let terminal = Box::new(LqTerminalModel::new(dmatrix![1.0]));
        let err = ShootingProblem::new(dvector![0.0], Vec::new(), terminal).unwrap_err();
        assert!(matches!(err, SolverError::InvalidProblem(_)));
    }

    #[test]
    fn rejects_mismatched_x0() {
        let a = dmatrix![1.0];
        let b = dmatrix![1.0];
        let running: Vec<Box<dyn StageModel>> = vec![Box::new(LqStageModel::new(
            a.clone(),
            b,
            a.clone(),
            dmatrix![1.0],
        ))];
        let terminal = Box::new(LqTerminalModel::new(a));
        let err = ShootingProblem::new(dvector![0.0, 0.0], running, terminal).unwrap_err();
        assert!(matches!(err, SolverError::InvalidProblem(_)));
    }

    #[test]
    fn rollout_matches_dynamics() {
        let mut prob = small_problem(3);
        let us = vec![dvector![1.0], dvector![0.0], dvector![-1.0]];
        let mut xs: Vec<_> = (0..4).map(|t| DVector::zeros(prob.nx(t))).collect();
        let cost = prob.rollout(&us, &mut xs).unwrap();
        assert!(cost.is_finite());
        assert_eq!(xs[0], dvector![1.0, 0.0]);
        // x1 = A x0 + B u0
        assert_eq!(xs[1], dvector![1.005, 0.1]);
    }

    #[test]
    fn calc_rejects_short_sequences() {
        let mut prob = small_problem(3);
        let xs = vec![dvector![0.0, 0.0]; 3];
        let us = vec![dvector![0.0]; 3];
        let err = prob.calc(&xs, &us).unwrap_err();
        assert!(matches!(err, SolverError::DimensionMismatch(_)));
    }

    #[test]
    fn calc_and_calc_diff_agree_on_cost() {
        let mut prob = small_problem(4);
        let us = vec![dvector![0.3]; 4];
        let mut xs: Vec<_> = (0..5).map(|t| DVector::zeros(prob.nx(t))).collect();
        prob.rollout(&us, &mut xs).unwrap();
        let c0 = prob.calc(&xs, &us).unwrap();
        let c1 = prob.calc_diff(&xs, &us).unwrap();
        assert_eq!(c0, c1);
    }
}
