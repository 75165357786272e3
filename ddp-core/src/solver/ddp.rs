//! Differential Dynamic Programming solver.
//!
//! One outer iteration runs:
//!
//! 1. `calc_diff` along the current trajectory, refreshing derivatives and
//!    dynamics gaps;
//! 2. a backward pass from the terminal stage, building the value-function
//!    and action-value expansions and the feedback/feedforward gains, with
//!    the damping level raised and the pass restarted whenever the
//!    control-control block fails its Cholesky factorization;
//! 3. a forward line search over a descending step-length schedule,
//!    accepting the first trial whose actual/expected improvement ratio
//!    falls inside the configured band;
//! 4. a regularization update driven by the line-search outcome.
//!
//! Both passes are strictly sequential in the stage index: each backward
//! stage needs the next stage's value expansion, each forward stage the
//! previous stage's deviation. Warm starts that violate the dynamics are
//! handled through per-stage gap terms that contract with the step length.

use std::time::Instant;

use nalgebra::{Cholesky, DMatrix, DVector};

use crate::error::{SolverError, SolverResult};
use crate::problem::ShootingProblem;
use crate::regularization::{RegularizationPolicy, RegularizationState};
use crate::settings::SolverSettings;
use crate::solver::{SolveInfo, Solver};
use crate::workspace::DdpWorkspace;

/// Stage at which the regularized control-control block was indefinite.
struct NotPositiveDefinite(usize);

/// DDP solver bound to one shooting problem.
///
/// Owns every per-stage buffer; nothing is shared between instances, and a
/// single instance's `solve` is not reentrant.
pub struct DdpSolver {
    problem: ShootingProblem,
    settings: SolverSettings,
    reg_policy: RegularizationPolicy,
    reg: RegularizationState,
    ws: DdpWorkspace,

    xs: Vec<DVector<f64>>,
    us: Vec<DVector<f64>>,
    cost: f64,
    cost_try: f64,

    // expected-improvement pair from the last backward pass
    d1: f64,
    d2: f64,

    is_feasible: bool,
    steplength: f64,
    info: SolveInfo,
}

impl DdpSolver {
    /// Bind a solver to `problem`, allocating all per-stage buffers.
    pub fn new(problem: ShootingProblem, settings: SolverSettings) -> SolverResult<Self> {
        settings.validate()?;
        let ws = DdpWorkspace::new(&problem);
        let xs = (0..=problem.horizon())
            .map(|t| DVector::zeros(problem.nx(t)))
            .collect();
        let us = (0..problem.horizon())
            .map(|t| DVector::zeros(problem.nu(t)))
            .collect();
        let reg_policy = RegularizationPolicy {
            min: settings.reg_min,
            max: settings.reg_max,
            factor: settings.reg_factor,
        };
        let reg = reg_policy.init_state(settings.reg_min);
        Ok(Self {
            problem,
            settings,
            reg_policy,
            reg,
            ws,
            xs,
            us,
            cost: f64::INFINITY,
            cost_try: f64::INFINITY,
            d1: 0.0,
            d2: 0.0,
            is_feasible: false,
            steplength: 0.0,
            info: SolveInfo::default(),
        })
    }

    /// Install a candidate trajectory. Missing controls default to zero,
    /// missing states to a rollout from `x0` under the candidate controls.
    /// Dimensions are checked before anything is overwritten.
    pub fn set_candidate(
        &mut self,
        init_xs: Option<&[DVector<f64>]>,
        init_us: Option<&[DVector<f64>]>,
        is_feasible: bool,
    ) -> SolverResult<()> {
        if let Some(us) = init_us {
            self.problem.validate_controls(us)?;
        }
        if let Some(xs) = init_xs {
            self.problem.validate_states(xs)?;
        }
        match init_us {
            Some(us) => {
                for (dst, src) in self.us.iter_mut().zip(us) {
                    dst.copy_from(src);
                }
            }
            None => {
                for u in &mut self.us {
                    u.fill(0.0);
                }
            }
        }
        match init_xs {
            Some(xs) => {
                for (dst, src) in self.xs.iter_mut().zip(xs) {
                    dst.copy_from(src);
                }
            }
            None => {
                self.problem.rollout(&self.us, &mut self.xs)?;
            }
        }
        self.is_feasible = is_feasible;
        Ok(())
    }

    /// Recompute the per-stage dynamics defects of the current trajectory.
    ///
    /// `gaps[0] = xs[0] ⊖ x0` and `gaps[t+1] = xs[t+1] ⊖ f(xs[t], us[t])`:
    /// the stored trajectory minus where the dynamics actually lead. Zero
    /// for a feasible trajectory. Assumes `calc_diff` just ran, so the stage
    /// data holds the current rollout results.
    fn update_gaps(&mut self) {
        if self.is_feasible {
            self.ws.clear_gaps();
            return;
        }
        let ws = &mut self.ws;
        let problem = &self.problem;
        problem
            .stage_model(0)
            .state()
            .diff(problem.x0(), &self.xs[0], &mut ws.gaps[0]);
        for t in 0..problem.horizon() {
            problem.stage_model(t).next_state().diff(
                &problem.data(t).xnext,
                &self.xs[t + 1],
                &mut ws.gaps[t + 1],
            );
        }
    }

    /// Backward recursion from the terminal stage.
    ///
    /// Fails (without touching later retries) as soon as one stage's
    /// regularized control-control block is not positive definite; the
    /// caller raises the damping level and restarts the whole pass.
    fn backward_pass(&mut self) -> Result<(), NotPositiveDefinite> {
        let horizon = self.problem.horizon();
        let ws = &mut self.ws;
        let problem = &self.problem;

        let tdata = problem.terminal_data();
        ws.vx[horizon].copy_from(&tdata.lx);
        ws.vxx[horizon].copy_from(&tdata.lxx);

        let mut d1 = 0.0;
        let mut d2 = 0.0;

        for t in (0..horizon).rev() {
            let d = problem.data(t);
            let nu = d.lu.len();

            // next-stage gradient, corrected by the dynamics defect
            ws.vx_corr[t].copy_from(&ws.vx[t + 1]);
            if !self.is_feasible {
                ws.vx_corr[t].gemv(-1.0, &ws.vxx[t + 1], &ws.gaps[t + 1], 1.0);
            }

            // value Hessian transported through the dynamics Jacobians
            ws.fxt_vxx[t].gemm_tr(1.0, &d.fx, &ws.vxx[t + 1], 0.0);
            ws.fut_vxx[t].gemm_tr(1.0, &d.fu, &ws.vxx[t + 1], 0.0);

            ws.qx[t].copy_from(&d.lx);
            ws.qx[t].gemv_tr(1.0, &d.fx, &ws.vx_corr[t], 1.0);
            ws.qu[t].copy_from(&d.lu);
            ws.qu[t].gemv_tr(1.0, &d.fu, &ws.vx_corr[t], 1.0);
            ws.qxx[t].copy_from(&d.lxx);
            ws.qxx[t].gemm(1.0, &ws.fxt_vxx[t], &d.fx, 1.0);
            ws.qxu[t].copy_from(&d.lxu);
            ws.qxu[t].gemm(1.0, &ws.fxt_vxx[t], &d.fu, 1.0);
            ws.quu[t].copy_from(&d.luu);
            ws.quu[t].gemm(1.0, &ws.fut_vxx[t], &d.fu, 1.0);

            for i in 0..nu {
                ws.quu[t][(i, i)] += self.reg.level;
            }

            let Some(chol) = Cholesky::new(ws.quu[t].clone_owned()) else {
                return Err(NotPositiveDefinite(t));
            };

            ws.k_ff[t].copy_from(&ws.qu[t]);
            chol.solve_mut(&mut ws.k_ff[t]);
            ws.k_fb[t].tr_copy_from(&ws.qxu[t]);
            chol.solve_mut(&mut ws.k_fb[t]);

            // closed-form value update after eliminating the control
            ws.vx[t].copy_from(&ws.qx[t]);
            ws.vx[t].gemv_tr(-1.0, &ws.k_fb[t], &ws.qu[t], 1.0);
            ws.vxx[t].copy_from(&ws.qxx[t]);
            ws.vxx[t].gemm(-1.0, &ws.qxu[t], &ws.k_fb[t], 1.0);
            symmetrize(&mut ws.vxx[t]);

            ws.quu_k[t].gemv(1.0, &ws.quu[t], &ws.k_ff[t], 0.0);
            d1 += ws.qu[t].dot(&ws.k_ff[t]);
            d2 -= ws.k_ff[t].dot(&ws.quu_k[t]);
        }

        self.d1 = d1;
        self.d2 = d2;
        Ok(())
    }

    /// Roll out one trial trajectory at step length `alpha`.
    ///
    /// The feedforward term is scaled by `alpha`; the feedback term acts on
    /// the realized deviation. For infeasible trajectories the deviation
    /// carries `(1 − alpha)` of each stored gap, so gaps contract in
    /// proportion to the step. A non-finite trial cost or state aborts the
    /// attempt (the caller falls through to the next, shorter step).
    fn forward_pass(&mut self, alpha: f64) -> SolverResult<()> {
        let horizon = self.problem.horizon();
        {
            let ws = &mut self.ws;
            if self.is_feasible {
                ws.dx[0].fill(0.0);
                ws.xs_try[0].copy_from(&self.xs[0]);
            } else {
                ws.dx[0].copy_from(&ws.gaps[0]);
                ws.dx[0].neg_mut();
                self.problem.stage_model(0).state().integrate(
                    &self.xs[0],
                    &ws.dx[0],
                    &mut ws.xs_try[0],
                );
            }
        }

        let mut cost_try = 0.0;
        for t in 0..horizon {
            {
                let ws = &mut self.ws;
                ws.us_try[t].copy_from(&self.us[t]);
                ws.us_try[t].axpy(-alpha, &ws.k_ff[t], 1.0);
                ws.us_try[t].gemv(-1.0, &ws.k_fb[t], &ws.dx[t], 1.0);
            }
            {
                let d = self
                    .problem
                    .run_stage(t, &self.ws.xs_try[t], &self.ws.us_try[t]);
                cost_try += d.cost;
                self.ws.xs_try[t + 1].copy_from(&d.xnext);
            }
            if !cost_try.is_finite() || self.ws.xs_try[t + 1].iter().any(|v| !v.is_finite()) {
                return Err(SolverError::NonFinite(format!(
                    "trial state at stage {}",
                    t + 1
                )));
            }
            let next_state = self.problem.stage_model(t).next_state();
            let ws = &mut self.ws;
            next_state.diff(&self.xs[t + 1], &ws.xs_try[t + 1], &mut ws.dx[t + 1]);
            if !self.is_feasible {
                ws.dx[t + 1].axpy(1.0 - alpha, &ws.gaps[t + 1], 1.0);
            }
        }

        cost_try += self.problem.run_terminal(&self.ws.xs_try[horizon]).cost;
        if !cost_try.is_finite() {
            return Err(SolverError::NonFinite("trial cost".to_string()));
        }
        self.cost_try = cost_try;
        Ok(())
    }

    /// Adopt the trial trajectory as current and mark it feasible (it is a
    /// pure rollout).
    fn accept_trial(&mut self) {
        for t in 0..self.problem.horizon() {
            self.xs[t].copy_from(&self.ws.xs_try[t]);
            self.us[t].copy_from(&self.ws.us_try[t]);
        }
        let horizon = self.problem.horizon();
        self.xs[horizon].copy_from(&self.ws.xs_try[horizon]);
        self.cost = self.cost_try;
        self.is_feasible = true;
    }

    // -- read-only accessors -------------------------------------------------

    pub fn problem(&self) -> &ShootingProblem {
        &self.problem
    }

    pub fn problem_mut(&mut self) -> &mut ShootingProblem {
        &mut self.problem
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    /// Current (accepted) state trajectory, `horizon + 1` entries.
    pub fn xs(&self) -> &[DVector<f64>] {
        &self.xs
    }

    /// Current (accepted) control trajectory, `horizon` entries.
    pub fn us(&self) -> &[DVector<f64>] {
        &self.us
    }

    /// Cost of the current trajectory.
    pub fn cost(&self) -> f64 {
        self.cost
    }

    /// Trial trajectory of the last `try_step` attempt.
    pub fn xs_try(&self) -> &[DVector<f64>] {
        &self.ws.xs_try
    }

    pub fn us_try(&self) -> &[DVector<f64>] {
        &self.ws.us_try
    }

    pub fn cost_try(&self) -> f64 {
        self.cost_try
    }

    /// Step length accepted in the last iteration (0 when none was).
    pub fn steplength(&self) -> f64 {
        self.steplength
    }

    pub fn is_feasible(&self) -> bool {
        self.is_feasible
    }

    /// Current regularization level.
    pub fn regularization(&self) -> f64 {
        self.reg.level
    }

    /// Summary of the last `solve` call.
    pub fn info(&self) -> &SolveInfo {
        &self.info
    }

    /// Per-stage dynamics defects (see `update_gaps` for the convention).
    pub fn gaps(&self) -> &[DVector<f64>] {
        &self.ws.gaps
    }

    /// Per-stage feedback gain matrices K.
    pub fn feedback_gains(&self) -> &[DMatrix<f64>] {
        &self.ws.k_fb
    }

    /// Per-stage feedforward terms k.
    pub fn feedforward_terms(&self) -> &[DVector<f64>] {
        &self.ws.k_ff
    }

    /// Value-function gradients, stages 0..=horizon.
    pub fn vx(&self) -> &[DVector<f64>] {
        &self.ws.vx
    }

    /// Value-function Hessians, stages 0..=horizon.
    pub fn vxx(&self) -> &[DMatrix<f64>] {
        &self.ws.vxx
    }

    pub fn qx(&self) -> &[DVector<f64>] {
        &self.ws.qx
    }

    pub fn qu(&self) -> &[DVector<f64>] {
        &self.ws.qu
    }

    pub fn qxx(&self) -> &[DMatrix<f64>] {
        &self.ws.qxx
    }

    pub fn qxu(&self) -> &[DMatrix<f64>] {
        &self.ws.qxu
    }

    /// Regularized control-control blocks from the last backward pass.
    pub fn quu(&self) -> &[DMatrix<f64>] {
        &self.ws.quu
    }
}

impl Solver for DdpSolver {
    fn solve(
        &mut self,
        init_xs: Option<&[DVector<f64>]>,
        init_us: Option<&[DVector<f64>]>,
        max_iter: usize,
        is_feasible: bool,
        reg_init: f64,
    ) -> SolverResult<bool> {
        let start = Instant::now();
        self.set_candidate(init_xs, init_us, is_feasible)?;
        self.reg = self.reg_policy.init_state(reg_init);
        self.info = SolveInfo::default();
        let mut converged = false;

        for iter in 0..max_iter {
            match self.compute_direction() {
                Ok(()) => {}
                Err(SolverError::RegularizationSaturated { .. }) => {
                    self.info.iters = iter;
                    break;
                }
                Err(e) => return Err(e),
            }
            self.info.iters = iter + 1;

            let stop = self.stopping_criteria();
            if self.is_feasible && stop < self.settings.tol_stop {
                converged = true;
                break;
            }

            let (d1, d2) = (self.d1, self.d2);
            let mut accepted = false;
            self.steplength = 0.0;
            for i in 0..self.settings.alphas.len() {
                let alpha = self.settings.alphas[i];
                let dv = match self.try_step(alpha) {
                    Ok(dv) => dv,
                    Err(SolverError::NonFinite(_)) => {
                        self.info.steps_rejected += 1;
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                let dv_exp = alpha * (d1 + 0.5 * alpha * d2);
                let accept = if dv_exp.abs() < self.settings.th_grad {
                    // near-converged plateau: the quadratic model predicts
                    // nothing, accept if stationarity is already met
                    stop < self.settings.tol_stop
                } else if dv_exp > 0.0 {
                    let ratio = dv / dv_exp;
                    ratio >= self.settings.accept_ratio_min
                        && ratio <= self.settings.accept_ratio_max
                } else {
                    false
                };
                if accept {
                    self.accept_trial();
                    self.steplength = alpha;
                    self.info.steps_accepted += 1;
                    accepted = true;
                    break;
                }
                self.info.steps_rejected += 1;
            }

            if accepted {
                self.reg_policy.decrease(&mut self.reg);
            } else {
                // exhausted the schedule: tighten the trust region and retry
                // from the same trajectory next iteration
                self.reg_policy.increase(&mut self.reg);
            }

            if self.settings.verbose {
                eprintln!(
                    "iter {:>4}  cost {:.8e}  stop {:.3e}  reg {:.3e}  alpha {:.4}  feasible {}",
                    iter, self.cost, stop, self.reg.level, self.steplength, self.is_feasible,
                );
            }
        }

        self.info.converged = converged;
        self.info.cost = self.cost;
        self.info.stop = self.stopping_criteria();
        self.info.reg = self.reg.level;
        self.info.solve_time_ms = start.elapsed().as_millis() as u64;
        Ok(converged)
    }

    fn compute_direction(&mut self) -> SolverResult<()> {
        let cost = self.problem.calc_diff(&self.xs, &self.us)?;
        if !cost.is_finite() {
            return Err(SolverError::NonFinite(
                "current trajectory cost".to_string(),
            ));
        }
        self.cost = cost;
        self.update_gaps();
        loop {
            match self.backward_pass() {
                Ok(()) => return Ok(()),
                Err(NotPositiveDefinite(stage)) => {
                    if self.reg_policy.saturated(&self.reg) {
                        return Err(SolverError::RegularizationSaturated {
                            level: self.reg.level,
                            stage,
                        });
                    }
                    self.reg_policy.increase(&mut self.reg);
                }
            }
        }
    }

    fn try_step(&mut self, step_length: f64) -> SolverResult<f64> {
        self.forward_pass(step_length)?;
        Ok(self.cost - self.cost_try)
    }

    fn stopping_criteria(&self) -> f64 {
        let mut stop = 0.0;
        for t in 0..self.problem.horizon() {
            stop += self.ws.k_ff[t].dot(&self.ws.qu[t]).abs();
        }
        stop
    }

    fn expected_improvement(&self) -> (f64, f64) {
        (self.d1, self.d2)
    }
}

fn symmetrize(m: &mut DMatrix<f64>) {
    let n = m.nrows();
    for i in 0..n {
        for j in (i + 1)..n {
            let avg = 0.5 * (m[(i, j)] + m[(j, i)]);
            m[(i, j)] = avg;
            m[(j, i)] = avg;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lq::{LqStageModel, LqTerminalModel};
    use crate::model::StageModel;
    use nalgebra::{dmatrix, dvector};

    fn scalar_problem(r: f64) -> ShootingProblem {
        let running: Vec<Box<dyn StageModel>> = vec![Box::new(LqStageModel::new(
            dmatrix![1.0],
            dmatrix![0.1],
            dmatrix![1.0],
            dmatrix![r],
        ))];
        ShootingProblem::new(
            dvector![1.0],
            running,
            Box::new(LqTerminalModel::new(dmatrix![1.0])),
        )
        .unwrap()
    }

    #[test]
    fn one_stage_problem_converges() {
        let mut solver = DdpSolver::new(scalar_problem(0.1), SolverSettings::default()).unwrap();
        let converged = solver.solve(None, None, 10, true, 1e-9).unwrap();
        assert!(converged);
        assert!(solver.info().iters <= 3);
        assert!(solver.cost().is_finite());
    }

    #[test]
    fn indefinite_quu_raises_regularization() {
        // negative control cost: Quu < 0 until the damping exceeds it
        let mut solver = DdpSolver::new(scalar_problem(-1.0), SolverSettings::default()).unwrap();
        solver.set_candidate(None, None, true).unwrap();
        solver.compute_direction().unwrap();
        assert!(solver.regularization() >= 0.99);
    }

    #[test]
    fn saturated_regularization_is_nonconvergence() {
        let settings = SolverSettings {
            reg_max: 1e-2,
            ..Default::default()
        };
        let mut solver = DdpSolver::new(scalar_problem(-1.0), settings).unwrap();
        let converged = solver.solve(None, None, 10, true, 1e-9).unwrap();
        assert!(!converged);
    }

    #[test]
    fn symmetrize_averages_off_diagonal() {
        let mut m = dmatrix![1.0, 2.0; 4.0, 3.0];
        symmetrize(&mut m);
        assert_eq!(m, dmatrix![1.0, 3.0; 3.0, 3.0]);
    }
}
