//! Preallocated per-stage buffers for the DDP recursion.
//!
//! Everything the backward and forward passes write lives here, sized once
//! from the problem's per-stage dimensions and overwritten in place every
//! iteration (allocation-free hot loop). Stage dimensions may vary, so each
//! buffer is a per-stage vector rather than a single matrix.

use nalgebra::{DMatrix, DVector};

use crate::problem::ShootingProblem;

#[derive(Debug, Clone)]
pub struct DdpWorkspace {
    // Value-function expansion, stages 0..=T
    pub vx: Vec<DVector<f64>>,
    pub vxx: Vec<DMatrix<f64>>,

    // Action-value expansion, stages 0..T
    pub qx: Vec<DVector<f64>>,
    pub qu: Vec<DVector<f64>>,
    pub qxx: Vec<DMatrix<f64>>,
    pub qxu: Vec<DMatrix<f64>>,
    pub quu: Vec<DMatrix<f64>>,

    // Gains, stages 0..T
    pub k_fb: Vec<DMatrix<f64>>,
    pub k_ff: Vec<DVector<f64>>,

    // Dynamics defects, stages 0..=T (gaps[0] is the initial-state defect)
    pub gaps: Vec<DVector<f64>>,

    // Line-search trial trajectory and state deviations
    pub xs_try: Vec<DVector<f64>>,
    pub us_try: Vec<DVector<f64>>,
    pub dx: Vec<DVector<f64>>,

    // Backward-pass scratch (gap-corrected gradient, transported Hessians)
    pub vx_corr: Vec<DVector<f64>>,
    pub fxt_vxx: Vec<DMatrix<f64>>,
    pub fut_vxx: Vec<DMatrix<f64>>,
    pub quu_k: Vec<DVector<f64>>,
}

impl DdpWorkspace {
    /// Allocate every buffer from the problem's horizon and per-stage dims.
    pub fn new(problem: &ShootingProblem) -> Self {
        let horizon = problem.horizon();
        let ndx = |t: usize| problem.ndx(t);
        let nu = |t: usize| problem.nu(t);

        Self {
            vx: (0..=horizon).map(|t| DVector::zeros(ndx(t))).collect(),
            vxx: (0..=horizon)
                .map(|t| DMatrix::zeros(ndx(t), ndx(t)))
                .collect(),
            qx: (0..horizon).map(|t| DVector::zeros(ndx(t))).collect(),
            qu: (0..horizon).map(|t| DVector::zeros(nu(t))).collect(),
            qxx: (0..horizon)
                .map(|t| DMatrix::zeros(ndx(t), ndx(t)))
                .collect(),
            qxu: (0..horizon)
                .map(|t| DMatrix::zeros(ndx(t), nu(t)))
                .collect(),
            quu: (0..horizon).map(|t| DMatrix::zeros(nu(t), nu(t))).collect(),
            k_fb: (0..horizon)
                .map(|t| DMatrix::zeros(nu(t), ndx(t)))
                .collect(),
            k_ff: (0..horizon).map(|t| DVector::zeros(nu(t))).collect(),
            gaps: (0..=horizon).map(|t| DVector::zeros(ndx(t))).collect(),
            xs_try: (0..=horizon)
                .map(|t| DVector::zeros(problem.nx(t)))
                .collect(),
            us_try: (0..horizon).map(|t| DVector::zeros(nu(t))).collect(),
            dx: (0..=horizon).map(|t| DVector::zeros(ndx(t))).collect(),
            vx_corr: (0..horizon).map(|t| DVector::zeros(ndx(t + 1))).collect(),
            fxt_vxx: (0..horizon)
                .map(|t| DMatrix::zeros(ndx(t), ndx(t + 1)))
                .collect(),
            fut_vxx: (0..horizon)
                .map(|t| DMatrix::zeros(nu(t), ndx(t + 1)))
                .collect(),
            quu_k: (0..horizon).map(|t| DVector::zeros(nu(t))).collect(),
        }
    }

    /// Zero every dynamics defect (feasible trajectory).
    pub fn clear_gaps(&mut self) {
        for g in &mut self.gaps {
            g.fill(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lq::{LqStageModel, LqTerminalModel};
    use crate::model::StageModel;
    use nalgebra::{dmatrix, dvector};

    #[test]
    fn buffers_match_problem_shapes() {
        let horizon = 5;
        let a = dmatrix![1.0, 0.1; 0.0, 1.0];
        let b = dmatrix![0.005; 0.1];
        let running: Vec<Box<dyn StageModel>> = (0..horizon)
            .map(|_| {
                Box::new(LqStageModel::new(
                    a.clone(),
                    b.clone(),
                    dmatrix![1.0, 0.0; 0.0, 1.0],
                    dmatrix![0.1],
                )) as Box<dyn StageModel>
            })
            .collect();
        let terminal = Box::new(LqTerminalModel::new(dmatrix![1.0, 0.0; 0.0, 1.0]));
        let problem = ShootingProblem::new(dvector![0.0, 0.0], running, terminal).unwrap();

        let ws = DdpWorkspace::new(&problem);
        assert_eq!(ws.vx.len(), horizon + 1);
        assert_eq!(ws.xs_try.len(), horizon + 1);
        assert_eq!(ws.us_try.len(), horizon);
        assert_eq!(ws.k_fb[0].shape(), (1, 2));
        assert_eq!(ws.quu[0].shape(), (1, 1));
        assert_eq!(ws.vxx[horizon].shape(), (2, 2));
        assert_eq!(ws.gaps[horizon].len(), 2);
    }

    #[test]
    fn clear_gaps_zeroes_every_stage() {
        let a = dmatrix![1.0];
        let running: Vec<Box<dyn StageModel>> = vec![Box::new(LqStageModel::new(
            a.clone(),
            dmatrix![1.0],
            a.clone(),
            dmatrix![1.0],
        ))];
        let problem =
            ShootingProblem::new(dvector![0.0], running, Box::new(LqTerminalModel::new(a)))
                .unwrap();
        let mut ws = DdpWorkspace::new(&problem);
        ws.gaps[1][0] = 3.0;
        ws.clear_gaps();
        assert!(ws.gaps.iter().all(|g| g.iter().all(|&v| v == 0.0)));
    }
}
