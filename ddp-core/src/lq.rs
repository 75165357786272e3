//! Linear-quadratic reference models.
//!
//! Affine dynamics `x⁺ = A x + B u + c` with quadratic tracking cost
//! `½ (x − xref)ᵀ Q (x − xref) + ½ uᵀ R u`. On these models the backward
//! pass is exact, which makes them the canonical fixture for validating the
//! solver against the closed-form Riccati recursion. They are also a small
//! worked example of the [`StageModel`] / [`TerminalModel`] contract.

use nalgebra::{DMatrix, DVector};

use crate::model::{StageData, StageModel, TerminalData, TerminalModel};
use crate::state::{EuclideanSpace, StateSpace};

/// Running stage with affine dynamics and quadratic cost.
#[derive(Debug, Clone)]
pub struct LqStageModel {
    state: EuclideanSpace,
    nu: usize,
    /// State transition matrix (`nx × nx`)
    pub a: DMatrix<f64>,
    /// Control matrix (`nx × nu`)
    pub b: DMatrix<f64>,
    /// Affine drift (length `nx`)
    pub c: DVector<f64>,
    /// State cost Hessian (`nx × nx`, symmetric PSD)
    pub q: DMatrix<f64>,
    /// Control cost Hessian (`nu × nu`, symmetric PD)
    pub r: DMatrix<f64>,
    /// State tracking target (length `nx`)
    pub xref: DVector<f64>,
}

impl LqStageModel {
    /// Regulator stage (zero drift, zero target).
    pub fn new(a: DMatrix<f64>, b: DMatrix<f64>, q: DMatrix<f64>, r: DMatrix<f64>) -> Self {
        let nx = a.nrows();
        let nu = b.ncols();
        assert_eq!(a.ncols(), nx, "A must be square");
        assert_eq!(b.nrows(), nx, "B row count must match A");
        assert_eq!(q.shape(), (nx, nx), "Q must be nx x nx");
        assert_eq!(r.shape(), (nu, nu), "R must be nu x nu");
        Self {
            state: EuclideanSpace::new(nx),
            nu,
            a,
            b,
            c: DVector::zeros(nx),
            q,
            r,
            xref: DVector::zeros(nx),
        }
    }

    /// Same stage, tracking `xref` instead of the origin.
    pub fn with_target(mut self, xref: DVector<f64>) -> Self {
        assert_eq!(xref.len(), self.state.nx(), "xref must be length nx");
        self.xref = xref;
        self
    }

    /// Same stage with an affine drift term.
    pub fn with_drift(mut self, c: DVector<f64>) -> Self {
        assert_eq!(c.len(), self.state.nx(), "drift must be length nx");
        self.c = c;
        self
    }
}

impl StageModel for LqStageModel {
    fn state(&self) -> &dyn StateSpace {
        &self.state
    }

    fn nu(&self) -> usize {
        self.nu
    }

    fn calc(&self, data: &mut StageData, x: &DVector<f64>, u: &DVector<f64>) {
        // xnext = A x + B u + c
        data.xnext.copy_from(&self.c);
        data.xnext.gemv(1.0, &self.a, x, 1.0);
        data.xnext.gemv(1.0, &self.b, u, 1.0);

        let residual = x - &self.xref;
        data.cost = 0.5 * residual.dot(&(&self.q * &residual)) + 0.5 * u.dot(&(&self.r * u));
    }

    fn calc_diff(&self, data: &mut StageData, x: &DVector<f64>, u: &DVector<f64>) {
        let residual = x - &self.xref;
        data.lx.gemv(1.0, &self.q, &residual, 0.0);
        data.lu.gemv(1.0, &self.r, u, 0.0);
        data.lxx.copy_from(&self.q);
        data.lxu.fill(0.0);
        data.luu.copy_from(&self.r);
        data.fx.copy_from(&self.a);
        data.fu.copy_from(&self.b);
    }
}

/// Terminal stage with quadratic tracking cost.
#[derive(Debug, Clone)]
pub struct LqTerminalModel {
    state: EuclideanSpace,
    /// Terminal cost Hessian (`nx × nx`, symmetric PSD)
    pub q: DMatrix<f64>,
    /// State tracking target (length `nx`)
    pub xref: DVector<f64>,
}

impl LqTerminalModel {
    pub fn new(q: DMatrix<f64>) -> Self {
        let nx = q.nrows();
        assert_eq!(q.ncols(), nx, "Q must be square");
        Self {
            state: EuclideanSpace::new(nx),
            q,
            xref: DVector::zeros(nx),
        }
    }

    pub fn with_target(mut self, xref: DVector<f64>) -> Self {
        assert_eq!(xref.len(), self.state.nx(), "xref must be length nx");
        self.xref = xref;
        self
    }
}

impl TerminalModel for LqTerminalModel {
    fn state(&self) -> &dyn StateSpace {
        &self.state
    }

    fn calc(&self, data: &mut TerminalData, x: &DVector<f64>) {
        let residual = x - &self.xref;
        data.cost = 0.5 * residual.dot(&(&self.q * &residual));
    }

    fn calc_diff(&self, data: &mut TerminalData, x: &DVector<f64>) {
        let residual = x - &self.xref;
        data.lx.gemv(1.0, &self.q, &residual, 0.0);
        data.lxx.copy_from(&self.q);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{dmatrix, dvector};

    fn double_integrator(dt: f64) -> LqStageModel {
        let a = dmatrix![1.0, dt; 0.0, 1.0];
        let b = dmatrix![0.5 * dt * dt; dt];
        let q = dmatrix![1.0, 0.0; 0.0, 0.1];
        let r = dmatrix![0.01];
        LqStageModel::new(a, b, q, r)
    }

    #[test]
    fn gradients_match_finite_differences() {
        let model = double_integrator(0.1);
        let mut data = StageData::new(&model);
        let x = dvector![0.7, -0.3];
        let u = dvector![0.4];

        model.calc(&mut data, &x, &u);
        let base = data.cost;
        model.calc_diff(&mut data, &x, &u);
        let lx = data.lx.clone_owned();
        let lu = data.lu.clone_owned();

        let eps = 1e-6;
        for i in 0..2 {
            let mut xp = x.clone_owned();
            xp[i] += eps;
            model.calc(&mut data, &xp, &u);
            assert_relative_eq!((data.cost - base) / eps, lx[i], epsilon = 1e-4);
        }
        let mut up = u.clone_owned();
        up[0] += eps;
        model.calc(&mut data, &x, &up);
        assert_relative_eq!((data.cost - base) / eps, lu[0], epsilon = 1e-4);
    }

    #[test]
    fn dynamics_are_affine_in_drift() {
        let model = double_integrator(0.1).with_drift(dvector![0.0, 0.2]);
        let mut data = StageData::new(&model);
        model.calc(&mut data, &dvector![0.0, 0.0], &dvector![0.0]);
        assert_eq!(data.xnext, dvector![0.0, 0.2]);
    }

    #[test]
    fn terminal_cost_vanishes_at_target() {
        let target = dvector![1.0, 0.0];
        let model = LqTerminalModel::new(dmatrix![10.0, 0.0; 0.0, 10.0]).with_target(target.clone());
        let mut data = TerminalData::new(&model);
        model.calc(&mut data, &target);
        assert_relative_eq!(data.cost, 0.0, epsilon = 1e-14);
        model.calc_diff(&mut data, &target);
        assert_relative_eq!(data.lx.norm(), 0.0, epsilon = 1e-14);
    }
}
