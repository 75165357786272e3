//! Shared control-problem definitions for regression and benchmarking.

use ddp_core::{
    EuclideanSpace, LqStageModel, LqTerminalModel, ShootingProblem, StageData, StageModel,
    StateSpace, TerminalData, TerminalModel,
};
use nalgebra::{dmatrix, dvector, DMatrix, DVector};

/// Test problem definition.
pub struct TestProblem {
    pub name: &'static str,
    pub problem_class: &'static str,
    pub builder: fn() -> ShootingProblem,
    pub max_iter: usize,
    pub tol_stop: f64,
    pub expected_iterations: Option<usize>,
    pub expected_to_fail: bool,
    pub source: &'static str,
}

// ============================================================================
// Linear-quadratic problems
// ============================================================================

fn build_lq_double_integrator() -> ShootingProblem {
    let dt = 0.1;
    let a = dmatrix![1.0, dt; 0.0, 1.0];
    let b = dmatrix![0.5 * dt * dt; dt];
    let q = dmatrix![1.0, 0.0; 0.0, 0.1];
    let r = dmatrix![0.01];
    let running: Vec<Box<dyn StageModel>> = (0..20)
        .map(|_| {
            Box::new(LqStageModel::new(a.clone(), b.clone(), q.clone(), r.clone()))
                as Box<dyn StageModel>
        })
        .collect();
    let terminal = Box::new(LqTerminalModel::new(dmatrix![10.0, 0.0; 0.0, 10.0]));
    ShootingProblem::new(dvector![1.0, 0.0], running, terminal).expect("valid problem")
}

fn build_lq_tracking() -> ShootingProblem {
    // track a ramp reference with a per-stage target
    let dt = 0.05;
    let a = dmatrix![1.0, dt; 0.0, 1.0];
    let b = dmatrix![0.5 * dt * dt; dt];
    let q = dmatrix![5.0, 0.0; 0.0, 0.1];
    let r = dmatrix![0.1];
    let running: Vec<Box<dyn StageModel>> = (0..50)
        .map(|t| {
            let xref = dvector![0.02 * t as f64, 0.0];
            Box::new(
                LqStageModel::new(a.clone(), b.clone(), q.clone(), r.clone()).with_target(xref),
            ) as Box<dyn StageModel>
        })
        .collect();
    let terminal =
        Box::new(LqTerminalModel::new(dmatrix![50.0, 0.0; 0.0, 5.0]).with_target(dvector![1.0, 0.0]));
    ShootingProblem::new(dvector![0.0, 0.0], running, terminal).expect("valid problem")
}

/// Random near-stable LQ problem from a seeded LCG.
fn build_lq_random() -> ShootingProblem {
    let nx = 4;
    let nu = 2;
    let horizon = 30;
    let mut rng_state: u64 = 0x5eed_cafe;
    let mut rand = || -> f64 {
        rng_state = rng_state.wrapping_mul(6364136223846793005).wrapping_add(1);
        ((rng_state >> 33) as f64) / (u32::MAX as f64)
    };

    // A = I + small random perturbation keeps the dynamics near-stable
    let mut a = DMatrix::identity(nx, nx);
    for i in 0..nx {
        for j in 0..nx {
            a[(i, j)] += 0.1 * (2.0 * rand() - 1.0);
        }
    }
    let mut b = DMatrix::zeros(nx, nu);
    for i in 0..nx {
        for j in 0..nu {
            b[(i, j)] = 2.0 * rand() - 1.0;
        }
    }
    // diagonal, positive cost weights
    let q = DMatrix::from_diagonal(&DVector::from_fn(nx, |_, _| rand() + 0.1));
    let r = DMatrix::from_diagonal(&DVector::from_fn(nu, |_, _| rand() + 0.1));
    let qf = DMatrix::from_diagonal(&DVector::from_fn(nx, |_, _| 10.0 * (rand() + 0.1)));
    let x0 = DVector::from_fn(nx, |_, _| 2.0 * rand() - 1.0);

    let running: Vec<Box<dyn StageModel>> = (0..horizon)
        .map(|_| {
            Box::new(LqStageModel::new(a.clone(), b.clone(), q.clone(), r.clone()))
                as Box<dyn StageModel>
        })
        .collect();
    ShootingProblem::new(x0, running, Box::new(LqTerminalModel::new(qf))).expect("valid problem")
}

// ============================================================================
// Pendulum swing-up (nonlinear)
// ============================================================================

struct PendulumStage {
    state: EuclideanSpace,
    dt: f64,
    target: f64,
}

impl StageModel for PendulumStage {
    fn state(&self) -> &dyn StateSpace {
        &self.state
    }

    fn nu(&self) -> usize {
        1
    }

    fn calc(&self, data: &mut StageData, x: &DVector<f64>, u: &DVector<f64>) {
        let (th, om) = (x[0], x[1]);
        data.xnext[0] = th + self.dt * om;
        data.xnext[1] = om + self.dt * (-9.81 * th.sin() + u[0]);
        let e = th - self.target;
        data.cost = 0.5 * (0.1 * e * e + 0.01 * om * om + 0.001 * u[0] * u[0]);
    }

    fn calc_diff(&self, data: &mut StageData, x: &DVector<f64>, u: &DVector<f64>) {
        let (th, om) = (x[0], x[1]);
        data.lx[0] = 0.1 * (th - self.target);
        data.lx[1] = 0.01 * om;
        data.lu[0] = 0.001 * u[0];
        data.lxx[(0, 0)] = 0.1;
        data.lxx[(1, 1)] = 0.01;
        data.luu[(0, 0)] = 0.001;
        data.fx[(0, 0)] = 1.0;
        data.fx[(0, 1)] = self.dt;
        data.fx[(1, 0)] = -self.dt * 9.81 * th.cos();
        data.fx[(1, 1)] = 1.0;
        data.fu[(1, 0)] = self.dt;
    }
}

struct PendulumTerminal {
    state: EuclideanSpace,
    target: f64,
}

impl TerminalModel for PendulumTerminal {
    fn state(&self) -> &dyn StateSpace {
        &self.state
    }

    fn calc(&self, data: &mut TerminalData, x: &DVector<f64>) {
        let e = x[0] - self.target;
        data.cost = 0.5 * (10.0 * e * e + x[1] * x[1]);
    }

    fn calc_diff(&self, data: &mut TerminalData, x: &DVector<f64>) {
        data.lx[0] = 10.0 * (x[0] - self.target);
        data.lx[1] = x[1];
        data.lxx[(0, 0)] = 10.0;
        data.lxx[(1, 1)] = 1.0;
    }
}

fn pendulum(horizon: usize) -> ShootingProblem {
    let target = std::f64::consts::PI;
    let running: Vec<Box<dyn StageModel>> = (0..horizon)
        .map(|_| {
            Box::new(PendulumStage {
                state: EuclideanSpace::new(2),
                dt: 0.05,
                target,
            }) as Box<dyn StageModel>
        })
        .collect();
    let terminal = Box::new(PendulumTerminal {
        state: EuclideanSpace::new(2),
        target,
    });
    ShootingProblem::new(dvector![0.0, 0.0], running, terminal).expect("valid problem")
}

fn build_pendulum_swingup() -> ShootingProblem {
    pendulum(60)
}

fn build_pendulum_long() -> ShootingProblem {
    pendulum(120)
}

// ============================================================================
// Problem registry
// ============================================================================

pub fn benchmark_problems() -> Vec<TestProblem> {
    vec![
        TestProblem {
            name: "LQ_DI_20",
            problem_class: "LQ",
            builder: build_lq_double_integrator,
            max_iter: 10,
            tol_stop: 1e-9,
            expected_iterations: Some(2),
            expected_to_fail: false,
            source: "synthetic",
        },
        TestProblem {
            name: "LQ_TRACK_50",
            problem_class: "LQ",
            builder: build_lq_tracking,
            max_iter: 10,
            tol_stop: 1e-9,
            expected_iterations: Some(2),
            expected_to_fail: false,
            source: "synthetic",
        },
        TestProblem {
            name: "LQ_RANDOM_4_2_30",
            problem_class: "LQ",
            builder: build_lq_random,
            max_iter: 10,
            tol_stop: 1e-9,
            expected_iterations: Some(2),
            expected_to_fail: false,
            source: "synthetic",
        },
        TestProblem {
            name: "PEND_SWINGUP_60",
            problem_class: "NLP",
            builder: build_pendulum_swingup,
            max_iter: 100,
            tol_stop: 1e-6,
            expected_iterations: None,
            expected_to_fail: false,
            source: "synthetic",
        },
        TestProblem {
            name: "PEND_SWINGUP_120",
            problem_class: "NLP",
            builder: build_pendulum_long,
            max_iter: 200,
            tol_stop: 1e-6,
            expected_iterations: None,
            expected_to_fail: false,
            source: "synthetic",
        },
        TestProblem {
            name: "PEND_BUDGET_3",
            problem_class: "NLP",
            builder: build_pendulum_swingup,
            max_iter: 3,
            tol_stop: 1e-12,
            expected_iterations: None,
            expected_to_fail: true,
            source: "synthetic",
        },
    ]
}
