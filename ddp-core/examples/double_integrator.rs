//! Drive a double integrator to the origin and print the solve summary.
//!
//! Run with: cargo run --example double_integrator

use ddp_core::{
    DdpSolver, LqStageModel, LqTerminalModel, ShootingProblem, Solver, SolverSettings, StageModel,
};
use nalgebra::{dmatrix, dvector};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dt = 0.1;
    let horizon = 30;

    let a = dmatrix![1.0, dt; 0.0, 1.0];
    let b = dmatrix![0.5 * dt * dt; dt];
    let q = dmatrix![1.0, 0.0; 0.0, 0.1];
    let r = dmatrix![0.01];

    let running: Vec<Box<dyn StageModel>> = (0..horizon)
        .map(|_| {
            Box::new(LqStageModel::new(a.clone(), b.clone(), q.clone(), r.clone()))
                as Box<dyn StageModel>
        })
        .collect();
    let terminal = Box::new(LqTerminalModel::new(dmatrix![100.0, 0.0; 0.0, 100.0]));
    let problem = ShootingProblem::new(dvector![1.0, 0.0], running, terminal)?;

    let settings = SolverSettings {
        verbose: true,
        ..Default::default()
    };
    let mut solver = DdpSolver::new(problem, settings)?;
    let converged = solver.solve(None, None, 50, true, 1e-9)?;

    let info = solver.info();
    println!("converged:  {}", converged);
    println!("iterations: {}", info.iters);
    println!("cost:       {:.6e}", info.cost);
    println!("stop:       {:.3e}", info.stop);
    println!("final state: {:.4?}", solver.xs().last().unwrap().as_slice());

    Ok(())
}
