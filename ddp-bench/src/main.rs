//! Benchmarking CLI for the DDP solver.
//!
//! Runs the problem registry, prints a results table, and checks the
//! outcomes against each problem's expectations. Optionally writes or
//! checks a JSON regression baseline:
//!
//! ```text
//! ddp-bench [--filter SUBSTR] [--json PATH] [--baseline write|check] [--baseline-path PATH]
//! ```

mod regression;
mod test_problems;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Result};
use ddp_core::{DdpSolver, Solver, SolverSettings};

use regression::BenchRecord;
use test_problems::{benchmark_problems, TestProblem};

struct Args {
    filter: Option<String>,
    json: Option<PathBuf>,
    baseline: Option<String>,
    baseline_path: PathBuf,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        filter: None,
        json: None,
        baseline: None,
        baseline_path: PathBuf::from("ddp-bench-baseline.json"),
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--filter" => args.filter = iter.next(),
            "--json" => args.json = iter.next().map(PathBuf::from),
            "--baseline" => args.baseline = iter.next(),
            "--baseline-path" => {
                if let Some(p) = iter.next() {
                    args.baseline_path = PathBuf::from(p);
                }
            }
            other => bail!("unknown argument: {}", other),
        }
    }
    if let Some(mode) = &args.baseline {
        if mode != "write" && mode != "check" {
            bail!("--baseline expects 'write' or 'check', got '{}'", mode);
        }
    }
    Ok(args)
}

fn run_problem(prob: &TestProblem) -> Result<BenchRecord> {
    let settings = SolverSettings {
        tol_stop: prob.tol_stop,
        ..Default::default()
    };
    let mut solver = DdpSolver::new((prob.builder)(), settings)?;
    let start = Instant::now();
    let converged = solver.solve(None, None, prob.max_iter, true, 1e-9)?;
    let time_ms = start.elapsed().as_millis() as u64;
    Ok(BenchRecord {
        name: prob.name.to_string(),
        converged,
        iters: solver.info().iters,
        cost: solver.cost(),
        time_ms,
    })
}

fn main() -> Result<()> {
    let args = parse_args()?;

    let problems = benchmark_problems();
    let selected: Vec<&TestProblem> = problems
        .iter()
        .filter(|p| {
            args.filter
                .as_deref()
                .map_or(true, |f| p.name.contains(f))
        })
        .collect();

    println!(
        "{:<20} {:<6} {:>6} {:>10} {:>14} {:>8}  {}",
        "name", "class", "iters", "converged", "cost", "ms", "verdict"
    );

    let mut records = Vec::new();
    let mut failures = 0usize;
    for prob in &selected {
        let record = run_problem(prob)?;

        let mut verdict = "ok";
        if prob.expected_to_fail {
            if record.converged {
                verdict = "UNEXPECTED PASS";
                failures += 1;
            } else {
                verdict = "expected fail";
            }
        } else if !record.converged {
            verdict = "FAIL";
            failures += 1;
        } else if let Some(expected) = prob.expected_iterations {
            if record.iters > expected {
                verdict = "SLOW";
                failures += 1;
            }
        }

        println!(
            "{:<20} {:<6} {:>6} {:>10} {:>14.6e} {:>8}  {}",
            record.name,
            prob.problem_class,
            record.iters,
            record.converged,
            record.cost,
            record.time_ms,
            verdict
        );
        records.push(record);
    }

    if let Some(path) = &args.json {
        regression::write_baseline(path, &records)?;
        println!("results written to {}", path.display());
    }

    match args.baseline.as_deref() {
        Some("write") => {
            regression::write_baseline(&args.baseline_path, &records)?;
            println!("baseline written to {}", args.baseline_path.display());
        }
        Some("check") => {
            let regressions = regression::check_baseline(&args.baseline_path, &records)?;
            if regressions.is_empty() {
                println!("baseline check: clean");
            } else {
                for msg in &regressions {
                    println!("regression: {}", msg);
                }
                failures += regressions.len();
            }
        }
        _ => {}
    }

    if failures > 0 {
        bail!("{} benchmark failure(s)", failures);
    }
    Ok(())
}
