//! JSON regression baselines for the benchmark registry.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One benchmark outcome, comparable across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchRecord {
    pub name: String,
    pub converged: bool,
    pub iters: usize,
    pub cost: f64,
    pub time_ms: u64,
}

/// Iteration-count slack allowed before a run counts as a regression.
const ITER_SLACK: usize = 2;

/// Relative cost drift allowed before a run counts as a regression.
const COST_RTOL: f64 = 1e-2;

pub fn write_baseline(path: &Path, records: &[BenchRecord]) -> Result<()> {
    let json = serde_json::to_string_pretty(records)?;
    fs::write(path, json).with_context(|| format!("writing baseline {}", path.display()))?;
    Ok(())
}

/// Compare against a stored baseline. Returns a human-readable message per
/// regression; an empty vector means the run is clean.
pub fn check_baseline(path: &Path, records: &[BenchRecord]) -> Result<Vec<String>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading baseline {}", path.display()))?;
    let baseline: Vec<BenchRecord> = serde_json::from_str(&contents)?;

    let mut regressions = Vec::new();
    for base in &baseline {
        let Some(run) = records.iter().find(|r| r.name == base.name) else {
            regressions.push(format!("{}: missing from this run", base.name));
            continue;
        };
        if base.converged && !run.converged {
            regressions.push(format!("{}: no longer converges", base.name));
            continue;
        }
        if run.iters > base.iters + ITER_SLACK {
            regressions.push(format!(
                "{}: iterations {} -> {}",
                base.name, base.iters, run.iters
            ));
        }
        let denom = base.cost.abs().max(1.0);
        if (run.cost - base.cost).abs() / denom > COST_RTOL {
            regressions.push(format!(
                "{}: cost {:.6e} -> {:.6e}",
                base.name, base.cost, run.cost
            ));
        }
    }
    Ok(regressions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, iters: usize, cost: f64) -> BenchRecord {
        BenchRecord {
            name: name.to_string(),
            converged: true,
            iters,
            cost,
            time_ms: 1,
        }
    }

    #[test]
    fn baseline_roundtrip_and_check() {
        let dir = std::env::temp_dir().join("ddp-bench-test-baseline.json");
        let baseline = vec![record("A", 5, 1.0), record("B", 10, 2.0)];
        write_baseline(&dir, &baseline).unwrap();

        // identical run is clean
        let clean = check_baseline(&dir, &baseline).unwrap();
        assert!(clean.is_empty());

        // slower + drifted run is flagged
        let worse = vec![record("A", 9, 1.0), record("B", 10, 2.5)];
        let regressions = check_baseline(&dir, &worse).unwrap();
        assert_eq!(regressions.len(), 2);

        let _ = std::fs::remove_file(&dir);
    }
}
