//! Solver settings and parameters.

use crate::error::{SolverError, SolverResult};

/// Tunables for the DDP solver.
///
/// The acceptance band and the plateau fallback threshold are policy, not
/// structure: tighten `accept_ratio_min`/`accept_ratio_max` for problems
/// where the quadratic model must be trusted closely, widen them for cheap
/// progress on rough models.
#[derive(Debug, Clone)]
pub struct SolverSettings {
    /// Stationarity tolerance: the solve terminates once the measure drops below this
    pub tol_stop: f64,

    /// Expected-improvement magnitude below which the line search switches to
    /// the near-converged plateau fallback
    pub th_grad: f64,

    /// Lower edge of the actual/expected improvement acceptance band
    pub accept_ratio_min: f64,

    /// Upper edge of the acceptance band (`f64::INFINITY` disables it)
    pub accept_ratio_max: f64,

    /// Minimum regularization level
    pub reg_min: f64,

    /// Maximum regularization level; an indefinite Quu at this level is non-convergence
    pub reg_max: f64,

    /// Multiplicative regularization increase/decrease factor
    pub reg_factor: f64,

    /// Descending line-search step lengths, tried in order each iteration
    pub alphas: Vec<f64>,

    /// Per-iteration trace on stderr
    pub verbose: bool,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            tol_stop: 1e-9,
            th_grad: 1e-12,
            accept_ratio_min: 0.1,
            accept_ratio_max: f64::INFINITY,
            reg_min: 1e-9,
            reg_max: 1e9,
            reg_factor: 10.0,
            // 1.0, 0.5, ..., ~0.002: ten halvings
            alphas: (0..10).map(|n| 0.5_f64.powi(n)).collect(),
            verbose: false,
        }
    }
}

impl SolverSettings {
    /// Check internal consistency.
    pub fn validate(&self) -> SolverResult<()> {
        if !(self.tol_stop > 0.0) {
            return Err(SolverError::InvalidSettings(
                "tol_stop must be positive".to_string(),
            ));
        }
        if !(self.reg_min > 0.0) || self.reg_min > self.reg_max {
            return Err(SolverError::InvalidSettings(format!(
                "regularization bounds [{:e}, {:e}] must be positive and ordered",
                self.reg_min, self.reg_max
            )));
        }
        if !(self.reg_factor > 1.0) {
            return Err(SolverError::InvalidSettings(
                "reg_factor must be greater than 1".to_string(),
            ));
        }
        if self.alphas.is_empty() {
            return Err(SolverError::InvalidSettings(
                "line-search schedule must not be empty".to_string(),
            ));
        }
        for pair in self.alphas.windows(2) {
            if pair[1] >= pair[0] {
                return Err(SolverError::InvalidSettings(
                    "line-search schedule must be strictly descending".to_string(),
                ));
            }
        }
        if self.alphas.iter().any(|&a| !(0.0 < a && a <= 1.0)) {
            return Err(SolverError::InvalidSettings(
                "step lengths must lie in (0, 1]".to_string(),
            ));
        }
        if self.accept_ratio_min >= self.accept_ratio_max {
            return Err(SolverError::InvalidSettings(
                "acceptance band must be non-empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        let settings = SolverSettings::default();
        settings.validate().unwrap();
        assert_eq!(settings.alphas[0], 1.0);
        assert!(settings.alphas.windows(2).all(|p| p[1] < p[0]));
    }

    #[test]
    fn rejects_ascending_schedule() {
        let settings = SolverSettings {
            alphas: vec![0.5, 1.0],
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rejects_inverted_reg_bounds() {
        let settings = SolverSettings {
            reg_min: 1.0,
            reg_max: 1e-3,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }
}
