//! Adaptive regularization for the backward pass.
//!
//! A single scalar damping level added to the control-control Hessian before
//! factorization. The level moves multiplicatively inside `[min, max]`:
//! raised when the factorization fails or the line search exhausts its
//! schedule, lowered when a step is accepted. It is the only coupling
//! between backward-pass and forward-pass outcomes.

/// Bounds and step factor for the damping level.
#[derive(Debug, Clone)]
pub struct RegularizationPolicy {
    pub min: f64,
    pub max: f64,
    pub factor: f64,
}

impl Default for RegularizationPolicy {
    fn default() -> Self {
        Self {
            min: 1e-9,
            max: 1e9,
            factor: 10.0,
        }
    }
}

/// Current damping level. Persists across outer iterations within a solve.
#[derive(Debug, Copy, Clone)]
pub struct RegularizationState {
    pub level: f64,
}

impl RegularizationPolicy {
    /// Clamp an initial level into the configured bounds.
    pub fn init_state(&self, level: f64) -> RegularizationState {
        RegularizationState {
            level: level.clamp(self.min, self.max),
        }
    }

    /// Multiply the level by the factor, capped at `max`.
    pub fn increase(&self, st: &mut RegularizationState) {
        st.level = (st.level * self.factor).min(self.max);
    }

    /// Divide the level by the factor, floored at `min`.
    pub fn decrease(&self, st: &mut RegularizationState) {
        st.level = (st.level / self.factor).max(self.min);
    }

    /// True once the level can no longer be raised.
    pub fn saturated(&self, st: &RegularizationState) -> bool {
        st.level >= self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_stays_within_bounds() {
        let policy = RegularizationPolicy {
            min: 1e-6,
            max: 1e2,
            factor: 10.0,
        };
        let mut st = policy.init_state(1e-4);
        for _ in 0..20 {
            policy.increase(&mut st);
            assert!(st.level <= policy.max);
        }
        assert!(policy.saturated(&st));
        for _ in 0..20 {
            policy.decrease(&mut st);
            assert!(st.level >= policy.min);
        }
        assert_eq!(st.level, policy.min);
        assert!(!policy.saturated(&st));
    }

    #[test]
    fn init_clamps_out_of_range_levels() {
        let policy = RegularizationPolicy::default();
        assert_eq!(policy.init_state(0.0).level, policy.min);
        assert_eq!(policy.init_state(1e30).level, policy.max);
    }

    #[test]
    fn increase_then_decrease_roundtrips() {
        let policy = RegularizationPolicy::default();
        let mut st = policy.init_state(1e-3);
        policy.increase(&mut st);
        policy.decrease(&mut st);
        assert!((st.level - 1e-3).abs() < 1e-18);
    }
}
