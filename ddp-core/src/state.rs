//! State manifold primitives.
//!
//! The solver never assumes states live in a vector space: deviations are
//! formed with [`StateSpace::diff`] and applied with [`StateSpace::integrate`],
//! so orientation-like states keep working as long as the model's state space
//! implements both. Representation dimension (`nx`) and tangent dimension
//! (`ndx`) are distinct for that reason.

use nalgebra::DVector;

/// Manifold operations for one stage's state.
pub trait StateSpace {
    /// Dimension of the state representation.
    fn nx(&self) -> usize;

    /// Dimension of the tangent space (state deviations).
    fn ndx(&self) -> usize;

    /// A neutral element of the space, used to size and seed buffers.
    fn neutral(&self) -> DVector<f64>;

    /// Tangent-space difference `x1 ⊖ x0`, written into `out` (length `ndx`).
    fn diff(&self, x0: &DVector<f64>, x1: &DVector<f64>, out: &mut DVector<f64>);

    /// Retraction `x ⊕ dx`, written into `out` (length `nx`).
    fn integrate(&self, x: &DVector<f64>, dx: &DVector<f64>, out: &mut DVector<f64>);
}

/// Flat vector space: `diff` is subtraction and `integrate` is addition.
#[derive(Debug, Clone, Copy)]
pub struct EuclideanSpace {
    dim: usize,
}

impl EuclideanSpace {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl StateSpace for EuclideanSpace {
    fn nx(&self) -> usize {
        self.dim
    }

    fn ndx(&self) -> usize {
        self.dim
    }

    fn neutral(&self) -> DVector<f64> {
        DVector::zeros(self.dim)
    }

    fn diff(&self, x0: &DVector<f64>, x1: &DVector<f64>, out: &mut DVector<f64>) {
        out.copy_from(x1);
        out.axpy(-1.0, x0, 1.0);
    }

    fn integrate(&self, x: &DVector<f64>, dx: &DVector<f64>, out: &mut DVector<f64>) {
        out.copy_from(x);
        out.axpy(1.0, dx, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dvector;

    #[test]
    fn euclidean_diff_integrate_roundtrip() {
        let space = EuclideanSpace::new(3);
        let x0 = dvector![1.0, -2.0, 0.5];
        let x1 = dvector![0.0, 4.0, 0.5];

        let mut dx = space.neutral();
        space.diff(&x0, &x1, &mut dx);
        assert_eq!(dx, dvector![-1.0, 6.0, 0.0]);

        let mut back = space.neutral();
        space.integrate(&x0, &dx, &mut back);
        assert_eq!(back, x1);
    }

    #[test]
    fn euclidean_dims_agree() {
        let space = EuclideanSpace::new(4);
        assert_eq!(space.nx(), 4);
        assert_eq!(space.ndx(), 4);
        assert_eq!(space.neutral().len(), 4);
    }
}
