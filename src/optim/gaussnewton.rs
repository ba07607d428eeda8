use nalgebra::{Cholesky, Const, SMatrix, SVector};
use num::Zero;

/// Smallest ratio between two pivots of the Hessian factorization before the
/// system is considered rank deficient.
const RANK_TOLERANCE: f64 = 1e-12;

/// Implements the standard Gauss Newton optimization
///
/// # Type parameters
///
/// * `DIM` - The dimension of the problem.
pub struct GaussNewton<const DIM: usize> {
    hessian: SMatrix<f64, DIM, DIM>,
    gradient: SVector<f64, DIM>,
    squared_residual_sum: f64,
    count: usize,
}

impl<const DIM: usize> Default for GaussNewton<DIM> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const DIM: usize> GaussNewton<DIM> {
    /// Creates a new Gauss Newton optimizer.
    pub fn new() -> Self {
        Self {
            hessian: SMatrix::zeros(),
            gradient: SVector::zeros(),
            squared_residual_sum: 0.0,
            count: 0,
        }
    }

    /// Resets the optimizer.
    pub fn reset(&mut self) {
        self.hessian.set_zero();
        self.gradient.set_zero();
        self.squared_residual_sum = 0.0;
        self.count = 0;
    }

    /// Adds a new step to the optimizer.
    ///
    /// # Arguments
    ///
    /// * `residual` - The residual of the step.
    /// * `jacobian` - The jacobian of the step.
    pub fn step(&mut self, residual: f64, jacobian: &[f64; DIM]) {
        for i in 0..DIM {
            let ival = jacobian[i];
            self.gradient[i] += ival * residual;

            self.hessian[(i, i)] += ival * ival;
            for j in i + 1..DIM {
                let mul = ival * jacobian[j];
                self.hessian[(i, j)] += mul;
                self.hessian[(j, i)] += mul;
            }
        }

        self.squared_residual_sum += residual * residual;
        self.count += 1;
    }

    /// Number of steps added since the last reset.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Solve the current gauss newton system.
    ///
    /// # Returns
    ///
    /// The update vector, or `None` if no step was added or the system is singular.
    pub fn solve(&self) -> Option<SVector<f64, DIM>> {
        if self.count < DIM {
            return None;
        }

        let cholesky = Cholesky::<f64, Const<DIM>>::new(self.hessian)?;
        let pivots = cholesky.l_dirty().diagonal().map(|v| v * v);
        if pivots.min() <= pivots.max() * RANK_TOLERANCE {
            return None;
        }
        Some(cholesky.solve(&self.gradient))
    }

    /// Returns the mean squared residual.
    pub fn mean_squared_residual(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.squared_residual_sum / self.count as f64
    }
}
