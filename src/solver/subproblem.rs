//! Per-degree linear systems.
//!
//! All modes of one degree ℓ share the same mass matrix M and stiffness
//! matrix L. After the tau correction the matrices are compressed to
//! sparse row form, and the LU factorisation of `a0·M + L` is cached by
//! the value of a0.

use std::sync::Arc;

use faer::{
    Mat,
    linalg::solvers::{PartialPivLu, Solve},
    sparse::{CreationError, SparseRowMat, Triplet},
};
use num_complex::Complex64;

use super::{BlockLayout, SolverError};
use crate::types::{Degree, Order};

/// Sparse form of a tau-corrected operator.
pub type SparseOperator = SparseRowMat<usize, f64>;

/// Compress a dense matrix, dropping exact zeros.
pub fn compress(m: &Mat<f64>) -> Result<SparseOperator, CreationError> {
    let mut triplets = Vec::new();
    for i in 0..m.nrows() {
        for j in 0..m.ncols() {
            let v = m[(i, j)];
            if v != 0.0 {
                triplets.push(Triplet::new(i, j, v));
            }
        }
    }
    SparseRowMat::try_new_from_triplets(m.nrows(), m.ncols(), &triplets)
}

/// Entry (i, j) of a sparse operator, zero if not stored.
pub fn sparse_entry(m: &SparseOperator, i: usize, j: usize) -> f64 {
    m.as_ref().get(i, j).copied().unwrap_or(0.0)
}

/// Interface the tau correction works through.
pub trait ModeOperators {
    /// Degree shared by every mode of the subproblem.
    fn ell(&self) -> Degree;
    /// Mass matrix M.
    fn mass_mut(&mut self) -> &mut Mat<f64>;
    /// Stiffness matrix L.
    fn stiffness_mut(&mut self) -> &mut Mat<f64>;
    fn layout(&self) -> &BlockLayout;
    /// Chebyshev coefficients of the tau polynomials, one per column.
    fn connection(&self) -> &Mat<f64>;
    /// Whether the tau correction has been applied.
    fn is_tau_corrected(&self) -> bool;
    /// Mark as corrected, compress, and drop cached factorisations.
    fn finish_tau_correction(&mut self) -> Result<(), CreationError>;
}

/// Linear system for one degree ℓ.
pub struct Subproblem {
    ell: Degree,
    layout: Arc<BlockLayout>,
    connection: Arc<Mat<f64>>,
    mass: Mat<f64>,
    stiffness: Mat<f64>,
    compressed: Option<(SparseOperator, SparseOperator)>,
    factorization: Option<(u64, PartialPivLu<f64>)>,
}

impl Subproblem {
    /// Wrap assembled (uncorrected) matrices.
    pub fn new(
        ell: Degree,
        layout: Arc<BlockLayout>,
        connection: Arc<Mat<f64>>,
        mass: Mat<f64>,
        stiffness: Mat<f64>,
    ) -> Self {
        debug_assert_eq!(mass.nrows(), layout.size());
        debug_assert_eq!(stiffness.ncols(), layout.size());
        Self {
            ell,
            layout,
            connection,
            mass,
            stiffness,
            compressed: None,
            factorization: None,
        }
    }

    /// Azimuthal orders served: every m with m ≤ ℓ.
    pub fn orders(&self) -> impl Iterator<Item = Order> + use<> {
        (0..=self.ell.get()).map(Order::new)
    }

    /// Dense mass matrix.
    pub fn mass(&self) -> &Mat<f64> {
        &self.mass
    }

    /// Dense stiffness matrix.
    pub fn stiffness(&self) -> &Mat<f64> {
        &self.stiffness
    }

    /// Sparse form of (M, L), available after the tau correction.
    pub fn compressed(&self) -> Option<&(SparseOperator, SparseOperator)> {
        self.compressed.as_ref()
    }

    /// `M · x` for packed mode columns.
    pub fn apply_mass(&self, x: &Mat<f64>) -> Mat<f64> {
        match &self.compressed {
            Some((m, _)) => m.as_ref() * x.as_ref(),
            None => self.mass.as_ref() * x.as_ref(),
        }
    }

    /// `M · x` for one mode's complex coefficients.
    pub fn apply_mass_complex(&self, x: &[Complex64]) -> Vec<Complex64> {
        self.layout.unpack(&self.apply_mass(&self.layout.pack(x)))
    }

    /// Whether a factorisation for `a0` is cached.
    pub fn has_factorization(&self, a0: f64) -> bool {
        matches!(&self.factorization, Some((key, _)) if *key == a0.to_bits())
    }

    /// Solve `(a0·M + L) x = rhs`.
    pub fn solve(&mut self, a0: f64, rhs: &Mat<f64>) -> Result<Mat<f64>, SolverError> {
        let lu = match self.factorization.take() {
            Some((key, lu)) if key == a0.to_bits() => lu,
            _ => self.factorize(a0),
        };
        let x = lu.solve(rhs);
        self.factorization = Some((a0.to_bits(), lu));

        if all_finite(rhs) && !all_finite(&x) {
            return Err(SolverError::SingularSubproblem { ell: self.ell.get() });
        }
        Ok(x)
    }

    fn factorize(&self, a0: f64) -> PartialPivLu<f64> {
        let n = self.layout.size();
        let system = Mat::from_fn(n, n, |i, j| a0 * self.mass[(i, j)] + self.stiffness[(i, j)]);
        tracing::debug!(ell = self.ell.get(), a0, "factorising subproblem");
        system.as_ref().partial_piv_lu()
    }
}

fn all_finite(m: &Mat<f64>) -> bool {
    (0..m.ncols()).all(|c| (0..m.nrows()).all(|i| m[(i, c)].is_finite()))
}

impl ModeOperators for Subproblem {
    fn ell(&self) -> Degree {
        self.ell
    }

    fn mass_mut(&mut self) -> &mut Mat<f64> {
        &mut self.mass
    }

    fn stiffness_mut(&mut self) -> &mut Mat<f64> {
        &mut self.stiffness
    }

    fn layout(&self) -> &BlockLayout {
        &self.layout
    }

    fn connection(&self) -> &Mat<f64> {
        &self.connection
    }

    fn is_tau_corrected(&self) -> bool {
        self.compressed.is_some()
    }

    fn finish_tau_correction(&mut self) -> Result<(), CreationError> {
        self.compressed = Some((compress(&self.mass)?, compress(&self.stiffness)?));
        self.factorization = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tridiagonal() -> Mat<f64> {
        Mat::from_fn(3, 3, |i, j| if i == j { 2.0 } else if j == i + 1 { -1.0 } else { 0.0 })
    }

    #[test]
    fn test_compress_drops_zeros() {
        let sparse = compress(&tridiagonal()).unwrap();
        assert_eq!(sparse.as_ref().compute_nnz(), 5);
        assert_eq!(sparse_entry(&sparse, 0, 1), -1.0);
        assert_eq!(sparse_entry(&sparse, 2, 0), 0.0);

        let x = Mat::from_fn(3, 2, |i, j| (i + j) as f64);
        let y = sparse.as_ref() * x.as_ref();
        assert_eq!(y[(0, 0)], -1.0);
        assert_eq!(y[(1, 1)], 1.0);
        assert_eq!(y[(2, 0)], 4.0);
    }

    #[test]
    fn test_partial_pivot_solve_needs_row_exchange() {
        // zero leading pivot
        let a = Mat::from_fn(3, 3, |i, j| match (i, j) {
            (0, 1) | (1, 0) => 1.0,
            (2, 2) => 4.0,
            (1, 2) => 2.0,
            _ => 0.0,
        });
        let lu = a.as_ref().partial_piv_lu();
        let rhs = Mat::from_fn(3, 1, |i, _| (i + 1) as f64);
        let x = lu.solve(&rhs);
        let ax = &a * &x;
        for i in 0..3 {
            assert!(x[(i, 0)].is_finite());
            assert!((ax[(i, 0)] - rhs[(i, 0)]).abs() < 1e-12);
        }
    }
}
