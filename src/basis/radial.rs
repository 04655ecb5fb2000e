//! Chebyshev radial basis on [r_inner, r_outer].
//!
//! The radial profile of every mode is expanded in Chebyshev polynomials of
//! ξ = (r - r_mid) / h, h = (r_outer - r_inner) / 2. The physical grid is the
//! set of Gauss-Chebyshev points, so the nodal-modal transform matrices play
//! the role of a Vandermonde matrix and its inverse:
//! - values = backward · coefficients
//! - coefficients = forward · values

use faer::Mat;
use num_complex::Complex64;
use std::f64::consts::PI;

use crate::polynomial::{
    JacobiParams, chebyshev_backward_matrix, chebyshev_derivative_matrix,
    chebyshev_forward_matrix, chebyshev_gauss_nodes, chebyshev_multiplication_matrix,
    chebyshev_t, connection_matrix,
};
use crate::types::{Boundary, ShellGeometry};

/// Chebyshev radial basis and its transforms.
#[derive(Clone)]
pub struct RadialBasis {
    geometry: ShellGeometry,
    xi: Vec<f64>,
    radii: Vec<f64>,
    /// Values at the Gauss points from coefficients
    pub backward: Mat<f64>,
    /// Coefficients from values at the Gauss points
    pub forward: Mat<f64>,
    /// d/dr in coefficient space
    pub derivative: Mat<f64>,
}

impl RadialBasis {
    /// Build the basis for coefficients T_0..=T_nmax.
    pub fn new(nmax: usize, geometry: ShellGeometry) -> Self {
        let n = nmax + 1;
        let xi = chebyshev_gauss_nodes(n);
        let radii = xi.iter().map(|&x| geometry.xi_to_r(x)).collect();

        let derivative = scaled_derivative(n, geometry.half_gap());

        Self {
            geometry,
            xi,
            radii,
            backward: chebyshev_backward_matrix(n),
            forward: chebyshev_forward_matrix(n),
            derivative,
        }
    }

    /// Number of coefficients (and radial grid points).
    #[inline]
    pub fn size(&self) -> usize {
        self.xi.len()
    }

    /// Shell geometry.
    pub fn geometry(&self) -> &ShellGeometry {
        &self.geometry
    }

    /// Radial grid, ascending.
    pub fn radii(&self) -> &[f64] {
        &self.radii
    }

    /// Chebyshev coordinates of the radial grid.
    pub fn xi(&self) -> &[f64] {
        &self.xi
    }

    /// Radial grid spacing as a finite-difference gradient of the radii: one-sided
    /// differences at the ends, centred differences inside.
    pub fn grid_spacing(&self) -> Vec<f64> {
        let r = &self.radii;
        let n = r.len();
        if n < 2 {
            return vec![self.geometry.gap(); n];
        }
        (0..n)
            .map(|k| match k {
                0 => r[1] - r[0],
                k if k == n - 1 => r[n - 1] - r[n - 2],
                k => 0.5 * (r[k + 1] - r[k - 1]),
            })
            .collect()
    }

    /// Radial quadrature weights for ∫ f dr on the Gauss-Chebyshev grid.
    ///
    /// These are the Chebyshev weights π/n times √(1-ξ²) h. The rule is not
    /// exact for polynomials, which is why volume integrals are rescaled by a
    /// correction factor measured against the analytic shell volume.
    pub fn quadrature_weights(&self) -> Vec<f64> {
        let n = self.size() as f64;
        let h = self.geometry.half_gap();
        self.xi
            .iter()
            .map(|&x| PI / n * (1.0 - x * x).sqrt() * h)
            .collect()
    }

    /// Evaluation row at a boundary: `row · coeffs = f(r_boundary)`.
    pub fn boundary_row(&self, boundary: Boundary) -> Vec<f64> {
        chebyshev_t(self.size() - 1, boundary.xi())
    }

    /// Multiplication by r in coefficient space for `size` coefficients
    /// (truncated at the top mode).
    pub fn r_multiplication(&self, size: usize) -> Mat<f64> {
        let mut m = chebyshev_multiplication_matrix(size);
        let (mid, h) = (self.geometry.mid(), self.geometry.half_gap());
        for j in 0..size {
            for i in 0..size {
                m[(i, j)] *= h;
            }
            m[(j, j)] += mid;
        }
        m
    }

    /// d/dr in coefficient space for `size` coefficients.
    pub fn r_derivative(&self, size: usize) -> Mat<f64> {
        scaled_derivative(size, self.geometry.half_gap())
    }

    /// Chebyshev coefficients of the orthonormal Jacobi polynomials used as
    /// tau polynomials.
    ///
    /// Column j holds the T_i coefficients of p̂_j^{(α,β)}, for i, j ≤ nmax.
    /// Only the last two columns are used by the tau correction.
    pub fn tau_connection(&self, params: JacobiParams) -> Mat<f64> {
        let n = self.size();
        let mut c = connection_matrix(n, params, JacobiParams::CHEBYSHEV);
        // p̂_0 = T_0 / √π and p̂_i = √(2/π) T_i for the Chebyshev weight
        for j in 0..n {
            c[(0, j)] /= PI.sqrt();
            for i in 1..n {
                c[(i, j)] *= (2.0 / PI).sqrt();
            }
        }
        c
    }

    /// Values at the radial grid from coefficients.
    pub fn to_values(&self, coeffs: &[Complex64]) -> Vec<Complex64> {
        apply(&self.backward, coeffs)
    }

    /// Coefficients from values at the radial grid.
    pub fn to_coeffs(&self, values: &[Complex64]) -> Vec<Complex64> {
        apply(&self.forward, values)
    }

    /// Radial derivative evaluated at the radial grid.
    pub fn derivative_values(&self, coeffs: &[Complex64]) -> Vec<Complex64> {
        apply(&self.backward, &apply(&self.derivative, coeffs))
    }
}

// d/dr = (1/h) d/dξ
fn scaled_derivative(size: usize, half_gap: f64) -> Mat<f64> {
    let mut d = chebyshev_derivative_matrix(size);
    for j in 0..size {
        for i in 0..size {
            d[(i, j)] /= half_gap;
        }
    }
    d
}

/// Dense real matrix applied to a complex vector.
pub(crate) fn apply(m: &Mat<f64>, v: &[Complex64]) -> Vec<Complex64> {
    debug_assert_eq!(m.ncols(), v.len());
    (0..m.nrows())
        .map(|i| {
            v.iter()
                .enumerate()
                .fold(Complex64::new(0.0, 0.0), |acc, (j, x)| acc + x * m[(i, j)])
        })
        .collect()
}
