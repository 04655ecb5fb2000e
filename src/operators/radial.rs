//! Radial operator matrices in Chebyshev coefficient space.
//!
//! Every radial operator the solver needs is a sum of terms c · r^a · D^b
//! acting on T_0..=T_N. The products are formed at N + 3 coefficients, where
//! multiplication by r (up to r²) and differentiation of a degree-N input
//! are exact, and then truncated to the leading (N+1) × (N+1) block.

use faer::Mat;

use crate::basis::RadialBasis;
use crate::types::{Boundary, BoundaryPair};

/// Highest power of r an assembled term may carry.
pub const MAX_R_POWER: usize = 2;
/// Highest radial derivative order.
pub const MAX_DERIVATIVE: usize = 2;

/// Extra coefficients kept while forming products.
const PADDING: usize = MAX_R_POWER;

/// Precomputed r^a and D^b at padded size.
#[derive(Clone)]
pub struct RadialOperators {
    size: usize,
    r_powers: Vec<Mat<f64>>,
    derivatives: Vec<Mat<f64>>,
    boundary: BoundaryPair<Vec<f64>>,
}

impl RadialOperators {
    /// Build the operator set for a radial basis.
    pub fn new(basis: &RadialBasis) -> Self {
        let size = basis.size();
        let padded = size + PADDING;

        let r = basis.r_multiplication(padded);
        let mut r_powers = vec![Mat::identity(padded, padded)];
        for a in 1..=MAX_R_POWER {
            let next = matmul(&r, &r_powers[a - 1]);
            r_powers.push(next);
        }

        let d = basis.r_derivative(padded);
        let mut derivatives = vec![Mat::identity(padded, padded)];
        for b in 1..=MAX_DERIVATIVE {
            let next = matmul(&d, &derivatives[b - 1]);
            derivatives.push(next);
        }

        Self {
            size,
            r_powers,
            derivatives,
            boundary: BoundaryPair::new(
                basis.boundary_row(Boundary::Inner),
                basis.boundary_row(Boundary::Outer),
            ),
        }
    }

    /// Number of coefficients per radial profile.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// `coefficient · r^a · D^b`, truncated to size × size.
    ///
    /// # Panics
    ///
    /// Panics if `r_power` is negative or above [`MAX_R_POWER`], or if
    /// `derivative` exceeds [`MAX_DERIVATIVE`].
    pub fn term(&self, coefficient: f64, r_power: i32, derivative: usize) -> Mat<f64> {
        assert!(
            (0..=MAX_R_POWER as i32).contains(&r_power),
            "r^{} is outside the assembled range",
            r_power
        );
        assert!(derivative <= MAX_DERIVATIVE);
        let r = &self.r_powers[r_power as usize];
        let d = &self.derivatives[derivative];
        let n = self.size;
        Mat::from_fn(n, n, |i, j| {
            let mut sum = 0.0;
            for k in 0..r.ncols() {
                sum += r[(i, k)] * d[(k, j)];
            }
            coefficient * sum
        })
    }

    /// Evaluation row at a boundary, as a 1 × size matrix.
    pub fn boundary(&self, boundary: Boundary) -> Mat<f64> {
        let row = self.boundary.get(boundary);
        Mat::from_fn(1, row.len(), |_, j| row[j])
    }
}

/// Dense product `a · b`.
pub(crate) fn matmul(a: &Mat<f64>, b: &Mat<f64>) -> Mat<f64> {
    debug_assert_eq!(a.ncols(), b.nrows());
    let mut c = Mat::zeros(a.nrows(), b.ncols());
    for j in 0..b.ncols() {
        for k in 0..a.ncols() {
            let bkj = b[(k, j)];
            if bkj == 0.0 {
                continue;
            }
            for i in 0..a.nrows() {
                c[(i, j)] += a[(i, k)] * bkj;
            }
        }
    }
    c
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polynomial::chebyshev_t;
    use crate::types::ShellGeometry;
    use approx::assert_relative_eq;

    fn coeffs_of(basis: &RadialBasis, f: impl Fn(f64) -> f64) -> Vec<f64> {
        let values: Vec<f64> = basis.radii().iter().map(|&r| f(r)).collect();
        let n = basis.size();
        (0..n)
            .map(|i| (0..n).map(|k| basis.forward[(i, k)] * values[k]).sum())
            .collect()
    }

    fn eval(basis: &RadialBasis, c: &[f64], r: f64) -> f64 {
        let g = basis.geometry();
        let xi = (r - g.mid()) / g.half_gap();
        chebyshev_t(c.len() - 1, xi)
            .iter()
            .zip(c)
            .map(|(t, a)| t * a)
            .sum()
    }

    fn apply(m: &Mat<f64>, v: &[f64]) -> Vec<f64> {
        (0..m.nrows())
            .map(|i| (0..m.ncols()).map(|j| m[(i, j)] * v[j]).sum())
            .collect()
    }

    #[test]
    fn test_r_squared_second_derivative() {
        let basis = RadialBasis::new(8, ShellGeometry::default());
        let ops = RadialOperators::new(&basis);
        // f = r^4, r² f'' = 12 r^4
        let f = coeffs_of(&basis, |r| r.powi(4));
        let out = apply(&ops.term(1.0, 2, 2), &f);
        for r in [0.6, 1.0, 1.5] {
            assert_relative_eq!(eval(&basis, &out, r), 12.0 * r.powi(4), epsilon = 1e-10);
        }
    }

    #[test]
    fn test_top_degree_products_are_exact() {
        let basis = RadialBasis::new(5, ShellGeometry::default());
        let ops = RadialOperators::new(&basis);
        // degree-5 input times r² has degree 7; the kept T_0..T_5 must match
        let f = coeffs_of(&basis, |r| r.powi(5) - r);
        let out = apply(&ops.term(2.0, 2, 0), &f);

        let big = RadialBasis::new(9, ShellGeometry::default());
        let exact = coeffs_of(&big, |r| 2.0 * (r.powi(7) - r.powi(3)));
        for i in 0..6 {
            assert_relative_eq!(out[i], exact[i], epsilon = 1e-10);
        }
    }

    #[test]
    fn test_boundary_rows() {
        let geometry = ShellGeometry::default();
        let basis = RadialBasis::new(6, geometry);
        let ops = RadialOperators::new(&basis);
        let f = coeffs_of(&basis, |r| r * r + 1.0);
        for b in Boundary::ALL {
            let row = ops.boundary(b);
            let value = apply(&row, &f)[0];
            let r = geometry.radius(b);
            assert_relative_eq!(value, r * r + 1.0, epsilon = 1e-12);
        }
    }
}
