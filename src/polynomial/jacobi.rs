//! Orthonormal Jacobi polynomials, Gauss-Jacobi quadrature and connection
//! matrices between Jacobi families.
//!
//! Jacobi polynomials P_n^{(α,β)} are orthogonal on [-1, 1] with weight
//! w(x) = (1-x)^α (1+x)^β. Chebyshev (α = β = -1/2) and Legendre (α = β = 0)
//! are special cases. The boundary tau polynomials of the radial
//! discretisation are orthonormal Jacobi polynomials with α = β = 3/2.
//!
//! Everything is built from the orthonormal three-term recurrence
//!
//! √β_{k+1} p̂_{k+1}(x) = (x - α_k) p̂_k(x) - √β_k p̂_{k-1}(x),   p̂_0 = 1/√β_0,
//!
//! where β_0 = ∫ w(x) dx.

use faer::Mat;
use std::f64::consts::PI;

/// Parameters (α, β) of a Jacobi weight (1-x)^α (1+x)^β.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JacobiParams {
    /// Exponent at x = +1
    pub alpha: f64,
    /// Exponent at x = -1
    pub beta: f64,
}

impl JacobiParams {
    /// Chebyshev polynomials of the first kind.
    pub const CHEBYSHEV: Self = Self {
        alpha: -0.5,
        beta: -0.5,
    };

    /// Legendre polynomials.
    pub const LEGENDRE: Self = Self {
        alpha: 0.0,
        beta: 0.0,
    };

    /// Create a parameter pair.
    ///
    /// # Panics
    ///
    /// Panics unless both parameters exceed -1 (the weight must be integrable).
    pub fn new(alpha: f64, beta: f64) -> Self {
        assert!(
            alpha > -1.0 && beta > -1.0,
            "Jacobi parameters must exceed -1, got ({}, {})",
            alpha,
            beta
        );
        Self { alpha, beta }
    }

    /// Total mass β_0 = ∫ (1-x)^α (1+x)^β dx = 2^{α+β+1} Γ(α+1) Γ(β+1) / Γ(α+β+2).
    pub fn mass(&self) -> f64 {
        let (a, b) = (self.alpha, self.beta);
        2f64.powf(a + b + 1.0) * gamma(a + 1.0) * gamma(b + 1.0) / gamma(a + b + 2.0)
    }

    /// Recurrence coefficients (α_k, √β_k) of the monic Jacobi recurrence.
    ///
    /// k = 0 returns (α_0, √β_0) with β_0 the total mass. The k = 0 and k = 1
    /// cases are closed forms that avoid the 0/0 of the general expression
    /// when α + β ∈ {0, -1}.
    fn recurrence(&self, k: usize) -> (f64, f64) {
        let (a, b) = (self.alpha, self.beta);
        let kf = k as f64;
        let s = 2.0 * kf + a + b;

        let alpha_k = if k == 0 {
            (b - a) / (a + b + 2.0)
        } else {
            (b * b - a * a) / (s * (s + 2.0))
        };

        let beta_k = match k {
            0 => self.mass(),
            1 => 4.0 * (1.0 + a) * (1.0 + b) / ((2.0 + a + b).powi(2) * (3.0 + a + b)),
            _ => {
                4.0 * kf * (kf + a) * (kf + b) * (kf + a + b)
                    / (s * s * (s + 1.0) * (s - 1.0))
            }
        };

        (alpha_k, beta_k.sqrt())
    }
}

/// Evaluate orthonormal Jacobi polynomials p̂_0..=p̂_n at `x`.
pub fn jacobi_orthonormal(n: usize, params: JacobiParams, x: f64) -> Vec<f64> {
    jacobi_orthonormal_with_derivative(n, params, x).0
}

/// Evaluate orthonormal Jacobi polynomials and their derivatives for degrees 0..=n.
pub fn jacobi_orthonormal_with_derivative(
    n: usize,
    params: JacobiParams,
    x: f64,
) -> (Vec<f64>, Vec<f64>) {
    let mut p = Vec::with_capacity(n + 1);
    let mut dp = Vec::with_capacity(n + 1);

    let (_, sqrt_mass) = params.recurrence(0);
    p.push(1.0 / sqrt_mass);
    dp.push(0.0);

    let mut sqrt_beta_prev = 0.0;
    for k in 0..n {
        let (alpha_k, _) = params.recurrence(k);
        let (_, sqrt_beta_next) = params.recurrence(k + 1);

        let (p_km1, dp_km1) = if k == 0 { (0.0, 0.0) } else { (p[k - 1], dp[k - 1]) };
        let p_next = ((x - alpha_k) * p[k] - sqrt_beta_prev * p_km1) / sqrt_beta_next;
        let dp_next =
            ((x - alpha_k) * dp[k] + p[k] - sqrt_beta_prev * dp_km1) / sqrt_beta_next;

        p.push(p_next);
        dp.push(dp_next);
        sqrt_beta_prev = sqrt_beta_next;
    }

    (p, dp)
}

/// Gauss-Jacobi quadrature with `n` points: `(nodes, weights)`, nodes ascending.
///
/// Nodes are the roots of p̂_n, found by Newton iteration with deflation
/// against the roots already found. Weights follow from the Christoffel
/// formula w_j = 1 / Σ_{k<n} p̂_k(x_j)².
///
/// # Example
///
/// ```
/// use shellconv::polynomial::{JacobiParams, gauss_jacobi};
///
/// let (nodes, weights) = gauss_jacobi(4, JacobiParams::LEGENDRE);
/// let total: f64 = weights.iter().sum();
/// assert!((total - 2.0).abs() < 1e-13);
/// assert!(nodes[0] < nodes[3]);
/// ```
pub fn gauss_jacobi(n: usize, params: JacobiParams) -> (Vec<f64>, Vec<f64>) {
    let mut nodes: Vec<f64> = Vec::with_capacity(n);

    for j in 0..n {
        let mut x = -(PI * (2 * j + 1) as f64 / (2 * n) as f64).cos();

        for _ in 0..100 {
            let (p, dp) = jacobi_orthonormal_with_derivative(n, params, x);
            let deflation: f64 = nodes.iter().map(|&root| 1.0 / (x - root)).sum();
            let update = p[n] / (dp[n] - p[n] * deflation);
            x -= update;
            if update.abs() < 1e-15 * (1.0 + x.abs()) {
                break;
            }
        }

        nodes.push(x);
    }

    nodes.sort_by(f64::total_cmp);

    let weights = nodes
        .iter()
        .map(|&x| {
            let p = jacobi_orthonormal(n.saturating_sub(1), params, x);
            1.0 / p.iter().map(|v| v * v).sum::<f64>()
        })
        .collect();

    (nodes, weights)
}

/// Connection matrix between two orthonormal Jacobi families.
///
/// `C[(i, j)]` is the coefficient of p̂_i^{to} in the expansion of p̂_j^{from},
/// for i, j < n. Degrees never increase, so C is upper triangular and the
/// expansion is exact. Computed by n-point Gauss-Jacobi quadrature in the
/// `to` weight.
pub fn connection_matrix(n: usize, from: JacobiParams, to: JacobiParams) -> Mat<f64> {
    let mut c = Mat::zeros(n, n);
    if n == 0 {
        return c;
    }

    let (nodes, weights) = gauss_jacobi(n, to);
    for (&x, &w) in nodes.iter().zip(&weights) {
        let p_to = jacobi_orthonormal(n - 1, to, x);
        let p_from = jacobi_orthonormal(n - 1, from, x);
        for i in 0..n {
            for j in i..n {
                c[(i, j)] += w * p_to[i] * p_from[j];
            }
        }
    }

    c
}

/// Lanczos coefficients (g = 7, n = 9).
const LANCZOS_G: f64 = 7.0;
const LANCZOS_COEF: [f64; 9] = [
    0.999_999_999_999_809_9,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_6,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_572e-6,
    1.505_632_735_149_311_6e-7,
];

/// Gamma function via the Lanczos approximation (~15 significant digits).
///
/// Uses the reflection formula for x < 1/2.
pub fn gamma(x: f64) -> f64 {
    if x < 0.5 {
        return PI / ((PI * x).sin() * gamma(1.0 - x));
    }

    let x = x - 1.0;
    let mut sum = LANCZOS_COEF[0];
    for (i, &c) in LANCZOS_COEF.iter().enumerate().skip(1) {
        sum += c / (x + i as f64);
    }
    let t = x + LANCZOS_G + 0.5;
    (2.0 * PI).sqrt() * t.powf(x + 0.5) * (-t).exp() * sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_gamma_known_values() {
        assert_relative_eq!(gamma(1.0), 1.0, epsilon = 1e-14);
        assert_relative_eq!(gamma(5.0), 24.0, max_relative = 1e-13);
        assert_relative_eq!(gamma(0.5), PI.sqrt(), max_relative = 1e-13);
        assert_relative_eq!(gamma(2.5), 0.75 * PI.sqrt(), max_relative = 1e-13);
    }

    #[test]
    fn test_chebyshev_mass_is_pi() {
        assert_relative_eq!(JacobiParams::CHEBYSHEV.mass(), PI, max_relative = 1e-13);
        assert_relative_eq!(JacobiParams::LEGENDRE.mass(), 2.0, max_relative = 1e-13);
    }

    #[test]
    fn test_orthonormal_chebyshev_matches_closed_form() {
        // p̂_0 = 1/√π, p̂_k = √(2/π) T_k
        let x: f64 = 0.3;
        let p = jacobi_orthonormal(5, JacobiParams::CHEBYSHEV, x);
        assert_relative_eq!(p[0], 1.0 / PI.sqrt(), epsilon = 1e-14);
        for (k, &pk) in p.iter().enumerate().skip(1) {
            let tk = (k as f64 * x.acos()).cos();
            assert_relative_eq!(pk, (2.0 / PI).sqrt() * tk, epsilon = 1e-13);
        }
    }

    #[test]
    fn test_gauss_chebyshev_nodes() {
        let n = 7;
        let (nodes, weights) = gauss_jacobi(n, JacobiParams::CHEBYSHEV);
        for (j, (&x, &w)) in nodes.iter().zip(&weights).enumerate() {
            let expected = -(PI * (2 * j + 1) as f64 / (2 * n) as f64).cos();
            assert_relative_eq!(x, expected, epsilon = 1e-14);
            assert_relative_eq!(w, PI / n as f64, epsilon = 1e-13);
        }
    }

    #[test]
    fn test_gauss_jacobi_exactness() {
        let params = JacobiParams::new(1.5, 1.5);
        let n = 6;
        let (nodes, weights) = gauss_jacobi(n, params);

        // Exact for degree 2n - 1: check orthonormality of p̂_i p̂_j, i + j ≤ 2n - 1
        let values: Vec<_> = nodes
            .iter()
            .map(|&x| jacobi_orthonormal(n, params, x))
            .collect();
        for i in 0..n {
            for j in 0..=n.min(2 * n - 1 - i) {
                let integral: f64 = values
                    .iter()
                    .zip(&weights)
                    .map(|(p, w)| w * p[i] * p[j])
                    .sum();
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!(
                    (integral - expected).abs() < 1e-12,
                    "<p{}, p{}> = {}",
                    i,
                    j,
                    integral
                );
            }
        }
    }

    #[test]
    fn test_gauss_jacobi_asymmetric_weight() {
        let params = JacobiParams::new(1.0, 0.0);
        let (nodes, weights) = gauss_jacobi(5, params);
        // ∫ (1-x) x dx = -2/3
        let integral: f64 = nodes.iter().zip(&weights).map(|(x, w)| w * x).sum();
        assert_relative_eq!(integral, -2.0 / 3.0, epsilon = 1e-13);
    }

    #[test]
    fn test_connection_identity_for_equal_parameters() {
        let params = JacobiParams::new(1.5, 1.5);
        let c = connection_matrix(8, params, params);
        for i in 0..8 {
            for j in 0..8 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((c[(i, j)] - expected).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_connection_reconstructs_polynomial() {
        let from = JacobiParams::new(1.5, 1.5);
        let to = JacobiParams::CHEBYSHEV;
        let n = 6;
        let c = connection_matrix(n, from, to);

        for &x in &[-0.8, -0.1, 0.45, 0.9] {
            let p_from = jacobi_orthonormal(n - 1, from, x);
            let p_to = jacobi_orthonormal(n - 1, to, x);
            for j in 0..n {
                let rebuilt: f64 = (0..n).map(|i| c[(i, j)] * p_to[i]).sum();
                assert_relative_eq!(rebuilt, p_from[j], epsilon = 1e-11);
            }
        }
    }

    #[test]
    fn test_derivative_matches_finite_difference() {
        let params = JacobiParams::new(1.5, 1.5);
        let (x, h) = (0.37, 1e-6);
        let (_, dp) = jacobi_orthonormal_with_derivative(5, params, x);
        let plus = jacobi_orthonormal(5, params, x + h);
        let minus = jacobi_orthonormal(5, params, x - h);
        for k in 0..=5 {
            assert_relative_eq!(dp[k], (plus[k] - minus[k]) / (2.0 * h), epsilon = 1e-6);
        }
    }
}
