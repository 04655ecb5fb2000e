//! Chebyshev polynomials of the first kind in coefficient space.
//!
//! A radial profile f(ξ) = Σ_n c_n T_n(ξ) is stored by its coefficients.
//! Differentiation and multiplication by ξ act on coefficient vectors as
//! the sparse matrices built here.

use faer::Mat;
use std::f64::consts::PI;

/// Gauss-Chebyshev nodes ξ_k = -cos(π (k + 1/2) / n), ascending.
pub fn chebyshev_gauss_nodes(n: usize) -> Vec<f64> {
    (0..n)
        .map(|k| -(PI * (k as f64 + 0.5) / n as f64).cos())
        .collect()
}

/// Evaluate T_0..=T_nmax at `x` with T_{n+1} = 2x T_n - T_{n-1}.
pub fn chebyshev_t(nmax: usize, x: f64) -> Vec<f64> {
    let mut t = Vec::with_capacity(nmax + 1);
    t.push(1.0);
    if nmax >= 1 {
        t.push(x);
    }
    for n in 1..nmax {
        let next = 2.0 * x * t[n] - t[n - 1];
        t.push(next);
    }
    t
}

/// Differentiation matrix in coefficient space (size n × n).
///
/// If f = Σ a_n T_n then f' = Σ b_k T_k with
/// b_k = (2 / c_k) Σ_{n > k, n - k odd} n a_n, where c_0 = 2 and c_k = 1 otherwise.
pub fn chebyshev_derivative_matrix(n: usize) -> Mat<f64> {
    let mut d = Mat::zeros(n, n);
    for k in 0..n {
        let ck = if k == 0 { 2.0 } else { 1.0 };
        for col in (k + 1..n).step_by(2) {
            d[(k, col)] = 2.0 * col as f64 / ck;
        }
    }
    d
}

/// Multiplication by ξ in coefficient space (size n × n, truncated).
///
/// ξ T_0 = T_1 and ξ T_n = (T_{n+1} + T_{n-1}) / 2. The T_n contribution
/// of the top column is dropped, so the product is exact only for
/// inputs of degree below n - 1.
pub fn chebyshev_multiplication_matrix(n: usize) -> Mat<f64> {
    let mut x = Mat::zeros(n, n);
    for col in 0..n {
        if col == 0 {
            if n > 1 {
                x[(1, 0)] = 1.0;
            }
            continue;
        }
        x[(col - 1, col)] = 0.5;
        if col + 1 < n {
            x[(col + 1, col)] = 0.5;
        }
    }
    x
}

/// Forward transform matrix: coefficients = F · values at the Gauss nodes.
///
/// Exact for polynomials of degree below n (discrete orthogonality of
/// T_k at the Gauss-Chebyshev nodes).
pub fn chebyshev_forward_matrix(n: usize) -> Mat<f64> {
    let nodes = chebyshev_gauss_nodes(n);
    let mut f = Mat::zeros(n, n);
    for (k, &x) in nodes.iter().enumerate() {
        let t = chebyshev_t(n.saturating_sub(1), x);
        for (i, &ti) in t.iter().enumerate() {
            let scale = if i == 0 { 1.0 } else { 2.0 };
            f[(i, k)] = scale * ti / n as f64;
        }
    }
    f
}

/// Backward transform matrix: values at the Gauss nodes = B · coefficients.
pub fn chebyshev_backward_matrix(n: usize) -> Mat<f64> {
    let nodes = chebyshev_gauss_nodes(n);
    let mut b = Mat::zeros(n, n);
    for (k, &x) in nodes.iter().enumerate() {
        for (i, ti) in chebyshev_t(n.saturating_sub(1), x).into_iter().enumerate() {
            b[(k, i)] = ti;
        }
    }
    b
}
