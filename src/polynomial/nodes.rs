//! Gauss-Legendre nodes and weights.
//!
//! The n Gauss-Legendre nodes are the roots of P_n(x). They integrate
//! polynomials of degree 2n-1 exactly and serve as the colatitude grid
//! (x = cos θ) of the sphere.

use super::legendre::legendre_and_derivative;
use std::f64::consts::PI;

/// Compute the n Gauss-Legendre nodes, in ascending order.
///
/// Uses Newton iteration on P_n starting from the Tricomi estimate
/// x_j ≈ -cos(π (j + 3/4) / (n + 1/2)).
pub fn gauss_legendre_nodes(n: usize) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }

    let mut nodes = Vec::with_capacity(n);
    for j in 0..n {
        let mut x = -(PI * (j as f64 + 0.75) / (n as f64 + 0.5)).cos();

        for _ in 0..100 {
            let (p_n, dp_n) = legendre_and_derivative(n, x);
            let update = p_n / dp_n;
            x -= update;
            if update.abs() < 1e-15 {
                break;
            }
        }

        nodes.push(x);
    }

    nodes
}

/// Compute Gauss-Legendre weights for the given nodes.
///
/// The weights are: w_j = 2 / ((1 - x_j²) [P'_n(x_j)]²)
pub fn gauss_legendre_weights(nodes: &[f64]) -> Vec<f64> {
    let n = nodes.len();
    nodes
        .iter()
        .map(|&x| {
            let (_, dp) = legendre_and_derivative(n, x);
            2.0 / ((1.0 - x * x) * dp * dp)
        })
        .collect()
}
