//! Legendre and normalised associated Legendre functions.
//!
//! Legendre polynomials P_n(x) are orthogonal on [-1, 1] with weight 1 and
//! generate the colatitude quadrature. The associated functions P̄_ℓm carry
//! the θ dependence of the spherical harmonics Y_ℓm = P̄_ℓm(cos θ) e^{imφ},
//! normalised so that ∫ |Y_ℓm|² dΩ = 1 (Condon-Shortley phase included).

use std::f64::consts::PI;

/// Evaluate both P_n(x) and P'_n(x) with a single three-term recurrence.
///
/// The recurrence relation is:
/// P_0(x) = 1
/// P_1(x) = x
/// (n+1) P_{n+1}(x) = (2n+1) x P_n(x) - n P_{n-1}(x)
///
/// The derivative uses P'_n(x) = n (x P_n(x) - P_{n-1}(x)) / (x² - 1),
/// with the closed-form endpoint values at x = ±1.
pub fn legendre_and_derivative(n: usize, x: f64) -> (f64, f64) {
    if n == 0 {
        return (1.0, 0.0);
    }
    if n == 1 {
        return (x, 1.0);
    }

    let mut p_prev = 1.0; // P_0
    let mut p_curr = x; // P_1

    for k in 1..n {
        let p_next = ((2 * k + 1) as f64 * x * p_curr - k as f64 * p_prev) / (k + 1) as f64;
        p_prev = p_curr;
        p_curr = p_next;
    }

    let p_n = p_curr;
    let p_n_minus_1 = p_prev;

    let dp_n = if (x - 1.0).abs() < 1e-14 {
        (n * (n + 1)) as f64 / 2.0
    } else if (x + 1.0).abs() < 1e-14 {
        let sign = if n % 2 == 0 { -1.0 } else { 1.0 };
        sign * (n * (n + 1)) as f64 / 2.0
    } else {
        n as f64 * (x * p_n - p_n_minus_1) / (x * x - 1.0)
    };

    (p_n, dp_n)
}

/// Normalised associated Legendre functions of fixed order m.
///
/// Returns `(values, theta_derivatives)` for ℓ = m..=lmax, indexed by ℓ - m,
/// at `x = cos θ`. Recurrences:
///
/// P̄_mm = sqrt(1/4π) Π_{k=1}^{m} ( -sqrt((2k+1)/2k) sin θ )
/// P̄_{m+1,m} = sqrt(2m+3) x P̄_mm
/// P̄_ℓm = a_ℓm (x P̄_{ℓ-1,m} - P̄_{ℓ-2,m} / a_{ℓ-1,m}),  a_ℓm = sqrt((4ℓ²-1)/(ℓ²-m²))
///
/// and dP̄_ℓm/dθ = (ℓ x P̄_ℓm - sqrt((2ℓ+1)/(2ℓ-1) (ℓ²-m²)) P̄_{ℓ-1,m}) / sin θ.
///
/// # Panics
///
/// Panics if `x` is at a pole, where the θ-derivative formula is singular.
/// Gauss-Legendre nodes are always interior.
pub fn normalized_associated_legendre(lmax: usize, m: usize, x: f64) -> (Vec<f64>, Vec<f64>) {
    let sin_theta = (1.0 - x * x).sqrt();
    assert!(sin_theta > 0.0, "associated Legendre derivative is singular at the poles");

    if m > lmax {
        return (Vec::new(), Vec::new());
    }

    let n = lmax - m + 1;
    let mut values = Vec::with_capacity(n);

    let mut p_mm = (0.25 / PI).sqrt();
    for k in 1..=m {
        let kf = k as f64;
        p_mm *= -((2.0 * kf + 1.0) / (2.0 * kf)).sqrt() * sin_theta;
    }
    values.push(p_mm);

    if n > 1 {
        values.push((2.0 * m as f64 + 3.0).sqrt() * x * p_mm);
    }

    let a = |l: usize| -> f64 {
        let (lf, mf) = (l as f64, m as f64);
        ((4.0 * lf * lf - 1.0) / (lf * lf - mf * mf)).sqrt()
    };

    for l in (m + 2)..=lmax {
        let i = l - m;
        let p = a(l) * (x * values[i - 1] - values[i - 2] / a(l - 1));
        values.push(p);
    }

    let mut derivatives = Vec::with_capacity(n);
    for l in m..=lmax {
        let i = l - m;
        let lf = l as f64;
        let lower = if l > m {
            let mf = m as f64;
            ((2.0 * lf + 1.0) / (2.0 * lf - 1.0) * (lf * lf - mf * mf)).sqrt() * values[i - 1]
        } else {
            0.0
        };
        derivatives.push((lf * x * values[i] - lower) / sin_theta);
    }

    (values, derivatives)
}
