//! Spherical-harmonic transforms on a tile of the angular grid.
//!
//! Scalars expand in Y_ℓm = P̄_ℓm(cos θ) e^{imφ}. Vectors are expanded by
//! spin components
//!
//! u_± = (u_θ ± i u_φ) / √2,   u_0 = u_r,
//!
//! where u_± expands in the spin-weighted harmonics ±Y_ℓm = S±_ℓm(θ) e^{imφ}:
//!
//! S+_ℓm = -(dP̄_ℓm/dθ - m P̄_ℓm / sin θ) / √(ℓ(ℓ+1))
//! S-_ℓm =  (dP̄_ℓm/dθ + m P̄_ℓm / sin θ) / √(ℓ(ℓ+1))
//!
//! Only m ≥ 0 is stored. For real fields the negative orders follow from
//! conjugate symmetry: the scalar coefficient at -m is (-1)^m conj(c_ℓm), and
//! conj(u_+) = u_- links the two spin components. At m = 0 this requires
//! real scalar coefficients and a⁻ = -conj(a⁺); synthesis projects onto that
//! constraint, so a backward-forward round trip restores it.
//!
//! Analysis sums only over the local tile; the caller completes the
//! quadrature with a global reduction.

use num_complex::Complex64;
use std::f64::consts::{PI, SQRT_2};
use std::ops::Range;

use crate::polynomial::{gauss_legendre_nodes, gauss_legendre_weights, normalized_associated_legendre};

const ZERO: Complex64 = Complex64 { re: 0.0, im: 0.0 };

/// Spin component of a vector in coefficient space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Spin {
    /// (u_θ - i u_φ)/√2
    Minus,
    /// (u_θ + i u_φ)/√2
    Plus,
    /// u_r
    Zero,
}

impl Spin {
    /// All spins in storage order.
    pub const ALL: [Spin; 3] = [Spin::Minus, Spin::Plus, Spin::Zero];

    /// Storage index of the component.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Spin::Minus => 0,
            Spin::Plus => 1,
            Spin::Zero => 2,
        }
    }
}

/// Grid component indices of a vector: (φ, θ, r).
pub mod grid_component {
    /// Azimuthal component
    pub const PHI: usize = 0;
    /// Colatitudinal component
    pub const THETA: usize = 1;
    /// Radial component
    pub const R: usize = 2;
}

/// Packed position of mode (m, ℓ).
#[inline]
pub fn mode_offset(m: usize, ell: usize) -> usize {
    ell * (ell + 1) / 2 + m
}

struct ThetaTable {
    // [m][ℓ - m]
    scalar: Vec<Vec<f64>>,
    plus: Vec<Vec<f64>>,
    minus: Vec<Vec<f64>>,
}

/// Harmonic tables and quadrature for the local angular tile.
pub struct SphereBasis {
    lmax: usize,
    n_phi: usize,
    phi: Vec<f64>,
    theta: Vec<f64>,
    weights: Vec<f64>,
    // [i][m] = e^{imφ_i}
    phase: Vec<Vec<Complex64>>,
    tables: Vec<ThetaTable>,
}

impl SphereBasis {
    /// Build tables for the tile `phi_range × theta_range` of the
    /// `2(lmax+1) × (lmax+1)` grid. Colatitudes ascend from the north pole.
    pub fn new(lmax: usize, phi_range: Range<usize>, theta_range: Range<usize>) -> Self {
        let n_phi = 2 * (lmax + 1);
        let n_theta = lmax + 1;

        // Gauss-Legendre nodes ascend in cos θ; reverse for ascending θ
        let x_nodes = gauss_legendre_nodes(n_theta);
        let x_weights = gauss_legendre_weights(&x_nodes);
        let global_x: Vec<f64> = x_nodes.iter().rev().copied().collect();
        let global_w: Vec<f64> = x_weights.iter().rev().copied().collect();

        let phi: Vec<f64> = phi_range
            .clone()
            .map(|i| 2.0 * PI * i as f64 / n_phi as f64)
            .collect();
        let phase = phi
            .iter()
            .map(|&p| {
                (0..=lmax)
                    .map(|m| Complex64::from_polar(1.0, m as f64 * p))
                    .collect()
            })
            .collect();

        let mut theta = Vec::with_capacity(theta_range.len());
        let mut weights = Vec::with_capacity(theta_range.len());
        let mut tables = Vec::with_capacity(theta_range.len());
        for j in theta_range {
            let x = global_x[j];
            theta.push(x.acos());
            weights.push(global_w[j]);
            tables.push(theta_table(lmax, x));
        }

        Self {
            lmax,
            n_phi,
            phi,
            theta,
            weights,
            phase,
            tables,
        }
    }

    /// Maximum degree.
    pub fn lmax(&self) -> usize {
        self.lmax
    }

    /// Global number of longitudes.
    pub fn n_phi(&self) -> usize {
        self.n_phi
    }

    /// Local longitudes.
    pub fn phi(&self) -> &[f64] {
        &self.phi
    }

    /// Local colatitudes.
    pub fn theta(&self) -> &[f64] {
        &self.theta
    }

    /// Gauss-Legendre weights (in cos θ) of the local colatitudes.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Number of local angular points.
    pub fn local_points(&self) -> usize {
        self.phi.len() * self.theta.len()
    }

    /// Synthesise one scalar component on the local tile.
    ///
    /// `modal` holds `ncomp` components of `nr` radial values per mode;
    /// `out` receives `n_phi_local × n_theta_local × nr` values.
    pub fn synthesize_scalar(&self, modal: &[Complex64], ncomp: usize, comp: usize, nr: usize, out: &mut [f64]) {
        let nt = self.theta.len();
        let mut g = vec![ZERO; (self.lmax + 1) * nr];

        for (j, table) in self.tables.iter().enumerate() {
            g.fill(ZERO);
            for m in 0..=self.lmax {
                for ell in m..=self.lmax {
                    let p = table.scalar[m][ell - m];
                    let base = (mode_offset(m, ell) * ncomp + comp) * nr;
                    for k in 0..nr {
                        g[m * nr + k] += modal[base + k] * p;
                    }
                }
            }

            for (i, phase) in self.phase.iter().enumerate() {
                for k in 0..nr {
                    let mut value = g[k].re;
                    for m in 1..=self.lmax {
                        value += 2.0 * (g[m * nr + k] * phase[m]).re;
                    }
                    out[(i * nt + j) * nr + k] = value;
                }
            }
        }
    }

    /// Synthesise a vector (spin components Minus, Plus, Zero) into grid
    /// components (φ, θ, r). `out` holds the three components back to back.
    pub fn synthesize_vector(&self, modal: &[Complex64], nr: usize, out: &mut [f64]) {
        let nt = self.theta.len();
        let block = self.local_points() * nr;
        let (minus, plus) = (Spin::Minus.index(), Spin::Plus.index());
        let mut a = vec![ZERO; (self.lmax + 1) * nr];
        let mut b = vec![ZERO; (self.lmax + 1) * nr];

        for (j, table) in self.tables.iter().enumerate() {
            a.fill(ZERO);
            b.fill(ZERO);
            for m in 0..=self.lmax {
                for ell in m.max(1)..=self.lmax {
                    let (sp, sm) = (table.plus[m][ell - m], table.minus[m][ell - m]);
                    let mode = mode_offset(m, ell);
                    let base_p = (mode * 3 + plus) * nr;
                    let base_m = (mode * 3 + minus) * nr;
                    for k in 0..nr {
                        a[m * nr + k] += modal[base_p + k] * sp;
                        b[m * nr + k] += modal[base_m + k] * sm;
                    }
                }
            }

            for (i, phase) in self.phase.iter().enumerate() {
                for k in 0..nr {
                    let mut u_plus = 0.5 * (a[k] + b[k].conj());
                    for m in 1..=self.lmax {
                        let e = phase[m];
                        u_plus += a[m * nr + k] * e + (b[m * nr + k] * e).conj();
                    }
                    let idx = (i * nt + j) * nr + k;
                    out[grid_component::THETA * block + idx] = SQRT_2 * u_plus.re;
                    out[grid_component::PHI * block + idx] = SQRT_2 * u_plus.im;
                }
            }
        }

        let radial = &mut out[grid_component::R * block..(grid_component::R + 1) * block];
        self.synthesize_scalar(modal, 3, Spin::Zero.index(), nr, radial);
    }

    /// Accumulate the local quadrature of one scalar grid component into
    /// component `comp` of `modal`.
    pub fn analyze_scalar(&self, grid: &[f64], nr: usize, modal: &mut [Complex64], ncomp: usize, comp: usize) {
        let nt = self.theta.len();
        let scale = 1.0 / self.n_phi as f64;
        let mut f = vec![ZERO; (self.lmax + 1) * nr];

        for (j, table) in self.tables.iter().enumerate() {
            f.fill(ZERO);
            for (i, phase) in self.phase.iter().enumerate() {
                for k in 0..nr {
                    let value = grid[(i * nt + j) * nr + k] * scale;
                    for m in 0..=self.lmax {
                        f[m * nr + k] += phase[m].conj() * value;
                    }
                }
            }

            let w = 2.0 * PI * self.weights[j];
            for m in 0..=self.lmax {
                for ell in m..=self.lmax {
                    let p = w * table.scalar[m][ell - m];
                    let base = (mode_offset(m, ell) * ncomp + comp) * nr;
                    for k in 0..nr {
                        modal[base + k] += f[m * nr + k] * p;
                    }
                }
            }
        }
    }

    /// Accumulate the local quadrature of a grid vector (φ, θ, r) into spin
    /// components.
    pub fn analyze_vector(&self, grid: &[f64], nr: usize, modal: &mut [Complex64]) {
        let nt = self.theta.len();
        let block = self.local_points() * nr;
        let scale = 1.0 / self.n_phi as f64;
        let (minus, plus) = (Spin::Minus.index(), Spin::Plus.index());
        let mut fp = vec![ZERO; (self.lmax + 1) * nr];
        let mut fm = vec![ZERO; (self.lmax + 1) * nr];

        for (j, table) in self.tables.iter().enumerate() {
            fp.fill(ZERO);
            fm.fill(ZERO);
            for (i, phase) in self.phase.iter().enumerate() {
                for k in 0..nr {
                    let idx = (i * nt + j) * nr + k;
                    let u_plus = Complex64::new(
                        grid[grid_component::THETA * block + idx],
                        grid[grid_component::PHI * block + idx],
                    ) * (scale / SQRT_2);
                    for m in 0..=self.lmax {
                        fp[m * nr + k] += u_plus * phase[m].conj();
                        // u_- = conj(u_+): its e^{-imφ} projection is the
                        // conjugate of u_+'s e^{+imφ} projection
                        fm[m * nr + k] += (u_plus * phase[m]).conj();
                    }
                }
            }

            let w = 2.0 * PI * self.weights[j];
            for m in 0..=self.lmax {
                for ell in m.max(1)..=self.lmax {
                    let (sp, sm) = (w * table.plus[m][ell - m], w * table.minus[m][ell - m]);
                    let mode = mode_offset(m, ell);
                    let base_p = (mode * 3 + plus) * nr;
                    let base_m = (mode * 3 + minus) * nr;
                    for k in 0..nr {
                        modal[base_p + k] += fp[m * nr + k] * sp;
                        modal[base_m + k] += fm[m * nr + k] * sm;
                    }
                }
            }
        }

        let radial = &grid[grid_component::R * block..(grid_component::R + 1) * block];
        self.analyze_scalar(radial, nr, modal, 3, Spin::Zero.index());
    }
}

fn theta_table(lmax: usize, x: f64) -> ThetaTable {
    let sin_theta = (1.0 - x * x).sqrt();
    let mut scalar = Vec::with_capacity(lmax + 1);
    let mut plus = Vec::with_capacity(lmax + 1);
    let mut minus = Vec::with_capacity(lmax + 1);

    for m in 0..=lmax {
        let (p, dp) = normalized_associated_legendre(lmax, m, x);
        let mf = m as f64;
        let mut sp = Vec::with_capacity(p.len());
        let mut sm = Vec::with_capacity(p.len());
        for (i, (&pv, &dv)) in p.iter().zip(&dp).enumerate() {
            let ell = m + i;
            if ell == 0 {
                sp.push(0.0);
                sm.push(0.0);
                continue;
            }
            let norm = ((ell * (ell + 1)) as f64).sqrt();
            sp.push(-(dv - mf * pv / sin_theta) / norm);
            sm.push((dv + mf * pv / sin_theta) / norm);
        }
        scalar.push(p);
        plus.push(sp);
        minus.push(sm);
    }

    ThetaTable {
        scalar,
        plus,
        minus,
    }
}
