//! Fields over the shell with paired grid and coefficient buffers.
//!
//! A [`Field`] stores the local grid tile and the full coefficient set of a
//! scalar or vector quantity. The [`Layout`] tag records which buffer is
//! authoritative; `require_grid` / `require_coeff` bring the other one up to
//! date through the basis. Mutable access to one buffer marks the other stale.

use num_complex::Complex64;

use crate::basis::{ShellBasis, mode_offset};
use crate::comm::CommError;
use crate::types::{Domain, Mode, Shape, TensorKind};

/// Which buffer of a field holds current data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layout {
    /// Grid values are current; coefficients are stale
    Grid,
    /// Coefficients are current; grid values are stale
    Coeff,
    /// Both buffers agree
    Both,
}

/// A scalar or vector field on the shell volume or on a bounding sphere.
#[derive(Clone, Debug)]
pub struct Field {
    name: String,
    shape: Shape,
    lmax: usize,
    nr: usize,
    grid: Vec<f64>,
    coeffs: Vec<Complex64>,
    layout: Layout,
}

impl Field {
    /// Create a zero field.
    pub fn new(name: impl Into<String>, kind: TensorKind, domain: Domain, basis: &ShellBasis) -> Self {
        Self {
            name: name.into(),
            shape: Shape::new(kind, domain),
            lmax: basis.truncation().lmax(),
            nr: basis.radial_size(domain),
            grid: vec![0.0; basis.grid_len(kind, domain)],
            coeffs: vec![Complex64::new(0.0, 0.0); basis.coeff_len(kind, domain)],
            layout: Layout::Both,
        }
    }

    /// Create a field from a pointwise function of (φ, θ, r) returning the
    /// grid components: one value for scalars, (φ, θ, r) for vectors.
    pub fn from_fn(
        name: impl Into<String>,
        kind: TensorKind,
        domain: Domain,
        basis: &ShellBasis,
        f: impl Fn(f64, f64, f64) -> [f64; 3],
    ) -> Self {
        let mut field = Self::new(name, kind, domain, basis);
        let n = basis.local_points(domain);
        let ncomp = kind.ncomp();
        let grid = field.grid_mut();
        basis.for_each_point(domain, |idx, phi, theta, r| {
            let values = f(phi, theta, r);
            for (c, &v) in values.iter().take(ncomp).enumerate() {
                grid[c * n + idx] = v;
            }
        });
        field
    }

    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tensor rank and domain.
    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// Tensor rank.
    pub fn kind(&self) -> TensorKind {
        self.shape.kind
    }

    /// Support of the field.
    pub fn domain(&self) -> Domain {
        self.shape.domain
    }

    /// Current layout tag.
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Radial coefficients per mode and component (1 on a surface).
    pub fn radial_size(&self) -> usize {
        self.nr
    }

    /// Grid values. The grid must be current.
    pub fn grid(&self) -> &[f64] {
        debug_assert!(self.layout != Layout::Coeff, "{}: grid is stale", self.name);
        &self.grid
    }

    /// Mutable grid values; marks the coefficients stale.
    pub fn grid_mut(&mut self) -> &mut [f64] {
        self.layout = Layout::Grid;
        &mut self.grid
    }

    /// Coefficients. They must be current.
    pub fn coeffs(&self) -> &[Complex64] {
        debug_assert!(self.layout != Layout::Grid, "{}: coefficients are stale", self.name);
        &self.coeffs
    }

    /// Mutable coefficients; marks the grid stale.
    pub fn coeffs_mut(&mut self) -> &mut [Complex64] {
        self.layout = Layout::Coeff;
        &mut self.coeffs
    }

    /// Coefficients of one mode and component (`nr` entries).
    pub fn mode_coeffs(&self, mode: Mode, comp: usize) -> &[Complex64] {
        let start = self.mode_start(mode, comp);
        &self.coeffs()[start..start + self.nr]
    }

    /// Mutable coefficients of one mode and component; marks the grid stale.
    pub fn mode_coeffs_mut(&mut self, mode: Mode, comp: usize) -> &mut [Complex64] {
        let start = self.mode_start(mode, comp);
        let nr = self.nr;
        &mut self.coeffs_mut()[start..start + nr]
    }

    fn mode_start(&self, mode: Mode, comp: usize) -> usize {
        let ncomp = self.kind().ncomp();
        (mode_offset(mode.m.get(), mode.ell.get()) * ncomp + comp) * self.nr
    }

    /// Make the grid current.
    pub fn require_grid(&mut self, basis: &ShellBasis) {
        if self.layout == Layout::Coeff {
            self.grid = basis.backward(self.kind(), self.domain(), &self.coeffs);
            self.layout = Layout::Both;
        }
    }

    /// Make the coefficients current. Collective: every rank must call it.
    pub fn require_coeff(&mut self, basis: &ShellBasis) -> Result<(), CommError> {
        if self.layout == Layout::Grid {
            self.coeffs = basis.forward(self.kind(), self.domain(), &self.grid)?;
            self.layout = Layout::Both;
        }
        Ok(())
    }

    /// Push the field through grid space and back.
    ///
    /// Synthesis keeps only the conjugate-symmetric part of the m = 0
    /// coefficients, so this restores the reality constraint after rounding
    /// drift. Collective.
    pub fn enforce_hermitian(&mut self, basis: &ShellBasis) -> Result<(), CommError> {
        self.require_grid(basis);
        self.layout = Layout::Grid;
        self.require_coeff(basis)
    }

    /// Largest violation of the m = 0 reality constraint: imaginary parts of
    /// scalar components and |a⁻ + conj(a⁺)| for vector spin components.
    pub fn hermitian_defect(&self) -> f64 {
        let coeffs = self.coeffs();
        let ncomp = self.kind().ncomp();
        let mut defect: f64 = 0.0;
        for ell in 0..=self.lmax {
            let base = mode_offset(0, ell) * ncomp * self.nr;
            for k in 0..self.nr {
                match self.kind() {
                    TensorKind::Scalar => defect = defect.max(coeffs[base + k].im.abs()),
                    TensorKind::Vector => {
                        let minus = coeffs[base + k];
                        let plus = coeffs[base + self.nr + k];
                        let zero = coeffs[base + 2 * self.nr + k];
                        defect = defect.max((minus + plus.conj()).norm()).max(zero.im.abs());
                    }
                }
            }
        }
        defect
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::{ProcessMesh, SingleProcess};
    use crate::types::{Boundary, ShellGeometry, Truncation};
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn basis() -> ShellBasis {
        ShellBasis::new(
            Truncation::new(5, 6),
            ShellGeometry::default(),
            ProcessMesh::single(),
            Arc::new(SingleProcess),
        )
        .unwrap()
    }

    #[test]
    fn test_layout_transitions() {
        let basis = basis();
        let mut field = Field::from_fn("T", TensorKind::Scalar, Domain::Volume, &basis, |_, theta, r| {
            [r * theta.cos(), 0.0, 0.0]
        });
        assert_eq!(field.layout(), Layout::Grid);
        field.require_coeff(&basis).unwrap();
        assert_eq!(field.layout(), Layout::Both);
        field.coeffs_mut()[0] = Complex64::new(1.0, 0.0);
        assert_eq!(field.layout(), Layout::Coeff);
        field.require_grid(&basis);
        assert_eq!(field.layout(), Layout::Both);
    }

    #[test]
    fn test_surface_field_constant() {
        let basis = basis();
        let mut field = Field::from_fn(
            "T_inner",
            TensorKind::Scalar,
            Domain::Surface(Boundary::Inner),
            &basis,
            |_, _, _| [1.0, 0.0, 0.0],
        );
        field.require_coeff(&basis).unwrap();
        assert_eq!(field.radial_size(), 1);
        // 1 = √(4π) Y_00
        let c00 = field.mode_coeffs(Mode::new(0, 0), 0)[0];
        assert_relative_eq!(c00.re, (4.0 * std::f64::consts::PI).sqrt(), epsilon = 1e-12);
        assert_relative_eq!(c00.im, 0.0, epsilon = 1e-14);
    }

    #[test]
    fn test_enforce_hermitian_restores_symmetry() {
        let basis = basis();
        let mut u = Field::new("u", TensorKind::Vector, Domain::Volume, &basis);
        let mode = Mode::new(0, 2);
        u.mode_coeffs_mut(mode, 1)[0] = Complex64::new(0.5, 0.25);
        u.mode_coeffs_mut(mode, 0)[0] = Complex64::new(-0.5, 0.25 + 1e-3);
        u.mode_coeffs_mut(mode, 2)[1] = Complex64::new(0.1, 2e-3);
        assert!(u.hermitian_defect() > 5e-4);

        u.enforce_hermitian(&basis).unwrap();
        assert!(u.hermitian_defect() < 1e-13);
        // the symmetric part survives
        assert_relative_eq!(u.mode_coeffs(mode, 1)[0].re, 0.5, epsilon = 1e-12);
        assert_relative_eq!(u.mode_coeffs(mode, 2)[1].re, 0.1, epsilon = 1e-12);
    }
}
