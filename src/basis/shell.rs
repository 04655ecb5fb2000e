//! Distributed spectral basis of the spherical shell.
//!
//! Combines the Chebyshev radial basis with the spherical-harmonic tables of
//! this rank's angular tile. Coefficients are replicated on every rank;
//! grid data covers only the local tile (all radii).
//!
//! Layouts:
//! - coefficients: `((mode * ncomp + comp) * nr + n)`, modes packed by
//!   [`mode_offset`](super::mode_offset)
//! - grid: `((comp * n_phi_local + i) * n_theta_local + j) * nr + k`

use num_complex::Complex64;
use std::f64::consts::PI;
use std::sync::Arc;

use super::radial::RadialBasis;
use super::sphere::{SphereBasis, Spin, mode_offset};
use crate::comm::{CommError, Communicator, ProcessMesh, Tile};
use crate::types::{Degree, Domain, ShellGeometry, TensorKind, Truncation};

const I: Complex64 = Complex64 { re: 0.0, im: 1.0 };

/// Spectral basis of the shell for one rank.
pub struct ShellBasis {
    truncation: Truncation,
    geometry: ShellGeometry,
    radial: RadialBasis,
    sphere: SphereBasis,
    mesh: ProcessMesh,
    tile: Tile,
    comm: Arc<dyn Communicator>,
}

impl ShellBasis {
    /// Build the basis for the calling rank of `comm`.
    ///
    /// Fails if the mesh does not match the communicator or cannot split the
    /// angular grid evenly.
    pub fn new(
        truncation: Truncation,
        geometry: ShellGeometry,
        mesh: ProcessMesh,
        comm: Arc<dyn Communicator>,
    ) -> Result<Self, CommError> {
        mesh.check_size(comm.size())?;
        let tile = mesh.tile(comm.rank(), truncation.n_phi(), truncation.n_theta())?;
        let sphere = SphereBasis::new(truncation.lmax(), tile.phi.clone(), tile.theta.clone());
        let radial = RadialBasis::new(truncation.nmax(), geometry);

        Ok(Self {
            truncation,
            geometry,
            radial,
            sphere,
            mesh,
            tile,
            comm,
        })
    }

    /// Spectral truncation.
    pub fn truncation(&self) -> Truncation {
        self.truncation
    }

    /// Shell geometry.
    pub fn geometry(&self) -> &ShellGeometry {
        &self.geometry
    }

    /// Radial basis.
    pub fn radial(&self) -> &RadialBasis {
        &self.radial
    }

    /// Angular tables of the local tile.
    pub fn sphere(&self) -> &SphereBasis {
        &self.sphere
    }

    /// Process mesh.
    pub fn mesh(&self) -> ProcessMesh {
        self.mesh
    }

    /// Angular tile owned by this rank.
    pub fn tile(&self) -> &Tile {
        &self.tile
    }

    /// Communicator.
    pub fn comm(&self) -> &dyn Communicator {
        self.comm.as_ref()
    }

    /// Shared handle to the communicator.
    pub fn comm_handle(&self) -> Arc<dyn Communicator> {
        Arc::clone(&self.comm)
    }

    /// Radial points of a domain (1 on a surface).
    pub fn radial_size(&self, domain: Domain) -> usize {
        match domain {
            Domain::Volume => self.radial.size(),
            Domain::Surface(_) => 1,
        }
    }

    /// Length of a coefficient buffer.
    pub fn coeff_len(&self, kind: TensorKind, domain: Domain) -> usize {
        self.truncation.n_modes() * kind.ncomp() * self.radial_size(domain)
    }

    /// Length of a local grid buffer.
    pub fn grid_len(&self, kind: TensorKind, domain: Domain) -> usize {
        kind.ncomp() * self.local_points(domain)
    }

    /// Local grid points per component.
    pub fn local_points(&self, domain: Domain) -> usize {
        self.sphere.local_points() * self.radial_size(domain)
    }

    /// Radii of the local grid of a domain.
    pub fn local_radii(&self, domain: Domain) -> Vec<f64> {
        match domain {
            Domain::Volume => self.radial.radii().to_vec(),
            Domain::Surface(b) => vec![self.geometry.radius(b)],
        }
    }

    /// Visit every local grid point as `(index, φ, θ, r)`, in buffer order.
    pub fn for_each_point(&self, domain: Domain, mut f: impl FnMut(usize, f64, f64, f64)) {
        let radii = self.local_radii(domain);
        let mut idx = 0;
        for &phi in self.sphere.phi() {
            for &theta in self.sphere.theta() {
                for &r in &radii {
                    f(idx, phi, theta, r);
                    idx += 1;
                }
            }
        }
    }

    /// Coefficients to grid values.
    pub fn backward(&self, kind: TensorKind, domain: Domain, coeffs: &[Complex64]) -> Vec<f64> {
        let nr = self.radial_size(domain);
        let modal = match domain {
            Domain::Volume => self.map_radial(coeffs, kind.ncomp(), |c| self.radial.to_values(c)),
            Domain::Surface(_) => coeffs.to_vec(),
        };
        self.synthesize(kind, &modal, nr)
    }

    /// Grid values to coefficients, completing the quadrature over all ranks.
    pub fn forward(&self, kind: TensorKind, domain: Domain, grid: &[f64]) -> Result<Vec<Complex64>, CommError> {
        let nr = self.radial_size(domain);
        let mut modal = vec![Complex64::new(0.0, 0.0); self.coeff_len(kind, domain)];
        match kind {
            TensorKind::Scalar => self.sphere.analyze_scalar(grid, nr, &mut modal, 1, 0),
            TensorKind::Vector => self.sphere.analyze_vector(grid, nr, &mut modal),
        }
        self.all_reduce(&mut modal)?;

        Ok(match domain {
            Domain::Volume => self.map_radial(&modal, kind.ncomp(), |v| self.radial.to_coeffs(v)),
            Domain::Surface(_) => modal,
        })
    }

    /// Gradient of a volume scalar, evaluated on the local grid.
    ///
    /// Per mode: (∇f)_0 = f', (∇f)_± = ∓κ f / r with κ = √(ℓ(ℓ+1)/2).
    pub fn gradient_grid(&self, coeffs: &[Complex64]) -> Vec<f64> {
        let nr = self.radial.size();
        let radii = self.radial.radii();
        let mut modal = vec![Complex64::new(0.0, 0.0); self.coeff_len(TensorKind::Vector, Domain::Volume)];

        for mode in self.truncation.modes() {
            let (m, ell) = (mode.m.get(), mode.ell.get());
            let offset = mode_offset(m, ell);
            let slice = &coeffs[offset * nr..(offset + 1) * nr];
            let values = self.radial.to_values(slice);
            let derivative = self.radial.derivative_values(slice);
            let kappa = Degree::new(ell).kappa();

            let out = &mut modal[offset * 3 * nr..(offset + 1) * 3 * nr];
            for k in 0..nr {
                out[Spin::Minus.index() * nr + k] = values[k] * (kappa / radii[k]);
                out[Spin::Plus.index() * nr + k] = values[k] * (-kappa / radii[k]);
                out[Spin::Zero.index() * nr + k] = derivative[k];
            }
        }

        self.synthesize(TensorKind::Vector, &modal, nr)
    }

    /// Curl of a volume vector, evaluated on the local grid.
    ///
    /// Per mode, with a the spin components:
    /// - (∇×a)_0 = -iκ (a⁺ + a⁻) / r
    /// - (∇×a)_+ = i [ (r a⁺)' + κ a⁰ ] / r
    /// - (∇×a)_- = -i [ (r a⁻)' - κ a⁰ ] / r
    pub fn curl_grid(&self, coeffs: &[Complex64]) -> Vec<f64> {
        let nr = self.radial.size();
        let radii = self.radial.radii();
        let mut modal = vec![Complex64::new(0.0, 0.0); coeffs.len()];
        let (im, ip, i0) = (Spin::Minus.index(), Spin::Plus.index(), Spin::Zero.index());

        for mode in self.truncation.modes() {
            let offset = mode_offset(mode.m.get(), mode.ell.get());
            let kappa = mode.ell.kappa();
            let component = |c: usize| {
                let start = (offset * 3 + c) * nr;
                let slice = &coeffs[start..start + nr];
                (self.radial.to_values(slice), self.radial.derivative_values(slice))
            };
            let (vm, dm) = component(im);
            let (vp, dp) = component(ip);
            let (v0, _) = component(i0);

            let out = &mut modal[offset * 3 * nr..(offset + 1) * 3 * nr];
            for k in 0..nr {
                let r = radii[k];
                out[i0 * nr + k] = -I * kappa * (vp[k] + vm[k]) / r;
                out[ip * nr + k] = I * (vp[k] + dp[k] * r + v0[k] * kappa) / r;
                out[im * nr + k] = -I * (vm[k] + dm[k] * r - v0[k] * kappa) / r;
            }
        }

        self.synthesize(TensorKind::Vector, &modal, nr)
    }

    /// Local volume quadrature weights w_r r² w_θ (2π/N_φ), one per scalar
    /// grid point.
    pub fn volume_weights(&self) -> Vec<f64> {
        let radii = self.radial.radii();
        let w_r = self.radial.quadrature_weights();
        let w_phi = 2.0 * PI / self.sphere.n_phi() as f64;
        let mut weights = Vec::with_capacity(self.local_points(Domain::Volume));
        for _ in self.sphere.phi() {
            for &w_theta in self.sphere.weights() {
                for (&r, &wr) in radii.iter().zip(&w_r) {
                    weights.push(wr * r * r * w_theta * w_phi);
                }
            }
        }
        weights
    }

    fn synthesize(&self, kind: TensorKind, modal: &[Complex64], nr: usize) -> Vec<f64> {
        let mut grid = vec![0.0; kind.ncomp() * self.sphere.local_points() * nr];
        match kind {
            TensorKind::Scalar => self.sphere.synthesize_scalar(modal, 1, 0, nr, &mut grid),
            TensorKind::Vector => self.sphere.synthesize_vector(modal, nr, &mut grid),
        }
        grid
    }

    fn map_radial(
        &self,
        data: &[Complex64],
        ncomp: usize,
        f: impl Fn(&[Complex64]) -> Vec<Complex64>,
    ) -> Vec<Complex64> {
        let nr = self.radial.size();
        let mut out = Vec::with_capacity(data.len());
        for chunk in data.chunks(nr) {
            out.extend(f(chunk));
        }
        debug_assert_eq!(out.len(), self.truncation.n_modes() * ncomp * nr);
        out
    }

    fn all_reduce(&self, modal: &mut [Complex64]) -> Result<(), CommError> {
        if self.comm.size() == 1 {
            return Ok(());
        }
        let mut flat: Vec<f64> = modal.iter().flat_map(|c| [c.re, c.im]).collect();
        self.comm.sum_in_place(&mut flat)?;
        for (c, pair) in modal.iter_mut().zip(flat.chunks_exact(2)) {
            *c = Complex64::new(pair[0], pair[1]);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::SingleProcess;
    use approx::assert_relative_eq;

    fn basis(lmax: usize, nmax: usize) -> ShellBasis {
        ShellBasis::new(
            Truncation::new(lmax, nmax),
            ShellGeometry::default(),
            ProcessMesh::single(),
            Arc::new(SingleProcess),
        )
        .unwrap()
    }

    #[test]
    fn test_scalar_volume_round_trip() {
        let basis = basis(4, 6);
        let mut grid = vec![0.0; basis.grid_len(TensorKind::Scalar, Domain::Volume)];
        basis.for_each_point(Domain::Volume, |idx, phi, theta, r| {
            grid[idx] = r * r * theta.cos() + r * theta.sin() * theta.sin() * (2.0 * phi).sin();
        });
        let coeffs = basis.forward(TensorKind::Scalar, Domain::Volume, &grid).unwrap();
        let back = basis.backward(TensorKind::Scalar, Domain::Volume, &coeffs);
        for (a, b) in grid.iter().zip(&back) {
            assert_relative_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_gradient_of_r_cos_theta() {
        // f = r² cosθ: ∇f = (2r cosθ) r̂ - r sinθ θ̂
        let basis = basis(3, 5);
        let mut grid = vec![0.0; basis.grid_len(TensorKind::Scalar, Domain::Volume)];
        basis.for_each_point(Domain::Volume, |idx, _, theta, r| grid[idx] = r * r * theta.cos());
        let coeffs = basis.forward(TensorKind::Scalar, Domain::Volume, &grid).unwrap();
        let grad = basis.gradient_grid(&coeffs);

        let n = basis.local_points(Domain::Volume);
        basis.for_each_point(Domain::Volume, |idx, _, theta, r| {
            assert_relative_eq!(grad[idx], 0.0, epsilon = 1e-12);
            assert_relative_eq!(grad[n + idx], -r * theta.sin(), epsilon = 1e-12);
            assert_relative_eq!(grad[2 * n + idx], 2.0 * r * theta.cos(), epsilon = 1e-12);
        });
    }

    #[test]
    fn test_curl_of_solid_body_rotation() {
        // u = r sinθ φ̂ (rotation about z): ∇×u = 2 ẑ = 2cosθ r̂ - 2sinθ θ̂
        let basis = basis(3, 5);
        let n = basis.local_points(Domain::Volume);
        let mut grid = vec![0.0; basis.grid_len(TensorKind::Vector, Domain::Volume)];
        basis.for_each_point(Domain::Volume, |idx, _, theta, r| grid[idx] = r * theta.sin());
        let coeffs = basis.forward(TensorKind::Vector, Domain::Volume, &grid).unwrap();
        let curl = basis.curl_grid(&coeffs);

        basis.for_each_point(Domain::Volume, |idx, _, theta, _| {
            assert_relative_eq!(curl[idx], 0.0, epsilon = 1e-11);
            assert_relative_eq!(curl[n + idx], -2.0 * theta.sin(), epsilon = 1e-11);
            assert_relative_eq!(curl[2 * n + idx], 2.0 * theta.cos(), epsilon = 1e-11);
        });
    }

    #[test]
    fn test_volume_weights_are_close_to_volume() {
        let basis = basis(7, 15);
        let total: f64 = basis.volume_weights().iter().sum();
        let exact = basis.geometry().volume();
        assert!((total - exact).abs() / exact < 0.05);
        assert!(total != exact);
    }
}
