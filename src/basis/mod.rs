//! Spectral bases of the spherical shell.
//!
//! This module provides:
//! - [`RadialBasis`]: Chebyshev expansion in radius with Gauss-Chebyshev grid
//! - [`SphereBasis`]: scalar and spin-weighted spherical harmonics on an
//!   angular tile
//! - [`ShellBasis`]: the distributed product basis used by fields and solvers

mod radial;
mod shell;
mod sphere;

pub use radial::RadialBasis;
pub(crate) use radial::apply;
pub use shell::ShellBasis;
pub use sphere::{SphereBasis, Spin, grid_component, mode_offset};
