//! Coefficient-space operator matrices.
//!
//! This module provides:
//! - radial operator matrices in the Chebyshev basis (`RadialOperators`)
//! - per-degree blocks of the symbolic linear operators (`operator_blocks`)
//! - assembly of the mass and stiffness matrices of one degree (`assemble_subproblem`)

mod assembly;
mod radial;
mod spectral;

pub use assembly::assemble_subproblem;
pub(crate) use radial::matmul;
pub use radial::{MAX_DERIVATIVE, MAX_R_POWER, RadialOperators};
pub use spectral::{ComponentBlock, operator_blocks};
