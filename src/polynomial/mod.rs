//! Polynomial evaluation and quadrature.
//!
//! This module provides:
//! - Legendre polynomials and Gauss-Legendre nodes/weights (colatitude grid)
//! - Normalised associated Legendre functions (spherical harmonics)
//! - Chebyshev coefficient-space operators and transforms (radial basis)
//! - Orthonormal Jacobi polynomials, Gauss-Jacobi quadrature and connection
//!   matrices (tau polynomials)

mod chebyshev;
mod jacobi;
mod legendre;
mod nodes;

pub use chebyshev::{
    chebyshev_backward_matrix, chebyshev_derivative_matrix, chebyshev_forward_matrix,
    chebyshev_gauss_nodes, chebyshev_multiplication_matrix, chebyshev_t,
};
pub use jacobi::{
    JacobiParams, connection_matrix, gamma, gauss_jacobi, jacobi_orthonormal,
    jacobi_orthonormal_with_derivative,
};
pub use legendre::{legendre_and_derivative, normalized_associated_legendre};
pub use nodes::{gauss_legendre_nodes, gauss_legendre_weights};
