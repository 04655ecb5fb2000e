//! Strongly-typed domain types for safer APIs.
//!
//! This module provides newtypes and structured types to make APIs
//! self-documenting and prevent parameter mix-ups.
//!
//! # Example
//!
//! ```
//! use shellconv::types::{Boundary, Degree, ShellGeometry, Truncation};
//!
//! let trunc = Truncation::new(15, 15);
//! let shell = ShellGeometry::default();
//!
//! assert_eq!(trunc.n_phi(), 32);
//! assert!(shell.radius(Boundary::Inner) < shell.radius(Boundary::Outer));
//! assert_eq!(Degree::new(1).eigenvalue(), 2.0);
//! ```

mod indices;
mod physical;
mod resolution;
mod sides;
mod tensor;

pub use indices::{Degree, Mode, Order};
pub use physical::ShellGeometry;
pub use resolution::Truncation;
pub use sides::{Boundary, BoundaryPair};
pub use tensor::{Domain, Shape, TensorKind};
