//! Tensor rank and support of a field.

use std::fmt;

use super::Boundary;

/// Tensor rank of a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TensorKind {
    /// One component
    Scalar,
    /// Three components
    Vector,
}

impl TensorKind {
    /// Number of stored components.
    #[inline]
    pub fn ncomp(self) -> usize {
        match self {
            TensorKind::Scalar => 1,
            TensorKind::Vector => 3,
        }
    }
}

impl fmt::Display for TensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TensorKind::Scalar => f.write_str("scalar"),
            TensorKind::Vector => f.write_str("vector"),
        }
    }
}

/// Where a field lives: the shell volume or one bounding sphere.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Domain {
    /// Full shell, with a radial expansion
    Volume,
    /// A bounding sphere, angular dependence only
    Surface(Boundary),
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Volume => f.write_str("volume"),
            Domain::Surface(b) => write!(f, "{} surface", b),
        }
    }
}

/// Tensor rank together with the domain: the shape of a variable or
/// equation block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Shape {
    /// Tensor rank
    pub kind: TensorKind,
    /// Support
    pub domain: Domain,
}

impl Shape {
    /// Create a shape.
    pub fn new(kind: TensorKind, domain: Domain) -> Self {
        Self { kind, domain }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.kind, self.domain)
    }
}
