//! Shell boundaries with named fields.
//!
//! The shell has exactly two bounding spheres. Naming them avoids the
//! "which end is index 0" question in boundary-condition and tau code.

use std::fmt;

/// One of the two bounding spheres of the shell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Boundary {
    /// r = r_inner (Chebyshev ξ = -1)
    Inner,
    /// r = r_outer (Chebyshev ξ = +1)
    Outer,
}

impl Boundary {
    /// Both boundaries, inner first.
    pub const ALL: [Boundary; 2] = [Boundary::Inner, Boundary::Outer];

    /// Chebyshev coordinate of the boundary.
    #[inline]
    pub fn xi(self) -> f64 {
        match self {
            Boundary::Inner => -1.0,
            Boundary::Outer => 1.0,
        }
    }

    /// Short lowercase name used in variable names (`tau_T_inner`).
    pub fn name(self) -> &'static str {
        match self {
            Boundary::Inner => "inner",
            Boundary::Outer => "outer",
        }
    }
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A value attached to each shell boundary.
///
/// # Example
///
/// ```
/// use shellconv::types::{Boundary, BoundaryPair};
///
/// let temps = BoundaryPair::new(1.0, 0.0);
/// assert_eq!(*temps.get(Boundary::Inner), 1.0);
/// assert_eq!(*temps.get(Boundary::Outer), 0.0);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct BoundaryPair<T> {
    /// Value at the inner sphere
    pub inner: T,
    /// Value at the outer sphere
    pub outer: T,
}

impl<T> BoundaryPair<T> {
    /// Create a pair with explicit named values.
    pub fn new(inner: T, outer: T) -> Self {
        Self { inner, outer }
    }

    /// Value at a boundary.
    pub fn get(&self, boundary: Boundary) -> &T {
        match boundary {
            Boundary::Inner => &self.inner,
            Boundary::Outer => &self.outer,
        }
    }

    /// Map a function over both boundaries.
    pub fn map<U, F>(self, mut f: F) -> BoundaryPair<U>
    where
        F: FnMut(T) -> U,
    {
        BoundaryPair {
            inner: f(self.inner),
            outer: f(self.outer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_xi() {
        assert_eq!(Boundary::Inner.xi(), -1.0);
        assert_eq!(Boundary::Outer.xi(), 1.0);
    }

    #[test]
    fn test_pair_map() {
        let pair = BoundaryPair::new(2, 3).map(|v| v * 10);
        assert_eq!(pair.inner, 20);
        assert_eq!(*pair.get(Boundary::Outer), 30);
    }
}
