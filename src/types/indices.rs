//! Strongly-typed spherical-harmonic index newtypes.
//!
//! Angular degree ℓ and azimuthal order m are both small unsigned integers;
//! keeping them as distinct types prevents passing one where the other is
//! expected (the classic `(l, m)` vs `(m, l)` argument swap).

use std::fmt;

/// Macro to generate index newtypes with common functionality.
macro_rules! define_index {
    (
        $(#[$meta:meta])*
        $name:ident, $display_prefix:literal
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(transparent)]
        pub struct $name(usize);

        impl $name {
            /// Create a new index.
            #[inline]
            pub const fn new(index: usize) -> Self {
                Self(index)
            }

            /// Get the raw index value.
            #[inline]
            pub const fn get(self) -> usize {
                self.0
            }

            /// Index value as a float, for use in operator coefficients.
            #[inline]
            pub fn as_f64(self) -> f64 {
                self.0 as f64
            }

            /// First index (0).
            pub const ZERO: Self = Self(0);

            /// Whether this is the zero index.
            #[inline]
            pub const fn is_zero(self) -> bool {
                self.0 == 0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $display_prefix, self.0)
            }
        }

        impl From<usize> for $name {
            #[inline]
            fn from(index: usize) -> Self {
                Self(index)
            }
        }

        impl From<$name> for usize {
            #[inline]
            fn from(idx: $name) -> usize {
                idx.0
            }
        }
    };
}

define_index!(
    /// Spherical-harmonic degree ℓ.
    ///
    /// Subproblems are keyed by degree: the linear operators of the shell
    /// problem depend on ℓ but not on the azimuthal order.
    ///
    /// # Example
    ///
    /// ```
    /// use shellconv::types::Degree;
    ///
    /// let ell = Degree::new(3);
    /// assert_eq!(ell.get(), 3);
    /// assert_eq!(ell.eigenvalue(), 12.0);
    /// ```
    Degree,
    "ℓ="
);

define_index!(
    /// Azimuthal order m (only m ≥ 0 is stored for real fields).
    ///
    /// # Example
    ///
    /// ```
    /// use shellconv::types::Order;
    ///
    /// let m = Order::new(4);
    /// assert_eq!(m.get(), 4);
    /// ```
    Order,
    "m="
);

impl Degree {
    /// Surface Laplacian eigenvalue ℓ(ℓ+1).
    #[inline]
    pub fn eigenvalue(self) -> f64 {
        (self.0 * (self.0 + 1)) as f64
    }

    /// Spin-coupling factor κ = √(ℓ(ℓ+1)/2) of the vector operators.
    #[inline]
    pub fn kappa(self) -> f64 {
        (0.5 * self.eigenvalue()).sqrt()
    }

    /// Iterate degrees 0..=lmax.
    pub fn iter(lmax: usize) -> impl Iterator<Item = Degree> + ExactSizeIterator {
        (0..lmax + 1).map(Degree)
    }
}

/// A single (m, ℓ) spherical-harmonic mode with ℓ ≥ m.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Mode {
    /// Azimuthal order
    pub m: Order,
    /// Degree
    pub ell: Degree,
}

impl Mode {
    /// Create a mode. ℓ must not be smaller than m.
    pub fn new(m: usize, ell: usize) -> Self {
        debug_assert!(ell >= m, "mode requires ell >= m, got m={} ell={}", m, ell);
        Self {
            m: Order(m),
            ell: Degree(ell),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.m, self.ell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degree_factors() {
        let ell = Degree::new(0);
        assert!(ell.is_zero());
        assert_eq!(ell.kappa(), 0.0);

        let ell = Degree::new(2);
        assert_eq!(ell.eigenvalue(), 6.0);
        assert!((ell.kappa() - 3.0_f64.sqrt()).abs() < 1e-15);
    }

    #[test]
    fn test_degree_iter() {
        let all: Vec<_> = Degree::iter(3).collect();
        assert_eq!(all.len(), 4);
        assert_eq!(all[3].get(), 3);
        let degrees = Degree::iter(7);
        assert_eq!(degrees.len(), 8);
        assert_eq!(Degree::iter(0).len(), 1);
    }

    #[test]
    fn test_mode_display() {
        let mode = Mode::new(1, 4);
        assert_eq!(format!("{}", mode), "(m=1, ℓ=4)");
    }
}
