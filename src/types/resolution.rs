//! Spectral truncation of the shell basis.

use std::fmt;

use super::{Degree, Mode};

/// Spectral truncation orders of the shell basis.
///
/// `lmax` bounds the spherical-harmonic degree and `nmax` the Chebyshev
/// degree of the radial expansion. The physical grid that resolves this
/// truncation has `2(lmax+1)` longitudes, `lmax+1` colatitudes and `nmax+1`
/// radii.
///
/// # Example
///
/// ```
/// use shellconv::types::Truncation;
///
/// let trunc = Truncation::new(15, 15);
/// assert_eq!(trunc.n_phi(), 32);
/// assert_eq!(trunc.n_theta(), 16);
/// assert_eq!(trunc.n_r(), 16);
/// assert_eq!(trunc.n_modes(), 136);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Truncation {
    lmax: usize,
    nmax: usize,
}

impl Truncation {
    /// Create a truncation.
    ///
    /// # Panics
    ///
    /// Panics if `nmax < 2`; the tau method needs two spare radial modes.
    pub fn new(lmax: usize, nmax: usize) -> Self {
        assert!(nmax >= 2, "nmax must be at least 2, got {}", nmax);
        Self { lmax, nmax }
    }

    /// Maximum spherical-harmonic degree.
    #[inline]
    pub fn lmax(&self) -> usize {
        self.lmax
    }

    /// Maximum Chebyshev degree.
    #[inline]
    pub fn nmax(&self) -> usize {
        self.nmax
    }

    /// Number of longitudes.
    #[inline]
    pub fn n_phi(&self) -> usize {
        2 * (self.lmax + 1)
    }

    /// Number of colatitudes.
    #[inline]
    pub fn n_theta(&self) -> usize {
        self.lmax + 1
    }

    /// Number of radial points (and radial coefficients).
    #[inline]
    pub fn n_r(&self) -> usize {
        self.nmax + 1
    }

    /// Number of stored (m, ℓ) modes with 0 ≤ m ≤ ℓ ≤ lmax.
    #[inline]
    pub fn n_modes(&self) -> usize {
        (self.lmax + 1) * (self.lmax + 2) / 2
    }

    /// Position of a mode in the packed mode list.
    ///
    /// Modes are ordered by degree, then by order: (0,0), (0,1), (1,1), (0,2), ...
    #[inline]
    pub fn mode_index(&self, mode: Mode) -> usize {
        let ell = mode.ell.get();
        ell * (ell + 1) / 2 + mode.m.get()
    }

    /// All stored modes in packed order.
    pub fn modes(&self) -> impl Iterator<Item = Mode> + '_ {
        (0..=self.lmax).flat_map(|ell| (0..=ell).map(move |m| Mode::new(m, ell)))
    }

    /// Stored modes of a single degree.
    pub fn modes_of(&self, ell: Degree) -> impl Iterator<Item = Mode> {
        let l = ell.get();
        (0..=l).map(move |m| Mode::new(m, l))
    }
}

impl fmt::Display for Truncation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lmax={} Nmax={}", self.lmax, self.nmax)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_index_is_packed() {
        let trunc = Truncation::new(6, 4);
        for (i, mode) in trunc.modes().enumerate() {
            assert_eq!(trunc.mode_index(mode), i, "mode {}", mode);
        }
        assert_eq!(trunc.modes().count(), trunc.n_modes());
    }

    #[test]
    fn test_modes_of_degree() {
        let trunc = Truncation::new(5, 4);
        let modes: Vec<_> = trunc.modes_of(Degree::new(3)).collect();
        assert_eq!(modes.len(), 4);
        assert!(modes.iter().all(|m| m.ell.get() == 3));
    }

    #[test]
    #[should_panic(expected = "nmax must be at least 2")]
    fn test_rejects_tiny_radial_truncation() {
        Truncation::new(4, 1);
    }
}
