//! Physical description of the shell.

use std::f64::consts::PI;

use super::Boundary;

/// Inner and outer radii of the spherical shell.
///
/// The default is the Earth-like aspect ratio 0.35 used by the convection
/// benchmark: r_inner = 7/13, r_outer = 20/13, so the gap width is 1.
///
/// # Example
///
/// ```
/// use shellconv::types::ShellGeometry;
///
/// let shell = ShellGeometry::default();
/// assert!((shell.gap() - 1.0).abs() < 1e-14);
/// assert!((shell.xi_to_r(-1.0) - shell.r_inner()).abs() < 1e-14);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShellGeometry {
    r_inner: f64,
    r_outer: f64,
}

impl ShellGeometry {
    /// Create a shell geometry.
    ///
    /// # Panics
    ///
    /// Panics unless `0 < r_inner < r_outer`.
    pub fn new(r_inner: f64, r_outer: f64) -> Self {
        assert!(
            r_inner > 0.0 && r_outer > r_inner,
            "shell radii must satisfy 0 < r_inner < r_outer, got ({}, {})",
            r_inner,
            r_outer
        );
        Self { r_inner, r_outer }
    }

    /// Inner radius.
    #[inline]
    pub fn r_inner(&self) -> f64 {
        self.r_inner
    }

    /// Outer radius.
    #[inline]
    pub fn r_outer(&self) -> f64 {
        self.r_outer
    }

    /// Radius of a boundary.
    #[inline]
    pub fn radius(&self, boundary: Boundary) -> f64 {
        match boundary {
            Boundary::Inner => self.r_inner,
            Boundary::Outer => self.r_outer,
        }
    }

    /// Gap width r_outer - r_inner.
    #[inline]
    pub fn gap(&self) -> f64 {
        self.r_outer - self.r_inner
    }

    /// Mid-gap radius (centre of the Chebyshev map).
    #[inline]
    pub fn mid(&self) -> f64 {
        0.5 * (self.r_outer + self.r_inner)
    }

    /// Half gap width (scale of the Chebyshev map).
    #[inline]
    pub fn half_gap(&self) -> f64 {
        0.5 * self.gap()
    }

    /// Map a Chebyshev coordinate ξ ∈ [-1, 1] to radius.
    #[inline]
    pub fn xi_to_r(&self, xi: f64) -> f64 {
        self.mid() + self.half_gap() * xi
    }

    /// Exact shell volume 4π(r_o³ - r_i³)/3.
    pub fn volume(&self) -> f64 {
        4.0 * PI / 3.0 * (self.r_outer.powi(3) - self.r_inner.powi(3))
    }
}

impl Default for ShellGeometry {
    fn default() -> Self {
        Self::new(7.0 / 13.0, 20.0 / 13.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume() {
        let shell = ShellGeometry::new(1.0, 2.0);
        assert!((shell.volume() - 4.0 * PI * 7.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_radius_map() {
        let shell = ShellGeometry::default();
        assert!((shell.xi_to_r(1.0) - shell.r_outer()).abs() < 1e-14);
        assert!((shell.xi_to_r(0.0) - shell.mid()).abs() < 1e-14);
        assert_eq!(shell.radius(Boundary::Inner), shell.r_inner());
    }

    #[test]
    #[should_panic(expected = "shell radii")]
    fn test_rejects_inverted_radii() {
        ShellGeometry::new(2.0, 1.0);
    }
}
