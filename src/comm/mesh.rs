//! Two-dimensional process mesh over the angular grid.

use std::ops::Range;

use super::CommError;

/// An `Xn × Yn` arrangement of ranks.
///
/// Rank `r` has mesh coordinates `(r / Yn, r % Yn)`. The first coordinate
/// selects a tile of longitudes, the second a tile of colatitudes; every
/// rank holds all radii.
///
/// # Example
///
/// ```
/// use shellconv::comm::ProcessMesh;
///
/// let mesh = ProcessMesh::new(2, 2);
/// assert_eq!(mesh.coords(3), (1, 1));
/// let tile = mesh.tile(1, 32, 16).unwrap();
/// assert_eq!(tile.phi, 0..16);
/// assert_eq!(tile.theta, 8..16);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessMesh {
    xn: usize,
    yn: usize,
}

/// Index ranges of the grid owned by one rank.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tile {
    /// Longitude indices
    pub phi: Range<usize>,
    /// Colatitude indices
    pub theta: Range<usize>,
}

impl ProcessMesh {
    /// Create a mesh. Both dimensions must be positive.
    pub fn new(xn: usize, yn: usize) -> Self {
        assert!(xn > 0 && yn > 0, "process mesh dimensions must be positive");
        Self { xn, yn }
    }

    /// A 1×1 mesh.
    pub fn single() -> Self {
        Self::new(1, 1)
    }

    /// Number of ranks along φ.
    pub fn xn(&self) -> usize {
        self.xn
    }

    /// Number of ranks along θ.
    pub fn yn(&self) -> usize {
        self.yn
    }

    /// Total number of ranks.
    pub fn size(&self) -> usize {
        self.xn * self.yn
    }

    /// Mesh coordinates `(px, py)` of a rank.
    pub fn coords(&self, rank: usize) -> (usize, usize) {
        (rank / self.yn, rank % self.yn)
    }

    /// Check that the mesh matches a communicator size.
    pub fn check_size(&self, ranks: usize) -> Result<(), CommError> {
        if self.size() != ranks {
            return Err(CommError::MeshSize {
                xn: self.xn,
                yn: self.yn,
                ranks,
            });
        }
        Ok(())
    }

    /// Grid tile owned by `rank` for an `n_phi × n_theta` angular grid.
    pub fn tile(&self, rank: usize, n_phi: usize, n_theta: usize) -> Result<Tile, CommError> {
        let (px, py) = self.coords(rank);
        Ok(Tile {
            phi: split(n_phi, self.xn, px, "phi")?,
            theta: split(n_theta, self.yn, py, "theta")?,
        })
    }
}

fn split(points: usize, parts: usize, index: usize, axis: &'static str) -> Result<Range<usize>, CommError> {
    if points % parts != 0 {
        return Err(CommError::IndivisibleGrid {
            axis,
            points,
            parts,
        });
    }
    let width = points / parts;
    Ok(index * width..(index + 1) * width)
}
