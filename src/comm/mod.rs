//! Collective communication across the ranks of a process mesh.
//!
//! Every rank holds a full copy of the spectral coefficients and a tile of
//! the physical grid. The only interactions between ranks are the blocking
//! collectives defined by [`Communicator`]: all ranks must call the same
//! collective in the same order, and each call returns once every rank
//! has arrived.
//!
//! Two implementations are provided:
//! - [`SingleProcess`]: one rank, every collective is local
//! - [`ThreadMesh`]: one OS thread per rank over a shared rendezvous
//!
//! Reductions are computed from the gathered contributions in rank order,
//! so every rank obtains bit-identical results.

mod mesh;
mod single;
mod thread_mesh;

pub use mesh::{ProcessMesh, Tile};
pub use single::SingleProcess;
pub use thread_mesh::{ThreadComm, ThreadMesh};

use thiserror::Error;

/// Errors raised by collective operations.
#[derive(Debug, Error)]
pub enum CommError {
    /// Another rank aborted the run; no collective can complete.
    #[error("collective aborted on rank {rank}: another rank failed")]
    Aborted { rank: usize },

    /// Ranks contributed buffers of different lengths to a reduction.
    #[error("reduction length mismatch: expected {expected}, rank {rank} sent {found}")]
    LengthMismatch {
        expected: usize,
        rank: usize,
        found: usize,
    },

    /// The process mesh does not match the number of ranks.
    #[error("process mesh {xn}x{yn} does not match communicator size {ranks}")]
    MeshSize { xn: usize, yn: usize, ranks: usize },

    /// A grid axis cannot be split evenly over the mesh.
    #[error("cannot split {points} {axis} points over {parts} ranks")]
    IndivisibleGrid {
        axis: &'static str,
        points: usize,
        parts: usize,
    },
}

/// Blocking collectives over a fixed set of ranks.
///
/// Implementors provide `all_gather` and `abort`; the reductions are built
/// on top of the gather so that their results are identical on every rank.
pub trait Communicator: Send + Sync {
    /// Rank of the caller, in `0..size()`.
    fn rank(&self) -> usize;

    /// Number of ranks.
    fn size(&self) -> usize;

    /// Gather every rank's buffer, in rank order, on every rank.
    fn all_gather(&self, local: Vec<f64>) -> Result<Vec<Vec<f64>>, CommError>;

    /// Mark the run as failed. Pending and future collectives on the other
    /// ranks return [`CommError::Aborted`].
    fn abort(&self);

    /// Global maximum. NaN on any rank propagates to the result.
    fn global_max(&self, value: f64) -> Result<f64, CommError> {
        let all = self.all_gather(vec![value])?;
        Ok(nan_max(all.iter().filter_map(|v| v.first().copied())))
    }

    /// Global sum.
    fn global_sum(&self, value: f64) -> Result<f64, CommError> {
        let all = self.all_gather(vec![value])?;
        Ok(all.iter().filter_map(|v| v.first()).sum())
    }

    /// Element-wise sum of equal-length buffers, written back in place.
    fn sum_in_place(&self, values: &mut [f64]) -> Result<(), CommError> {
        if self.size() == 1 {
            return Ok(());
        }
        let all = self.all_gather(values.to_vec())?;
        for (rank, contribution) in all.iter().enumerate() {
            if contribution.len() != values.len() {
                return Err(CommError::LengthMismatch {
                    expected: values.len(),
                    rank,
                    found: contribution.len(),
                });
            }
        }
        for (i, v) in values.iter_mut().enumerate() {
            *v = all.iter().map(|c| c[i]).sum();
        }
        Ok(())
    }

    /// Gather every rank's buffer on `root`. Other ranks receive `None`.
    fn gather(&self, root: usize, local: Vec<f64>) -> Result<Option<Vec<Vec<f64>>>, CommError> {
        let all = self.all_gather(local)?;
        Ok((self.rank() == root).then_some(all))
    }
}

/// Maximum of a sequence that returns NaN if any element is NaN.
///
/// Unlike folding with `f64::max`, NaN elements are not skipped.
pub fn nan_max(values: impl IntoIterator<Item = f64>) -> f64 {
    values.into_iter().fold(f64::NEG_INFINITY, |acc, v| {
        if v.is_nan() || acc.is_nan() {
            f64::NAN
        } else {
            acc.max(v)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nan_max_propagates() {
        assert_eq!(nan_max([1.0, 3.0, 2.0]), 3.0);
        assert!(nan_max([1.0, f64::NAN, 2.0]).is_nan());
        assert_eq!(nan_max(std::iter::empty()), f64::NEG_INFINITY);
    }
}
