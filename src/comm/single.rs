//! Single-rank communicator.

use super::{CommError, Communicator};

/// Communicator for a run on one rank; every collective is the identity.
#[derive(Clone, Copy, Debug, Default)]
pub struct SingleProcess;

impl Communicator for SingleProcess {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_gather(&self, local: Vec<f64>) -> Result<Vec<Vec<f64>>, CommError> {
        Ok(vec![local])
    }

    fn abort(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_collectives_are_local() {
        let comm = SingleProcess;
        assert_eq!(comm.global_max(2.5).unwrap(), 2.5);
        assert_eq!(comm.global_sum(-1.0).unwrap(), -1.0);

        let mut values = [1.0, 2.0];
        comm.sum_in_place(&mut values).unwrap();
        assert_eq!(values, [1.0, 2.0]);

        let gathered = comm.gather(0, vec![4.0]).unwrap();
        assert_eq!(gathered, Some(vec![vec![4.0]]));
    }
}
