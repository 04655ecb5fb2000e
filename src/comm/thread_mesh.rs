//! In-process mesh: one OS thread per rank.
//!
//! All handles share a rendezvous protected by a mutex. Each collective is
//! one round: ranks deposit their buffer, the last rank to arrive publishes
//! the gathered result and bumps the round counter, and waiters wake on the
//! condition variable once the counter moves.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;

use tracing::error;

use super::{CommError, Communicator};

struct Round {
    generation: u64,
    arrived: usize,
    slots: Vec<Option<Vec<f64>>>,
    result: Arc<Vec<Vec<f64>>>,
    aborted: bool,
}

struct Rendezvous {
    size: usize,
    round: Mutex<Round>,
    ready: Condvar,
}

impl Rendezvous {
    // A rank that panicked while holding the lock leaves the data intact;
    // the abort flag, not poisoning, signals failure.
    fn lock(&self) -> MutexGuard<'_, Round> {
        match self.round.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Communicator handle held by one rank of a [`ThreadMesh`].
#[derive(Clone)]
pub struct ThreadComm {
    rank: usize,
    shared: Arc<Rendezvous>,
}

/// Factory for thread-backed communicators.
///
/// # Example
///
/// ```
/// use shellconv::comm::{Communicator, ThreadMesh};
///
/// let sums = ThreadMesh::run(3, |comm| comm.global_sum(comm.rank() as f64));
/// for sum in sums {
///     assert_eq!(sum.unwrap(), 3.0);
/// }
/// ```
pub struct ThreadMesh;

impl ThreadMesh {
    /// Create `size` connected handles, one per rank.
    pub fn handles(size: usize) -> Vec<ThreadComm> {
        assert!(size > 0, "thread mesh needs at least one rank");
        let shared = Arc::new(Rendezvous {
            size,
            round: Mutex::new(Round {
                generation: 0,
                arrived: 0,
                slots: vec![None; size],
                result: Arc::new(Vec::new()),
                aborted: false,
            }),
            ready: Condvar::new(),
        });
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                shared: Arc::clone(&shared),
            })
            .collect()
    }

    /// Run `task` on `size` scoped threads, one per rank, and collect the
    /// per-rank results in rank order.
    ///
    /// A rank whose task returns an error aborts the mesh, so the remaining
    /// ranks fail at their next collective instead of waiting forever.
    pub fn run<T, E, F>(size: usize, task: F) -> Vec<Result<T, E>>
    where
        T: Send,
        E: Send + std::fmt::Display,
        F: Fn(ThreadComm) -> Result<T, E> + Sync,
    {
        let handles = Self::handles(size);
        thread::scope(|scope| {
            let joins: Vec<_> = handles
                .into_iter()
                .map(|comm| {
                    let task = &task;
                    scope.spawn(move || {
                        let guard = comm.clone();
                        let result = task(comm);
                        if let Err(e) = &result {
                            error!(rank = guard.rank(), "rank failed: {}", e);
                            guard.abort();
                        }
                        result
                    })
                })
                .collect();

            joins
                .into_iter()
                .map(|join| match join.join() {
                    Ok(result) => result,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        })
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn all_gather(&self, local: Vec<f64>) -> Result<Vec<Vec<f64>>, CommError> {
        let shared = &self.shared;
        let mut round = shared.lock();
        if round.aborted {
            return Err(CommError::Aborted { rank: self.rank });
        }

        round.slots[self.rank] = Some(local);
        round.arrived += 1;

        if round.arrived == shared.size {
            let gathered: Vec<Vec<f64>> = round
                .slots
                .iter_mut()
                .map(|slot| slot.take().unwrap_or_default())
                .collect();
            round.result = Arc::new(gathered);
            round.arrived = 0;
            round.generation = round.generation.wrapping_add(1);
            let result = Arc::clone(&round.result);
            drop(round);
            shared.ready.notify_all();
            return Ok(result.as_ref().clone());
        }

        let generation = round.generation;
        while round.generation == generation && !round.aborted {
            round = match shared.ready.wait(round) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }

        if round.generation == generation {
            return Err(CommError::Aborted { rank: self.rank });
        }
        Ok(round.result.as_ref().clone())
    }

    fn abort(&self) {
        let mut round = self.shared.lock();
        round.aborted = true;
        drop(round);
        self.shared.ready.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_gather_rank_order() {
        let results = ThreadMesh::run(4, |comm| comm.all_gather(vec![comm.rank() as f64]));
        for gathered in results {
            let gathered = gathered.unwrap();
            assert_eq!(gathered, vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0]]);
        }
    }

    #[test]
    fn test_reductions_match_single_process() {
        let results = ThreadMesh::run(3, |comm| {
            let max = comm.global_max(comm.rank() as f64 * 1.5)?;
            let mut buffer = vec![1.0, comm.rank() as f64];
            comm.sum_in_place(&mut buffer)?;
            Ok::<_, CommError>((max, buffer))
        });
        for result in results {
            let (max, buffer) = result.unwrap();
            assert_eq!(max, 3.0);
            assert_eq!(buffer, vec![3.0, 3.0]);
        }
    }

    #[test]
    fn test_repeated_rounds() {
        let results = ThreadMesh::run(2, |comm| {
            let mut total = 0.0;
            for i in 0..50 {
                total += comm.global_sum((i * (comm.rank() + 1)) as f64)?;
            }
            Ok::<_, CommError>(total)
        });
        // Σ_i 3i for i < 50
        for r in results {
            assert_eq!(r.unwrap(), 3.0 * 1225.0);
        }
    }

    #[test]
    fn test_gather_only_on_root() {
        let results = ThreadMesh::run(2, |comm| comm.gather(1, vec![comm.rank() as f64]));
        let results: Vec<_> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(results[0], None);
        assert_eq!(results[1], Some(vec![vec![0.0], vec![1.0]]));
    }

    #[test]
    fn test_abort_fails_every_other_rank() {
        let results = ThreadMesh::run(3, |comm| {
            if comm.rank() == 1 {
                return Err(CommError::Aborted { rank: 1 });
            }
            comm.global_sum(1.0)
        });
        assert!(results.iter().all(|r| r.is_err()));
        assert!(matches!(results[0], Err(CommError::Aborted { rank: 0 })));
        assert!(matches!(results[2], Err(CommError::Aborted { rank: 2 })));
    }
}
