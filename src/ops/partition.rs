//! Static split of the point range across workers
//!
//! Ranges are contiguous and ordered. The first `n % w` ranges get one
//! extra point, so sizes never differ by more than one.

use std::ops::Range;

use crate::error::{ClusterError, Result};

/// Half-open index range `[start, stop)` owned by one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    pub start: usize,
    pub stop: usize,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.stop - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.stop
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.stop
    }
}

/// Range for worker `worker` out of `workers` sharing `n` points
fn bounds(n: usize, workers: usize, worker: usize) -> Partition {
    let min_size = n / workers;
    let num_larger = n % workers;

    // Larger blocks come first; later blocks shift past them
    let start = worker * min_size + worker.min(num_larger);
    let stop = start + min_size + usize::from(worker < num_larger);

    Partition { start, stop }
}

/// Split `n` points across `workers` workers
///
/// Fails if `workers` is zero or exceeds `n`: every worker must own at
/// least one point.
pub fn partition(n: usize, workers: usize) -> Result<Vec<Partition>> {
    if workers == 0 {
        return Err(ClusterError::Config("worker count must be at least 1".into()));
    }
    if workers > n {
        return Err(ClusterError::Config(format!(
            "the number of workers ({}) should not exceed the number of points ({})",
            workers, n
        )));
    }

    Ok((0..workers).map(|w| bounds(n, workers, w)).collect())
}
