//! Coordinator loop for parallel k-means

use std::sync::Arc;
use std::thread;

use tracing::{debug, info, warn};

use crate::error::{ClusterError, Result};
use crate::ops::{self, centroids_converged, max_shift, ClusterSums};
use crate::pool::{Signal, WorkerPool};
use crate::seed::seed_centroids;
use crate::types::{Assignment, CentroidSet, ClusterOutcome, PointSet};

/// What to do when a centroid receives no points in a round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyClusterPolicy {
    /// Keep the centroid where it was and log a warning
    #[default]
    KeepPrevious,

    /// Abort the run with `ClusterError::EmptyCluster`
    Fail,
}

/// Configuration for a clustering run
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Number of centroids (K)
    pub clusters: usize,

    /// Number of worker threads (W)
    pub workers: usize,

    /// Largest squared centroid shift that still counts as converged
    pub threshold: f64,

    /// Seed for the initial centroid draw
    pub seed: u64,

    /// Optional cap on rounds; `None` runs until convergence
    pub max_iterations: Option<usize>,

    pub empty_cluster: EmptyClusterPolicy,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            clusters: 8,
            workers: 4,
            threshold: 1e-6,
            seed: 0,
            max_iterations: None,
            empty_cluster: EmptyClusterPolicy::default(),
        }
    }
}

impl ClusterConfig {
    /// Check every parameter against a point set of `n_points` points
    pub fn validate(&self, n_points: usize) -> Result<()> {
        if n_points == 0 {
            return Err(ClusterError::Config("point set is empty".into()));
        }
        if self.clusters == 0 {
            return Err(ClusterError::Config("cluster count must be at least 1".into()));
        }
        if self.workers == 0 {
            return Err(ClusterError::Config("worker count must be at least 1".into()));
        }
        if self.workers > n_points {
            return Err(ClusterError::Config(format!(
                "the number of workers ({}) should not exceed the number of points ({})",
                self.workers, n_points
            )));
        }
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(ClusterError::Config(format!(
                "threshold must be a finite non-negative number, got {}",
                self.threshold
            )));
        }
        if self.max_iterations == Some(0) {
            return Err(ClusterError::Config("max iterations must be at least 1".into()));
        }
        Ok(())
    }
}

/// Cluster `points` with a pool of `config.workers` threads
///
/// Seeds K centroids, then repeats assign/update rounds until no centroid
/// moves by more than `config.threshold` (squared distance). The result is
/// identical for every worker count.
pub fn cluster(points: &PointSet, config: &ClusterConfig) -> Result<ClusterOutcome> {
    config.validate(points.n())?;
    let partitions = ops::partition(points.n(), config.workers)?;
    let initial = seed_centroids(config.clusters, points, config.seed);

    info!(
        n = points.n(),
        d = points.d(),
        k = config.clusters,
        workers = config.workers,
        threshold = config.threshold,
        "starting clustering"
    );

    let outcome = thread::scope(|scope| {
        let pool = WorkerPool::spawn(scope, points, &partitions);
        let outcome = coordinate(&pool, points, initial, config);

        // Joining also releases workers left waiting after an error
        let joined = pool.join();
        let outcome = outcome?;
        joined?;
        Ok::<_, ClusterError>(outcome)
    })?;

    info!(
        iterations = outcome.iterations,
        converged = outcome.converged,
        "clustering finished"
    );
    Ok(outcome)
}

/// Drive rounds until convergence (or the iteration cap)
fn coordinate(
    pool: &WorkerPool<'_, '_>,
    points: &PointSet,
    initial: CentroidSet,
    config: &ClusterConfig,
) -> Result<ClusterOutcome> {
    let (n, k, d) = (points.n(), config.clusters, points.d());
    let mut current = Arc::new(initial);
    let mut iterations = 0usize;

    loop {
        iterations += 1;

        // Step 1: every worker gets this round's centroids
        pool.broadcast(&current)?;

        // Step 2: gather all N assignments
        let sums = collect_round(pool, n, k, d)?;

        // Step 3: new means
        for centroid in sums.empty_clusters() {
            match config.empty_cluster {
                EmptyClusterPolicy::Fail => {
                    return Err(ClusterError::EmptyCluster {
                        centroid,
                        iteration: iterations,
                    });
                }
                EmptyClusterPolicy::KeepPrevious => {
                    warn!(centroid, iteration = iterations, "empty cluster, keeping previous centroid");
                }
            }
        }
        let next = sums.into_means(&current);

        // Step 4: convergence
        let converged = centroids_converged(&current, &next, config.threshold);
        debug!(
            iteration = iterations,
            max_shift = max_shift(&current, &next),
            converged,
            "round complete"
        );

        let capped = config.max_iterations.is_some_and(|max| iterations >= max);
        if converged || capped {
            pool.release(Signal::Stop)?;
            if !converged {
                warn!(iterations, "iteration cap reached before convergence");
            }
            return Ok(ClusterOutcome {
                centroids: next,
                iterations,
                converged,
            });
        }

        pool.release(Signal::Continue)?;
        current = Arc::new(next);
    }
}

/// Receive one round of assignments and sum them per centroid
///
/// Arrivals are slotted by point index and summed in index order, so the
/// floating-point result does not depend on arrival order or worker count.
fn collect_round<'env>(
    pool: &WorkerPool<'_, 'env>,
    n: usize,
    k: usize,
    d: usize,
) -> Result<ClusterSums> {
    let mut slots: Vec<Option<Assignment<'env>>> = vec![None; n];

    for _ in 0..n {
        let assignment = pool.recv()?;

        if assignment.point >= n {
            return Err(ClusterError::Invariant(format!(
                "assignment for point {} outside 0..{}",
                assignment.point, n
            )));
        }
        if assignment.centroid >= k {
            return Err(ClusterError::Invariant(format!(
                "point {} assigned to centroid {} outside 0..{}",
                assignment.point, assignment.centroid, k
            )));
        }
        if assignment.coords.len() != d {
            return Err(ClusterError::Invariant(format!(
                "point {} has {} coordinates, expected {}",
                assignment.point,
                assignment.coords.len(),
                d
            )));
        }

        let slot = &mut slots[assignment.point];
        if slot.is_some() {
            return Err(ClusterError::Invariant(format!(
                "point {} assigned twice in one round",
                assignment.point
            )));
        }
        *slot = Some(assignment);
    }

    if let Some(extra) = pool.try_recv() {
        return Err(ClusterError::Invariant(format!(
            "surplus assignment for point {} after a full round",
            extra.point
        )));
    }

    let mut sums = ClusterSums::new(k, d);
    for assignment in slots.into_iter().flatten() {
        sums.add(assignment.centroid, assignment.coords);
    }
    Ok(sums)
}
