//! Fixed worker pool and its two-signal barrier
//!
//! Every worker owns one partition for the whole run and two private
//! receivers: a dispatch channel carrying the centroids for the next round
//! and a control channel carrying Continue or Stop. Assignments flow back on
//! one shared bounded channel sized to hold a full round.
//!
//! The coordinator sends each signal exactly once per worker per round and
//! only releases the control signal after all N assignments are in. That
//! rendezvous is the barrier: no worker can start round i+1 while another
//! is still in round i. Because the channels are per worker, one worker can
//! never consume a signal meant for another.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender};
use std::sync::Arc;
use std::thread::{Scope, ScopedJoinHandle};
use std::time::Duration;

use tracing::trace;

use crate::error::{ClusterError, Result};
use crate::ops::{nearest_centroid, Partition};
use crate::types::{Assignment, CentroidSet, PointSet};

/// How often a waiting coordinator checks whether a worker has died
const LIVENESS_POLL: Duration = Duration::from_millis(50);

/// What a worker does after finishing a round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Continue,
    Stop,
}

/// One pool member bound to a fixed slice of the point set
pub struct Worker<'a> {
    id: usize,
    points: &'a PointSet,
    partition: Partition,
    dispatch: Receiver<Arc<CentroidSet>>,
    control: Receiver<Signal>,
    results: SyncSender<Assignment<'a>>,
}

impl<'a> Worker<'a> {
    pub fn new(
        id: usize,
        points: &'a PointSet,
        partition: Partition,
        dispatch: Receiver<Arc<CentroidSet>>,
        control: Receiver<Signal>,
        results: SyncSender<Assignment<'a>>,
    ) -> Self {
        Self {
            id,
            points,
            partition,
            dispatch,
            control,
            results,
        }
    }

    /// Run until told to stop; returns the number of rounds processed
    ///
    /// A closed channel is treated like Stop so the pool always winds down
    /// when the coordinator goes away.
    pub fn run(self) -> usize {
        let mut rounds = 0;

        loop {
            // Awaiting centroids
            let centroids = match self.dispatch.recv() {
                Ok(centroids) => centroids,
                Err(_) => break,
            };
            trace!(worker = self.id, round = rounds + 1, "processing partition");

            // Processing
            for point in self.partition.range() {
                let coords = self.points.row(point);
                let assignment = Assignment {
                    point,
                    coords,
                    centroid: nearest_centroid(coords, &centroids),
                };
                if self.results.send(assignment).is_err() {
                    return rounds;
                }
            }
            rounds += 1;

            match self.control.recv() {
                Ok(Signal::Continue) => continue,
                Ok(Signal::Stop) | Err(_) => break,
            }
        }

        rounds
    }
}

/// Coordinator-side ends of one worker's private channels
struct WorkerHandle {
    dispatch: Sender<Arc<CentroidSet>>,
    control: Sender<Signal>,
}

/// The running pool, owned by the coordinator
pub struct WorkerPool<'scope, 'env> {
    handles: Vec<WorkerHandle>,
    results: Receiver<Assignment<'env>>,
    joins: Vec<ScopedJoinHandle<'scope, usize>>,
}

impl<'scope, 'env> WorkerPool<'scope, 'env> {
    /// Start one worker per partition on the given scope
    pub fn spawn(
        scope: &'scope Scope<'scope, 'env>,
        points: &'env PointSet,
        partitions: &[Partition],
    ) -> Self {
        // Room for a full round so workers never wait on the coordinator
        let (results_tx, results) = mpsc::sync_channel(points.n());

        let mut handles = Vec::with_capacity(partitions.len());
        let mut joins = Vec::with_capacity(partitions.len());

        for (id, &partition) in partitions.iter().enumerate() {
            let (dispatch_tx, dispatch_rx) = mpsc::channel();
            let (control_tx, control_rx) = mpsc::channel();
            let worker = Worker::new(
                id,
                points,
                partition,
                dispatch_rx,
                control_rx,
                results_tx.clone(),
            );

            joins.push(scope.spawn(move || worker.run()));
            handles.push(WorkerHandle {
                dispatch: dispatch_tx,
                control: control_tx,
            });
        }

        // Only workers hold senders now; the channel closes when they all exit
        drop(results_tx);

        Self {
            handles,
            results,
            joins,
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Hand the same centroid set to every worker, once each
    pub fn broadcast(&self, centroids: &Arc<CentroidSet>) -> Result<()> {
        for (id, handle) in self.handles.iter().enumerate() {
            handle
                .dispatch
                .send(Arc::clone(centroids))
                .map_err(|_| ClusterError::Invariant(format!("worker {} exited early", id)))?;
        }
        Ok(())
    }

    /// Release every worker from the barrier with the same signal
    pub fn release(&self, signal: Signal) -> Result<()> {
        for (id, handle) in self.handles.iter().enumerate() {
            handle
                .control
                .send(signal)
                .map_err(|_| ClusterError::Invariant(format!("worker {} exited early", id)))?;
        }
        Ok(())
    }

    /// Block for the next assignment
    ///
    /// Fails instead of hanging if any worker exits while results are still
    /// owed, e.g. because it panicked. The surviving workers keep the result
    /// channel open, so its closing alone would never be seen.
    pub fn recv(&self) -> Result<Assignment<'env>> {
        loop {
            match self.results.recv_timeout(LIVENESS_POLL) {
                Ok(assignment) => return Ok(assignment),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(ClusterError::Invariant(
                        "result channel closed before the round completed".into(),
                    ));
                }
                Err(RecvTimeoutError::Timeout) => {
                    if let Some(id) = self.joins.iter().position(ScopedJoinHandle::is_finished) {
                        return Err(ClusterError::Invariant(format!(
                            "worker {} exited before the round completed",
                            id
                        )));
                    }
                }
            }
        }
    }

    /// True once every worker thread has returned
    pub fn is_finished(&self) -> bool {
        self.joins.iter().all(ScopedJoinHandle::is_finished)
    }

    /// Non-blocking poll, used to detect surplus assignments
    pub fn try_recv(&self) -> Option<Assignment<'env>> {
        self.results.try_recv().ok()
    }

    /// Wait up to `timeout` for an assignment
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Assignment<'env>> {
        self.results.recv_timeout(timeout).ok()
    }

    /// Close all signal channels and wait for the workers
    ///
    /// Returns the rounds each worker processed, in worker order.
    pub fn join(self) -> Result<Vec<usize>> {
        drop(self.handles);

        // Join every thread before reporting, so none is left for the scope to re-panic on
        let joined: Vec<Result<usize>> = self
            .joins
            .into_iter()
            .enumerate()
            .map(|(id, join)| {
                join.join()
                    .map_err(|_| ClusterError::Invariant(format!("worker {} panicked", id)))
            })
            .collect();

        joined.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::partition;
    use crate::types::FlatMatrix;
    use std::thread;

    fn line_points(n: usize) -> PointSet {
        let rows: Vec<[f64; 1]> = (0..n).map(|i| [i as f64]).collect();
        PointSet::from_rows(&rows).unwrap()
    }

    fn centroids_1d(values: &[f64]) -> Arc<CentroidSet> {
        let matrix = FlatMatrix::from_vec(values.to_vec(), values.len(), 1).unwrap();
        Arc::new(CentroidSet::new(matrix))
    }

    #[test]
    fn test_single_worker_cycle() {
        let points = line_points(4);
        let (dispatch_tx, dispatch_rx) = mpsc::channel();
        let (control_tx, control_rx) = mpsc::channel();
        let (results_tx, results_rx) = mpsc::sync_channel(4);

        let rounds = thread::scope(|s| {
            let worker = Worker::new(
                0,
                &points,
                Partition { start: 1, stop: 4 },
                dispatch_rx,
                control_rx,
                results_tx,
            );
            let join = s.spawn(move || worker.run());

            dispatch_tx.send(centroids_1d(&[0.0, 3.0])).unwrap();
            let mut got: Vec<(usize, usize)> = (0..3)
                .map(|_| {
                    let a = results_rx.recv().unwrap();
                    (a.point, a.centroid)
                })
                .collect();
            got.sort();
            assert_eq!(got, vec![(1, 0), (2, 1), (3, 1)]);

            control_tx.send(Signal::Stop).unwrap();
            join.join().unwrap()
        });

        assert_eq!(rounds, 1);
    }

    #[test]
    fn test_worker_exits_when_coordinator_disappears() {
        let points = line_points(2);
        let (dispatch_tx, dispatch_rx) = mpsc::channel::<Arc<CentroidSet>>();
        let (_control_tx, control_rx) = mpsc::channel();
        let (results_tx, _results_rx) = mpsc::sync_channel(2);

        let rounds = thread::scope(|s| {
            let worker = Worker::new(
                0,
                &points,
                Partition { start: 0, stop: 2 },
                dispatch_rx,
                control_rx,
                results_tx,
            );
            let join = s.spawn(move || worker.run());
            drop(dispatch_tx);
            join.join().unwrap()
        });

        assert_eq!(rounds, 0);
    }

    #[test]
    fn test_barrier_holds_workers_between_rounds() {
        let points = line_points(9);
        let partitions = partition(9, 3).unwrap();

        let rounds = thread::scope(|s| {
            let pool = WorkerPool::spawn(s, &points, &partitions);
            assert_eq!(pool.len(), 3);

            for round in 0..3 {
                pool.broadcast(&centroids_1d(&[0.0, 8.0])).unwrap();

                let mut seen = vec![false; 9];
                for _ in 0..9 {
                    let a = pool.recv().unwrap();
                    assert!(!seen[a.point], "point {} reported twice", a.point);
                    seen[a.point] = true;
                }
                assert!(seen.iter().all(|&hit| hit));

                // Nothing beyond the round is produced while workers wait
                assert!(pool.try_recv().is_none());

                let signal = if round == 2 { Signal::Stop } else { Signal::Continue };
                pool.release(signal).unwrap();

                // Released workers wait for centroids, not run ahead
                if signal == Signal::Continue {
                    assert!(pool.recv_timeout(Duration::from_millis(20)).is_none());
                }
            }

            pool.join().unwrap()
        });

        assert_eq!(rounds, vec![3, 3, 3]);
    }

    #[test]
    fn test_recv_fails_when_a_worker_dies() {
        let points = line_points(2);
        // The second range runs past the point set, so that worker panics
        let partitions = [Partition { start: 0, stop: 1 }, Partition { start: 2, stop: 3 }];

        let (received, joined) = thread::scope(|s| {
            let pool = WorkerPool::spawn(s, &points, &partitions);
            pool.broadcast(&centroids_1d(&[0.0])).unwrap();

            let first = pool.recv().unwrap();
            assert_eq!(first.point, 0);

            // Worker 0 is parked holding its sender; only the dead worker can end this
            let received = pool.recv();
            (received, pool.join())
        });

        match received {
            Err(ClusterError::Invariant(msg)) => assert!(msg.contains("worker 1"), "{}", msg),
            other => panic!("expected invariant error, got {:?}", other),
        }
        assert!(matches!(joined, Err(ClusterError::Invariant(_))));
    }

    #[test]
    fn test_is_finished_after_stop() {
        let points = line_points(3);
        let partitions = partition(3, 3).unwrap();

        thread::scope(|s| {
            let pool = WorkerPool::spawn(s, &points, &partitions);
            assert!(!pool.is_finished());

            pool.broadcast(&centroids_1d(&[0.0])).unwrap();
            for _ in 0..3 {
                pool.recv().unwrap();
            }
            pool.release(Signal::Stop).unwrap();
            while !pool.is_finished() {
                thread::yield_now();
            }
            assert_eq!(pool.join().unwrap(), vec![1, 1, 1]);
        });
    }

    #[test]
    fn test_join_without_stop_releases_workers() {
        let points = line_points(4);
        let partitions = partition(4, 2).unwrap();

        let rounds = thread::scope(|s| {
            let pool = WorkerPool::spawn(s, &points, &partitions);
            pool.broadcast(&centroids_1d(&[1.0])).unwrap();
            for _ in 0..4 {
                pool.recv().unwrap();
            }
            // Workers are parked on the control channel; dropping it ends them
            pool.join().unwrap()
        });

        assert_eq!(rounds, vec![1, 1]);
    }
}
