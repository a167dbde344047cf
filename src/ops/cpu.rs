//! CPU kernels for the clustering loop
//!
//! Distances are squared Euclidean everywhere, including the convergence
//! test. No square roots are taken.

use crate::types::{CentroidSet, FlatMatrix};

/// Squared Euclidean distance between two equal-length vectors
pub fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    let mut sum = 0.0f64;

    // Strictly left-to-right so every caller sees the same rounding
    for (x, y) in a.iter().zip(b.iter()) {
        let diff = y - x;
        sum += diff * diff;
    }

    sum
}

/// Index of the centroid nearest to `point`, ties going to the lowest index
pub fn nearest_centroid(point: &[f64], centroids: &CentroidSet) -> usize {
    let mut min_dist = f64::INFINITY;
    let mut min_idx = 0usize;

    for idx in 0..centroids.k() {
        let dist = squared_distance(point, centroids.get_centroid(idx));

        if dist < min_dist {
            min_dist = dist;
            min_idx = idx;
        }
    }

    min_idx
}

/// True iff every centroid moved by at most `threshold` (squared distance)
///
/// Assumes both sets have the same shape.
pub fn centroids_converged(old: &CentroidSet, new: &CentroidSet, threshold: f64) -> bool {
    (0..old.k()).all(|idx| {
        squared_distance(old.get_centroid(idx), new.get_centroid(idx)) <= threshold
    })
}

/// Largest per-centroid squared shift between two sets
pub fn max_shift(old: &CentroidSet, new: &CentroidSet) -> f64 {
    (0..old.k())
        .map(|idx| squared_distance(old.get_centroid(idx), new.get_centroid(idx)))
        .fold(0.0, f64::max)
}

/// Per-centroid running sums and counts for one iteration
#[derive(Debug, Clone)]
pub struct ClusterSums {
    /// Component-wise sums [k × d]
    pub sums: FlatMatrix,

    /// Points assigned to each centroid
    pub counts: Vec<usize>,
}

impl ClusterSums {
    pub fn new(k: usize, d: usize) -> Self {
        Self {
            sums: FlatMatrix::zeros(k, d),
            counts: vec![0; k],
        }
    }

    /// Add one point to a centroid's running sum
    pub fn add(&mut self, centroid: usize, coords: &[f64]) {
        self.counts[centroid] += 1;
        for (acc, &val) in self.sums.row_mut(centroid).iter_mut().zip(coords) {
            *acc += val;
        }
    }

    /// Indices of centroids that received no points
    pub fn empty_clusters(&self) -> Vec<usize> {
        self.counts
            .iter()
            .enumerate()
            .filter(|&(_, &count)| count == 0)
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Divide each sum by its count into a fresh centroid set
    ///
    /// Empty centroids are copied from `previous` instead of divided.
    pub fn into_means(self, previous: &CentroidSet) -> CentroidSet {
        let mut means = CentroidSet::new(self.sums);

        for (idx, &count) in self.counts.iter().enumerate() {
            let mean = means.get_centroid_mut(idx);
            if count == 0 {
                mean.copy_from_slice(previous.get_centroid(idx));
                continue;
            }
            let divisor = count as f64;
            for val in mean.iter_mut() {
                *val /= divisor;
            }
        }

        means
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn centroids(rows: &[&[f64]]) -> CentroidSet {
        let d = rows[0].len();
        let data: Vec<f64> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        CentroidSet::new(FlatMatrix::from_vec(data, rows.len(), d).unwrap())
    }

    #[test]
    fn test_squared_distance() {
        let a = [1.0, 2.0, 3.0];
        let b = [4.0, 5.0, 6.0];
        assert_eq!(squared_distance(&a, &b), 27.0);
        assert_eq!(squared_distance(&a, &a), 0.0);
    }

    #[test]
    fn test_nearest_matches_brute_force() {
        let cents = centroids(&[&[0.0, 0.0], &[5.0, 5.0], &[-3.0, 4.0], &[9.0, -1.0]]);

        for i in 0..50 {
            let p = [(i as f64 * 0.7).sin() * 10.0, (i as f64 * 1.3).cos() * 10.0];
            let expected = (0..cents.k())
                .min_by(|&a, &b| {
                    let da = squared_distance(&p, cents.get_centroid(a));
                    let db = squared_distance(&p, cents.get_centroid(b));
                    da.partial_cmp(&db).unwrap().then(a.cmp(&b))
                })
                .unwrap();
            assert_eq!(nearest_centroid(&p, &cents), expected);
        }
    }

    #[test]
    fn test_nearest_tie_goes_to_lowest_index() {
        let cents = centroids(&[&[-1.0], &[1.0], &[1.0]]);
        assert_eq!(nearest_centroid(&[0.0], &cents), 0);
        assert_eq!(nearest_centroid(&[1.0], &cents), 1);
    }

    #[test]
    fn test_convergence_boundary() {
        let old = centroids(&[&[0.0, 0.0], &[1.0, 1.0]]);
        let new = centroids(&[&[0.0, 1.0], &[1.0, 1.5]]);

        // shifts are 1.0 and 0.25
        assert!(centroids_converged(&old, &new, 1.0));
        assert!(!centroids_converged(&old, &new, 0.999));
        assert!(centroids_converged(&old, &old, 0.0));
        assert_eq!(max_shift(&old, &new), 1.0);
    }

    #[test]
    fn test_sums_and_means() {
        let mut sums = ClusterSums::new(3, 2);
        sums.add(0, &[1.0, 2.0]);
        sums.add(0, &[3.0, 4.0]);
        sums.add(2, &[10.0, 10.0]);
        assert_eq!(sums.counts, vec![2, 0, 1]);
        assert_eq!(sums.empty_clusters(), vec![1]);

        let previous = centroids(&[&[0.0, 0.0], &[7.0, 8.0], &[0.0, 0.0]]);
        let means = sums.into_means(&previous);
        assert_eq!(means.get_centroid(0), &[2.0, 3.0]);
        assert_eq!(means.get_centroid(1), &[7.0, 8.0]);
        assert_eq!(means.get_centroid(2), &[10.0, 10.0]);
    }
}
