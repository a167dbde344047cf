//! Core data structures for pkmeans
//!
//! Points and centroids live in one flat row-major buffer each.
//! Rows are handed out as slices, never as nested vectors.

use std::ops::Deref;

/// Dense `rows × cols` matrix of f64 stored contiguously in row-major order
#[derive(Debug, Clone, PartialEq)]
pub struct FlatMatrix {
    /// Values [rows × cols]
    pub data: Vec<f64>,

    /// Number of rows
    pub rows: usize,

    /// Width of each row
    pub cols: usize,
}

impl FlatMatrix {
    /// Create a zero-filled matrix
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            data: vec![0.0; rows * cols],
            rows,
            cols,
        }
    }

    /// Wrap an existing buffer; `None` if its length is not `rows * cols`
    pub fn from_vec(data: Vec<f64>, rows: usize, cols: usize) -> Option<Self> {
        if data.len() != rows * cols {
            return None;
        }
        Some(Self { data, rows, cols })
    }

    /// Get row at index as slice
    pub fn row(&self, idx: usize) -> &[f64] {
        let start = idx * self.cols;
        &self.data[start..start + self.cols]
    }

    /// Get mutable row at index
    pub fn row_mut(&mut self, idx: usize) -> &mut [f64] {
        let start = idx * self.cols;
        let end = start + self.cols;
        &mut self.data[start..end]
    }

    /// Iterate over rows in order
    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        (0..self.rows).map(move |idx| self.row(idx))
    }
}

/// The immutable input points, N rows of dimension D
#[derive(Debug, Clone, PartialEq)]
pub struct PointSet(FlatMatrix);

impl PointSet {
    pub fn new(matrix: FlatMatrix) -> Self {
        Self(matrix)
    }

    /// Build from nested rows; `None` if empty or ragged
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Option<Self> {
        let d = rows.first()?.as_ref().len();
        let mut data = Vec::with_capacity(rows.len() * d);
        for row in rows {
            let row = row.as_ref();
            if row.len() != d {
                return None;
            }
            data.extend_from_slice(row);
        }
        FlatMatrix::from_vec(data, rows.len(), d).map(Self)
    }

    /// Number of points
    pub fn n(&self) -> usize {
        self.0.rows
    }

    /// Dimension of every point
    pub fn d(&self) -> usize {
        self.0.cols
    }
}

impl Deref for PointSet {
    type Target = FlatMatrix;

    fn deref(&self) -> &FlatMatrix {
        &self.0
    }
}

/// K centroids of dimension D
///
/// A fresh set is built every iteration and shared read-only with the
/// workers, so nothing ever writes to a set a worker can see.
#[derive(Debug, Clone, PartialEq)]
pub struct CentroidSet(FlatMatrix);

impl CentroidSet {
    pub fn new(matrix: FlatMatrix) -> Self {
        Self(matrix)
    }

    /// Create `k` zeroed centroids of dimension `d`
    pub fn zeros(k: usize, d: usize) -> Self {
        Self(FlatMatrix::zeros(k, d))
    }

    /// Number of centroids
    pub fn k(&self) -> usize {
        self.0.rows
    }

    /// Dimension of each centroid
    pub fn d(&self) -> usize {
        self.0.cols
    }

    pub fn get_centroid(&self, idx: usize) -> &[f64] {
        self.0.row(idx)
    }

    pub fn get_centroid_mut(&mut self, idx: usize) -> &mut [f64] {
        self.0.row_mut(idx)
    }

    /// Copy out as nested vectors, for reporting
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.0.iter_rows().map(<[f64]>::to_vec).collect()
    }

    pub fn into_inner(self) -> FlatMatrix {
        self.0
    }
}

impl Deref for CentroidSet {
    type Target = FlatMatrix;

    fn deref(&self) -> &FlatMatrix {
        &self.0
    }
}

/// One point's nearest-centroid decision for a single iteration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assignment<'a> {
    /// Index of the point in the `PointSet`
    pub point: usize,

    /// The point's coordinates (borrowed from the `PointSet`)
    pub coords: &'a [f64],

    /// Index of the winning centroid
    pub centroid: usize,
}

/// Result of a clustering run
#[derive(Debug, Clone)]
pub struct ClusterOutcome {
    /// Final centroids
    pub centroids: CentroidSet,

    /// Number of assign/update rounds executed
    pub iterations: usize,

    /// False only when an iteration cap stopped the run first
    pub converged: bool,
}
