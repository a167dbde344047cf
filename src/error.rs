//! Error types for clustering runs.

use thiserror::Error;

/// Everything that can end a run. None of these are retried.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// A parameter is missing or out of range. Raised before any thread starts.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The point file is malformed.
    #[error("invalid input at line {line}: {reason}")]
    Input { line: usize, reason: String },

    /// The point file or an output file could not be read or written.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// An internal consistency check failed while aggregating.
    #[error("runtime invariant violated: {0}")]
    Invariant(String),

    /// A centroid received no points and the policy says to fail.
    #[error("centroid {centroid} received no points in iteration {iteration}")]
    EmptyCluster { centroid: usize, iteration: usize },
}

impl ClusterError {
    pub(crate) fn input(line: usize, reason: impl Into<String>) -> Self {
        Self::Input {
            line,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClusterError>;
