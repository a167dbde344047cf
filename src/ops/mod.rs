//! Operations module - numeric kernels and work partitioning

pub mod cpu;
pub mod partition;

// Re-export commonly used functions
pub use cpu::{
    squared_distance,
    nearest_centroid,
    centroids_converged,
    max_shift,
    ClusterSums,
};

pub use partition::{partition, Partition};
