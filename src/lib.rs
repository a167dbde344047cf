//! Parallel k-means
//!
//! Lloyd's algorithm over a fixed pool of worker threads. Workers own
//! contiguous slices of the point set and meet the coordinator at a
//! two-signal barrier every round. Results are bit-identical for any
//! worker count.

pub mod types;
pub mod error;
pub mod io;
pub mod ops;
pub mod seed;
pub mod pool;
pub mod cluster;

// Re-export core types
pub use types::{Assignment, CentroidSet, ClusterOutcome, FlatMatrix, PointSet};
pub use error::{ClusterError, Result};
pub use io::{format_centroids, parse_points, read_centroids, read_points, write_centroids};
pub use seed::{seed_centroids, Lcg};
pub use cluster::{cluster, ClusterConfig, EmptyClusterPolicy};

/// Our magic number for centroid file headers
pub const PKM_MAGIC: u32 = 0x504B4D43; // "PKMC" in hex

/// Version for binary format compatibility
pub const PKM_VERSION: u16 = 1;
