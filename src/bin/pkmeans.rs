//! pkmeans command-line interface
//!
//! ```bash
//! pkmeans --input points.txt --clusters 16 --workers 8 --threshold 1e-6 --seed 8675309 --centroids
//! ```

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use pkmeans::{ClusterConfig, EmptyClusterPolicy};

/// Parallel k-means clustering
#[derive(Parser, Debug)]
#[command(name = "pkmeans")]
#[command(about = "Cluster a point file with k-means on a fixed pool of worker threads")]
struct Args {
    /// Path to the input point file.
    #[arg(long)]
    input: PathBuf,

    /// Convergence threshold on squared centroid movement.
    #[arg(long)]
    threshold: f64,

    /// Number of clusters.
    #[arg(long)]
    clusters: usize,

    /// Number of worker threads computing assignments.
    #[arg(long)]
    workers: usize,

    /// Seed for the initial centroid draw.
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Print the final centroids.
    #[arg(long)]
    centroids: bool,

    /// Stop after this many iterations even without convergence.
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Also write the final centroids to this binary file.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Abort when a cluster ends up with no points instead of keeping its old centroid.
    #[arg(long)]
    fail_on_empty: bool,

    /// Verbose output.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging; stdout is reserved for the report
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to install log subscriber")?;

    if args.clusters == 0 || args.workers == 0 || !(args.threshold > 0.0) {
        bail!("--clusters, --workers and --threshold must all be positive");
    }

    let points = pkmeans::read_points(&args.input)
        .with_context(|| format!("failed to load points from {}", args.input.display()))?;

    let config = ClusterConfig {
        clusters: args.clusters,
        workers: args.workers,
        threshold: args.threshold,
        seed: args.seed,
        max_iterations: args.max_iterations,
        empty_cluster: if args.fail_on_empty {
            EmptyClusterPolicy::Fail
        } else {
            EmptyClusterPolicy::KeepPrevious
        },
    };

    // Timing covers clustering only, not loading
    let start = Instant::now();
    let outcome = pkmeans::cluster(&points, &config).context("clustering failed")?;
    let elapsed = start.elapsed();

    let total_ms = elapsed.as_secs_f64() * 1000.0;
    println!("Total time (ms): {:.0}", total_ms);
    println!(
        "Iterations to convergence: {}; time per iteration (ms): {:.3}",
        outcome.iterations,
        total_ms / outcome.iterations as f64
    );
    if !outcome.converged {
        println!("Stopped at the iteration cap before converging");
    }

    if args.centroids {
        print!("{}", pkmeans::format_centroids(&outcome.centroids));
    }

    if let Some(path) = &args.output {
        pkmeans::write_centroids(&outcome, path)
            .with_context(|| format!("failed to write centroids to {}", path.display()))?;
    }

    Ok(())
}
