//! Point-file reading and centroid output
//!
//! Point files are text:
//! - line 1: point count
//! - every further line: `<index> <x0> <x1> ...` (index ignored)
//!
//! Centroid files are binary, one file per run:
//! - magic `PKMC`, u16 version, u32 K, u32 D, u32 iterations, u8 converged
//! - K × D f64 values, row-major, native byte order

use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{ClusterError, Result};
use crate::types::{CentroidSet, ClusterOutcome, FlatMatrix, PointSet};
use crate::{PKM_MAGIC, PKM_VERSION};

/// Load a point file from disk
pub fn read_points<P: AsRef<Path>>(path: P) -> Result<PointSet> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let points = parse_points(BufReader::new(file))?;

    debug!(path = %path.display(), n = points.n(), d = points.d(), "loaded points");
    Ok(points)
}

/// Parse the text point format from any buffered reader
pub fn parse_points<R: BufRead>(reader: R) -> Result<PointSet> {
    let mut lines = reader.lines();

    // The first line is the number of points
    let header = lines
        .next()
        .ok_or_else(|| ClusterError::input(1, "empty input"))??;
    let count_field = header
        .split_whitespace()
        .next()
        .ok_or_else(|| ClusterError::input(1, "missing point count"))?;
    let n: usize = count_field
        .parse()
        .map_err(|_| ClusterError::input(1, format!("non-int point count '{}'", count_field)))?;
    if n == 0 {
        return Err(ClusterError::input(1, "point count must be positive"));
    }

    let mut data: Vec<f64> = Vec::new();
    let mut d = 0usize;
    let mut rows = 0usize;

    for (offset, line) in lines.enumerate() {
        let line_no = offset + 2;
        let line = line?;
        let mut fields = line.split_whitespace();

        // Skip the leading point number; blank lines carry nothing
        if fields.next().is_none() {
            continue;
        }
        if rows == n {
            return Err(ClusterError::input(
                line_no,
                format!("more points than the declared {}", n),
            ));
        }

        let start = data.len();
        for field in fields {
            let value: f64 = field
                .parse()
                .map_err(|_| ClusterError::input(line_no, format!("non-float '{}'", field)))?;
            data.push(value);
        }
        let width = data.len() - start;

        if rows == 0 {
            if width == 0 {
                return Err(ClusterError::input(line_no, "point has no coordinates"));
            }
            d = width;
        } else if width != d {
            return Err(ClusterError::input(
                line_no,
                format!("expected {} coordinates, found {}", d, width),
            ));
        }
        rows += 1;
    }

    if rows != n {
        return Err(ClusterError::input(
            rows + 2,
            format!("declared {} points but found {}", n, rows),
        ));
    }

    FlatMatrix::from_vec(data, n, d)
        .map(PointSet::new)
        .ok_or_else(|| ClusterError::Invariant("point buffer has the wrong length".into()))
}

/// One line per centroid: its index then each coordinate to six decimals
pub fn format_centroids(centroids: &CentroidSet) -> String {
    let mut out = String::new();

    for (idx, centroid) in centroids.iter_rows().enumerate() {
        let _ = write!(out, "{}", idx);
        for value in centroid {
            let _ = write!(out, " {:.6}", value);
        }
        out.push('\n');
    }

    out
}

/// Write the final centroids of a run to a binary file
pub fn write_centroids<P: AsRef<Path>>(outcome: &ClusterOutcome, path: P) -> io::Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    let centroids = &outcome.centroids;

    // Header
    file.write_all(&PKM_MAGIC.to_le_bytes())?;
    file.write_all(&PKM_VERSION.to_le_bytes())?;

    // Shape and run summary
    file.write_all(&(centroids.k() as u32).to_le_bytes())?;
    file.write_all(&(centroids.d() as u32).to_le_bytes())?;
    file.write_all(&(outcome.iterations as u32).to_le_bytes())?;
    file.write_all(&[outcome.converged as u8])?;

    // Payload
    let bytes: &[u8] = bytemuck::cast_slice(&centroids.data);
    file.write_all(bytes)?;

    file.flush()
}

/// Read a centroid file written by [`write_centroids`]
pub fn read_centroids<P: AsRef<Path>>(path: P) -> io::Result<ClusterOutcome> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut file = BufReader::new(file);

    // Read and verify header
    let mut magic = [0u8; 4];
    file.read_exact(&mut magic)?;
    if u32::from_le_bytes(magic) != PKM_MAGIC {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "Invalid centroid file magic number",
        ));
    }

    let mut version = [0u8; 2];
    file.read_exact(&mut version)?;
    if u16::from_le_bytes(version) != PKM_VERSION {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Unsupported centroid file version: {}", u16::from_le_bytes(version)),
        ));
    }

    let k = read_u32(&mut file)? as usize;
    let d = read_u32(&mut file)? as usize;
    let iterations = read_u32(&mut file)? as usize;

    let mut flag = [0u8; 1];
    file.read_exact(&mut flag)?;
    let converged = flag[0] != 0;

    // The header must agree with the payload actually present before we allocate
    let expected = k
        .checked_mul(d)
        .and_then(|len| len.checked_mul(std::mem::size_of::<f64>()))
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "Centroid shape overflows"))?;
    let available = file_len.saturating_sub(CENTROID_HEADER_LEN);
    if expected as u64 != available {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "Centroid payload is {} bytes, header declares {}x{} ({} bytes)",
                available, k, d, expected
            ),
        ));
    }

    // Read straight into f64 storage so alignment is never an issue
    let mut values = vec![0.0f64; k * d];
    file.read_exact(bytemuck::cast_slice_mut(&mut values))?;

    let matrix = FlatMatrix::from_vec(values, k, d)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "Bad centroid shape"))?;

    Ok(ClusterOutcome {
        centroids: CentroidSet::new(matrix),
        iterations,
        converged,
    })
}

/// Magic, version, K, D, iterations, converged flag
const CENTROID_HEADER_LEN: u64 = 4 + 2 + 4 + 4 + 4 + 1;

fn read_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}
