//! Channel binning of spectral cubes.
//!
//! The cube is cropped to `[low, high)` and every run of `bin_size` channels
//! is replaced by its mean, truncated to the sample type. The new sidecar is
//! staged before the cube is touched; the cube is then swapped in, followed by
//! the sidecar.
#![allow(clippy::cast_possible_truncation)]

use crate::{Error, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use xrfcube_core::metadata::KEY_DEPTH;
use xrfcube_core::{ChannelRange, CubeGeometry};
use xrfcube_io::{encode_samples, stage_metadata_value, AtomicFileWriter, RawCube};

/// Rows encoded per parallel batch before being written out.
const ROWS_PER_BATCH: u32 = 64;

/// Outcome of one binning run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BinReport {
    pub source_depth: u32,
    pub output_depth: u32,
    pub range: ChannelRange,
    /// False when the range was an identity and the file was left alone.
    pub rewritten: bool,
}

/// Clamps `range` to a cube of `depth` channels.
///
/// # Errors
/// Returns an invalid-parameter error if the range starts at or past `depth`.
pub fn clamp_to_depth(range: ChannelRange, depth: u32) -> Result<ChannelRange> {
    if range.low >= depth {
        return Err(xrfcube_core::Error::InvalidParameter(format!(
            "channel {} is past the cube depth {depth}",
            range.low
        ))
        .into());
    }
    Ok(ChannelRange::new(range.low, range.high.min(depth), range.bin_size)?)
}

/// Averages each bin of `range` over `vector`, appending one value per bin.
///
/// `vector` holds the full channel vector of one pixel.
pub fn bin_vector(vector: &[u32], range: &ChannelRange, out: &mut Vec<u32>) {
    out.extend((0..range.bin_count()).map(|k| {
        let (start, end) = range.bin_bounds(k);
        let group = &vector[start as usize..end as usize];
        let sum: u64 = group.iter().map(|&v| u64::from(v)).sum();
        (sum / group.len() as u64) as u32
    }));
}

fn bin_row(cube: &RawCube, row: u32, range: &ChannelRange, target: &CubeGeometry) -> Result<Vec<u8>> {
    let geometry = cube.geometry();
    let mut vector = Vec::with_capacity(geometry.channel_depth as usize);
    let mut binned = Vec::with_capacity(target.channel_depth as usize);
    let mut bytes = Vec::with_capacity((u64::from(target.width) * target.vector_byte_len()) as usize);
    let row_bytes = cube.row_bytes(row)?;
    for pixel in row_bytes.chunks_exact(geometry.vector_byte_len() as usize) {
        vector.clear();
        binned.clear();
        geometry.decode_into(pixel, &mut vector);
        bin_vector(&vector, range, &mut binned);
        encode_samples(target, &binned, &mut bytes);
    }
    Ok(bytes)
}

/// Rebins the raw cube at `raw_path` in place.
///
/// `range` must already be in channel units. Both the cube and the sidecar at
/// `metadata_path` are written to temporary siblings first, so any failure
/// before the cube rename leaves both files untouched.
///
/// # Errors
/// Returns an error if the cube size disagrees with `geometry`, the range
/// lies outside the cube, or any write fails. [`Error::SidecarNotUpdated`]
/// means the cube was already replaced.
pub fn bin_cube(
    raw_path: &Path,
    metadata_path: &Path,
    geometry: CubeGeometry,
    range: ChannelRange,
) -> Result<BinReport> {
    let range = clamp_to_depth(range, geometry.channel_depth)?;
    let source_depth = geometry.channel_depth;
    if range.is_identity_for(source_depth) {
        tracing::info!(path = %raw_path.display(), "binning range is an identity; cube kept");
        return Ok(BinReport {
            source_depth,
            output_depth: source_depth,
            range,
            rewritten: false,
        });
    }

    let cube = RawCube::open(raw_path, geometry)?;
    let target = geometry.with_channel_depth(range.bin_count());
    let sidecar = stage_metadata_value(metadata_path, KEY_DEPTH, &target.channel_depth.to_string())?;

    let mut writer = AtomicFileWriter::create(raw_path)?;
    writer
        .write_all(cube.header_bytes())
        .map_err(xrfcube_io::Error::from)?;

    let mut row = 0;
    while row < geometry.height {
        let end = (row + ROWS_PER_BATCH).min(geometry.height);
        let batch = (row..end)
            .into_par_iter()
            .map(|r| bin_row(&cube, r, &range, &target))
            .collect::<Result<Vec<_>>>()?;
        for bytes in batch {
            writer.write_all(&bytes).map_err(xrfcube_io::Error::from)?;
        }
        row = end;
    }
    drop(cube);
    writer.commit()?;

    sidecar.commit().map_err(|source| Error::SidecarNotUpdated {
        path: metadata_path.to_path_buf(),
        depth: target.channel_depth,
        source,
    })?;

    tracing::info!(
        path = %raw_path.display(),
        source_depth,
        output_depth = target.channel_depth,
        low = range.low,
        high = range.high,
        bin_size = range.bin_size,
        "binned spectral cube"
    );
    Ok(BinReport {
        source_depth,
        output_depth: target.channel_depth,
        range,
        rewritten: true,
    })
}
