//! Resolution pyramid of a spectral cube.
//!
//! Level `L` halves both spatial axes `L` times (rounding up). Levels above
//! zero are headerless raw files stored under
//! `<mip root>/<L>/<source file name>` and are generated on first use from
//! level `L - 1`.
#![allow(clippy::cast_possible_truncation)]

use rayon::prelude::*;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use xrfcube_core::CubeGeometry;
use xrfcube_io::{encode_samples, remove_if_exists, AtomicFileWriter, Error, RawCube, Result};

/// Smallest level whose pixel budget `max_points * 4^L` covers `selected` pixels.
///
/// Returns 0 for empty selections and never exceeds `max_level`.
#[must_use]
pub fn choose_level(selected: u64, max_points: u64, max_level: u32) -> u32 {
    let max_points = max_points.max(1);
    let mut level = 0;
    let mut budget = max_points;
    while budget < selected && level < max_level {
        budget = budget.saturating_mul(4);
        level += 1;
    }
    level
}

/// Lazily materialised mip levels of one spectral cube.
pub struct Pyramid {
    source: RawCube,
    mip_root: PathBuf,
}

impl Pyramid {
    /// Wraps the level 0 cube; derived levels live under `mip_root`.
    #[must_use]
    pub fn new(source: RawCube, mip_root: impl Into<PathBuf>) -> Self {
        Self {
            source,
            mip_root: mip_root.into(),
        }
    }

    #[must_use]
    pub fn source(&self) -> &RawCube {
        &self.source
    }

    /// First level at which the cube is a single pixel.
    #[must_use]
    pub fn max_level(&self) -> u32 {
        let geometry = self.source.geometry();
        let mut level = 0;
        loop {
            let g = geometry.at_level(level);
            if g.width == 1 && g.height == 1 {
                return level;
            }
            level += 1;
        }
    }

    /// File holding level `level` (> 0).
    #[must_use]
    pub fn level_path(&self, level: u32) -> PathBuf {
        let name = self
            .source
            .path()
            .file_name()
            .map_or_else(|| "cube.raw".into(), ToOwned::to_owned);
        self.mip_root.join(level.to_string()).join(name)
    }

    /// Opens level `level`, generating it and any missing lower levels first.
    ///
    /// # Errors
    /// Returns an error if a level cannot be read or written.
    pub fn open_level(&self, level: u32) -> Result<RawCube> {
        if level == 0 {
            return Ok(self.source.clone());
        }
        let geometry = self.source.geometry().at_level(level);
        let path = self.level_path(level);
        match RawCube::open(&path, geometry) {
            Ok(cube) => Ok(cube),
            Err(Error::NotFound(_) | Error::DimensionMismatch(_)) => {
                let finer = self.open_level(level - 1)?;
                downsample(&finer, &path)
            }
            Err(other) => Err(other),
        }
    }

    /// Deletes every generated level.
    ///
    /// # Errors
    /// Returns an I/O error if the mip folder exists but cannot be removed.
    pub fn invalidate(mip_root: &Path) -> Result<()> {
        remove_if_exists(mip_root)?;
        tracing::debug!(path = %mip_root.display(), "removed mip levels");
        Ok(())
    }
}

fn downsample_row(finer: &RawCube, coarse: &CubeGeometry, row: u32) -> Result<Vec<u8>> {
    let fine = finer.geometry();
    let depth = fine.channel_depth as usize;
    let rows = (row * 2)..(row * 2 + 2).min(fine.height);
    let mut sums = vec![0u64; depth];
    let mut vector = Vec::with_capacity(depth);
    let mut means = vec![0u32; depth];
    let mut bytes = Vec::with_capacity((u64::from(coarse.width) * coarse.vector_byte_len()) as usize);

    for col in 0..coarse.width {
        sums.iter_mut().for_each(|s| *s = 0);
        let cols = (col * 2)..(col * 2 + 2).min(fine.width);
        let mut count = 0u64;
        for r in rows.clone() {
            for c in cols.clone() {
                vector.clear();
                fine.decode_into(finer.vector_bytes(r, c)?, &mut vector);
                for (sum, v) in sums.iter_mut().zip(&vector) {
                    *sum += u64::from(*v);
                }
                count += 1;
            }
        }
        for (mean, sum) in means.iter_mut().zip(&sums) {
            *mean = (sum / count) as u32;
        }
        encode_samples(coarse, &means, &mut bytes);
    }
    Ok(bytes)
}

/// Writes the next coarser level of `finer` to `path` and opens it.
///
/// # Errors
/// Returns an error if reading `finer` or writing `path` fails.
pub fn downsample(finer: &RawCube, path: &Path) -> Result<RawCube> {
    let coarse = finer.geometry().at_level(1);
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }

    let rows = (0..coarse.height)
        .into_par_iter()
        .map(|row| downsample_row(finer, &coarse, row))
        .collect::<Result<Vec<_>>>()?;

    let mut writer = AtomicFileWriter::create(path)?;
    for bytes in rows {
        writer.write_all(&bytes)?;
    }
    writer.commit()?;

    tracing::info!(
        path = %path.display(),
        width = coarse.width,
        height = coarse.height,
        "generated mip level"
    );
    RawCube::open(path, coarse)
}
