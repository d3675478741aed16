//! Region averages over spectral cubes.
#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]

use crate::pyramid::{choose_level, Pyramid};
use crate::{Error, Result};
use rayon::prelude::*;
use xrfcube_core::SelectionMask;
use xrfcube_io::RawCube;

/// Mean spectrum with the level it was computed at.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionAverage {
    pub level: u32,
    pub spectrum: Vec<f64>,
}

/// Averages selections over the coarsest level that keeps reads within budget.
pub struct RegionAggregator<'a> {
    data_source: &'a str,
    pyramid: &'a Pyramid,
    max_points: u64,
}

impl<'a> RegionAggregator<'a> {
    /// `data_source` only labels errors and log events.
    #[must_use]
    pub fn new(data_source: &'a str, pyramid: &'a Pyramid, max_points: u64) -> Self {
        Self {
            data_source,
            pyramid,
            max_points,
        }
    }

    /// Level that a selection of `selected` full-resolution pixels is read at.
    #[must_use]
    pub fn level_for(&self, selected: u64) -> u32 {
        choose_level(selected, self.max_points, self.pyramid.max_level())
    }

    /// Mean spectrum of the pixels selected in `mask`.
    ///
    /// `mask` covers the full-resolution grid. An empty selection yields a
    /// zero spectrum. For larger selections the mask is projected onto the
    /// chosen level, where a coarse cell counts as selected if any pixel
    /// under it is.
    ///
    /// # Errors
    /// Returns an invalid-parameter error if the mask does not match the cube
    /// and [`Error::Aggregation`] if the chosen level cannot be read.
    pub fn average(&self, mask: &SelectionMask) -> Result<RegionAverage> {
        let geometry = *self.pyramid.source().geometry();
        if mask.width() != geometry.width || mask.height() != geometry.height {
            return Err(xrfcube_core::Error::InvalidParameter(format!(
                "mask is {}x{} but the cube is {}x{}",
                mask.width(),
                mask.height(),
                geometry.width,
                geometry.height
            ))
            .into());
        }

        let depth = geometry.channel_depth as usize;
        let selected = mask.count_selected();
        if selected == 0 {
            return Ok(RegionAverage {
                level: 0,
                spectrum: vec![0.0; depth],
            });
        }

        let level = self.level_for(selected);
        tracing::debug!(data_source = self.data_source, selected, level, "averaging selection");
        let context = |source: xrfcube_io::Error| Error::Aggregation {
            data_source: self.data_source.to_string(),
            level,
            source,
        };
        let cube = self.pyramid.open_level(level).map_err(context)?;
        let cells: Vec<(u32, u32)> = mask.downsample(level).iter_selected().collect();

        let sums = sum_vectors(&cube, &cells, depth).map_err(context)?;
        let count = cells.len() as f64;
        Ok(RegionAverage {
            level,
            spectrum: sums.into_iter().map(|s| s / count).collect(),
        })
    }
}

fn sum_vectors(cube: &RawCube, cells: &[(u32, u32)], depth: usize) -> xrfcube_io::Result<Vec<f64>> {
    cells
        .par_iter()
        .try_fold(
            || vec![0.0f64; depth],
            |mut acc, &(row, col)| {
                cube.accumulate_vector(row, col, &mut acc)?;
                Ok::<_, xrfcube_io::Error>(acc)
            },
        )
        .try_reduce(
            || vec![0.0f64; depth],
            |mut a, b| {
                a.iter_mut().zip(b).for_each(|(x, y)| *x += y);
                Ok(a)
            },
        )
}

/// Exact per-channel mean over every pixel of `cube`.
///
/// # Errors
/// Returns an error if a row cannot be read.
pub fn average_global(cube: &RawCube) -> xrfcube_io::Result<Vec<f64>> {
    let geometry = *cube.geometry();
    let depth = geometry.channel_depth as usize;
    let sample_width = usize::from(geometry.sample_byte_width);

    let sums = (0..geometry.height)
        .into_par_iter()
        .try_fold(
            || vec![0u64; depth],
            |mut acc, row| {
                let bytes = cube.row_bytes(row)?;
                for (i, chunk) in bytes.chunks_exact(sample_width).enumerate() {
                    acc[i % depth] += u64::from(geometry.decode_sample(chunk));
                }
                Ok::<_, xrfcube_io::Error>(acc)
            },
        )
        .try_reduce(
            || vec![0u64; depth],
            |mut a, b| {
                a.iter_mut().zip(b).for_each(|(x, y)| *x += y);
                Ok(a)
            },
        )?;

    let pixels = geometry.pixel_count() as f64;
    Ok(sums.into_iter().map(|s| s as f64 / pixels).collect())
}
