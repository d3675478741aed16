//! Data source level operations.
//!
//! [`CubeService`] resolves files through a [`DataSourceStore`] and runs the
//! codecs, binning and aggregation on them. Calls are synchronous; binning
//! must not run concurrently with other calls on the same data source.

use crate::aggregate::{average_global, RegionAggregator};
use crate::binning::{bin_cube, clamp_to_depth, BinReport};
use crate::elemental::{element_averages, element_averages_for_selection, ElementAverage};
use crate::pyramid::Pyramid;
use crate::Result;
use ndarray::Array2;
use serde::Serialize;
use std::path::{Path, PathBuf};
use xrfcube_core::{
    CoordinateMapper, CubeConfig, CubeFormat, DataSourceStore, ImageSize, PixelRect,
    SelectionMask, SpectralParams,
};
use xrfcube_io::{
    read_csv, read_element_names, read_elemental_cube, read_layout, remove_if_exists, write_dms,
    DmsReader, RawCube, SpectralLayout,
};

/// Folder below the generated folder that holds mip levels.
pub const MIPMAP_FOLDER_NAME: &str = "mipmaps";

/// Shape of an elemental cube file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CubeDimensions {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    /// Bytes before the payload; 0 for text encodings.
    pub header_size: u64,
}

/// Result of [`CubeService::bin_raw_data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum BinOutcome {
    Binned(BinReport),
    AlreadyBinned,
}

/// Result of [`CubeService::convert_cube_to_native_format`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ConversionOutcome {
    Converted { path: PathBuf },
    AlreadyNative,
}

/// Grid a selection rectangle is projected onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionTarget {
    Spectral,
    Elemental,
}

/// Cube operations for every data source known to `S`.
pub struct CubeService<S> {
    config: CubeConfig,
    store: S,
}

impl<S: DataSourceStore> CubeService<S> {
    /// # Errors
    /// Returns an error if `config` is invalid.
    pub fn new(config: CubeConfig, store: S) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, store })
    }

    #[must_use]
    pub fn config(&self) -> &CubeConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Folder holding the mip levels of `data_source`.
    #[must_use]
    pub fn mip_root(&self, data_source: &str) -> PathBuf {
        self.config.generated_dir(data_source).join(MIPMAP_FOLDER_NAME)
    }

    fn elemental_path(&self, data_source: &str, cube_name: Option<&str>) -> Result<(PathBuf, CubeFormat)> {
        let path = self.store.elemental_cube_path(data_source, cube_name)?;
        let format = CubeFormat::from_path(&path)?;
        Ok((path, format))
    }

    fn spectral_layout(&self, data_source: &str) -> Result<(PathBuf, PathBuf, SpectralLayout)> {
        let paths = self.store.cube_paths(data_source)?;
        let layout = read_layout(&paths.metadata_path)?;
        Ok((paths.raw_path, paths.metadata_path, layout))
    }

    fn open_spectral(&self, data_source: &str) -> Result<RawCube> {
        let (raw_path, _, layout) = self.spectral_layout(data_source)?;
        Ok(RawCube::open(raw_path, layout.geometry)?)
    }

    /// Dimensions and header size of the first elemental cube.
    ///
    /// # Errors
    /// Returns an error if the cube cannot be resolved or read.
    pub fn cube_dimensions(&self, data_source: &str) -> Result<CubeDimensions> {
        let (path, format) = self.elemental_path(data_source, None)?;
        elemental_dimensions(&path, format)
    }

    /// Channel names of the first elemental cube.
    ///
    /// # Errors
    /// Returns an error if the cube cannot be resolved or read.
    pub fn element_names(&self, data_source: &str) -> Result<Vec<String>> {
        let (path, format) = self.elemental_path(data_source, None)?;
        Ok(read_element_names(path, format)?)
    }

    /// Average of every normalised element layer.
    ///
    /// # Errors
    /// Returns an error if the cube cannot be resolved or read.
    pub fn element_averages(&self, data_source: &str) -> Result<Vec<ElementAverage>> {
        let (path, format) = self.elemental_path(data_source, None)?;
        let cube = read_elemental_cube(&path, format)?;
        let averages = element_averages(&cube);
        tracing::info!(data_source, elements = averages.len(), "computed element averages");
        Ok(averages)
    }

    /// Average of every normalised element layer over a selection of the elemental grid.
    ///
    /// # Errors
    /// Returns an error if the cube cannot be read or `mask` does not match it.
    pub fn element_averages_for_selection(
        &self,
        data_source: &str,
        mask: &SelectionMask,
    ) -> Result<Vec<ElementAverage>> {
        let (path, format) = self.elemental_path(data_source, None)?;
        let cube = read_elemental_cube(&path, format)?;
        element_averages_for_selection(&cube, mask)
    }

    /// One element layer of the first elemental cube as a `height x width` grid.
    ///
    /// # Errors
    /// Returns an invalid-parameter error if `channel` is out of range.
    pub fn element_map(&self, data_source: &str, channel: u32) -> Result<Array2<f32>> {
        let (path, format) = self.elemental_path(data_source, None)?;
        if format == CubeFormat::Dms {
            return Ok(DmsReader::open(&path)?.read_layer(channel)?);
        }
        let cube = read_elemental_cube(&path, format)?;
        if channel as usize >= cube.channels() {
            return Err(xrfcube_core::Error::InvalidParameter(format!(
                "channel {channel} out of range 0..{}",
                cube.channels()
            ))
            .into());
        }
        Ok(cube.layer(channel as usize).to_owned())
    }

    /// Rewrites the named elemental cube as DMS next to the original.
    ///
    /// The workspace is pointed at the new file before the old one is removed.
    ///
    /// # Errors
    /// Returns an error if the cube is unknown, not elemental, or any step fails;
    /// the original file is kept in that case.
    pub fn convert_cube_to_native_format(
        &self,
        data_source: &str,
        cube_name: &str,
    ) -> Result<ConversionOutcome> {
        let (path, format) = self.elemental_path(data_source, Some(cube_name))?;
        match format {
            CubeFormat::Dms => return Ok(ConversionOutcome::AlreadyNative),
            CubeFormat::Csv => {}
            CubeFormat::Raw => {
                return Err(xrfcube_core::Error::FormatUnsupported(format!(
                    "cannot convert {} to DMS",
                    path.display()
                ))
                .into());
            }
        }

        let cube = read_csv(&path)?;
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| xrfcube_core::Error::InvalidParameter(format!("{} has no file name", path.display())))?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let written = write_dms(dir, stem, &cube)?;

        let file_name = format!("{stem}.{}", CubeFormat::Dms.extension());
        self.store.relocate_elemental_cube(data_source, cube_name, &file_name)?;
        remove_if_exists(&path)?;

        tracing::info!(data_source, from = %path.display(), to = %written.display(), "converted elemental cube");
        Ok(ConversionOutcome::Converted { path: written })
    }

    /// Persisted spectral params.
    ///
    /// # Errors
    /// Returns a not-found error if the data source has no workspace entry.
    pub fn spectral_params(&self, data_source: &str) -> Result<SpectralParams> {
        Ok(self.store.spectral_params(data_source)?)
    }

    /// Energy of channel 0 of the spectral cube, in keV.
    ///
    /// # Errors
    /// Returns an error if the sidecar cannot be read.
    pub fn energy_offset(&self, data_source: &str) -> Result<f64> {
        let (_, _, layout) = self.spectral_layout(data_source)?;
        Ok(layout.scale.origin)
    }

    /// Bins the spectral cube with the persisted params, once.
    ///
    /// Energy-valued params are converted to channels and stored as binned
    /// before the cube is rewritten. If the rewrite fails the original params
    /// are restored and the cube is left as it was. If only the final sidecar
    /// swap fails the binned params are kept, matching the cube on disk.
    ///
    /// # Errors
    /// Returns an error if metadata, params or the cube are unusable, or a write fails.
    pub fn bin_raw_data(&self, data_source: &str) -> Result<BinOutcome> {
        let params = self.store.spectral_params(data_source)?;
        if params.binned {
            tracing::debug!(data_source, "spectral cube already binned");
            return Ok(BinOutcome::AlreadyBinned);
        }

        let (raw_path, metadata_path, layout) = self.spectral_layout(data_source)?;
        let range = params.to_channel_range(&layout.scale)?;
        let range = clamp_to_depth(range, layout.geometry.channel_depth)?;

        self.store
            .persist_spectral_params(data_source, &SpectralParams::from_channel_range(&range))?;

        match bin_cube(&raw_path, &metadata_path, layout.geometry, range) {
            Ok(report) => {
                if report.rewritten {
                    Pyramid::invalidate(&self.mip_root(data_source))?;
                }
                Ok(BinOutcome::Binned(report))
            }
            Err(err) if err.cube_committed() => {
                tracing::error!(data_source, error = %err, "cube binned but sidecar is stale; keeping binned params");
                if let Err(stale) = Pyramid::invalidate(&self.mip_root(data_source)) {
                    tracing::error!(data_source, error = %stale, "could not remove mip levels");
                }
                Err(err)
            }
            Err(err) => {
                tracing::error!(data_source, error = %err, "binning failed; restoring spectral params");
                if let Err(restore) = self.store.persist_spectral_params(data_source, &params) {
                    tracing::error!(data_source, error = %restore, "could not restore spectral params");
                }
                Err(err)
            }
        }
    }

    /// Exact mean spectrum over the whole cube.
    ///
    /// # Errors
    /// Returns an error if the cube cannot be read.
    pub fn average_spectrum_global(&self, data_source: &str) -> Result<Vec<f64>> {
        let cube = self.open_spectral(data_source)?;
        let spectrum = average_global(&cube)?;
        tracing::info!(data_source, channels = spectrum.len(), "computed global average spectrum");
        Ok(spectrum)
    }

    /// Mean spectrum over a selection of the full-resolution spectral grid.
    ///
    /// # Errors
    /// Returns an error if `mask` does not match the cube or a mip level cannot be read.
    pub fn average_spectrum_for_selection(
        &self,
        data_source: &str,
        mask: &SelectionMask,
    ) -> Result<Vec<f64>> {
        let pyramid = Pyramid::new(self.open_spectral(data_source)?, self.mip_root(data_source));
        let average = RegionAggregator::new(data_source, &pyramid, self.config.max_spectrum_points)
            .average(mask)?;
        tracing::info!(data_source, level = average.level, "computed selection average spectrum");
        Ok(average.spectrum)
    }

    /// Size of the grid `target` of `data_source`.
    ///
    /// # Errors
    /// Returns an error if the cube cannot be resolved or read.
    pub fn target_size(&self, data_source: &str, target: SelectionTarget) -> Result<ImageSize> {
        match target {
            SelectionTarget::Spectral => {
                let (_, _, layout) = self.spectral_layout(data_source)?;
                Ok(ImageSize::new(layout.geometry.width, layout.geometry.height))
            }
            SelectionTarget::Elemental => {
                let dims = self.cube_dimensions(data_source)?;
                Ok(ImageSize::new(dims.width, dims.height))
            }
        }
    }

    /// Selection of the cube grid covered by `rect`, drawn on the base image.
    ///
    /// # Errors
    /// Returns an error if the base image or the target cube cannot be resolved.
    pub fn mask_for_image_rectangle(
        &self,
        data_source: &str,
        rect: &PixelRect,
        target: SelectionTarget,
    ) -> Result<SelectionMask> {
        let image = self.store.base_image_size(data_source)?;
        let grid = self.target_size(data_source, target)?;
        let mapped = CoordinateMapper::new(image, grid)?.map_rect(rect).normalized();
        tracing::debug!(data_source, ?rect, ?mapped, "mapped selection rectangle");
        Ok(SelectionMask::from_rect(grid.width, grid.height, &mapped))
    }
}

fn elemental_dimensions(path: &Path, format: CubeFormat) -> Result<CubeDimensions> {
    if format == CubeFormat::Dms {
        let header = *DmsReader::open(path)?.header();
        return Ok(CubeDimensions {
            width: header.width,
            height: header.height,
            channels: header.channels,
            header_size: header.header_len,
        });
    }
    let cube = read_elemental_cube(path, format)?;
    let dim = |n: usize| {
        u32::try_from(n).map_err(|_| xrfcube_core::Error::DimensionMismatch(format!("{n} exceeds u32")))
    };
    Ok(CubeDimensions {
        width: dim(cube.width())?,
        height: dim(cube.height())?,
        channels: dim(cube.channels())?,
        header_size: 0,
    })
}
