//! Contract for the workspace that owns data-source metadata.

use crate::coords::ImageSize;
use crate::error::Result;
use crate::params::SpectralParams;
use std::path::PathBuf;

/// Locations of a spectral cube and its metadata sidecar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CubePaths {
    pub raw_path: PathBuf,
    pub metadata_path: PathBuf,
}

/// Resolves files and persisted parameters of data sources.
///
/// Implementations own the workspace records; cube operations only read
/// them, except for spectral params (written by binning) and elemental cube
/// locations (written by format conversion).
pub trait DataSourceStore: Send + Sync {
    /// Paths of the spectral cube of `data_source`.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotFound`] if the data source has no spectral cube.
    fn cube_paths(&self, data_source: &str) -> Result<CubePaths>;

    /// Persisted spectral params of `data_source`.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotFound`] if no workspace entry exists.
    fn spectral_params(&self, data_source: &str) -> Result<SpectralParams>;

    /// Replaces the spectral params of `data_source`.
    ///
    /// # Errors
    /// Returns an error if the workspace cannot be written.
    fn persist_spectral_params(&self, data_source: &str, params: &SpectralParams) -> Result<()>;

    /// Pixel size of the base (reference) image of `data_source`.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotFound`] if there is no base image.
    fn base_image_size(&self, data_source: &str) -> Result<ImageSize>;

    /// Path of the named elemental cube, or of the first one when `cube_name` is `None`.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotFound`] if no such cube is registered.
    fn elemental_cube_path(&self, data_source: &str, cube_name: Option<&str>) -> Result<PathBuf>;

    /// Points the named elemental cube at `file_name` inside the data source folder.
    ///
    /// # Errors
    /// Returns an error if the cube is unknown or the workspace cannot be written.
    fn relocate_elemental_cube(&self, data_source: &str, cube_name: &str, file_name: &str) -> Result<()>;
}
