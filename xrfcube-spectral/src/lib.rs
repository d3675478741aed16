//! xrfcube-spectral: Binning and region averages for XRF cubes.
//!
//! This crate provides:
//! - **Binning** - crop and average channel groups, rewriting the cube atomically
//! - **Pyramid** - lazily generated 2x2 mip levels of a spectral cube
//! - **Aggregation** - selection averages read at a budgeted mip level
//! - **Elemental averages** - per-element means of 8-bit normalised layers
//! - **`CubeService`** - the operations above keyed by data source
//!

pub mod aggregate;
pub mod binning;
pub mod elemental;
mod error;
pub mod pyramid;
mod service;

pub use aggregate::{average_global, RegionAggregator, RegionAverage};
pub use binning::{bin_cube, bin_vector, BinReport};
pub use elemental::{element_averages, element_averages_for_selection, normalize_layer, ElementAverage};
pub use error::{Error, Result};
pub use pyramid::{choose_level, Pyramid};
pub use service::{
    BinOutcome, ConversionOutcome, CubeDimensions, CubeService, SelectionTarget, MIPMAP_FOLDER_NAME,
};
