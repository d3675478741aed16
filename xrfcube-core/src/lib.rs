//! xrfcube-core: Core types for XRF data cubes.
//!
//! This crate holds the format-independent pieces: metadata sidecar parsing,
//! cube geometry, the energy/channel scale, persisted spectral params,
//! selections and the image/cube coordinate mapping.
//!

pub mod config;
pub mod coords;
pub mod elemental;
pub mod error;
pub mod format;
pub mod geometry;
pub mod mask;
pub mod metadata;
pub mod params;
pub mod store;
pub mod units;

pub use config::CubeConfig;
pub use coords::{CoordinateMapper, ImageSize, PixelPoint, PixelRect};
pub use elemental::{short_element_name, ElementalCube};
pub use error::{Error, Result};
pub use format::CubeFormat;
pub use geometry::{ByteOrder, CubeGeometry, RecordOrder};
pub use mask::SelectionMask;
pub use metadata::Metadata;
pub use params::SpectralParams;
pub use store::{CubePaths, DataSourceStore};
pub use units::{ChannelRange, EnergyScale};
