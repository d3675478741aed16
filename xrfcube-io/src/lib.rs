//! xrfcube-io: File I/O for XRF data cubes.
//!
//! This crate provides:
//! - Memory-mapped access to headerless spectral cubes
//! - The DMS elemental cube codec and the legacy CSV reader
//! - Metadata sidecar reading and in-place rewriting
//! - Atomic file replacement
//! - A JSON-backed data source store
//!

pub mod csv_cube;
pub mod dms;
mod error;
pub mod metadata;
pub mod raw;
pub mod reader;
pub mod workspace;
pub mod writer;

pub use csv_cube::{read_csv, read_csv_names};
pub use dms::{write_dms, DmsHeader, DmsReader};
pub use error::{Error, Result};
pub use metadata::{
    read_layout, read_metadata, rewrite_metadata_value, stage_metadata_value, SpectralLayout,
};
pub use raw::{encode_samples, RawCube};
pub use reader::MappedFileReader;
pub use workspace::{JsonWorkspace, WorkspaceFile};
pub use writer::{remove_if_exists, write_atomic, AtomicFileWriter};

use std::path::Path;
use xrfcube_core::{CubeFormat, ElementalCube};

/// Reads an elemental cube, dispatching on `format`.
///
/// # Errors
/// Returns [`Error::FormatUnsupported`] for spectral formats and any codec error otherwise.
pub fn read_elemental_cube<P: AsRef<Path>>(path: P, format: CubeFormat) -> Result<ElementalCube> {
    match format {
        CubeFormat::Dms => DmsReader::open(path)?.read_cube(),
        CubeFormat::Csv => read_csv(path),
        CubeFormat::Raw => Err(Error::FormatUnsupported(format!(
            "{} is not an elemental cube",
            path.as_ref().display()
        ))),
    }
}

/// Reads only the channel names of an elemental cube.
///
/// # Errors
/// See [`read_elemental_cube`].
pub fn read_element_names<P: AsRef<Path>>(path: P, format: CubeFormat) -> Result<Vec<String>> {
    match format {
        CubeFormat::Dms => DmsReader::open(path)?.read_names(),
        CubeFormat::Csv => read_csv_names(path),
        CubeFormat::Raw => Err(Error::FormatUnsupported(format!(
            "{} is not an elemental cube",
            path.as_ref().display()
        ))),
    }
}
