//! Reading and rewriting metadata sidecars.

use crate::writer::AtomicFileWriter;
use crate::{Error, Result};
use std::fs;
use std::io::Write;
use std::path::Path;
use xrfcube_core::metadata::replace_value;
use xrfcube_core::{CubeGeometry, EnergyScale, Metadata};

/// Reads and parses the sidecar at `path`.
///
/// # Errors
/// Returns [`Error::NotFound`] for a missing file, an I/O error for an
/// unreadable one, and a geometry error when the file holds no entries.
pub fn read_metadata<P: AsRef<Path>>(path: P) -> Result<Metadata> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "cannot read metadata sidecar");
        Error::from_io_at(e, path)
    })?;
    let meta = Metadata::parse(&text);
    if meta.is_empty() {
        tracing::error!(path = %path.display(), "metadata sidecar is empty");
        return Err(xrfcube_core::Error::GeometryUnavailable(format!(
            "{} has no entries",
            path.display()
        ))
        .into());
    }
    Ok(meta)
}

/// Geometry and energy scale described by one sidecar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralLayout {
    pub geometry: CubeGeometry,
    pub scale: EnergyScale,
}

/// Reads a sidecar and derives geometry and energy scale from it.
///
/// # Errors
/// See [`read_metadata`], [`CubeGeometry::from_metadata`] and [`EnergyScale::from_metadata`].
pub fn read_layout<P: AsRef<Path>>(path: P) -> Result<SpectralLayout> {
    let meta = read_metadata(path)?;
    let geometry = CubeGeometry::from_metadata(&meta)?;
    let scale = EnergyScale::from_metadata(&meta)?;
    tracing::debug!(
        width = geometry.width,
        height = geometry.height,
        depth = geometry.channel_depth,
        header = geometry.header_byte_size,
        "parsed cube layout"
    );
    Ok(SpectralLayout { geometry, scale })
}

/// Writes the sidecar at `path` with `key` set to `value` into a temporary
/// sibling, without replacing the original.
///
/// Dropping the returned writer discards the change; committing it swaps the
/// new sidecar in.
///
/// # Errors
/// Returns an error if the sidecar cannot be read or the new copy written.
pub fn stage_metadata_value<P: AsRef<Path>>(
    path: P,
    key: &str,
    value: &str,
) -> Result<AtomicFileWriter> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| Error::from_io_at(e, path))?;
    let mut writer = AtomicFileWriter::create(path)?;
    writer.write_all(replace_value(&text, key, value).as_bytes())?;
    Ok(writer)
}

/// Atomically replaces the value of `key` in the sidecar at `path`.
///
/// # Errors
/// Returns an error if the sidecar cannot be read or written back.
pub fn rewrite_metadata_value<P: AsRef<Path>>(path: P, key: &str, value: &str) -> Result<()> {
    stage_metadata_value(path, key, value)?.commit()?;
    Ok(())
}
