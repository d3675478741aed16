//! Error types for xrfcube-spectral.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for spectral operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Spectral processing errors.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] xrfcube_core::Error),

    #[error(transparent)]
    Io(#[from] xrfcube_io::Error),

    /// The binned cube replaced the source, but its sidecar still holds the old depth.
    #[error(
        "binned cube was committed but sidecar {} was not updated to depth {depth}: {source}",
        .path.display()
    )]
    SidecarNotUpdated {
        path: PathBuf,
        depth: u32,
        #[source]
        source: xrfcube_io::Error,
    },

    /// A region average failed while reading pyramid level `level`.
    #[error("averaging spectra of '{data_source}' at mip level {level} failed: {source}")]
    Aggregation {
        data_source: String,
        level: u32,
        #[source]
        source: xrfcube_io::Error,
    },
}

impl Error {
    /// True if the spectral cube on disk was already rewritten when the error occurred.
    #[must_use]
    pub fn cube_committed(&self) -> bool {
        matches!(self, Self::SidecarNotUpdated { .. })
    }

    /// True if the error reports a missing file or workspace entry.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Core(xrfcube_core::Error::NotFound(_))
                | Self::Io(xrfcube_io::Error::NotFound(_))
                | Self::Io(xrfcube_io::Error::CoreError(xrfcube_core::Error::NotFound(_)))
                | Self::Aggregation {
                    source: xrfcube_io::Error::NotFound(_),
                    ..
                }
        )
    }
}
