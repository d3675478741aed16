//! I/O error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File or directory does not exist.
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Fewer bytes on disk than the header promises.
    #[error("{} is truncated: expected {expected} bytes, found {actual}", .path.display())]
    Truncated {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    /// File size disagrees with the declared dimensions.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// No codec for this file.
    #[error("unsupported format: {0}")]
    FormatUnsupported(String),

    /// Invalid file contents.
    #[error("invalid file format: {0}")]
    InvalidFormat(String),

    /// Malformed delimited text.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Workspace JSON error.
    #[error("workspace JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Image header could not be read.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] xrfcube_core::Error),
}

impl Error {
    /// Maps `ErrorKind::NotFound` to [`Error::NotFound`] for `path`.
    pub(crate) fn from_io_at(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path.into())
        } else {
            Self::Io(err)
        }
    }
}
