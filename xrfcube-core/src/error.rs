//! Error types for xrfcube-core.

use thiserror::Error;

/// Result type alias for xrfcube operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for xrfcube operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file missing, unreadable or malformed.
    #[error("configuration unavailable: {0}")]
    ConfigUnavailable(String),

    /// A data source, workspace entry or file could not be resolved.
    #[error("not found: {0}")]
    NotFound(String),

    /// A caller-supplied parameter is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Cube geometry could not be derived from its metadata.
    #[error("geometry unavailable: {0}")]
    GeometryUnavailable(String),

    /// Sample layout or file format is not supported.
    #[error("unsupported format: {0}")]
    FormatUnsupported(String),

    /// Workspace records could not be read or written.
    #[error("workspace storage error: {0}")]
    Workspace(String),

    /// Array shapes disagree with each other.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),
}
