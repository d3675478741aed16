//! On-disk cube encodings.

use crate::error::{Error, Result};
use std::fmt;
use std::path::Path;

/// Encoding of a cube file, resolved once from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeFormat {
    /// Channel-count-prefixed binary elemental cube (`.dms`).
    Dms,
    /// Legacy `;`-delimited elemental table (`.csv`).
    Csv,
    /// Headerless spectral sample stream described by a sidecar (`.raw`).
    Raw,
}

impl CubeFormat {
    /// Resolves the format from a file extension (case-insensitive).
    ///
    /// # Errors
    /// Returns [`Error::FormatUnsupported`] for unknown or missing extensions.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("dms") => Ok(Self::Dms),
            Some("csv") => Ok(Self::Csv),
            Some("raw") => Ok(Self::Raw),
            _ => Err(Error::FormatUnsupported(format!(
                "no cube codec for '{}'",
                path.display()
            ))),
        }
    }

    /// File extension without the dot.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Dms => "dms",
            Self::Csv => "csv",
            Self::Raw => "raw",
        }
    }

    /// True for encodings that hold an elemental cube.
    #[must_use]
    pub fn is_elemental(self) -> bool {
        matches!(self, Self::Dms | Self::Csv)
    }
}

impl fmt::Display for CubeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}
