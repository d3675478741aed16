//! Memory-mapped file reader.
//!

use crate::{Error, Result};
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A memory-mapped file reader.
///
/// Uses memmap2 to access file contents without loading the entire file
/// into memory. Empty files are represented without a mapping.
#[derive(Clone)]
pub struct MappedFileReader {
    mmap: Option<Arc<Mmap>>,
    path: PathBuf,
}

impl MappedFileReader {
    /// Opens a file for memory-mapped reading.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if the file does not exist, or an I/O error
    /// if it cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::from_io_at(e, path))?;
        let len = file.metadata()?.len();
        let mmap = if len == 0 {
            None
        } else {
            // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
            // Binning replaces cube files by rename, which leaves existing mappings intact.
            #[allow(unsafe_code)]
            let mmap = unsafe { Mmap::map(&file)? };
            Some(Arc::new(mmap))
        };
        Ok(Self {
            mmap,
            path: path.to_path_buf(),
        })
    }

    /// Returns the file contents as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.mmap.as_deref().map_or(&[], |m| &m[..])
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Returns true if the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Path the reader was opened with.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `len` bytes starting at `offset`.
    ///
    /// # Errors
    /// Returns [`Error::Truncated`] if the range extends past the end of file.
    pub fn slice(&self, offset: u64, len: u64) -> Result<&[u8]> {
        let end = offset.saturating_add(len);
        let bytes = self.as_bytes();
        if end > bytes.len() as u64 {
            return Err(Error::Truncated {
                path: self.path.clone(),
                expected: end,
                actual: bytes.len() as u64,
            });
        }
        // in range of a mapped slice, so both fit in usize
        #[allow(clippy::cast_possible_truncation)]
        let range = offset as usize..end as usize;
        Ok(&bytes[range])
    }
}
