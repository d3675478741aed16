//! Atomic file writer.

use crate::{Error, Result};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Writer that replaces its destination only on [`AtomicFileWriter::commit`].
///
/// Data goes to a temporary file in the destination directory, which is
/// flushed, synced and renamed over the destination. Dropping the writer
/// without committing deletes the temporary file and leaves the destination
/// untouched.
pub struct AtomicFileWriter {
    writer: BufWriter<NamedTempFile>,
    destination: PathBuf,
}

impl AtomicFileWriter {
    /// Starts writing a replacement for `path`.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if the destination directory does not exist.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let destination = path.as_ref().to_path_buf();
        let dir = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if !dir.is_dir() {
            return Err(Error::NotFound(dir));
        }
        let temp = NamedTempFile::new_in(&dir).map_err(|e| Error::from_io_at(e, &dir))?;
        Ok(Self {
            writer: BufWriter::new(temp),
            destination,
        })
    }

    /// Destination path.
    #[must_use]
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Flushes everything to disk and renames the file into place.
    ///
    /// # Errors
    /// Returns an error if flushing, syncing or renaming fails; the
    /// destination is unchanged in that case.
    pub fn commit(self) -> Result<PathBuf> {
        let temp = self.writer.into_inner().map_err(|e| Error::Io(e.into_error()))?;
        temp.as_file().sync_all()?;
        temp.persist(&self.destination).map_err(|e| Error::Io(e.error))?;
        Ok(self.destination)
    }
}

impl Write for AtomicFileWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

/// Atomically replaces `path` with `bytes`.
///
/// # Errors
/// See [`AtomicFileWriter::create`] and [`AtomicFileWriter::commit`].
pub fn write_atomic<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<PathBuf> {
    let mut writer = AtomicFileWriter::create(path)?;
    writer.write_all(bytes)?;
    writer.commit()
}

/// Removes `path` if it exists.
///
/// # Errors
/// Returns an I/O error other than "not found".
pub fn remove_if_exists<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(Error::Io(e)),
        _ => Ok(()),
    }
}
