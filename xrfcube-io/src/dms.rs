//! DMS elemental cube codec.
//!
//! Layout: a version line, a `"<width> <height> <channels>"` line, then
//! `channels * height * width` little-endian `f32` samples in channel-major
//! order, then the channel names separated by newlines.
#![allow(clippy::cast_possible_truncation)]

use crate::reader::MappedFileReader;
use crate::writer::AtomicFileWriter;
use crate::{Error, Result};
use ndarray::{Array2, Array3};
use std::io::Write;
use std::path::{Path, PathBuf};
use xrfcube_core::{CubeFormat, ElementalCube};

/// Version tag written on the first line.
pub const DMS_VERSION_TAG: &str = "2";

const SAMPLE_BYTES: u64 = 4;

/// Dimensions parsed from a DMS header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmsHeader {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    /// Byte offset of the first sample.
    pub header_len: u64,
}

impl DmsHeader {
    fn parse(bytes: &[u8], path: &Path) -> Result<Self> {
        let invalid = |msg: &str| Error::InvalidFormat(format!("{}: {msg}", path.display()));

        let first = bytes
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| invalid("missing version line"))?;
        let second = bytes[first + 1..]
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| invalid("missing dimension line"))?
            + first
            + 1;

        let line = std::str::from_utf8(&bytes[first + 1..second])
            .map_err(|_| invalid("dimension line is not ASCII"))?;
        let dims = line
            .split_whitespace()
            .map(str::parse::<u32>)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| invalid("dimension line is not numeric"))?;
        let [width, height, channels] = dims[..] else {
            return Err(invalid("dimension line needs three values"));
        };

        let header_len = second as u64 + 1;
        // every later offset is bounded by this sum
        u64::from(width)
            .checked_mul(u64::from(height))
            .and_then(|n| n.checked_mul(u64::from(channels)))
            .and_then(|n| n.checked_mul(SAMPLE_BYTES))
            .and_then(|n| n.checked_add(header_len))
            .ok_or_else(|| {
                Error::DimensionMismatch(format!(
                    "{}: {width}x{height}x{channels} payload exceeds the addressable file size",
                    path.display()
                ))
            })?;

        Ok(Self {
            width,
            height,
            channels,
            header_len,
        })
    }

    /// Samples in one channel plane.
    #[must_use]
    pub fn plane_len(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn payload_len(&self) -> u64 {
        self.plane_len() * u64::from(self.channels) * SAMPLE_BYTES
    }

    /// Byte offset of the names trailer.
    #[must_use]
    pub fn names_offset(&self) -> u64 {
        self.header_len + self.payload_len()
    }
}

/// Memory-mapped DMS file.
pub struct DmsReader {
    reader: MappedFileReader,
    header: DmsHeader,
}

impl DmsReader {
    /// Opens a DMS file and validates its size against the header.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`], [`Error::InvalidFormat`] for a malformed
    /// header, [`Error::DimensionMismatch`] if the declared payload overflows,
    /// or [`Error::Truncated`] if the payload is incomplete.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = MappedFileReader::open(path)?;
        let header = DmsHeader::parse(reader.as_bytes(), reader.path())?;
        // validates the payload range up front
        reader.slice(header.header_len, header.payload_len())?;
        Ok(Self { reader, header })
    }

    #[must_use]
    pub fn header(&self) -> &DmsHeader {
        &self.header
    }

    /// Channel names from the trailer, one per line.
    ///
    /// # Errors
    /// Returns [`Error::InvalidFormat`] if the trailer is not UTF-8.
    pub fn read_names(&self) -> Result<Vec<String>> {
        let bytes = &self.reader.as_bytes()[self.header.names_offset() as usize..];
        let text = std::str::from_utf8(bytes).map_err(|e| {
            Error::InvalidFormat(format!("{}: names are not UTF-8: {e}", self.reader.path().display()))
        })?;
        let mut names: Vec<String> = text.split('\n').map(|n| n.trim().to_string()).collect();
        if names.last().is_some_and(String::is_empty) {
            names.pop();
        }
        Ok(names)
    }

    /// Reads the whole cube with its names.
    ///
    /// # Errors
    /// Returns [`Error::DimensionMismatch`] if the name count differs from the channel count.
    pub fn read_cube(&self) -> Result<ElementalCube> {
        let samples = self.decode(self.header.header_len, self.header.payload_len());
        let shape = (
            self.header.channels as usize,
            self.header.height as usize,
            self.header.width as usize,
        );
        let data = Array3::from_shape_vec(shape, samples)
            .map_err(|e| Error::DimensionMismatch(e.to_string()))?;
        Ok(ElementalCube::new(data, self.read_names()?)?)
    }

    /// Reads one channel plane as a `height x width` grid.
    ///
    /// # Errors
    /// Returns an invalid-parameter error if `channel` is out of range.
    pub fn read_layer(&self, channel: u32) -> Result<Array2<f32>> {
        if channel >= self.header.channels {
            return Err(xrfcube_core::Error::InvalidParameter(format!(
                "channel {channel} out of range 0..{}",
                self.header.channels
            ))
            .into());
        }
        let plane_bytes = self.header.plane_len() * SAMPLE_BYTES;
        let offset = self.header.header_len + u64::from(channel) * plane_bytes;
        let samples = self.decode(offset, plane_bytes);
        Array2::from_shape_vec(
            (self.header.height as usize, self.header.width as usize),
            samples,
        )
        .map_err(|e| Error::DimensionMismatch(e.to_string()))
    }

    fn decode(&self, offset: u64, len: u64) -> Vec<f32> {
        let bytes = &self.reader.as_bytes()[offset as usize..(offset + len) as usize];
        bytes
            .chunks_exact(SAMPLE_BYTES as usize)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }
}

/// Writes `cube` to `<dir>/<name>.dms` and returns the path.
///
/// The file only appears once fully written.
///
/// # Errors
/// Returns [`Error::NotFound`] if `dir` does not exist and an
/// invalid-parameter error if `name` carries an extension.
pub fn write_dms<P: AsRef<Path>>(dir: P, name: &str, cube: &ElementalCube) -> Result<PathBuf> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        tracing::error!(dir = %dir.display(), "DMS destination folder does not exist");
        return Err(Error::NotFound(dir.to_path_buf()));
    }
    if name.is_empty() || name.contains('.') || name.contains(['/', '\\']) {
        return Err(xrfcube_core::Error::InvalidParameter(format!(
            "cube name '{name}' must be a bare file stem"
        ))
        .into());
    }
    if cube.names().len() != cube.channels() {
        return Err(Error::DimensionMismatch(format!(
            "{} channels but {} names",
            cube.channels(),
            cube.names().len()
        )));
    }

    let path = dir.join(format!("{name}.{}", CubeFormat::Dms.extension()));
    let mut writer = AtomicFileWriter::create(&path)?;
    writeln!(writer, "{DMS_VERSION_TAG}")?;
    writeln!(writer, "{} {} {}", cube.width(), cube.height(), cube.channels())?;
    for value in cube.data() {
        writer.write_all(&value.to_le_bytes())?;
    }
    writer.write_all(cube.names().join("\n").as_bytes())?;
    let path = writer.commit()?;

    tracing::info!(path = %path.display(), channels = cube.channels(), "wrote DMS cube");
    Ok(path)
}
