//! Headerless spectral cube access.
//!
//! Samples are stored vector by vector: every channel of pixel (0, 0), then
//! every channel of pixel (0, 1), and so on in row-major pixel order.
#![allow(clippy::cast_possible_truncation)]

use crate::reader::MappedFileReader;
use crate::{Error, Result};
use ndarray::Array2;
use std::path::Path;
use xrfcube_core::{CubeGeometry, RecordOrder};

/// Memory-mapped spectral cube.
#[derive(Clone)]
pub struct RawCube {
    reader: MappedFileReader,
    geometry: CubeGeometry,
}

impl RawCube {
    /// Opens `path` with `geometry`, requiring the file size to match exactly.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`], [`Error::FormatUnsupported`] for
    /// non-vector layouts, a geometry error for degenerate or oversized
    /// dimensions and [`Error::DimensionMismatch`] on a size mismatch.
    pub fn open<P: AsRef<Path>>(path: P, geometry: CubeGeometry) -> Result<Self> {
        geometry.validate()?;
        if geometry.record_order != RecordOrder::Vector {
            return Err(Error::FormatUnsupported(format!(
                "{:?} record order",
                geometry.record_order
            )));
        }
        let reader = MappedFileReader::open(path)?;
        let expected = geometry.expected_file_len();
        let actual = reader.len() as u64;
        if actual != expected {
            tracing::error!(
                path = %reader.path().display(),
                expected,
                actual,
                "raw cube size disagrees with its metadata"
            );
            return Err(Error::DimensionMismatch(format!(
                "{}: {}x{}x{} cube of {}-byte samples needs {expected} bytes, file has {actual}",
                reader.path().display(),
                geometry.width,
                geometry.height,
                geometry.channel_depth,
                geometry.sample_byte_width
            )));
        }
        Ok(Self { reader, geometry })
    }

    #[must_use]
    pub fn geometry(&self) -> &CubeGeometry {
        &self.geometry
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.reader.path()
    }

    /// Bytes preceding the payload.
    #[must_use]
    pub fn header_bytes(&self) -> &[u8] {
        &self.reader.as_bytes()[..self.geometry.header_byte_size as usize]
    }

    fn check_pixel(&self, row: u32, col: u32) -> Result<()> {
        if row >= self.geometry.height || col >= self.geometry.width {
            return Err(xrfcube_core::Error::InvalidParameter(format!(
                "pixel ({row}, {col}) outside {}x{} cube",
                self.geometry.height, self.geometry.width
            ))
            .into());
        }
        Ok(())
    }

    /// Raw bytes of channels `start..start + count` of one pixel.
    ///
    /// # Errors
    /// Returns an invalid-parameter error for out-of-range pixels or channels.
    pub fn channel_bytes(&self, row: u32, col: u32, start: u32, count: u32) -> Result<&[u8]> {
        self.check_pixel(row, col)?;
        if u64::from(start) + u64::from(count) > u64::from(self.geometry.channel_depth) {
            return Err(xrfcube_core::Error::InvalidParameter(format!(
                "channels {start}..{} outside depth {}",
                u64::from(start) + u64::from(count),
                self.geometry.channel_depth
            ))
            .into());
        }
        let offset = self.geometry.sample_offset(row, col, start);
        let len = u64::from(count) * u64::from(self.geometry.sample_byte_width);
        self.reader.slice(offset, len)
    }

    /// Decodes channels `start..start + count` of one pixel.
    ///
    /// # Errors
    /// See [`RawCube::channel_bytes`].
    pub fn read_channels(&self, row: u32, col: u32, start: u32, count: u32) -> Result<Vec<u32>> {
        let bytes = self.channel_bytes(row, col, start, count)?;
        let mut out = Vec::with_capacity(count as usize);
        self.geometry.decode_into(bytes, &mut out);
        Ok(out)
    }

    /// Full channel vector of one pixel, undecoded.
    ///
    /// # Errors
    /// See [`RawCube::channel_bytes`].
    pub fn vector_bytes(&self, row: u32, col: u32) -> Result<&[u8]> {
        self.channel_bytes(row, col, 0, self.geometry.channel_depth)
    }

    /// Adds the channel vector of one pixel to `acc`.
    ///
    /// # Errors
    /// See [`RawCube::channel_bytes`].
    pub fn accumulate_vector(&self, row: u32, col: u32, acc: &mut [f64]) -> Result<()> {
        let bytes = self.vector_bytes(row, col)?;
        let width = usize::from(self.geometry.sample_byte_width);
        for (slot, chunk) in acc.iter_mut().zip(bytes.chunks_exact(width)) {
            *slot += f64::from(self.geometry.decode_sample(chunk));
        }
        Ok(())
    }

    /// All vectors of one image row, undecoded.
    ///
    /// # Errors
    /// Returns an invalid-parameter error if `row` is out of range.
    pub fn row_bytes(&self, row: u32) -> Result<&[u8]> {
        self.check_pixel(row, 0)?;
        let offset = self.geometry.sample_offset(row, 0, 0);
        let len = u64::from(self.geometry.width) * self.geometry.vector_byte_len();
        self.reader.slice(offset, len)
    }

    /// One channel plane as a `height x width` grid.
    ///
    /// # Errors
    /// Returns an invalid-parameter error if `channel` is out of range.
    pub fn read_plane(&self, channel: u32) -> Result<Array2<u32>> {
        let geometry = self.geometry;
        let mut plane = Array2::<u32>::zeros((geometry.height as usize, geometry.width as usize));
        for row in 0..geometry.height {
            for col in 0..geometry.width {
                let bytes = self.channel_bytes(row, col, channel, 1)?;
                plane[[row as usize, col as usize]] = geometry.decode_sample(bytes);
            }
        }
        Ok(plane)
    }
}

/// Appends `values` encoded with the sample layout of `geometry`.
pub fn encode_samples(geometry: &CubeGeometry, values: &[u32], out: &mut Vec<u8>) {
    let width = usize::from(geometry.sample_byte_width);
    let start = out.len();
    out.resize(start + values.len() * width, 0);
    for (value, slot) in values.iter().zip(out[start..].chunks_exact_mut(width)) {
        geometry.encode_sample(*value, slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_cube(dir: &TempDir, geometry: &CubeGeometry, f: impl Fn(u32, u32, u32) -> u32) -> std::path::PathBuf {
        let mut bytes = vec![0u8; geometry.header_byte_size as usize];
        for row in 0..geometry.height {
            for col in 0..geometry.width {
                let vector: Vec<u32> = (0..geometry.channel_depth).map(|c| f(row, col, c)).collect();
                encode_samples(geometry, &vector, &mut bytes);
            }
        }
        let path = dir.path().join("cube.raw");
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_addressed_reads() {
        let dir = TempDir::new().unwrap();
        let geometry = CubeGeometry::new(3, 2, 5, 2).unwrap();
        let path = write_cube(&dir, &geometry, |r, c, ch| r * 100 + c * 10 + ch);

        let cube = RawCube::open(&path, geometry).unwrap();
        assert_eq!(cube.read_channels(1, 2, 1, 3).unwrap(), vec![121, 122, 123]);

        let plane = cube.read_plane(4).unwrap();
        assert_eq!(plane.dim(), (2, 3));
        assert_eq!(plane[[1, 0]], 104);

        let mut acc = vec![0.0; 5];
        cube.accumulate_vector(0, 1, &mut acc).unwrap();
        cube.accumulate_vector(0, 1, &mut acc).unwrap();
        assert_eq!(acc, vec![20.0, 22.0, 24.0, 26.0, 28.0]);
    }

    #[test]
    fn test_header_offset_is_skipped() {
        let dir = TempDir::new().unwrap();
        let geometry = CubeGeometry {
            header_byte_size: 6,
            ..CubeGeometry::new(2, 2, 3, 4).unwrap()
        };
        let path = write_cube(&dir, &geometry, |r, c, ch| (r + c) * 1000 + ch);
        let cube = RawCube::open(&path, geometry).unwrap();
        assert_eq!(cube.read_channels(1, 1, 0, 3).unwrap(), vec![2000, 2001, 2002]);
    }

    #[test]
    fn test_out_of_range() {
        let dir = TempDir::new().unwrap();
        let geometry = CubeGeometry::new(2, 2, 4, 1).unwrap();
        let path = write_cube(&dir, &geometry, |_, _, _| 7);
        let cube = RawCube::open(&path, geometry).unwrap();
        assert!(cube.read_channels(2, 0, 0, 1).is_err());
        assert!(cube.read_channels(0, 0, 3, 2).is_err());
        assert!(cube.read_plane(4).is_err());
    }

    #[test]
    fn test_size_mismatch() {
        let dir = TempDir::new().unwrap();
        let geometry = CubeGeometry::new(3, 3, 6, 2).unwrap();
        let path = write_cube(&dir, &geometry, |_, _, _| 4);
        let bigger = geometry.with_channel_depth(7);
        assert!(matches!(
            RawCube::open(&path, bigger).err().unwrap(),
            Error::DimensionMismatch(_)
        ));
    }

    #[test]
    fn test_image_order_unsupported() {
        let dir = TempDir::new().unwrap();
        let geometry = CubeGeometry::new(1, 1, 1, 1).unwrap();
        let path = write_cube(&dir, &geometry, |_, _, _| 1);
        let image = CubeGeometry {
            record_order: RecordOrder::Image,
            ..geometry
        };
        assert!(matches!(
            RawCube::open(&path, image).err().unwrap(),
            Error::FormatUnsupported(_)
        ));
    }
}
