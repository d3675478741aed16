//! Cube geometry and sample layout.
#![allow(clippy::cast_possible_truncation)]

use crate::error::{Error, Result};
use crate::metadata::{
    Metadata, KEY_BYTE_ORDER, KEY_DATA_LENGTH, KEY_DATA_TYPE, KEY_DEPTH, KEY_HEIGHT, KEY_OFFSET,
    KEY_RECORD_BY, KEY_WIDTH,
};
use serde::{Deserialize, Serialize};

/// Sample width used when the sidecar does not name one.
pub const DEFAULT_SAMPLE_BYTE_WIDTH: u8 = 2;

/// Byte order of multi-byte samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ByteOrder {
    #[default]
    LittleEndian,
    BigEndian,
}

impl ByteOrder {
    fn from_metadata(value: Option<&str>) -> Result<Self> {
        match value.map(str::to_ascii_lowercase).as_deref() {
            None | Some("little-endian" | "dont-care") => Ok(Self::LittleEndian),
            Some("big-endian") => Ok(Self::BigEndian),
            Some(other) => Err(Error::FormatUnsupported(format!("byte order '{other}'"))),
        }
    }
}

/// Interleaving of samples in the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RecordOrder {
    /// All channels of one pixel are contiguous.
    #[default]
    Vector,
    /// One full image per channel.
    Image,
    /// One image row per channel, interleaved by line.
    Line,
}

impl RecordOrder {
    fn from_metadata(value: Option<&str>) -> Result<Self> {
        match value.map(str::to_ascii_lowercase).as_deref() {
            None | Some("vector") => Ok(Self::Vector),
            Some("image") => Ok(Self::Image),
            Some("line") => Ok(Self::Line),
            // interleaving is ambiguous, so spectral offsets cannot be derived
            Some("dont-care") => Err(Error::FormatUnsupported(
                "record order 'dont-care'".to_string(),
            )),
            Some(other) => Err(Error::FormatUnsupported(format!("record order '{other}'"))),
        }
    }
}

/// Shape and byte layout of a cube payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CubeGeometry {
    pub width: u32,
    pub height: u32,
    pub channel_depth: u32,
    /// Bytes preceding the payload.
    pub header_byte_size: u32,
    /// Bytes per sample: 1, 2 or 4.
    pub sample_byte_width: u8,
    pub byte_order: ByteOrder,
    pub record_order: RecordOrder,
}

impl CubeGeometry {
    /// Creates a headerless little-endian vector-ordered geometry.
    ///
    /// # Errors
    /// Returns an error if any dimension is zero or the sample width is not 1, 2 or 4.
    pub fn new(width: u32, height: u32, channel_depth: u32, sample_byte_width: u8) -> Result<Self> {
        let geometry = Self {
            width,
            height,
            channel_depth,
            header_byte_size: 0,
            sample_byte_width,
            byte_order: ByteOrder::LittleEndian,
            record_order: RecordOrder::Vector,
        };
        geometry.validate()?;
        Ok(geometry)
    }

    /// Derives geometry from a parsed sidecar.
    ///
    /// # Errors
    /// Returns [`Error::GeometryUnavailable`] for empty metadata or missing
    /// dimensions, and [`Error::FormatUnsupported`] for sample layouts other
    /// than unsigned integers of 1, 2 or 4 bytes.
    pub fn from_metadata(meta: &Metadata) -> Result<Self> {
        if meta.is_empty() {
            return Err(Error::GeometryUnavailable("metadata is empty".to_string()));
        }

        let width = required_u32(meta, KEY_WIDTH)?;
        let height = required_u32(meta, KEY_HEIGHT)?;
        let channel_depth = required_u32(meta, KEY_DEPTH)?;
        let header_byte_size = optional_u32(meta, KEY_OFFSET)?.unwrap_or(0);
        let sample_byte_width = match optional_u32(meta, KEY_DATA_LENGTH)? {
            None => DEFAULT_SAMPLE_BYTE_WIDTH,
            Some(n @ (1 | 2 | 4)) => n as u8,
            Some(n) => {
                return Err(Error::FormatUnsupported(format!("{n}-byte samples")));
            }
        };
        if let Some(kind) = meta.get(KEY_DATA_TYPE) {
            if !kind.eq_ignore_ascii_case("unsigned") {
                return Err(Error::FormatUnsupported(format!("sample type '{kind}'")));
            }
        }

        let geometry = Self {
            width,
            height,
            channel_depth,
            header_byte_size,
            sample_byte_width,
            byte_order: ByteOrder::from_metadata(meta.get(KEY_BYTE_ORDER))?,
            record_order: RecordOrder::from_metadata(meta.get(KEY_RECORD_BY))?,
        };
        geometry.validate()?;
        Ok(geometry)
    }

    /// Checks dimensions and sample width, and that the implied file length
    /// fits in a `u64`.
    ///
    /// Byte-length and offset helpers assume a validated geometry.
    ///
    /// # Errors
    /// Returns [`Error::GeometryUnavailable`] for degenerate or oversized cubes
    /// and [`Error::FormatUnsupported`] for an unsupported sample width.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 || self.channel_depth == 0 {
            return Err(Error::GeometryUnavailable(format!(
                "degenerate cube {}x{}x{}",
                self.width, self.height, self.channel_depth
            )));
        }
        if !matches!(self.sample_byte_width, 1 | 2 | 4) {
            return Err(Error::FormatUnsupported(format!(
                "{}-byte samples",
                self.sample_byte_width
            )));
        }
        if self.checked_file_len().is_none() {
            return Err(Error::GeometryUnavailable(format!(
                "{}x{}x{} cube of {}-byte samples exceeds the addressable file size",
                self.width, self.height, self.channel_depth, self.sample_byte_width
            )));
        }
        Ok(())
    }

    fn checked_file_len(&self) -> Option<u64> {
        u64::from(self.width)
            .checked_mul(u64::from(self.height))?
            .checked_mul(u64::from(self.channel_depth))?
            .checked_mul(u64::from(self.sample_byte_width))?
            .checked_add(u64::from(self.header_byte_size))
    }

    /// Number of pixels in one channel plane.
    #[must_use]
    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Bytes occupied by one pixel's channel vector.
    #[must_use]
    pub fn vector_byte_len(&self) -> u64 {
        u64::from(self.channel_depth) * u64::from(self.sample_byte_width)
    }

    /// Bytes of sample payload, excluding the header.
    #[must_use]
    pub fn payload_byte_len(&self) -> u64 {
        self.pixel_count() * self.vector_byte_len()
    }

    /// Exact file size implied by header and payload.
    #[must_use]
    pub fn expected_file_len(&self) -> u64 {
        u64::from(self.header_byte_size) + self.payload_byte_len()
    }

    /// Byte offset of `channel_start` in the vector of pixel (`row`, `col`).
    #[must_use]
    pub fn sample_offset(&self, row: u32, col: u32, channel_start: u32) -> u64 {
        let pixel = u64::from(row) * u64::from(self.width) + u64::from(col);
        u64::from(self.header_byte_size)
            + pixel * self.vector_byte_len()
            + u64::from(channel_start) * u64::from(self.sample_byte_width)
    }

    /// Geometry of resolution level `level`: `ceil(dim / 2^level)` per spatial axis.
    ///
    /// Derived levels carry no header.
    #[must_use]
    pub fn at_level(&self, level: u32) -> Self {
        Self {
            width: scale_down(self.width, level),
            height: scale_down(self.height, level),
            header_byte_size: if level == 0 { self.header_byte_size } else { 0 },
            ..*self
        }
    }

    /// Same layout with a different channel depth.
    #[must_use]
    pub fn with_channel_depth(&self, channel_depth: u32) -> Self {
        Self {
            channel_depth,
            ..*self
        }
    }

    /// Decodes one sample from exactly `sample_byte_width` bytes.
    #[inline]
    #[must_use]
    pub fn decode_sample(&self, bytes: &[u8]) -> u32 {
        match (self.sample_byte_width, self.byte_order) {
            (1, _) => u32::from(bytes[0]),
            (2, ByteOrder::LittleEndian) => u32::from(u16::from_le_bytes([bytes[0], bytes[1]])),
            (2, ByteOrder::BigEndian) => u32::from(u16::from_be_bytes([bytes[0], bytes[1]])),
            (_, ByteOrder::LittleEndian) => {
                u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
            }
            (_, ByteOrder::BigEndian) => u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        }
    }

    /// Encodes `value` into `out`, saturating at the sample type's maximum.
    #[inline]
    pub fn encode_sample(&self, value: u32, out: &mut [u8]) {
        match (self.sample_byte_width, self.byte_order) {
            (1, _) => out[0] = value.min(u32::from(u8::MAX)) as u8,
            (2, order) => {
                let v = value.min(u32::from(u16::MAX)) as u16;
                let bytes = match order {
                    ByteOrder::LittleEndian => v.to_le_bytes(),
                    ByteOrder::BigEndian => v.to_be_bytes(),
                };
                out[..2].copy_from_slice(&bytes);
            }
            (_, ByteOrder::LittleEndian) => out[..4].copy_from_slice(&value.to_le_bytes()),
            (_, ByteOrder::BigEndian) => out[..4].copy_from_slice(&value.to_be_bytes()),
        }
    }

    /// Decodes a packed run of samples, appending to `out`.
    pub fn decode_into(&self, bytes: &[u8], out: &mut Vec<u32>) {
        out.extend(
            bytes
                .chunks_exact(usize::from(self.sample_byte_width))
                .map(|chunk| self.decode_sample(chunk)),
        );
    }
}

fn scale_down(dim: u32, level: u32) -> u32 {
    if level >= 32 {
        return 1;
    }
    let factor = 1u64 << level;
    u64::from(dim).div_ceil(factor).max(1) as u32
}

fn optional_u32(meta: &Metadata, key: &str) -> Result<Option<u32>> {
    meta.get(key)
        .map(|raw| {
            raw.parse::<u32>().map_err(|_| {
                Error::GeometryUnavailable(format!("'{key}' is not an unsigned integer: {raw}"))
            })
        })
        .transpose()
}

fn required_u32(meta: &Metadata, key: &str) -> Result<u32> {
    optional_u32(meta, key)?
        .ok_or_else(|| Error::GeometryUnavailable(format!("missing '{key}' in metadata")))
}
