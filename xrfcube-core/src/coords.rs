//! Mapping between image pixel space and cube voxel space.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Width and height of an image or cube plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Integer pixel position, `x` along columns and `y` along rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: u32,
    pub y: u32,
}

impl PixelPoint {
    #[must_use]
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Rectangle given by two inclusive corners, not necessarily ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl PixelRect {
    #[must_use]
    pub fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Same rectangle with `x0 <= x1` and `y0 <= y1`.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self {
            x0: self.x0.min(self.x1),
            y0: self.y0.min(self.y1),
            x1: self.x0.max(self.x1),
            y1: self.y0.max(self.y1),
        }
    }
}

/// Rescales points from one pixel grid to another.
#[derive(Debug, Clone, Copy)]
pub struct CoordinateMapper {
    from: ImageSize,
    to: ImageSize,
}

impl CoordinateMapper {
    /// Mapper from grid `from` to grid `to`.
    ///
    /// # Errors
    /// Returns an error if the source grid has a zero dimension.
    pub fn new(from: ImageSize, to: ImageSize) -> Result<Self> {
        if from.width == 0 || from.height == 0 {
            return Err(Error::InvalidParameter(format!(
                "cannot map from a {}x{} grid",
                from.width, from.height
            )));
        }
        Ok(Self { from, to })
    }

    /// Mapper for the opposite direction.
    ///
    /// # Errors
    /// Returns an error if the target grid has a zero dimension.
    pub fn inverse(&self) -> Result<Self> {
        Self::new(self.to, self.from)
    }

    /// `round(p * to / from)` per axis.
    #[must_use]
    pub fn map_point(&self, point: PixelPoint) -> PixelPoint {
        PixelPoint {
            x: scale(point.x, self.from.width, self.to.width),
            y: scale(point.y, self.from.height, self.to.height),
        }
    }

    /// Maps both corners independently; the result is not normalized.
    #[must_use]
    pub fn map_rect(&self, rect: &PixelRect) -> PixelRect {
        let a = self.map_point(PixelPoint::new(rect.x0, rect.y0));
        let b = self.map_point(PixelPoint::new(rect.x1, rect.y1));
        PixelRect::new(a.x, a.y, b.x, b.y)
    }
}

fn scale(value: u32, from: u32, to: u32) -> u32 {
    (f64::from(value) * f64::from(to) / f64::from(from)).round() as u32
}
