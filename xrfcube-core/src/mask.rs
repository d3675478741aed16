//! Boolean pixel selections.
#![allow(clippy::cast_possible_truncation)]

use crate::coords::PixelRect;
use crate::error::{Error, Result};

/// Row-major boolean grid marking the pixels that take part in a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionMask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl SelectionMask {
    /// Empty selection over a `width x height` grid.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width as usize * height as usize],
        }
    }

    /// Selection covering every pixel.
    #[must_use]
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![true; width as usize * height as usize],
        }
    }

    /// Wraps a row-major boolean buffer.
    ///
    /// # Errors
    /// Returns an error if `bits.len() != width * height`.
    pub fn from_bits(width: u32, height: u32, bits: Vec<bool>) -> Result<Self> {
        if bits.len() != width as usize * height as usize {
            return Err(Error::DimensionMismatch(format!(
                "mask of {} cells cannot be {width}x{height}",
                bits.len()
            )));
        }
        Ok(Self {
            width,
            height,
            bits,
        })
    }

    /// Selects the inclusive rectangle `rect`, clipped to the grid.
    #[must_use]
    pub fn from_rect(width: u32, height: u32, rect: &PixelRect) -> Self {
        let mut mask = Self::new(width, height);
        if width == 0 || height == 0 {
            return mask;
        }
        let rect = rect.normalized();
        if rect.x0 >= width || rect.y0 >= height {
            return mask;
        }
        let x1 = rect.x1.min(width - 1);
        let y1 = rect.y1.min(height - 1);
        for row in rect.y0..=y1 {
            let start = row as usize * width as usize;
            mask.bits[start + rect.x0 as usize..=start + x1 as usize].fill(true);
        }
        mask
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns whether (`row`, `col`) is selected; out-of-range cells are not.
    #[must_use]
    pub fn get(&self, row: u32, col: u32) -> bool {
        row < self.height && col < self.width && self.bits[self.index(row, col)]
    }

    /// Marks (`row`, `col`).
    ///
    /// # Panics
    /// Panics if the cell is outside the grid.
    pub fn set(&mut self, row: u32, col: u32, selected: bool) {
        assert!(row < self.height && col < self.width, "cell ({row}, {col}) outside mask");
        let index = self.index(row, col);
        self.bits[index] = selected;
    }

    /// Number of selected cells.
    #[must_use]
    pub fn count_selected(&self) -> u64 {
        self.bits.iter().filter(|b| **b).count() as u64
    }

    /// Iterates over selected cells as `(row, col)` in row-major order.
    pub fn iter_selected(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let width = self.width as usize;
        self.bits
            .iter()
            .enumerate()
            .filter(|(_, b)| **b)
            .map(move |(i, _)| ((i / width) as u32, (i % width) as u32))
    }

    /// Row-major selection flags.
    #[must_use]
    pub fn as_bits(&self) -> &[bool] {
        &self.bits
    }

    /// Projects the selection onto resolution level `level`.
    ///
    /// A coarse cell covers up to `4^level` fine pixels and is selected when
    /// any of them is.
    #[must_use]
    pub fn downsample(&self, level: u32) -> Self {
        if level == 0 {
            return self.clone();
        }
        let shift = level.min(31);
        let width = coarse_dim(self.width, shift);
        let height = coarse_dim(self.height, shift);
        let mut coarse = Self::new(width, height);
        for (row, col) in self.iter_selected() {
            let index = coarse.index(row >> shift, col >> shift);
            coarse.bits[index] = true;
        }
        coarse
    }

    fn index(&self, row: u32, col: u32) -> usize {
        row as usize * self.width as usize + col as usize
    }
}

fn coarse_dim(dim: u32, shift: u32) -> u32 {
    (u64::from(dim).div_ceil(1u64 << shift)).max(1) as u32
}
