//! In-memory elemental cube.

use crate::error::{Error, Result};
use ndarray::{Array3, ArrayView2, Axis};

/// Dense `[channel][row][col]` abundance cube with one name per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementalCube {
    data: Array3<f32>,
    names: Vec<String>,
}

impl ElementalCube {
    /// Pairs abundance data with its channel names.
    ///
    /// # Errors
    /// Returns [`Error::DimensionMismatch`] if the name count differs from the
    /// channel count.
    pub fn new(data: Array3<f32>, names: Vec<String>) -> Result<Self> {
        if data.len_of(Axis(0)) != names.len() {
            return Err(Error::DimensionMismatch(format!(
                "{} channels but {} element names",
                data.len_of(Axis(0)),
                names.len()
            )));
        }
        Ok(Self { data, names })
    }

    /// Number of channels (elements).
    #[must_use]
    pub fn channels(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    /// Number of rows.
    #[must_use]
    pub fn height(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    /// Number of columns.
    #[must_use]
    pub fn width(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    /// Channel names in payload order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Abundance data.
    #[must_use]
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    /// One channel as a `height x width` view.
    ///
    /// # Panics
    /// Panics if `channel >= self.channels()`.
    #[must_use]
    pub fn layer(&self, channel: usize) -> ArrayView2<'_, f32> {
        self.data.index_axis(Axis(0), channel)
    }

    /// Splits the cube into data and names.
    #[must_use]
    pub fn into_parts(self) -> (Array3<f32>, Vec<String>) {
        (self.data, self.names)
    }
}

/// Display form of an element name: spaces removed, `Continuum` and `chisq` abbreviated.
#[must_use]
pub fn short_element_name(name: &str) -> String {
    let compact: String = name.chars().filter(|c| *c != ' ').collect();
    match compact.as_str() {
        "Continuum" => "cont.".to_string(),
        "chisq" => "chi".to_string(),
        _ => compact,
    }
}
