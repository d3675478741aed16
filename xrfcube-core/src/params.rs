//! Persisted spectral parameters of a data source.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::float_cmp
)]

use crate::error::{Error, Result};
use crate::units::{ChannelRange, EnergyScale};
use serde::{Deserialize, Serialize};

/// Spectral window and bin width of a data source.
///
/// While `binned` is false, `low`, `high` and `bin_size` are energies in keV.
/// Once binned they are whole channel counts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpectralParams {
    pub low: f64,
    pub high: f64,
    pub bin_size: f64,
    #[serde(default)]
    pub binned: bool,
}

impl SpectralParams {
    /// Checks `low < high` and `bin_size > 0`, and integral values once binned.
    ///
    /// # Errors
    /// Returns [`Error::InvalidParameter`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        if !(self.low.is_finite() && self.high.is_finite() && self.bin_size.is_finite()) {
            return Err(Error::InvalidParameter(
                "spectral parameters must be finite".to_string(),
            ));
        }
        if self.low >= self.high {
            return Err(Error::InvalidParameter(format!(
                "low {} must be below high {}",
                self.low, self.high
            )));
        }
        if self.bin_size <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "bin size {} must be positive",
                self.bin_size
            )));
        }
        if self.binned
            && [self.low, self.high, self.bin_size]
                .iter()
                .any(|v| v.fract() != 0.0 || *v < 0.0)
        {
            return Err(Error::InvalidParameter(
                "binned parameters must be whole channel counts".to_string(),
            ));
        }
        Ok(())
    }

    /// Params describing `range`, marked as binned.
    #[must_use]
    pub fn from_channel_range(range: &ChannelRange) -> Self {
        Self {
            low: f64::from(range.low),
            high: f64::from(range.high),
            bin_size: f64::from(range.bin_size),
            binned: true,
        }
    }

    /// Channel-unit view of these params.
    ///
    /// Energy-valued params are converted with `scale`; binned params are
    /// taken as channel counts directly.
    ///
    /// # Errors
    /// Returns an error if the params are invalid or convert to an empty range.
    pub fn to_channel_range(&self, scale: &EnergyScale) -> Result<ChannelRange> {
        self.validate()?;
        if self.binned {
            ChannelRange::new(self.low as u32, self.high as u32, self.bin_size as u32)
        } else {
            scale.channel_range(self.low, self.high, self.bin_size)
        }
    }
}
