//! Energy (keV) to channel conversion.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]

use crate::error::{Error, Result};
use crate::metadata::{Metadata, KEY_SCALE_ORIGIN};
use serde::{Deserialize, Serialize};

/// Channel count of the physical instrument.
pub const NOMINAL_CHANNEL_COUNT: u32 = 4096;

/// Upper end of the instrument's energy range in keV.
pub const NOMINAL_MAX_ENERGY_KEV: f64 = 40.0;

/// Scale origin used when the sidecar has no `depthscaleorigin`.
pub const DEFAULT_SCALE_ORIGIN_KEV: f64 = 0.0;

/// Linear energy scale of a spectral cube.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyScale {
    /// Energy of channel 0 in keV.
    pub origin: f64,
    /// Energy width of one channel in keV.
    pub increment: f64,
}

impl Default for EnergyScale {
    fn default() -> Self {
        Self::with_origin(DEFAULT_SCALE_ORIGIN_KEV)
    }
}

impl EnergyScale {
    /// Scale with the conventional increment `(40 - origin) / 4096`.
    #[must_use]
    pub fn with_origin(origin: f64) -> Self {
        Self {
            origin,
            increment: (NOMINAL_MAX_ENERGY_KEV - origin) / f64::from(NOMINAL_CHANNEL_COUNT),
        }
    }

    /// Reads the scale origin from a sidecar.
    ///
    /// # Errors
    /// Returns an error if `depthscaleorigin` is present but not a finite
    /// number below the nominal maximum energy.
    pub fn from_metadata(meta: &Metadata) -> Result<Self> {
        let Some(raw) = meta.get(KEY_SCALE_ORIGIN) else {
            return Ok(Self::default());
        };
        let origin: f64 = raw.parse().map_err(|_| {
            Error::InvalidParameter(format!("'{KEY_SCALE_ORIGIN}' is not a number: {raw}"))
        })?;
        if !origin.is_finite() || origin >= NOMINAL_MAX_ENERGY_KEV {
            return Err(Error::InvalidParameter(format!(
                "scale origin {origin} keV is outside the instrument range"
            )));
        }
        Ok(Self::with_origin(origin))
    }

    /// Channel index containing energy `energy_kev`.
    ///
    /// Energies below the origin map to negative channels.
    #[must_use]
    pub fn energy_to_channel(&self, energy_kev: f64) -> i64 {
        ((energy_kev - self.origin) / self.increment).floor() as i64
    }

    /// Energy at the lower edge of `channel`.
    #[must_use]
    pub fn channel_to_energy(&self, channel: i64) -> f64 {
        self.origin + channel as f64 * self.increment
    }

    /// Converts an energy range and bin width to channel units.
    ///
    /// `low` is floored and `high` ceiled so the channel range covers the
    /// whole requested energy range; `bin_width_kev` is rounded to the nearest
    /// whole channel count, at least one. The result is clamped to
    /// `[0, NOMINAL_CHANNEL_COUNT]`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidParameter`] if the range is empty or inverted,
    /// the bin width is not positive, or nothing of the range falls inside the
    /// instrument's channels.
    pub fn channel_range(&self, low_kev: f64, high_kev: f64, bin_width_kev: f64) -> Result<ChannelRange> {
        if !(low_kev.is_finite() && high_kev.is_finite() && bin_width_kev.is_finite()) {
            return Err(Error::InvalidParameter(
                "energy range must be finite".to_string(),
            ));
        }
        if low_kev >= high_kev {
            return Err(Error::InvalidParameter(format!(
                "low energy {low_kev} must be below high energy {high_kev}"
            )));
        }
        if bin_width_kev <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "bin width {bin_width_kev} must be positive"
            )));
        }

        let nominal = f64::from(NOMINAL_CHANNEL_COUNT);
        let low = ((low_kev - self.origin) / self.increment).floor().clamp(0.0, nominal);
        let high = ((high_kev - self.origin) / self.increment).ceil().clamp(0.0, nominal);
        let bin_size = (bin_width_kev / self.increment).round().max(1.0);

        ChannelRange::new(low as u32, high as u32, bin_size.min(nominal) as u32)
    }
}

/// Half-open channel interval `[low, high)` grouped into bins of `bin_size` channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRange {
    pub low: u32,
    pub high: u32,
    pub bin_size: u32,
}

impl ChannelRange {
    /// Creates a validated channel range.
    ///
    /// # Errors
    /// Returns an error if `low >= high` or `bin_size == 0`.
    pub fn new(low: u32, high: u32, bin_size: u32) -> Result<Self> {
        if low >= high {
            return Err(Error::InvalidParameter(format!(
                "channel range [{low}, {high}) is empty"
            )));
        }
        if bin_size == 0 {
            return Err(Error::InvalidParameter("bin size must be at least 1 channel".to_string()));
        }
        Ok(Self {
            low,
            high,
            bin_size,
        })
    }

    /// Range covering all `depth` channels one by one.
    ///
    /// # Errors
    /// Returns an error if `depth` is zero.
    pub fn identity(depth: u32) -> Result<Self> {
        Self::new(0, depth, 1)
    }

    /// Number of channels in the range.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.high - self.low
    }

    /// Number of bins, `ceil((high - low) / bin_size)`.
    #[must_use]
    pub fn bin_count(&self) -> u32 {
        self.width().div_ceil(self.bin_size)
    }

    /// Source channels `[start, end)` averaged into bin `k`.
    #[must_use]
    pub fn bin_bounds(&self, k: u32) -> (u32, u32) {
        let start = self.low + k * self.bin_size;
        (start, (start + self.bin_size).min(self.high))
    }

    /// True if binning with this range leaves a `depth`-channel cube unchanged.
    #[must_use]
    pub fn is_identity_for(&self, depth: u32) -> bool {
        self.low == 0 && self.high == depth && self.bin_size == 1
    }
}
