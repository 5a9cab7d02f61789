//! Transformer configuration.

use serde::{Deserialize, Serialize};
use trdlet_core::constants::{NBITS_POSITION, NBITS_SLOPE, T0_REFERENCE_CHAMBER};
use trdlet_core::decode::validate_width;
use trdlet_core::{DecodingMode, Error};

/// Output frame of a transformed tracklet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frame {
    /// Chamber-local frame.
    #[default]
    Local,
    /// Sector tracking frame.
    Tracking,
}

impl Frame {
    /// Maps a "use global frame" flag onto a frame.
    #[must_use]
    pub fn from_global(global: bool) -> Self {
        if global {
            Frame::Tracking
        } else {
            Frame::Local
        }
    }
}

/// Configuration for [`crate::TrackletTransformer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformerConfig {
    /// Encoding of the signed position and slope fields.
    pub decoding: DecodingMode,
    /// Width of the position field (bits).
    pub position_bits: u32,
    /// Width of the slope field (bits).
    pub slope_bits: u32,
    /// Calibration region the t0 correction is read from.
    pub t0_reference_region: u16,
    /// Distance of the reference plane below the cathode (cm).
    pub drift_margin: f64,
}

impl Default for TransformerConfig {
    fn default() -> Self {
        Self {
            decoding: DecodingMode::Direct,
            position_bits: NBITS_POSITION,
            slope_bits: NBITS_SLOPE,
            t0_reference_region: T0_REFERENCE_CHAMBER,
            // 5 mm below the cathode limits error propagation from the
            // tracklet fit and the drift velocity
            drift_margin: 0.5,
        }
    }
}

impl TransformerConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the decoding mode.
    #[must_use]
    pub fn with_decoding(mut self, decoding: DecodingMode) -> Self {
        self.decoding = decoding;
        self
    }

    /// Sets the position and slope field widths.
    #[must_use]
    pub fn with_field_bits(mut self, position_bits: u32, slope_bits: u32) -> Self {
        self.position_bits = position_bits;
        self.slope_bits = slope_bits;
        self
    }

    /// Sets the t0 calibration region.
    #[must_use]
    pub fn with_t0_reference_region(mut self, region: u16) -> Self {
        self.t0_reference_region = region;
        self
    }

    /// Sets the drift margin below the cathode.
    #[must_use]
    pub fn with_drift_margin(mut self, margin: f64) -> Self {
        self.drift_margin = margin;
        self
    }

    /// Validates the configuration.
    ///
    /// Field widths must fit both the decoder and the tracklet word.
    ///
    /// # Errors
    ///
    /// Returns a core error describing the first invalid setting.
    pub fn validate(&self) -> std::result::Result<(), Error> {
        validate_width(self.position_bits)?;
        validate_width(self.slope_bits)?;
        if self.position_bits > NBITS_POSITION {
            return Err(Error::ConfigError(format!(
                "position field of {} bits exceeds the {NBITS_POSITION}-bit tracklet field",
                self.position_bits
            )));
        }
        if self.slope_bits > NBITS_SLOPE {
            return Err(Error::ConfigError(format!(
                "slope field of {} bits exceeds the {NBITS_SLOPE}-bit tracklet field",
                self.slope_bits
            )));
        }
        if !self.drift_margin.is_finite() || self.drift_margin < 0.0 {
            return Err(Error::ConfigError(format!(
                "drift margin must be finite and non-negative, got {}",
                self.drift_margin
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TransformerConfig::default();
        assert_eq!(config.decoding, DecodingMode::Direct);
        assert_eq!(config.position_bits, 11);
        assert_eq!(config.slope_bits, 8);
        assert_eq!(config.t0_reference_region, 435);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = TransformerConfig::new()
            .with_decoding(DecodingMode::LegacyXor)
            .with_t0_reference_region(12)
            .with_drift_margin(0.25);
        assert_eq!(config.decoding, DecodingMode::LegacyXor);
        assert_eq!(config.t0_reference_region, 12);
        assert!((config.drift_margin - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rejects_unsupported_widths() {
        let zero = TransformerConfig::new().with_field_bits(0, 8);
        assert_eq!(zero.validate(), Err(Error::InvalidFieldWidth(0)));

        let wide = TransformerConfig::new().with_field_bits(12, 8);
        assert!(matches!(wide.validate(), Err(Error::ConfigError(_))));

        let wide_slope = TransformerConfig::new().with_field_bits(11, 9);
        assert!(matches!(wide_slope.validate(), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_rejects_bad_margin() {
        let config = TransformerConfig::new().with_drift_margin(f64::NAN);
        assert!(config.validate().is_err());
        let config = TransformerConfig::new().with_drift_margin(-0.1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json() {
        let config: TransformerConfig =
            serde_json::from_str(r#"{ "decoding": "legacy_xor" }"#).unwrap();
        assert_eq!(config.decoding, DecodingMode::LegacyXor);
        assert_eq!(config.position_bits, 11);
        assert_eq!(Frame::from_global(true), Frame::Tracking);
        assert_eq!(Frame::from_global(false), Frame::Local);
    }
}
