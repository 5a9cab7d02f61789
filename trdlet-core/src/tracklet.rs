//! Tracklet record types.
#![allow(clippy::cast_possible_truncation)]

use crate::constants::{NBITS_POSITION, NBITS_SLOPE};
use crate::decode::sign_extend;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A raw 64-bit tracklet word as delivered by the front-end readout.
///
/// Layout (MSB first): format(4) hcid(11) padrow(4) column(2)
/// position(11) slope(8) pid(24).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(transparent)]
pub struct RawTracklet(pub u64);

impl RawTracklet {
    const FORMAT_SHIFT: u32 = 60;
    const HCID_SHIFT: u32 = 49;
    const PADROW_SHIFT: u32 = 45;
    const COLUMN_SHIFT: u32 = 43;
    const POSITION_SHIFT: u32 = 32;
    const SLOPE_SHIFT: u32 = 24;

    const FORMAT_MASK: u64 = 0xF;
    const HCID_MASK: u64 = 0x7FF;
    const PADROW_MASK: u64 = 0xF;
    const COLUMN_MASK: u64 = 0x3;
    const POSITION_MASK: u64 = (1 << NBITS_POSITION) - 1;
    const SLOPE_MASK: u64 = (1 << NBITS_SLOPE) - 1;
    const PID_MASK: u64 = 0xFF_FFFF;

    /// Wraps a raw tracklet word.
    #[inline]
    #[must_use]
    pub const fn from_word(word: u64) -> Self {
        Self(word)
    }

    /// Builds a tracklet from its fields. Values are truncated to their field widths.
    #[must_use]
    pub const fn new(hcid: u16, padrow: u8, column: u8, position: u16, slope: u8) -> Self {
        Self(
            ((hcid as u64 & Self::HCID_MASK) << Self::HCID_SHIFT)
                | ((padrow as u64 & Self::PADROW_MASK) << Self::PADROW_SHIFT)
                | ((column as u64 & Self::COLUMN_MASK) << Self::COLUMN_SHIFT)
                | ((position as u64 & Self::POSITION_MASK) << Self::POSITION_SHIFT)
                | ((slope as u64 & Self::SLOPE_MASK) << Self::SLOPE_SHIFT),
        )
    }

    /// Returns a copy with the format nibble replaced.
    #[must_use]
    pub const fn with_format(self, format: u8) -> Self {
        let cleared = self.0 & !(Self::FORMAT_MASK << Self::FORMAT_SHIFT);
        Self(cleared | ((format as u64 & Self::FORMAT_MASK) << Self::FORMAT_SHIFT))
    }

    /// Returns a copy with the 24-bit PID/charge payload replaced.
    #[must_use]
    pub const fn with_pid(self, pid: u32) -> Self {
        Self((self.0 & !Self::PID_MASK) | (pid as u64 & Self::PID_MASK))
    }

    /// The raw word.
    #[inline]
    #[must_use]
    pub const fn word(&self) -> u64 {
        self.0
    }

    /// Tracklet format version.
    #[inline]
    #[must_use]
    pub const fn format(&self) -> u8 {
        ((self.0 >> Self::FORMAT_SHIFT) & Self::FORMAT_MASK) as u8
    }

    /// Half-chamber id.
    #[inline]
    #[must_use]
    pub const fn hcid(&self) -> u16 {
        ((self.0 >> Self::HCID_SHIFT) & Self::HCID_MASK) as u16
    }

    /// Chamber index.
    #[inline]
    #[must_use]
    pub const fn detector(&self) -> u16 {
        self.hcid() / 2
    }

    /// Half-chamber side (0 or 1).
    #[inline]
    #[must_use]
    pub const fn side(&self) -> u8 {
        (self.hcid() % 2) as u8
    }

    /// Pad row.
    #[inline]
    #[must_use]
    pub const fn padrow(&self) -> u8 {
        ((self.0 >> Self::PADROW_SHIFT) & Self::PADROW_MASK) as u8
    }

    /// MCM column within the half chamber.
    #[inline]
    #[must_use]
    pub const fn column(&self) -> u8 {
        ((self.0 >> Self::COLUMN_SHIFT) & Self::COLUMN_MASK) as u8
    }

    /// Packed position field.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> u16 {
        ((self.0 >> Self::POSITION_SHIFT) & Self::POSITION_MASK) as u16
    }

    /// Packed slope field.
    #[inline]
    #[must_use]
    pub const fn slope(&self) -> u8 {
        ((self.0 >> Self::SLOPE_SHIFT) & Self::SLOPE_MASK) as u8
    }

    /// 24-bit PID payload (Q2, Q1, Q0).
    #[inline]
    #[must_use]
    pub const fn pid(&self) -> u32 {
        (self.0 & Self::PID_MASK) as u32
    }

    /// Charge window `i` (0..=2).
    #[inline]
    #[must_use]
    pub const fn charge(&self, i: u32) -> u8 {
        ((self.0 >> (8 * i)) & 0xFF) as u8
    }

    /// Position as a two's-complement signed bin.
    #[inline]
    #[must_use]
    pub fn position_bin_signed(&self) -> i32 {
        sign_extend(u32::from(self.position()), NBITS_POSITION)
    }

    /// Slope as a two's-complement signed bin.
    #[inline]
    #[must_use]
    pub fn slope_bin_signed(&self) -> i32 {
        sign_extend(u32::from(self.slope()), NBITS_SLOPE)
    }
}

impl From<u64> for RawTracklet {
    fn from(word: u64) -> Self {
        Self(word)
    }
}

impl From<RawTracklet> for u64 {
    fn from(tracklet: RawTracklet) -> Self {
        tracklet.0
    }
}

/// A tracklet converted to a space point and a transverse deviation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CalibratedTracklet {
    /// Drift coordinate (cm).
    pub x: f32,
    /// Pad-direction coordinate (cm).
    pub y: f32,
    /// Row-direction coordinate (cm).
    pub z: f32,
    /// Calibrated deviation over the drift length (cm).
    pub dy: f32,
}

impl CalibratedTracklet {
    /// Creates a calibrated tracklet.
    #[inline]
    #[must_use]
    pub fn new(x: f32, y: f32, z: f32, dy: f32) -> Self {
        Self { x, y, z, dy }
    }

    /// The space point as an array.
    #[inline]
    #[must_use]
    pub fn position(&self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}
