//! Signed bit-field decoding.
//!
//! Tracklet position and slope are fixed-width signed fields. Two
//! encodings exist in recorded data:
//!
//! - [`DecodingMode::Direct`]: plain two's complement over the field width.
//! - [`DecodingMode::LegacyXor`]: bit 7 is stored inverted in both the
//!   position and the slope field, so the field has to be XORed with
//!   [`LEGACY_XOR_MASK`] before sign extension.
#![allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]

use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Encoding convention of the signed tracklet fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DecodingMode {
    /// Historical raw format with the MSB flipped.
    LegacyXor,
    /// Two's complement, sign-extended by the record accessor.
    #[default]
    Direct,
}

/// Bit flipped by the legacy raw format, the MSB of the 8-bit slope field.
pub const LEGACY_XOR_MASK: u32 = 0x80;

/// Mask covering the low `width` bits.
#[inline]
#[must_use]
pub const fn field_mask(width: u32) -> u32 {
    if width >= 32 {
        u32::MAX
    } else {
        (1 << width) - 1
    }
}

/// Checks that `width` is a field width the decoder supports.
///
/// # Errors
///
/// Returns [`Error::InvalidFieldWidth`] unless `1 <= width <= 31`.
pub fn validate_width(width: u32) -> Result<()> {
    if (1..=31).contains(&width) {
        Ok(())
    } else {
        Err(Error::InvalidFieldWidth(width))
    }
}

/// Sign-extends the low `width` bits of `raw`.
///
/// Bits above the field are ignored. `width` must be in `1..=31`.
#[inline]
#[must_use]
pub fn sign_extend(raw: u32, width: u32) -> i32 {
    let mask = field_mask(width);
    let raw = raw & mask;
    if raw & (1 << (width - 1)) != 0 {
        -((!(raw - 1) & mask) as i32)
    } else {
        raw as i32
    }
}

/// Decodes a packed signed field.
///
/// Every bit pattern is accepted; the result lies in
/// `[-2^(width-1), 2^(width-1) - 1]`.
#[inline]
#[must_use]
pub fn decode_field(raw: u32, width: u32, mode: DecodingMode) -> i32 {
    match mode {
        DecodingMode::LegacyXor => sign_extend(raw ^ LEGACY_XOR_MASK, width),
        DecodingMode::Direct => sign_extend(raw, width),
    }
}

/// Packs a signed value into a `width`-bit field. Inverse of [`decode_field`].
#[inline]
#[must_use]
pub fn encode_field(value: i32, width: u32, mode: DecodingMode) -> u32 {
    let bits = (value as u32) & field_mask(width);
    match mode {
        DecodingMode::LegacyXor => (bits ^ LEGACY_XOR_MASK) & field_mask(width),
        DecodingMode::Direct => bits,
    }
}
