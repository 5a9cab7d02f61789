//! Detector and tracklet-format constants.

/// Width of the tracklet position field.
pub const NBITS_POSITION: u32 = 11;
/// Width of the tracklet slope field.
pub const NBITS_SLOPE: u32 = 8;

/// Pad fraction represented by one position bin.
pub const GRANULARITY_POSITION: f64 = 1.0 / 80.0;
/// Pads per timebin represented by one slope bin, before the bit shift.
pub const GRANULARITY_SLOPE: f64 = 1.0 / 1000.0;
/// Extra precision carried in the slope field.
pub const SLOPE_BIT_SHIFT: f64 = 8.0;

/// Pad columns served by one MCM.
pub const NCOL_MCM: i32 = 18;

pub const NSECTOR: usize = 18;
pub const NSTACK: usize = 5;
pub const NLAYER: usize = 6;
/// Number of chambers (including positions without a physical chamber).
pub const NCHAMBER: usize = NSECTOR * NSTACK * NLAYER;

/// Pad rows in the central stack.
pub const NROW_C0: usize = 12;
/// Pad rows in every other stack.
pub const NROW_C1: usize = 16;

/// Height of the drift region in cm.
pub const CATHODE_HEIGHT: f64 = 3.0;
/// Height of the amplification region in cm.
pub const AMPLIFICATION_HEIGHT: f64 = 0.7;

/// Chamber slot holding the chamber-averaged t0.
pub const T0_REFERENCE_CHAMBER: u16 = 435;

/// Start of the drift region in timebins.
pub const DRIFT_START_TIMEBIN: f64 = 4.0;

/// Sector of a detector index.
#[inline]
#[must_use]
pub const fn sector(detector: u16) -> usize {
    detector as usize / (NSTACK * NLAYER)
}

/// Stack of a detector index.
#[inline]
#[must_use]
pub const fn stack(detector: u16) -> usize {
    (detector as usize % (NSTACK * NLAYER)) / NLAYER
}

/// Layer of a detector index.
#[inline]
#[must_use]
pub const fn layer(detector: u16) -> usize {
    detector as usize % NLAYER
}

/// Detector index from sector, stack and layer.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn detector(sector: usize, stack: usize, layer: usize) -> u16 {
    (sector * NSTACK * NLAYER + stack * NLAYER + layer) as u16
}

/// Pad rows of a chamber in the given stack.
#[inline]
#[must_use]
pub const fn row_count(stack: usize) -> usize {
    if stack == 2 {
        NROW_C0
    } else {
        NROW_C1
    }
}
