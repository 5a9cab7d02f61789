//! trdlet-core: Tracklet words, field decoding and detector service seams.
//!
//! This crate provides the data model shared by the transform engine:
//! the packed 64-bit tracklet record, the two signed-field encodings,
//! pad-plane and affine-frame geometry, and the traits through which
//! geometry and calibration lookups are injected.
//!
//! # Key Components
//!
//! - [`RawTracklet`] - 64-bit tracklet word with bit field accessors
//! - [`DecodingMode`] - legacy XOR-flipped vs. direct signed fields
//! - [`PadPlane`] / [`Affine3`] - per-chamber geometry
//! - [`Geometry`], [`DriftCalibration`], [`TimingCalibration`] - service seams

pub mod calibration;
pub mod constants;
pub mod decode;
pub mod error;
pub mod geometry;
pub mod tracklet;

pub use calibration::{DriftCalibration, TimingCalibration};
pub use decode::{decode_field, encode_field, sign_extend, DecodingMode, LEGACY_XOR_MASK};
pub use error::{Error, Result};
pub use geometry::{Affine3, Geometry, PadPlane};
pub use tracklet::{CalibratedTracklet, RawTracklet};
