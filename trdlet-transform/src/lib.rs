//! trdlet-transform: Calibrated space points from tracklet words.
//!
//! The [`TrackletTransformer`] decodes a [`RawTracklet`], places it in the
//! chamber frame using the pad-plane geometry, applies drift, Lorentz-angle
//! and t0 calibration, and optionally moves it to the tracking frame.
//!
//! # Key Components
//!
//! - [`TrackletTransformer`] - the transform engine
//! - [`TransformerConfig`] - decoding mode, field widths, t0 region
//! - [`GeometryTable`] / [`CalibrationTable`] - in-memory services
//! - [`Setup`] - JSON setup file bundling all three

mod config;
mod error;
mod tables;
mod transformer;

pub use config::{Frame, TransformerConfig};
pub use error::{Error, Result};
pub use tables::{CalibrationTable, ChamberGeometry, GeometryTable, Setup};
pub use transformer::{TrackletTransformer, TransformerState};

// Re-export core types for convenience
pub use trdlet_core::{CalibratedTracklet, DecodingMode, RawTracklet};
