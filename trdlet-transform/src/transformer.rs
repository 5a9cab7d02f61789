//! Tracklet to space point transformation.
#![allow(clippy::cast_possible_truncation)]

use rayon::prelude::*;
use trdlet_core::constants::{
    DRIFT_START_TIMEBIN, GRANULARITY_POSITION, GRANULARITY_SLOPE, NCOL_MCM, SLOPE_BIT_SHIFT,
};
use trdlet_core::{
    decode_field, CalibratedTracklet, DriftCalibration, Error as CoreError, Geometry, PadPlane,
    RawTracklet, TimingCalibration,
};

use crate::{Frame, Result, TransformerConfig};

/// Pad offset of the first MCM column within its row.
const ROW_ALIGNMENT_PADS: f64 = 10.0;
/// Correction for the pads shared between neighbouring MCMs.
const SHARED_PAD_CORRECTION: f64 = 1.0;
/// Pad index of the chamber centre.
const REFERENCE_PAD: f64 = 72.0;
/// Reference x of timebin zero (cm).
const X_TIMEBIN_ZERO: f64 = -100.0;

/// Reference planes derived from the geometry once at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformerState {
    /// Cathode plane (cm).
    pub x_cathode: f64,
    /// Anode plane (cm).
    pub x_anode: f64,
    /// Plane at which local points are expressed (cm).
    pub x_drift: f64,
    /// Timebin-zero reference (cm).
    pub x_tb0: f64,
}

impl TransformerState {
    fn from_geometry<G: Geometry>(geometry: &G, drift_margin: f64) -> Self {
        let cathode = geometry.cathode_height();
        Self {
            x_cathode: cathode,
            x_anode: cathode + geometry.amplification_height() / 2.0,
            x_drift: cathode - drift_margin,
            x_tb0: X_TIMEBIN_ZERO,
        }
    }
}

/// Converts tracklets into calibrated space points.
///
/// Holds read-only handles to the geometry and calibration services. All
/// operations take `&self`, so one transformer can be shared between
/// threads.
#[derive(Debug)]
pub struct TrackletTransformer<G, C> {
    geometry: G,
    calibration: C,
    config: TransformerConfig,
    state: TransformerState,
}

impl<G, C> TrackletTransformer<G, C>
where
    G: Geometry,
    C: DriftCalibration + TimingCalibration,
{
    /// Validates `config` and derives the cached reference planes.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unsupported field widths or
    /// non-positive chamber heights.
    pub fn new(geometry: G, calibration: C, config: TransformerConfig) -> Result<Self> {
        config.validate()?;

        let cathode = geometry.cathode_height();
        let amplification = geometry.amplification_height();
        if !(cathode > 0.0 && amplification > 0.0) {
            return Err(CoreError::ConfigError(format!(
                "chamber heights must be positive \
                 (cathode {cathode}, amplification {amplification})"
            ))
            .into());
        }

        let state = TransformerState::from_geometry(&geometry, config.drift_margin);
        log::info!(
            "tracklet transformer ready: decoding={:?} \
             x_cathode={} x_anode={} x_drift={} t0 region={}",
            config.decoding,
            state.x_cathode,
            state.x_anode,
            state.x_drift,
            config.t0_reference_region
        );

        Ok(Self {
            geometry,
            calibration,
            config,
            state,
        })
    }

    /// Cached reference planes.
    #[must_use]
    pub fn state(&self) -> &TransformerState {
        &self.state
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &TransformerConfig {
        &self.config
    }

    /// Drift-plane x at which raw local points are expressed.
    #[must_use]
    pub fn x_drift(&self) -> f64 {
        self.state.x_drift
    }

    /// Signed (position, slope) bins of a tracklet.
    #[must_use]
    pub fn decode(&self, tracklet: &RawTracklet) -> (i32, i32) {
        let mode = self.config.decoding;
        (
            decode_field(
                u32::from(tracklet.position()),
                self.config.position_bits,
                mode,
            ),
            decode_field(u32::from(tracklet.slope()), self.config.slope_bits, mode),
        )
    }

    /// Pad plane of a detector.
    ///
    /// # Errors
    ///
    /// Returns an unknown-detector error if the geometry has no entry.
    pub fn pad_plane(&self, detector: u16) -> Result<&PadPlane> {
        self.geometry.pad_plane(detector).ok_or_else(|| {
            log::warn!("no pad plane for detector {detector}");
            CoreError::UnknownDetector(detector).into()
        })
    }

    /// Pad-direction coordinate of a tracklet.
    ///
    /// `position` is the decoded, signed position bin.
    #[must_use]
    pub fn calculate_y(&self, hcid: u16, column: u8, position: i32, pad_plane: &PadPlane) -> f32 {
        let side = i32::from(hcid % 2);
        let half_range = 1_i32 << (self.config.position_bits - 1);

        // position = half_range is the MCM centre
        let position = position + half_range;
        let pad = f64::from(position - half_range) * GRANULARITY_POSITION
            + f64::from(NCOL_MCM * (4 * side + i32::from(column)))
            + ROW_ALIGNMENT_PADS
            - SHARED_PAD_CORRECTION;

        (pad_plane.pad_width * (pad - REFERENCE_PAD)) as f32
    }

    /// Row-direction coordinate: lower edge of `padrow` relative to the middle row.
    ///
    /// # Errors
    ///
    /// Returns an error if `padrow` (or the middle row) is not in the pad plane.
    pub fn calculate_z(&self, detector: u16, padrow: u8, pad_plane: &PadPlane) -> Result<f32> {
        let out_of_range = || CoreError::PadRowOutOfRange {
            detector,
            row: padrow,
            rows: pad_plane.row_count(),
        };
        let row = usize::from(padrow);
        let row_pos = pad_plane.row_pos(row).ok_or_else(out_of_range)?;
        let row_size = pad_plane.row_size(row).ok_or_else(out_of_range)?;
        let middle_row_pos = pad_plane
            .row_pos(pad_plane.row_count() / 2)
            .ok_or_else(out_of_range)?;

        Ok((row_pos - row_size / 2.0 - middle_row_pos) as f32)
    }

    /// Calibrated deviation of a tracklet over the drift length.
    ///
    /// The Lorentz correction uses the angle with the sign delivered by the
    /// calibration service and measures the drift along x. Both conventions
    /// are unconfirmed.
    #[must_use]
    pub fn calculate_dy(&self, detector: u16, slope: i32, pad_plane: &PadPlane) -> f32 {
        let pad_width = pad_plane.pad_width;
        let vdrift = f64::from(self.calibration.drift_velocity(detector));
        let exb = f64::from(self.calibration.exb(detector));

        // drift time over the cathode height in timebins of 100 ns
        let timebins = (self.state.x_cathode / vdrift) * 10.0;
        let raw_dy = f64::from(slope) * timebins * pad_width * GRANULARITY_SLOPE / SLOPE_BIT_SHIFT;
        let lorentz_correction = exb.tan() * self.state.x_anode;

        (raw_dy - lorentz_correction) as f32
    }

    /// Applies the t0 correction to a drift coordinate.
    ///
    /// t0 is the chamber average stored for the reference region, not a
    /// per-chamber value.
    #[must_use]
    pub fn calibrate_x(&self, x: f64) -> f32 {
        let t0 = self.calibration.t0(self.config.t0_reference_region);
        (x + f64::from(t0)) as f32
    }

    /// Maps a chamber-local point to the tracking frame.
    ///
    /// # Errors
    ///
    /// Returns an unknown-detector error if the geometry has no matrix.
    pub fn local_to_global(&self, detector: u16, point: [f64; 3]) -> Result<[f32; 3]> {
        let matrix = self.geometry.local_to_global(detector).ok_or_else(|| {
            log::warn!("no local-to-tracking matrix for detector {detector}");
            CoreError::UnknownDetector(detector)
        })?;
        let p = matrix.apply(point);
        Ok([p[0] as f32, p[1] as f32, p[2] as f32])
    }

    /// Uncalibrated chamber-local point of a tracklet.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown detectors or pad rows.
    pub fn local_point(&self, tracklet: &RawTracklet) -> Result<[f32; 3]> {
        let pad_plane = self.pad_plane(tracklet.detector())?;
        let (position, _) = self.decode(tracklet);
        self.local_point_on(tracklet, position, pad_plane)
    }

    fn local_point_on(
        &self,
        tracklet: &RawTracklet,
        position: i32,
        pad_plane: &PadPlane,
    ) -> Result<[f32; 3]> {
        let x = self.state.x_drift as f32;
        let y = self.calculate_y(tracklet.hcid(), tracklet.column(), position, pad_plane);
        let z = self.calculate_z(tracklet.detector(), tracklet.padrow(), pad_plane)?;
        Ok([x, y, z])
    }

    /// Transforms one tracklet into a calibrated space point.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown detectors or pad rows.
    pub fn transform(&self, tracklet: &RawTracklet, frame: Frame) -> Result<CalibratedTracklet> {
        let detector = tracklet.detector();
        let pad_plane = self.pad_plane(detector)?;
        let (position, slope) = self.decode(tracklet);

        let [x, y, z] = self.local_point_on(tracklet, position, pad_plane)?;
        let dy = self.calculate_dy(detector, slope, pad_plane);
        let calibrated_x = self.calibrate_x(f64::from(x));

        // TODO: correct y for the x calibration once per-chamber t0 is available
        match frame {
            Frame::Local => Ok(CalibratedTracklet::new(calibrated_x, y, z, dy)),
            Frame::Tracking => {
                let [gx, gy, gz] = self.local_to_global(
                    detector,
                    [f64::from(calibrated_x), f64::from(y), f64::from(z)],
                )?;
                log::debug!("detector {detector}: x: {gx} | y: {gy} | z: {gz}");
                Ok(CalibratedTracklet::new(gx, gy, gz, dy))
            }
        }
    }

    /// Transforms tracklets in parallel, preserving order.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered.
    pub fn transform_batch(
        &self,
        tracklets: &[RawTracklet],
        frame: Frame,
    ) -> Result<Vec<CalibratedTracklet>> {
        tracklets
            .par_iter()
            .map(|tracklet| self.transform(tracklet, frame))
            .collect()
    }

    /// Timebin of a drift coordinate.
    ///
    /// x = 0 is the anode plane and x points toward the pad plane. Below the
    /// amplification region the drift velocity gives the timebin; inside it
    /// the value is a rough estimate.
    #[must_use]
    pub fn timebin_from_x(&self, detector: u16, x: f64) -> f64 {
        let vdrift = f64::from(self.calibration.drift_velocity(detector));
        let anode_half_height = self.geometry.amplification_height() / 2.0;

        if x < -anode_half_height {
            DRIFT_START_TIMEBIN - (x + anode_half_height) / (vdrift * 0.1)
        } else {
            DRIFT_START_TIMEBIN - 1.0 + x.abs()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CalibrationTable, ChamberGeometry, GeometryTable};
    use approx::assert_relative_eq;
    use trdlet_core::{Affine3, DecodingMode};

    fn geometry() -> GeometryTable {
        GeometryTable::new(3.0, 0.7).with_chamber(
            0,
            ChamberGeometry::new(
                PadPlane::from_row_sizes(0.635, vec![9.0; 16]),
                Affine3::translation(300.0, 0.0, 0.0),
            ),
        )
    }

    fn transformer(
        calibration: CalibrationTable,
    ) -> TrackletTransformer<GeometryTable, CalibrationTable> {
        TrackletTransformer::new(geometry(), calibration, TransformerConfig::default()).unwrap()
    }

    #[test]
    fn test_state_from_geometry() {
        let t = transformer(CalibrationTable::default());
        let state = t.state();
        assert_relative_eq!(state.x_cathode, 3.0);
        assert_relative_eq!(state.x_anode, 3.35);
        assert_relative_eq!(state.x_drift, 2.5);
        assert_relative_eq!(state.x_tb0, -100.0);
    }

    #[test]
    fn test_rejects_non_positive_heights() {
        let result = TrackletTransformer::new(
            GeometryTable::new(0.0, 0.7),
            CalibrationTable::default(),
            TransformerConfig::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_calculate_y_centre() {
        let t = transformer(CalibrationTable::default());
        let plane = t.pad_plane(0).unwrap();
        // 18 * 0 + 10 - 1 - 72
        assert_relative_eq!(t.calculate_y(0, 0, 0, plane), (0.635 * -63.0) as f32);
        // side 1, column 3: 18 * 7 + 9 - 72
        assert_relative_eq!(t.calculate_y(1, 3, 0, plane), (0.635 * 63.0) as f32);
        // 80 bins are one pad
        let one_pad = t.calculate_y(0, 0, 80, plane) - t.calculate_y(0, 0, 0, plane);
        assert_relative_eq!(one_pad, 0.635, epsilon = 1e-5);
    }

    #[test]
    fn test_calculate_z_rows() {
        let t = transformer(CalibrationTable::default());
        let plane = t.pad_plane(0).unwrap();
        assert_relative_eq!(t.calculate_z(0, 0, plane).unwrap(), 67.5);
        assert_relative_eq!(t.calculate_z(0, 8, plane).unwrap(), -4.5);
        assert_relative_eq!(t.calculate_z(0, 15, plane).unwrap(), -67.5);
    }

    #[test]
    fn test_calculate_z_rejects_missing_row() {
        let t = transformer(CalibrationTable::default());
        let plane = PadPlane::from_row_sizes(0.635, vec![9.0; 12]);
        let err = t.calculate_z(7, 12, &plane).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::CoreError(CoreError::PadRowOutOfRange {
                detector: 7,
                row: 12,
                rows: 12
            })
        ));
    }

    #[test]
    fn test_calculate_dy_without_lorentz_angle() {
        let t = transformer(CalibrationTable::uniform(1.5, 0.0, 0.0));
        let plane = t.pad_plane(0).unwrap();
        // 3.0 / 1.5 * 10 = 20 timebins
        let expected = 16.0 * 20.0 * 0.635 / 1000.0 / 8.0;
        assert_relative_eq!(t.calculate_dy(0, 16, plane), expected as f32, epsilon = 1e-6);
        assert_relative_eq!(t.calculate_dy(0, 0, plane), 0.0);
    }

    #[test]
    fn test_calculate_dy_lorentz_correction() {
        let t = transformer(CalibrationTable::uniform(1.5, 0.1, 0.0));
        let plane = t.pad_plane(0).unwrap();
        let expected = -(0.1_f32 as f64).tan() * 3.35;
        assert_relative_eq!(t.calculate_dy(0, 0, plane), expected as f32, epsilon = 1e-6);
    }

    #[test]
    fn test_calibrate_x_uses_reference_region() {
        let calibration = CalibrationTable::default()
            .with_t0(435, 0.25)
            .with_t0(0, 10.0);
        let t = transformer(calibration);
        assert_relative_eq!(t.calibrate_x(2.5), 2.75);
    }

    #[test]
    fn test_decode_modes() {
        let tracklet = RawTracklet::new(0, 0, 0, 0x400, 0x80);
        let direct = transformer(CalibrationTable::default());
        assert_eq!(direct.decode(&tracklet), (-1024, -128));

        let legacy = TrackletTransformer::new(
            geometry(),
            CalibrationTable::default(),
            TransformerConfig::new().with_decoding(DecodingMode::LegacyXor),
        )
        .unwrap();
        // legacy words flip bit 7 in both fields
        assert_eq!(legacy.decode(&tracklet), (-896, 0));
        let centred = RawTracklet::new(0, 0, 0, 0x080, 0x80);
        assert_eq!(legacy.decode(&centred), (0, 0));
        assert_eq!(legacy.config().decoding, DecodingMode::LegacyXor);
    }

    #[test]
    fn test_transform_matches_local_point() {
        let t = transformer(CalibrationTable::uniform(1.5, 0.05, 0.0));
        for tracklet in [
            RawTracklet::new(0, 3, 1, 0x155, 0x21),
            RawTracklet::new(1, 15, 3, 0x7FF, 0xF0),
        ] {
            let [x, y, z] = t.local_point(&tracklet).unwrap();
            let local = t.transform(&tracklet, Frame::Local).unwrap();
            assert_relative_eq!(local.x, x);
            assert_relative_eq!(local.y, y);
            assert_relative_eq!(local.z, z);
        }
    }

    #[test]
    fn test_transform_local_and_tracking() {
        let t = transformer(CalibrationTable::uniform(1.5, 0.0, 0.1));
        let tracklet = RawTracklet::new(0, 8, 0, 0, 0);

        let local = t.transform(&tracklet, Frame::Local).unwrap();
        assert_relative_eq!(local.x, 2.6, epsilon = 1e-6);
        assert_relative_eq!(local.z, -4.5);
        assert_relative_eq!(local.dy, 0.0);

        let tracking = t.transform(&tracklet, Frame::Tracking).unwrap();
        assert_relative_eq!(tracking.x, 302.6, epsilon = 1e-4);
        assert_relative_eq!(tracking.y, local.y);
        assert_relative_eq!(tracking.z, local.z);
        assert_relative_eq!(tracking.dy, local.dy);
    }

    #[test]
    fn test_transform_unknown_detector() {
        let t = transformer(CalibrationTable::default());
        let tracklet = RawTracklet::new(2 * 17, 0, 0, 0, 0);
        let err = t.transform(&tracklet, Frame::Local).unwrap_err();
        assert_eq!(err.unknown_detector(), Some(17));
    }

    #[test]
    fn test_timebin_regions() {
        let t = transformer(CalibrationTable::uniform(1.5, 0.0, 0.0));
        // drift region: 4 - (-1.85 + 0.35) / 0.15 = 14
        assert_relative_eq!(t.timebin_from_x(0, -1.85), 14.0, epsilon = 1e-9);
        // anode region
        assert_relative_eq!(t.timebin_from_x(0, -0.2), 3.2, epsilon = 1e-9);
        assert_relative_eq!(t.timebin_from_x(0, 0.0), 3.0);
        // boundary belongs to the anode region
        assert_relative_eq!(t.timebin_from_x(0, -0.35), 3.35, epsilon = 1e-9);
    }
}
