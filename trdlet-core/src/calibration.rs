//! Calibration service seams.

use std::sync::Arc;

/// Per-chamber drift calibration.
pub trait DriftCalibration: Send + Sync {
    /// Drift velocity (cm/us).
    fn drift_velocity(&self, detector: u16) -> f32;

    /// Lorentz angle (rad).
    fn exb(&self, detector: u16) -> f32;
}

/// Timing offsets, keyed by calibration region.
pub trait TimingCalibration: Send + Sync {
    /// t0 of a region (cm-equivalent offset along the drift axis).
    fn t0(&self, region: u16) -> f32;
}

impl<T: DriftCalibration + ?Sized> DriftCalibration for &T {
    fn drift_velocity(&self, detector: u16) -> f32 {
        (**self).drift_velocity(detector)
    }

    fn exb(&self, detector: u16) -> f32 {
        (**self).exb(detector)
    }
}

impl<T: DriftCalibration + ?Sized> DriftCalibration for Arc<T> {
    fn drift_velocity(&self, detector: u16) -> f32 {
        (**self).drift_velocity(detector)
    }

    fn exb(&self, detector: u16) -> f32 {
        (**self).exb(detector)
    }
}

impl<T: TimingCalibration + ?Sized> TimingCalibration for &T {
    fn t0(&self, region: u16) -> f32 {
        (**self).t0(region)
    }
}

impl<T: TimingCalibration + ?Sized> TimingCalibration for Arc<T> {
    fn t0(&self, region: u16) -> f32 {
        (**self).t0(region)
    }
}
