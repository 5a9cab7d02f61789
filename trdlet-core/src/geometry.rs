//! Chamber geometry: pad planes, frame transforms and the geometry service.

use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Pad-plane layout of one chamber.
///
/// Rows are ordered from the +z end of the chamber. `row_pos` holds the
/// upper (+z) edge of each row.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PadPlane {
    /// Width of the inner pads (cm).
    pub pad_width: f64,
    /// Upper edge of each row (cm).
    pub row_pos: Vec<f64>,
    /// Length of each row (cm).
    pub row_size: Vec<f64>,
}

impl PadPlane {
    /// Creates a pad plane from explicit row edges and lengths.
    ///
    /// Returns `None` if the two vectors differ in length.
    #[must_use]
    pub fn new(pad_width: f64, row_pos: Vec<f64>, row_size: Vec<f64>) -> Option<Self> {
        (row_pos.len() == row_size.len()).then_some(Self {
            pad_width,
            row_pos,
            row_size,
        })
    }

    /// Stacks rows of the given lengths downwards from `+total/2`, so the
    /// pad plane is centred on z = 0.
    #[must_use]
    pub fn from_row_sizes(pad_width: f64, row_size: Vec<f64>) -> Self {
        let total: f64 = row_size.iter().sum();
        let mut edge = total / 2.0;
        let row_pos = row_size
            .iter()
            .map(|size| {
                let pos = edge;
                edge -= size;
                pos
            })
            .collect();
        Self {
            pad_width,
            row_pos,
            row_size,
        }
    }

    /// Number of pad rows.
    #[inline]
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.row_pos.len()
    }

    /// Upper edge of `row`, if it exists.
    #[inline]
    #[must_use]
    pub fn row_pos(&self, row: usize) -> Option<f64> {
        self.row_pos.get(row).copied()
    }

    /// Length of `row`, if it exists.
    #[inline]
    #[must_use]
    pub fn row_size(&self, row: usize) -> Option<f64> {
        self.row_size.get(row).copied()
    }
}

/// 3-D affine transformation (rotation/scale + translation).
///
/// `p' = rotation * p + translation`
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Affine3 {
    /// Row-major linear part.
    pub rotation: [[f64; 3]; 3],
    /// Translation applied after the linear part.
    pub translation: [f64; 3],
}

impl Default for Affine3 {
    fn default() -> Self {
        Self::identity()
    }
}

impl Affine3 {
    /// Identity transform.
    #[must_use]
    pub const fn identity() -> Self {
        Self {
            rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            translation: [0.0; 3],
        }
    }

    /// Pure translation.
    #[must_use]
    pub const fn translation(dx: f64, dy: f64, dz: f64) -> Self {
        Self {
            rotation: Self::identity().rotation,
            translation: [dx, dy, dz],
        }
    }

    /// Rotation by `angle` radians about the z axis.
    #[must_use]
    pub fn rotation_z(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self {
            rotation: [[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]],
            translation: [0.0; 3],
        }
    }

    /// Builds a transform from a 3x4 row-major matrix `[R | t]`.
    #[must_use]
    pub fn from_rows(rows: [[f64; 4]; 3]) -> Self {
        let mut rotation = [[0.0; 3]; 3];
        let mut translation = [0.0; 3];
        for (i, row) in rows.iter().enumerate() {
            rotation[i].copy_from_slice(&row[..3]);
            translation[i] = row[3];
        }
        Self {
            rotation,
            translation,
        }
    }

    /// Applies the transform to a point.
    #[inline]
    #[must_use]
    pub fn apply(&self, p: [f64; 3]) -> [f64; 3] {
        let r = &self.rotation;
        let t = &self.translation;
        [
            r[0][0] * p[0] + r[0][1] * p[1] + r[0][2] * p[2] + t[0],
            r[1][0] * p[0] + r[1][1] * p[1] + r[1][2] * p[2] + t[1],
            r[2][0] * p[0] + r[2][1] * p[1] + r[2][2] * p[2] + t[2],
        ]
    }

    /// Applies only the linear part (for directions).
    #[inline]
    #[must_use]
    pub fn apply_vector(&self, v: [f64; 3]) -> [f64; 3] {
        let r = &self.rotation;
        [
            r[0][0] * v[0] + r[0][1] * v[1] + r[0][2] * v[2],
            r[1][0] * v[0] + r[1][1] * v[1] + r[1][2] * v[2],
            r[2][0] * v[0] + r[2][1] * v[1] + r[2][2] * v[2],
        ]
    }

    /// Composition: the result applies `self` first, then `next`.
    #[must_use]
    pub fn then(&self, next: &Self) -> Self {
        let a = &next.rotation;
        let b = &self.rotation;
        let mut rotation = [[0.0; 3]; 3];
        for (i, row) in rotation.iter_mut().enumerate() {
            for (j, value) in row.iter_mut().enumerate() {
                *value = a[i][0] * b[0][j] + a[i][1] * b[1][j] + a[i][2] * b[2][j];
            }
        }
        Self {
            rotation,
            translation: next.apply(self.translation),
        }
    }

    /// Determinant of the linear part.
    #[must_use]
    pub fn determinant(&self) -> f64 {
        let m = &self.rotation;
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    }

    /// Inverse transform, or `None` if the linear part is singular.
    #[must_use]
    pub fn inverse(&self) -> Option<Self> {
        let det = self.determinant();
        if det.abs() < f64::EPSILON {
            return None;
        }
        let m = &self.rotation;
        let inv_det = 1.0 / det;
        let cof = |r0: usize, r1: usize, c0: usize, c1: usize| {
            m[r0][c0] * m[r1][c1] - m[r0][c1] * m[r1][c0]
        };
        let rotation = [
            [
                cof(1, 2, 1, 2) * inv_det,
                -cof(0, 2, 1, 2) * inv_det,
                cof(0, 1, 1, 2) * inv_det,
            ],
            [
                -cof(1, 2, 0, 2) * inv_det,
                cof(0, 2, 0, 2) * inv_det,
                -cof(0, 1, 0, 2) * inv_det,
            ],
            [
                cof(1, 2, 0, 1) * inv_det,
                -cof(0, 2, 0, 1) * inv_det,
                cof(0, 1, 0, 1) * inv_det,
            ],
        ];
        let linear = Self {
            rotation,
            translation: [0.0; 3],
        };
        let t = linear.apply_vector(self.translation);
        Some(Self {
            rotation,
            translation: [-t[0], -t[1], -t[2]],
        })
    }
}

/// Read-only geometry service.
///
/// Implementations must be safe for concurrent reads; the transformer
/// never mutates them.
pub trait Geometry: Send + Sync {
    /// Pad plane of a chamber.
    fn pad_plane(&self, detector: u16) -> Option<&PadPlane>;

    /// Chamber-local to tracking-frame transform.
    fn local_to_global(&self, detector: u16) -> Option<&Affine3>;

    /// Height of the drift region (cm).
    fn cathode_height(&self) -> f64;

    /// Height of the amplification region (cm).
    fn amplification_height(&self) -> f64;
}

impl<T: Geometry + ?Sized> Geometry for &T {
    fn pad_plane(&self, detector: u16) -> Option<&PadPlane> {
        (**self).pad_plane(detector)
    }

    fn local_to_global(&self, detector: u16) -> Option<&Affine3> {
        (**self).local_to_global(detector)
    }

    fn cathode_height(&self) -> f64 {
        (**self).cathode_height()
    }

    fn amplification_height(&self) -> f64 {
        (**self).amplification_height()
    }
}

impl<T: Geometry + ?Sized> Geometry for Arc<T> {
    fn pad_plane(&self, detector: u16) -> Option<&PadPlane> {
        (**self).pad_plane(detector)
    }

    fn local_to_global(&self, detector: u16) -> Option<&Affine3> {
        (**self).local_to_global(detector)
    }

    fn cathode_height(&self) -> f64 {
        (**self).cathode_height()
    }

    fn amplification_height(&self) -> f64 {
        (**self).amplification_height()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn assert_point_eq(a: [f64; 3], b: [f64; 3]) {
        for i in 0..3 {
            assert_relative_eq!(a[i], b[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_pad_plane_from_row_sizes() {
        let plane = PadPlane::from_row_sizes(0.635, vec![8.0, 9.0, 9.0, 8.0]);
        assert_eq!(plane.row_count(), 4);
        assert_relative_eq!(plane.row_pos(0).unwrap(), 17.0);
        assert_relative_eq!(plane.row_pos(1).unwrap(), 9.0);
        assert_relative_eq!(plane.row_pos(2).unwrap(), 0.0);
        assert_relative_eq!(plane.row_pos(3).unwrap(), -9.0);
        assert_relative_eq!(plane.row_size(3).unwrap(), 8.0);
        assert!(plane.row_pos(4).is_none());
    }

    #[test]
    fn test_pad_plane_new_rejects_mismatch() {
        assert!(PadPlane::new(0.7, vec![1.0, 0.0], vec![1.0]).is_none());
        assert!(PadPlane::new(0.7, vec![1.0], vec![1.0]).is_some());
    }

    #[test]
    fn test_affine_translation_and_rotation() {
        let shift = Affine3::translation(1.0, 2.0, 3.0);
        assert_point_eq(shift.apply([0.5, 0.0, -1.0]), [1.5, 2.0, 2.0]);

        let rot = Affine3::rotation_z(FRAC_PI_2);
        assert_point_eq(rot.apply([1.0, 0.0, 5.0]), [0.0, 1.0, 5.0]);
    }

    #[test]
    fn test_affine_composition_order() {
        let rot = Affine3::rotation_z(FRAC_PI_2);
        let shift = Affine3::translation(10.0, 0.0, 0.0);
        let p = [1.0, 0.0, 0.0];

        // rotate, then shift
        assert_point_eq(rot.then(&shift).apply(p), [10.0, 1.0, 0.0]);
        // shift, then rotate
        assert_point_eq(shift.then(&rot).apply(p), [0.0, 11.0, 0.0]);
    }

    #[test]
    fn test_affine_inverse() {
        let m = Affine3::from_rows([
            [2.0, 0.0, 1.0, 4.0],
            [0.0, 1.0, 0.0, -3.0],
            [1.0, 0.0, 1.0, 0.5],
        ]);
        let inv = m.inverse().unwrap();
        let p = [0.3, -7.0, 12.5];
        assert_point_eq(inv.apply(m.apply(p)), p);
        assert_point_eq(m.then(&inv).apply(p), p);
    }

    #[test]
    fn test_affine_singular_has_no_inverse() {
        let m = Affine3::from_rows([
            [1.0, 2.0, 3.0, 0.0],
            [2.0, 4.0, 6.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
        ]);
        assert!(m.inverse().is_none());
    }
}
