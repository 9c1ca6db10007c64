use serde::{Deserialize, Serialize};

use crate::geometry::{BoundingBox, Point, Rect};

/// How much of a general 4x4 matrix a transform actually uses.
///
/// Ordered from least to most specific, so `category >= TwoD` means the
/// transform can be expressed as a 2D affine matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransformCategory {
    /// Includes a projective component.
    Any,
    /// 3D affine.
    ThreeD,
    /// 2D affine with rotation or skew.
    TwoD,
    /// Scale and translation only.
    Affine2d,
    Translate2d,
    Identity,
}

/// A 4x4 transformation matrix stored in row-major order.
///
/// Points are column vectors, so translation lives in the last column and
/// `a.then(&b)` applies `b` first.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Matrix data in row-major order: [row0, row1, row2, row3]
    pub data: [f32; 16],
}

impl Transform {
    /// Identity matrix (no transformation)
    pub const IDENTITY: Self = Self {
        data: [
            1.0, 0.0, 0.0, 0.0, // row 0
            0.0, 1.0, 0.0, 0.0, // row 1
            0.0, 0.0, 1.0, 0.0, // row 2
            0.0, 0.0, 0.0, 1.0, // row 3
        ],
    };

    pub fn identity() -> Self {
        Self::IDENTITY
    }

    pub fn translate(x: f32, y: f32) -> Self {
        Self::translate_3d(x, y, 0.0)
    }

    pub fn translate_3d(x: f32, y: f32, z: f32) -> Self {
        Self {
            data: [
                1.0, 0.0, 0.0, x, // row 0
                0.0, 1.0, 0.0, y, // row 1
                0.0, 0.0, 1.0, z, // row 2
                0.0, 0.0, 0.0, 1.0, // row 3
            ],
        }
    }

    /// Rotation around the Z axis (2D rotation)
    pub fn rotate(angle_radians: f32) -> Self {
        let cos = angle_radians.cos();
        let sin = angle_radians.sin();
        Self {
            data: [
                cos, -sin, 0.0, 0.0, // row 0
                sin, cos, 0.0, 0.0, // row 1
                0.0, 0.0, 1.0, 0.0, // row 2
                0.0, 0.0, 0.0, 1.0, // row 3
            ],
        }
    }

    pub fn rotate_degrees(angle_degrees: f32) -> Self {
        Self::rotate(angle_degrees.to_radians())
    }

    /// Rotation by `angle_radians` around an arbitrary axis through the origin.
    pub fn rotate_3d(angle_radians: f32, axis: [f32; 3]) -> Self {
        let len = (axis[0] * axis[0] + axis[1] * axis[1] + axis[2] * axis[2]).sqrt();
        if len == 0.0 {
            return Self::IDENTITY;
        }
        let (x, y, z) = (axis[0] / len, axis[1] / len, axis[2] / len);
        let c = angle_radians.cos();
        let s = angle_radians.sin();
        let t = 1.0 - c;
        Self {
            data: [
                t * x * x + c,
                t * x * y - s * z,
                t * x * z + s * y,
                0.0,
                t * x * y + s * z,
                t * y * y + c,
                t * y * z - s * x,
                0.0,
                t * x * z - s * y,
                t * y * z + s * x,
                t * z * z + c,
                0.0,
                0.0,
                0.0,
                0.0,
                1.0,
            ],
        }
    }

    pub fn scale(s: f32) -> Self {
        Self::scale_xy(s, s)
    }

    pub fn scale_xy(sx: f32, sy: f32) -> Self {
        Self::scale_3d(sx, sy, 1.0)
    }

    pub fn scale_3d(sx: f32, sy: f32, sz: f32) -> Self {
        Self {
            data: [
                sx, 0.0, 0.0, 0.0, // row 0
                0.0, sy, 0.0, 0.0, // row 1
                0.0, 0.0, sz, 0.0, // row 2
                0.0, 0.0, 0.0, 1.0, // row 3
            ],
        }
    }

    /// Perspective projection with the viewer `depth` units in front of the
    /// z = 0 plane.
    pub fn perspective(depth: f32) -> Self {
        let mut t = Self::IDENTITY;
        if depth != 0.0 {
            t.data[14] = -1.0 / depth;
        }
        t
    }

    /// Build from a 2D affine matrix in cairo order.
    pub fn from_2d(xx: f32, yx: f32, xy: f32, yy: f32, dx: f32, dy: f32) -> Self {
        Self {
            data: [
                xx, xy, 0.0, dx, // row 0
                yx, yy, 0.0, dy, // row 1
                0.0, 0.0, 1.0, 0.0, // row 2
                0.0, 0.0, 0.0, 1.0, // row 3
            ],
        }
    }

    /// Compose this transform with another: self * other
    /// Applies `other` first, then `self`.
    pub fn then(&self, other: &Transform) -> Transform {
        let a = &self.data;
        let b = &other.data;

        // Row-major indexing: element at row i, col j is at index i*4 + j
        let mut result = [0.0f32; 16];

        for i in 0..4 {
            for j in 0..4 {
                let mut sum = 0.0;
                for k in 0..4 {
                    sum += a[i * 4 + k] * b[k * 4 + j];
                }
                result[i * 4 + j] = sum;
            }
        }

        Transform { data: result }
    }

    /// Conjugate this transform so it pivots around `(x, y)` instead of the
    /// origin.
    pub fn center_at(&self, x: f32, y: f32) -> Transform {
        Transform::translate(x, y)
            .then(self)
            .then(&Transform::translate(-x, -y))
    }

    pub fn category(&self) -> TransformCategory {
        let d = &self.data;
        if *self == Self::IDENTITY {
            return TransformCategory::Identity;
        }
        if d[12] != 0.0 || d[13] != 0.0 || d[14] != 0.0 || d[15] != 1.0 {
            return TransformCategory::Any;
        }
        let flat = d[2] == 0.0
            && d[6] == 0.0
            && d[8] == 0.0
            && d[9] == 0.0
            && d[10] == 1.0
            && d[11] == 0.0;
        if !flat {
            return TransformCategory::ThreeD;
        }
        if d[1] != 0.0 || d[4] != 0.0 {
            return TransformCategory::TwoD;
        }
        if d[0] != 1.0 || d[5] != 1.0 {
            return TransformCategory::Affine2d;
        }
        TransformCategory::Translate2d
    }

    /// The 2D matrix in cairo order `(xx, yx, xy, yy, dx, dy)`, if the
    /// transform has no 3D or projective component.
    pub fn to_2d(&self) -> Option<(f32, f32, f32, f32, f32, f32)> {
        if self.category() < TransformCategory::TwoD {
            return None;
        }
        let d = &self.data;
        Some((d[0], d[4], d[1], d[5], d[3], d[7]))
    }

    /// `(scale_x, scale_y, dx, dy)` for scale + translate transforms.
    pub fn to_affine(&self) -> Option<(f32, f32, f32, f32)> {
        if self.category() < TransformCategory::Affine2d {
            return None;
        }
        let d = &self.data;
        Some((d[0], d[5], d[3], d[7]))
    }

    pub fn to_translate(&self) -> Option<(f32, f32)> {
        if self.category() < TransformCategory::Translate2d {
            return None;
        }
        Some((self.data[3], self.data[7]))
    }

    /// General 4x4 inverse, `None` for singular matrices.
    pub fn invert(&self) -> Option<Transform> {
        let m = &self.data;
        let mut inv = [0.0f32; 16];

        inv[0] = m[5] * m[10] * m[15] - m[5] * m[11] * m[14] - m[9] * m[6] * m[15]
            + m[9] * m[7] * m[14]
            + m[13] * m[6] * m[11]
            - m[13] * m[7] * m[10];
        inv[4] = -m[4] * m[10] * m[15] + m[4] * m[11] * m[14] + m[8] * m[6] * m[15]
            - m[8] * m[7] * m[14]
            - m[12] * m[6] * m[11]
            + m[12] * m[7] * m[10];
        inv[8] = m[4] * m[9] * m[15] - m[4] * m[11] * m[13] - m[8] * m[5] * m[15]
            + m[8] * m[7] * m[13]
            + m[12] * m[5] * m[11]
            - m[12] * m[7] * m[9];
        inv[12] = -m[4] * m[9] * m[14] + m[4] * m[10] * m[13] + m[8] * m[5] * m[14]
            - m[8] * m[6] * m[13]
            - m[12] * m[5] * m[10]
            + m[12] * m[6] * m[9];
        inv[1] = -m[1] * m[10] * m[15] + m[1] * m[11] * m[14] + m[9] * m[2] * m[15]
            - m[9] * m[3] * m[14]
            - m[13] * m[2] * m[11]
            + m[13] * m[3] * m[10];
        inv[5] = m[0] * m[10] * m[15] - m[0] * m[11] * m[14] - m[8] * m[2] * m[15]
            + m[8] * m[3] * m[14]
            + m[12] * m[2] * m[11]
            - m[12] * m[3] * m[10];
        inv[9] = -m[0] * m[9] * m[15] + m[0] * m[11] * m[13] + m[8] * m[1] * m[15]
            - m[8] * m[3] * m[13]
            - m[12] * m[1] * m[11]
            + m[12] * m[3] * m[9];
        inv[13] = m[0] * m[9] * m[14] - m[0] * m[10] * m[13] - m[8] * m[1] * m[14]
            + m[8] * m[2] * m[13]
            + m[12] * m[1] * m[10]
            - m[12] * m[2] * m[9];
        inv[2] = m[1] * m[6] * m[15] - m[1] * m[7] * m[14] - m[5] * m[2] * m[15]
            + m[5] * m[3] * m[14]
            + m[13] * m[2] * m[7]
            - m[13] * m[3] * m[6];
        inv[6] = -m[0] * m[6] * m[15] + m[0] * m[7] * m[14] + m[4] * m[2] * m[15]
            - m[4] * m[3] * m[14]
            - m[12] * m[2] * m[7]
            + m[12] * m[3] * m[6];
        inv[10] = m[0] * m[5] * m[15] - m[0] * m[7] * m[13] - m[4] * m[1] * m[15]
            + m[4] * m[3] * m[13]
            + m[12] * m[1] * m[7]
            - m[12] * m[3] * m[5];
        inv[14] = -m[0] * m[5] * m[14] + m[0] * m[6] * m[13] + m[4] * m[1] * m[14]
            - m[4] * m[2] * m[13]
            - m[12] * m[1] * m[6]
            + m[12] * m[2] * m[5];
        inv[3] = -m[1] * m[6] * m[11] + m[1] * m[7] * m[10] + m[5] * m[2] * m[11]
            - m[5] * m[3] * m[10]
            - m[9] * m[2] * m[7]
            + m[9] * m[3] * m[6];
        inv[7] = m[0] * m[6] * m[11] - m[0] * m[7] * m[10] - m[4] * m[2] * m[11]
            + m[4] * m[3] * m[10]
            + m[8] * m[2] * m[7]
            - m[8] * m[3] * m[6];
        inv[11] = -m[0] * m[5] * m[11] + m[0] * m[7] * m[9] + m[4] * m[1] * m[11]
            - m[4] * m[3] * m[9]
            - m[8] * m[1] * m[7]
            + m[8] * m[3] * m[5];
        inv[15] = m[0] * m[5] * m[10] - m[0] * m[6] * m[9] - m[4] * m[1] * m[10]
            + m[4] * m[2] * m[9]
            + m[8] * m[1] * m[6]
            - m[8] * m[2] * m[5];

        let det = m[0] * inv[0] + m[1] * inv[4] + m[2] * inv[8] + m[3] * inv[12];
        if det.abs() < 1e-10 || !det.is_finite() {
            return None;
        }
        let inv_det = 1.0 / det;
        for v in &mut inv {
            *v *= inv_det;
        }
        Some(Transform { data: inv })
    }

    /// Inverse that degrades to identity for singular matrices.
    pub fn inverse(&self) -> Transform {
        self.invert().unwrap_or(Self::IDENTITY)
    }

    /// Transform a 2D point (z = 0) by this matrix, with perspective divide.
    pub fn transform_point(&self, x: f32, y: f32) -> (f32, f32) {
        let d = &self.data;
        let new_x = d[0] * x + d[1] * y + d[3];
        let new_y = d[4] * x + d[5] * y + d[7];
        let w = d[12] * x + d[13] * y + d[15];
        if w != 1.0 && w != 0.0 {
            (new_x / w, new_y / w)
        } else {
            (new_x, new_y)
        }
    }

    /// Conservative axis-aligned bounds of `rect` after transformation.
    pub fn transform_bounds(&self, rect: &BoundingBox) -> BoundingBox {
        match self.category() {
            TransformCategory::Identity => *rect,
            TransformCategory::Translate2d => rect.translate(self.data[3], self.data[7]),
            _ => {
                let corners = rect.corners().map(|p| {
                    let (x, y) = self.transform_point(p.x, p.y);
                    Point::new(x, y)
                });
                BoundingBox::from_points(&corners).unwrap_or(*rect)
            }
        }
    }

    pub fn transform_rect(&self, rect: &Rect) -> Rect {
        self.transform_bounds(&BoundingBox::from_rect(*rect)).to_rect()
    }

    /// Length of the transformed unit vectors along x and y.
    pub fn scale_factors(&self) -> (f32, f32) {
        let d = &self.data;
        (
            (d[0] * d[0] + d[4] * d[4]).sqrt(),
            (d[1] * d[1] + d[5] * d[5]).sqrt(),
        )
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }

    /// Get the rows of the matrix for passing to the shader
    pub fn rows(&self) -> [[f32; 4]; 4] {
        [
            [self.data[0], self.data[1], self.data[2], self.data[3]],
            [self.data[4], self.data[5], self.data[6], self.data[7]],
            [self.data[8], self.data[9], self.data[10], self.data[11]],
            [self.data[12], self.data[13], self.data[14], self.data[15]],
        ]
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Drop everything but the 2D part; callers must check the category.
    pub(crate) fn to_skia(self) -> tiny_skia::Transform {
        let d = &self.data;
        tiny_skia::Transform::from_row(d[0], d[4], d[1], d[5], d[3], d[7])
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_identity() {
        let t = Transform::identity();
        assert_eq!(t, Transform::IDENTITY);
        assert!(t.is_identity());
        assert_eq!(t.category(), TransformCategory::Identity);
    }

    #[test]
    fn test_translate() {
        let t = Transform::translate(10.0, 20.0);
        let (x, y) = t.transform_point(5.0, 5.0);
        assert!(approx_eq(x, 15.0));
        assert!(approx_eq(y, 25.0));
        assert_eq!(t.category(), TransformCategory::Translate2d);
        assert_eq!(t.to_translate(), Some((10.0, 20.0)));
    }

    #[test]
    fn test_rotate() {
        let t = Transform::rotate_degrees(90.0);
        let (x, y) = t.transform_point(1.0, 0.0);
        assert!(approx_eq(x, 0.0));
        assert!(approx_eq(y, 1.0));
        assert_eq!(t.category(), TransformCategory::TwoD);
    }

    #[test]
    fn test_scale_xy() {
        let t = Transform::scale_xy(2.0, 3.0);
        let (x, y) = t.transform_point(1.0, 1.0);
        assert!(approx_eq(x, 2.0));
        assert!(approx_eq(y, 3.0));
        assert_eq!(t.category(), TransformCategory::Affine2d);
    }

    #[test]
    fn test_compose() {
        // Point (0,0) -> translate -> (10,0) -> scale -> (20,0)
        let composed = Transform::scale(2.0).then(&Transform::translate(10.0, 0.0));
        let (x, y) = composed.transform_point(0.0, 0.0);
        assert!(approx_eq(x, 20.0));
        assert!(approx_eq(y, 0.0));
    }

    #[test]
    fn test_invert_roundtrip() {
        let t = Transform::rotate_degrees(30.0)
            .then(&Transform::scale_xy(2.0, 0.5))
            .then(&Transform::translate(3.0, -7.0));
        let inv = t.invert().expect("invertible");
        let (x, y) = t.then(&inv).transform_point(3.0, 4.0);
        assert!(approx_eq(x, 3.0));
        assert!(approx_eq(y, 4.0));
    }

    #[test]
    fn test_singular_has_no_inverse() {
        assert!(Transform::scale_xy(0.0, 1.0).invert().is_none());
        assert_eq!(Transform::scale_xy(0.0, 1.0).inverse(), Transform::IDENTITY);
    }

    #[test]
    fn test_3d_categories() {
        let t = Transform::rotate_3d(0.5, [1.0, 0.0, 0.0]);
        assert_eq!(t.category(), TransformCategory::ThreeD);
        assert!(t.to_2d().is_none());
        let p = Transform::perspective(100.0).then(&t);
        assert_eq!(p.category(), TransformCategory::Any);
    }

    #[test]
    fn test_rotate_3d_about_z_matches_rotate() {
        let a = Transform::rotate_3d(0.7, [0.0, 0.0, 1.0]);
        let b = Transform::rotate(0.7);
        for (x, y) in a.data.iter().zip(b.data.iter()) {
            assert!(approx_eq(*x, *y));
        }
    }

    #[test]
    fn test_transform_bounds_rotation() {
        let b = BoundingBox::from_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
        let out = Transform::rotate_degrees(45.0).transform_bounds(&b);
        let diag = 10.0 * std::f32::consts::SQRT_2;
        assert!(approx_eq(out.width(), diag));
        assert!(approx_eq(out.height(), diag));
    }

    #[test]
    fn test_center_at() {
        let t = Transform::scale(2.0).center_at(5.0, 5.0);
        let (x, y) = t.transform_point(5.0, 5.0);
        assert!(approx_eq(x, 5.0));
        assert!(approx_eq(y, 5.0));
    }

    #[test]
    fn test_rows() {
        let rows = Transform::translate(1.0, 2.0).rows();
        assert_eq!(rows[0], [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(rows[1], [0.0, 1.0, 0.0, 2.0]);
        assert_eq!(rows[3], [0.0, 0.0, 0.0, 1.0]);
    }
}
