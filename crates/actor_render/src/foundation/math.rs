//! Math utilities and types
//!
//! Provides the 2D affine transform used for part world transforms, the view
//! transform and per-bone skinning matrices.

pub use nalgebra::{Matrix3, Vector2};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3x3 matrix type (homogeneous 2D)
pub type Mat3 = Matrix3<f32>;

/// Number of floats in the packed affine layout `[a, b, c, d, tx, ty]`
pub const AFFINE_COMPONENTS: usize = 6;

/// 2D affine transform
///
/// Stored as a homogeneous 3x3 matrix:
///
/// ```text
/// | a  c  tx |
/// | b  d  ty |
/// | 0  0  1  |
/// ```
///
/// The packed form `[a, b, c, d, tx, ty]` is what the draw primitive and the
/// skinning bone table consume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform2D {
    matrix: Mat3,
}

impl Default for Transform2D {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform2D {
    /// Identity transform
    pub fn identity() -> Self {
        Self { matrix: Mat3::identity() }
    }

    /// Build from the six affine components
    pub fn new(a: f32, b: f32, c: f32, d: f32, tx: f32, ty: f32) -> Self {
        Self {
            matrix: Mat3::new(
                a, c, tx,
                b, d, ty,
                0.0, 0.0, 1.0,
            ),
        }
    }

    /// Build from the packed `[a, b, c, d, tx, ty]` layout
    pub fn from_array(m: [f32; AFFINE_COMPONENTS]) -> Self {
        Self::new(m[0], m[1], m[2], m[3], m[4], m[5])
    }

    /// Pure translation
    pub fn from_translation(x: f32, y: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, x, y)
    }

    /// Rotation about the origin, in radians
    pub fn from_rotation(angle: f32) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::new(cos, sin, -sin, cos, 0.0, 0.0)
    }

    /// Non-uniform scale about the origin
    pub fn from_scale(sx: f32, sy: f32) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Packed `[a, b, c, d, tx, ty]` layout
    pub fn to_array(&self) -> [f32; AFFINE_COMPONENTS] {
        let m = &self.matrix;
        [m.m11, m.m21, m.m12, m.m22, m.m13, m.m23]
    }

    /// Underlying homogeneous matrix
    pub fn matrix(&self) -> &Mat3 {
        &self.matrix
    }

    /// Apply this transform to a point
    pub fn transform_point(&self, point: Vec2) -> Vec2 {
        let p = self.matrix * point.push(1.0);
        Vec2::new(p.x, p.y)
    }

    /// `self * other`: applies `other` first, then `self`
    pub fn then(&self, other: &Self) -> Self {
        Self { matrix: self.matrix * other.matrix }
    }
}

impl std::ops::Mul for Transform2D {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        self.then(&rhs)
    }
}

/// Flatten a bone transform list into the packed table layout
pub fn pack_affine_table(transforms: &[Transform2D], out: &mut Vec<f32>) {
    out.clear();
    out.reserve(transforms.len() * AFFINE_COMPONENTS);
    for transform in transforms {
        out.extend_from_slice(&transform.to_array());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_array_round_trip_layout() {
        let t = Transform2D::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
        assert_eq!(t.to_array(), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(Transform2D::from_array(t.to_array()), t);
    }

    #[test]
    fn test_translation_then_rotation() {
        let rotate = Transform2D::from_rotation(std::f32::consts::FRAC_PI_2);
        let translate = Transform2D::from_translation(10.0, 0.0);

        // Rotate first, then translate
        let p = (translate * rotate).transform_point(Vec2::new(1.0, 0.0));
        assert_relative_eq!(p.x, 10.0, epsilon = EPSILON);
        assert_relative_eq!(p.y, 1.0, epsilon = EPSILON);
    }

    #[test]
    fn test_pack_affine_table() {
        let mut table = vec![99.0];
        pack_affine_table(&[Transform2D::identity(), Transform2D::from_scale(2.0, 3.0)], &mut table);
        assert_eq!(table, vec![1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 2.0, 0.0, 0.0, 3.0, 0.0, 0.0]);
    }
}
