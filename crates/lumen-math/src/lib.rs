#![warn(missing_docs)]

//! Math types for the lumen collision library.
//!
//! Thin wrappers around nalgebra providing the value types shared by the
//! mesh layer and the collider: vectors, planes, bounding boxes, affine
//! transforms and tolerance constants. Everything is single precision to
//! match the vertex buffers handed in by renderers.

mod aabb;
mod plane;

use nalgebra::{Matrix4, Vector2, Vector3, Vector4};
use serde::{Deserialize, Serialize};

pub use aabb::Aabb3;
pub use plane::Plane;

/// Scalar type used for all geometry.
pub type Real = f32;

/// A vector (or point) in 3D space.
pub type Vec3 = Vector3<Real>;

/// A vector in 2D space, used for barycentric hit positions.
pub type Vec2 = Vector2<Real>;

/// Coordinate axis selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// The x axis.
    X,
    /// The y axis.
    Y,
    /// The z axis.
    Z,
}

impl Axis {
    /// All three axes in index order.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Component index (0, 1 or 2).
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// A 4x4 affine transformation matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// The underlying 4x4 matrix.
    pub matrix: Matrix4<Real>,
}

impl Transform {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Translation by `(dx, dy, dz)`.
    pub fn translation(dx: Real, dy: Real, dz: Real) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 3)] = dx;
        m[(1, 3)] = dy;
        m[(2, 3)] = dz;
        Self { matrix: m }
    }

    /// Non-uniform scale by `(sx, sy, sz)`.
    pub fn scale(sx: Real, sy: Real, sz: Real) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 0)] = sx;
        m[(1, 1)] = sy;
        m[(2, 2)] = sz;
        Self { matrix: m }
    }

    /// Transform a position.
    pub fn apply_point(&self, p: &Vec3) -> Vec3 {
        let v = self.matrix * Vector4::new(p.x, p.y, p.z, 1.0);
        Vec3::new(v.x, v.y, v.z)
    }

    /// Transform a direction vector (ignores translation).
    pub fn apply_vec(&self, v: &Vec3) -> Vec3 {
        let r = self.matrix * Vector4::new(v.x, v.y, v.z, 0.0);
        Vec3::new(r.x, r.y, r.z)
    }

    /// Whether this transform flips handedness (negative determinant of the
    /// linear part). Mirrored meshes have their triangle winding reversed.
    pub fn is_mirroring(&self) -> bool {
        self.matrix.fixed_view::<3, 3>(0, 0).determinant() < 0.0
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Tolerance constants for geometric comparisons.
#[derive(Debug, Clone, Copy)]
pub struct Tolerance {
    /// Linear distance tolerance in scene units.
    pub linear: Real,
}

impl Tolerance {
    /// Default tolerance (1e-6 scene units).
    pub const DEFAULT: Self = Self { linear: 1e-6 };

    /// Tolerance scaled to a scene of the given size (box diagonal).
    ///
    /// Never smaller than [`Tolerance::DEFAULT`].
    pub fn for_scene_size(size: Real) -> Self {
        Self {
            linear: (size * 1e-6).max(Self::DEFAULT.linear),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_identity_transform() {
        let t = Transform::identity();
        let p = Vec3::new(1.0, 2.0, 3.0);
        assert!((t.apply_point(&p) - p).norm() < 1e-6);
    }

    #[test]
    fn test_translation_ignores_vectors() {
        let t = Transform::translation(10.0, 20.0, 30.0);
        let p = Vec3::new(1.0, 2.0, 3.0);
        assert_relative_eq!(t.apply_point(&p), Vec3::new(11.0, 22.0, 33.0));
        assert_relative_eq!(t.apply_vec(&p), p);
    }

    #[test]
    fn test_mirroring() {
        assert!(!Transform::scale(1.0, 2.0, 3.0).is_mirroring());
        assert!(Transform::scale(-1.0, 1.0, 1.0).is_mirroring());
    }

    #[test]
    fn test_tolerance_scales_with_scene() {
        let tol = Tolerance::for_scene_size(1000.0);
        assert!((tol.linear - 1e-3).abs() < 1e-9);
        assert_eq!(Tolerance::for_scene_size(0.0).linear, Tolerance::DEFAULT.linear);
    }

    #[test]
    fn test_axis_index() {
        let idx: Vec<usize> = Axis::ALL.iter().map(|a| a.index()).collect();
        assert_eq!(idx, vec![0, 1, 2]);
    }
}
