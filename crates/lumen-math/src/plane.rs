//! Oriented planes in Hessian normal form.

use serde::{Deserialize, Serialize};

use crate::{Real, Vec3};

/// A plane `normal · p + d = 0` with unit normal.
///
/// Points with a positive signed distance are on the front side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    /// Unit normal pointing to the front half-space.
    pub normal: Vec3,
    /// Offset: `-normal · p` for any point `p` on the plane.
    pub d: Real,
}

impl Plane {
    /// Plane through `point` with the given (unnormalized) normal.
    ///
    /// Returns `None` if the normal has zero length.
    pub fn from_point_normal(point: &Vec3, normal: &Vec3) -> Option<Self> {
        let len = normal.norm();
        if len == 0.0 || !len.is_finite() {
            return None;
        }
        let normal = normal / len;
        Some(Self {
            normal,
            d: -normal.dot(point),
        })
    }

    /// Plane of the triangle `(v0, v0 + side1, v0 + side2)`, oriented so that
    /// counter-clockwise winding faces the front.
    ///
    /// Returns `None` for zero-area triangles.
    pub fn from_triangle(v0: &Vec3, side1: &Vec3, side2: &Vec3) -> Option<Self> {
        Self::from_point_normal(v0, &side1.cross(side2))
    }

    /// Signed distance of `p` from the plane.
    #[inline]
    pub fn distance(&self, p: &Vec3) -> Real {
        self.normal.dot(p) + self.d
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triangle_plane_orientation() {
        let plane = Plane::from_triangle(
            &Vec3::zeros(),
            &Vec3::new(1.0, 0.0, 0.0),
            &Vec3::new(0.0, 1.0, 0.0),
        )
        .unwrap();
        assert!((plane.normal - Vec3::z()).norm() < 1e-6);
        assert!(plane.distance(&Vec3::new(3.0, 4.0, 2.0)) > 0.0);
        assert!(plane.distance(&Vec3::new(3.0, 4.0, -2.0)) < 0.0);
    }

    #[test]
    fn test_degenerate_triangle_has_no_plane() {
        let side = Vec3::new(1.0, 1.0, 0.0);
        assert!(Plane::from_triangle(&Vec3::zeros(), &side, &(side * 2.0)).is_none());
    }

    #[test]
    fn test_offset_plane_distance() {
        let plane = Plane::from_point_normal(&Vec3::new(0.0, 0.0, 5.0), &Vec3::new(0.0, 0.0, 2.0))
            .unwrap();
        assert!((plane.distance(&Vec3::new(9.0, -3.0, 7.0)) - 2.0).abs() < 1e-6);
    }
}
