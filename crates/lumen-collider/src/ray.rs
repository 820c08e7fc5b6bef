//! The ray record: query input and hit output in one value.

use bitflags::bitflags;
use lumen_math::{Plane, Real, Vec2, Vec3};

bitflags! {
    /// Selects which hit outputs a query fills and how it tests.
    ///
    /// Outputs not selected are left untouched by [`crate::Collider::intersect`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RayFlags: u32 {
        /// Fill [`Ray::hit_distance`].
        const FILL_DISTANCE = 1 << 0;
        /// Fill [`Ray::hit_point3d`].
        const FILL_POINT3D = 1 << 1;
        /// Fill [`Ray::hit_point2d`].
        const FILL_POINT2D = 1 << 2;
        /// Fill [`Ray::hit_plane`].
        const FILL_PLANE = 1 << 3;
        /// Fill [`Ray::hit_triangle`].
        const FILL_TRIANGLE = 1 << 4;
        /// Fill [`Ray::hit_front_side`].
        const FILL_SIDE = 1 << 5;
        /// Ignore triangles seen from behind.
        const TEST_SINGLESIDED = 1 << 6;
        /// Skip the bounding-box test; the caller knows the ray hits the scene box.
        const EXPECT_HIT = 1 << 7;
    }
}

impl Default for RayFlags {
    fn default() -> Self {
        Self::FILL_DISTANCE | Self::FILL_TRIANGLE | Self::FILL_POINT2D | Self::FILL_SIDE
    }
}

/// A ray query and its result.
///
/// `distance_min` and `distance_max` bound the accepted hit distance in
/// units of `direction`'s length. A query never widens them: on a hit
/// `distance_max` becomes the hit distance, on a miss both keep the values
/// the caller set.
///
/// The `hit_*` fields are only meaningful after a query returned `true`,
/// and only those selected by `flags`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Start point.
    pub origin: Vec3,
    /// Direction; distances are measured in multiples of its length.
    pub direction: Vec3,
    /// Closest accepted hit distance.
    pub distance_min: Real,
    /// Farthest accepted hit distance.
    pub distance_max: Real,
    /// Requested outputs and test options.
    pub flags: RayFlags,
    /// Distance of the hit from `origin`.
    pub hit_distance: Real,
    /// Post-import index of the hit triangle.
    pub hit_triangle: Option<u32>,
    /// Barycentric position `(u, v)` of the hit within the triangle.
    pub hit_point2d: Vec2,
    /// Hit position in space.
    pub hit_point3d: Vec3,
    /// Plane of the hit triangle, facing its front side.
    pub hit_plane: Option<Plane>,
    /// Whether the ray hit the front (counter-clockwise) side.
    pub hit_front_side: bool,
}

impl Ray {
    /// Ray from `origin` along `direction`, accepting hits at any
    /// non-negative distance, with default [`RayFlags`].
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction,
            distance_min: 0.0,
            distance_max: Real::INFINITY,
            flags: RayFlags::default(),
            hit_distance: 0.0,
            hit_triangle: None,
            hit_point2d: Vec2::zeros(),
            hit_point3d: Vec3::zeros(),
            hit_plane: None,
            hit_front_side: false,
        }
    }

    /// Ray from `from` towards `to` with unit direction, limited to the
    /// segment between them.
    ///
    /// Coincident points give a zero direction, which hits nothing.
    pub fn between(from: Vec3, to: Vec3) -> Self {
        let delta = to - from;
        let length = delta.norm();
        let direction = if length > 0.0 { delta / length } else { Vec3::zeros() };
        Self::new(from, direction).with_range(0.0, length)
    }

    /// Replace the accepted distance interval.
    pub fn with_range(mut self, distance_min: Real, distance_max: Real) -> Self {
        self.distance_min = distance_min;
        self.distance_max = distance_max;
        self
    }

    /// Replace the flags.
    pub fn with_flags(mut self, flags: RayFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Point at `distance` along the ray.
    #[inline]
    pub fn point_at(&self, distance: Real) -> Vec3 {
        self.origin + self.direction * distance
    }

    /// Clear hit outputs and reset the interval for reuse.
    pub fn reset(&mut self, distance_min: Real, distance_max: Real) {
        *self = Self::new(self.origin, self.direction)
            .with_range(distance_min, distance_max)
            .with_flags(self.flags);
    }
}
