//! Axis-aligned bounding boxes.

use serde::{Deserialize, Serialize};

use crate::{Real, Vec3};

/// Axis-aligned bounding box in 3D.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb3 {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Aabb3 {
    /// Create an AABB from min and max corners.
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an empty (inverted) AABB suitable for expansion.
    pub fn empty() -> Self {
        Self {
            min: Vec3::repeat(Real::INFINITY),
            max: Vec3::repeat(Real::NEG_INFINITY),
        }
    }

    /// Smallest box containing all `points`.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vec3>) -> Self {
        let mut aabb = Self::empty();
        for p in points {
            aabb.include_point(p);
        }
        aabb
    }

    /// True if nothing has been included yet.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Expand this AABB to include a point.
    pub fn include_point(&mut self, p: &Vec3) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    /// Expand this AABB to include another box.
    pub fn include_aabb(&mut self, other: &Aabb3) {
        if other.is_empty() {
            return;
        }
        self.min = self.min.inf(&other.min);
        self.max = self.max.sup(&other.max);
    }

    /// Expand the AABB by a tolerance in all directions.
    pub fn expand(&mut self, tol: Real) {
        self.min -= Vec3::repeat(tol);
        self.max += Vec3::repeat(tol);
    }

    /// Edge lengths; zero for an empty box.
    pub fn extent(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::zeros()
        } else {
            self.max - self.min
        }
    }

    /// Length of the box diagonal.
    pub fn diagonal(&self) -> Real {
        self.extent().norm()
    }

    /// Surface area; zero for an empty box.
    pub fn surface_area(&self) -> Real {
        let d = self.extent();
        2.0 * (d.x * d.y + d.y * d.z + d.z * d.x)
    }

    /// Clip the parametric interval `[t_min, t_max]` of the line
    /// `origin + t * direction` against this box using the slab method.
    ///
    /// `inv_direction` holds the component-wise reciprocal of the
    /// direction; infinite components handle axis-parallel lines.
    /// Returns the clipped interval, or `None` if it is empty.
    #[inline]
    pub fn clip_line(
        &self,
        origin: &Vec3,
        inv_direction: &Vec3,
        t_min: Real,
        t_max: Real,
    ) -> Option<(Real, Real)> {
        let mut lo = t_min;
        let mut hi = t_max;
        for axis in 0..3 {
            let inv = inv_direction[axis];
            let mut t0 = (self.min[axis] - origin[axis]) * inv;
            let mut t1 = (self.max[axis] - origin[axis]) * inv;
            if inv < 0.0 {
                std::mem::swap(&mut t0, &mut t1);
            }
            // NaN appears when the origin lies on a slab of a flat box and
            // the direction is parallel to it; such a slab never clips.
            if t0.is_nan() || t1.is_nan() {
                continue;
            }
            lo = lo.max(t0);
            hi = hi.min(t1);
        }
        if lo <= hi {
            Some((lo, hi))
        } else {
            None
        }
    }
}

impl Default for Aabb3 {
    fn default() -> Self {
        Self::empty()
    }
}
