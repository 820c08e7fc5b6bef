//! Acceptance callbacks for candidate hits.

use crate::Ray;

/// Decides which geometric hits count.
///
/// During [`crate::Collider::intersect_with`] every triangle the ray hits
/// closer than the best accepted hit so far is offered to
/// [`CollisionHandler::collides`]. The ray passed in describes the
/// candidate: `hit_distance`, `hit_triangle`, `hit_point2d` and
/// `hit_front_side` are always filled, `hit_point3d` and `hit_plane` only
/// when requested by the ray's flags, and `distance_max` holds the best
/// accepted distance so far. Rejected candidates do not end the search.
pub trait CollisionHandler {
    /// Called once before the search starts.
    fn init(&mut self, _ray: &Ray) {}

    /// Return `true` to accept the candidate hit described by `ray`.
    fn collides(&mut self, ray: &Ray) -> bool;
}

impl<F: FnMut(&Ray) -> bool> CollisionHandler for F {
    fn collides(&mut self, ray: &Ray) -> bool {
        self(ray)
    }
}

/// Rejects hits on one triangle, accepts everything else.
///
/// Typical for rays leaving a surface, which must not hit the triangle
/// they start on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkipTriangle(pub u32);

impl CollisionHandler for SkipTriangle {
    fn collides(&mut self, ray: &Ray) -> bool {
        ray.hit_triangle != Some(self.0)
    }
}

/// Accepts front-side hits only, counting the back-side hits it rejects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrontSideOnly {
    /// Back-side candidates seen since the last `init`.
    pub rejected: u32,
}

impl CollisionHandler for FrontSideOnly {
    fn init(&mut self, _ray: &Ray) {
        self.rejected = 0;
    }

    fn collides(&mut self, ray: &Ray) -> bool {
        if !ray.hit_front_side {
            self.rejected += 1;
        }
        ray.hit_front_side
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_math::Vec3;

    #[test]
    fn test_closure_handler() {
        let mut calls = 0;
        let mut handler = |ray: &Ray| {
            calls += 1;
            ray.hit_distance > 1.0
        };
        let mut ray = Ray::new(Vec3::zeros(), Vec3::x());
        ray.hit_distance = 0.5;
        assert!(!handler.collides(&ray));
        ray.hit_distance = 2.0;
        assert!(handler.collides(&ray));
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_skip_triangle() {
        let mut ray = Ray::new(Vec3::zeros(), Vec3::x());
        ray.hit_triangle = Some(4);
        assert!(!SkipTriangle(4).collides(&ray));
        assert!(SkipTriangle(5).collides(&ray));
    }

    #[test]
    fn test_front_side_only_counts() {
        let mut handler = FrontSideOnly::default();
        let ray = Ray::new(Vec3::zeros(), Vec3::x());
        handler.init(&ray);
        assert!(!handler.collides(&ray));
        assert_eq!(handler.rejected, 1);
        handler.init(&ray);
        assert_eq!(handler.rejected, 0);
    }
}
