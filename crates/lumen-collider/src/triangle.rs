//! Ray/triangle intersection.

use lumen_math::{Real, Vec3};
use lumen_mesh::TriangleBody;

/// A ray crossing a triangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleHit {
    /// Distance along the ray, in units of the direction's length.
    pub distance: Real,
    /// Weight of `vertex1` in the hit point.
    pub u: Real,
    /// Weight of `vertex2` in the hit point.
    pub v: Real,
    /// The ray approaches the counter-clockwise side.
    pub front: bool,
}

/// Intersect the ray `origin + s * direction`, `s` in
/// `[distance_min, distance_max]`, with a triangle (Möller–Trumbore).
///
/// Rays parallel to the triangle's plane never hit, so zero-area triangles
/// never do either. With `single_sided` set, triangles seen from behind
/// are ignored.
#[inline]
pub fn intersect_triangle(
    origin: &Vec3,
    direction: &Vec3,
    body: &TriangleBody,
    distance_min: Real,
    distance_max: Real,
    single_sided: bool,
) -> Option<TriangleHit> {
    let pvec = direction.cross(&body.side2);
    let det = body.side1.dot(&pvec);
    if single_sided && det <= 0.0 {
        return None;
    }
    if det == 0.0 {
        return None;
    }

    let tvec = origin - body.vertex0;
    let u = tvec.dot(&pvec) / det;
    // Written so that NaN fails too.
    if !(u >= 0.0 && u <= 1.0) {
        return None;
    }

    let qvec = tvec.cross(&body.side1);
    let v = direction.dot(&qvec) / det;
    if !(v >= 0.0 && u + v <= 1.0) {
        return None;
    }

    let distance = body.side2.dot(&qvec) / det;
    if !(distance >= distance_min && distance <= distance_max) {
        return None;
    }

    Some(TriangleHit {
        distance,
        u,
        v,
        front: det > 0.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_triangle() -> TriangleBody {
        TriangleBody::from_vertices(
            &Vec3::zeros(),
            &Vec3::new(1.0, 0.0, 0.0),
            &Vec3::new(0.0, 1.0, 0.0),
        )
    }

    #[test]
    fn test_front_hit_ground_truth() {
        let hit = intersect_triangle(
            &Vec3::new(0.25, 0.25, 1.0),
            &Vec3::new(0.0, 0.0, -1.0),
            &unit_triangle(),
            0.0,
            Real::INFINITY,
            false,
        )
        .unwrap();
        assert_relative_eq!(hit.distance, 1.0);
        assert_relative_eq!(hit.u, 0.25);
        assert_relative_eq!(hit.v, 0.25);
        assert!(hit.front);
    }

    #[test]
    fn test_back_side_and_culling() {
        let origin = Vec3::new(0.25, 0.25, -1.0);
        let up = Vec3::z();
        let hit = intersect_triangle(&origin, &up, &unit_triangle(), 0.0, 10.0, false).unwrap();
        assert!(!hit.front);
        assert!(intersect_triangle(&origin, &up, &unit_triangle(), 0.0, 10.0, true).is_none());
    }

    #[test]
    fn test_interval_bounds() {
        let origin = Vec3::new(0.25, 0.25, 1.0);
        let down = -Vec3::z();
        assert!(intersect_triangle(&origin, &down, &unit_triangle(), 0.0, 0.5, false).is_none());
        assert!(intersect_triangle(&origin, &down, &unit_triangle(), 1.5, 5.0, false).is_none());
        assert!(intersect_triangle(&origin, &down, &unit_triangle(), 1.0, 1.0, false).is_some());
    }

    #[test]
    fn test_misses_outside_and_parallel() {
        let down = -Vec3::z();
        let outside = Vec3::new(0.75, 0.75, 1.0);
        assert!(intersect_triangle(&outside, &down, &unit_triangle(), 0.0, 5.0, false).is_none());
        let parallel = Vec3::x();
        let on_plane = Vec3::new(-1.0, 0.25, 0.0);
        assert!(intersect_triangle(&on_plane, &parallel, &unit_triangle(), 0.0, 5.0, false).is_none());
    }

    #[test]
    fn test_zero_area_never_hits() {
        let flat = TriangleBody::from_vertices(
            &Vec3::zeros(),
            &Vec3::new(1.0, 0.0, 0.0),
            &Vec3::new(2.0, 0.0, 0.0),
        );
        let origin = Vec3::new(0.5, 0.0, 1.0);
        assert!(intersect_triangle(&origin, &-Vec3::z(), &flat, 0.0, 5.0, false).is_none());
    }

    #[test]
    fn test_unnormalized_direction_scales_distance() {
        let hit = intersect_triangle(
            &Vec3::new(0.25, 0.25, 1.0),
            &Vec3::new(0.0, 0.0, -2.0),
            &unit_triangle(),
            0.0,
            Real::INFINITY,
            false,
        )
        .unwrap();
        assert_relative_eq!(hit.distance, 0.5);
    }
}
