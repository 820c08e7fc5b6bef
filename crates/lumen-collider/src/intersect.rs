//! Tree traversal.
//!
//! A query walks the tree front to back along the ray, keeping the
//! distance interval `[dmin, dmax]` in which the current node can still
//! produce a hit. At a split, the child on the side of the `dmin` point is
//! searched first over the part of the interval before the crossing, then
//! the far child over the rest. Both parts overlap the crossing by a small
//! margin so that roundoff never loses a triangle lying on the split.
//! Triangles stored at a node itself (straddlers, coplanar) are tested
//! before or between the children.
//!
//! Accepted hits shrink `dmax` for everything visited later, so a far
//! child whose interval became empty is skipped.

use lumen_math::{Aabb3, Real, Vec2, Vec3};
use lumen_mesh::{Mesh, TriangleBody};

use crate::handler::CollisionHandler;
use crate::ray::{Ray, RayFlags};
use crate::tree::{Node, NodeId, Tree};
use crate::triangle::{intersect_triangle, TriangleHit};

/// Where triangle geometry is read from.
pub(crate) enum Bodies<'a, M: ?Sized> {
    /// Copied next to the tree at build time.
    Owned(&'a [TriangleBody]),
    /// Read from the mesh on each test.
    Mesh(&'a M),
}

impl<M: Mesh + ?Sized> Bodies<'_, M> {
    #[inline]
    fn body(&self, triangle: u32) -> TriangleBody {
        match self {
            Bodies::Owned(bodies) => bodies[triangle as usize],
            Bodies::Mesh(mesh) => mesh.triangle_body(triangle),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Best {
    triangle: u32,
    hit: TriangleHit,
}

/// Shared traversal inputs.
pub(crate) struct Scene<'a, M: ?Sized> {
    pub tree: &'a Tree,
    pub bodies: Bodies<'a, M>,
    pub delta: Real,
    /// Tree bounds grown by `delta`, for the broad phase.
    pub broad: &'a Aabb3,
}

/// Run one query; see [`crate::Collider::intersect_with`].
pub(crate) fn intersect_ray<M, H>(
    scene: &Scene<'_, M>,
    ray: &mut Ray,
    mut handler: Option<&mut H>,
) -> bool
where
    M: Mesh + ?Sized,
    H: CollisionHandler + ?Sized,
{
    if let Some(handler) = handler.as_deref_mut() {
        handler.init(ray);
    }
    let Some(root) = scene.tree.root() else {
        return false;
    };

    let (mut dmin, mut dmax) = (ray.distance_min, ray.distance_max);
    if !(dmin <= dmax) {
        return false;
    }
    if !ray.flags.contains(RayFlags::EXPECT_HIT) {
        let inv_direction = ray.direction.map(|c| 1.0 / c);
        match scene.broad.clip_line(&ray.origin, &inv_direction, dmin, dmax) {
            Some((lo, hi)) => (dmin, dmax) = (lo, hi),
            None => return false,
        }
    }

    let mut query = Query {
        tree: scene.tree,
        bodies: &scene.bodies,
        delta: scene.delta,
        origin: ray.origin,
        direction: ray.direction,
        single_sided: ray.flags.contains(RayFlags::TEST_SINGLESIDED),
        limit: ray.distance_max,
        best: None,
        handler,
        scratch: *ray,
    };
    query.visit(root, dmin, dmax);

    match query.best {
        Some(best) => {
            let body = scene.bodies.body(best.triangle);
            commit(ray, &best, &body);
            true
        }
        None => false,
    }
}

struct Query<'a, M: ?Sized, H: ?Sized> {
    tree: &'a Tree,
    bodies: &'a Bodies<'a, M>,
    delta: Real,
    origin: Vec3,
    direction: Vec3,
    single_sided: bool,
    /// Distance of the best accepted hit, or the caller's `distance_max`.
    limit: Real,
    best: Option<Best>,
    handler: Option<&'a mut H>,
    /// Copy of the caller's ray that candidates are written into.
    scratch: Ray,
}

impl<M, H> Query<'_, M, H>
where
    M: Mesh + ?Sized,
    H: CollisionHandler + ?Sized,
{
    /// Search the subtree at `root` within `[dmin, dmax]`.
    ///
    /// Returns true if a hit was accepted in it.
    fn visit(&mut self, root: NodeId, mut dmin: Real, mut dmax: Real) -> bool {
        let tree = self.tree;
        let mut node = root;
        let mut found = false;
        loop {
            dmax = dmax.min(self.limit);
            if !(dmin <= dmax) {
                return found;
            }
            match *tree.node(node) {
                Node::Leaf { triangles } => {
                    return self.test_list(tree.triangles(triangles), dmin, dmax) || found;
                }

                Node::Kd {
                    axis,
                    split,
                    straddlers,
                    back,
                    front,
                } => {
                    if !straddlers.is_empty() && self.test_list(tree.triangles(straddlers), dmin, dmax) {
                        found = true;
                        dmax = dmax.min(self.limit);
                    }
                    let a = axis.index();
                    let (o, d) = (self.origin[a], self.direction[a]);

                    if d == 0.0 {
                        // Constant coordinate: only a ray inside the split plane sees both sides.
                        let next = if o < split {
                            back
                        } else {
                            if o == split {
                                if let Some(back) = back {
                                    found |= self.visit(back, dmin, dmax);
                                }
                            }
                            front
                        };
                        match next {
                            Some(next) => node = next,
                            None => return found,
                        }
                        continue;
                    }

                    let t = (split - o) / d;
                    let p = o + dmin * d;
                    let near_back = p < split || (p == split && d < 0.0);
                    let toward_far = near_back == (d > 0.0);
                    let (near, far) = if near_back { (back, front) } else { (front, back) };
                    let (near_hi, far_lo, far_hi) =
                        split_interval(t, self.delta, toward_far, dmin, dmax);

                    let Some(far) = far.filter(|_| far_lo <= far_hi) else {
                        match near {
                            Some(near) => (node, dmax) = (near, near_hi),
                            None => return found,
                        }
                        continue;
                    };
                    if let Some(near) = near {
                        found |= self.visit(near, dmin, near_hi);
                    }
                    (node, dmin, dmax) = (far, far_lo, far_hi);
                }

                Node::Bsp {
                    plane,
                    coplanar,
                    straddlers,
                    back,
                    front,
                } => {
                    if !straddlers.is_empty() && self.test_list(tree.triangles(straddlers), dmin, dmax) {
                        found = true;
                        dmax = dmax.min(self.limit);
                    }
                    let epsilon = tree.plane_epsilon();
                    let offset = plane.distance(&self.origin);
                    let dirdot = plane.normal.dot(&self.direction);
                    let f = offset + dmin * dirdot;
                    let front_near = f > 0.0 || (f == 0.0 && dirdot < 0.0);
                    let (near, far) = if front_near { (front, back) } else { (back, front) };

                    // Parallel and clear of the plane: the far side is out of reach.
                    if dirdot == 0.0 && offset.abs() > epsilon {
                        match near {
                            Some(near) => node = near,
                            None => return found,
                        }
                        continue;
                    }

                    // Triangles within `epsilon` of the plane may be hit up to
                    // `epsilon / |dirdot|` away from the crossing.
                    let t = -offset / dirdot;
                    let margin = self.delta + epsilon / dirdot.abs();
                    if !(t.is_finite() && margin.is_finite()) {
                        // Nearly parallel: every part may be hit anywhere.
                        if let Some(near) = near {
                            found |= self.visit(near, dmin, dmax);
                        }
                        if !coplanar.is_empty() {
                            found |= self.test_list(tree.triangles(coplanar), dmin, dmax);
                        }
                        match far {
                            Some(far) => node = far,
                            None => return found,
                        }
                        continue;
                    }

                    let toward_far = front_near == (dirdot < 0.0);
                    let (near_hi, far_lo, far_hi) = split_interval(t, margin, toward_far, dmin, dmax);
                    let (plane_lo, plane_hi) = ((t - margin).max(dmin), (t + margin).min(dmax));
                    let in_plane = !coplanar.is_empty() && plane_lo <= plane_hi;

                    let far = far.filter(|_| far_lo <= far_hi);
                    if far.is_none() && !in_plane {
                        match near {
                            Some(near) => (node, dmax) = (near, near_hi),
                            None => return found,
                        }
                        continue;
                    }
                    if let Some(near) = near {
                        found |= self.visit(near, dmin, near_hi);
                    }
                    if in_plane {
                        let plane_hi = plane_hi.min(self.limit);
                        if plane_lo <= plane_hi {
                            found |= self.test_list(tree.triangles(coplanar), plane_lo, plane_hi);
                        }
                    }
                    match far {
                        Some(far) => (node, dmin, dmax) = (far, far_lo, far_hi),
                        None => return found,
                    }
                }
            }
        }
    }

    /// Test every triangle of `list`; the closest accepted hit wins.
    fn test_list(&mut self, list: &[u32], dmin: Real, dmax: Real) -> bool {
        let mut found = false;
        let mut dmax = dmax.min(self.limit);
        for &triangle in list {
            let body = self.bodies.body(triangle);
            let Some(hit) =
                intersect_triangle(&self.origin, &self.direction, &body, dmin, dmax, self.single_sided)
            else {
                continue;
            };
            // On equal distance the first accepted triangle stays.
            if self.best.is_some() && !(hit.distance < self.limit) {
                continue;
            }
            if let Some(handler) = self.handler.as_deref_mut() {
                fill_candidate(&mut self.scratch, triangle, &hit, &body, self.limit);
                if !handler.collides(&self.scratch) {
                    continue;
                }
            }
            self.best = Some(Best { triangle, hit });
            self.limit = hit.distance;
            dmax = hit.distance;
            found = true;
        }
        found
    }
}

/// Split `[dmin, dmax]` at a crossing `t` into `(near_hi, far_lo, far_hi)`:
/// the near side is searched over `[dmin, near_hi]`, the far side over
/// `[far_lo, far_hi]`. `toward_far` tells whether the ray moves from the
/// near side into the far side or away from it.
#[inline]
fn split_interval(t: Real, margin: Real, toward_far: bool, dmin: Real, dmax: Real) -> (Real, Real, Real) {
    if toward_far {
        ((t + margin).min(dmax), (t - margin).max(dmin), dmax)
    } else {
        (dmax, dmin, (t + margin).min(dmax))
    }
}

fn fill_candidate(ray: &mut Ray, triangle: u32, hit: &TriangleHit, body: &TriangleBody, limit: Real) {
    ray.distance_max = limit;
    ray.hit_distance = hit.distance;
    ray.hit_triangle = Some(triangle);
    ray.hit_point2d = Vec2::new(hit.u, hit.v);
    ray.hit_front_side = hit.front;
    if ray.flags.contains(RayFlags::FILL_POINT3D) {
        ray.hit_point3d = ray.point_at(hit.distance);
    }
    if ray.flags.contains(RayFlags::FILL_PLANE) {
        ray.hit_plane = body.plane();
    }
}

fn commit(ray: &mut Ray, best: &Best, body: &TriangleBody) {
    let flags = ray.flags;
    ray.distance_max = best.hit.distance;
    if flags.contains(RayFlags::FILL_DISTANCE) {
        ray.hit_distance = best.hit.distance;
    }
    if flags.contains(RayFlags::FILL_TRIANGLE) {
        ray.hit_triangle = Some(best.triangle);
    }
    if flags.contains(RayFlags::FILL_POINT2D) {
        ray.hit_point2d = Vec2::new(best.hit.u, best.hit.v);
    }
    if flags.contains(RayFlags::FILL_SIDE) {
        ray.hit_front_side = best.hit.front;
    }
    if flags.contains(RayFlags::FILL_POINT3D) {
        ray.hit_point3d = ray.point_at(best.hit.distance);
    }
    if flags.contains(RayFlags::FILL_PLANE) {
        ray.hit_plane = body.plane();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{build_tree, BuildParams};
    use lumen_math::{Axis, Plane};
    use lumen_mesh::MeshCopy;

    use crate::tree::TriangleRange;

    fn body(a: [f32; 3], b: [f32; 3], c: [f32; 3]) -> TriangleBody {
        TriangleBody::from_vertices(&Vec3::from(a), &Vec3::from(b), &Vec3::from(c))
    }

    fn run(tree: &Tree, bodies: &[TriangleBody], ray: &mut Ray) -> bool {
        let mut broad = *tree.aabb();
        broad.expand(1e-5);
        let scene: Scene<'_, MeshCopy> = Scene {
            tree,
            bodies: Bodies::Owned(bodies),
            delta: 1e-5,
            broad: &broad,
        };
        intersect_ray::<MeshCopy, dyn CollisionHandler>(&scene, ray, None)
    }

    /// Triangles facing -x at x = 1, 2, ..., n.
    fn wall_stack(n: usize) -> Vec<TriangleBody> {
        (1..=n)
            .map(|i| {
                let x = i as f32;
                body([x, -1.0, -1.0], [x, -1.0, 2.0], [x, 2.0, -1.0])
            })
            .collect()
    }

    #[test]
    fn test_kd_front_to_back_both_directions() {
        let bodies = wall_stack(8);
        let params = BuildParams {
            allow_bsp: false,
            max_leaf_triangles: 1,
            ..BuildParams::default()
        };
        let tree = build_tree(&bodies, &params, 1e-6);
        assert!(tree.stats().kd_nodes > 0);

        let mut ray = Ray::new(Vec3::new(0.0, 0.1, 0.1), Vec3::x());
        assert!(run(&tree, &bodies, &mut ray));
        assert_eq!(ray.hit_triangle, Some(0));
        assert!((ray.hit_distance - 1.0).abs() < 1e-6);

        let mut ray = Ray::new(Vec3::new(9.0, 0.1, 0.1), -Vec3::x());
        assert!(run(&tree, &bodies, &mut ray));
        assert_eq!(ray.hit_triangle, Some(7));
        assert!((ray.hit_distance - 1.0).abs() < 1e-6);

        // Starting between walls 3 and 4 going back.
        let mut ray = Ray::new(Vec3::new(3.5, 0.1, 0.1), -Vec3::x());
        assert!(run(&tree, &bodies, &mut ray));
        assert_eq!(ray.hit_triangle, Some(2));
    }

    #[test]
    fn test_kd_ray_starting_on_split() {
        let bodies = wall_stack(2);
        // Split halfway between the walls at x = 1 and x = 2.
        let tree = Tree {
            nodes: vec![
                Node::Kd {
                    axis: Axis::X,
                    split: 1.5,
                    straddlers: TriangleRange::EMPTY,
                    back: Some(NodeId(1)),
                    front: Some(NodeId(2)),
                },
                Node::Leaf {
                    triangles: TriangleRange { start: 0, len: 1 },
                },
                Node::Leaf {
                    triangles: TriangleRange { start: 1, len: 1 },
                },
            ],
            triangles: vec![0, 1],
            root: Some(NodeId(0)),
            aabb: Aabb3::new(Vec3::new(1.0, -1.0, -1.0), Vec3::new(2.0, 2.0, 2.0)),
            num_triangles: 2,
            plane_epsilon: 1e-6,
        };
        // On the split moving towards +x: front child is near.
        let mut ray = Ray::new(Vec3::new(1.5, 0.1, 0.1), Vec3::x());
        assert!(run(&tree, &bodies, &mut ray));
        assert_eq!(ray.hit_triangle, Some(1));
        let mut ray = Ray::new(Vec3::new(1.5, 0.1, 0.1), -Vec3::x());
        assert!(run(&tree, &bodies, &mut ray));
        assert_eq!(ray.hit_triangle, Some(0));
        // Parallel to the split: only the child on the ray's side.
        let mut ray = Ray::new(Vec3::new(1.0, 0.1, -5.0), Vec3::z());
        assert!(!run(&tree, &bodies, &mut ray));
    }

    #[test]
    fn test_bsp_near_far_and_coplanar() {
        // Root plane x = 2 through wall 1; wall 0 on one side, walls 2 and 3 on the other.
        let bodies = wall_stack(4);
        let plane = bodies[1].plane().unwrap();
        assert!((plane.normal.x.abs() - 1.0).abs() < 1e-6);
        let (back, front) = if plane.distance(&Vec3::new(1.0, 0.0, 0.0)) < 0.0 {
            (1, 2)
        } else {
            (2, 1)
        };
        let tree = Tree {
            nodes: vec![
                Node::Bsp {
                    plane,
                    coplanar: TriangleRange { start: 0, len: 1 },
                    straddlers: TriangleRange::EMPTY,
                    back: Some(NodeId(back)),
                    front: Some(NodeId(front)),
                },
                Node::Leaf {
                    triangles: TriangleRange { start: 1, len: 1 },
                },
                Node::Leaf {
                    triangles: TriangleRange { start: 2, len: 2 },
                },
            ],
            triangles: vec![1, 0, 2, 3],
            root: Some(NodeId(0)),
            aabb: Aabb3::new(Vec3::new(1.0, -1.0, -1.0), Vec3::new(4.0, 2.0, 2.0)),
            num_triangles: 4,
            plane_epsilon: 1e-6,
        };
        let mut ray = Ray::new(Vec3::new(0.0, 0.1, 0.1), Vec3::x());
        assert!(run(&tree, &bodies, &mut ray));
        assert_eq!(ray.hit_triangle, Some(0));

        let mut ray = Ray::new(Vec3::new(1.5, 0.1, 0.1), Vec3::x());
        assert!(run(&tree, &bodies, &mut ray));
        assert_eq!(ray.hit_triangle, Some(1));

        let mut ray = Ray::new(Vec3::new(5.0, 0.1, 0.1), -Vec3::x());
        assert!(run(&tree, &bodies, &mut ray));
        assert_eq!(ray.hit_triangle, Some(3));

        // Starting exactly on the plane: the coplanar wall is at distance 0.
        let mut ray = Ray::new(Vec3::new(2.0, 0.1, 0.1), Vec3::x());
        assert!(run(&tree, &bodies, &mut ray));
        assert_eq!(ray.hit_triangle, Some(1));
        assert!(ray.hit_distance.abs() < 1e-6);

        // Parallel to the plane, off it: nothing.
        let mut ray = Ray::new(Vec3::new(2.5, -5.0, 0.1), Vec3::y());
        assert!(!run(&tree, &bodies, &mut ray));
    }

    #[test]
    fn test_empty_tree_and_inverted_interval() {
        let tree = Tree::empty();
        let mut ray = Ray::new(Vec3::zeros(), Vec3::x());
        assert!(!run(&tree, &[], &mut ray));

        let bodies = wall_stack(1);
        let tree = build_tree(&bodies, &BuildParams::default(), 1e-6);
        let mut ray = Ray::new(Vec3::new(0.0, 0.1, 0.1), Vec3::x()).with_range(2.0, 1.0);
        assert!(!run(&tree, &bodies, &mut ray));
        assert_eq!((ray.distance_min, ray.distance_max), (2.0, 1.0));
    }

    #[test]
    fn test_commit_respects_flags() {
        let bodies = wall_stack(1);
        let tree = build_tree(&bodies, &BuildParams::default(), 1e-6);
        let mut ray = Ray::new(Vec3::new(0.0, 0.1, 0.1), Vec3::x())
            .with_flags(RayFlags::FILL_POINT3D | RayFlags::FILL_PLANE);
        assert!(run(&tree, &bodies, &mut ray));
        assert_eq!(ray.hit_triangle, None);
        assert!((ray.hit_point3d - Vec3::new(1.0, 0.1, 0.1)).norm() < 1e-6);
        let plane: Plane = ray.hit_plane.unwrap();
        assert!((plane.normal.x.abs() - 1.0).abs() < 1e-6);
        assert!((ray.distance_max - 1.0).abs() < 1e-6);
        assert_eq!(ray.distance_min, 0.0);
    }
}
