//! Tree construction.
//!
//! Each node picks the cheapest of a set of candidate splits: evenly spaced
//! axis-aligned planes (kd) and the planes of sampled triangles (BSP). A
//! split's cost estimates the triangles a ray crossing the node tests:
//!
//! ```text
//! traversal_cost + straddlers + coplanar
//!     + area(back) / area(node) * back + area(front) / area(node) * front
//! ```
//!
//! where `area` is the surface area of the bounding box of the triangles
//! on that side. A node becomes a leaf when no split costs less than
//! testing all its triangles, when no split separates anything, or when
//! the size or depth limits are reached.

use lumen_math::{Aabb3, Axis, Plane, Real, Vec3};
use lumen_mesh::TriangleBody;
use serde::{Deserialize, Serialize};

use crate::error::{ColliderError, Result};
use crate::tree::{Node, NodeId, Tree, TriangleRange};

/// Recursion guard for [`BuildParams::max_depth`].
const DEPTH_LIMIT: u32 = 256;

/// Knobs of the tree builder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildParams {
    /// Nodes with at most this many triangles become leaves.
    pub max_leaf_triangles: u32,
    /// Nodes at this depth become leaves.
    pub max_depth: u32,
    /// Axis-aligned candidates tried per axis.
    pub kd_candidates: u32,
    /// Triangle planes tried per node.
    pub bsp_candidates: u32,
    /// Nodes with fewer triangles than this only try axis-aligned splits.
    pub bsp_min_triangles: u32,
    /// Try axis-aligned splits.
    pub allow_kd: bool,
    /// Try triangle-plane splits.
    pub allow_bsp: bool,
    /// Cost of visiting a node, in triangle tests.
    pub traversal_cost: Real,
    /// Keep a copy of every triangle's geometry next to the tree instead
    /// of reading it from the mesh during queries.
    pub precompute_bodies: bool,
}

impl Default for BuildParams {
    fn default() -> Self {
        Self {
            max_leaf_triangles: 4,
            max_depth: 40,
            kd_candidates: 8,
            bsp_candidates: 8,
            bsp_min_triangles: 128,
            allow_kd: true,
            allow_bsp: true,
            traversal_cost: 0.5,
            precompute_bodies: true,
        }
    }
}

impl BuildParams {
    /// Parameters that produce a single leaf holding every triangle.
    pub fn linear() -> Self {
        Self {
            max_leaf_triangles: u32::MAX,
            max_depth: 0,
            kd_candidates: 0,
            bsp_candidates: 0,
            bsp_min_triangles: u32::MAX,
            allow_kd: false,
            allow_bsp: false,
            traversal_cost: 0.0,
            precompute_bodies: false,
        }
    }

    /// Check that the parameters describe a buildable tree.
    pub fn validate(&self) -> Result<()> {
        if self.max_leaf_triangles == 0 {
            return Err(ColliderError::InvalidConfig(
                "max_leaf_triangles must be at least 1".into(),
            ));
        }
        if self.max_depth > DEPTH_LIMIT {
            return Err(ColliderError::InvalidConfig(format!(
                "max_depth must be at most {DEPTH_LIMIT}"
            )));
        }
        if self.allow_kd && self.kd_candidates == 0 {
            return Err(ColliderError::InvalidConfig(
                "kd_candidates must be positive when kd splits are allowed".into(),
            ));
        }
        if self.allow_bsp && self.bsp_candidates == 0 {
            return Err(ColliderError::InvalidConfig(
                "bsp_candidates must be positive when bsp splits are allowed".into(),
            ));
        }
        if !(self.traversal_cost >= 0.0 && self.traversal_cost.is_finite()) {
            return Err(ColliderError::InvalidConfig(
                "traversal_cost must be finite and non-negative".into(),
            ));
        }
        Ok(())
    }
}

/// Build a tree over `bodies`, where `bodies[t]` is triangle `t`.
///
/// `plane_epsilon` is the distance within which a triangle counts as lying
/// in a BSP plane.
pub fn build_tree(bodies: &[TriangleBody], params: &BuildParams, plane_epsilon: Real) -> Tree {
    let prims: Vec<Prim> = bodies.iter().map(Prim::new).collect();
    let mut aabb = Aabb3::empty();
    for prim in &prims {
        aabb.include_aabb(&prim.aabb);
    }

    let mut builder = Builder {
        prims: &prims,
        params,
        epsilon: plane_epsilon,
        nodes: Vec::new(),
        refs: Vec::with_capacity(prims.len()),
    };
    let root = builder.subtree((0..prims.len() as u32).collect(), 0);

    Tree {
        nodes: builder.nodes,
        triangles: builder.refs,
        root,
        aabb,
        num_triangles: prims.len() as u32,
        plane_epsilon,
    }
}

/// Per-triangle data the builder looks at.
struct Prim {
    aabb: Aabb3,
    plane: Option<Plane>,
    vertices: [Vec3; 3],
}

impl Prim {
    fn new(body: &TriangleBody) -> Self {
        Self {
            aabb: body.aabb(),
            plane: body.plane(),
            vertices: body.vertices(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Splitter {
    Axis(Axis, Real),
    Plane(Plane),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Back,
    Front,
    Straddle,
    Coplanar,
}

struct Builder<'a> {
    prims: &'a [Prim],
    params: &'a BuildParams,
    epsilon: Real,
    nodes: Vec<Node>,
    refs: Vec<u32>,
}

impl Builder<'_> {
    fn subtree(&mut self, items: Vec<u32>, depth: u32) -> Option<NodeId> {
        if items.is_empty() {
            return None;
        }
        if items.len() <= self.params.max_leaf_triangles as usize || depth >= self.params.max_depth {
            return Some(self.leaf(&items));
        }
        let Some(splitter) = self.best_split(&items) else {
            return Some(self.leaf(&items));
        };

        // Parent before children keeps ids increasing downwards.
        let id = self.reserve();
        let (mut back, mut front, mut straddlers, mut coplanar) =
            (Vec::new(), Vec::new(), Vec::new(), Vec::new());
        for t in items {
            match self.classify(&splitter, &self.prims[t as usize]) {
                Side::Back => back.push(t),
                Side::Front => front.push(t),
                Side::Straddle => straddlers.push(t),
                Side::Coplanar => coplanar.push(t),
            }
        }
        let straddlers = self.push_list(&straddlers);
        let coplanar = self.push_list(&coplanar);
        let back = self.subtree(back, depth + 1);
        let front = self.subtree(front, depth + 1);

        self.nodes[id.0 as usize] = match splitter {
            Splitter::Axis(axis, split) => Node::Kd {
                axis,
                split,
                straddlers,
                back,
                front,
            },
            Splitter::Plane(plane) => Node::Bsp {
                plane,
                coplanar,
                straddlers,
                back,
                front,
            },
        };
        Some(id)
    }

    fn leaf(&mut self, items: &[u32]) -> NodeId {
        let triangles = self.push_list(items);
        self.nodes.push(Node::Leaf { triangles });
        NodeId(self.nodes.len() as u32 - 1)
    }

    fn reserve(&mut self) -> NodeId {
        self.nodes.push(Node::Leaf {
            triangles: TriangleRange::EMPTY,
        });
        NodeId(self.nodes.len() as u32 - 1)
    }

    fn push_list(&mut self, items: &[u32]) -> TriangleRange {
        if items.is_empty() {
            return TriangleRange::EMPTY;
        }
        let start = self.refs.len() as u32;
        self.refs.extend_from_slice(items);
        TriangleRange {
            start,
            len: items.len() as u32,
        }
    }

    fn bounds(&self, items: &[u32]) -> Aabb3 {
        let mut bounds = Aabb3::empty();
        for &t in items {
            bounds.include_aabb(&self.prims[t as usize].aabb);
        }
        bounds
    }

    fn best_split(&self, items: &[u32]) -> Option<Splitter> {
        let bounds = self.bounds(items);
        let area = bounds.surface_area();
        if !(area > 0.0) {
            return None;
        }
        let n = items.len();
        let params = self.params;

        let mut candidates = Vec::new();
        if params.allow_kd {
            let steps = params.kd_candidates + 1;
            for axis in Axis::ALL {
                let a = axis.index();
                let lo = bounds.min[a];
                let extent = bounds.max[a] - lo;
                if !(extent > 0.0) {
                    continue;
                }
                for k in 1..steps {
                    let split = lo + extent * k as Real / steps as Real;
                    candidates.push(Splitter::Axis(axis, split));
                }
            }
        }
        if params.allow_bsp && n >= params.bsp_min_triangles as usize {
            let step = (n / params.bsp_candidates as usize).max(1);
            for &t in items.iter().step_by(step).take(params.bsp_candidates as usize) {
                if let Some(plane) = self.prims[t as usize].plane {
                    candidates.push(Splitter::Plane(plane));
                }
            }
        }

        candidates
            .into_iter()
            .filter_map(|s| self.cost(items, &s, area).map(|cost| (cost, s)))
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .filter(|(cost, _)| *cost < n as Real)
            .map(|(_, s)| s)
    }

    /// Estimated cost of `splitter`, `None` if one side would keep everything.
    fn cost(&self, items: &[u32], splitter: &Splitter, area: Real) -> Option<Real> {
        let (mut back, mut front) = ((0usize, Aabb3::empty()), (0usize, Aabb3::empty()));
        let mut kept = 0usize;
        for &t in items {
            let prim = &self.prims[t as usize];
            match self.classify(splitter, prim) {
                Side::Back => {
                    back.0 += 1;
                    back.1.include_aabb(&prim.aabb);
                }
                Side::Front => {
                    front.0 += 1;
                    front.1.include_aabb(&prim.aabb);
                }
                Side::Straddle | Side::Coplanar => kept += 1,
            }
        }
        if back.0.max(front.0) == items.len() {
            return None;
        }
        let side = |(count, aabb): (usize, Aabb3)| aabb.surface_area() / area * count as Real;
        Some(self.params.traversal_cost + kept as Real + side(back) + side(front))
    }

    fn classify(&self, splitter: &Splitter, prim: &Prim) -> Side {
        match *splitter {
            Splitter::Axis(axis, split) => {
                let a = axis.index();
                if prim.aabb.max[a] <= split {
                    Side::Back
                } else if prim.aabb.min[a] >= split {
                    Side::Front
                } else {
                    Side::Straddle
                }
            }
            Splitter::Plane(plane) => {
                let d = prim.vertices.map(|v| plane.distance(&v));
                let lo = d[0].min(d[1]).min(d[2]);
                let hi = d[0].max(d[1]).max(d[2]);
                let eps = self.epsilon;
                if lo >= -eps && hi <= eps {
                    Side::Coplanar
                } else if hi <= eps {
                    Side::Back
                } else if lo >= -eps {
                    Side::Front
                } else {
                    Side::Straddle
                }
            }
        }
    }
}
