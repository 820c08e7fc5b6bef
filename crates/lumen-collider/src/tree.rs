//! The acceleration tree: an arena of kd and BSP nodes.
//!
//! Nodes live in one `Vec` and refer to their children by [`NodeId`].
//! Triangle lists are ranges into a single shared array of post-import
//! triangle indices. Every triangle of the mesh is referenced by exactly
//! one list: a leaf bucket, a BSP node's coplanar list, or the straddler
//! list of the node whose split it crosses.

use std::fmt;

use lumen_math::{Aabb3, Axis, Plane, Real};
use serde::{Deserialize, Serialize};

/// Index of a node in [`Tree::nodes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// A run of entries in the tree's triangle reference array.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriangleRange {
    /// First entry.
    pub start: u32,
    /// Number of entries.
    pub len: u32,
}

impl TriangleRange {
    /// The empty range.
    pub const EMPTY: Self = Self { start: 0, len: 0 };

    /// True if the range holds no triangles.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn end(&self) -> usize {
        self.start as usize + self.len as usize
    }
}

/// A tree node.
///
/// `back` holds what lies below a kd split or behind a BSP plane, `front`
/// the rest. Either child is absent when its side received no triangles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// Axis-aligned split at `split` along `axis`.
    Kd {
        /// Split axis.
        axis: Axis,
        /// Split coordinate.
        split: Real,
        /// Triangles extending to both sides of the split.
        straddlers: TriangleRange,
        /// Triangles with all coordinates `<= split`.
        back: Option<NodeId>,
        /// Triangles with all coordinates `>= split`.
        front: Option<NodeId>,
    },
    /// Split by the plane of one of the mesh's triangles.
    Bsp {
        /// Split plane.
        plane: Plane,
        /// Triangles lying in the plane, within the tree's plane epsilon.
        coplanar: TriangleRange,
        /// Triangles crossing the plane.
        straddlers: TriangleRange,
        /// Triangles behind the plane.
        back: Option<NodeId>,
        /// Triangles in front of the plane.
        front: Option<NodeId>,
    },
    /// Bucket of triangles tested one by one.
    Leaf {
        /// Bucketed triangles.
        triangles: TriangleRange,
    },
}

/// Which kind of list a triangle reference belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    /// Leaf bucket.
    Leaf,
    /// Coplanar triangles of a BSP node.
    Coplanar,
    /// Straddlers of a kd or BSP node.
    Straddlers,
}

/// Immutable acceleration tree over the triangles of one mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) triangles: Vec<u32>,
    pub(crate) root: Option<NodeId>,
    pub(crate) aabb: Aabb3,
    pub(crate) num_triangles: u32,
    /// Distance within which a triangle counts as lying in a BSP plane.
    pub(crate) plane_epsilon: Real,
}

impl Tree {
    /// Tree over zero triangles.
    pub fn empty() -> Self {
        Self {
            nodes: Vec::new(),
            triangles: Vec::new(),
            root: None,
            aabb: Aabb3::empty(),
            num_triangles: 0,
            plane_epsilon: 0.0,
        }
    }

    /// Root node, `None` for an empty mesh.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// All nodes; children always come after their parent.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// The node with the given id.
    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Post-import triangle indices of a list.
    #[inline]
    pub fn triangles(&self, range: TriangleRange) -> &[u32] {
        &self.triangles[range.start as usize..range.end()]
    }

    /// Bounding box of all triangles.
    pub fn aabb(&self) -> &Aabb3 {
        &self.aabb
    }

    /// Number of triangles the tree was built over.
    pub fn num_triangles(&self) -> u32 {
        self.num_triangles
    }

    /// Tolerance used when classifying triangles against BSP planes.
    pub fn plane_epsilon(&self) -> Real {
        self.plane_epsilon
    }

    /// True if the tree holds no triangles.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Visit every triangle list held by the tree.
    pub fn for_each_triangle_list(&self, mut f: impl FnMut(NodeId, ListKind, &[u32])) {
        for (i, node) in self.nodes.iter().enumerate() {
            let id = NodeId(i as u32);
            match node {
                Node::Leaf { triangles } => f(id, ListKind::Leaf, self.triangles(*triangles)),
                Node::Kd { straddlers, .. } => {
                    f(id, ListKind::Straddlers, self.triangles(*straddlers))
                }
                Node::Bsp {
                    coplanar,
                    straddlers,
                    ..
                } => {
                    f(id, ListKind::Coplanar, self.triangles(*coplanar));
                    f(id, ListKind::Straddlers, self.triangles(*straddlers));
                }
            }
        }
    }

    /// Approximate heap size in bytes.
    pub fn memory_usage(&self) -> usize {
        self.nodes.len() * std::mem::size_of::<Node>()
            + self.triangles.len() * std::mem::size_of::<u32>()
    }

    /// Node counts and shape of the tree.
    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats {
            memory_bytes: self.memory_usage(),
            ..TreeStats::default()
        };
        let mut leaf_triangles = 0usize;
        let mut stack: Vec<(NodeId, u32)> = self.root.map(|r| (r, 1)).into_iter().collect();
        while let Some((id, depth)) = stack.pop() {
            stats.depth = stats.depth.max(depth);
            let (back, front) = match *self.node(id) {
                Node::Leaf { triangles } => {
                    stats.leaves += 1;
                    stats.max_leaf_triangles = stats.max_leaf_triangles.max(triangles.len);
                    leaf_triangles += triangles.len as usize;
                    continue;
                }
                Node::Kd {
                    straddlers,
                    back,
                    front,
                    ..
                } => {
                    stats.kd_nodes += 1;
                    stats.straddlers += straddlers.len as usize;
                    (back, front)
                }
                Node::Bsp {
                    coplanar,
                    straddlers,
                    back,
                    front,
                    ..
                } => {
                    stats.bsp_nodes += 1;
                    stats.coplanar += coplanar.len as usize;
                    stats.straddlers += straddlers.len as usize;
                    (back, front)
                }
            };
            stack.extend(back.into_iter().chain(front).map(|c| (c, depth + 1)));
        }
        if stats.leaves > 0 {
            stats.mean_leaf_triangles = leaf_triangles as f64 / stats.leaves as f64;
        }
        stats
    }

    /// Check structural soundness against a mesh of `num_triangles`.
    ///
    /// Verifies that children follow their parents, that every list lies
    /// inside the reference array and that every triangle is referenced
    /// exactly once. Trees read from disk are checked before use.
    pub fn validate(&self, num_triangles: u32) -> std::result::Result<(), String> {
        if self.num_triangles != num_triangles {
            return Err(format!(
                "tree covers {} triangles, mesh has {}",
                self.num_triangles, num_triangles
            ));
        }
        match self.root {
            None if num_triangles == 0 && self.nodes.is_empty() => return Ok(()),
            None => return Err("tree has no root".into()),
            Some(root) if root.index() != 0 => return Err(format!("root is node {}", root.0)),
            Some(_) => {}
        }

        let in_bounds = |range: &TriangleRange| range.end() <= self.triangles.len();
        for (i, node) in self.nodes.iter().enumerate() {
            let (ranges, children): (Vec<TriangleRange>, [Option<NodeId>; 2]) = match node {
                Node::Leaf { triangles } => (vec![*triangles], [None, None]),
                Node::Kd {
                    split,
                    straddlers,
                    back,
                    front,
                    ..
                } => {
                    if !split.is_finite() {
                        return Err(format!("node {i} has split {split}"));
                    }
                    (vec![*straddlers], [*back, *front])
                }
                Node::Bsp {
                    plane,
                    coplanar,
                    straddlers,
                    back,
                    front,
                } => {
                    if !plane.d.is_finite() || !plane.normal.iter().all(|c| c.is_finite()) {
                        return Err(format!("node {i} has a non-finite plane"));
                    }
                    (vec![*coplanar, *straddlers], [*back, *front])
                }
            };
            if let Some(range) = ranges.iter().find(|r| !in_bounds(r)) {
                return Err(format!("node {i} list {range:?} out of bounds"));
            }
            for child in children.into_iter().flatten() {
                if child.index() <= i || child.index() >= self.nodes.len() {
                    return Err(format!("node {i} has invalid child {}", child.0));
                }
            }
        }

        let mut seen = vec![false; num_triangles as usize];
        let mut error = None;
        self.for_each_triangle_list(|id, _, list| {
            for &t in list {
                match seen.get_mut(t as usize) {
                    Some(flag) if !*flag => *flag = true,
                    Some(_) => {
                        error.get_or_insert_with(|| format!("triangle {t} listed twice (node {})", id.0));
                    }
                    None => {
                        error.get_or_insert_with(|| format!("triangle {t} out of range"));
                    }
                }
            }
        });
        if let Some(error) = error {
            return Err(error);
        }
        if let Some(missing) = seen.iter().position(|&s| !s) {
            return Err(format!("triangle {missing} missing from tree"));
        }
        Ok(())
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::empty()
    }
}

/// Summary of a tree's shape, from [`Tree::stats`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeStats {
    /// Axis-aligned split nodes.
    pub kd_nodes: usize,
    /// Triangle-plane split nodes.
    pub bsp_nodes: usize,
    /// Leaf buckets.
    pub leaves: usize,
    /// Longest root-to-leaf path, counting nodes.
    pub depth: u32,
    /// Largest leaf bucket.
    pub max_leaf_triangles: u32,
    /// Average leaf bucket size.
    pub mean_leaf_triangles: f64,
    /// Triangles stored as straddlers.
    pub straddlers: usize,
    /// Triangles stored in BSP planes.
    pub coplanar: usize,
    /// Approximate heap size.
    pub memory_bytes: usize,
}

impl fmt::Display for TreeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "kd nodes:       {}", self.kd_nodes)?;
        writeln!(f, "bsp nodes:      {}", self.bsp_nodes)?;
        writeln!(f, "leaves:         {}", self.leaves)?;
        writeln!(f, "depth:          {}", self.depth)?;
        writeln!(
            f,
            "leaf size:      {:.2} mean, {} max",
            self.mean_leaf_triangles, self.max_leaf_triangles
        )?;
        writeln!(f, "straddlers:     {}", self.straddlers)?;
        writeln!(f, "coplanar:       {}", self.coplanar)?;
        write!(f, "memory:         {} bytes", self.memory_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_math::Vec3;

    /// Kd root with one straddler, a leaf on each side.
    fn small_tree() -> Tree {
        Tree {
            nodes: vec![
                Node::Kd {
                    axis: Axis::X,
                    split: 0.5,
                    straddlers: TriangleRange { start: 0, len: 1 },
                    back: Some(NodeId(1)),
                    front: Some(NodeId(2)),
                },
                Node::Leaf {
                    triangles: TriangleRange { start: 1, len: 2 },
                },
                Node::Leaf {
                    triangles: TriangleRange { start: 3, len: 1 },
                },
            ],
            triangles: vec![2, 0, 3, 1],
            root: Some(NodeId(0)),
            aabb: Aabb3::new(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0)),
            num_triangles: 4,
            plane_epsilon: 1e-6,
        }
    }

    #[test]
    fn test_stats() {
        let stats = small_tree().stats();
        assert_eq!(stats.kd_nodes, 1);
        assert_eq!(stats.leaves, 2);
        assert_eq!(stats.depth, 2);
        assert_eq!(stats.max_leaf_triangles, 2);
        assert_eq!(stats.straddlers, 1);
        assert!((stats.mean_leaf_triangles - 1.5).abs() < 1e-12);
        assert!(stats.to_string().contains("kd nodes:       1"));
    }

    #[test]
    fn test_validate_accepts_partition() {
        assert_eq!(small_tree().validate(4), Ok(()));
        assert_eq!(Tree::empty().validate(0), Ok(()));
        assert!(Tree::empty().validate(1).is_err());
    }

    #[test]
    fn test_validate_rejects_duplicates_and_cycles() {
        let mut tree = small_tree();
        tree.triangles[3] = 2;
        assert!(tree.validate(4).unwrap_err().contains("twice"));

        let mut tree = small_tree();
        if let Node::Kd { back, .. } = &mut tree.nodes[0] {
            *back = Some(NodeId(0));
        }
        assert!(tree.validate(4).unwrap_err().contains("invalid child"));

        let mut tree = small_tree();
        tree.nodes[2] = Node::Leaf {
            triangles: TriangleRange { start: 3, len: 5 },
        };
        assert!(tree.validate(4).unwrap_err().contains("out of bounds"));
    }

    #[test]
    fn test_serde_round_trip() {
        let tree = small_tree();
        let json = serde_json::to_string(&tree).unwrap();
        let back: Tree = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tree);
    }
}
