//! Several meshes presented as one.

use std::ops::Deref;

use lumen_math::{Aabb3, Vec3};

use crate::error::{MeshError, Result};
use crate::{Mesh, PreImportNumber, Triangle, TriangleBody};

/// One side of a merge node.
enum Part<'a> {
    /// Caller-supplied mesh, borrowed.
    Leaf(&'a dyn Mesh),
    /// Merge node allocated by [`MultiMesh::create`].
    Node(Box<MultiMesh<'a>>),
}

impl<'a> Part<'a> {
    fn build(meshes: &[&'a dyn Mesh]) -> Result<Self> {
        Ok(match meshes {
            [single] => Part::Leaf(*single),
            _ => Part::Node(Box::new(MultiMesh::build(meshes)?)),
        })
    }

    fn mesh(&self) -> &dyn Mesh {
        match self {
            Part::Leaf(mesh) => *mesh,
            Part::Node(node) => node.as_ref(),
        }
    }
}

/// Binary merge of meshes sharing one coordinate space.
///
/// Vertices and triangles of the right part follow those of the left
/// part. Pre-import numbers carry the slot of the source mesh in
/// `object`: each source takes as many consecutive slots as its
/// [`Mesh::num_objects`], in slice order. Plain meshes take one slot, so
/// mesh `i` of a slice of plain meshes reports object `i`; an already
/// merged mesh keeps its own slots, shifted past those before it.
///
/// Source meshes are borrowed; only the merge nodes are owned.
pub struct MultiMesh<'a> {
    left: Part<'a>,
    right: Part<'a>,
    left_vertices: u32,
    left_triangles: u32,
    left_objects: u32,
    num_vertices: u32,
    num_triangles: u32,
    num_objects: u32,
}

/// Result of [`MultiMesh::create`] for one or more meshes.
pub enum MergedMesh<'a> {
    /// The only input mesh, returned as-is.
    Single(&'a dyn Mesh),
    /// A balanced merge tree.
    Multi(MultiMesh<'a>),
}

impl<'a> MultiMesh<'a> {
    /// Merge `meshes` into one address space.
    ///
    /// Returns `None` for an empty slice and the mesh itself for a single
    /// mesh; otherwise builds a balanced tree of merge nodes. Fails with
    /// [`MeshError::TooManyElements`] when the merged vertex, triangle or
    /// object count does not fit in 32 bits.
    pub fn create(meshes: &[&'a dyn Mesh]) -> Result<Option<MergedMesh<'a>>> {
        Ok(match meshes {
            [] => None,
            [single] => Some(MergedMesh::Single(*single)),
            _ => Some(MergedMesh::Multi(Self::build(meshes)?)),
        })
    }

    fn build(meshes: &[&'a dyn Mesh]) -> Result<Self> {
        debug_assert!(meshes.len() >= 2);
        let (l, r) = meshes.split_at(meshes.len() / 2);
        let left = Part::build(l)?;
        let right = Part::build(r)?;
        let (lm, rm) = (left.mesh(), right.mesh());
        Ok(Self {
            left_vertices: lm.num_vertices(),
            left_triangles: lm.num_triangles(),
            left_objects: lm.num_objects(),
            num_vertices: add_counts(lm.num_vertices(), rm.num_vertices())?,
            num_triangles: add_counts(lm.num_triangles(), rm.num_triangles())?,
            num_objects: add_counts(lm.num_objects(), rm.num_objects())?,
            left,
            right,
        })
    }

    /// Shift a pre-import number of the right part into this node's slots.
    fn from_right(&self, pre: PreImportNumber) -> PreImportNumber {
        PreImportNumber::new(pre.object + self.left_objects, pre.index)
    }

    /// Select the part owning object slot `object`, with the slot made local.
    fn part_for(&self, pre: PreImportNumber) -> Option<(&Part<'a>, PreImportNumber, bool)> {
        if pre.object < self.left_objects {
            Some((&self.left, pre, false))
        } else if pre.object < self.num_objects {
            let local = PreImportNumber::new(pre.object - self.left_objects, pre.index);
            Some((&self.right, local, true))
        } else {
            None
        }
    }
}

fn add_counts(left: u32, right: u32) -> Result<u32> {
    left.checked_add(right)
        .ok_or(MeshError::TooManyElements((left as usize).saturating_add(right as usize)))
}

impl Mesh for MultiMesh<'_> {
    fn num_vertices(&self) -> u32 {
        self.num_vertices
    }

    fn vertex(&self, v: u32) -> Vec3 {
        if v < self.left_vertices {
            self.left.mesh().vertex(v)
        } else {
            self.right.mesh().vertex(v - self.left_vertices)
        }
    }

    fn num_triangles(&self) -> u32 {
        self.num_triangles
    }

    fn num_objects(&self) -> u32 {
        self.num_objects
    }

    fn triangle(&self, t: u32) -> Triangle {
        if t < self.left_triangles {
            self.left.mesh().triangle(t)
        } else {
            self.right
                .mesh()
                .triangle(t - self.left_triangles)
                .map(|v| v + self.left_vertices)
        }
    }

    fn triangle_body(&self, t: u32) -> TriangleBody {
        if t < self.left_triangles {
            self.left.mesh().triangle_body(t)
        } else {
            self.right.mesh().triangle_body(t - self.left_triangles)
        }
    }

    fn pre_import_triangle(&self, post_triangle: u32) -> Option<PreImportNumber> {
        if post_triangle < self.left_triangles {
            self.left.mesh().pre_import_triangle(post_triangle)
        } else {
            let local = post_triangle - self.left_triangles;
            let pre = self.right.mesh().pre_import_triangle(local)?;
            Some(self.from_right(pre))
        }
    }

    fn post_import_triangle(&self, pre_triangle: PreImportNumber) -> Option<u32> {
        let (part, local, right) = self.part_for(pre_triangle)?;
        let post = part.mesh().post_import_triangle(local)?;
        Some(if right { post + self.left_triangles } else { post })
    }

    fn pre_import_vertex(&self, post_vertex: u32, post_triangle: u32) -> Option<PreImportNumber> {
        if post_vertex < self.left_vertices {
            // A triangle hint from the other part is meaningless there.
            let hint = if post_triangle < self.left_triangles {
                post_triangle
            } else {
                u32::MAX
            };
            self.left.mesh().pre_import_vertex(post_vertex, hint)
        } else if post_vertex < self.num_vertices {
            let hint = post_triangle
                .checked_sub(self.left_triangles)
                .unwrap_or(u32::MAX);
            let pre = self
                .right
                .mesh()
                .pre_import_vertex(post_vertex - self.left_vertices, hint)?;
            Some(self.from_right(pre))
        } else {
            None
        }
    }

    fn post_import_vertex(
        &self,
        pre_vertex: PreImportNumber,
        pre_triangle: PreImportNumber,
    ) -> Option<u32> {
        let (part, local, right) = self.part_for(pre_vertex)?;
        let local_triangle = if right {
            PreImportNumber::new(
                pre_triangle.object.wrapping_sub(self.left_objects),
                pre_triangle.index,
            )
        } else {
            pre_triangle
        };
        let post = part.mesh().post_import_vertex(local, local_triangle)?;
        Some(if right { post + self.left_vertices } else { post })
    }

    fn aabb(&self) -> Aabb3 {
        let mut aabb = self.left.mesh().aabb();
        aabb.include_aabb(&self.right.mesh().aabb());
        aabb
    }
}

impl<'a> Deref for MergedMesh<'a> {
    type Target = dyn Mesh + 'a;

    fn deref(&self) -> &Self::Target {
        match self {
            MergedMesh::Single(mesh) => *mesh,
            MergedMesh::Multi(multi) => multi,
        }
    }
}

impl Mesh for MergedMesh<'_> {
    fn num_vertices(&self) -> u32 {
        (**self).num_vertices()
    }
    fn vertex(&self, v: u32) -> Vec3 {
        (**self).vertex(v)
    }
    fn num_triangles(&self) -> u32 {
        (**self).num_triangles()
    }
    fn triangle(&self, t: u32) -> Triangle {
        (**self).triangle(t)
    }
    fn num_objects(&self) -> u32 {
        (**self).num_objects()
    }
    fn triangle_body(&self, t: u32) -> TriangleBody {
        (**self).triangle_body(t)
    }
    fn pre_import_triangle(&self, post_triangle: u32) -> Option<PreImportNumber> {
        (**self).pre_import_triangle(post_triangle)
    }
    fn post_import_triangle(&self, pre_triangle: PreImportNumber) -> Option<u32> {
        (**self).post_import_triangle(pre_triangle)
    }
    fn pre_import_vertex(&self, post_vertex: u32, post_triangle: u32) -> Option<PreImportNumber> {
        (**self).pre_import_vertex(post_vertex, post_triangle)
    }
    fn post_import_vertex(
        &self,
        pre_vertex: PreImportNumber,
        pre_triangle: PreImportNumber,
    ) -> Option<u32> {
        (**self).post_import_vertex(pre_vertex, pre_triangle)
    }
    fn aabb(&self) -> Aabb3 {
        (**self).aabb()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::DegenerateFilter;
    use crate::{check_consistency, VertexBuffer, VertexBufferMesh};

    fn triangle_at(z: f32) -> [[f32; 3]; 3] {
        [[0.0, 0.0, z], [1.0, 0.0, z], [0.0, 1.0, z]]
    }

    #[test]
    fn test_create_zero_and_one() {
        assert!(MultiMesh::create(&[]).unwrap().is_none());
        let points = triangle_at(0.0);
        let mesh = VertexBufferMesh::triangle_list(VertexBuffer::from_points(&points).unwrap())
            .unwrap();
        let merged = MultiMesh::create(&[&mesh]).unwrap().unwrap();
        assert!(matches!(merged, MergedMesh::Single(_)));
        assert_eq!(merged.num_triangles(), 1);
    }

    #[test]
    fn test_offsets_and_object_slots() {
        let buffers: Vec<[[f32; 3]; 3]> = (0..5).map(|i| triangle_at(i as f32)).collect();
        let meshes: Vec<VertexBufferMesh> = buffers
            .iter()
            .map(|b| VertexBufferMesh::triangle_list(VertexBuffer::from_points(b).unwrap()).unwrap())
            .collect();
        let refs: Vec<&dyn Mesh> = meshes.iter().map(|m| m as &dyn Mesh).collect();
        let merged = MultiMesh::create(&refs).unwrap().unwrap();
        assert_eq!(merged.num_triangles(), 5);
        assert_eq!(merged.num_vertices(), 15);
        for t in 0..5 {
            assert_eq!(merged.triangle(t), [3 * t, 3 * t + 1, 3 * t + 2]);
            assert_eq!(merged.vertex(3 * t).z, t as f32);
            let pre = merged.pre_import_triangle(t).unwrap();
            assert_eq!(pre, PreImportNumber::new(t, 0));
            assert_eq!(merged.post_import_triangle(pre), Some(t));
            let pre_v = merged.pre_import_vertex(3 * t + 2, t).unwrap();
            assert_eq!(pre_v, PreImportNumber::new(t, 2));
            assert_eq!(merged.post_import_vertex(pre_v, pre), Some(3 * t + 2));
        }
        assert_eq!(merged.post_import_triangle(PreImportNumber::new(5, 0)), None);
        assert_eq!(merged.post_import_triangle(PreImportNumber::new(2, 1)), None);
        assert_eq!(merged.pre_import_triangle(5), None);
        assert_eq!(merged.pre_import_vertex(15, 0), None);
        assert_eq!(merged.aabb().max.z, 4.0);
        assert_eq!(merged.num_objects(), 5);
    }

    #[test]
    fn test_nested_merges_keep_distinct_slots() {
        let buffers: Vec<[[f32; 3]; 3]> = (0..4).map(|i| triangle_at(i as f32)).collect();
        let meshes: Vec<VertexBufferMesh> = buffers
            .iter()
            .map(|b| VertexBufferMesh::triangle_list(VertexBuffer::from_points(b).unwrap()).unwrap())
            .collect();
        let inner_parts: [&dyn Mesh; 2] = [&meshes[0], &meshes[1]];
        let inner = MultiMesh::create(&inner_parts).unwrap().unwrap();
        // A filter over a merge reports the merge's slots.
        let filtered = DegenerateFilter::new(&inner);
        assert_eq!(filtered.num_objects(), 2);

        let outer_parts: [&dyn Mesh; 3] = [&inner, &meshes[2], &filtered];
        let outer = MultiMesh::create(&outer_parts).unwrap().unwrap();
        assert_eq!(outer.num_objects(), 5);
        assert_eq!(outer.num_triangles(), 5);
        let pre: Vec<PreImportNumber> = (0..5)
            .map(|t| outer.pre_import_triangle(t).unwrap())
            .collect();
        assert_eq!(
            pre,
            [
                PreImportNumber::new(0, 0),
                PreImportNumber::new(1, 0),
                PreImportNumber::new(2, 0),
                PreImportNumber::new(3, 0),
                PreImportNumber::new(4, 0),
            ]
        );
        assert_eq!(outer.post_import_triangle(PreImportNumber::new(5, 0)), None);
        assert_eq!(outer.pre_import_vertex(14, 4), Some(PreImportNumber::new(4, 2)));
        check_consistency(&outer).unwrap();
    }

    /// Reports counts without holding any geometry.
    struct Oversized;

    impl Mesh for Oversized {
        fn num_vertices(&self) -> u32 {
            3
        }
        fn vertex(&self, _v: u32) -> Vec3 {
            Vec3::zeros()
        }
        fn num_triangles(&self) -> u32 {
            u32::MAX - 1
        }
        fn triangle(&self, _t: u32) -> Triangle {
            [0, 1, 2]
        }
    }

    #[test]
    fn test_merged_counts_must_fit() {
        let points = triangle_at(0.0);
        let small = VertexBufferMesh::triangle_list(VertexBuffer::from_points(&points).unwrap())
            .unwrap();
        let fits: [&dyn Mesh; 2] = [&Oversized, &small];
        assert_eq!(MultiMesh::create(&fits).unwrap().unwrap().num_triangles(), u32::MAX);
        let parts: [&dyn Mesh; 3] = [&Oversized, &small, &small];
        assert!(matches!(
            MultiMesh::create(&parts),
            Err(MeshError::TooManyElements(_))
        ));
    }
}
