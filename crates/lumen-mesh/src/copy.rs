//! Owned snapshot of a mesh.

use std::collections::HashMap;

use lumen_math::{Aabb3, Vec3};

use crate::{Mesh, PreImportNumber, Triangle, TriangleBody};

/// A mesh copied into owned arrays.
///
/// Keeps the source's pre-import numbering, so a copy of a filtered or
/// merged mesh still reports the original buffer indices while no longer
/// borrowing those buffers.
#[derive(Debug, Clone)]
pub struct MeshCopy {
    vertices: Vec<Vec3>,
    triangles: Vec<Triangle>,
    aabb: Aabb3,
    num_objects: u32,
    pre_triangles: Vec<Option<PreImportNumber>>,
    /// Pre-import number of each triangle corner.
    pre_corners: Vec<[Option<PreImportNumber>; 3]>,
    /// Fallback pre-import number per vertex.
    pre_vertices: Vec<Option<PreImportNumber>>,
    post_triangles: HashMap<PreImportNumber, u32>,
    post_vertices: HashMap<PreImportNumber, u32>,
}

impl MeshCopy {
    /// Copy geometry and index translation out of `mesh`.
    pub fn new(mesh: &dyn Mesh) -> Self {
        let vertices: Vec<Vec3> = (0..mesh.num_vertices()).map(|v| mesh.vertex(v)).collect();
        let triangles: Vec<Triangle> = (0..mesh.num_triangles()).map(|t| mesh.triangle(t)).collect();
        let pre_triangles: Vec<_> = (0..mesh.num_triangles())
            .map(|t| mesh.pre_import_triangle(t))
            .collect();
        let pre_corners: Vec<_> = triangles
            .iter()
            .enumerate()
            .map(|(t, tri)| tri.map(|v| mesh.pre_import_vertex(v, t as u32)))
            .collect();
        let pre_vertices: Vec<_> = (0..mesh.num_vertices())
            .map(|v| mesh.pre_import_vertex(v, u32::MAX))
            .collect();

        let post_triangles = pre_triangles
            .iter()
            .enumerate()
            .filter_map(|(t, pre)| pre.map(|p| (p, t as u32)))
            .collect();
        let mut post_vertices = HashMap::new();
        for (v, pre) in pre_vertices.iter().enumerate() {
            if let Some(pre) = pre {
                post_vertices.insert(*pre, v as u32);
            }
        }
        for (tri, corners) in triangles.iter().zip(&pre_corners) {
            for (&v, pre) in tri.iter().zip(corners) {
                if let Some(pre) = pre {
                    post_vertices.entry(*pre).or_insert(v);
                }
            }
        }

        let aabb = mesh.aabb();
        Self {
            vertices,
            triangles,
            aabb,
            num_objects: mesh.num_objects(),
            pre_triangles,
            pre_corners,
            pre_vertices,
            post_triangles,
            post_vertices,
        }
    }

    /// Vertex positions.
    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    /// Triangle vertex indices.
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }
}

impl Mesh for MeshCopy {
    fn num_vertices(&self) -> u32 {
        self.vertices.len() as u32
    }

    fn vertex(&self, v: u32) -> Vec3 {
        self.vertices[v as usize]
    }

    fn num_triangles(&self) -> u32 {
        self.triangles.len() as u32
    }

    fn triangle(&self, t: u32) -> Triangle {
        self.triangles[t as usize]
    }

    fn num_objects(&self) -> u32 {
        self.num_objects
    }

    #[inline]
    fn triangle_body(&self, t: u32) -> TriangleBody {
        let [a, b, c] = self.triangles[t as usize];
        let v = &self.vertices;
        TriangleBody::from_vertices(&v[a as usize], &v[b as usize], &v[c as usize])
    }

    fn pre_import_triangle(&self, post_triangle: u32) -> Option<PreImportNumber> {
        *self.pre_triangles.get(post_triangle as usize)?
    }

    fn post_import_triangle(&self, pre_triangle: PreImportNumber) -> Option<u32> {
        self.post_triangles.get(&pre_triangle).copied()
    }

    fn pre_import_vertex(&self, post_vertex: u32, post_triangle: u32) -> Option<PreImportNumber> {
        if let Some(tri) = self.triangles.get(post_triangle as usize) {
            if let Some(corner) = tri.iter().position(|&v| v == post_vertex) {
                return self.pre_corners[post_triangle as usize][corner];
            }
        }
        *self.pre_vertices.get(post_vertex as usize)?
    }

    fn post_import_vertex(
        &self,
        pre_vertex: PreImportNumber,
        _pre_triangle: PreImportNumber,
    ) -> Option<u32> {
        self.post_vertices.get(&pre_vertex).copied()
    }

    fn aabb(&self) -> Aabb3 {
        self.aabb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{optimize, MultiMesh};
    use crate::{check_consistency, VertexBuffer, VertexBufferMesh};

    #[test]
    fn test_copy_outlives_buffers() {
        let copy = {
            let points = vec![[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
            let mesh =
                VertexBufferMesh::triangle_list(VertexBuffer::from_points(&points).unwrap()).unwrap();
            MeshCopy::new(&mesh)
        };
        assert_eq!(copy.num_triangles(), 1);
        assert_eq!(copy.triangle_body(0).side2, Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(copy.aabb().max, Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_copy_keeps_filtered_numbering() {
        let a = [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
        let b = [
            [0.0f32, 0.0, 1.0],
            [1.0, 0.0, 1.0],
            [0.0, 1.0, 1.0],
            [0.0, 1.0, 1.0],
            [1.0, 0.0, 1.0],
            [1.0, 1.0, 1.0],
        ];
        let ma = VertexBufferMesh::triangle_list(VertexBuffer::from_points(&a).unwrap()).unwrap();
        let mb = VertexBufferMesh::triangle_list(VertexBuffer::from_points(&b).unwrap()).unwrap();
        let merged = MultiMesh::create(&[&ma, &mb]).unwrap().unwrap();
        let optimized = optimize(&merged, 0.0);
        let copy = MeshCopy::new(&optimized);
        assert_eq!(copy.num_triangles(), 2);
        assert_eq!(copy.num_objects(), 2);
        assert_eq!(copy.pre_import_triangle(1), Some(PreImportNumber::new(1, 1)));
        assert_eq!(copy.pre_import_vertex(copy.triangle(1)[0], 1), Some(PreImportNumber::new(1, 3)));
        check_consistency(&copy).unwrap();
    }
}
