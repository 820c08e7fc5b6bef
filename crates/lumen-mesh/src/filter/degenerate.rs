//! Removal of degenerate triangles.

use lumen_math::Vec3;

use crate::{Mesh, PreImportNumber, Triangle, TriangleBody};

/// Hides triangles that reference the same vertex twice.
///
/// The inner mesh is scanned once at construction; queries translate
/// through a dense table of surviving triangles.
#[derive(Debug, Clone)]
pub struct DegenerateFilter<M> {
    inner: M,
    /// Post-import triangle -> inner triangle, ascending.
    valid: Vec<u32>,
}

impl<M: Mesh> DegenerateFilter<M> {
    /// Wrap `inner`, taking ownership of it (pass `&mesh` to borrow).
    pub fn new(inner: M) -> Self {
        let valid: Vec<u32> = (0..inner.num_triangles())
            .filter(|&t| {
                let [a, b, c] = inner.triangle(t);
                a != b && b != c && c != a
            })
            .collect();
        let removed = inner.num_triangles() as usize - valid.len();
        if removed > 0 {
            log::debug!(
                "degenerate filter removed {} of {} triangles",
                removed,
                inner.num_triangles()
            );
        }
        Self { inner, valid }
    }

    /// The wrapped mesh.
    pub fn inner(&self) -> &M {
        &self.inner
    }

    /// Inner triangle for a post-import triangle, `u32::MAX` when invalid.
    fn inner_triangle(&self, post_triangle: u32) -> u32 {
        self.valid
            .get(post_triangle as usize)
            .copied()
            .unwrap_or(u32::MAX)
    }
}

impl<M: Mesh> Mesh for DegenerateFilter<M> {
    fn num_vertices(&self) -> u32 {
        self.inner.num_vertices()
    }

    fn vertex(&self, v: u32) -> Vec3 {
        self.inner.vertex(v)
    }

    fn num_triangles(&self) -> u32 {
        self.valid.len() as u32
    }

    fn triangle(&self, t: u32) -> Triangle {
        self.inner.triangle(self.valid[t as usize])
    }

    fn num_objects(&self) -> u32 {
        self.inner.num_objects()
    }

    fn triangle_body(&self, t: u32) -> TriangleBody {
        self.inner.triangle_body(self.valid[t as usize])
    }

    fn pre_import_triangle(&self, post_triangle: u32) -> Option<PreImportNumber> {
        let inner = *self.valid.get(post_triangle as usize)?;
        self.inner.pre_import_triangle(inner)
    }

    fn post_import_triangle(&self, pre_triangle: PreImportNumber) -> Option<u32> {
        let inner = self.inner.post_import_triangle(pre_triangle)?;
        self.valid.binary_search(&inner).ok().map(|post| post as u32)
    }

    fn pre_import_vertex(&self, post_vertex: u32, post_triangle: u32) -> Option<PreImportNumber> {
        self.inner
            .pre_import_vertex(post_vertex, self.inner_triangle(post_triangle))
    }

    fn post_import_vertex(
        &self,
        pre_vertex: PreImportNumber,
        pre_triangle: PreImportNumber,
    ) -> Option<u32> {
        self.inner.post_import_vertex(pre_vertex, pre_triangle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{IndexedMesh, VertexBuffer};

    const POINTS: [[f32; 3]; 4] = [
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [1.0, 1.0, 0.0],
    ];

    #[test]
    fn test_removes_only_degenerate() {
        let indices: [u16; 12] = [0, 1, 2, 1, 1, 3, 2, 1, 3, 3, 0, 3];
        let vb = VertexBuffer::from_points(&POINTS).unwrap();
        let mesh = IndexedMesh::triangle_list(vb, &indices).unwrap();
        let filtered = DegenerateFilter::new(&mesh);
        assert_eq!(filtered.num_triangles(), 2);
        assert_eq!(filtered.triangle(0), [0, 1, 2]);
        assert_eq!(filtered.triangle(1), [2, 1, 3]);
        assert_eq!(filtered.pre_import_triangle(1), Some(PreImportNumber::local(2)));
        assert_eq!(filtered.pre_import_triangle(2), None);
    }

    #[test]
    fn test_removed_triangle_has_no_post_import() {
        let indices: [u16; 6] = [0, 0, 1, 0, 1, 2];
        let vb = VertexBuffer::from_points(&POINTS).unwrap();
        let mesh = IndexedMesh::triangle_list(vb, &indices).unwrap();
        let filtered = DegenerateFilter::new(mesh);
        assert_eq!(filtered.post_import_triangle(PreImportNumber::local(0)), None);
        assert_eq!(filtered.post_import_triangle(PreImportNumber::local(1)), Some(0));
    }

    #[test]
    fn test_vertex_translation_uses_inner_triangle() {
        let indices: [u16; 6] = [0, 0, 1, 0, 1, 2];
        let vb = VertexBuffer::from_points(&POINTS).unwrap();
        let filtered = DegenerateFilter::new(IndexedMesh::triangle_list(vb, &indices).unwrap());
        assert_eq!(filtered.pre_import_vertex(2, 0), Some(PreImportNumber::local(2)));
        assert_eq!(filtered.pre_import_vertex(4, 0), None);
    }
}
