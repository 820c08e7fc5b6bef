//! Meshes seen through an affine transform.

use lumen_math::{Transform, Vec3};

use crate::{Mesh, PreImportNumber, Triangle, TriangleBody};

/// Presents `inner` with every vertex transformed.
///
/// Numbering is unchanged. Mirroring transforms swap the last two corners
/// of every triangle so front faces keep facing outwards.
#[derive(Debug, Clone)]
pub struct TransformedMesh<M> {
    inner: M,
    transform: Transform,
    mirrored: bool,
}

impl<M: Mesh> TransformedMesh<M> {
    /// Wrap `inner`, taking ownership of it (pass `&mesh` to borrow).
    pub fn new(inner: M, transform: Transform) -> Self {
        let mirrored = transform.is_mirroring();
        Self {
            inner,
            transform,
            mirrored,
        }
    }

    /// The applied transform.
    pub fn transform(&self) -> &Transform {
        &self.transform
    }
}

impl<M: Mesh> Mesh for TransformedMesh<M> {
    fn num_vertices(&self) -> u32 {
        self.inner.num_vertices()
    }

    fn vertex(&self, v: u32) -> Vec3 {
        self.transform.apply_point(&self.inner.vertex(v))
    }

    fn num_triangles(&self) -> u32 {
        self.inner.num_triangles()
    }

    fn triangle(&self, t: u32) -> Triangle {
        let [a, b, c] = self.inner.triangle(t);
        if self.mirrored {
            [a, c, b]
        } else {
            [a, b, c]
        }
    }

    fn num_objects(&self) -> u32 {
        self.inner.num_objects()
    }

    fn triangle_body(&self, t: u32) -> TriangleBody {
        let body = self.inner.triangle_body(t);
        let vertex0 = self.transform.apply_point(&body.vertex0);
        let side1 = self.transform.apply_vec(&body.side1);
        let side2 = self.transform.apply_vec(&body.side2);
        if self.mirrored {
            TriangleBody { vertex0, side1: side2, side2: side1 }
        } else {
            TriangleBody { vertex0, side1, side2 }
        }
    }

    fn pre_import_triangle(&self, post_triangle: u32) -> Option<PreImportNumber> {
        self.inner.pre_import_triangle(post_triangle)
    }

    fn post_import_triangle(&self, pre_triangle: PreImportNumber) -> Option<u32> {
        self.inner.post_import_triangle(pre_triangle)
    }

    fn pre_import_vertex(&self, post_vertex: u32, post_triangle: u32) -> Option<PreImportNumber> {
        self.inner.pre_import_vertex(post_vertex, post_triangle)
    }

    fn post_import_vertex(
        &self,
        pre_vertex: PreImportNumber,
        pre_triangle: PreImportNumber,
    ) -> Option<u32> {
        self.inner.post_import_vertex(pre_vertex, pre_triangle)
    }
}
