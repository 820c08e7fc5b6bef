//! Self-check of a mesh's indices and index translation.

use crate::error::{MeshError, Result};
use crate::Mesh;

/// Verify that `mesh` keeps its own contract.
///
/// Checks that every triangle references existing vertices, that every
/// triangle and every triangle corner round-trips through pre-import and
/// back to the same post-import index, and that the first index past the
/// end has no pre-import number. Returns the first violation found.
pub fn check_consistency(mesh: &dyn Mesh) -> Result<()> {
    let num_vertices = mesh.num_vertices();
    let num_triangles = mesh.num_triangles();

    for t in 0..num_triangles {
        let triangle = mesh.triangle(t);
        if let Some(&v) = triangle.iter().find(|&&v| v >= num_vertices) {
            return Err(MeshError::VertexOutOfRange {
                index: v,
                count: num_vertices,
            });
        }

        let pre = mesh.pre_import_triangle(t).ok_or_else(|| {
            MeshError::Inconsistent(format!("triangle {t} has no pre-import number"))
        })?;
        match mesh.post_import_triangle(pre) {
            Some(back) if back == t => {}
            other => {
                return Err(MeshError::Inconsistent(format!(
                    "triangle {t} -> pre-import {pre} -> {other:?}"
                )))
            }
        }

        for v in triangle {
            let pre_v = mesh.pre_import_vertex(v, t).ok_or_else(|| {
                MeshError::Inconsistent(format!("vertex {v} of triangle {t} has no pre-import number"))
            })?;
            match mesh.post_import_vertex(pre_v, pre) {
                Some(back) if back == v => {}
                other => {
                    return Err(MeshError::Inconsistent(format!(
                        "vertex {v} of triangle {t} -> pre-import {pre_v} -> {other:?}"
                    )))
                }
            }
        }
    }

    if mesh.pre_import_triangle(num_triangles).is_some() {
        return Err(MeshError::Inconsistent(format!(
            "triangle {num_triangles} is past the end but has a pre-import number"
        )));
    }
    if mesh.pre_import_vertex(num_vertices, 0).is_some() {
        return Err(MeshError::Inconsistent(format!(
            "vertex {num_vertices} is past the end but has a pre-import number"
        )));
    }

    log::debug!(
        "mesh consistent: {} vertices, {} triangles",
        num_vertices,
        num_triangles
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{IndexedMesh, PreImportNumber, Triangle, VertexBuffer};
    use lumen_math::Vec3;

    /// Reports a pre-import number that does not translate back.
    struct Broken;

    impl Mesh for Broken {
        fn num_vertices(&self) -> u32 {
            3
        }
        fn vertex(&self, v: u32) -> Vec3 {
            Vec3::new(v as f32, (v % 2) as f32, 0.0)
        }
        fn num_triangles(&self) -> u32 {
            1
        }
        fn triangle(&self, _t: u32) -> Triangle {
            [0, 1, 2]
        }
        fn pre_import_triangle(&self, post_triangle: u32) -> Option<PreImportNumber> {
            (post_triangle == 0).then_some(PreImportNumber::local(7))
        }
    }

    #[test]
    fn test_adapter_is_consistent() {
        let points = [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let indices: [u32; 3] = [2, 0, 1];
        let mesh =
            IndexedMesh::triangle_list(VertexBuffer::from_points(&points).unwrap(), &indices).unwrap();
        assert!(check_consistency(&mesh).is_ok());
    }

    #[test]
    fn test_broken_translation_detected() {
        assert!(matches!(
            check_consistency(&Broken),
            Err(MeshError::Inconsistent(_))
        ));
    }
}
