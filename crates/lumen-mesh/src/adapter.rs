//! Meshes over caller-owned vertex and index buffers.
//!
//! Nothing is copied: adapters keep borrowed views and compute triangle
//! corners on demand. Index buffers are validated once at construction so
//! that every triangle references an existing vertex.

use lumen_math::Vec3;
use serde::{Deserialize, Serialize};

use crate::buffer::{IndexBuffer, MeshIndex, VertexBuffer};
use crate::error::{MeshError, Result};
use crate::{Mesh, Triangle, TriangleBody};

/// How consecutive buffer elements form triangles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriangleFormat {
    /// Elements grouped in threes.
    List,
    /// Each element after the second forms a triangle with the two before
    /// it; every odd triangle is re-wound to keep a consistent facing.
    Strip,
}

impl TriangleFormat {
    /// Number of triangles formed by `elements` buffer entries.
    pub fn num_triangles(self, elements: usize) -> Result<u32> {
        let triangles = match self {
            TriangleFormat::List => {
                if elements % 3 != 0 {
                    return Err(MeshError::RaggedTriangleList(elements));
                }
                elements / 3
            }
            TriangleFormat::Strip => match elements {
                0 => 0,
                1 | 2 => return Err(MeshError::StripTooShort(elements)),
                n => n - 2,
            },
        };
        u32::try_from(triangles).map_err(|_| MeshError::TooManyElements(elements))
    }

    /// Buffer positions of the corners of triangle `t`.
    #[inline]
    pub fn corners(self, t: u32) -> [u32; 3] {
        match self {
            TriangleFormat::List => [3 * t, 3 * t + 1, 3 * t + 2],
            TriangleFormat::Strip => {
                let odd = t % 2;
                [t, t + 1 + odd, t + 2 - odd]
            }
        }
    }
}

/// Non-indexed mesh: triangle corners are consecutive vertex buffer entries.
#[derive(Debug, Clone, Copy)]
pub struct VertexBufferMesh<'a> {
    vertices: VertexBuffer<'a>,
    format: TriangleFormat,
    num_triangles: u32,
}

impl<'a> VertexBufferMesh<'a> {
    /// Mesh over `vertices` grouped according to `format`.
    pub fn new(vertices: VertexBuffer<'a>, format: TriangleFormat) -> Result<Self> {
        let num_triangles = format.num_triangles(vertices.len() as usize)?;
        Ok(Self {
            vertices,
            format,
            num_triangles,
        })
    }

    /// Triangle list: vertices `3t, 3t+1, 3t+2` form triangle `t`.
    pub fn triangle_list(vertices: VertexBuffer<'a>) -> Result<Self> {
        Self::new(vertices, TriangleFormat::List)
    }

    /// Triangle strip.
    pub fn triangle_strip(vertices: VertexBuffer<'a>) -> Result<Self> {
        Self::new(vertices, TriangleFormat::Strip)
    }

    /// Grouping format.
    pub fn format(&self) -> TriangleFormat {
        self.format
    }
}

impl Mesh for VertexBufferMesh<'_> {
    fn num_vertices(&self) -> u32 {
        self.vertices.len()
    }

    fn vertex(&self, v: u32) -> Vec3 {
        self.vertices.get(v)
    }

    fn num_triangles(&self) -> u32 {
        self.num_triangles
    }

    fn triangle(&self, t: u32) -> Triangle {
        assert!(t < self.num_triangles, "triangle {t} out of range ({})", self.num_triangles);
        self.format.corners(t)
    }

    #[inline]
    fn triangle_body(&self, t: u32) -> TriangleBody {
        let [a, b, c] = self.triangle(t);
        let v0 = self.vertices.get(a);
        TriangleBody {
            vertex0: v0,
            side1: self.vertices.get(b) - v0,
            side2: self.vertices.get(c) - v0,
        }
    }
}

/// Indexed mesh: triangle corners come from an index buffer of width `I`.
#[derive(Debug, Clone, Copy)]
pub struct IndexedMesh<'a, I: MeshIndex> {
    vertices: VertexBuffer<'a>,
    indices: &'a [I],
    format: TriangleFormat,
    num_triangles: u32,
}

impl<'a, I: MeshIndex> IndexedMesh<'a, I> {
    /// Mesh over `vertices` with corners read from `indices`.
    ///
    /// Every index is checked against the vertex count.
    pub fn new(vertices: VertexBuffer<'a>, indices: &'a [I], format: TriangleFormat) -> Result<Self> {
        let num_triangles = format.num_triangles(indices.len())?;
        let num_vertices = vertices.len();
        if let Some((position, index)) = indices
            .iter()
            .map(|i| i.to_u32())
            .enumerate()
            .find(|&(_, i)| i >= num_vertices)
        {
            return Err(MeshError::IndexOutOfRange {
                position,
                index,
                num_vertices,
            });
        }
        Ok(Self {
            vertices,
            indices,
            format,
            num_triangles,
        })
    }

    /// Indexed triangle list.
    pub fn triangle_list(vertices: VertexBuffer<'a>, indices: &'a [I]) -> Result<Self> {
        Self::new(vertices, indices, TriangleFormat::List)
    }

    /// Indexed triangle strip.
    pub fn triangle_strip(vertices: VertexBuffer<'a>, indices: &'a [I]) -> Result<Self> {
        Self::new(vertices, indices, TriangleFormat::Strip)
    }

    /// Grouping format.
    pub fn format(&self) -> TriangleFormat {
        self.format
    }
}

impl<I: MeshIndex> Mesh for IndexedMesh<'_, I> {
    fn num_vertices(&self) -> u32 {
        self.vertices.len()
    }

    fn vertex(&self, v: u32) -> Vec3 {
        self.vertices.get(v)
    }

    fn num_triangles(&self) -> u32 {
        self.num_triangles
    }

    #[inline]
    fn triangle(&self, t: u32) -> Triangle {
        assert!(t < self.num_triangles, "triangle {t} out of range ({})", self.num_triangles);
        self.format
            .corners(t)
            .map(|corner| self.indices[corner as usize].to_u32())
    }

    #[inline]
    fn triangle_body(&self, t: u32) -> TriangleBody {
        let [a, b, c] = self.triangle(t);
        let v0 = self.vertices.get(a);
        TriangleBody {
            vertex0: v0,
            side1: self.vertices.get(b) - v0,
            side2: self.vertices.get(c) - v0,
        }
    }
}

/// Build a mesh from raw buffers, choosing the adapter by format tag and
/// index width.
pub fn create_mesh<'a>(
    vertices: VertexBuffer<'a>,
    format: TriangleFormat,
    indices: Option<IndexBuffer<'a>>,
) -> Result<Box<dyn Mesh + 'a>> {
    Ok(match indices {
        None => Box::new(VertexBufferMesh::new(vertices, format)?),
        Some(IndexBuffer::U8(i)) => Box::new(IndexedMesh::new(vertices, i, format)?),
        Some(IndexBuffer::U16(i)) => Box::new(IndexedMesh::new(vertices, i, format)?),
        Some(IndexBuffer::U32(i)) => Box::new(IndexedMesh::new(vertices, i, format)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: [[f32; 3]; 4] = [
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [1.0, 1.0, 0.0],
    ];

    fn normal_z(mesh: &dyn Mesh, t: u32) -> f32 {
        mesh.triangle_plane(t).unwrap().normal.z
    }

    #[test]
    fn test_strip_parity_rule() {
        assert_eq!(TriangleFormat::Strip.corners(0), [0, 1, 2]);
        assert_eq!(TriangleFormat::Strip.corners(1), [1, 3, 2]);
        assert_eq!(TriangleFormat::Strip.corners(2), [2, 3, 4]);
        assert_eq!(TriangleFormat::Strip.corners(3), [3, 5, 4]);
    }

    #[test]
    fn test_strip_keeps_facing() {
        let vb = VertexBuffer::from_points(&QUAD).unwrap();
        let strip = VertexBufferMesh::triangle_strip(vb).unwrap();
        assert_eq!(strip.num_triangles(), 2);
        assert!(normal_z(&strip, 0) > 0.0);
        assert!(normal_z(&strip, 1) > 0.0);
    }

    #[test]
    fn test_indexed_strip_matches_plain_strip() {
        let vb = VertexBuffer::from_points(&QUAD).unwrap();
        let plain = VertexBufferMesh::triangle_strip(vb).unwrap();
        let indices: [u16; 4] = [0, 1, 2, 3];
        let indexed = IndexedMesh::triangle_strip(vb, &indices).unwrap();
        for t in 0..2 {
            assert_eq!(plain.triangle(t), indexed.triangle(t));
            assert_eq!(plain.triangle_body(t), indexed.triangle_body(t));
        }
    }

    #[test]
    fn test_list_body_reads_vertices_directly() {
        let vb = VertexBuffer::from_points(&QUAD[..3]).unwrap();
        let list = VertexBufferMesh::triangle_list(vb).unwrap();
        let body = list.triangle_body(0);
        assert_eq!(body.side1, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(body.side2, Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_indexed_list_u32() {
        let vb = VertexBuffer::from_points(&QUAD).unwrap();
        let indices: [u32; 6] = [0, 1, 2, 2, 1, 3];
        let mesh = IndexedMesh::triangle_list(vb, &indices).unwrap();
        assert_eq!(mesh.num_triangles(), 2);
        assert_eq!(mesh.triangle(1), [2, 1, 3]);
        assert!(normal_z(&mesh, 1) > 0.0);
    }

    #[test]
    fn test_index_out_of_range_rejected() {
        let vb = VertexBuffer::from_points(&QUAD).unwrap();
        let indices: [u16; 3] = [0, 1, 4];
        assert_eq!(
            IndexedMesh::triangle_list(vb, &indices).unwrap_err(),
            MeshError::IndexOutOfRange {
                position: 2,
                index: 4,
                num_vertices: 4
            }
        );
    }

    #[test]
    fn test_format_errors() {
        assert_eq!(
            TriangleFormat::List.num_triangles(4),
            Err(MeshError::RaggedTriangleList(4))
        );
        assert_eq!(TriangleFormat::Strip.num_triangles(2), Err(MeshError::StripTooShort(2)));
        assert_eq!(TriangleFormat::Strip.num_triangles(0), Ok(0));
    }

    #[test]
    fn test_create_mesh_dispatch() {
        let vb = VertexBuffer::from_points(&QUAD).unwrap();
        let indices: [u8; 6] = [0, 1, 2, 2, 1, 3];
        let mesh = create_mesh(vb, TriangleFormat::List, Some(IndexBuffer::U8(&indices))).unwrap();
        assert_eq!(mesh.num_triangles(), 2);
        let strip = create_mesh(vb, TriangleFormat::Strip, None).unwrap();
        assert_eq!(strip.num_triangles(), 2);
        assert!(create_mesh(vb, TriangleFormat::List, None).is_err());
    }

    #[test]
    #[should_panic]
    fn test_triangle_out_of_range_panics() {
        let vb = VertexBuffer::from_points(&QUAD[..3]).unwrap();
        VertexBufferMesh::triangle_list(vb).unwrap().triangle(1);
    }
}
