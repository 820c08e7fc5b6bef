//! Procedural triangle meshes for tests and benchmarks.
//!
//! All shapes wind counter-clockwise when seen from outside.

use std::f32::consts::PI;

use crate::adapter::IndexedMesh;
use crate::buffer::VertexBuffer;
use crate::error::Result;

/// Owned vertex and index arrays, viewable as a [`crate::Mesh`].
#[derive(Debug, Clone, Default)]
pub struct ShapeMesh {
    /// Flat array of vertex positions: `[x0, y0, z0, x1, y1, z1, ...]`.
    pub vertices: Vec<f32>,
    /// Flat array of triangle indices: `[i0, i1, i2, ...]`.
    pub indices: Vec<u32>,
}

impl ShapeMesh {
    /// Create an empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of triangles.
    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.vertices.len() / 3
    }

    /// Append another mesh.
    pub fn merge(&mut self, other: &ShapeMesh) {
        let offset = self.num_vertices() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.indices.extend(other.indices.iter().map(|&i| i + offset));
    }

    /// Borrow as an indexed triangle list.
    pub fn as_mesh(&self) -> Result<IndexedMesh<'_, u32>> {
        IndexedMesh::triangle_list(VertexBuffer::from_flat(&self.vertices)?, &self.indices)
    }

    fn push_vertex(&mut self, x: f32, y: f32, z: f32) -> u32 {
        self.vertices.extend_from_slice(&[x, y, z]);
        self.num_vertices() as u32 - 1
    }
}

/// Square of `cells x cells` quads in the z = 0 plane spanning
/// `[0, size]²`, facing +z.
pub fn grid(cells: u32, size: f32) -> ShapeMesh {
    let mut mesh = ShapeMesh::new();
    let step = size / cells.max(1) as f32;
    for j in 0..=cells {
        for i in 0..=cells {
            mesh.push_vertex(i as f32 * step, j as f32 * step, 0.0);
        }
    }
    let row = cells + 1;
    for j in 0..cells {
        for i in 0..cells {
            let a = j * row + i;
            let b = a + 1;
            let c = a + row + 1;
            let d = a + row;
            mesh.indices.extend_from_slice(&[a, b, c, a, c, d]);
        }
    }
    mesh
}

/// Latitude/longitude sphere around the origin, facing outwards.
///
/// Pole caps contain no zero-area triangles.
pub fn uv_sphere(radius: f32, segments: u32, rings: u32) -> ShapeMesh {
    let segments = segments.max(3);
    let rings = rings.max(2);
    let mut mesh = ShapeMesh::new();
    for r in 0..=rings {
        let theta = PI * r as f32 / rings as f32;
        for s in 0..=segments {
            let phi = 2.0 * PI * s as f32 / segments as f32;
            mesh.push_vertex(
                radius * theta.sin() * phi.cos(),
                radius * theta.sin() * phi.sin(),
                radius * theta.cos(),
            );
        }
    }
    let row = segments + 1;
    for r in 0..rings {
        for s in 0..segments {
            let a = r * row + s;
            let b = a + row;
            let c = b + 1;
            let d = a + 1;
            if r != rings - 1 {
                mesh.indices.extend_from_slice(&[a, b, c]);
            }
            if r != 0 {
                mesh.indices.extend_from_slice(&[a, c, d]);
            }
        }
    }
    mesh
}

/// Corner order of [`cube`]: corner `i` is at `(i & 1, (i >> 1) & 1, (i >> 2) & 1)`.
const CUBE_TRIANGLES: [u32; 36] = [
    0, 2, 3, 0, 3, 1, // -z
    4, 5, 7, 4, 7, 6, // +z
    0, 1, 5, 0, 5, 4, // -y
    2, 6, 7, 2, 7, 3, // +y
    0, 4, 6, 0, 6, 2, // -x
    1, 3, 7, 1, 7, 5, // +x
];

/// Axis-aligned cube with minimum corner `origin` and edge `size`.
pub fn cube(origin: [f32; 3], size: f32) -> ShapeMesh {
    let mut mesh = ShapeMesh::new();
    for i in 0..8u32 {
        mesh.push_vertex(
            origin[0] + size * (i & 1) as f32,
            origin[1] + size * ((i >> 1) & 1) as f32,
            origin[2] + size * ((i >> 2) & 1) as f32,
        );
    }
    mesh.indices.extend_from_slice(&CUBE_TRIANGLES);
    mesh
}

/// `n³` separate cubes of edge `size` on a lattice with pitch `spacing`.
pub fn cube_field(n: u32, spacing: f32, size: f32) -> ShapeMesh {
    let mut mesh = ShapeMesh::new();
    for z in 0..n {
        for y in 0..n {
            for x in 0..n {
                let origin = [x as f32 * spacing, y as f32 * spacing, z as f32 * spacing];
                mesh.merge(&cube(origin, size));
            }
        }
    }
    mesh
}
