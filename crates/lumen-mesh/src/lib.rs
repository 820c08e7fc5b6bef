#![warn(missing_docs)]

//! Triangle meshes for the lumen collider.
//!
//! A [`Mesh`] presents vertices and triangles through a uniform query
//! interface. Adapters in [`adapter`] read caller-owned vertex and index
//! buffers without copying; filters in [`filter`] wrap another mesh and
//! renumber its triangles or vertices.
//!
//! # Index spaces
//!
//! Every mesh has two numberings. The *post-import* numbering is what the
//! mesh itself reports (`0..num_triangles`, `0..num_vertices`) and what the
//! collider sees. The *pre-import* numbering is the one of the original
//! buffers, tagged with an object slot when several meshes were merged.
//! Each filter translates one step; stacking filters composes the
//! translations, so a hit reported by the collider can always be traced
//! back to the original buffer and object.
//!
//! # Example
//!
//! ```ignore
//! use lumen_mesh::{adapter::IndexedMesh, filter::DegenerateFilter, Mesh, VertexBuffer};
//!
//! let points = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
//! let indices: [u16; 6] = [0, 1, 2, 0, 0, 1];
//! let mesh = IndexedMesh::triangle_list(VertexBuffer::from_points(&points)?, &indices)?;
//! let filtered = DegenerateFilter::new(&mesh);
//! assert_eq!(filtered.num_triangles(), 1);
//! ```

pub mod adapter;
mod buffer;
mod consistency;
mod copy;
pub mod error;
pub mod filter;
pub mod shapes;
mod transformed;

use std::fmt;
use std::sync::Arc;

use lumen_math::{Aabb3, Plane, Real, Vec3};
use serde::{Deserialize, Serialize};

pub use adapter::{create_mesh, IndexedMesh, TriangleFormat, VertexBufferMesh};
pub use buffer::{IndexBuffer, MeshIndex, VertexBuffer};
pub use consistency::check_consistency;
pub use copy::MeshCopy;
pub use error::{MeshError, Result};
pub use transformed::TransformedMesh;

/// Vertex indices of one triangle, in winding order.
pub type Triangle = [u32; 3];

/// Triangle geometry in the form used by the intersection test:
/// first vertex plus the two edges leaving it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriangleBody {
    /// First vertex.
    pub vertex0: Vec3,
    /// `vertex1 - vertex0`.
    pub side1: Vec3,
    /// `vertex2 - vertex0`.
    pub side2: Vec3,
}

impl TriangleBody {
    /// Body of the triangle `(v0, v1, v2)`.
    #[inline]
    pub fn from_vertices(v0: &Vec3, v1: &Vec3, v2: &Vec3) -> Self {
        Self {
            vertex0: *v0,
            side1: v1 - v0,
            side2: v2 - v0,
        }
    }

    /// The three corner positions.
    pub fn vertices(&self) -> [Vec3; 3] {
        [
            self.vertex0,
            self.vertex0 + self.side1,
            self.vertex0 + self.side2,
        ]
    }

    /// Oriented plane, `None` for zero-area triangles.
    pub fn plane(&self) -> Option<Plane> {
        Plane::from_triangle(&self.vertex0, &self.side1, &self.side2)
    }

    /// Triangle area.
    pub fn area(&self) -> Real {
        self.side1.cross(&self.side2).norm() * 0.5
    }

    /// Bounding box of the three corners.
    pub fn aabb(&self) -> Aabb3 {
        Aabb3::from_points(&self.vertices())
    }
}

/// A triangle or vertex index in the pre-import numbering.
///
/// `object` identifies the source mesh when several meshes were merged
/// (0 for a single mesh), `index` is the position within that mesh's
/// original buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PreImportNumber {
    /// Source mesh slot.
    pub object: u32,
    /// Index within the source mesh.
    pub index: u32,
}

impl PreImportNumber {
    /// Number in an explicit object slot.
    pub const fn new(object: u32, index: u32) -> Self {
        Self { object, index }
    }

    /// Number within object 0.
    pub const fn local(index: u32) -> Self {
        Self { object: 0, index }
    }
}

impl fmt::Display for PreImportNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object, self.index)
    }
}

/// Read access to a triangle mesh plus its index translation.
///
/// Implementations are immutable after construction and may be queried
/// from many threads at once. `triangle`, `vertex` and `triangle_body`
/// sit on the hot path: they index with panicking slice accesses rather
/// than returning `Result`; use [`Mesh::try_triangle`] and
/// [`Mesh::try_vertex`] for checked access. Every index returned by
/// `triangle` is below `num_vertices`.
///
/// Translation methods return `None` for indices outside the valid range
/// or for pre-import numbers that were filtered away.
pub trait Mesh: Send + Sync {
    /// Number of vertices (post-import).
    fn num_vertices(&self) -> u32;

    /// Position of vertex `v`.
    fn vertex(&self, v: u32) -> Vec3;

    /// Number of triangles (post-import).
    fn num_triangles(&self) -> u32;

    /// Vertex indices of triangle `t`.
    fn triangle(&self, t: u32) -> Triangle;

    /// Number of object slots used by pre-import numbers, at least 1.
    ///
    /// Pre-import `object` fields are always below this. Merges report the
    /// total over their sources; everything else forwards its inner mesh.
    fn num_objects(&self) -> u32 {
        1
    }

    /// Geometry of triangle `t`. Adapters override this with a direct read.
    fn triangle_body(&self, t: u32) -> TriangleBody {
        let [a, b, c] = self.triangle(t);
        TriangleBody::from_vertices(&self.vertex(a), &self.vertex(b), &self.vertex(c))
    }

    /// Pre-import number of post-import triangle `post_triangle`.
    fn pre_import_triangle(&self, post_triangle: u32) -> Option<PreImportNumber> {
        (post_triangle < self.num_triangles()).then(|| PreImportNumber::local(post_triangle))
    }

    /// Post-import triangle for a pre-import number.
    fn post_import_triangle(&self, pre_triangle: PreImportNumber) -> Option<u32> {
        (pre_triangle.object == 0 && pre_triangle.index < self.num_triangles())
            .then_some(pre_triangle.index)
    }

    /// Pre-import number of vertex `post_vertex` as used by `post_triangle`.
    ///
    /// The triangle disambiguates vertices that were merged by a filter;
    /// any out-of-range triangle falls back to a representative source
    /// vertex.
    fn pre_import_vertex(&self, post_vertex: u32, _post_triangle: u32) -> Option<PreImportNumber> {
        (post_vertex < self.num_vertices()).then(|| PreImportNumber::local(post_vertex))
    }

    /// Post-import vertex for a pre-import vertex used by `pre_triangle`.
    fn post_import_vertex(
        &self,
        pre_vertex: PreImportNumber,
        _pre_triangle: PreImportNumber,
    ) -> Option<u32> {
        (pre_vertex.object == 0 && pre_vertex.index < self.num_vertices())
            .then_some(pre_vertex.index)
    }

    /// Checked [`Mesh::triangle`].
    fn try_triangle(&self, t: u32) -> Result<Triangle> {
        let count = self.num_triangles();
        if t < count {
            Ok(self.triangle(t))
        } else {
            Err(MeshError::TriangleOutOfRange { index: t, count })
        }
    }

    /// Checked [`Mesh::vertex`].
    fn try_vertex(&self, v: u32) -> Result<Vec3> {
        let count = self.num_vertices();
        if v < count {
            Ok(self.vertex(v))
        } else {
            Err(MeshError::VertexOutOfRange { index: v, count })
        }
    }

    /// Oriented plane of triangle `t`, `None` if it has zero area.
    fn triangle_plane(&self, t: u32) -> Option<Plane> {
        self.triangle_body(t).plane()
    }

    /// Area of triangle `t`.
    fn triangle_area(&self, t: u32) -> Real {
        self.triangle_body(t).area()
    }

    /// Bounding box of all triangles. Unreferenced vertices are ignored.
    fn aabb(&self) -> Aabb3 {
        let mut aabb = Aabb3::empty();
        for t in 0..self.num_triangles() {
            aabb.include_aabb(&self.triangle_body(t).aabb());
        }
        aabb
    }
}

macro_rules! forward_mesh {
    () => {
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
    };
}

impl<M: Mesh + ?Sized> Mesh for &M {
    forward_mesh!();
}

impl<M: Mesh + ?Sized> Mesh for Box<M> {
    forward_mesh!();
}

impl<M: Mesh + ?Sized> Mesh for Arc<M> {
    forward_mesh!();
}
