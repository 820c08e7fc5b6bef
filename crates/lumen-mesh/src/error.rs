//! Error types for mesh construction and access.

use thiserror::Error;

/// Errors raised when a mesh is built from invalid buffers or queried with
/// an invalid index.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MeshError {
    /// Vertex stride cannot hold three packed floats.
    #[error("vertex stride {stride} is smaller than {min} bytes")]
    InvalidStride {
        /// Stride supplied by the caller.
        stride: usize,
        /// Smallest usable stride.
        min: usize,
    },

    /// Vertex buffer is shorter than `count` strided vertices.
    #[error("vertex buffer holds {actual} bytes, {needed} needed")]
    VertexBufferTooSmall {
        /// Bytes required.
        needed: usize,
        /// Bytes supplied.
        actual: usize,
    },

    /// A flat float buffer is not a whole number of xyz triples.
    #[error("flat vertex buffer length {0} is not a multiple of 3")]
    RaggedVertices(usize),

    /// Triangle list element count is not a multiple of 3.
    #[error("triangle list has {0} elements, not a multiple of 3")]
    RaggedTriangleList(usize),

    /// Triangle strip with one or two elements.
    #[error("triangle strip needs at least 3 elements, got {0}")]
    StripTooShort(usize),

    /// More elements than 32-bit indices can address.
    #[error("{0} elements exceed the 32-bit index range")]
    TooManyElements(usize),

    /// An index buffer entry references a vertex that does not exist.
    #[error("index buffer entry {position} references vertex {index}, mesh has {num_vertices}")]
    IndexOutOfRange {
        /// Position within the index buffer.
        position: usize,
        /// Offending vertex index.
        index: u32,
        /// Number of vertices in the mesh.
        num_vertices: u32,
    },

    /// Triangle index outside `0..num_triangles`.
    #[error("triangle {index} out of range, mesh has {count}")]
    TriangleOutOfRange {
        /// Requested triangle.
        index: u32,
        /// Number of triangles.
        count: u32,
    },

    /// Vertex index outside `0..num_vertices`.
    #[error("vertex {index} out of range, mesh has {count}")]
    VertexOutOfRange {
        /// Requested vertex.
        index: u32,
        /// Number of vertices.
        count: u32,
    },

    /// Pre-import/post-import translation does not round-trip.
    #[error("inconsistent index mapping: {0}")]
    Inconsistent(String),
}

/// Result type for mesh operations.
pub type Result<T> = std::result::Result<T, MeshError>;
