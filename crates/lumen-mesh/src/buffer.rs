//! Borrowed views of caller-owned vertex and index buffers.

use bytemuck::Pod;
use lumen_math::Vec3;

use crate::error::{MeshError, Result};

const POSITION_BYTES: usize = 3 * std::mem::size_of::<f32>();

/// Strided view of packed `f32` xyz positions inside a byte buffer.
///
/// The buffer is borrowed: it must outlive every mesh built on top of it.
/// Positions need not be aligned; interleaved vertex formats are read by
/// giving the full vertex size as `stride` and slicing the buffer so that
/// it starts at the position attribute.
#[derive(Debug, Clone, Copy)]
pub struct VertexBuffer<'a> {
    bytes: &'a [u8],
    stride: usize,
    count: u32,
}

impl<'a> VertexBuffer<'a> {
    /// View `count` positions spaced `stride` bytes apart.
    pub fn new(bytes: &'a [u8], stride: usize, count: usize) -> Result<Self> {
        if stride < POSITION_BYTES {
            return Err(MeshError::InvalidStride {
                stride,
                min: POSITION_BYTES,
            });
        }
        let count32 = u32::try_from(count).map_err(|_| MeshError::TooManyElements(count))?;
        let needed = match count {
            0 => 0,
            n => (n - 1)
                .checked_mul(stride)
                .and_then(|b| b.checked_add(POSITION_BYTES))
                .ok_or(MeshError::TooManyElements(count))?,
        };
        if bytes.len() < needed {
            return Err(MeshError::VertexBufferTooSmall {
                needed,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            bytes,
            stride,
            count: count32,
        })
    }

    /// View a tightly packed array of positions.
    pub fn from_points(points: &'a [[f32; 3]]) -> Result<Self> {
        Self::new(bytemuck::cast_slice(points), POSITION_BYTES, points.len())
    }

    /// View a flat `[x0, y0, z0, x1, ...]` array.
    pub fn from_flat(coords: &'a [f32]) -> Result<Self> {
        if coords.len() % 3 != 0 {
            return Err(MeshError::RaggedVertices(coords.len()));
        }
        Self::new(bytemuck::cast_slice(coords), POSITION_BYTES, coords.len() / 3)
    }

    /// Number of positions.
    #[inline]
    pub fn len(&self) -> u32 {
        self.count
    }

    /// True if the buffer holds no positions.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Byte distance between consecutive positions.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Position `i`. Panics if `i >= len()`.
    #[inline]
    pub fn get(&self, i: u32) -> Vec3 {
        assert!(i < self.count, "vertex {i} out of range ({})", self.count);
        let start = i as usize * self.stride;
        let xyz: [f32; 3] = bytemuck::pod_read_unaligned(&self.bytes[start..start + POSITION_BYTES]);
        Vec3::new(xyz[0], xyz[1], xyz[2])
    }
}

/// Integer types usable as index buffer entries.
pub trait MeshIndex: Pod + Send + Sync {
    /// Widen to a 32-bit vertex index.
    fn to_u32(self) -> u32;
}

impl MeshIndex for u8 {
    #[inline]
    fn to_u32(self) -> u32 {
        self.into()
    }
}

impl MeshIndex for u16 {
    #[inline]
    fn to_u32(self) -> u32 {
        self.into()
    }
}

impl MeshIndex for u32 {
    #[inline]
    fn to_u32(self) -> u32 {
        self
    }
}

/// Index buffer of caller-chosen width, for [`crate::create_mesh`].
#[derive(Debug, Clone, Copy)]
pub enum IndexBuffer<'a> {
    /// 8-bit indices.
    U8(&'a [u8]),
    /// 16-bit indices.
    U16(&'a [u16]),
    /// 32-bit indices.
    U32(&'a [u32]),
}

impl IndexBuffer<'_> {
    /// Number of entries.
    pub fn len(&self) -> usize {
        match self {
            IndexBuffer::U8(i) => i.len(),
            IndexBuffer::U16(i) => i.len(),
            IndexBuffer::U32(i) => i.len(),
        }
    }

    /// True if the buffer has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interleaved_stride() {
        // position + uv, 20 bytes per vertex
        let data: [f32; 10] = [1.0, 2.0, 3.0, 0.5, 0.5, 4.0, 5.0, 6.0, 0.0, 1.0];
        let bytes: &[u8] = bytemuck::cast_slice(&data);
        let vb = VertexBuffer::new(bytes, 20, 2).unwrap();
        assert_eq!(vb.get(0), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(vb.get(1), Vec3::new(4.0, 5.0, 6.0));
    }

    #[test]
    fn test_unaligned_offset() {
        let data: [f32; 4] = [9.0, 1.0, 2.0, 3.0];
        let bytes: &[u8] = bytemuck::cast_slice(&data);
        let vb = VertexBuffer::new(&bytes[4..], 12, 1).unwrap();
        assert_eq!(vb.get(0), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_buffer_too_small() {
        let data = [0u8; 23];
        assert_eq!(
            VertexBuffer::new(&data, 12, 2).unwrap_err(),
            MeshError::VertexBufferTooSmall {
                needed: 24,
                actual: 23
            }
        );
    }

    #[test]
    fn test_bad_stride_and_ragged() {
        assert!(matches!(
            VertexBuffer::new(&[], 8, 0),
            Err(MeshError::InvalidStride { stride: 8, .. })
        ));
        assert_eq!(
            VertexBuffer::from_flat(&[0.0; 4]).unwrap_err(),
            MeshError::RaggedVertices(4)
        );
    }

    #[test]
    #[should_panic]
    fn test_get_out_of_range_panics() {
        let points = [[0.0f32; 3]];
        VertexBuffer::from_points(&points).unwrap().get(1);
    }

    #[test]
    fn test_index_widths() {
        assert_eq!(200u8.to_u32(), 200);
        assert_eq!(60000u16.to_u32(), 60000);
        assert_eq!(IndexBuffer::U16(&[1, 2, 3]).len(), 3);
    }
}
