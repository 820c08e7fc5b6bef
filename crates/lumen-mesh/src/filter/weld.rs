//! Vertex welding.

use std::collections::HashMap;

use lumen_math::{Real, Vec3};

use crate::{Mesh, PreImportNumber, Triangle, TriangleBody};

/// Merges vertices that lie within `max_distance` of each other.
///
/// The first vertex (in inner order) of each cluster becomes its
/// representative; post-import vertices are numbered in that order.
/// Triangles keep their numbering. With `max_distance == 0` only exactly
/// equal positions are merged.
#[derive(Debug, Clone)]
pub struct WeldFilter<M> {
    inner: M,
    /// Post-import vertex -> representative inner vertex.
    representative: Vec<u32>,
    /// Inner vertex -> post-import vertex.
    welded: Vec<u32>,
}

impl<M: Mesh> WeldFilter<M> {
    /// Wrap `inner`, taking ownership of it (pass `&mesh` to borrow).
    pub fn new(inner: M, max_distance: Real) -> Self {
        let positions: Vec<Vec3> = (0..inner.num_vertices()).map(|v| inner.vertex(v)).collect();
        let (representative, welded) = if max_distance > 0.0 {
            weld_within(&positions, max_distance)
        } else {
            weld_exact(&positions)
        };
        log::debug!(
            "weld filter merged {} vertices into {}",
            positions.len(),
            representative.len()
        );
        Self {
            inner,
            representative,
            welded,
        }
    }

    /// The wrapped mesh.
    pub fn inner(&self) -> &M {
        &self.inner
    }
}

/// Merge bit-identical positions (`-0.0` equals `0.0`).
fn weld_exact(positions: &[Vec3]) -> (Vec<u32>, Vec<u32>) {
    let mut seen: HashMap<[u32; 3], u32> = HashMap::with_capacity(positions.len());
    let mut representative = Vec::new();
    let welded = positions
        .iter()
        .enumerate()
        .map(|(v, p)| {
            let key = [(p.x + 0.0).to_bits(), (p.y + 0.0).to_bits(), (p.z + 0.0).to_bits()];
            *seen.entry(key).or_insert_with(|| {
                representative.push(v as u32);
                representative.len() as u32 - 1
            })
        })
        .collect();
    (representative, welded)
}

/// Merge positions closer than `max_distance` using a hash grid with cells
/// of that size; only the 27 neighbouring cells need to be searched.
fn weld_within(positions: &[Vec3], max_distance: Real) -> (Vec<u32>, Vec<u32>) {
    let cell_of = |p: &Vec3| -> [i64; 3] {
        [
            (p.x / max_distance).floor() as i64,
            (p.y / max_distance).floor() as i64,
            (p.z / max_distance).floor() as i64,
        ]
    };
    let mut grid: HashMap<[i64; 3], Vec<u32>> = HashMap::new();
    let mut representative: Vec<u32> = Vec::new();
    let mut welded = Vec::with_capacity(positions.len());

    for (v, p) in positions.iter().enumerate() {
        let cell = cell_of(p);
        let mut found = None;
        'search: for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(candidates) = neighbour(cell, [dx, dy, dz]).and_then(|key| grid.get(&key))
                    else {
                        continue;
                    };
                    for &post in candidates {
                        let rep = representative[post as usize] as usize;
                        if (positions[rep] - p).norm() <= max_distance {
                            found = Some(post);
                            break 'search;
                        }
                    }
                }
            }
        }
        let post = found.unwrap_or_else(|| {
            representative.push(v as u32);
            let post = representative.len() as u32 - 1;
            grid.entry(cell).or_default().push(post);
            post
        });
        welded.push(post);
    }
    (representative, welded)
}

/// Cell `cell + offset`, `None` past the ends of the key range. Cells of
/// very distant points saturate there.
fn neighbour(cell: [i64; 3], offset: [i64; 3]) -> Option<[i64; 3]> {
    Some([
        cell[0].checked_add(offset[0])?,
        cell[1].checked_add(offset[1])?,
        cell[2].checked_add(offset[2])?,
    ])
}

impl<M: Mesh> Mesh for WeldFilter<M> {
    fn num_vertices(&self) -> u32 {
        self.representative.len() as u32
    }

    fn vertex(&self, v: u32) -> Vec3 {
        self.inner.vertex(self.representative[v as usize])
    }

    fn num_triangles(&self) -> u32 {
        self.inner.num_triangles()
    }

    fn triangle(&self, t: u32) -> Triangle {
        self.inner.triangle(t).map(|v| self.welded[v as usize])
    }

    fn num_objects(&self) -> u32 {
        self.inner.num_objects()
    }

    fn triangle_body(&self, t: u32) -> TriangleBody {
        let [a, b, c] = self.triangle(t);
        TriangleBody::from_vertices(&self.vertex(a), &self.vertex(b), &self.vertex(c))
    }

    fn pre_import_triangle(&self, post_triangle: u32) -> Option<PreImportNumber> {
        self.inner.pre_import_triangle(post_triangle)
    }

    fn post_import_triangle(&self, pre_triangle: PreImportNumber) -> Option<u32> {
        self.inner.post_import_triangle(pre_triangle)
    }

    fn pre_import_vertex(&self, post_vertex: u32, post_triangle: u32) -> Option<PreImportNumber> {
        let representative = *self.representative.get(post_vertex as usize)?;
        // Prefer the corner the triangle actually uses: several inner
        // vertices share this post-import vertex.
        let inner = if post_triangle < self.inner.num_triangles() {
            self.inner
                .triangle(post_triangle)
                .into_iter()
                .find(|&v| self.welded[v as usize] == post_vertex)
                .unwrap_or(representative)
        } else {
            representative
        };
        self.inner.pre_import_vertex(inner, post_triangle)
    }

    fn post_import_vertex(
        &self,
        pre_vertex: PreImportNumber,
        pre_triangle: PreImportNumber,
    ) -> Option<u32> {
        let inner = self.inner.post_import_vertex(pre_vertex, pre_triangle)?;
        self.welded.get(inner as usize).copied()
    }
}
