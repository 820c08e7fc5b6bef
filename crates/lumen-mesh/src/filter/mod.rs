//! Mesh filters: wrappers that renumber the mesh they own or borrow.
//!
//! Each filter takes its inner mesh by value. Pass a reference (`&mesh`)
//! to borrow instead of own; the blanket `Mesh` impls for `&M`, `Box<M>`
//! and `Arc<M>` make every combination work. Filters are immutable after
//! construction and translate indices one step each, so stacks of filters
//! compose transparently.

mod degenerate;
mod multi;
mod weld;

pub use degenerate::DegenerateFilter;
pub use multi::{MergedMesh, MultiMesh};
pub use weld::WeldFilter;

/// Stack the usual import filters: weld vertices closer than
/// `max_distance`, then drop triangles that became degenerate.
pub fn optimize<M: crate::Mesh>(mesh: M, max_distance: lumen_math::Real) -> DegenerateFilter<WeldFilter<M>> {
    DegenerateFilter::new(WeldFilter::new(mesh, max_distance))
}
