#![warn(missing_docs)]

//! Ray queries against triangle meshes.
//!
//! A [`Collider`] builds a hybrid tree over a [`lumen_mesh::Mesh`]: inner
//! nodes split space either with an axis-aligned plane (kd) or with the
//! plane of one of the triangles (BSP), leaves hold short triangle lists.
//! Queries walk the tree front to back and return the closest hit within
//! the ray's distance interval.
//!
//! # Example
//!
//! ```ignore
//! use lumen_collider::{Collider, Ray, Technique};
//! use lumen_math::Vec3;
//! use lumen_mesh::shapes;
//!
//! let sphere = shapes::uv_sphere(1.0, 32, 16);
//! let collider = Collider::with_technique(sphere.as_mesh()?, Technique::BspFast);
//! let mut ray = Ray::new(Vec3::new(0.0, 0.0, 5.0), -Vec3::z());
//! if collider.intersect(&mut ray) {
//!     println!("hit triangle {:?} at {}", ray.hit_triangle, ray.hit_distance);
//! }
//! ```
//!
//! Hit triangles are numbered as the mesh reports them; filters translate
//! them back to the caller's buffers through
//! [`lumen_mesh::Mesh::pre_import_triangle`].

mod build;
pub mod cache;
mod collider;
mod config;
pub mod error;
mod handler;
mod intersect;
mod ray;
mod technique;
pub mod tree;
mod triangle;

pub use build::{build_tree, BuildParams};
pub use cache::{cache_key, TreeCache, CACHE_VERSION};
pub use collider::Collider;
pub use config::ColliderConfig;
pub use error::{ColliderError, Result};
pub use handler::{CollisionHandler, FrontSideOnly, SkipTriangle};
pub use ray::{Ray, RayFlags};
pub use technique::Technique;
pub use tree::{ListKind, Node, NodeId, Tree, TreeStats, TriangleRange};
pub use triangle::{intersect_triangle, TriangleHit};
