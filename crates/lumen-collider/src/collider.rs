//! The collider: a mesh plus the tree built over it.

use std::time::Instant;

use log::{debug, warn};
use lumen_math::{Aabb3, Real, Tolerance};
use lumen_mesh::{Mesh, TriangleBody};
use rayon::prelude::*;

use crate::build::{build_tree, BuildParams};
use crate::cache::{cache_key, TreeCache};
use crate::config::ColliderConfig;
use crate::error::Result;
use crate::handler::CollisionHandler;
use crate::intersect::{intersect_ray, Bodies, Scene};
use crate::ray::Ray;
use crate::technique::Technique;
use crate::tree::Tree;

/// A triangle mesh prepared for ray queries.
///
/// The collider owns the mesh (pass a reference or an `Arc` to share it)
/// and never modifies it. Queries take `&self`, so one collider can serve
/// many threads at once.
pub struct Collider<M> {
    mesh: M,
    tree: Tree,
    bodies: Option<Vec<TriangleBody>>,
    technique: Technique,
    params: BuildParams,
    delta: Real,
    broad: Aabb3,
}

impl<M: Mesh> Collider<M> {
    /// Build a collider as described by `config`.
    ///
    /// When `config.cache_dir` is set, a tree cached for the same mesh and
    /// parameters is reused, and a freshly built one is stored. Cache
    /// problems are logged and never fail the build.
    pub fn build(mesh: M, config: &ColliderConfig) -> Result<Self> {
        config.validate()?;
        let params = config.build_params();
        let bodies = collect_bodies(&mesh);

        let cache = config
            .cache_dir
            .as_ref()
            .filter(|_| !bodies.is_empty())
            .map(TreeCache::new);
        let tree = match &cache {
            Some(cache) => {
                let key = cache_key(&mesh, config.technique, &params);
                match cache.load(key, mesh.num_triangles()) {
                    Some(tree) => tree,
                    None => {
                        let tree = build_timed(&bodies, &params, config.technique);
                        if let Err(e) = cache.store(key, &tree) {
                            warn!("could not store tree in {}: {}", cache.dir().display(), e);
                        }
                        tree
                    }
                }
            }
            None => build_timed(&bodies, &params, config.technique),
        };

        let delta = config.resolve_delta(tree.aabb());
        Ok(Self::assemble(mesh, tree, bodies, config.technique, params, delta))
    }

    /// Build a collider with a technique's preset parameters.
    pub fn with_technique(mesh: M, technique: Technique) -> Self {
        let config = ColliderConfig::with_technique(technique);
        let params = technique.params();
        let bodies = collect_bodies(&mesh);
        let tree = build_timed(&bodies, &params, technique);
        let delta = config.resolve_delta(tree.aabb());
        Self::assemble(mesh, tree, bodies, technique, params, delta)
    }

    fn assemble(
        mesh: M,
        tree: Tree,
        bodies: Vec<TriangleBody>,
        technique: Technique,
        params: BuildParams,
        delta: Real,
    ) -> Self {
        let mut broad = *tree.aabb();
        if !broad.is_empty() {
            broad.expand(delta);
        }
        Self {
            mesh,
            tree,
            bodies: params.precompute_bodies.then_some(bodies),
            technique,
            params,
            delta,
            broad,
        }
    }

    /// Find the closest triangle hit by `ray`.
    ///
    /// On a hit, `ray.distance_max` becomes the hit distance and the
    /// result fields selected by `ray.flags` are filled. On a miss the ray
    /// is left as it was.
    pub fn intersect(&self, ray: &mut Ray) -> bool {
        intersect_ray::<M, dyn CollisionHandler>(&self.scene(), ray, None)
    }

    /// Like [`Collider::intersect`], but every candidate hit is offered to
    /// `handler` first and only accepted ones count.
    pub fn intersect_with(&self, ray: &mut Ray, handler: &mut dyn CollisionHandler) -> bool {
        intersect_ray(&self.scene(), ray, Some(handler))
    }

    /// Intersect many rays in parallel; returns the number of hits.
    pub fn intersect_batch(&self, rays: &mut [Ray]) -> usize {
        rays.par_iter_mut()
            .map(|ray| usize::from(self.intersect(ray)))
            .sum()
    }

    fn scene(&self) -> Scene<'_, M> {
        Scene {
            tree: &self.tree,
            bodies: match &self.bodies {
                Some(bodies) => Bodies::Owned(bodies),
                None => Bodies::Mesh(&self.mesh),
            },
            delta: self.delta,
            broad: &self.broad,
        }
    }

    /// The mesh being queried.
    pub fn mesh(&self) -> &M {
        &self.mesh
    }

    /// Give the mesh back.
    pub fn into_mesh(self) -> M {
        self.mesh
    }

    /// The tree.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Technique the collider was built with.
    pub fn technique(&self) -> Technique {
        self.technique
    }

    /// Parameters the tree was built with.
    pub fn build_params(&self) -> &BuildParams {
        &self.params
    }

    /// Interval overlap used at splits.
    pub fn delta(&self) -> Real {
        self.delta
    }

    /// Bytes held by the tree and any copied triangle geometry, not
    /// counting the mesh.
    pub fn memory_usage(&self) -> usize {
        let bodies = self
            .bodies
            .as_ref()
            .map_or(0, |b| b.capacity() * std::mem::size_of::<TriangleBody>());
        self.tree.memory_usage() + bodies
    }
}

fn collect_bodies<M: Mesh>(mesh: &M) -> Vec<TriangleBody> {
    (0..mesh.num_triangles()).map(|t| mesh.triangle_body(t)).collect()
}

fn build_timed(bodies: &[TriangleBody], params: &BuildParams, technique: Technique) -> Tree {
    let start = Instant::now();
    let mut aabb = Aabb3::empty();
    for body in bodies {
        aabb.include_aabb(&body.aabb());
    }
    let plane_epsilon = if aabb.is_empty() {
        Tolerance::DEFAULT.linear
    } else {
        Tolerance::for_scene_size(aabb.diagonal()).linear
    };
    let tree = build_tree(bodies, params, plane_epsilon);
    debug!(
        "built {} tree over {} triangles in {:.2?}: {}",
        technique,
        bodies.len(),
        start.elapsed(),
        tree.stats()
    );
    tree
}
