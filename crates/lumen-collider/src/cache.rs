//! On-disk cache of built trees.
//!
//! Trees are stored as JSON, one file per mesh, named after a hash of the
//! mesh geometry, the technique and the build parameters. Any problem with
//! a cached file turns into a rebuild; the cache never makes a build fail.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use lumen_mesh::Mesh;
use serde::{Deserialize, Serialize};

use crate::build::BuildParams;
use crate::error::{ColliderError, Result};
use crate::technique::Technique;
use crate::tree::Tree;

/// Format version; bump whenever the tree layout or builder changes.
pub const CACHE_VERSION: u32 = 2;

const EXTENSION: &str = "lumen-tree";

#[derive(Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    key: u64,
    num_triangles: u32,
    tree: Tree,
}

/// Content key of a mesh built with the given technique and parameters.
///
/// The key is FNV-1a over the little-endian bytes of the inputs, so it is
/// the same on every platform and toolchain.
pub fn cache_key(mesh: &dyn Mesh, technique: Technique, params: &BuildParams) -> u64 {
    let mut key = KeyHasher::new();
    key.u32(CACHE_VERSION);
    let name = technique.name();
    key.u32(name.len() as u32);
    key.bytes(name.as_bytes());

    let BuildParams {
        max_leaf_triangles,
        max_depth,
        kd_candidates,
        bsp_candidates,
        bsp_min_triangles,
        allow_kd,
        allow_bsp,
        traversal_cost,
        precompute_bodies: _,
    } = *params;
    for value in [max_leaf_triangles, max_depth, kd_candidates, bsp_candidates, bsp_min_triangles] {
        key.u32(value);
    }
    key.bytes(&[u8::from(allow_kd), u8::from(allow_bsp)]);
    key.u32(traversal_cost.to_bits());

    key.u32(mesh.num_vertices());
    key.u32(mesh.num_triangles());
    for v in 0..mesh.num_vertices() {
        for c in mesh.vertex(v).iter() {
            key.u32(c.to_bits());
        }
    }
    for t in 0..mesh.num_triangles() {
        for v in mesh.triangle(t) {
            key.u32(v);
        }
    }
    key.finish()
}

/// 64-bit FNV-1a.
struct KeyHasher(u64);

impl KeyHasher {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    fn new() -> Self {
        Self(Self::OFFSET)
    }

    fn bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 = (self.0 ^ u64::from(b)).wrapping_mul(Self::PRIME);
        }
    }

    fn u32(&mut self, value: u32) {
        self.bytes(&value.to_le_bytes());
    }

    fn finish(&self) -> u64 {
        self.0
    }
}

/// A directory of cached trees.
#[derive(Debug, Clone)]
pub struct TreeCache {
    dir: PathBuf,
}

impl TreeCache {
    /// Cache in `dir`; the directory is created on first store.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the tree for `key`.
    pub fn path(&self, key: u64) -> PathBuf {
        self.dir.join(format!("{key:016x}.{EXTENSION}"))
    }

    /// Cached tree for `key`, if present and sound.
    ///
    /// A missing file is a silent miss. Unreadable, corrupt or stale files
    /// are logged and reported as a miss.
    pub fn load(&self, key: u64, num_triangles: u32) -> Option<Tree> {
        let path = self.path(key);
        if !path.exists() {
            return None;
        }
        match self.read(&path, key, num_triangles) {
            Ok(tree) => {
                info!("loaded tree from cache {}", path.display());
                Some(tree)
            }
            Err(e) => {
                warn!("ignoring tree cache {}: {}", path.display(), e);
                None
            }
        }
    }

    fn read(&self, path: &Path, key: u64, num_triangles: u32) -> Result<Tree> {
        let text = fs::read_to_string(path)?;
        let file: CacheFile = serde_json::from_str(&text)?;
        if file.version != CACHE_VERSION {
            return Err(ColliderError::CorruptCache(format!(
                "version {} (expected {})",
                file.version, CACHE_VERSION
            )));
        }
        if file.key != key || file.num_triangles != num_triangles {
            return Err(ColliderError::CorruptCache(
                "file describes a different mesh".into(),
            ));
        }
        file.tree
            .validate(num_triangles)
            .map_err(ColliderError::CorruptCache)?;
        Ok(file.tree)
    }

    /// Write `tree` under `key`.
    ///
    /// Writes to a temporary file first so that concurrent readers never
    /// see a partial file.
    pub fn store(&self, key: u64, tree: &Tree) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let file = CacheFile {
            version: CACHE_VERSION,
            key,
            num_triangles: tree.num_triangles(),
            tree: tree.clone(),
        };
        let path = self.path(key);
        let tmp = path.with_extension(format!("{EXTENSION}.tmp{}", std::process::id()));
        fs::write(&tmp, serde_json::to_vec(&file)?)?;
        fs::rename(&tmp, &path)?;
        info!("stored tree in cache {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::build_tree;
    use lumen_mesh::{shapes, VertexBuffer, VertexBufferMesh};

    fn tree_for(mesh: &dyn Mesh) -> Tree {
        let bodies: Vec<_> = (0..mesh.num_triangles()).map(|t| mesh.triangle_body(t)).collect();
        build_tree(&bodies, &BuildParams::default(), 1e-6)
    }

    #[test]
    fn test_key_depends_on_inputs() {
        let a = shapes::uv_sphere(1.0, 8, 4);
        let b = shapes::uv_sphere(1.5, 8, 4);
        let (ma, mb) = (a.as_mesh().unwrap(), b.as_mesh().unwrap());
        let params = BuildParams::default();
        let key = cache_key(&ma, Technique::BspFast, &params);
        assert_eq!(key, cache_key(&ma, Technique::BspFast, &params));
        assert_ne!(key, cache_key(&mb, Technique::BspFast, &params));
        assert_ne!(key, cache_key(&ma, Technique::BspLeast, &params));
        let deeper = BuildParams {
            max_depth: 41,
            ..params
        };
        assert_ne!(key, cache_key(&ma, Technique::BspFast, &deeper));
    }

    #[test]
    fn test_key_is_fixed_for_known_mesh() {
        let points = [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let mesh = VertexBufferMesh::triangle_list(VertexBuffer::from_points(&points).unwrap())
            .unwrap();
        let key = cache_key(&mesh, Technique::BspFast, &BuildParams::default());
        assert_eq!(key, 0xf11e_4b14_6e89_0795);
        let mut empty = KeyHasher::new();
        empty.bytes(&[]);
        assert_eq!(empty.finish(), KeyHasher::OFFSET);
    }

    #[test]
    fn test_store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TreeCache::new(dir.path().join("trees"));
        let shape = shapes::uv_sphere(1.0, 12, 6);
        let mesh = shape.as_mesh().unwrap();
        let tree = tree_for(&mesh);
        let key = cache_key(&mesh, Technique::BspFast, &BuildParams::default());

        assert!(cache.load(key, mesh.num_triangles()).is_none());
        cache.store(key, &tree).unwrap();
        assert!(cache.path(key).exists());
        let loaded = cache.load(key, mesh.num_triangles()).unwrap();
        assert_eq!(loaded.stats(), tree.stats());
        assert_eq!(loaded.root(), tree.root());
        assert!(cache.load(key, mesh.num_triangles() + 1).is_none());
    }

    #[test]
    fn test_corrupt_and_stale_files_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TreeCache::new(dir.path());
        fs::write(cache.path(7), b"{ not json").unwrap();
        assert!(cache.load(7, 0).is_none());

        let shape = shapes::grid(2, 1.0);
        let mesh = shape.as_mesh().unwrap();
        let stale = serde_json::json!({
            "version": CACHE_VERSION + 1,
            "key": 8,
            "num_triangles": mesh.num_triangles(),
            "tree": tree_for(&mesh),
        });
        fs::write(cache.path(8), stale.to_string()).unwrap();
        assert!(cache.load(8, mesh.num_triangles()).is_none());
    }

    #[test]
    fn test_store_into_unwritable_location_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"").unwrap();
        let cache = TreeCache::new(blocker.join("sub"));
        assert!(cache.store(1, &Tree::empty()).is_err());
    }
}
