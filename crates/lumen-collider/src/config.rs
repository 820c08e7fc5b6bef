//! Collider configuration, loadable from TOML.

use std::path::{Path, PathBuf};

use lumen_math::{Aabb3, Real};
use serde::{Deserialize, Serialize};

use crate::build::BuildParams;
use crate::error::{ColliderError, Result};
use crate::technique::Technique;

/// Relative size of the default split epsilon.
const DELTA_SCALE: Real = 1e-5;
/// Smallest default split epsilon.
const DELTA_FLOOR: Real = 1e-6;

/// How a [`crate::Collider`] is built.
///
/// ```toml
/// technique = "bsp_compact"
/// delta = 0.0001
/// cache_dir = "/tmp/lumen"
///
/// [build]
/// max_leaf_triangles = 6
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColliderConfig {
    /// Build preset.
    pub technique: Technique,
    /// Distance by which traversal intervals overlap at a split, absolute.
    /// Defaults to a fraction of the mesh's bounding-box diagonal.
    pub delta: Option<Real>,
    /// Directory for cached trees; no caching when absent.
    pub cache_dir: Option<PathBuf>,
    /// Replaces the technique's preset parameters.
    pub build: Option<BuildParams>,
}

impl ColliderConfig {
    /// Default configuration with the given technique.
    pub fn with_technique(technique: Technique) -> Self {
        Self {
            technique,
            ..Self::default()
        }
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if let Some(delta) = self.delta {
            if !(delta > 0.0 && delta.is_finite()) {
                return Err(ColliderError::InvalidConfig(
                    "delta must be positive and finite".into(),
                ));
            }
        }
        self.build_params().validate()
    }

    /// Parameters the builder will use.
    pub fn build_params(&self) -> BuildParams {
        self.build.unwrap_or_else(|| self.technique.params())
    }

    /// Split epsilon for a mesh with the given bounds.
    pub fn resolve_delta(&self, aabb: &Aabb3) -> Real {
        self.delta
            .unwrap_or_else(|| (aabb.diagonal() * DELTA_SCALE).max(DELTA_FLOOR))
    }
}
