//! Named build presets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::build::BuildParams;
use crate::error::ColliderError;

/// Trade-off between build time, memory and query speed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Technique {
    /// No tree: every query tests every triangle.
    Linear,
    /// Deepest tree with small leaves; slowest build, fastest queries.
    BspFastest,
    /// Balanced default.
    #[default]
    BspFast,
    /// Larger leaves, triangle geometry read from the mesh.
    BspCompact,
    /// Smallest tree.
    BspLeast,
}

impl Technique {
    /// Every technique, `Linear` first.
    pub const ALL: [Technique; 5] = [
        Technique::Linear,
        Technique::BspFastest,
        Technique::BspFast,
        Technique::BspCompact,
        Technique::BspLeast,
    ];

    /// Name used in config files and on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Technique::Linear => "linear",
            Technique::BspFastest => "bsp_fastest",
            Technique::BspFast => "bsp_fast",
            Technique::BspCompact => "bsp_compact",
            Technique::BspLeast => "bsp_least",
        }
    }

    /// Builder parameters for this technique.
    pub fn params(self) -> BuildParams {
        match self {
            Technique::Linear => BuildParams::linear(),
            Technique::BspFastest => BuildParams {
                max_leaf_triangles: 2,
                max_depth: 48,
                kd_candidates: 16,
                bsp_candidates: 16,
                bsp_min_triangles: 64,
                traversal_cost: 0.3,
                ..BuildParams::default()
            },
            Technique::BspFast => BuildParams::default(),
            Technique::BspCompact => BuildParams {
                max_leaf_triangles: 8,
                max_depth: 32,
                kd_candidates: 6,
                bsp_candidates: 4,
                bsp_min_triangles: 256,
                traversal_cost: 1.0,
                precompute_bodies: false,
                ..BuildParams::default()
            },
            Technique::BspLeast => BuildParams {
                max_leaf_triangles: 16,
                max_depth: 24,
                kd_candidates: 4,
                bsp_candidates: 2,
                bsp_min_triangles: 512,
                traversal_cost: 2.0,
                precompute_bodies: false,
                ..BuildParams::default()
            },
        }
    }
}

impl fmt::Display for Technique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Technique {
    type Err = ColliderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Technique::ALL
            .into_iter()
            .find(|t| t.name() == wanted)
            .ok_or_else(|| ColliderError::InvalidConfig(format!("unknown technique '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        for technique in Technique::ALL {
            assert_eq!(technique.name().parse::<Technique>().unwrap(), technique);
        }
        assert_eq!("BSP-Compact".parse::<Technique>().unwrap(), Technique::BspCompact);
        assert!("octree".parse::<Technique>().is_err());
    }

    #[test]
    fn test_presets_are_valid() {
        for technique in Technique::ALL {
            technique.params().validate().unwrap();
        }
        assert!(!Technique::Linear.params().allow_kd);
        assert!(Technique::BspFastest.params().precompute_bodies);
        assert!(!Technique::BspLeast.params().precompute_bodies);
    }
}
