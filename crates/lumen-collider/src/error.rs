//! Error types for collider construction.

use lumen_mesh::MeshError;
use thiserror::Error;

/// Errors that can occur while configuring or building a collider.
///
/// Queries never fail; only construction and configuration do.
#[derive(Error, Debug)]
pub enum ColliderError {
    /// The mesh rejected a request.
    #[error(transparent)]
    Mesh(#[from] MeshError),

    /// Reading or writing the tree cache failed.
    #[error("cache i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// Tree cache file could not be encoded or decoded.
    #[error("cache format error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file could not be parsed.
    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration values are out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// A cached tree does not describe the mesh it was loaded for.
    #[error("corrupt tree cache: {0}")]
    CorruptCache(String),
}

/// Result type for collider operations.
pub type Result<T> = std::result::Result<T, ColliderError>;
