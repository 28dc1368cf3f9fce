//! Error types for the map layer.

use thiserror::Error;

/// Result type for rendering-surface operations.
pub type MapResult<T> = Result<T, MapError>;

/// Errors raised by a rendering surface.
///
/// The layer manager checks for existing sources and layers before touching
/// them, so these only surface when something else mutated the surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    #[error("source already exists: {0}")]
    DuplicateSource(String),

    #[error("layer already exists: {0}")]
    DuplicateLayer(String),

    #[error("unknown source: {0}")]
    UnknownSource(String),

    #[error("unknown layer: {0}")]
    UnknownLayer(String),

    /// The surface runtime rejected the call.
    #[error("surface error: {0}")]
    Surface(String),
}
