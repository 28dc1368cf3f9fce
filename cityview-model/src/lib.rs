//! Core data model for CityView.
//!
//! Defines the types every other crate speaks:
//! - [`Entity`]: a context-broker entity (URN id, short type, raw attributes)
//! - [`Attribute`]: a borrowed, classified view of one attribute envelope
//! - [`Geometry`]: GeoJSON-shaped geometry, coordinates in `[lng, lat]` order
//! - [`LayerConfig`], [`Source`], [`ViewerConfig`]: configuration records
//!   supplied by the external document store
//! - [`SyncStatus`]: broker sync bookkeeping written back to that store
//!
//! The attribute helpers in [`attribute`] are pure and total: every attribute
//! shape resolves to a plain value, and unknown shapes pass through unchanged.

pub mod attribute;
mod config;
mod entity;
mod geometry;
mod sync_status;

pub use attribute::{
    Attribute, AttributeKind, AttributeMetadata, AttributeSelection, RESERVED_KEYS,
    extract_coordinates, extract_value, filter_attributes, find_geo_attributes,
    find_primary_geo_attribute, format_attribute_name, is_geo_property,
    list_attribute_names, normalized_attributes,
};
pub use config::{
    DEFAULT_MARKER_COLOR, DEFAULT_MARKER_SIZE, DEFAULT_REFRESH_INTERVAL_SECS, IconShape,
    LayerConfig, MapSettings, MarkerStyle, NGSI_LD_CORE_CONTEXT, Source, ViewerConfig,
};
pub use entity::Entity;
pub use geometry::{Geometry, GeometryKind, LngLat, Position};
pub use sync_status::{SyncState, SyncStatus};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading configuration records.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
