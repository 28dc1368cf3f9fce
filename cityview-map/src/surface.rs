//! The rendering-surface contract.
//!
//! A surface is a stateful map (Mapbox GL in the browser, or
//! [`HeadlessSurface`](crate::HeadlessSurface) in tests and the CLI) that
//! holds data sources, drawing layers, icon images and popups by string id.
//! Layer and paint definitions use the Mapbox style-spec JSON shapes.

use crate::MapResult;
use cityview_geo::{BoundingBox, FeatureCollection};
use cityview_model::LngLat;
use serde::Serialize;
use serde_json::{Map, Value};

/// Clustering settings for a point source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterOptions {
    pub cluster_max_zoom: u8,
    pub cluster_radius: u32,
}

/// A GeoJSON data source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceSpec {
    pub data: FeatureCollection,
    #[serde(flatten)]
    pub cluster: Option<ClusterOptions>,
}

impl SourceSpec {
    pub fn is_clustered(&self) -> bool {
        self.cluster.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Circle,
    Symbol,
    Fill,
    Line,
}

/// One drawing layer over a source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: LayerKind,
    pub source: String,
    /// Style-spec filter expression.
    pub filter: Value,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub paint: Map<String, Value>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub layout: Map<String, Value>,
}

/// A vector icon for the surface to rasterize and register under an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconImage {
    pub svg: String,
    pub width: u32,
    pub height: u32,
}

/// Handle to an open popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PopupId(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub struct PopupOptions {
    pub close_button: bool,
    pub close_on_click: bool,
    pub offset: f64,
    pub max_width: Option<String>,
    pub class_name: Option<String>,
}

impl PopupOptions {
    /// Lightweight popup shown while hovering a marker.
    pub fn hover() -> Self {
        Self {
            close_button: false,
            close_on_click: false,
            offset: 15.0,
            max_width: None,
            class_name: Some("ngsi-hover-popup".to_string()),
        }
    }

    /// Closeable popup opened by a click.
    pub fn detail() -> Self {
        Self {
            close_button: true,
            close_on_click: true,
            offset: 0.0,
            max_width: Some("300px".to_string()),
            class_name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Popup {
    pub lng_lat: LngLat,
    pub html: String,
    pub options: PopupOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cursor {
    #[default]
    Default,
    Pointer,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub center: LngLat,
    pub zoom: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    pub padding: f64,
    pub max_zoom: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            padding: 50.0,
            max_zoom: 15.0,
        }
    }
}

/// A stateful map the [`LayerManager`](crate::LayerManager) draws on.
///
/// All calls happen on one thread in response to refresh or pointer events.
/// The manager assumes it owns every source and layer it created.
pub trait RenderSurface {
    fn has_source(&self, id: &str) -> bool;
    fn add_source(&mut self, id: &str, spec: SourceSpec) -> MapResult<()>;
    fn set_source_data(&mut self, id: &str, data: &FeatureCollection) -> MapResult<()>;
    fn remove_source(&mut self, id: &str) -> MapResult<()>;

    fn has_layer(&self, id: &str) -> bool;
    fn add_layer(&mut self, spec: LayerSpec) -> MapResult<()>;
    fn remove_layer(&mut self, id: &str) -> MapResult<()>;
    fn set_paint_property(&mut self, layer_id: &str, name: &str, value: Value) -> MapResult<()>;
    fn set_layout_property(&mut self, layer_id: &str, name: &str, value: Value) -> MapResult<()>;

    fn has_image(&self, id: &str) -> bool;
    /// Rasterizes and registers an icon. Registering an existing id is a no-op.
    fn add_image(&mut self, id: &str, image: IconImage) -> MapResult<()>;

    fn open_popup(&mut self, popup: Popup) -> PopupId;
    fn close_popup(&mut self, id: PopupId);

    fn set_cursor(&mut self, cursor: Cursor);

    /// Zoom at which a cluster of a clustered source splits apart.
    fn cluster_expansion_zoom(&self, source_id: &str, cluster_id: u64) -> MapResult<Option<f64>>;
    fn ease_to(&mut self, camera: Camera);
    fn fit_bounds(&mut self, bounds: BoundingBox, options: FitOptions);
}
