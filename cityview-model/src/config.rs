//! Configuration records handed to the core by the document store.
//!
//! These are read-only to the core: a new render pass takes a fresh copy.

use crate::{Entity, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default JSON-LD context when a data model does not name its own.
pub const NGSI_LD_CORE_CONTEXT: &str =
    "https://uri.etsi.org/ngsi-ld/v1/ngsi-ld-core-context-v1.8.jsonld";

pub const DEFAULT_MARKER_COLOR: &str = "#3b82f6";
pub const DEFAULT_MARKER_SIZE: f64 = 8.0;
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60;

/// A broker connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub broker_url: String,
    /// Tenant (service) header values this source is scoped to.
    #[serde(default)]
    pub tenants: Vec<String>,
    /// Hierarchical service paths (e.g. `/city/sensors`).
    #[serde(default = "default_service_paths")]
    pub service_paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

fn default_service_paths() -> Vec<String> {
    vec!["/".to_string()]
}

impl Source {
    pub fn new(broker_url: impl Into<String>) -> Self {
        Self {
            broker_url: broker_url.into(),
            tenants: Vec::new(),
            service_paths: default_service_paths(),
            proxy_url: None,
            auth_token: None,
        }
    }

    /// Endpoint for read-only traffic: the proxy when one is configured.
    pub fn read_url(&self) -> &str {
        self.proxy_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(&self.broker_url)
    }
}

/// Marker icon shapes. `Circle` renders as a plain circle layer; every other
/// shape is drawn from a colorized vector icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IconShape {
    #[default]
    Circle,
    Square,
    Triangle,
    Star,
    Pin,
}

impl IconShape {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Circle => "circle",
            Self::Square => "square",
            Self::Triangle => "triangle",
            Self::Star => "star",
            Self::Pin => "pin",
        }
    }
}

/// Marker styling for one layer. Unset fields fall back to the defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarkerStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<IconShape>,
}

impl MarkerStyle {
    pub fn color(&self) -> &str {
        self.color
            .as_deref()
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_MARKER_COLOR)
    }

    pub fn size(&self) -> f64 {
        self.size.filter(|s| *s > 0.0).unwrap_or(DEFAULT_MARKER_SIZE)
    }

    pub fn icon(&self) -> IconShape {
        self.icon.unwrap_or_default()
    }

    /// Overlays the fields set in `other`.
    pub fn merge(&mut self, other: &MarkerStyle) {
        if other.color.is_some() {
            self.color.clone_from(&other.color);
        }
        if other.size.is_some() {
            self.size = other.size;
        }
        if other.icon.is_some() {
            self.icon = other.icon;
        }
    }
}

/// One map layer as configured in the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerConfig {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entity_ids: Vec<String>,
    pub broker_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_attribute: Option<String>,
    #[serde(default)]
    pub style: MarkerStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popup_template: Option<String>,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_seconds: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Entities preloaded by the document store. A layer carrying them is
    /// rendered as-is and never polled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_data: Option<Vec<Entity>>,
}

fn default_refresh_interval() -> u64 {
    DEFAULT_REFRESH_INTERVAL_SECS
}

fn default_enabled() -> bool {
    true
}

impl LayerConfig {
    /// A layer querying every entity of `entity_type`.
    pub fn for_type(
        id: impl Into<String>,
        name: impl Into<String>,
        broker_url: impl Into<String>,
        entity_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            entity_type: Some(entity_type.into()),
            entity_ids: Vec::new(),
            broker_url: broker_url.into(),
            tenant: None,
            service_path: None,
            context_url: None,
            location_attribute: None,
            style: MarkerStyle::default(),
            popup_template: None,
            refresh_interval_seconds: DEFAULT_REFRESH_INTERVAL_SECS,
            enabled: true,
            entity_data: None,
        }
    }

    /// The explicit location attribute; blank means auto-detect.
    pub fn location_attribute(&self) -> Option<&str> {
        self.location_attribute
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn context_url(&self) -> &str {
        self.context_url
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(NGSI_LD_CORE_CONTEXT)
    }

    pub fn popup_template(&self) -> Option<&str> {
        self.popup_template.as_deref().filter(|t| !t.trim().is_empty())
    }

    /// True when the layer renders preloaded data instead of polling.
    pub fn has_preloaded_data(&self) -> bool {
        self.entity_data.as_ref().is_some_and(|d| !d.is_empty())
    }
}

/// Initial camera and base style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MapSettings {
    pub center_lng: f64,
    pub center_lat: f64,
    pub zoom: f64,
    pub style: String,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            center_lng: 105.7718,
            center_lat: 10.0299,
            zoom: 12.0,
            style: "streets-v12".to_string(),
        }
    }
}

/// A full map document: camera settings plus its layers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewerConfig {
    #[serde(default)]
    pub map: MapSettings,
    #[serde(default)]
    pub layers: Vec<LayerConfig>,
}

impl ViewerConfig {
    /// Parses and validates a map document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a map document from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Layer ids must be unique and every layer needs a broker URL and a target
    /// (unless it carries preloaded data).
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for layer in &self.layers {
            if !seen.insert(layer.id.as_str()) {
                return Err(Error::Invalid(format!("duplicate layer id '{}'", layer.id)));
            }
            if layer.has_preloaded_data() {
                continue;
            }
            if layer.broker_url.trim().is_empty() {
                return Err(Error::Invalid(format!("layer '{}' has no broker URL", layer.id)));
            }
            if layer.entity_type.is_none() && layer.entity_ids.is_empty() {
                return Err(Error::Invalid(format!(
                    "layer '{}' needs an entity type or entity ids",
                    layer.id
                )));
            }
        }
        Ok(())
    }

    /// Layers that should be on the map right now.
    pub fn enabled_layers(&self) -> impl Iterator<Item = &LayerConfig> {
        self.layers.iter().filter(|l| l.enabled)
    }
}
