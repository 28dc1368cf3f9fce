use cityview_model::{
    Attribute, Entity, Geometry, extract_value, find_primary_geo_attribute, is_geo_property,
    list_attribute_names,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::{BoundingBox, bounding_box};

/// A GeoJSON feature built from one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Feature")]
pub struct Feature {
    /// The entity id.
    pub id: String,
    pub geometry: Geometry,
    /// `id`, `type` and every non-geo attribute, unwrapped.
    pub properties: Map<String, Value>,
}

impl Feature {
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn property_str(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(Value::as_str)
    }
}

/// A GeoJSON feature collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "FeatureCollection")]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }

    /// `[minLng, minLat, maxLng, maxLat]` over every feature, `None` when empty.
    pub fn bounds(&self) -> Option<BoundingBox> {
        bounding_box(self)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl<'a> IntoIterator for &'a FeatureCollection {
    type Item = &'a Feature;
    type IntoIter = std::slice::Iter<'a, Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}

/// Reads the geometry of `attribute` (or of the primary geo attribute when
/// `None`). The attribute must be a GeoProperty with a well-formed value.
pub fn extract_geometry(entity: &Entity, attribute: Option<&str>) -> Option<Geometry> {
    let name = match attribute.map(str::trim).filter(|a| !a.is_empty()) {
        Some(name) => name,
        None => find_primary_geo_attribute(entity)?,
    };
    let raw = entity.attribute(name)?;
    if !is_geo_property(raw) {
        return None;
    }
    Attribute::classify(raw).geometry()
}

/// Feature properties: `id`, `type`, then every attribute unwrapped.
/// GeoProperties are left out when `exclude_geo` is set.
pub fn feature_properties(entity: &Entity, exclude_geo: bool) -> Map<String, Value> {
    let mut properties = Map::new();
    properties.insert("id".into(), Value::String(entity.id.clone()));
    properties.insert("type".into(), Value::String(entity.entity_type.clone()));

    for name in list_attribute_names(entity) {
        let raw = &entity.attributes[name];
        if exclude_geo && is_geo_property(raw) {
            continue;
        }
        properties.insert(name.to_string(), extract_value(raw));
    }
    properties
}

/// Converts one entity, or returns `None` when it has no usable geometry.
pub fn entity_to_feature(entity: &Entity, location_attribute: Option<&str>) -> Option<Feature> {
    let Some(geometry) = extract_geometry(entity, location_attribute) else {
        debug!(entity_id = %entity.id, "entity has no usable geometry, skipping");
        return None;
    };
    Some(Feature {
        id: entity.id.clone(),
        geometry,
        properties: feature_properties(entity, true),
    })
}

/// Converts every entity that has a usable geometry.
pub fn entities_to_feature_collection(
    entities: &[Entity],
    location_attribute: Option<&str>,
) -> FeatureCollection {
    FeatureCollection::new(
        entities
            .iter()
            .filter_map(|e| entity_to_feature(e, location_attribute))
            .collect(),
    )
}
