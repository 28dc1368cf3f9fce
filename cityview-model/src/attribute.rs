//! Attribute normalization.
//!
//! Broker attributes arrive wrapped in one of three envelopes:
//! - Property: `{ "type": "Property", "value": X }`
//! - Relationship: `{ "type": "Relationship", "object": "urn:..." }`
//! - GeoProperty: `{ "type": "GeoProperty", "value": { "type": "Point", ... } }`
//!
//! or, in the simplified (`keyValues`) representation, as the bare value.
//! [`Attribute::classify`] turns any of these into a closed variant, and
//! [`extract_value`] unwraps it. Neither can fail.

use crate::{Entity, Geometry};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys that are part of the entity envelope rather than attributes.
pub const RESERVED_KEYS: [&str; 3] = ["id", "type", "@context"];

/// Conventional geo attribute names, checked in this order.
const PRIMARY_GEO_NAMES: [&str; 5] = ["location", "position", "coordinates", "geometry", "geo"];

const PROPERTY: &str = "Property";
const RELATIONSHIP: &str = "Relationship";
const GEO_PROPERTY: &str = "GeoProperty";

static NULL: Value = Value::Null;

/// Discriminant of an [`Attribute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Property,
    Relationship,
    GeoProperty,
    /// An untagged object carrying a `value` member.
    Simplified,
    /// Anything else: scalars, arrays, unrecognized objects.
    Bare,
    Null,
}

/// A classified, borrowed view over one raw attribute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Attribute<'a> {
    Property { value: &'a Value },
    Relationship { object: &'a Value },
    GeoProperty { value: &'a Value },
    Simplified { value: &'a Value },
    Bare(&'a Value),
    Null,
}

impl<'a> Attribute<'a> {
    /// Classifies a raw attribute. Total: unknown shapes become [`Attribute::Bare`].
    pub fn classify(raw: &'a Value) -> Self {
        let obj = match raw {
            Value::Null => return Self::Null,
            Value::Object(obj) => obj,
            other => return Self::Bare(other),
        };

        match (obj.get("type").and_then(Value::as_str), obj.get("value"), obj.get("object")) {
            (Some(PROPERTY), Some(value), _) => Self::Property { value },
            (Some(RELATIONSHIP), _, Some(object)) => Self::Relationship { object },
            (Some(GEO_PROPERTY), Some(value), _) => Self::GeoProperty { value },
            (_, Some(value), _) => Self::Simplified { value },
            _ => Self::Bare(raw),
        }
    }

    pub fn kind(&self) -> AttributeKind {
        match self {
            Self::Property { .. } => AttributeKind::Property,
            Self::Relationship { .. } => AttributeKind::Relationship,
            Self::GeoProperty { .. } => AttributeKind::GeoProperty,
            Self::Simplified { .. } => AttributeKind::Simplified,
            Self::Bare(_) => AttributeKind::Bare,
            Self::Null => AttributeKind::Null,
        }
    }

    /// The unwrapped plain value.
    pub fn value(&self) -> &'a Value {
        match *self {
            Self::Property { value }
            | Self::GeoProperty { value }
            | Self::Simplified { value } => value,
            Self::Relationship { object } => object,
            Self::Bare(value) => value,
            Self::Null => &NULL,
        }
    }

    /// The geometry carried by a GeoProperty, if it is well-formed.
    pub fn geometry(&self) -> Option<Geometry> {
        match self {
            Self::GeoProperty { value } => Geometry::from_value(value),
            _ => None,
        }
    }
}

/// Unwraps an attribute envelope into its plain value.
///
/// Property/GeoProperty yield `.value`, Relationship yields `.object`, a bare
/// value is returned unchanged and `null` stays `null`.
pub fn extract_value(raw: &Value) -> Value {
    Attribute::classify(raw).value().clone()
}

/// True iff the attribute is tagged as a GeoProperty.
pub fn is_geo_property(raw: &Value) -> bool {
    raw.get("type").and_then(Value::as_str) == Some(GEO_PROPERTY)
}

/// All attribute names except the reserved envelope keys, in entity order.
pub fn list_attribute_names(entity: &Entity) -> Vec<&str> {
    entity
        .attributes
        .keys()
        .map(String::as_str)
        .filter(|name| !RESERVED_KEYS.contains(name))
        .collect()
}

/// Names of every GeoProperty attribute, in entity order.
pub fn find_geo_attributes(entity: &Entity) -> Vec<&str> {
    list_attribute_names(entity)
        .into_iter()
        .filter(|name| entity.attributes.get(*name).is_some_and(is_geo_property))
        .collect()
}

/// Picks the attribute that locates the entity on a map.
///
/// Conventional names win over position in the entity, so an entity with both
/// `location` and `footprint` resolves to `location`.
pub fn find_primary_geo_attribute(entity: &Entity) -> Option<&str> {
    for name in PRIMARY_GEO_NAMES {
        if entity.attributes.get(name).is_some_and(is_geo_property) {
            return Some(name);
        }
    }
    find_geo_attributes(entity).into_iter().next()
}

/// Every non-reserved attribute of the entity, unwrapped.
pub fn normalized_attributes(entity: &Entity) -> Map<String, Value> {
    list_attribute_names(entity)
        .into_iter()
        .map(|name| (name.to_string(), extract_value(&entity.attributes[name])))
        .collect()
}

/// Which attributes a widget shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeSelection {
    #[default]
    All,
    Include,
    Exclude,
}

/// Unwrapped attributes filtered by a selection mode.
pub fn filter_attributes(
    entity: &Entity,
    mode: AttributeSelection,
    selected: &[String],
) -> Map<String, Value> {
    let is_selected = |name: &str| selected.iter().any(|s| s == name);

    list_attribute_names(entity)
        .into_iter()
        .filter(|name| match mode {
            AttributeSelection::All => true,
            AttributeSelection::Include => is_selected(name),
            AttributeSelection::Exclude => !is_selected(name),
        })
        .map(|name| (name.to_string(), extract_value(&entity.attributes[name])))
        .collect()
}

/// `camelCase` → `Camel Case`.
pub fn format_attribute_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            out.push(' ');
            out.push(ch);
        } else if i == 0 {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
    }
    out.trim().to_string()
}

/// Envelope metadata that sits next to the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeMetadata {
    pub attr_type: Option<String>,
    pub observed_at: Option<String>,
    pub unit_code: Option<String>,
}

impl AttributeMetadata {
    /// Reads `type`, `observedAt` and `unitCode`; `None` for non-object attributes.
    pub fn of(raw: &Value) -> Option<Self> {
        let obj = raw.as_object()?;
        let text = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);
        Some(Self {
            attr_type: text("type"),
            observed_at: text("observedAt"),
            unit_code: text("unitCode"),
        })
    }
}

/// `[lng, lat]` of a GeoProperty holding a Point.
pub fn extract_coordinates(raw: &Value) -> Option<[f64; 2]> {
    if !is_geo_property(raw) {
        return None;
    }
    let point = Attribute::classify(raw).geometry()?.as_lng_lat()?;
    Some([point.lng, point.lat])
}
