use cityview_model::{Entity, normalized_attributes};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Values a template renders against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateContext {
    pub entity_id: String,
    pub entity_type: String,
    /// Plain (already unwrapped) attribute values.
    pub data: Map<String, Value>,
}

impl TemplateContext {
    pub fn new(
        entity_id: impl Into<String>,
        entity_type: impl Into<String>,
        data: Map<String, Value>,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            entity_type: entity_type.into(),
            data,
        }
    }

    /// Unwraps every attribute of `entity` into `data`.
    pub fn from_entity(entity: &Entity) -> Self {
        Self::new(&entity.id, &entity.entity_type, normalized_attributes(entity))
    }

    /// Builds a context from flattened feature properties, which carry `id`
    /// and `type` next to the attribute values.
    pub fn from_properties(properties: &Map<String, Value>) -> Self {
        let text = |key: &str| {
            properties
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Self {
            entity_id: text("id"),
            entity_type: text("type"),
            data: properties.clone(),
        }
    }
}
