use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A context-broker entity as it travels on the wire.
///
/// `entity_type` is always the short type name (`WeatherObserved`), never a
/// vocabulary URL. Attributes keep their protocol envelopes and their
/// original order; use the helpers in [`crate::attribute`] to unwrap them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Entity {
    /// Creates an entity with no attributes.
    pub fn new(id: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entity_type: entity_type.into(),
            attributes: Map::new(),
        }
    }

    /// Builder-style attribute insertion.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Value) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }

    /// Returns the raw (still enveloped) attribute.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Parses an entity from a JSON value.
    pub fn from_value(value: Value) -> crate::Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Converts the entity back into a JSON object (`id`, `type`, attributes).
    pub fn to_value(&self) -> Value {
        let mut body = Map::with_capacity(self.attributes.len() + 2);
        body.insert("id".into(), Value::String(self.id.clone()));
        body.insert("type".into(), Value::String(self.entity_type.clone()));
        for (name, attr) in &self.attributes {
            body.insert(name.clone(), attr.clone());
        }
        Value::Object(body)
    }
}
