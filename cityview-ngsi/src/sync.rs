//! Document-store to broker synchronization.
//!
//! The document store calls these hooks after it persists an entity document.
//! Broker failures never propagate back into the store's write path: each hook
//! returns the [`SyncStatus`] the store should record.

use crate::client::{ClientConfig, GetOptions, NgsiClient, UpsertOutcome, short_type_name};
use crate::error::{NgsiError, NgsiResult};
use chrono::Utc;
use cityview_model::{Entity, NGSI_LD_CORE_CONTEXT, RESERVED_KEYS, Source, SyncStatus, extract_value};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, info};

/// The data model an entity document was authored against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataModelRef {
    /// Type name, possibly a fully qualified model URL.
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_url: Option<String>,
}

/// An entity as stored by the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDocument {
    pub entity_id: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_model: Option<DataModelRef>,
    pub source: Source,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_path: Option<String>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl EntityDocument {
    pub fn context_url(&self) -> &str {
        self.data_model
            .as_ref()
            .and_then(|m| m.context_url.as_deref())
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(NGSI_LD_CORE_CONTEXT)
    }

    /// Short wire type: the document's own type, else the data model's.
    pub fn wire_type(&self) -> Option<&str> {
        self.entity_type
            .as_deref()
            .filter(|t| !t.is_empty())
            .or_else(|| self.data_model.as_ref().map(|m| m.model.as_str()))
            .filter(|t| !t.is_empty())
            .map(short_type_name)
    }

    /// The broker body: `{ id, type, ...attributes }`.
    pub fn to_entity(&self) -> NgsiResult<Entity> {
        let entity_type = self
            .wire_type()
            .ok_or_else(|| NgsiError::Config(format!("entity {} has no type", self.entity_id)))?;
        let mut entity = Entity::new(&self.entity_id, entity_type);
        entity.attributes = self.attributes.clone();
        Ok(entity)
    }

    fn client(&self) -> NgsiResult<NgsiClient> {
        let config = ClientConfig::from_source(
            &self.source,
            self.service.as_deref(),
            self.service_path.as_deref(),
        )
        .with_context_url(self.context_url());
        NgsiClient::new(config)
    }
}

/// Which document-store write triggered the sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOperation {
    Create,
    Update,
}

/// Result of a forced resync.
#[derive(Debug, Clone, PartialEq)]
pub struct ResyncReport {
    pub outcome: UpsertOutcome,
    /// `data.*` paths available to templates, sorted.
    pub attribute_paths: Vec<String>,
    pub status: SyncStatus,
}

/// Hooks invoked by the document store after it writes an entity document.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrokerSync;

impl BrokerSync {
    pub fn new() -> Self {
        Self
    }

    /// Pushes a created or updated document to the broker.
    ///
    /// Create posts the full entity; update patches the attributes and is
    /// skipped when there are none.
    pub async fn after_change(&self, doc: &EntityDocument, operation: ChangeOperation) -> SyncStatus {
        let result = async {
            let client = doc.client()?;
            match operation {
                ChangeOperation::Create => client.create_entity(&doc.to_entity()?).await,
                ChangeOperation::Update if doc.attributes.is_empty() => Ok(()),
                ChangeOperation::Update => {
                    client
                        .update_entity_attrs(&doc.entity_id, &doc.attributes)
                        .await
                }
            }
        }
        .await;

        match result {
            Ok(()) => {
                info!(entity_id = %doc.entity_id, ?operation, "entity synced");
                SyncStatus::synced_at(Utc::now())
            }
            Err(e) => {
                error!(entity_id = %doc.entity_id, ?operation, "failed to sync entity: {e}");
                SyncStatus::failed_at(Utc::now(), e.to_string())
            }
        }
    }

    /// Removes a deleted document's entity from the broker. Failures are
    /// logged and reported, never raised: the document is already gone.
    pub async fn after_delete(&self, doc: &EntityDocument) -> SyncStatus {
        let result = async { doc.client()?.delete_entity(&doc.entity_id).await }.await;
        match result {
            Ok(()) => {
                info!(entity_id = %doc.entity_id, "entity deleted from broker");
                SyncStatus::synced_at(Utc::now())
            }
            Err(e) => {
                error!(entity_id = %doc.entity_id, "failed to delete entity from broker: {e}");
                SyncStatus::failed_at(Utc::now(), e.to_string())
            }
        }
    }

    /// Upserts the document, then reads it back to report the attribute
    /// paths templates can use. When the read-back fails the paths come from
    /// the local attributes.
    pub async fn resync(&self, doc: &EntityDocument) -> NgsiResult<ResyncReport> {
        let client = doc.client()?;
        let outcome = client.upsert_entity(&doc.to_entity()?).await?;

        let attribute_paths = match client.get_entity(&doc.entity_id, &GetOptions::default()).await {
            Ok(entity) => entity_attribute_paths(&entity.attributes),
            Err(e) => {
                info!(entity_id = %doc.entity_id, "read-back after resync failed, using local attributes: {e}");
                entity_attribute_paths(&doc.attributes)
            }
        };

        Ok(ResyncReport {
            outcome,
            attribute_paths,
            status: SyncStatus::synced_at(Utc::now()),
        })
    }
}

/// Leaf `data.*` paths of an entity's unwrapped attributes, sorted.
///
/// An object whose members are all scalars or arrays is a leaf; only objects
/// holding further objects are descended.
pub fn entity_attribute_paths(attributes: &Map<String, Value>) -> Vec<String> {
    let mut paths = Vec::new();
    for (name, attr) in attributes {
        if RESERVED_KEYS.contains(&name.as_str()) {
            continue;
        }
        collect_leaf_paths(&extract_value(attr), format!("data.{name}"), &mut paths);
    }
    paths.sort();
    paths
}

fn collect_leaf_paths(value: &Value, prefix: String, paths: &mut Vec<String>) {
    let Value::Object(obj) = value else {
        paths.push(prefix);
        return;
    };
    if !obj.values().any(Value::is_object) {
        paths.push(prefix);
        return;
    }
    for (key, child) in obj {
        collect_leaf_paths(child, format!("{prefix}.{key}"), paths);
    }
}
