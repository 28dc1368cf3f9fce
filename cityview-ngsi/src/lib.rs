//! NGSI-LD context broker access for CityView.
//!
//! - [`NgsiClient`]: entity CRUD with per-operation content negotiation and
//!   tenant scoping
//! - [`BrokerSync`]: hooks the document store runs after its own writes
//! - [`discover_entities`] / [`health_check`]: broker inspection
//!
//! Every failure surfaces as one [`NgsiError`] value carrying the HTTP status,
//! the broker's problem code and a human-readable detail.

pub mod client;
pub mod discovery;
pub mod error;
pub mod sync;

pub use client::{
    API_PREFIX, ClientConfig, ContextMode, GetOptions, NgsiClient, QueryOptions, UpsertOutcome,
    link_header, short_type_name,
};
pub use discovery::{
    DiscoveredEntity, Discovery, TenantReport, TenantStatus, discover_entities, health_check,
    mark_already_synced,
};
pub use error::{NgsiError, NgsiResult};
pub use sync::{
    BrokerSync, ChangeOperation, DataModelRef, EntityDocument, ResyncReport,
    entity_attribute_paths,
};
