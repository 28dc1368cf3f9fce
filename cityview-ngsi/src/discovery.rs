//! Broker health check and tenant-wide entity discovery.

use crate::client::{ClientConfig, NgsiClient, QueryOptions};
use crate::error::{NgsiError, NgsiResult};
use cityview_model::Source;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

/// Timeout for `GET /version`.
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Page size for a discovery scan.
pub const DISCOVERY_LIMIT: u32 = 1000;

const NEW_TENANT_NOTE: &str = "New tenant (not yet created in broker)";

/// Fetches `{broker}/version`. Returns the broker's version document.
pub async fn health_check(broker_url: &str) -> NgsiResult<Value> {
    let base = broker_url.trim().trim_end_matches('/');
    if base.is_empty() {
        return Err(NgsiError::Config("broker URL is required".to_string()));
    }

    let http = Client::builder()
        .timeout(HEALTH_TIMEOUT)
        .build()
        .map_err(|e| NgsiError::Config(format!("failed to create HTTP client: {e}")))?;

    debug!(broker = base, "health check");
    let response = http.get(format!("{base}/version")).send().await?;
    let status = response.status();
    let body = response.bytes().await?;
    if !status.is_success() {
        return Err(NgsiError::from_problem(status, &body));
    }
    serde_json::from_slice(&body).map_err(|e| NgsiError::Decode(e.to_string()))
}

/// Outcome of scanning one (tenant, service path) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    Ok,
    /// Reachable but holding no entities, or not yet created.
    Empty,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantReport {
    pub service: String,
    pub service_path: String,
    pub entity_count: usize,
    pub status: TenantStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TenantReport {
    /// `service/path`, with `(default)` standing in for the unnamed tenant.
    pub fn label(&self) -> String {
        let service = if self.service.is_empty() { "(default)" } else { &self.service };
        format!("{service}{}", self.service_path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredEntity {
    pub id: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub service: String,
    pub service_path: String,
    #[serde(default)]
    pub already_synced: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Discovery {
    pub entities: Vec<DiscoveredEntity>,
    pub tenants: Vec<TenantReport>,
}

impl Discovery {
    pub fn error_tenants(&self) -> impl Iterator<Item = &TenantReport> {
        self.tenants.iter().filter(|t| t.status == TenantStatus::Error)
    }

    pub fn empty_tenant_count(&self) -> usize {
        self.tenants
            .iter()
            .filter(|t| t.status == TenantStatus::Empty)
            .count()
    }
}

/// Lists every entity across all tenant and service-path combinations of a
/// source. A failing tenant is reported, never fatal to the scan.
pub async fn discover_entities(source: &Source) -> Discovery {
    let services: Vec<&str> = if source.tenants.is_empty() {
        vec![""]
    } else {
        source.tenants.iter().map(String::as_str).collect()
    };
    let service_paths: Vec<&str> = if source.service_paths.is_empty() {
        vec!["/"]
    } else {
        source
            .service_paths
            .iter()
            .map(|p| if p.is_empty() { "/" } else { p.as_str() })
            .collect()
    };

    let query = QueryOptions {
        limit: Some(DISCOVERY_LIMIT),
        options: Some("keyValues".to_string()),
        local: true,
        ..QueryOptions::default()
    };

    let mut discovery = Discovery::default();
    for &service in &services {
        for &service_path in &service_paths {
            let mut report = TenantReport {
                service: service.to_string(),
                service_path: service_path.to_string(),
                entity_count: 0,
                status: TenantStatus::Ok,
                error: None,
            };

            let config = ClientConfig::from_source(source, Some(service), Some(service_path));
            let result = match NgsiClient::new(config) {
                Ok(client) => client.query_entities(&query).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(entities) => {
                    report.entity_count = entities.len();
                    if entities.is_empty() {
                        report.status = TenantStatus::Empty;
                    }
                    discovery.entities.extend(entities.into_iter().map(|e| DiscoveredEntity {
                        id: e.id,
                        entity_type: e.entity_type,
                        service: service.to_string(),
                        service_path: service_path.to_string(),
                        already_synced: false,
                    }));
                }
                Err(e) if is_new_tenant(&e) => {
                    report.status = TenantStatus::Empty;
                    report.error = Some(NEW_TENANT_NOTE.to_string());
                }
                Err(e) => {
                    warn!(service, service_path, "discovery failed: {}", e.detail());
                    report.status = TenantStatus::Error;
                    report.error = Some(e.detail().to_string());
                }
            }
            discovery.tenants.push(report);
        }
    }
    discovery
}

/// Brokers answer an unknown tenant with a 404 or a "not found" style detail.
fn is_new_tenant(e: &NgsiError) -> bool {
    let detail = e.detail().to_lowercase();
    e.is_not_found() || detail.contains("not found") || detail.contains("does not exist")
}

/// Flags entities whose ids the document store already tracks.
pub fn mark_already_synced(entities: &mut [DiscoveredEntity], known_ids: &HashSet<String>) {
    for entity in entities {
        entity.already_synced = known_ids.contains(&entity.id);
    }
}
