//! NGSI-LD HTTP client.
//!
//! Every CRUD call defaults to compacted responses: `Accept: application/json`
//! plus a `Link` header naming the context document. Embedded-context reads
//! (`Accept: application/ld+json`, no `Link`) are opt-in via [`ContextMode`].

use crate::error::{NgsiError, NgsiResult};
use cityview_model::{Entity, LayerConfig, NGSI_LD_CORE_CONTEXT, Source};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, LINK};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Path prefix of the NGSI-LD API on every broker.
pub const API_PREFIX: &str = "/ngsi-ld/v1";

pub const SERVICE_HEADER: &str = "Fiware-Service";
pub const SERVICE_PATH_HEADER: &str = "Fiware-ServicePath";
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Request timeout for CRUD calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const MIME_JSON: &str = "application/json";
const MIME_JSON_LD: &str = "application/ld+json";

/// Formats the `Link` header that points the broker at a context document.
pub fn link_header(context_url: &str) -> String {
    format!(
        "<{context_url}>; rel=\"http://www.w3.org/ns/json-ld#context\"; type=\"{MIME_JSON_LD}\""
    )
}

/// Reduces a fully qualified model URL to the short type name used on the wire.
///
/// `https://smartdatamodels.org/dataModel.Weather/WeatherObserved` becomes
/// `WeatherObserved`, with or without a trailing `/`; names without a `/`
/// are returned unchanged.
pub fn short_type_name(entity_type: &str) -> &str {
    entity_type
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(entity_type)
}

/// How the broker should present the JSON-LD context in a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContextMode {
    /// `Accept: application/json` + `Link`; body has no `@context`.
    #[default]
    Compacted,
    /// `Accept: application/ld+json`, no `Link`; body embeds `@context`.
    Embedded,
}

/// Whether an upsert created the entity or patched an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Connection settings for one broker scope.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub broker_url: String,
    /// Tenant, sent as `Fiware-Service`.
    pub service: Option<String>,
    /// Sent as `Fiware-ServicePath`.
    pub service_path: Option<String>,
    pub auth_token: Option<String>,
    pub context_url: String,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(broker_url: impl Into<String>) -> Self {
        Self {
            broker_url: broker_url.into(),
            service: None,
            service_path: None,
            auth_token: None,
            context_url: NGSI_LD_CORE_CONTEXT.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Scopes a source record to one tenant and service path.
    pub fn from_source(source: &Source, service: Option<&str>, service_path: Option<&str>) -> Self {
        Self {
            service: service.map(str::to_string),
            service_path: service_path.map(str::to_string),
            auth_token: source.auth_token.clone(),
            ..Self::new(source.broker_url.clone())
        }
    }

    /// Settings for polling a map layer.
    pub fn for_layer(layer: &LayerConfig) -> Self {
        Self {
            service: layer.tenant.clone(),
            service_path: layer.service_path.clone(),
            context_url: layer.context_url().to_string(),
            ..Self::new(layer.broker_url.clone())
        }
    }

    #[must_use]
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    #[must_use]
    pub fn with_service_path(mut self, service_path: impl Into<String>) -> Self {
        self.service_path = Some(service_path.into());
        self
    }

    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_context_url(mut self, context_url: impl Into<String>) -> Self {
        self.context_url = context_url.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Tenant headers, trimmed and omitted when empty.
    fn scope_headers(&self) -> NgsiResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let scoped = [
            (SERVICE_HEADER, self.service.as_deref()),
            (SERVICE_PATH_HEADER, self.service_path.as_deref()),
            (AUTH_TOKEN_HEADER, self.auth_token.as_deref()),
        ];
        for (name, value) in scoped {
            let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
                continue;
            };
            let value = HeaderValue::from_str(value)
                .map_err(|e| NgsiError::Config(format!("invalid {name} header: {e}")))?;
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| NgsiError::Config(format!("invalid header name {name}: {e}")))?;
            headers.insert(name, value);
        }
        Ok(headers)
    }
}

/// Options for a single-entity read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetOptions {
    pub attrs: Vec<String>,
    pub options: Option<String>,
    pub mode: ContextMode,
}

/// Filters for `GET /entities`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub entity_type: Option<String>,
    pub ids: Vec<String>,
    pub q: Option<String>,
    pub attrs: Vec<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub options: Option<String>,
    /// Restrict to entities held locally by the broker (`local=true`).
    pub local: bool,
}

impl QueryOptions {
    pub fn of_type(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: Some(entity_type.into()),
            ..Self::default()
        }
    }

    fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(t) = self.entity_type.as_deref().filter(|t| !t.is_empty()) {
            params.push(("type", short_type_name(t).to_string()));
        }
        if !self.ids.is_empty() {
            params.push(("id", self.ids.join(",")));
        }
        if let Some(q) = self.q.as_deref().filter(|q| !q.is_empty()) {
            params.push(("q", q.to_string()));
        }
        if !self.attrs.is_empty() {
            params.push(("attrs", self.attrs.join(",")));
        }
        if let Some(limit) = self.limit.filter(|l| *l > 0) {
            params.push(("limit", limit.to_string()));
        }
        if let Some(offset) = self.offset.filter(|o| *o > 0) {
            params.push(("offset", offset.to_string()));
        }
        if let Some(options) = self.options.as_deref().filter(|o| !o.is_empty()) {
            params.push(("options", options.to_string()));
        }
        if self.local {
            params.push(("local", "true".to_string()));
        }
        params
    }
}

/// Client for one broker scope (URL + tenant + service path + context).
///
/// Holds no global state; cloning is cheap and shares the connection pool.
#[derive(Debug, Clone)]
pub struct NgsiClient {
    config: ClientConfig,
    http: Client,
}

impl NgsiClient {
    /// Builds a client. Fails without a broker URL or with header values that
    /// cannot be sent.
    pub fn new(config: ClientConfig) -> NgsiResult<Self> {
        if config.broker_url.trim().is_empty() {
            return Err(NgsiError::Config("broker URL is required".to_string()));
        }
        let http = Client::builder()
            .timeout(config.timeout)
            .default_headers(config.scope_headers()?)
            .build()
            .map_err(|e| NgsiError::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}{API_PREFIX}{path}",
            self.config.broker_url.trim().trim_end_matches('/')
        )
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        debug!(%method, path, "broker request");
        self.http.request(method, self.url(path))
    }

    fn with_link(&self, req: RequestBuilder) -> RequestBuilder {
        req.header(LINK, link_header(&self.config.context_url))
    }

    async fn send(&self, req: RequestBuilder) -> NgsiResult<Response> {
        let response = req.send().await?;
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let body = response.bytes().await.unwrap_or_default();
            let err = NgsiError::from_problem(status, &body);
            warn!(status = status.as_u16(), code = ?err.code(), "broker error: {}", err.detail());
            return Err(err);
        }
        Ok(response)
    }

    /// `POST /entities`. The type is reduced to its short name.
    pub async fn create_entity(&self, entity: &Entity) -> NgsiResult<()> {
        require_id(&entity.id)?;
        let mut body = entity.clone();
        body.entity_type = short_type_name(&entity.entity_type).to_string();

        let req = self
            .request(Method::POST, "/entities")
            .header(CONTENT_TYPE, MIME_JSON)
            .json(&body.to_value());
        self.send(self.with_link(req)).await?;
        Ok(())
    }

    /// `GET /entities/{id}`.
    pub async fn get_entity(&self, entity_id: &str, options: &GetOptions) -> NgsiResult<Entity> {
        require_id(entity_id)?;
        let mut req = self.request(Method::GET, &entity_path(entity_id));
        req = match options.mode {
            ContextMode::Compacted => self.with_link(req.header(ACCEPT, MIME_JSON)),
            ContextMode::Embedded => req.header(ACCEPT, MIME_JSON_LD),
        };

        let mut params = Vec::new();
        if !options.attrs.is_empty() {
            params.push(("attrs", options.attrs.join(",")));
        }
        if let Some(opts) = options.options.as_deref().filter(|o| !o.is_empty()) {
            params.push(("options", opts.to_string()));
        }
        if !params.is_empty() {
            req = req.query(&params);
        }

        let response = self.send(req).await?;
        decode(response).await
    }

    /// `PATCH /entities/{id}/attrs`.
    pub async fn update_entity_attrs(
        &self,
        entity_id: &str,
        attrs: &Map<String, Value>,
    ) -> NgsiResult<()> {
        require_id(entity_id)?;
        let req = self
            .request(Method::PATCH, &format!("{}/attrs", entity_path(entity_id)))
            .header(CONTENT_TYPE, MIME_JSON)
            .json(attrs);
        self.send(self.with_link(req)).await?;
        Ok(())
    }

    /// `POST /entities/{id}/attrs`. With `overwrite = false` existing
    /// attributes are left untouched (`options=noOverwrite`).
    pub async fn append_entity_attrs(
        &self,
        entity_id: &str,
        attrs: &Map<String, Value>,
        overwrite: bool,
    ) -> NgsiResult<()> {
        require_id(entity_id)?;
        let mut req = self
            .request(Method::POST, &format!("{}/attrs", entity_path(entity_id)))
            .header(CONTENT_TYPE, MIME_JSON)
            .json(attrs);
        if !overwrite {
            req = req.query(&[("options", "noOverwrite")]);
        }
        self.send(self.with_link(req)).await?;
        Ok(())
    }

    /// `DELETE /entities/{id}/attrs/{name}`.
    pub async fn delete_entity_attr(&self, entity_id: &str, attr_name: &str) -> NgsiResult<()> {
        require_id(entity_id)?;
        if attr_name.trim().is_empty() {
            return Err(NgsiError::Config("attribute name is required".to_string()));
        }
        let path = format!(
            "{}/attrs/{}",
            entity_path(entity_id),
            urlencoding::encode(attr_name)
        );
        self.send(self.request(Method::DELETE, &path)).await?;
        Ok(())
    }

    /// `DELETE /entities/{id}`.
    pub async fn delete_entity(&self, entity_id: &str) -> NgsiResult<()> {
        require_id(entity_id)?;
        self.send(self.request(Method::DELETE, &entity_path(entity_id)))
            .await?;
        Ok(())
    }

    /// `HEAD /entities/{id}`: true on 2xx, false on 404, error otherwise.
    pub async fn entity_exists(&self, entity_id: &str) -> NgsiResult<bool> {
        require_id(entity_id)?;
        match self
            .send(self.request(Method::HEAD, &entity_path(entity_id)))
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.status() == StatusCode::NOT_FOUND.as_u16() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// `GET /entities` with filters.
    pub async fn query_entities(&self, query: &QueryOptions) -> NgsiResult<Vec<Entity>> {
        let mut req = self
            .with_link(self.request(Method::GET, "/entities"))
            .header(ACCEPT, MIME_JSON);
        let params = query.to_params();
        if !params.is_empty() {
            req = req.query(&params);
        }
        let response = self.send(req).await?;
        decode(response).await
    }

    /// Creates the entity if absent, else patches its attributes.
    ///
    /// Existence is checked first because create-over-existing (409) and
    /// update-of-absent (404) fail differently.
    pub async fn upsert_entity(&self, entity: &Entity) -> NgsiResult<UpsertOutcome> {
        if self.entity_exists(&entity.id).await? {
            let attrs: Map<String, Value> = entity
                .attributes
                .iter()
                .filter(|(name, _)| name.as_str() != "id" && name.as_str() != "type")
                .map(|(name, attr)| (name.clone(), attr.clone()))
                .collect();
            self.update_entity_attrs(&entity.id, &attrs).await?;
            info!(entity_id = %entity.id, "upsert updated existing entity");
            Ok(UpsertOutcome::Updated)
        } else {
            self.create_entity(entity).await?;
            info!(entity_id = %entity.id, "upsert created entity");
            Ok(UpsertOutcome::Created)
        }
    }
}

fn require_id(entity_id: &str) -> NgsiResult<()> {
    if entity_id.trim().is_empty() {
        return Err(NgsiError::Config("entity id is required".to_string()));
    }
    Ok(())
}

fn entity_path(entity_id: &str) -> String {
    format!("/entities/{}", urlencoding::encode(entity_id))
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> NgsiResult<T> {
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| NgsiError::Decode(e.to_string()))
}
