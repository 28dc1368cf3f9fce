use crate::{LiveError, LiveResult};
use cityview_model::{DEFAULT_REFRESH_INTERVAL_SECS, LayerConfig, NGSI_LD_CORE_CONTEXT};
use cityview_ngsi::{ClientConfig, GetOptions, QueryOptions};
use std::time::Duration;

/// What a subscription fetches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchTarget {
    /// One entity by id.
    Entity(String),
    /// A fixed set of entities, fetched with one query.
    Ids(Vec<String>),
    /// Every entity of a type.
    Type(String),
}

impl FetchTarget {
    fn is_blank(&self) -> bool {
        match self {
            Self::Entity(id) => id.trim().is_empty(),
            Self::Ids(ids) => ids.iter().all(|id| id.trim().is_empty()),
            Self::Type(t) => t.trim().is_empty(),
        }
    }
}

/// Everything a subscription needs to poll the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub broker_url: String,
    pub target: FetchTarget,
    pub service: Option<String>,
    pub service_path: Option<String>,
    pub context_url: String,
    /// Attribute filter; empty means all attributes.
    pub attrs: Vec<String>,
    /// Zero disables the refresh timer.
    pub refresh_interval: Duration,
    pub enabled: bool,
}

impl FetchRequest {
    pub fn new(broker_url: impl Into<String>, target: FetchTarget) -> Self {
        Self {
            broker_url: broker_url.into(),
            target,
            service: None,
            service_path: None,
            context_url: NGSI_LD_CORE_CONTEXT.to_string(),
            attrs: Vec::new(),
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
            enabled: true,
        }
    }

    pub fn entity(broker_url: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self::new(broker_url, FetchTarget::Entity(entity_id.into()))
    }

    pub fn of_type(broker_url: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self::new(broker_url, FetchTarget::Type(entity_type.into()))
    }

    /// The polling request for a map layer. An entity type wins over ids.
    pub fn from_layer(layer: &LayerConfig) -> Self {
        let target = match layer.entity_type.as_deref().filter(|t| !t.trim().is_empty()) {
            Some(entity_type) => FetchTarget::Type(entity_type.to_string()),
            None => FetchTarget::Ids(layer.entity_ids.clone()),
        };
        Self {
            service: layer.tenant.clone(),
            service_path: layer.service_path.clone(),
            context_url: layer.context_url().to_string(),
            refresh_interval: Duration::from_secs(layer.refresh_interval_seconds),
            enabled: layer.enabled,
            ..Self::new(layer.broker_url.clone(), target)
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
    pub fn with_context_url(mut self, context_url: impl Into<String>) -> Self {
        self.context_url = context_url.into();
        self
    }

    #[must_use]
    pub fn with_attrs<I, S>(mut self, attrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attrs = attrs.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Rejects requests that could never be sent.
    pub fn validate(&self) -> LiveResult<()> {
        if self.broker_url.trim().is_empty() {
            return Err(LiveError::MissingBrokerUrl);
        }
        if self.target.is_blank() {
            return Err(LiveError::MissingTarget);
        }
        Ok(())
    }

    /// True when `other` would send a different HTTP request. Interval and
    /// the enabled flag only affect scheduling.
    pub fn same_shape(&self, other: &Self) -> bool {
        self.broker_url == other.broker_url
            && self.target == other.target
            && self.service == other.service
            && self.service_path == other.service_path
            && self.context_url == other.context_url
            && self.attrs == other.attrs
    }

    /// True when the refresh timer should run.
    pub fn polls(&self) -> bool {
        self.enabled && !self.refresh_interval.is_zero()
    }

    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(self.broker_url.clone())
            .with_context_url(self.context_url.clone());
        config.service = self.service.clone();
        config.service_path = self.service_path.clone();
        config
    }

    pub(crate) fn get_options(&self) -> GetOptions {
        GetOptions {
            attrs: self.attrs.clone(),
            ..GetOptions::default()
        }
    }

    pub(crate) fn query_options(&self) -> QueryOptions {
        let mut query = QueryOptions {
            attrs: self.attrs.clone(),
            ..QueryOptions::default()
        };
        match &self.target {
            FetchTarget::Type(entity_type) => query.entity_type = Some(entity_type.clone()),
            FetchTarget::Ids(ids) => query.ids = ids.clone(),
            FetchTarget::Entity(id) => query.ids = vec![id.clone()],
        }
        query
    }
}
