//! Live layers on one map: a subscription per layer feeding a layer manager.

use crate::{LayerManager, MapResult, RenderSurface};
use chrono::{DateTime, Utc};
use cityview_geo::entities_to_feature_collection;
use cityview_live::{BrokerSource, EntitySource, FetchRequest, FetchState, Subscription};
use cityview_model::{Entity, LayerConfig};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

/// One row of the map legend.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegendEntry {
    pub layer_id: String,
    pub name: String,
    pub color: String,
    /// Entities in the last rendered result.
    pub count: Option<usize>,
    pub error: Option<String>,
}

struct Feed {
    subscription: Subscription,
    updates: watch::Receiver<FetchState>,
    rendered_at: Option<DateTime<Utc>>,
}

struct SessionLayer {
    config: LayerConfig,
    /// `None` for layers rendered from preloaded data.
    feed: Option<Feed>,
}

/// Keeps a [`LayerManager`] in step with a list of layer configurations.
///
/// Every enabled layer without preloaded data gets its own [`Subscription`].
/// Results are pushed into the manager by [`pump`](Self::pump); a failing
/// layer records its error and keeps its last data on the map, without
/// affecting the others.
pub struct MapSession<S> {
    manager: LayerManager<S>,
    source: Arc<dyn EntitySource>,
    layers: HashMap<String, SessionLayer>,
    order: Vec<String>,
    errors: HashMap<String, String>,
    counts: HashMap<String, usize>,
}

impl<S: RenderSurface> MapSession<S> {
    pub fn new(surface: S, source: Arc<dyn EntitySource>) -> Self {
        Self {
            manager: LayerManager::new(surface),
            source,
            layers: HashMap::new(),
            order: Vec::new(),
            errors: HashMap::new(),
            counts: HashMap::new(),
        }
    }

    /// A session polling the brokers named in each layer.
    pub fn with_broker(surface: S) -> Self {
        Self::new(surface, Arc::new(BrokerSource))
    }

    pub fn manager(&self) -> &LayerManager<S> {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut LayerManager<S> {
        &mut self.manager
    }

    pub fn surface(&self) -> &S {
        self.manager.surface()
    }

    /// Enabled layer ids in configuration order.
    pub fn layer_ids(&self) -> &[String] {
        &self.order
    }

    pub fn subscription(&self, layer_id: &str) -> Option<&Subscription> {
        self.layers
            .get(layer_id)
            .and_then(|l| l.feed.as_ref())
            .map(|f| &f.subscription)
    }

    pub fn layer_error(&self, layer_id: &str) -> Option<&str> {
        self.errors.get(layer_id).map(String::as_str)
    }

    pub fn errors(&self) -> &HashMap<String, String> {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn entity_count(&self, layer_id: &str) -> Option<usize> {
        self.counts.get(layer_id).copied()
    }

    pub fn legend(&self) -> Vec<LegendEntry> {
        self.order
            .iter()
            .filter_map(|id| self.layers.get(id))
            .map(|layer| LegendEntry {
                layer_id: layer.config.id.clone(),
                name: layer.config.name.clone(),
                color: layer.config.style.color().to_string(),
                count: self.counts.get(&layer.config.id).copied(),
                error: self.errors.get(&layer.config.id).cloned(),
            })
            .collect()
    }

    /// Brings subscriptions and map layers in line with `configs`.
    ///
    /// New layers are subscribed and started, changed ones updated in place,
    /// removed or disabled ones disposed and taken off the map. Layers with
    /// preloaded entities are drawn right away and never polled. Must be
    /// called inside a tokio runtime.
    pub fn apply_layers(&mut self, configs: &[LayerConfig]) -> MapResult<()> {
        let desired: Vec<&LayerConfig> = configs.iter().filter(|c| c.enabled).collect();
        let desired_ids: HashSet<&str> = desired.iter().map(|c| c.id.as_str()).collect();

        // Dropping a subscription disposes it.
        self.layers.retain(|id, _| desired_ids.contains(id.as_str()));
        self.errors.retain(|id, _| desired_ids.contains(id.as_str()));
        self.counts.retain(|id, _| desired_ids.contains(id.as_str()));
        self.order = desired.iter().map(|c| c.id.clone()).collect();

        for config in desired {
            if config.has_preloaded_data() {
                self.layers.insert(
                    config.id.clone(),
                    SessionLayer {
                        config: config.clone(),
                        feed: None,
                    },
                );
                let entities = config.entity_data.as_deref().unwrap_or_default();
                self.render(config, entities)?;
                continue;
            }

            let existing = self
                .layers
                .get_mut(&config.id)
                .filter(|layer| layer.feed.is_some());
            let Some(layer) = existing else {
                self.subscribe(config);
                continue;
            };
            if layer.config == *config {
                continue;
            }

            let style_changed = layer.config.style != config.style;
            layer.config = config.clone();
            let mut current = None;
            if let Some(feed) = layer.feed.as_mut() {
                if let Err(e) = feed.subscription.update(FetchRequest::from_layer(config)) {
                    warn!(layer_id = %config.id, error = %e, "layer request rejected");
                    self.errors.insert(config.id.clone(), e.to_string());
                }
                current = feed.updates.borrow().data.clone();
            }

            if style_changed {
                self.manager.update_layer_style(&config.id, &config.style)?;
            }
            // Location attribute and popup template may have changed too.
            if let Some(data) = current {
                self.render(config, data.entities())?;
            }
        }

        let removed = self.manager.reconcile(self.order.iter().map(String::as_str))?;
        if !removed.is_empty() {
            debug!(?removed, "stale layers removed");
        }
        Ok(())
    }

    /// Renders every subscription that published new data since the last
    /// pump and records per-layer errors. Returns how many layers were
    /// redrawn.
    pub fn pump(&mut self) -> MapResult<usize> {
        let mut fresh = Vec::new();
        for layer in self.layers.values_mut() {
            let Some(feed) = layer.feed.as_mut() else {
                continue;
            };
            if !feed.updates.has_changed().unwrap_or(false) {
                continue;
            }
            let state = feed.updates.borrow_and_update().clone();

            match &state.error {
                Some(e) => {
                    self.errors.insert(layer.config.id.clone(), e.detail().to_string());
                }
                None if state.data.is_some() => {
                    self.errors.remove(&layer.config.id);
                }
                None => {}
            }

            if state.last_updated.is_some() && state.last_updated != feed.rendered_at {
                feed.rendered_at = state.last_updated;
                if let Some(data) = state.data {
                    fresh.push((layer.config.clone(), data.into_entities()));
                }
            }
        }

        for (config, entities) in &fresh {
            self.render(config, entities)?;
        }
        Ok(fresh.len())
    }

    /// Waits until any subscription publishes a snapshot not yet pumped.
    /// Returns `false` when there is nothing to wait on.
    pub async fn next_change(&self) -> bool {
        let mut receivers: Vec<watch::Receiver<FetchState>> = self
            .layers
            .values()
            .filter_map(|l| l.feed.as_ref())
            .map(|f| f.updates.clone())
            .collect();
        if receivers.is_empty() {
            return false;
        }
        let waits = receivers.iter_mut().map(|rx| Box::pin(rx.changed()));
        let (result, _, _) = futures::future::select_all(waits).await;
        result.is_ok()
    }

    /// Fetches every polled layer now and waits for all results.
    pub async fn refresh_now(&self) {
        let fetches = self
            .layers
            .values()
            .filter_map(|l| l.feed.as_ref())
            .map(|f| f.subscription.refetch_now());
        futures::future::join_all(fetches).await;
    }

    /// Fits the camera to everything on the map. `false` when there is no
    /// data to fit.
    pub fn fit_to_data(&mut self) -> bool {
        match self.manager.data_bounds() {
            Some(bounds) => {
                self.manager.fit_to_bounds(bounds);
                true
            }
            None => false,
        }
    }

    /// Disposes every subscription and removes every layer.
    pub fn shutdown(&mut self) -> MapResult<()> {
        self.layers.clear();
        self.order.clear();
        self.errors.clear();
        self.counts.clear();
        self.manager.remove_all_layers()
    }

    fn subscribe(&mut self, config: &LayerConfig) {
        let request = FetchRequest::from_layer(config);
        // Subscribe before starting so the first result is never marked seen.
        let started = Subscription::new(Arc::clone(&self.source), request).and_then(|mut subscription| {
            let updates = subscription.subscribe();
            subscription.start()?;
            Ok((subscription, updates))
        });
        let feed = match started {
            Ok((subscription, updates)) => {
                self.errors.remove(&config.id);
                Some(Feed {
                    subscription,
                    updates,
                    rendered_at: None,
                })
            }
            Err(e) => {
                warn!(layer_id = %config.id, error = %e, "layer not subscribed");
                self.errors.insert(config.id.clone(), e.to_string());
                None
            }
        };
        debug!(layer_id = %config.id, subscribed = feed.is_some(), "layer subscribed");
        self.layers.insert(
            config.id.clone(),
            SessionLayer {
                config: config.clone(),
                feed,
            },
        );
    }

    fn render(&mut self, config: &LayerConfig, entities: &[Entity]) -> MapResult<()> {
        let collection = entities_to_feature_collection(entities, config.location_attribute());
        self.manager.add_or_update(config, collection)?;
        self.counts.insert(config.id.clone(), entities.len());
        Ok(())
    }
}
