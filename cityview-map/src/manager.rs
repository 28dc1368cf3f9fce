use crate::icons::{icon_anchor, icon_id, icon_image, icon_scale};
use crate::popup::{detail_html, hover_html, wrap_longitude};
use crate::{
    Camera, ClusterOptions, Cursor, FitOptions, LayerKind, LayerSpec, MapResult, Popup, PopupId,
    PopupOptions, RenderSurface, SourceSpec,
};
use cityview_geo::{BoundingBox, Feature, FeatureCollection};
use cityview_model::{IconShape, LayerConfig, LngLat, MarkerStyle};
use serde_json::{Map, Value, json};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Sources with more features than this are clustered.
pub const CLUSTER_THRESHOLD: usize = 50;
pub const CLUSTER_RADIUS: u32 = 50;
pub const CLUSTER_MAX_ZOOM: u8 = 14;
/// Zoom used when the surface cannot tell how far a cluster expands.
const CLUSTER_FALLBACK_ZOOM: f64 = 14.0;

/// Suffixes of the drawing layers derived from one logical layer, in the
/// order they are created.
pub const LAYER_SUFFIXES: [&str; 5] = ["", "-clusters", "-cluster-count", "-fill", "-line"];

const STROKE_COLOR: &str = "#ffffff";

pub fn source_id(layer_id: &str) -> String {
    format!("ngsi-source-{layer_id}")
}

pub fn base_layer_id(layer_id: &str) -> String {
    format!("ngsi-layer-{layer_id}")
}

/// Every drawing layer id derived from `layer_id`.
pub fn drawing_layer_ids(layer_id: &str) -> Vec<String> {
    let base = base_layer_id(layer_id);
    LAYER_SUFFIXES.iter().map(|suffix| format!("{base}{suffix}")).collect()
}

/// What a drawing layer shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawingRole {
    /// Unclustered points, as circles or icons.
    Marker,
    Clusters,
    ClusterCount,
    Fill,
    Line,
}

/// Pointer position plus the rendered features under it, topmost first.
#[derive(Debug, Clone, PartialEq)]
pub struct PointerEvent {
    pub lng_lat: LngLat,
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone)]
struct ManagedLayer {
    config: LayerConfig,
    /// Set when the marker layer draws icons of this shape.
    icon: Option<IconShape>,
    feature_count: usize,
    bounds: Option<BoundingBox>,
}

/// Owns the sources, drawing layers, icons and popups it creates on one
/// rendering surface, keyed by logical layer id.
#[derive(Debug)]
pub struct LayerManager<S> {
    surface: S,
    layers: HashMap<String, ManagedLayer>,
    roles: HashMap<String, (String, DrawingRole)>,
    icons: HashSet<String>,
    popups: HashMap<String, PopupId>,
    hover: Option<(String, PopupId)>,
}

impl<S: RenderSurface> LayerManager<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            layers: HashMap::new(),
            roles: HashMap::new(),
            icons: HashSet::new(),
            popups: HashMap::new(),
            hover: None,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Direct surface access. Do not touch sources or layers the manager
    /// created through it.
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn into_surface(self) -> S {
        self.surface
    }

    /// Tracked layer ids, sorted.
    pub fn layer_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.layers.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn contains(&self, layer_id: &str) -> bool {
        self.layers.contains_key(layer_id)
    }

    pub fn layer_config(&self, layer_id: &str) -> Option<&LayerConfig> {
        self.layers.get(layer_id).map(|l| &l.config)
    }

    pub fn feature_count(&self, layer_id: &str) -> Option<usize> {
        self.layers.get(layer_id).map(|l| l.feature_count)
    }

    /// Registered icon image ids.
    pub fn icon_ids(&self) -> impl Iterator<Item = &str> {
        self.icons.iter().map(String::as_str)
    }

    /// Which logical layer a drawing layer belongs to, and its role.
    pub fn role_of(&self, drawing_layer_id: &str) -> Option<(&str, DrawingRole)> {
        self.roles
            .get(drawing_layer_id)
            .map(|(layer_id, role)| (layer_id.as_str(), *role))
    }

    /// Union of the bounds of every layer's current data.
    pub fn data_bounds(&self) -> Option<BoundingBox> {
        self.layers
            .values()
            .filter_map(|l| l.bounds)
            .reduce(BoundingBox::union)
    }

    /// Replaces the data of an existing layer, or creates its source and full
    /// set of drawing layers. Clustering is decided once, at creation.
    pub fn add_or_update(&mut self, config: &LayerConfig, data: FeatureCollection) -> MapResult<()> {
        let source = source_id(&config.id);
        let feature_count = data.len();
        let bounds = data.bounds();

        if self.surface.has_source(&source) {
            self.surface.set_source_data(&source, &data)?;
            let icon = self.layers.get(&config.id).and_then(|l| l.icon);
            self.layers.insert(
                config.id.clone(),
                ManagedLayer {
                    config: config.clone(),
                    icon,
                    feature_count,
                    bounds,
                },
            );
            debug!(layer_id = %config.id, features = feature_count, "layer data updated");
            return Ok(());
        }

        let cluster = (feature_count > CLUSTER_THRESHOLD).then_some(ClusterOptions {
            cluster_max_zoom: CLUSTER_MAX_ZOOM,
            cluster_radius: CLUSTER_RADIUS,
        });
        self.surface.add_source(&source, SourceSpec { data, cluster })?;

        let mut added = Vec::with_capacity(LAYER_SUFFIXES.len());
        let icon = match self.add_drawing_layers(config, &source, &mut added) {
            Ok(icon) => icon,
            Err(e) => {
                self.discard_partial_layer(&source, &added);
                return Err(e);
            }
        };

        self.layers.insert(
            config.id.clone(),
            ManagedLayer {
                config: config.clone(),
                icon,
                feature_count,
                bounds,
            },
        );
        info!(
            layer_id = %config.id,
            features = feature_count,
            clustered = cluster.is_some(),
            "layer added"
        );
        Ok(())
    }

    /// Adds the marker, cluster and shape layers of a new source, recording
    /// every layer id that made it onto the surface in `added`.
    fn add_drawing_layers(
        &mut self,
        config: &LayerConfig,
        source: &str,
        added: &mut Vec<String>,
    ) -> MapResult<Option<IconShape>> {
        let style = &config.style;
        let base = base_layer_id(&config.id);
        let icon = Some(style.icon()).filter(|shape| *shape != IconShape::Circle);

        let marker = match icon {
            Some(shape) => {
                let image_id = self.ensure_icon(shape, style.color())?;
                icon_layer(&base, source, &image_id, shape, style.size())
            }
            None => circle_layer(&base, source, style),
        };
        let specs = [
            (marker, DrawingRole::Marker),
            (cluster_layer(&base, source, style.color()), DrawingRole::Clusters),
            (cluster_count_layer(&base, source), DrawingRole::ClusterCount),
            (fill_layer(&base, source, style.color()), DrawingRole::Fill),
            (line_layer(&base, source, style.color()), DrawingRole::Line),
        ];
        for (spec, role) in specs {
            let id = spec.id.clone();
            self.surface.add_layer(spec)?;
            self.roles.insert(id.clone(), (config.id.clone(), role));
            added.push(id);
        }
        Ok(icon)
    }

    /// Removes what a failed creation left behind: the drawing layers in
    /// `added` and the source. Registered icons stay, they are shared.
    fn discard_partial_layer(&mut self, source: &str, added: &[String]) {
        for id in added.iter().rev() {
            self.roles.remove(id);
            if let Err(e) = self.surface.remove_layer(id) {
                warn!(layer = %id, error = %e, "failed to roll back drawing layer");
            }
        }
        if let Err(e) = self.surface.remove_source(source) {
            warn!(source, error = %e, "failed to roll back source");
        }
    }

    /// Renders every desired layer, then removes tracked layers missing from
    /// the set.
    pub fn sync_layers(&mut self, desired: &[(LayerConfig, FeatureCollection)]) -> MapResult<Vec<String>> {
        for (config, data) in desired {
            self.add_or_update(config, data.clone())?;
        }
        self.reconcile(desired.iter().map(|(config, _)| config.id.as_str()))
    }

    /// Removes every tracked layer whose id is not in `desired`. Returns the
    /// removed ids.
    pub fn reconcile<'a, I>(&mut self, desired: I) -> MapResult<Vec<String>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let desired: HashSet<&str> = desired.into_iter().collect();
        let stale: Vec<String> = self
            .layer_ids()
            .into_iter()
            .filter(|id| !desired.contains(id.as_str()))
            .collect();
        for id in &stale {
            self.remove_layer(id)?;
        }
        Ok(stale)
    }

    /// Merges `style` into the layer's stored style and updates the marker
    /// layer in place.
    pub fn update_layer_style(&mut self, layer_id: &str, style: &MarkerStyle) -> MapResult<()> {
        let Some(managed) = self.layers.get_mut(layer_id) else {
            return Ok(());
        };
        managed.config.style.merge(style);
        let merged = managed.config.style.clone();
        let icon = managed.icon;

        let base = base_layer_id(layer_id);
        if !self.surface.has_layer(&base) {
            return Ok(());
        }
        match icon {
            None => {
                if style.color.is_some() {
                    self.surface
                        .set_paint_property(&base, "circle-color", json!(merged.color()))?;
                }
                if style.size.is_some() {
                    self.surface
                        .set_paint_property(&base, "circle-radius", json!(merged.size()))?;
                }
            }
            Some(shape) => {
                if style.color.is_some() {
                    let image_id = self.ensure_icon(shape, merged.color())?;
                    self.surface
                        .set_layout_property(&base, "icon-image", json!(image_id))?;
                }
                if style.size.is_some() {
                    self.surface
                        .set_layout_property(&base, "icon-size", json!(icon_scale(merged.size())))?;
                }
            }
        }
        debug!(layer_id, "layer style updated");
        Ok(())
    }

    /// Tears down every drawing layer of `layer_id`, then its source and any
    /// popup it opened.
    pub fn remove_layer(&mut self, layer_id: &str) -> MapResult<()> {
        for drawing in drawing_layer_ids(layer_id) {
            if self.surface.has_layer(&drawing) {
                self.surface.remove_layer(&drawing)?;
            }
            self.roles.remove(&drawing);
        }

        let source = source_id(layer_id);
        if self.surface.has_source(&source) {
            self.surface.remove_source(&source)?;
        }

        if let Some(popup) = self.popups.remove(layer_id) {
            self.surface.close_popup(popup);
        }
        if self.hover.as_ref().is_some_and(|(id, _)| id == layer_id) {
            self.close_hover();
        }

        if self.layers.remove(layer_id).is_some() {
            info!(layer_id, "layer removed");
        }
        Ok(())
    }

    pub fn remove_all_layers(&mut self) -> MapResult<()> {
        for id in self.layer_ids() {
            self.remove_layer(&id)?;
        }
        Ok(())
    }

    pub fn fit_to_bounds(&mut self, bounds: BoundingBox) {
        self.fit_to_bounds_with(bounds, FitOptions::default());
    }

    pub fn fit_to_bounds_with(&mut self, bounds: BoundingBox, options: FitOptions) {
        self.surface.fit_bounds(bounds, options);
    }

    // ── Pointer events ──────────────────────────────────────────

    /// Pointer cursor over markers and clusters; a hover popup over a point
    /// marker.
    pub fn handle_mouse_enter(&mut self, drawing_layer_id: &str, event: &PointerEvent) {
        let Some((layer_id, role)) = self.roles.get(drawing_layer_id).cloned() else {
            return;
        };
        match role {
            DrawingRole::Marker => {
                self.surface.set_cursor(Cursor::Pointer);
                let Some((feature, anchor)) = point_under(event) else {
                    return;
                };
                let Some(config) = self.layer_config(&layer_id) else {
                    return;
                };
                let html = hover_html(config, properties_of(feature));
                self.close_hover();
                let popup = self.surface.open_popup(Popup {
                    lng_lat: anchor,
                    html,
                    options: PopupOptions::hover(),
                });
                self.hover = Some((layer_id, popup));
            }
            DrawingRole::Clusters => self.surface.set_cursor(Cursor::Pointer),
            _ => {}
        }
    }

    pub fn handle_mouse_leave(&mut self, drawing_layer_id: &str) {
        match self.roles.get(drawing_layer_id).map(|(_, role)| *role) {
            Some(DrawingRole::Marker) => {
                self.surface.set_cursor(Cursor::Default);
                self.close_hover();
            }
            Some(DrawingRole::Clusters) => self.surface.set_cursor(Cursor::Default),
            _ => {}
        }
    }

    /// A click on a marker opens its detail popup, replacing the layer's
    /// previous one. A click on a cluster zooms into it.
    pub fn handle_click(&mut self, drawing_layer_id: &str, event: &PointerEvent) {
        let Some((layer_id, role)) = self.roles.get(drawing_layer_id).cloned() else {
            return;
        };
        match role {
            DrawingRole::Marker => {
                self.close_hover();
                let Some((feature, anchor)) = point_under(event) else {
                    return;
                };
                let Some(config) = self.layer_config(&layer_id) else {
                    return;
                };
                let html = detail_html(config, properties_of(feature));
                if let Some(previous) = self.popups.remove(&layer_id) {
                    self.surface.close_popup(previous);
                }
                let popup = self.surface.open_popup(Popup {
                    lng_lat: anchor,
                    html,
                    options: PopupOptions::detail(),
                });
                self.popups.insert(layer_id, popup);
            }
            DrawingRole::Clusters => self.zoom_into_cluster(&layer_id, event),
            _ => {}
        }
    }

    fn zoom_into_cluster(&mut self, layer_id: &str, event: &PointerEvent) {
        let Some(feature) = event.features.first() else {
            return;
        };
        let Some(center) = feature.geometry.as_lng_lat() else {
            return;
        };
        let Some(cluster_id) = feature.property("cluster_id").and_then(Value::as_u64) else {
            return;
        };
        match self
            .surface
            .cluster_expansion_zoom(&source_id(layer_id), cluster_id)
        {
            Ok(zoom) => self.surface.ease_to(Camera {
                center,
                zoom: zoom.unwrap_or(CLUSTER_FALLBACK_ZOOM),
            }),
            Err(e) => debug!(layer_id, cluster_id, error = %e, "cluster expansion zoom unavailable"),
        }
    }

    fn close_hover(&mut self) {
        if let Some((_, popup)) = self.hover.take() {
            self.surface.close_popup(popup);
        }
    }

    /// Registers the icon for (shape, color) once.
    fn ensure_icon(&mut self, shape: IconShape, color: &str) -> MapResult<String> {
        let id = icon_id(shape, color);
        if !self.icons.contains(&id) {
            if let Some(image) = icon_image(shape, color) {
                if !self.surface.has_image(&id) {
                    self.surface.add_image(&id, image)?;
                }
                self.icons.insert(id.clone());
            }
        }
        Ok(id)
    }
}

/// The first feature under the pointer when it is a point, with its
/// longitude moved onto the world copy under the cursor.
fn point_under(event: &PointerEvent) -> Option<(&Feature, LngLat)> {
    let feature = event.features.first()?;
    let point = feature.geometry.as_lng_lat()?;
    let lng = wrap_longitude(point.lng, event.lng_lat.lng);
    Some((feature, LngLat::new(lng, point.lat)))
}

fn properties_of(feature: &Feature) -> Option<&Map<String, Value>> {
    Some(&feature.properties).filter(|p| !p.is_empty())
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn unclustered() -> Value {
    json!(["!", ["has", "point_count"]])
}

fn clustered() -> Value {
    json!(["has", "point_count"])
}

fn circle_layer(id: &str, source: &str, style: &MarkerStyle) -> LayerSpec {
    LayerSpec {
        id: id.to_string(),
        kind: LayerKind::Circle,
        source: source.to_string(),
        filter: unclustered(),
        paint: object(json!({
            "circle-radius": style.size(),
            "circle-color": style.color(),
            "circle-stroke-width": 2,
            "circle-stroke-color": STROKE_COLOR,
        })),
        layout: Map::new(),
    }
}

fn icon_layer(id: &str, source: &str, image_id: &str, shape: IconShape, size: f64) -> LayerSpec {
    LayerSpec {
        id: id.to_string(),
        kind: LayerKind::Symbol,
        source: source.to_string(),
        filter: unclustered(),
        paint: Map::new(),
        layout: object(json!({
            "icon-image": image_id,
            "icon-size": icon_scale(size),
            "icon-allow-overlap": true,
            "icon-anchor": icon_anchor(shape),
        })),
    }
}

fn cluster_layer(base: &str, source: &str, color: &str) -> LayerSpec {
    LayerSpec {
        id: format!("{base}-clusters"),
        kind: LayerKind::Circle,
        source: source.to_string(),
        filter: clustered(),
        paint: object(json!({
            "circle-color": color,
            "circle-radius": ["step", ["get", "point_count"], 20, 10, 30, 50, 40],
            "circle-stroke-width": 3,
            "circle-stroke-color": STROKE_COLOR,
        })),
        layout: Map::new(),
    }
}

fn cluster_count_layer(base: &str, source: &str) -> LayerSpec {
    LayerSpec {
        id: format!("{base}-cluster-count"),
        kind: LayerKind::Symbol,
        source: source.to_string(),
        filter: clustered(),
        paint: object(json!({"text-color": STROKE_COLOR})),
        layout: object(json!({
            "text-field": "{point_count_abbreviated}",
            "text-font": ["DIN Offc Pro Medium", "Arial Unicode MS Bold"],
            "text-size": 12,
        })),
    }
}

fn fill_layer(base: &str, source: &str, color: &str) -> LayerSpec {
    LayerSpec {
        id: format!("{base}-fill"),
        kind: LayerKind::Fill,
        source: source.to_string(),
        filter: json!(["==", ["geometry-type"], "Polygon"]),
        paint: object(json!({"fill-color": color, "fill-opacity": 0.3})),
        layout: Map::new(),
    }
}

fn line_layer(base: &str, source: &str, color: &str) -> LayerSpec {
    LayerSpec {
        id: format!("{base}-line"),
        kind: LayerKind::Line,
        source: source.to_string(),
        filter: json!([
            "any",
            ["==", ["geometry-type"], "LineString"],
            ["==", ["geometry-type"], "Polygon"]
        ]),
        paint: object(json!({"line-color": color, "line-width": 2})),
        layout: Map::new(),
    }
}
