//! An in-memory rendering surface.

use crate::{
    Camera, Cursor, FitOptions, IconImage, LayerSpec, MapError, MapResult, Popup, PopupId,
    RenderSurface, SourceSpec,
};
use cityview_geo::{BoundingBox, FeatureCollection};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// One recorded surface mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceOp {
    AddSource(String),
    SetSourceData(String),
    RemoveSource(String),
    AddLayer(String),
    RemoveLayer(String),
    SetPaint { layer: String, property: String },
    SetLayout { layer: String, property: String },
    AddImage(String),
    OpenPopup(PopupId),
    ClosePopup(PopupId),
    SetCursor(Cursor),
    EaseTo(Camera),
    FitBounds(BoundingBox),
}

/// Records sources, layers, images, popups, cursor and camera without
/// drawing anything. Behaves like a strict map runtime: adding an existing
/// id or removing a missing one is an error.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    sources: HashMap<String, SourceSpec>,
    layers: Vec<LayerSpec>,
    images: HashMap<String, IconImage>,
    popups: BTreeMap<PopupId, Popup>,
    next_popup: u64,
    cursor: Cursor,
    camera: Option<Camera>,
    fitted: Option<(BoundingBox, FitOptions)>,
    cluster_zooms: HashMap<(String, u64), f64>,
    ops: Vec<SurfaceOp>,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer for [`RenderSurface::cluster_expansion_zoom`].
    pub fn set_cluster_expansion_zoom(&mut self, source_id: &str, cluster_id: u64, zoom: f64) {
        self.cluster_zooms.insert((source_id.to_string(), cluster_id), zoom);
    }

    pub fn source(&self, id: &str) -> Option<&SourceSpec> {
        self.sources.get(id)
    }

    pub fn source_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.sources.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn layer(&self, id: &str) -> Option<&LayerSpec> {
        self.layers.iter().find(|l| l.id == id)
    }

    /// Layer ids in drawing order.
    pub fn layer_ids(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.id.as_str()).collect()
    }

    pub fn image(&self, id: &str) -> Option<&IconImage> {
        self.images.get(id)
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn popup(&self, id: PopupId) -> Option<&Popup> {
        self.popups.get(&id)
    }

    pub fn open_popups(&self) -> impl Iterator<Item = (PopupId, &Popup)> {
        self.popups.iter().map(|(id, popup)| (*id, popup))
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn camera(&self) -> Option<Camera> {
        self.camera
    }

    pub fn fitted(&self) -> Option<(BoundingBox, FitOptions)> {
        self.fitted
    }

    pub fn ops(&self) -> &[SurfaceOp] {
        &self.ops
    }

    /// Returns and clears the recorded operations.
    pub fn take_ops(&mut self) -> Vec<SurfaceOp> {
        std::mem::take(&mut self.ops)
    }

    fn layer_mut(&mut self, id: &str) -> MapResult<&mut LayerSpec> {
        self.layers
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| MapError::UnknownLayer(id.to_string()))
    }
}

impl RenderSurface for HeadlessSurface {
    fn has_source(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    fn add_source(&mut self, id: &str, spec: SourceSpec) -> MapResult<()> {
        if self.sources.contains_key(id) {
            return Err(MapError::DuplicateSource(id.to_string()));
        }
        self.sources.insert(id.to_string(), spec);
        self.ops.push(SurfaceOp::AddSource(id.to_string()));
        Ok(())
    }

    fn set_source_data(&mut self, id: &str, data: &FeatureCollection) -> MapResult<()> {
        let source = self
            .sources
            .get_mut(id)
            .ok_or_else(|| MapError::UnknownSource(id.to_string()))?;
        source.data = data.clone();
        self.ops.push(SurfaceOp::SetSourceData(id.to_string()));
        Ok(())
    }

    fn remove_source(&mut self, id: &str) -> MapResult<()> {
        if self.layers.iter().any(|l| l.source == id) {
            return Err(MapError::Surface(format!("source {id} is still in use")));
        }
        self.sources
            .remove(id)
            .ok_or_else(|| MapError::UnknownSource(id.to_string()))?;
        self.ops.push(SurfaceOp::RemoveSource(id.to_string()));
        Ok(())
    }

    fn has_layer(&self, id: &str) -> bool {
        self.layers.iter().any(|l| l.id == id)
    }

    fn add_layer(&mut self, spec: LayerSpec) -> MapResult<()> {
        if self.has_layer(&spec.id) {
            return Err(MapError::DuplicateLayer(spec.id));
        }
        if !self.sources.contains_key(&spec.source) {
            return Err(MapError::UnknownSource(spec.source));
        }
        self.ops.push(SurfaceOp::AddLayer(spec.id.clone()));
        self.layers.push(spec);
        Ok(())
    }

    fn remove_layer(&mut self, id: &str) -> MapResult<()> {
        let index = self
            .layers
            .iter()
            .position(|l| l.id == id)
            .ok_or_else(|| MapError::UnknownLayer(id.to_string()))?;
        self.layers.remove(index);
        self.ops.push(SurfaceOp::RemoveLayer(id.to_string()));
        Ok(())
    }

    fn set_paint_property(&mut self, layer_id: &str, name: &str, value: Value) -> MapResult<()> {
        self.layer_mut(layer_id)?.paint.insert(name.to_string(), value);
        self.ops.push(SurfaceOp::SetPaint {
            layer: layer_id.to_string(),
            property: name.to_string(),
        });
        Ok(())
    }

    fn set_layout_property(&mut self, layer_id: &str, name: &str, value: Value) -> MapResult<()> {
        self.layer_mut(layer_id)?.layout.insert(name.to_string(), value);
        self.ops.push(SurfaceOp::SetLayout {
            layer: layer_id.to_string(),
            property: name.to_string(),
        });
        Ok(())
    }

    fn has_image(&self, id: &str) -> bool {
        self.images.contains_key(id)
    }

    fn add_image(&mut self, id: &str, image: IconImage) -> MapResult<()> {
        if !self.images.contains_key(id) {
            self.images.insert(id.to_string(), image);
            self.ops.push(SurfaceOp::AddImage(id.to_string()));
        }
        Ok(())
    }

    fn open_popup(&mut self, popup: Popup) -> PopupId {
        self.next_popup += 1;
        let id = PopupId(self.next_popup);
        self.popups.insert(id, popup);
        self.ops.push(SurfaceOp::OpenPopup(id));
        id
    }

    fn close_popup(&mut self, id: PopupId) {
        if self.popups.remove(&id).is_some() {
            self.ops.push(SurfaceOp::ClosePopup(id));
        }
    }

    fn set_cursor(&mut self, cursor: Cursor) {
        self.cursor = cursor;
        self.ops.push(SurfaceOp::SetCursor(cursor));
    }

    fn cluster_expansion_zoom(&self, source_id: &str, cluster_id: u64) -> MapResult<Option<f64>> {
        let source = self
            .sources
            .get(source_id)
            .ok_or_else(|| MapError::UnknownSource(source_id.to_string()))?;
        if !source.is_clustered() {
            return Err(MapError::Surface(format!("source {source_id} is not clustered")));
        }
        Ok(self
            .cluster_zooms
            .get(&(source_id.to_string(), cluster_id))
            .copied())
    }

    fn ease_to(&mut self, camera: Camera) {
        self.camera = Some(camera);
        self.ops.push(SurfaceOp::EaseTo(camera));
    }

    fn fit_bounds(&mut self, bounds: BoundingBox, options: FitOptions) {
        self.fitted = Some((bounds, options));
        self.ops.push(SurfaceOp::FitBounds(bounds));
    }
}
