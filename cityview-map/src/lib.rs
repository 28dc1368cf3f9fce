//! Map layers for CityView.
//!
//! [`LayerManager`] turns feature collections into sources, drawing layers,
//! marker icons and popups on a [`RenderSurface`]. It is idempotent: calling
//! [`LayerManager::add_or_update`] for a layer that already exists only
//! replaces its data. [`MapSession`] wires one live subscription per enabled
//! layer into a manager and keeps per-layer errors apart.
//!
//! Surfaces are not thread-safe; every call runs on the thread that owns the
//! manager.

mod error;
mod headless;
pub mod icons;
mod manager;
pub mod popup;
mod session;
mod surface;

pub use error::{MapError, MapResult};
pub use headless::{HeadlessSurface, SurfaceOp};
pub use icons::{icon_anchor, icon_id, icon_image, icon_scale};
pub use manager::{
    CLUSTER_MAX_ZOOM, CLUSTER_RADIUS, CLUSTER_THRESHOLD, DrawingRole, LAYER_SUFFIXES,
    LayerManager, PointerEvent, base_layer_id, drawing_layer_ids, source_id,
};
pub use popup::{detail_html, escape_html, hover_html, status_color, wrap_longitude};
pub use session::{LegendEntry, MapSession};
pub use surface::{
    Camera, ClusterOptions, Cursor, FitOptions, IconImage, LayerKind, LayerSpec, Popup, PopupId,
    PopupOptions, RenderSurface, SourceSpec,
};
