use cityview_model::{Geometry, LngLat};
use serde::{Deserialize, Serialize};

use crate::FeatureCollection;

/// An axis-aligned lng/lat rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "[f64; 4]", from = "[f64; 4]")]
pub struct BoundingBox {
    pub min_lng: f64,
    pub min_lat: f64,
    pub max_lng: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn point(lng: f64, lat: f64) -> Self {
        Self {
            min_lng: lng,
            min_lat: lat,
            max_lng: lng,
            max_lat: lat,
        }
    }

    /// `[minLng, minLat, maxLng, maxLat]`.
    pub fn to_array(self) -> [f64; 4] {
        [self.min_lng, self.min_lat, self.max_lng, self.max_lat]
    }

    pub fn extend(&mut self, lng: f64, lat: f64) {
        self.min_lng = self.min_lng.min(lng);
        self.min_lat = self.min_lat.min(lat);
        self.max_lng = self.max_lng.max(lng);
        self.max_lat = self.max_lat.max(lat);
    }

    #[must_use]
    pub fn union(self, other: BoundingBox) -> BoundingBox {
        let mut out = self;
        out.extend(other.min_lng, other.min_lat);
        out.extend(other.max_lng, other.max_lat);
        out
    }

    pub fn center(&self) -> LngLat {
        LngLat::new(
            (self.min_lng + self.max_lng) / 2.0,
            (self.min_lat + self.max_lat) / 2.0,
        )
    }

    pub fn contains(&self, lng: f64, lat: f64) -> bool {
        (self.min_lng..=self.max_lng).contains(&lng) && (self.min_lat..=self.max_lat).contains(&lat)
    }

    fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        b.to_array()
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from([min_lng, min_lat, max_lng, max_lat]: [f64; 4]) -> Self {
        Self {
            min_lng,
            min_lat,
            max_lng,
            max_lat,
        }
    }
}

fn geometry_bounds(geometry: &Geometry) -> Option<BoundingBox> {
    let mut points = geometry
        .positions()
        .into_iter()
        .filter_map(|p| LngLat::from_position(p));
    let first = points.next()?;
    let mut bbox = BoundingBox::point(first.lng, first.lat);
    for p in points {
        bbox.extend(p.lng, p.lat);
    }
    Some(bbox)
}

/// Bounds of every coordinate in the collection. `None` for an empty
/// collection or one without finite coordinates.
pub fn bounding_box(collection: &FeatureCollection) -> Option<BoundingBox> {
    let bbox = collection
        .iter()
        .filter_map(|f| geometry_bounds(&f.geometry))
        .reduce(BoundingBox::union)?;
    bbox.is_finite().then_some(bbox)
}

/// A point's own coordinates; the bounding-box center for anything else.
pub fn geometry_center(geometry: &Geometry) -> Option<LngLat> {
    match geometry {
        Geometry::Point(p) => LngLat::from_position(p),
        other => geometry_bounds(other).map(|b| b.center()),
    }
}
