//! GeoJSON-shaped geometry.
//!
//! Coordinates are always `[longitude, latitude]` (optionally followed by an
//! altitude, which is carried but ignored).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One coordinate tuple: `[lng, lat]` or `[lng, lat, alt]`.
pub type Position = Vec<f64>;

/// A GeoJSON geometry value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(Position),
    MultiPoint(Vec<Position>),
    LineString(Vec<Position>),
    MultiLineString(Vec<Vec<Position>>),
    Polygon(Vec<Vec<Position>>),
    MultiPolygon(Vec<Vec<Vec<Position>>>),
}

/// Discriminant of a [`Geometry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryKind {
    Point,
    MultiPoint,
    LineString,
    MultiLineString,
    Polygon,
    MultiPolygon,
}

impl GeometryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Point => "Point",
            Self::MultiPoint => "MultiPoint",
            Self::LineString => "LineString",
            Self::MultiLineString => "MultiLineString",
            Self::Polygon => "Polygon",
            Self::MultiPolygon => "MultiPolygon",
        }
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Geometry {
    /// Parses a geometry out of an already-unwrapped attribute value.
    /// Returns `None` for anything that is not a well-formed GeoJSON geometry.
    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    pub fn kind(&self) -> GeometryKind {
        match self {
            Self::Point(_) => GeometryKind::Point,
            Self::MultiPoint(_) => GeometryKind::MultiPoint,
            Self::LineString(_) => GeometryKind::LineString,
            Self::MultiLineString(_) => GeometryKind::MultiLineString,
            Self::Polygon(_) => GeometryKind::Polygon,
            Self::MultiPolygon(_) => GeometryKind::MultiPolygon,
        }
    }

    pub fn is_point(&self) -> bool {
        matches!(self, Self::Point(_))
    }

    /// Lines and polygons (single or multi).
    pub fn is_shape(&self) -> bool {
        matches!(
            self,
            Self::LineString(_) | Self::MultiLineString(_) | Self::Polygon(_) | Self::MultiPolygon(_)
        )
    }

    /// Flattens the nested coordinate arrays into a list of positions.
    pub fn positions(&self) -> Vec<&Position> {
        match self {
            Self::Point(p) => vec![p],
            Self::MultiPoint(ps) | Self::LineString(ps) => ps.iter().collect(),
            Self::MultiLineString(rings) | Self::Polygon(rings) => rings.iter().flatten().collect(),
            Self::MultiPolygon(polys) => polys.iter().flatten().flatten().collect(),
        }
    }

    /// The point's coordinates, if this is a point with at least lng/lat.
    pub fn as_lng_lat(&self) -> Option<LngLat> {
        match self {
            Self::Point(p) => LngLat::from_position(p),
            _ => None,
        }
    }
}

/// A longitude/latitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    pub const fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    /// Reads `[lng, lat, ..]`; positions with fewer than two numbers yield `None`.
    pub fn from_position(position: &[f64]) -> Option<Self> {
        match position {
            [lng, lat, ..] => Some(Self::new(*lng, *lat)),
            _ => None,
        }
    }
}
