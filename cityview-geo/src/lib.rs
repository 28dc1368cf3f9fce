//! Entity to GeoJSON conversion.
//!
//! An entity becomes a [`Feature`] when one of its attributes is a GeoProperty
//! holding a well-formed geometry. Entities without one are dropped, never
//! reported as errors.

mod bounds;
mod feature;

pub use bounds::{BoundingBox, bounding_box, geometry_center};
pub use feature::{
    Feature, FeatureCollection, entities_to_feature_collection, entity_to_feature,
    extract_geometry, feature_properties,
};
