use cityview_geo::{
    BoundingBox, Feature, FeatureCollection, entities_to_feature_collection, entity_to_feature,
    extract_geometry, feature_properties, geometry_center,
};
use cityview_model::{Entity, Geometry, LngLat};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::{Value, json};

fn geo(geometry: Value) -> Value {
    json!({"type": "GeoProperty", "value": geometry})
}

fn make_station(id: &str, lng: f64, lat: f64) -> Entity {
    Entity::new(id, "BikeStation")
        .with_attribute("name", json!({"type": "Property", "value": "Dock"}))
        .with_attribute("location", geo(json!({"type": "Point", "coordinates": [lng, lat]})))
        .with_attribute("status", json!({"type": "Property", "value": "online"}))
}

fn point_feature(lng: f64, lat: f64) -> Feature {
    Feature {
        id: "f".into(),
        geometry: Geometry::Point(vec![lng, lat]),
        properties: Default::default(),
    }
}

// ── entity_to_feature ───────────────────────────────────────────

#[test]
fn feature_carries_id_and_plain_properties() {
    let feature = entity_to_feature(&make_station("urn:ngsi-ld:BikeStation:1", 106.7, 10.78), None)
        .unwrap();

    assert_eq!(feature.id, "urn:ngsi-ld:BikeStation:1");
    assert_eq!(feature.geometry, Geometry::Point(vec![106.7, 10.78]));
    assert_eq!(
        Value::Object(feature.properties.clone()),
        json!({
            "id": "urn:ngsi-ld:BikeStation:1",
            "type": "BikeStation",
            "name": "Dock",
            "status": "online"
        })
    );
    assert!(feature.property("location").is_none());
    assert_eq!(feature.property_str("status"), Some("online"));
}

#[test]
fn explicit_location_attribute_overrides_detection() {
    let entity = make_station("urn:a", 1.0, 2.0).with_attribute(
        "footprint",
        geo(json!({"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]]})),
    );
    let feature = entity_to_feature(&entity, Some("footprint")).unwrap();
    assert!(feature.geometry.is_shape());
}

#[test]
fn blank_override_falls_back_to_detection() {
    let geometry = extract_geometry(&make_station("urn:a", 1.0, 2.0), Some("  ")).unwrap();
    assert!(geometry.is_point());
}

#[test]
fn override_naming_non_geo_attribute_yields_none() {
    assert!(entity_to_feature(&make_station("urn:a", 1.0, 2.0), Some("name")).is_none());
    assert!(entity_to_feature(&make_station("urn:a", 1.0, 2.0), Some("missing")).is_none());
}

#[test]
fn malformed_geometry_yields_none() {
    let entity = Entity::new("urn:a", "T").with_attribute("location", geo(json!({"type": "Point"})));
    assert!(entity_to_feature(&entity, None).is_none());
}

#[test]
fn feature_properties_can_keep_geo() {
    let props = feature_properties(&make_station("urn:a", 1.0, 2.0), false);
    assert_eq!(props["location"]["type"], "Point");
}

// ── entities_to_feature_collection ──────────────────────────────

#[test]
fn one_of_three_entities_located() {
    let entities = vec![
        Entity::new("urn:a", "T").with_attribute("name", json!("no geo")),
        make_station("urn:b", 10.0, 20.0),
        Entity::new("urn:c", "T").with_attribute("location", json!({"type": "Property", "value": "Hall"})),
    ];
    let collection = entities_to_feature_collection(&entities, None);
    assert_eq!(collection.len(), 1);
    assert_eq!(collection.features[0].id, "urn:b");
}

#[test]
fn collection_serializes_as_geojson() {
    let collection = entities_to_feature_collection(&[make_station("urn:b", 10.0, 20.0)], None);
    let value = collection.to_value();
    assert_eq!(value["type"], "FeatureCollection");
    assert_eq!(value["features"][0]["type"], "Feature");
    assert_eq!(value["features"][0]["geometry"]["type"], "Point");
    assert_eq!(value["features"][0]["geometry"]["coordinates"], json!([10.0, 20.0]));

    let back: FeatureCollection = serde_json::from_value(value).unwrap();
    assert_eq!(back, collection);
}

// ── bounding box ────────────────────────────────────────────────

#[test]
fn empty_collection_has_no_bounds() {
    assert_eq!(FeatureCollection::default().bounds(), None);
}

#[test]
fn single_point_bounds() {
    let collection = FeatureCollection::new(vec![point_feature(10.0, 20.0)]);
    assert_eq!(collection.bounds().unwrap().to_array(), [10.0, 20.0, 10.0, 20.0]);
}

#[test]
fn bounds_cover_nested_geometries() {
    let polygon = Feature {
        id: "p".into(),
        geometry: Geometry::MultiPolygon(vec![vec![vec![
            vec![-5.0, -5.0],
            vec![5.0, -5.0],
            vec![5.0, 8.0],
            vec![-5.0, -5.0],
        ]]]),
        properties: Default::default(),
    };
    let collection = FeatureCollection::new(vec![polygon, point_feature(20.0, 1.0)]);
    assert_eq!(collection.bounds().unwrap().to_array(), [-5.0, -5.0, 20.0, 8.0]);
}

#[test]
fn bounding_box_serializes_as_array() {
    let bbox = BoundingBox::point(1.0, 2.0);
    assert_eq!(serde_json::to_value(bbox).unwrap(), json!([1.0, 2.0, 1.0, 2.0]));
}

proptest! {
    #[test]
    fn bounds_contain_every_point(points in prop::collection::vec((-180.0f64..180.0, -90.0f64..90.0), 1..20)) {
        let collection = FeatureCollection::new(
            points.iter().map(|(lng, lat)| point_feature(*lng, *lat)).collect(),
        );
        let bbox = collection.bounds().unwrap();
        for (lng, lat) in points {
            prop_assert!(bbox.contains(lng, lat));
        }
    }
}

// ── geometry_center ─────────────────────────────────────────────

#[test]
fn center_of_point_and_line() {
    assert_eq!(
        geometry_center(&Geometry::Point(vec![3.0, 4.0])),
        Some(LngLat::new(3.0, 4.0))
    );
    let line = Geometry::LineString(vec![vec![0.0, 0.0], vec![10.0, 4.0]]);
    assert_eq!(geometry_center(&line), Some(LngLat::new(5.0, 2.0)));
    assert_eq!(geometry_center(&Geometry::LineString(vec![])), None);
}
