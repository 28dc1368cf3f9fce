use cityview_model::{Entity, Geometry, GeometryKind, LngLat};
use pretty_assertions::assert_eq;
use serde_json::json;

// ── Entity serde ─────────────────────────────────────────────────

#[test]
fn entity_deserializes_with_flattened_attributes() {
    let entity = Entity::from_value(json!({
        "id": "urn:ngsi-ld:WeatherObserved:006",
        "type": "WeatherObserved",
        "temperature": {"type": "Property", "value": 31.2},
        "location": {"type": "GeoProperty", "value": {"type": "Point", "coordinates": [105.77, 10.03]}}
    }))
    .unwrap();

    assert_eq!(entity.id, "urn:ngsi-ld:WeatherObserved:006");
    assert_eq!(entity.entity_type, "WeatherObserved");
    assert_eq!(entity.attributes.len(), 2);
    assert_eq!(entity.attribute("temperature").unwrap()["value"], json!(31.2));
}

#[test]
fn entity_without_id_is_rejected() {
    assert!(Entity::from_value(json!({"type": "X"})).is_err());
}

#[test]
fn to_value_puts_id_and_type_first() {
    let entity = Entity::new("urn:ngsi-ld:X:1", "X").with_attribute("a", json!(1));
    let value = entity.to_value();
    let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
    assert_eq!(keys, vec!["id", "type", "a"]);
}

#[test]
fn serialize_matches_to_value() {
    let entity = Entity::new("urn:ngsi-ld:X:1", "X").with_attribute("a", json!({"type": "Property", "value": 2}));
    assert_eq!(serde_json::to_value(&entity).unwrap(), entity.to_value());
}

// ── Geometry ─────────────────────────────────────────────────────

#[test]
fn geometry_point_roundtrip_shape() {
    let value = json!({"type": "Point", "coordinates": [10.0, 20.0]});
    let geometry = Geometry::from_value(&value).unwrap();
    assert_eq!(geometry, Geometry::Point(vec![10.0, 20.0]));
    assert_eq!(serde_json::to_value(&geometry).unwrap(), value);
}

#[test]
fn geometry_accepts_integer_coordinates() {
    let geometry = Geometry::from_value(&json!({"type": "Point", "coordinates": [10, 20]})).unwrap();
    assert_eq!(geometry.as_lng_lat(), Some(LngLat::new(10.0, 20.0)));
}

#[test]
fn geometry_ignores_extra_members() {
    let value = json!({"type": "Point", "coordinates": [1.0, 2.0], "bbox": [1, 2, 1, 2]});
    assert!(Geometry::from_value(&value).is_some());
}

#[test]
fn geometry_rejects_unknown_type_and_non_objects() {
    assert!(Geometry::from_value(&json!({"type": "Circle", "coordinates": [1, 2]})).is_none());
    assert!(Geometry::from_value(&json!({"type": "Point"})).is_none());
    assert!(Geometry::from_value(&json!([1, 2])).is_none());
}

#[test]
fn geometry_positions_flatten_nested_arrays() {
    let polygon = Geometry::from_value(&json!({
        "type": "MultiPolygon",
        "coordinates": [[[[0, 0], [1, 0], [1, 1], [0, 0]]], [[[5, 5], [6, 6], [5, 5]]]]
    }))
    .unwrap();
    assert_eq!(polygon.kind(), GeometryKind::MultiPolygon);
    assert_eq!(polygon.positions().len(), 7);
    assert!(polygon.is_shape());
    assert!(!polygon.is_point());
}

#[test]
fn lng_lat_from_short_position() {
    assert_eq!(LngLat::from_position(&[1.0]), None);
    assert_eq!(LngLat::from_position(&[1.0, 2.0, 30.0]), Some(LngLat::new(1.0, 2.0)));
}
