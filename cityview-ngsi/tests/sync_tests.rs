use cityview_model::{NGSI_LD_CORE_CONTEXT, Source, SyncState};
use cityview_ngsi::{
    BrokerSync, ChangeOperation, DataModelRef, EntityDocument, UpsertOutcome, entity_attribute_paths,
    link_header,
};
use pretty_assertions::assert_eq;
use serde_json::{Map, Value, json};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ENTITY_PATH: &str = "/ngsi-ld/v1/entities/urn%3Angsi-ld%3AWeatherObserved%3A006";

fn attributes() -> Map<String, Value> {
    let value = json!({
        "temperature": {"type": "Property", "value": 31.2},
        "address": {"type": "Property", "value": {"streetAddress": "30/4", "addressLocality": "Can Tho"}}
    });
    match value {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

fn make_document(server: &MockServer) -> EntityDocument {
    EntityDocument {
        entity_id: "urn:ngsi-ld:WeatherObserved:006".to_string(),
        entity_type: None,
        data_model: Some(DataModelRef {
            model: "https://smartdatamodels.org/dataModel.Weather/WeatherObserved".to_string(),
            context_url: Some("https://example.org/weather.jsonld".to_string()),
        }),
        source: Source::new(server.uri()),
        service: Some("cantho".to_string()),
        service_path: Some("/".to_string()),
        attributes: attributes(),
    }
}

// ── EntityDocument ──────────────────────────────────────────────

#[test]
fn document_uses_short_model_type_and_model_context() {
    let doc = EntityDocument {
        entity_id: "urn:ngsi-ld:X:1".into(),
        entity_type: None,
        data_model: Some(DataModelRef {
            model: "https://example.org/models/Streetlight".into(),
            context_url: None,
        }),
        source: Source::new("http://localhost:1026"),
        service: None,
        service_path: None,
        attributes: Map::new(),
    };
    assert_eq!(doc.wire_type(), Some("Streetlight"));
    assert_eq!(doc.context_url(), NGSI_LD_CORE_CONTEXT);
}

#[test]
fn document_own_type_wins() {
    let mut doc = EntityDocument {
        entity_id: "urn:ngsi-ld:X:1".into(),
        entity_type: Some("Parking".into()),
        data_model: None,
        source: Source::new("http://localhost:1026"),
        service: None,
        service_path: None,
        attributes: Map::new(),
    };
    assert_eq!(doc.wire_type(), Some("Parking"));
    doc.entity_type = None;
    assert!(doc.to_entity().is_err());
}

// ── after_change ────────────────────────────────────────────────

#[tokio::test]
async fn create_posts_full_entity_and_reports_synced() {
    let server = MockServer::start().await;
    let mut body = json!({
        "id": "urn:ngsi-ld:WeatherObserved:006",
        "type": "WeatherObserved",
    });
    for (k, v) in attributes() {
        body[k] = v;
    }
    Mock::given(method("POST"))
        .and(path("/ngsi-ld/v1/entities"))
        .and(header("fiware-service", "cantho"))
        .and(header("link", link_header("https://example.org/weather.jsonld").as_str()))
        .and(body_json(body))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let status = BrokerSync::new()
        .after_change(&make_document(&server), ChangeOperation::Create)
        .await;
    assert!(status.is_synced());
    assert!(status.last_sync_time.is_some());
    assert_eq!(status.last_sync_error, None);
}

#[tokio::test]
async fn update_patches_attributes() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(format!("{ENTITY_PATH}/attrs")))
        .and(body_json(Value::Object(attributes())))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let status = BrokerSync::new()
        .after_change(&make_document(&server), ChangeOperation::Update)
        .await;
    assert!(status.is_synced());
}

#[tokio::test]
async fn update_without_attributes_skips_broker() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let mut doc = make_document(&server);
    doc.attributes.clear();
    let status = BrokerSync::new().after_change(&doc, ChangeOperation::Update).await;
    assert!(status.is_synced());
}

#[tokio::test]
async fn broker_failure_is_recorded_not_raised() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "type": "https://uri.etsi.org/ngsi-ld/errors/AlreadyExists",
            "title": "Already exists"
        })))
        .mount(&server)
        .await;

    let status = BrokerSync::new()
        .after_change(&make_document(&server), ChangeOperation::Create)
        .await;
    assert_eq!(status.state, SyncState::Error);
    assert_eq!(status.last_sync_error.as_deref(), Some("Already exists"));
}

// ── after_delete ────────────────────────────────────────────────

#[tokio::test]
async fn delete_failure_is_swallowed() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(ENTITY_PATH))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let status = BrokerSync::new().after_delete(&make_document(&server)).await;
    assert_eq!(status.state, SyncState::Error);
}

#[tokio::test]
async fn delete_success() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(ENTITY_PATH))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let status = BrokerSync::new().after_delete(&make_document(&server)).await;
    assert!(status.is_synced());
}

// ── resync ──────────────────────────────────────────────────────

#[tokio::test]
async fn resync_upserts_then_reads_back_paths() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(ENTITY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "urn:ngsi-ld:WeatherObserved:006",
            "type": "WeatherObserved",
            "temperature": {"type": "Property", "value": 31.2},
            "dateObserved": {"type": "Property", "value": "2024-05-01T10:00:00Z"}
        })))
        .mount(&server)
        .await;

    let report = BrokerSync::new().resync(&make_document(&server)).await.unwrap();
    assert_eq!(report.outcome, UpsertOutcome::Created);
    assert_eq!(report.attribute_paths, vec!["data.dateObserved", "data.temperature"]);
    assert!(report.status.is_synced());
}

#[tokio::test]
async fn resync_falls_back_to_local_paths() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let report = BrokerSync::new().resync(&make_document(&server)).await.unwrap();
    assert_eq!(report.outcome, UpsertOutcome::Updated);
    assert_eq!(report.attribute_paths, vec!["data.address", "data.temperature"]);
}

// ── attribute paths ─────────────────────────────────────────────

#[test]
fn attribute_paths_descend_only_nested_objects() {
    let attrs = match json!({
        "id": "urn:x",
        "station": {"type": "Property", "value": {"meta": {"a": 1, "b": 2}, "label": "x"}},
        "tags": ["a", "b"],
        "location": {"type": "GeoProperty", "value": {"type": "Point", "coordinates": [1, 2]}}
    }) {
        Value::Object(map) => map,
        _ => unreachable!(),
    };
    assert_eq!(
        entity_attribute_paths(&attrs),
        vec!["data.location", "data.station.label", "data.station.meta", "data.tags"]
    );
}
