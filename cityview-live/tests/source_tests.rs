use cityview_live::{BrokerSource, EntitySource, FetchData, FetchRequest, FetchTarget, Subscription};
use cityview_model::LayerConfig;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn streetlights() -> serde_json::Value {
    json!([
        {"id": "urn:ngsi-ld:Streetlight:1", "type": "Streetlight"},
        {"id": "urn:ngsi-ld:Streetlight:2", "type": "Streetlight"}
    ])
}

// ── FetchRequest ────────────────────────────────────────────────

#[test]
fn request_from_layer() {
    let mut layer = LayerConfig::for_type("lights", "Lights", "http://broker", "Streetlight");
    layer.tenant = Some("cantho".to_string());
    layer.refresh_interval_seconds = 15;

    let request = FetchRequest::from_layer(&layer);
    assert_eq!(request.target, FetchTarget::Type("Streetlight".to_string()));
    assert_eq!(request.service.as_deref(), Some("cantho"));
    assert_eq!(request.refresh_interval, Duration::from_secs(15));
    assert!(request.polls());
}

#[test]
fn request_from_layer_with_ids() {
    let mut layer = LayerConfig::for_type("lights", "Lights", "http://broker", "");
    layer.entity_ids = vec!["urn:a".to_string()];
    assert_eq!(
        FetchRequest::from_layer(&layer).target,
        FetchTarget::Ids(vec!["urn:a".to_string()])
    );
}

#[test]
fn shape_ignores_scheduling() {
    let base = FetchRequest::of_type("http://broker", "Streetlight");
    assert!(base.same_shape(&base.clone().with_refresh_interval(Duration::ZERO).with_enabled(false)));
    assert!(!base.same_shape(&base.clone().with_service_path("/lights")));
}

// ── BrokerSource ────────────────────────────────────────────────

#[tokio::test]
async fn query_by_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ngsi-ld/v1/entities"))
        .and(query_param("type", "Streetlight"))
        .and(header("Fiware-Service", "cantho"))
        .respond_with(ResponseTemplate::new(200).set_body_json(streetlights()))
        .expect(1)
        .mount(&server)
        .await;

    let request = FetchRequest::of_type(server.uri(), "Streetlight").with_service("cantho");
    let data = BrokerSource.fetch(&request).await.unwrap();
    assert_eq!(data.len(), 2);
}

#[tokio::test]
async fn single_entity_with_attrs() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ngsi-ld/v1/entities/urn%3Angsi-ld%3AStreetlight%3A1"))
        .and(query_param("attrs", "powerState"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "urn:ngsi-ld:Streetlight:1",
            "type": "Streetlight",
            "powerState": {"type": "Property", "value": "on"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request =
        FetchRequest::entity(server.uri(), "urn:ngsi-ld:Streetlight:1").with_attrs(["powerState"]);
    match BrokerSource.fetch(&request).await.unwrap() {
        FetchData::One(entity) => assert_eq!(entity.id, "urn:ngsi-ld:Streetlight:1"),
        other => panic!("expected one entity, got {other:?}"),
    }
}

#[tokio::test]
async fn query_by_ids() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ngsi-ld/v1/entities"))
        .and(query_param("id", "urn:a,urn:b"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let request = FetchRequest::new(
        server.uri(),
        FetchTarget::Ids(vec!["urn:a".to_string(), "urn:b".to_string()]),
    );
    assert!(BrokerSource.fetch(&request).await.unwrap().is_empty());
}

#[tokio::test]
async fn subscription_publishes_broker_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ngsi-ld/v1/entities"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "type": "https://uri.etsi.org/ngsi-ld/errors/BadRequestData",
            "title": "Bad request",
            "detail": "invalid type"
        })))
        .mount(&server)
        .await;

    let request = FetchRequest::of_type(server.uri(), "Streetlight").with_refresh_interval(Duration::ZERO);
    let mut sub = Subscription::new(Arc::new(BrokerSource), request).unwrap();
    let mut rx = sub.subscribe();
    sub.start().unwrap();

    let state = rx.wait_for(|s| s.error.is_some()).await.unwrap().clone();
    let error = state.error.unwrap();
    assert_eq!(error.status(), 400);
    assert_eq!(error.detail(), "invalid type");
    assert!(state.data.is_none());
}
