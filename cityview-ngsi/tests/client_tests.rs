use cityview_model::Entity;
use cityview_ngsi::{
    ClientConfig, ContextMode, GetOptions, NgsiClient, NgsiError, QueryOptions, link_header,
    short_type_name,
};
use pretty_assertions::assert_eq;
use serde_json::{Map, json};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CONTEXT: &str = "https://example.org/ctx.jsonld";
const ENTITY_ID: &str = "urn:ngsi-ld:WeatherObserved:006";
const ENTITY_PATH: &str = "/ngsi-ld/v1/entities/urn%3Angsi-ld%3AWeatherObserved%3A006";

fn mock_client(server: &MockServer) -> NgsiClient {
    let config = ClientConfig::new(server.uri())
        .with_service("cantho")
        .with_service_path("/weather")
        .with_context_url(CONTEXT);
    NgsiClient::new(config).unwrap()
}

fn weather_entity() -> serde_json::Value {
    json!({
        "id": ENTITY_ID,
        "type": "WeatherObserved",
        "temperature": {"type": "Property", "value": 31.2}
    })
}

// ── Helpers ─────────────────────────────────────────────────────

#[test]
fn link_header_format() {
    assert_eq!(
        link_header(CONTEXT),
        "<https://example.org/ctx.jsonld>; rel=\"http://www.w3.org/ns/json-ld#context\"; type=\"application/ld+json\""
    );
}

#[test]
fn short_type_name_strips_model_url() {
    assert_eq!(
        short_type_name("https://smartdatamodels.org/dataModel.Weather/WeatherObserved"),
        "WeatherObserved"
    );
    assert_eq!(short_type_name("WeatherObserved"), "WeatherObserved");
    assert_eq!(
        short_type_name("https://smartdatamodels.org/dataModel.Weather/WeatherObserved/"),
        "WeatherObserved"
    );
    assert_eq!(short_type_name("odd/"), "odd");
    assert_eq!(short_type_name("/"), "/");
}

// ── Configuration errors ────────────────────────────────────────

#[test]
fn client_requires_broker_url() {
    let err = NgsiClient::new(ClientConfig::new("  ")).unwrap_err();
    assert!(matches!(err, NgsiError::Config(_)));
    assert_eq!(err.status(), 0);
}

#[test]
fn client_rejects_unsendable_header() {
    let err = NgsiClient::new(ClientConfig::new("http://localhost:1026").with_service("bad\nvalue"))
        .unwrap_err();
    assert!(matches!(err, NgsiError::Config(_)));
}

#[tokio::test]
async fn empty_entity_id_rejected_before_request() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let client = mock_client(&server);
    let err = client.delete_entity("").await.unwrap_err();
    assert!(matches!(err, NgsiError::Config(_)));
}

// ── Headers ─────────────────────────────────────────────────────

#[tokio::test]
async fn get_entity_compacted_sends_link_and_tenant_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ENTITY_PATH))
        .and(header("accept", "application/json"))
        .and(header("link", link_header(CONTEXT).as_str()))
        .and(header("fiware-service", "cantho"))
        .and(header("fiware-servicepath", "/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_json(weather_entity()))
        .expect(1)
        .mount(&server)
        .await;

    let entity = mock_client(&server)
        .get_entity(ENTITY_ID, &GetOptions::default())
        .await
        .unwrap();
    assert_eq!(entity.id, ENTITY_ID);
    assert_eq!(entity.entity_type, "WeatherObserved");
}

#[tokio::test]
async fn get_entity_embedded_omits_link() {
    let server = MockServer::start().await;
    let mut body = weather_entity();
    body["@context"] = json!(CONTEXT);
    Mock::given(method("GET"))
        .and(path(ENTITY_PATH))
        .and(header("accept", "application/ld+json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(&server)
        .await;

    let options = GetOptions {
        mode: ContextMode::Embedded,
        ..GetOptions::default()
    };
    mock_client(&server).get_entity(ENTITY_ID, &options).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("link").is_none());
}

#[tokio::test]
async fn get_entity_passes_attrs_and_options() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ENTITY_PATH))
        .and(query_param("attrs", "temperature,humidity"))
        .and(query_param("options", "keyValues"))
        .respond_with(ResponseTemplate::new(200).set_body_json(weather_entity()))
        .expect(1)
        .mount(&server)
        .await;

    let options = GetOptions {
        attrs: vec!["temperature".into(), "humidity".into()],
        options: Some("keyValues".into()),
        ..GetOptions::default()
    };
    mock_client(&server).get_entity(ENTITY_ID, &options).await.unwrap();
}

#[tokio::test]
async fn blank_tenant_headers_are_omitted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ngsi-ld/v1/entities"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let config = ClientConfig::new(server.uri())
        .with_service("   ")
        .with_service_path("");
    let client = NgsiClient::new(config).unwrap();
    client.query_entities(&QueryOptions::default()).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("fiware-service").is_none());
    assert!(requests[0].headers.get("fiware-servicepath").is_none());
    assert!(requests[0].headers.get("x-auth-token").is_none());
}

#[tokio::test]
async fn tenant_headers_are_trimmed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("fiware-service", "cantho"))
        .and(header("x-auth-token", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let config = ClientConfig::new(server.uri())
        .with_service("  cantho ")
        .with_auth_token("secret");
    let client = NgsiClient::new(config).unwrap();
    client.query_entities(&QueryOptions::default()).await.unwrap();
}

// ── CRUD ────────────────────────────────────────────────────────

#[tokio::test]
async fn create_entity_posts_short_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ngsi-ld/v1/entities"))
        .and(header("content-type", "application/json"))
        .and(header("link", link_header(CONTEXT).as_str()))
        .and(body_json(json!({
            "id": "urn:ngsi-ld:WeatherObserved:006",
            "type": "WeatherObserved",
            "temperature": {"type": "Property", "value": 31.2}
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let entity = Entity::new(ENTITY_ID, "https://smartdatamodels.org/dataModel.Weather/WeatherObserved")
        .with_attribute("temperature", json!({"type": "Property", "value": 31.2}));
    mock_client(&server).create_entity(&entity).await.unwrap();
}

#[tokio::test]
async fn update_attrs_patches() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(format!("{ENTITY_PATH}/attrs")))
        .and(header("content-type", "application/json"))
        .and(header("link", link_header(CONTEXT).as_str()))
        .and(body_json(json!({"temperature": {"type": "Property", "value": 29}})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let mut attrs = Map::new();
    attrs.insert("temperature".into(), json!({"type": "Property", "value": 29}));
    mock_client(&server)
        .update_entity_attrs(ENTITY_ID, &attrs)
        .await
        .unwrap();
}

#[tokio::test]
async fn append_attrs_without_overwrite_sets_option() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{ENTITY_PATH}/attrs")))
        .and(query_param("options", "noOverwrite"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let mut attrs = Map::new();
    attrs.insert("humidity".into(), json!({"type": "Property", "value": 80}));
    mock_client(&server)
        .append_entity_attrs(ENTITY_ID, &attrs, false)
        .await
        .unwrap();
}

#[tokio::test]
async fn append_attrs_with_overwrite_has_no_query() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{ENTITY_PATH}/attrs")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    mock_client(&server)
        .append_entity_attrs(ENTITY_ID, &Map::new(), true)
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].url.query(), None);
}

#[tokio::test]
async fn delete_attr_and_entity() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(format!("{ENTITY_PATH}/attrs/temperature")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(ENTITY_PATH))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = mock_client(&server);
    client.delete_entity_attr(ENTITY_ID, "temperature").await.unwrap();
    client.delete_entity(ENTITY_ID).await.unwrap();
}

#[tokio::test]
async fn query_entities_with_filters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ngsi-ld/v1/entities"))
        .and(header("accept", "application/json"))
        .and(header("link", link_header(CONTEXT).as_str()))
        .and(query_param("type", "WeatherObserved"))
        .and(query_param("q", "temperature>30"))
        .and(query_param("attrs", "temperature"))
        .and(query_param("limit", "50"))
        .and(query_param("offset", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([weather_entity()])))
        .expect(1)
        .mount(&server)
        .await;

    let query = QueryOptions {
        entity_type: Some("https://smartdatamodels.org/dataModel.Weather/WeatherObserved".into()),
        q: Some("temperature>30".into()),
        attrs: vec!["temperature".into()],
        limit: Some(50),
        offset: Some(100),
        ..QueryOptions::default()
    };
    let entities = mock_client(&server).query_entities(&query).await.unwrap();
    assert_eq!(entities.len(), 1);
}

// ── Existence ───────────────────────────────────────────────────

#[tokio::test]
async fn exists_true_on_200_false_on_404() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path(ENTITY_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/ngsi-ld/v1/entities/urn%3Angsi-ld%3AX%3Amissing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = mock_client(&server);
    assert!(client.entity_exists(ENTITY_ID).await.unwrap());
    assert!(!client.entity_exists("urn:ngsi-ld:X:missing").await.unwrap());
}

#[tokio::test]
async fn exists_rethrows_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = mock_client(&server).entity_exists(ENTITY_ID).await.unwrap_err();
    assert_eq!(err.status(), 500);
}

// ── Error mapping ───────────────────────────────────────────────

#[tokio::test]
async fn problem_details_are_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "type": "https://uri.etsi.org/ngsi-ld/errors/AlreadyExists",
            "title": "Entity already exists",
            "detail": "urn:ngsi-ld:WeatherObserved:006"
        })))
        .mount(&server)
        .await;

    let entity = Entity::new(ENTITY_ID, "WeatherObserved");
    let err = mock_client(&server).create_entity(&entity).await.unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(err.status(), 409);
    assert_eq!(err.code(), Some("https://uri.etsi.org/ngsi-ld/errors/AlreadyExists"));
    assert_eq!(err.detail(), "urn:ngsi-ld:WeatherObserved:006");
    assert_eq!(err.to_string(), "Entity already exists");
}

#[tokio::test]
async fn non_json_error_body_falls_back_to_status_line() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("<html>nope</html>"))
        .mount(&server)
        .await;

    let err = mock_client(&server)
        .get_entity(ENTITY_ID, &GetOptions::default())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.code(), None);
    assert_eq!(err.detail(), "HTTP 404: Not Found");
}

#[tokio::test]
async fn unreachable_broker_is_transport_error() {
    let client = NgsiClient::new(ClientConfig::new("http://127.0.0.1:1")).unwrap();
    let err = client.query_entities(&QueryOptions::default()).await.unwrap_err();
    assert!(matches!(err, NgsiError::Transport(_)));
    assert_eq!(err.status(), 0);
    assert!(!err.detail().is_empty());
}

#[tokio::test]
async fn malformed_success_body_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = mock_client(&server)
        .query_entities(&QueryOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, NgsiError::Decode(_)));
}
