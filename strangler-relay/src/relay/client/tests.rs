use super::headers::{X_ERROR, X_FORWARDED_BY, X_SERVICE_ENDPOINT, X_SERVICE_NAME};
use super::*;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use strangler_core::{Endpoint, Protocol, GATEWAY_ID, X_GATEWAY};
use wiremock::matchers::{body_string, header as header_matcher, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_endpoint_for(server: &MockServer, name: &str) -> Endpoint {
    let address = server.address();
    Endpoint::new(name, address.ip().to_string(), address.port(), Protocol::Http, "/health", 50)
}

#[test]
fn test_build_target_url() {
    let endpoint = Endpoint::new("movies-service", "movies", 3281, Protocol::Http, "/api/movies", 50);
    assert_eq!(
        ProxyClient::build_target_url(&endpoint, "/api/movies/1", Some("page=2")),
        "http://movies:3281/api/movies/1?page=2"
    );
    assert_eq!(
        ProxyClient::build_target_url(&endpoint, "api/movies", None),
        "http://movies:3281/api/movies"
    );
    assert_eq!(
        ProxyClient::build_target_url(&endpoint, "/", Some("")),
        "http://movies:3281/"
    );
}

#[tokio::test]
async fn test_forwards_request_and_stamps_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/movies"))
        .and(query_param("dry_run", "true"))
        .and(header_matcher(X_FORWARDED_BY, GATEWAY_ID))
        .and(header_matcher("x-request-id", "abc"))
        .and(body_string(r#"{"title":"Alien"}"#))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("content-type", "application/json")
                .set_body_string(r#"{"id":1}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let endpoint = create_endpoint_for(&server, "movies-service");
    let mut headers = HeaderMap::new();
    headers.insert("x-request-id", HeaderValue::from_static("abc"));
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    let request = ProxyRequest::new(Method::POST, "/api/movies")
        .with_query(Some("dry_run=true".to_string()))
        .with_headers(headers)
        .with_body(r#"{"title":"Alien"}"#);

    let client = ProxyClient::new().unwrap();
    let response = client.send(&endpoint, &request, Duration::from_secs(5)).await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert!(response.failure.is_none());
    assert_eq!(&response.body[..], br#"{"id":1}"#);
    assert_eq!(response.headers.get(X_SERVICE_NAME).unwrap(), "movies-service");
    assert_eq!(response.headers.get(X_SERVICE_ENDPOINT).unwrap(), endpoint.address().as_str());
    assert_eq!(response.headers.get(X_GATEWAY).unwrap(), GATEWAY_ID);
    assert_eq!(response.service_name, "movies-service");
}

#[tokio::test]
async fn test_statuses_returned_as_is() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/moved"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/elsewhere"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/boom"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let endpoint = create_endpoint_for(&server, "monolith-service");
    let client = ProxyClient::new().unwrap();
    let timeout = Duration::from_secs(5);

    let response = client.send(&endpoint, &ProxyRequest::new(Method::GET, "/missing"), timeout).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(!response.is_retryable());

    // 重定向不跟随
    let response = client.send(&endpoint, &ProxyRequest::new(Method::GET, "/moved"), timeout).await;
    assert_eq!(response.status, StatusCode::MOVED_PERMANENTLY);
    assert_eq!(response.headers.get(header::LOCATION).unwrap(), "/elsewhere");

    let response = client.send(&endpoint, &ProxyRequest::new(Method::GET, "/boom"), timeout).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.failure.is_none());
    assert!(response.is_retryable());
}

#[tokio::test]
async fn test_timeout_maps_to_504() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let endpoint = create_endpoint_for(&server, "movies-service");
    let client = ProxyClient::new().unwrap();
    let response = client
        .send(&endpoint, &ProxyRequest::new(Method::GET, "/slow"), Duration::from_millis(100))
        .await;

    assert_eq!(response.status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(response.failure, Some(TransportFailure::Timeout));
    assert_eq!(response.headers.get(X_ERROR).unwrap(), "proxy-error");
}

#[tokio::test]
async fn test_connection_refused_maps_to_503() {
    // 端口 1 上没有服务
    let endpoint = Endpoint::new("monolith-service", "127.0.0.1", 1, Protocol::Http, "/health", 50);
    let client = ProxyClient::new().unwrap();
    let response = client
        .send(&endpoint, &ProxyRequest::new(Method::GET, "/"), Duration::from_secs(5))
        .await;

    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.failure, Some(TransportFailure::ConnectionRefused));
    assert_eq!(response.headers.get(X_ERROR).unwrap(), "proxy-error");
    assert_eq!(response.headers.get(X_SERVICE_NAME).unwrap(), "monolith-service");

    let body: Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body["error"], "Service Unavailable");
    assert_eq!(body["message"], "The requested service is temporarily unavailable");
    assert_eq!(body["service"], "monolith-service");
}

#[test]
fn test_failure_status_mapping() {
    assert_eq!(TransportFailure::Timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(TransportFailure::ConnectionRefused.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(TransportFailure::NameResolution.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(TransportFailure::Other.status_code(), StatusCode::BAD_GATEWAY);
}
